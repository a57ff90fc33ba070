//! The outer measurement loop: every selected speed-pattern set, every frame size of the sweep,
//! every pattern of the set. Each combination gets a warm-up run and a measurement run on a
//! fresh set of streams; only the measurement run is persisted.

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, MirrorBenchConfig, SpeedPattern};
use crate::db::StoreError;
use crate::db::services::{self, PersistedRun};
use crate::generator::PacketGenerator;
use crate::generator::simulated::SimulatedGenerator;
use crate::measurement::{
    InterfaceStatistics, MacAddr, MeasurementError, PortCatalog, RunAborted, RunSequencer,
    TransmitPortConfig,
};

/// Pause between the warm-up run and the measurement run.
pub const WARMUP_PAUSE: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Measurement(#[from] MeasurementError),
    #[error(transparent)]
    Aborted(#[from] RunAborted),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Invalid or unknown speed pattern name '{0}'")]
    UnknownPatternSet(String),
}

/// Where the records of each measurement run end up.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn persist_run(
        &self,
        device_name: &str,
        measurement_name: &str,
        duration_secs: u64,
        frame_len: u32,
        records: &[InterfaceStatistics],
    ) -> Result<PersistedRun, StoreError>;
}

#[async_trait]
impl RunStore for DatabaseConnection {
    async fn persist_run(
        &self,
        device_name: &str,
        measurement_name: &str,
        duration_secs: u64,
        frame_len: u32,
        records: &[InterfaceStatistics],
    ) -> Result<PersistedRun, StoreError> {
        services::persist_run(self, device_name, measurement_name, duration_secs, frame_len, records)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub device_name: String,
    /// Run only this set; all sets when `None`.
    pub pattern_set: Option<String>,
    pub verbose: bool,
}

/// Transmit configuration for one speed pattern.
///
/// Entry `i` of the pattern drives transmit interface `i`. The first interface sends to the
/// second one, every other interface sends to the first.
pub fn transmit_configs_for_pattern(
    config: &MirrorBenchConfig,
    pattern: &[u64],
    frame_len: u32,
) -> Result<Vec<TransmitPortConfig>, ConfigError> {
    let interfaces = &config.transmit_interfaces;
    if interfaces.len() < 2 || pattern.len() > interfaces.len() {
        return Err(ConfigError::Invalid(format!(
            "speed pattern {pattern:?} does not fit {} transmit interfaces",
            interfaces.len()
        )));
    }

    pattern
        .iter()
        .zip(interfaces)
        .enumerate()
        .map(|(idx, (&speed_mbit, name))| {
            let peer = if idx == 0 { &interfaces[1] } else { &interfaces[0] };
            Ok(TransmitPortConfig::new(
                name.clone(),
                config.is_mirrored(name),
                config.mac_of(name)?,
                config.mac_of(peer)?,
                frame_len,
                speed_mbit,
            ))
        })
        .collect()
}

/// The sets to run, in configuration order.
pub fn select_pattern_sets<'a>(
    config: &'a MirrorBenchConfig,
    selected: Option<&str>,
) -> Result<Vec<(&'a str, &'a [SpeedPattern])>, SweepError> {
    match selected {
        Some(name) => config
            .speed_pattern_sets
            .get_key_value(name)
            .map(|(name, patterns)| vec![(name.as_str(), patterns.as_slice())])
            .ok_or_else(|| SweepError::UnknownPatternSet(name.to_string())),
        None => Ok(config
            .speed_pattern_sets
            .iter()
            .map(|(name, patterns)| (name.as_str(), patterns.as_slice()))
            .collect()),
    }
}

/// An in-process generator wired like the configured bench: one port per transmit interface
/// (with its configured MAC) followed by the capture port.
pub fn simulated_generator(config: &MirrorBenchConfig) -> SimulatedGenerator {
    let mut builder = SimulatedGenerator::builder();
    for name in &config.transmit_interfaces {
        let mac = config
            .interface_macs
            .get(name)
            .copied()
            .unwrap_or(MacAddr::from_u64(0));
        builder = builder.port(name.clone(), mac);
    }
    let capture_mac = config
        .interface_macs
        .get(&config.capture_interface)
        .copied()
        // locally administered, never a stream destination
        .unwrap_or(MacAddr([0x02, 0, 0, 0, 0, 0x01]));
    builder.port(config.capture_interface.clone(), capture_mac).build()
}

/// Runs the whole sweep and persists every measurement run. Stops at the first failure.
pub async fn run_sweep<G, S>(
    generator: G,
    config: &MirrorBenchConfig,
    store: &S,
    options: &SweepOptions,
) -> Result<Vec<PersistedRun>, SweepError>
where
    G: PacketGenerator,
    S: RunStore + ?Sized,
{
    let sets = select_pattern_sets(config, options.pattern_set.as_deref())?;
    let catalog = PortCatalog::discover(&generator).await?;
    let mut generator = generator;
    let mut persisted = Vec::new();

    for (set_name, patterns) in sets {
        info!(set = set_name, patterns = patterns.len(), "Starting speed pattern set.");

        for &frame_len in &config.frame_sizes {
            for pattern in patterns {
                if options.verbose {
                    info!(set = set_name, frame_len, pattern = ?pattern, "Measuring pattern.");
                } else {
                    debug!(set = set_name, frame_len, pattern = ?pattern, "Measuring pattern.");
                }

                let mut sequencer = RunSequencer::new(
                    generator,
                    catalog.clone(),
                    &config.capture_interface,
                    config.accepted_tx_diff,
                )?;
                for port in transmit_configs_for_pattern(config, pattern, frame_len)? {
                    sequencer.add_transmit_port(port)?;
                }

                sequencer.run(config.warmup_secs).await?;
                tokio::time::sleep(WARMUP_PAUSE).await;
                let records = sequencer.run(config.measure_secs).await?;

                if options.verbose {
                    for record in records {
                        info!("{record}");
                    }
                }

                persisted.push(
                    store
                        .persist_run(
                            &options.device_name,
                            set_name,
                            config.measure_secs,
                            frame_len,
                            records,
                        )
                        .await?,
                );
                generator = sequencer.into_generator();
            }
        }
    }
    Ok(persisted)
}
