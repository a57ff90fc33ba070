//! Drives one measurement run against the generator.
//!
//! A run walks through a fixed sequence of phases with wall-clock settle delays between the
//! control operations. Any failure aborts the run where it happened; the generator is then left
//! in whatever state the failed call produced and the sequencer refuses to run again.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use super::catalog::{PortCatalog, PortRef};
use super::collector::collect_statistics;
use super::error::MeasurementError;
use super::port_config::TransmitPortConfig;
use super::stats::InterfaceStatistics;
use super::stream_builder::StreamBuilder;
use crate::generator::PacketGenerator;

pub const SETTLE_PRE_CAPTURE: Duration = Duration::from_secs(1);
pub const SETTLE_PRE_TRANSMIT: Duration = Duration::from_millis(500);
/// Added to the requested duration so every scheduled frame leaves before transmit is stopped.
pub const TRANSMIT_SLACK: Duration = Duration::from_secs(1);
pub const SETTLE_POST_TRANSMIT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Prepare,
    ClearStats,
    SettlePreCapture,
    CaptureStart,
    SettlePreTransmit,
    TransmitStart,
    TransmitWindow,
    TransmitStop,
    SettlePostTransmit,
    CaptureStop,
    Collect,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "IDLE",
            RunPhase::Prepare => "PREPARE",
            RunPhase::ClearStats => "CLEAR_STATS",
            RunPhase::SettlePreCapture => "SETTLE_PRE_CAPTURE",
            RunPhase::CaptureStart => "CAPTURE_START",
            RunPhase::SettlePreTransmit => "SETTLE_PRE_TRANSMIT",
            RunPhase::TransmitStart => "TRANSMIT_START",
            RunPhase::TransmitWindow => "TRANSMIT_WINDOW",
            RunPhase::TransmitStop => "TRANSMIT_STOP",
            RunPhase::SettlePostTransmit => "SETTLE_POST_TRANSMIT",
            RunPhase::CaptureStop => "CAPTURE_STOP",
            RunPhase::Collect => "COLLECT",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run that did not reach the end of the sequence. Nothing it measured is returned.
#[derive(Error, Debug)]
#[error("Run aborted in phase {phase}: {cause}")]
pub struct RunAborted {
    pub phase: RunPhase,
    #[source]
    pub cause: MeasurementError,
}

pub struct RunSequencer<G: PacketGenerator> {
    generator: G,
    catalog: PortCatalog,
    capture: PortRef,
    transmit: StreamBuilder,
    accepted_tx_diff: u64,
    phase: RunPhase,
    statistics: Vec<InterfaceStatistics>,
}

impl<G: PacketGenerator> RunSequencer<G> {
    /// Takes ownership of the generator connection; `capture_interface` must be in `catalog`.
    pub fn new(
        generator: G,
        catalog: PortCatalog,
        capture_interface: &str,
        accepted_tx_diff: u64,
    ) -> Result<Self, MeasurementError> {
        let capture = catalog.resolve(capture_interface)?;
        Ok(Self {
            generator,
            catalog,
            capture,
            transmit: StreamBuilder::new(),
            accepted_tx_diff,
            phase: RunPhase::Idle,
            statistics: Vec::new(),
        })
    }

    pub fn add_transmit_port(&mut self, config: TransmitPortConfig) -> Result<(), MeasurementError> {
        self.transmit.add_transmit_port(&self.catalog, config)
    }

    pub fn transmit_ports(&self) -> &[TransmitPortConfig] {
        self.transmit.ports()
    }

    pub fn capture_port(&self) -> &PortRef {
        &self.capture
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Records of the last successful run; empty before the first one and after an abort.
    pub fn interface_statistics(&self) -> &[InterfaceStatistics] {
        &self.statistics
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn into_generator(self) -> G {
        self.generator
    }

    /// Executes one complete run lasting roughly `duration_secs + 3` seconds.
    pub async fn run(&mut self, duration_secs: u64) -> Result<&[InterfaceStatistics], RunAborted> {
        if self.phase != RunPhase::Idle {
            return Err(RunAborted {
                phase: self.phase,
                cause: MeasurementError::SequencerPoisoned,
            });
        }
        self.statistics.clear();

        let records = self
            .drive(duration_secs)
            .await
            .map_err(|cause| RunAborted {
                phase: self.phase,
                cause,
            })?;

        self.statistics = records;
        self.enter(RunPhase::Idle);
        Ok(&self.statistics)
    }

    async fn drive(
        &mut self,
        duration_secs: u64,
    ) -> Result<Vec<InterfaceStatistics>, MeasurementError> {
        let capture = [self.capture.id];

        self.enter(RunPhase::Prepare);
        if self.transmit.ports().is_empty() {
            return Err(MeasurementError::InvalidParameter(
                "no transmit ports configured".to_string(),
            ));
        }
        self.transmit.prepare(&self.generator, duration_secs).await?;
        let transmit = self.transmit.port_ids();

        self.enter(RunPhase::ClearStats);
        self.generator.clear_stats(&transmit).await?;
        self.generator.clear_stats(&capture).await?;

        self.settle(RunPhase::SettlePreCapture, SETTLE_PRE_CAPTURE).await;

        self.enter(RunPhase::CaptureStart);
        self.generator.start_capture(&capture).await?;

        self.settle(RunPhase::SettlePreTransmit, SETTLE_PRE_TRANSMIT).await;

        self.enter(RunPhase::TransmitStart);
        self.generator.start_transmit(&transmit).await?;

        let window = Duration::from_secs(duration_secs).saturating_add(TRANSMIT_SLACK);
        self.settle(RunPhase::TransmitWindow, window).await;

        self.enter(RunPhase::TransmitStop);
        self.generator.stop_transmit(&transmit).await?;

        self.settle(RunPhase::SettlePostTransmit, SETTLE_POST_TRANSMIT).await;

        self.enter(RunPhase::CaptureStop);
        self.generator.stop_capture(&capture).await?;

        self.enter(RunPhase::Collect);
        collect_statistics(
            &self.generator,
            &self.catalog,
            &self.transmit,
            &self.capture,
            self.accepted_tx_diff,
        )
        .await
    }

    fn enter(&mut self, phase: RunPhase) {
        debug!(from = %self.phase, to = %phase, "Run phase transition.");
        self.phase = phase;
    }

    async fn settle(&mut self, phase: RunPhase, delay: Duration) {
        self.enter(phase);
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::simulated::{GeneratorCall, SimulatedGenerator, SimulatedGeneratorBuilder};
    use crate::generator::{GeneratorError, PortId};
    use crate::measurement::mac::MacAddr;
    use tokio::time::Instant;

    const MAC_A: u64 = 0x00e0ed0bdc2a;
    const MAC_B: u64 = 0x00e0ed0bdc2b;

    fn generator_builder() -> SimulatedGeneratorBuilder {
        SimulatedGenerator::builder()
            .port("eth0", MacAddr::from_u64(MAC_A))
            .port("eth1", MacAddr::from_u64(MAC_B))
            .port("eth7", MacAddr::from_u64(0x00e0ed11c7f6))
    }

    // eth0 sends 100 frames/s to eth1, eth1 sends 200 frames/s back.
    async fn sequencer(generator: SimulatedGenerator) -> RunSequencer<SimulatedGenerator> {
        let catalog = PortCatalog::discover(&generator).await.unwrap();
        let mut sequencer = RunSequencer::new(generator, catalog, "eth7", 1).unwrap();
        sequencer
            .add_transmit_port(TransmitPortConfig::new(
                "eth0",
                true,
                MacAddr::from_u64(MAC_A),
                MacAddr::from_u64(MAC_B),
                1250,
                1,
            ))
            .unwrap();
        sequencer
            .add_transmit_port(TransmitPortConfig::new(
                "eth1",
                false,
                MacAddr::from_u64(MAC_B),
                MacAddr::from_u64(MAC_A),
                1250,
                2,
            ))
            .unwrap();
        sequencer
    }

    fn control_calls(generator: &SimulatedGenerator) -> Vec<(GeneratorCall, Instant)> {
        generator
            .calls()
            .into_iter()
            .filter(|record| {
                !matches!(
                    record.call,
                    GeneratorCall::ListPorts
                        | GeneratorCall::StreamIds(_)
                        | GeneratorCall::DeleteStream(_)
                        | GeneratorCall::CreateStream(_)
                        | GeneratorCall::ConfigureStream(_)
                )
            })
            .map(|record| (record.call, record.at))
            .collect()
    }

    fn assert_gap(from: Instant, to: Instant, expected: Duration) {
        let gap = to - from;
        assert!(
            gap >= expected && gap < expected + Duration::from_millis(5),
            "expected {expected:?}, got {gap:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_issues_controls_in_order_with_settle_delays() {
        let mut sequencer = sequencer(generator_builder().build()).await;
        let started = Instant::now();

        sequencer.run(2).await.unwrap();

        assert_eq!(sequencer.phase(), RunPhase::Idle);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_millis(5050));

        let (tx, mirror) = (vec![PortId(0), PortId(1)], vec![PortId(2)]);
        let calls = control_calls(sequencer.generator());
        let methods: Vec<GeneratorCall> = calls.iter().map(|(call, _)| call.clone()).collect();
        assert_eq!(
            methods,
            vec![
                GeneratorCall::ClearStats(tx.clone()),
                GeneratorCall::ClearStats(mirror.clone()),
                GeneratorCall::StartCapture(mirror.clone()),
                GeneratorCall::StartTransmit(tx.clone()),
                GeneratorCall::StopTransmit(tx.clone()),
                GeneratorCall::StopCapture(mirror.clone()),
                GeneratorCall::GetStats(tx),
                GeneratorCall::GetStats(mirror),
            ]
        );

        assert_gap(calls[1].1, calls[2].1, SETTLE_PRE_CAPTURE);
        assert_gap(calls[2].1, calls[3].1, SETTLE_PRE_TRANSMIT);
        assert_gap(calls[3].1, calls[4].1, Duration::from_secs(3));
        assert_gap(calls[4].1, calls[5].1, SETTLE_POST_TRANSMIT);
    }

    #[tokio::test(start_paused = true)]
    async fn warm_up_then_measure_reports_only_the_second_run() {
        let mut sequencer = sequencer(generator_builder().build()).await;

        sequencer.run(1).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let records = sequencer.run(2).await.unwrap().to_vec();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].interface_name, "eth0");
        assert_eq!(records[0].tx_frames, 200);
        assert_eq!(records[0].rx_frames, 400);
        assert_eq!(records[1].interface_name, "eth1");
        assert_eq!(records[1].tx_frames, 400);
        assert_eq!(records[1].rx_frames, 200);
        assert!(records[2].is_capture_port);
        assert_eq!(records[2].rx_frames, 600);

        for port in [PortId(0), PortId(1)] {
            assert_eq!(sequencer.generator().stream_ids(port).await.unwrap().len(), 1);
        }
        assert_eq!(sequencer.transmit_ports()[1].frames_total().unwrap(), 400);
    }

    #[tokio::test(start_paused = true)]
    async fn rpc_failure_aborts_and_poisons_the_sequencer() {
        let mut sequencer = sequencer(generator_builder().fail_on("start_transmit").build()).await;

        match sequencer.run(1).await {
            Err(RunAborted {
                phase: RunPhase::TransmitStart,
                cause: MeasurementError::Rpc(GeneratorError::Injected("start_transmit")),
            }) => {}
            other => panic!("expected abort in TRANSMIT_START, got {other:?}"),
        }
        assert!(sequencer.interface_statistics().is_empty());
        assert!(sequencer.generator().is_capturing("eth7"));

        let issued = sequencer.generator().calls().len();
        assert!(matches!(
            sequencer.run(1).await,
            Err(RunAborted {
                cause: MeasurementError::SequencerPoisoned,
                ..
            })
        ));
        assert_eq!(sequencer.generator().calls().len(), issued);
    }

    #[tokio::test(start_paused = true)]
    async fn transmit_mismatch_keeps_no_records() {
        let generator = generator_builder().transmit_skew("eth1", -3).build();
        let mut sequencer = sequencer(generator).await;

        let aborted = sequencer.run(1).await.unwrap_err();
        assert_eq!(aborted.phase, RunPhase::Collect);
        assert!(matches!(
            aborted.cause,
            MeasurementError::TransmitMismatch { ref interface, diff: 3, .. } if interface == "eth1"
        ));
        assert!(sequencer.interface_statistics().is_empty());
    }

    #[tokio::test]
    async fn unknown_capture_interface_is_rejected() {
        let generator = generator_builder().build();
        let catalog = PortCatalog::discover(&generator).await.unwrap();
        assert!(matches!(
            RunSequencer::new(generator, catalog, "eth9", 1),
            Err(MeasurementError::UnknownPort(name)) if name == "eth9"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn run_without_transmit_ports_is_rejected() {
        let generator = generator_builder().build();
        let catalog = PortCatalog::discover(&generator).await.unwrap();
        let mut sequencer = RunSequencer::new(generator, catalog, "eth7", 1).unwrap();

        let aborted = sequencer.run(1).await.unwrap_err();
        assert_eq!(aborted.phase, RunPhase::Prepare);
        assert!(matches!(aborted.cause, MeasurementError::InvalidParameter(_)));
    }
}
