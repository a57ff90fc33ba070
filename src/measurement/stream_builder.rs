use std::net::Ipv4Addr;
use tracing::debug;

use super::catalog::PortCatalog;
use super::error::MeasurementError;
use super::port_config::TransmitPortConfig;
use super::rate::derive_rate;
use crate::generator::{PacketGenerator, PortId, StreamSpec};

/// Owns the transmit ports of a run and (re)builds their generator-side streams.
#[derive(Debug, Default)]
pub struct StreamBuilder {
    ports: Vec<TransmitPortConfig>,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the port of `config` and takes ownership of it for this run.
    pub fn add_transmit_port(
        &mut self,
        catalog: &PortCatalog,
        mut config: TransmitPortConfig,
    ) -> Result<(), MeasurementError> {
        let port = catalog.resolve(&config.interface_name)?;
        if self
            .ports
            .iter()
            .any(|existing| existing.port.as_ref().map(|p| p.id) == Some(port.id))
        {
            return Err(MeasurementError::InvalidParameter(format!(
                "transmit port '{}' added twice",
                config.interface_name
            )));
        }
        config.port = Some(port);
        self.ports.push(config);
        Ok(())
    }

    pub fn ports(&self) -> &[TransmitPortConfig] {
        &self.ports
    }

    pub fn port_ids(&self) -> Vec<PortId> {
        self.ports
            .iter()
            .filter_map(|config| config.port.as_ref().map(|port| port.id))
            .collect()
    }

    /// Replaces every stream on every owned port with exactly one freshly configured stream.
    ///
    /// All old streams are deleted before any new one is added, so no parameters of a previous
    /// run survive.
    pub async fn prepare<G: PacketGenerator + ?Sized>(
        &mut self,
        generator: &G,
        duration_secs: u64,
    ) -> Result<(), MeasurementError> {
        for config in &self.ports {
            let port = config.port()?.id;
            for handle in generator.stream_ids(port).await? {
                debug!(interface = %config.interface_name, stream = %handle, "Deleting stale stream.");
                generator.delete_stream(handle).await?;
            }
        }

        for config in &mut self.ports {
            prepare_stream(generator, config, duration_secs).await?;
        }
        Ok(())
    }
}

async fn prepare_stream<G: PacketGenerator + ?Sized>(
    generator: &G,
    config: &mut TransmitPortConfig,
    duration_secs: u64,
) -> Result<(), MeasurementError> {
    let port = config.port()?.id;
    let rate = derive_rate(config.speed_mbit, config.frame_len, duration_secs)?;

    let handle = generator.create_stream(port).await?;
    let spec = StreamSpec {
        frame_len: config.frame_len,
        src_mac: config.src_mac,
        dst_mac: config.dst_mac,
        src_ip: Ipv4Addr::UNSPECIFIED,
        dst_ip: Ipv4Addr::UNSPECIFIED,
        packet_count: rate.frames_total,
        packets_per_sec: rate.frames_per_second,
    };
    generator.configure_stream(handle, &spec).await?;

    config.set_schedule(duration_secs, rate.frames_per_second, rate.frames_total);
    config.set_stream(handle);

    debug!(
        interface = %config.interface_name,
        stream = %handle,
        frame_len = config.frame_len,
        speed_mbit = config.speed_mbit,
        frames_per_second = rate.frames_per_second,
        frames_total = rate.frames_total,
        "Stream prepared."
    );
    Ok(())
}
