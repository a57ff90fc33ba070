use tracing::error;

use super::catalog::{PortCatalog, PortRef};
use super::error::MeasurementError;
use super::stats::InterfaceStatistics;
use super::stream_builder::StreamBuilder;
use crate::generator::PacketGenerator;

/// Pulls the counters of a finished run and turns them into statistics records.
///
/// Every transmit port must have sent its calculated frame total within `accepted_tx_diff`
/// frames. The first port outside that tolerance aborts the collection and nothing is returned.
/// Capture ports are never validated. Records follow the order in which the transmit ports were
/// added, the capture record comes last.
pub async fn collect_statistics<G: PacketGenerator + ?Sized>(
    generator: &G,
    catalog: &PortCatalog,
    transmit: &StreamBuilder,
    capture: &PortRef,
    accepted_tx_diff: u64,
) -> Result<Vec<InterfaceStatistics>, MeasurementError> {
    let mut records = Vec::with_capacity(transmit.ports().len() + 1);
    let mut sent = generator.get_stats(&transmit.port_ids()).await?;

    for config in transmit.ports() {
        let port = config.port()?;
        let counters = sent
            .remove(&port.id)
            .ok_or_else(|| MeasurementError::MissingCounters(config.interface_name.clone()))?;
        let calculated = config.frames_total()?;
        let diff = calculated.abs_diff(counters.tx_frames);

        if diff > accepted_tx_diff {
            error!(
                interface = %config.interface_name,
                calculated,
                sent = counters.tx_frames,
                diff,
                "Port failed to send all frames."
            );
            return Err(MeasurementError::TransmitMismatch {
                interface: config.interface_name.clone(),
                calculated,
                actual: counters.tx_frames,
                diff,
            });
        }

        records.push(InterfaceStatistics::injector(
            config.interface_name.clone(),
            config.is_mirrored_source,
            config.speed_mbit,
            counters,
        ));
    }

    let mut captured = generator.get_stats(std::slice::from_ref(&capture.id)).await?;
    let counters = captured
        .remove(&capture.id)
        .ok_or_else(|| MeasurementError::MissingCounters(capture.name.clone()))?;
    if let Some(&extra) = captured.keys().next() {
        return Err(MeasurementError::UnexpectedCounters(extra));
    }
    records.push(InterfaceStatistics::capture(catalog.name_of(capture.id)?, counters));

    Ok(records)
}
