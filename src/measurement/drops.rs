//! Frame loss and bandwidth figures derived from the records of one run.
//!
//! All functions are pure and reproduce the integer sums and `f64` percentages of the
//! historical data exactly: `percent = (100.0 / sent) * dropped`.

use super::stats::InterfaceStatistics;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorDrop {
    pub dropped_total: u64,
    pub dropped_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalDrop {
    pub upstream_total: u64,
    pub upstream_percent: f64,
    pub downstream_total: u64,
    pub downstream_percent: f64,
}

impl DirectionalDrop {
    pub const NONE: DirectionalDrop = DirectionalDrop {
        upstream_total: 0,
        upstream_percent: 0.0,
        downstream_total: 0,
        downstream_percent: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandwidthTotals {
    /// Configured Mbit/s of the injectors behind the mirror.
    pub upstream_mbit: u64,
    /// Configured Mbit/s of every other injector.
    pub downstream_mbit: u64,
}

impl BandwidthTotals {
    pub fn total_mbit(&self) -> u64 {
        self.upstream_mbit + self.downstream_mbit
    }
}

fn percent_of(dropped: u64, sent: u64) -> f64 {
    if sent == 0 {
        return 0.0;
    }
    (100.0 / sent as f64) * dropped as f64
}

fn injectors(records: &[InterfaceStatistics]) -> impl Iterator<Item = &InterfaceStatistics> {
    records.iter().filter(|record| !record.is_capture_port)
}

/// Frames sent by all injectors that never showed up on the capture port.
///
/// A run in which no injector sent anything reports no loss.
pub fn mirror_dropped(records: &[InterfaceStatistics]) -> MirrorDrop {
    let injector_tx_total: u64 = injectors(records).map(|record| record.tx_frames).sum();
    let mirror_rx_total: u64 = records
        .iter()
        .filter(|record| record.is_capture_port)
        .map(|record| record.rx_frames)
        .sum();

    let dropped_total = injector_tx_total.abs_diff(mirror_rx_total);
    MirrorDrop {
        dropped_total,
        dropped_percent: percent_of(dropped_total, injector_tx_total),
    }
}

/// Loss between the injectors behind the mirror (upstream senders) and the rest (downstream
/// senders), in both directions.
///
/// Without any downstream traffic there is nothing to compare and every figure is zero.
pub fn upstream_downstream_dropped(records: &[InterfaceStatistics]) -> DirectionalDrop {
    let (mut mirrored_tx, mut mirrored_rx) = (0u64, 0u64);
    let (mut other_tx, mut other_rx) = (0u64, 0u64);

    for record in injectors(records) {
        if record.is_mirrored_source {
            mirrored_tx += record.tx_frames;
            mirrored_rx += record.rx_frames;
        } else {
            other_tx += record.tx_frames;
            other_rx += record.rx_frames;
        }
    }

    if other_tx == 0 {
        return DirectionalDrop::NONE;
    }

    let upstream_total = mirrored_tx.abs_diff(other_rx);
    let downstream_total = other_tx.abs_diff(mirrored_rx);
    DirectionalDrop {
        upstream_total,
        upstream_percent: percent_of(upstream_total, mirrored_tx),
        downstream_total,
        downstream_percent: percent_of(downstream_total, other_tx),
    }
}

pub fn bandwidth_totals(records: &[InterfaceStatistics]) -> BandwidthTotals {
    injectors(records).fold(
        BandwidthTotals {
            upstream_mbit: 0,
            downstream_mbit: 0,
        },
        |mut totals, record| {
            if record.is_mirrored_source {
                totals.upstream_mbit += record.speed_mbit;
            } else {
                totals.downstream_mbit += record.speed_mbit;
            }
            totals
        },
    )
}

/// Every derived figure of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunFigures {
    pub bandwidth: BandwidthTotals,
    pub mirror: MirrorDrop,
    pub directional: DirectionalDrop,
}

impl RunFigures {
    pub fn of(records: &[InterfaceStatistics]) -> Self {
        Self {
            bandwidth: bandwidth_totals(records),
            mirror: mirror_dropped(records),
            directional: upstream_downstream_dropped(records),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::PortCounters;

    fn injector(name: &str, mirrored: bool, speed: u64, rx: u64, tx: u64) -> InterfaceStatistics {
        InterfaceStatistics::injector(
            name,
            mirrored,
            speed,
            PortCounters {
                rx_bytes: rx * 100,
                rx_frames: rx,
                tx_bytes: tx * 100,
                tx_frames: tx,
            },
        )
    }

    fn mirror(rx: u64) -> InterfaceStatistics {
        InterfaceStatistics::capture(
            "eth3",
            PortCounters {
                rx_bytes: 1022,
                rx_frames: rx,
                tx_bytes: 0,
                tx_frames: 0,
            },
        )
    }

    fn reference_run() -> Vec<InterfaceStatistics> {
        vec![
            mirror(20),
            injector("eth2", true, 5, 1, 15),
            injector("eth4", false, 10, 6, 8),
            injector("eth5", false, 15, 11, 13),
        ]
    }

    #[test]
    fn mirror_drop_of_reference_run() {
        let drop = mirror_dropped(&reference_run());
        assert_eq!(drop.dropped_total, 16);
        assert_eq!(drop.dropped_percent, 44.44444444444444);
    }

    #[test]
    fn directional_drop_of_reference_run() {
        let drop = upstream_downstream_dropped(&reference_run());
        assert_eq!(drop.upstream_total, 2);
        assert_eq!(drop.upstream_percent, 13.333333333333334);
        assert_eq!(drop.downstream_total, 20);
        assert_eq!(drop.downstream_percent, 95.23809523809524);
    }

    #[test]
    fn bandwidth_of_reference_run() {
        let totals = bandwidth_totals(&reference_run());
        assert_eq!(totals.upstream_mbit, 5);
        assert_eq!(totals.downstream_mbit, 25);
        assert_eq!(totals.total_mbit(), 30);
    }

    #[test]
    fn no_downstream_traffic_means_no_directional_drop() {
        let records = vec![
            mirror(20),
            injector("eth2", true, 5, 1, 15),
            injector("eth4", false, 0, 6, 0),
        ];
        assert_eq!(upstream_downstream_dropped(&records), DirectionalDrop::NONE);
    }

    #[test]
    fn more_frames_captured_than_sent_counts_as_loss() {
        let records = vec![mirror(40), injector("eth2", true, 5, 0, 30)];
        let drop = mirror_dropped(&records);
        assert_eq!(drop.dropped_total, 10);
        assert_eq!(drop.dropped_percent, 33.333333333333336);
    }

    #[test]
    fn silent_injectors_report_no_mirror_loss() {
        let records = vec![mirror(3), injector("eth2", true, 0, 0, 0)];
        let drop = mirror_dropped(&records);
        assert_eq!(drop.dropped_total, 3);
        assert_eq!(drop.dropped_percent, 0.0);
    }

    #[test]
    fn downstream_only_traffic_has_zero_upstream_percent() {
        let records = vec![mirror(0), injector("eth4", false, 10, 0, 50), injector("eth2", true, 0, 50, 0)];
        let drop = upstream_downstream_dropped(&records);
        assert_eq!(drop.upstream_total, 0);
        assert_eq!(drop.upstream_percent, 0.0);
        assert_eq!(drop.downstream_total, 0);
        assert_eq!(drop.downstream_percent, 0.0);
    }
}
