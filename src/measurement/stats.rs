use std::fmt;

use crate::generator::PortCounters;

/// Counters of one port observed during one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceStatistics {
    pub interface_name: String,
    pub is_capture_port: bool,
    pub is_mirrored_source: bool,
    pub speed_mbit: u64,
    pub rx_bytes: u64,
    pub rx_frames: u64,
    pub tx_bytes: u64,
    pub tx_frames: u64,
}

impl InterfaceStatistics {
    pub fn injector(
        interface_name: impl Into<String>,
        is_mirrored_source: bool,
        speed_mbit: u64,
        counters: PortCounters,
    ) -> Self {
        Self {
            interface_name: interface_name.into(),
            is_capture_port: false,
            is_mirrored_source,
            speed_mbit,
            rx_bytes: counters.rx_bytes,
            rx_frames: counters.rx_frames,
            tx_bytes: counters.tx_bytes,
            tx_frames: counters.tx_frames,
        }
    }

    pub fn capture(interface_name: impl Into<String>, counters: PortCounters) -> Self {
        Self {
            interface_name: interface_name.into(),
            is_capture_port: true,
            is_mirrored_source: false,
            speed_mbit: 0,
            rx_bytes: counters.rx_bytes,
            rx_frames: counters.rx_frames,
            tx_bytes: counters.tx_bytes,
            tx_frames: counters.tx_frames,
        }
    }
}

impl fmt::Display for InterfaceStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<7}, is_mirror: {:<1}, is_mirrored: {:<1}, speed_mbit: {:<3}, rx_bytes: {:<8}, rx_frames: {:<8}, tx_bytes: {:<8}, tx_frames: {:<8}",
            self.interface_name,
            u8::from(self.is_capture_port),
            u8::from(self.is_mirrored_source),
            self.speed_mbit,
            self.rx_bytes,
            self.rx_frames,
            self.tx_bytes,
            self.tx_frames,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_records_have_no_role_or_rate() {
        let counters = PortCounters {
            rx_bytes: 1022,
            rx_frames: 20,
            tx_bytes: 0,
            tx_frames: 0,
        };
        let record = InterfaceStatistics::capture("eth7", counters);
        assert!(record.is_capture_port);
        assert!(!record.is_mirrored_source);
        assert_eq!(record.speed_mbit, 0);
        assert_eq!(record.rx_frames, 20);
    }

    #[test]
    fn display_is_a_single_aligned_line() {
        let record = InterfaceStatistics::injector(
            "eth0",
            true,
            5,
            PortCounters {
                rx_bytes: 2,
                rx_frames: 1,
                tx_bytes: 4,
                tx_frames: 15,
            },
        );
        assert_eq!(
            record.to_string(),
            "eth0   , is_mirror: 0, is_mirrored: 1, speed_mbit: 5  , rx_bytes: 2       , rx_frames: 1       , tx_bytes: 4       , tx_frames: 15      "
        );
    }
}
