//! The measurement engine: rate derivation, port bookkeeping, stream preparation, the run
//! sequence and the loss calculations over its results.

pub mod catalog;
pub mod collector;
pub mod drops;
pub mod error;
pub mod mac;
pub mod port_config;
pub mod rate;
pub mod sequencer;
pub mod stats;
pub mod stream_builder;

pub use catalog::{PortCatalog, PortRef};
pub use drops::{
    BandwidthTotals, DirectionalDrop, MirrorDrop, RunFigures, bandwidth_totals, mirror_dropped,
    upstream_downstream_dropped,
};
pub use error::MeasurementError;
pub use mac::MacAddr;
pub use port_config::{Computed, TransmitPortConfig};
pub use sequencer::{RunAborted, RunPhase, RunSequencer};
pub use stats::InterfaceStatistics;
pub use stream_builder::StreamBuilder;
