use thiserror::Error;

use crate::generator::{GeneratorError, PortId};

#[derive(Error, Debug)]
pub enum MeasurementError {
    #[error("Unknown or invalid port: {0}")]
    UnknownPort(String),
    #[error("Interface '{0}' is reported by more than one generator port")]
    AmbiguousPort(String),
    #[error(
        "{interface} failed to send all frames. calculated: {calculated} sent: {actual} diff: {diff}"
    )]
    TransmitMismatch {
        interface: String,
        calculated: u64,
        actual: u64,
        diff: u64,
    },
    #[error("Generator returned no counters for '{0}'")]
    MissingCounters(String),
    #[error("Generator returned counters for port {0} which was not asked for")]
    UnexpectedCounters(PortId),
    #[error("Generator RPC failed: {0}")]
    Rpc(#[from] GeneratorError),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Value not computed yet: {0}")]
    NotComputed(&'static str),
    #[error("A previous run aborted; the generator state is no longer trusted")]
    SequencerPoisoned,
}

impl MeasurementError {
    pub(crate) fn unknown_port_id(id: PortId) -> Self {
        MeasurementError::UnknownPort(format!("port id {id}"))
    }
}
