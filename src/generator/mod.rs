//! Control surface of the remote packet generator.
//!
//! The measurement engine never talks to a wire protocol directly. It drives any
//! [`PacketGenerator`] implementation: the tonic client in [`grpc`] for a real drone,
//! or the in-process [`simulated`] generator used for dry runs and tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

use crate::measurement::mac::MacAddr;

pub mod grpc;
pub mod proto;
pub mod simulated;

/// Generator-assigned identifier of a physical port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub u32);

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A port as reported by the generator's port listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    pub id: PortId,
    pub name: String,
}

/// Identifies one stream on one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamHandle {
    pub port: PortId,
    pub stream_id: u32,
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.stream_id)
    }
}

/// Everything the generator needs to emit one fixed-length UDP/IPv4 stream.
///
/// The IPv4 pair is fixed (no incrementing host part) and the frame length mode is fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSpec {
    pub frame_len: u32,
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub packet_count: u64,
    pub packets_per_sec: u64,
}

/// Raw counters of one port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortCounters {
    pub rx_bytes: u64,
    pub rx_frames: u64,
    pub tx_bytes: u64,
    pub tx_frames: u64,
}

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Invalid generator address '{0}'")]
    InvalidAddress(String),
    #[error("Generator transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("Generator call failed: {0}")]
    Status(#[from] tonic::Status),
    #[error("Generator rejected {method}: {notes}")]
    Rejected { method: &'static str, notes: String },
    #[error("Generator does not know port {0}")]
    UnknownPort(PortId),
    #[error("Generator does not know stream {0}")]
    UnknownStream(StreamHandle),
    #[error("Injected failure in {0}")]
    Injected(&'static str),
}

/// The operations the measurement engine needs from a packet generator.
///
/// All calls are awaited one after another by the engine; implementations do not have to
/// support concurrent use of the same port set.
#[async_trait]
pub trait PacketGenerator: Send + Sync {
    async fn list_ports(&self) -> Result<Vec<PortDescriptor>, GeneratorError>;

    /// Streams currently defined on `port`. An empty list is not an error.
    async fn stream_ids(&self, port: PortId) -> Result<Vec<StreamHandle>, GeneratorError>;

    async fn create_stream(&self, port: PortId) -> Result<StreamHandle, GeneratorError>;

    async fn delete_stream(&self, handle: StreamHandle) -> Result<(), GeneratorError>;

    async fn configure_stream(
        &self,
        handle: StreamHandle,
        spec: &StreamSpec,
    ) -> Result<(), GeneratorError>;

    async fn clear_stats(&self, ports: &[PortId]) -> Result<(), GeneratorError>;

    async fn start_capture(&self, ports: &[PortId]) -> Result<(), GeneratorError>;

    async fn stop_capture(&self, ports: &[PortId]) -> Result<(), GeneratorError>;

    async fn start_transmit(&self, ports: &[PortId]) -> Result<(), GeneratorError>;

    async fn stop_transmit(&self, ports: &[PortId]) -> Result<(), GeneratorError>;

    async fn get_stats(
        &self,
        ports: &[PortId],
    ) -> Result<BTreeMap<PortId, PortCounters>, GeneratorError>;
}
