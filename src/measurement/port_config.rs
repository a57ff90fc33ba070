use super::catalog::PortRef;
use super::error::MeasurementError;
use super::mac::MacAddr;
use crate::generator::StreamHandle;

/// A value that only exists once a run has computed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Computed<T> {
    #[default]
    Unset,
    Value(T),
}

impl<T: Copy> Computed<T> {
    pub fn get(&self, what: &'static str) -> Result<T, MeasurementError> {
        match self {
            Computed::Value(value) => Ok(*value),
            Computed::Unset => Err(MeasurementError::NotComputed(what)),
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Computed::Value(_))
    }
}

/// One outbound interface of a run.
///
/// The identity, role and requested rate are fixed at construction. Duration, frame schedule and
/// stream handle are filled in by [`StreamBuilder::prepare`](super::stream_builder::StreamBuilder::prepare).
#[derive(Debug, Clone)]
pub struct TransmitPortConfig {
    pub interface_name: String,
    pub is_mirrored_source: bool,
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub frame_len: u32,
    /// Target rate; 0 sends a single keep-alive frame.
    pub speed_mbit: u64,
    pub(crate) port: Option<PortRef>,
    duration_secs: Computed<u64>,
    frames_per_second: Computed<u64>,
    frames_total: Computed<u64>,
    stream: Computed<StreamHandle>,
}

impl TransmitPortConfig {
    pub fn new(
        interface_name: impl Into<String>,
        is_mirrored_source: bool,
        src_mac: MacAddr,
        dst_mac: MacAddr,
        frame_len: u32,
        speed_mbit: u64,
    ) -> Self {
        Self {
            interface_name: interface_name.into(),
            is_mirrored_source,
            src_mac,
            dst_mac,
            frame_len,
            speed_mbit,
            port: None,
            duration_secs: Computed::Unset,
            frames_per_second: Computed::Unset,
            frames_total: Computed::Unset,
            stream: Computed::Unset,
        }
    }

    pub fn port(&self) -> Result<&PortRef, MeasurementError> {
        self.port
            .as_ref()
            .ok_or(MeasurementError::NotComputed("port"))
    }

    pub fn duration_secs(&self) -> Result<u64, MeasurementError> {
        self.duration_secs.get("duration")
    }

    pub fn frames_per_second(&self) -> Result<u64, MeasurementError> {
        self.frames_per_second.get("frames_per_second")
    }

    pub fn frames_total(&self) -> Result<u64, MeasurementError> {
        self.frames_total.get("frames_total")
    }

    pub fn stream(&self) -> Result<StreamHandle, MeasurementError> {
        self.stream.get("stream")
    }

    pub(crate) fn set_schedule(&mut self, duration_secs: u64, frames_per_second: u64, frames_total: u64) {
        self.duration_secs = Computed::Value(duration_secs);
        self.frames_per_second = Computed::Value(frames_per_second);
        self.frames_total = Computed::Value(frames_total);
    }

    pub(crate) fn set_stream(&mut self, stream: StreamHandle) {
        self.stream = Computed::Value(stream);
    }
}
