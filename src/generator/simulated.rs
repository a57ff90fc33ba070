//! In-process packet generator.
//!
//! Models just enough of a drone to exercise the measurement engine without hardware: ports with
//! counters, per-port streams, capture mirroring and MAC based delivery between ports. Every call
//! is recorded together with the (tokio) time it was made.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

use super::{
    GeneratorError, PacketGenerator, PortCounters, PortDescriptor, PortId, StreamHandle,
    StreamSpec,
};
use crate::measurement::mac::MacAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorCall {
    ListPorts,
    StreamIds(PortId),
    CreateStream(PortId),
    DeleteStream(StreamHandle),
    ConfigureStream(StreamHandle),
    ClearStats(Vec<PortId>),
    StartCapture(Vec<PortId>),
    StopCapture(Vec<PortId>),
    StartTransmit(Vec<PortId>),
    StopTransmit(Vec<PortId>),
    GetStats(Vec<PortId>),
}

impl GeneratorCall {
    pub fn method(&self) -> &'static str {
        match self {
            GeneratorCall::ListPorts => "list_ports",
            GeneratorCall::StreamIds(_) => "stream_ids",
            GeneratorCall::CreateStream(_) => "create_stream",
            GeneratorCall::DeleteStream(_) => "delete_stream",
            GeneratorCall::ConfigureStream(_) => "configure_stream",
            GeneratorCall::ClearStats(_) => "clear_stats",
            GeneratorCall::StartCapture(_) => "start_capture",
            GeneratorCall::StopCapture(_) => "stop_capture",
            GeneratorCall::StartTransmit(_) => "start_transmit",
            GeneratorCall::StopTransmit(_) => "stop_transmit",
            GeneratorCall::GetStats(_) => "get_stats",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub at: Instant,
    pub call: GeneratorCall,
}

#[derive(Debug)]
struct SimPort {
    name: String,
    mac: MacAddr,
    streams: BTreeMap<u32, Option<StreamSpec>>,
    counters: PortCounters,
    capturing: bool,
}

#[derive(Debug, Default)]
struct State {
    ports: BTreeMap<PortId, SimPort>,
    next_stream_id: u32,
    calls: Vec<CallRecord>,
    transmit_skew: HashMap<String, i64>,
    capture_loss: HashMap<String, u64>,
    fail_on: Option<&'static str>,
}

impl State {
    fn record(&mut self, call: GeneratorCall) -> Result<(), GeneratorError> {
        let method = call.method();
        self.calls.push(CallRecord {
            at: Instant::now(),
            call,
        });
        if self.fail_on == Some(method) {
            return Err(GeneratorError::Injected(method));
        }
        Ok(())
    }

    fn port_mut(&mut self, id: PortId) -> Result<&mut SimPort, GeneratorError> {
        self.ports.get_mut(&id).ok_or(GeneratorError::UnknownPort(id))
    }

    fn check_ports(&self, ports: &[PortId]) -> Result<(), GeneratorError> {
        match ports.iter().find(|id| !self.ports.contains_key(id)) {
            Some(id) => Err(GeneratorError::UnknownPort(*id)),
            None => Ok(()),
        }
    }

    fn transmit(&mut self, source: PortId) {
        let Some(port) = self.ports.get(&source) else {
            return;
        };
        let skew = self.transmit_skew.get(&port.name).copied().unwrap_or(0);
        let bursts: Vec<(u64, u64, MacAddr)> = port
            .streams
            .values()
            .flatten()
            .map(|spec| {
                (
                    spec.packet_count.saturating_add_signed(skew),
                    u64::from(spec.frame_len),
                    spec.dst_mac,
                )
            })
            .collect();

        for (frames, frame_len, dst_mac) in bursts {
            for (id, port) in self.ports.iter_mut() {
                if *id == source {
                    port.counters.tx_frames += frames;
                    port.counters.tx_bytes += frames * frame_len;
                    continue;
                }
                let mut delivered = 0;
                if port.mac == dst_mac {
                    delivered = frames;
                }
                if port.capturing {
                    let loss = self.capture_loss.get(&port.name).copied().unwrap_or(0);
                    delivered = frames.saturating_sub(loss);
                }
                if delivered > 0 {
                    port.counters.rx_frames += delivered;
                    port.counters.rx_bytes += delivered * frame_len;
                }
            }
        }
    }
}

pub struct SimulatedGenerator {
    state: Mutex<State>,
}

#[derive(Default)]
pub struct SimulatedGeneratorBuilder {
    state: State,
}

impl SimulatedGeneratorBuilder {
    /// Adds a port; ids are assigned in insertion order starting at 0.
    pub fn port(mut self, name: impl Into<String>, mac: MacAddr) -> Self {
        let id = PortId(self.state.ports.len() as u32);
        self.state.ports.insert(
            id,
            SimPort {
                name: name.into(),
                mac,
                streams: BTreeMap::new(),
                counters: PortCounters::default(),
                capturing: false,
            },
        );
        self
    }

    /// Every stream on `name` emits `frames` more (or, if negative, fewer) frames than configured.
    pub fn transmit_skew(mut self, name: impl Into<String>, frames: i64) -> Self {
        self.state.transmit_skew.insert(name.into(), frames);
        self
    }

    /// The capture port `name` misses `frames` frames of every mirrored burst.
    pub fn capture_loss(mut self, name: impl Into<String>, frames: u64) -> Self {
        self.state.capture_loss.insert(name.into(), frames);
        self
    }

    /// Calls of `method` (see [`GeneratorCall::method`]) fail after being recorded.
    pub fn fail_on(mut self, method: &'static str) -> Self {
        self.state.fail_on = Some(method);
        self
    }

    pub fn build(mut self) -> SimulatedGenerator {
        self.state.next_stream_id = 1;
        SimulatedGenerator {
            state: Mutex::new(self.state),
        }
    }
}

impl SimulatedGenerator {
    pub fn builder() -> SimulatedGeneratorBuilder {
        SimulatedGeneratorBuilder::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.state().calls.clone()
    }

    pub fn stream_spec(&self, handle: StreamHandle) -> Option<StreamSpec> {
        self.state()
            .ports
            .get(&handle.port)
            .and_then(|port| port.streams.get(&handle.stream_id))
            .cloned()
            .flatten()
    }

    pub fn is_capturing(&self, name: &str) -> bool {
        self.state()
            .ports
            .values()
            .any(|port| port.name == name && port.capturing)
    }
}

#[async_trait]
impl PacketGenerator for SimulatedGenerator {
    async fn list_ports(&self) -> Result<Vec<PortDescriptor>, GeneratorError> {
        let mut state = self.state();
        state.record(GeneratorCall::ListPorts)?;
        Ok(state
            .ports
            .iter()
            .map(|(id, port)| PortDescriptor {
                id: *id,
                name: port.name.clone(),
            })
            .collect())
    }

    async fn stream_ids(&self, port: PortId) -> Result<Vec<StreamHandle>, GeneratorError> {
        let mut state = self.state();
        state.record(GeneratorCall::StreamIds(port))?;
        Ok(state
            .port_mut(port)?
            .streams
            .keys()
            .map(|stream_id| StreamHandle {
                port,
                stream_id: *stream_id,
            })
            .collect())
    }

    async fn create_stream(&self, port: PortId) -> Result<StreamHandle, GeneratorError> {
        let mut state = self.state();
        state.record(GeneratorCall::CreateStream(port))?;
        let stream_id = state.next_stream_id;
        state.port_mut(port)?.streams.insert(stream_id, None);
        state.next_stream_id += 1;
        Ok(StreamHandle { port, stream_id })
    }

    async fn delete_stream(&self, handle: StreamHandle) -> Result<(), GeneratorError> {
        let mut state = self.state();
        state.record(GeneratorCall::DeleteStream(handle))?;
        state
            .port_mut(handle.port)?
            .streams
            .remove(&handle.stream_id)
            .map(|_| ())
            .ok_or(GeneratorError::UnknownStream(handle))
    }

    async fn configure_stream(
        &self,
        handle: StreamHandle,
        spec: &StreamSpec,
    ) -> Result<(), GeneratorError> {
        let mut state = self.state();
        state.record(GeneratorCall::ConfigureStream(handle))?;
        let slot = state
            .port_mut(handle.port)?
            .streams
            .get_mut(&handle.stream_id)
            .ok_or(GeneratorError::UnknownStream(handle))?;
        *slot = Some(spec.clone());
        Ok(())
    }

    async fn clear_stats(&self, ports: &[PortId]) -> Result<(), GeneratorError> {
        let mut state = self.state();
        state.record(GeneratorCall::ClearStats(ports.to_vec()))?;
        state.check_ports(ports)?;
        for id in ports {
            state.port_mut(*id)?.counters = PortCounters::default();
        }
        Ok(())
    }

    async fn start_capture(&self, ports: &[PortId]) -> Result<(), GeneratorError> {
        let mut state = self.state();
        state.record(GeneratorCall::StartCapture(ports.to_vec()))?;
        state.check_ports(ports)?;
        for id in ports {
            state.port_mut(*id)?.capturing = true;
        }
        Ok(())
    }

    async fn stop_capture(&self, ports: &[PortId]) -> Result<(), GeneratorError> {
        let mut state = self.state();
        state.record(GeneratorCall::StopCapture(ports.to_vec()))?;
        state.check_ports(ports)?;
        for id in ports {
            state.port_mut(*id)?.capturing = false;
        }
        Ok(())
    }

    async fn start_transmit(&self, ports: &[PortId]) -> Result<(), GeneratorError> {
        let mut state = self.state();
        state.record(GeneratorCall::StartTransmit(ports.to_vec()))?;
        state.check_ports(ports)?;
        // streams are finite, so the whole schedule is accounted for at start
        for id in ports {
            state.transmit(*id);
        }
        Ok(())
    }

    async fn stop_transmit(&self, ports: &[PortId]) -> Result<(), GeneratorError> {
        let mut state = self.state();
        state.record(GeneratorCall::StopTransmit(ports.to_vec()))?;
        state.check_ports(ports)
    }

    async fn get_stats(
        &self,
        ports: &[PortId],
    ) -> Result<BTreeMap<PortId, PortCounters>, GeneratorError> {
        let mut state = self.state();
        state.record(GeneratorCall::GetStats(ports.to_vec()))?;
        state.check_ports(ports)?;
        Ok(ports
            .iter()
            .filter_map(|id| state.ports.get(id).map(|port| (*id, port.counters)))
            .collect())
    }
}
