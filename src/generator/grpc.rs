use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info};

use super::proto;
use super::{
    GeneratorError, PacketGenerator, PortCounters, PortDescriptor, PortId, StreamHandle,
    StreamSpec,
};

const GET_PORT_ID_LIST: &str = "/OstProto.OstService/getPortIdList";
const GET_PORT_CONFIG: &str = "/OstProto.OstService/getPortConfig";
const GET_STREAM_ID_LIST: &str = "/OstProto.OstService/getStreamIdList";
const ADD_STREAM: &str = "/OstProto.OstService/addStream";
const DELETE_STREAM: &str = "/OstProto.OstService/deleteStream";
const MODIFY_STREAM: &str = "/OstProto.OstService/modifyStream";
const CLEAR_STATS: &str = "/OstProto.OstService/clearStats";
const START_CAPTURE: &str = "/OstProto.OstService/startCapture";
const STOP_CAPTURE: &str = "/OstProto.OstService/stopCapture";
const START_TRANSMIT: &str = "/OstProto.OstService/startTransmit";
const STOP_TRANSMIT: &str = "/OstProto.OstService/stopTransmit";
const GET_STATS: &str = "/OstProto.OstService/getStats";

/// Client for a drone speaking the `OstProto.OstService` control service over gRPC.
pub struct GrpcGenerator {
    channel: Channel,
    // the drone expects the caller to pick stream ids
    next_stream_id: AtomicU32,
}

impl GrpcGenerator {
    pub async fn connect(address: &str) -> Result<Self, GeneratorError> {
        let endpoint = Endpoint::from_shared(address.to_string())
            .map_err(|_| GeneratorError::InvalidAddress(address.to_string()))?;
        let channel = endpoint.connect().await?;
        info!(address, "Connected to packet generator.");

        Ok(Self {
            channel,
            next_stream_id: AtomicU32::new(1),
        })
    }

    async fn unary<Req, Resp>(&self, path: &'static str, request: Req) -> Result<Resp, GeneratorError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("Service was not ready: {e}")))?;

        debug!(path, "Generator call.");
        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = grpc
            .unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(path),
                codec,
            )
            .await?;
        Ok(response.into_inner())
    }

    async fn acked<Req>(&self, path: &'static str, request: Req) -> Result<(), GeneratorError>
    where
        Req: prost::Message + Send + Sync + 'static,
    {
        let ack: proto::Ack = self.unary(path, request).await?;
        if ack.status() != proto::RpcStatus::Success {
            return Err(GeneratorError::Rejected {
                method: path,
                notes: ack.notes,
            });
        }
        Ok(())
    }

    async fn port_list_call(
        &self,
        path: &'static str,
        ports: &[PortId],
    ) -> Result<(), GeneratorError> {
        self.acked(path, proto::PortIdList::from(ports)).await
    }
}

fn stream_message(handle: StreamHandle, spec: &StreamSpec) -> proto::StreamConfigList {
    let mut protocols = vec![
        proto::Protocol {
            mac: Some(proto::MacFields {
                src_mac: spec.src_mac.to_u64(),
                dst_mac: spec.dst_mac.to_u64(),
            }),
            ..proto::Protocol::of_kind(proto::ProtocolKind::Mac)
        },
        proto::Protocol::of_kind(proto::ProtocolKind::Eth2),
        proto::Protocol {
            ip4: Some(proto::Ip4Fields {
                src_ip: u32::from(spec.src_ip),
                dst_ip: u32::from(spec.dst_ip),
                src_ip_mode: proto::Ip4AddrMode::Fixed as i32,
                dst_ip_mode: proto::Ip4AddrMode::Fixed as i32,
            }),
            ..proto::Protocol::of_kind(proto::ProtocolKind::Ip4)
        },
    ];
    for kind in [proto::ProtocolKind::Udp, proto::ProtocolKind::Payload] {
        protocols.push(proto::Protocol::of_kind(kind));
    }

    proto::StreamConfigList {
        port_id: Some(handle.port.into()),
        stream: vec![proto::Stream {
            stream_id: Some(proto::StreamId {
                id: handle.stream_id,
            }),
            core: Some(proto::StreamCore {
                is_enabled: true,
                len_mode: proto::FrameLengthMode::Fixed as i32,
                frame_len: spec.frame_len,
            }),
            control: Some(proto::StreamControl {
                num_packets: spec.packet_count,
                packets_per_sec: spec.packets_per_sec as f64,
            }),
            protocol: protocols,
        }],
    }
}

#[async_trait]
impl PacketGenerator for GrpcGenerator {
    async fn list_ports(&self) -> Result<Vec<PortDescriptor>, GeneratorError> {
        let ids: proto::PortIdList = self.unary(GET_PORT_ID_LIST, proto::Void {}).await?;
        let configs: proto::PortConfigList = self.unary(GET_PORT_CONFIG, ids).await?;

        Ok(configs
            .port
            .into_iter()
            .filter_map(|port| {
                port.port_id.map(|id| PortDescriptor {
                    id: PortId(id.id),
                    name: port.name,
                })
            })
            .collect())
    }

    async fn stream_ids(&self, port: PortId) -> Result<Vec<StreamHandle>, GeneratorError> {
        let list: proto::StreamIdList = self
            .unary(GET_STREAM_ID_LIST, proto::PortId::from(port))
            .await?;
        Ok(list
            .stream_id
            .into_iter()
            .map(|stream| StreamHandle {
                port,
                stream_id: stream.id,
            })
            .collect())
    }

    async fn create_stream(&self, port: PortId) -> Result<StreamHandle, GeneratorError> {
        let handle = StreamHandle {
            port,
            stream_id: self.next_stream_id.fetch_add(1, Ordering::SeqCst),
        };
        let request = proto::StreamIdList {
            port_id: Some(port.into()),
            stream_id: vec![proto::StreamId {
                id: handle.stream_id,
            }],
        };
        self.acked(ADD_STREAM, request).await?;
        Ok(handle)
    }

    async fn delete_stream(&self, handle: StreamHandle) -> Result<(), GeneratorError> {
        let request = proto::StreamIdList {
            port_id: Some(handle.port.into()),
            stream_id: vec![proto::StreamId {
                id: handle.stream_id,
            }],
        };
        self.acked(DELETE_STREAM, request).await
    }

    async fn configure_stream(
        &self,
        handle: StreamHandle,
        spec: &StreamSpec,
    ) -> Result<(), GeneratorError> {
        self.acked(MODIFY_STREAM, stream_message(handle, spec)).await
    }

    async fn clear_stats(&self, ports: &[PortId]) -> Result<(), GeneratorError> {
        self.port_list_call(CLEAR_STATS, ports).await
    }

    async fn start_capture(&self, ports: &[PortId]) -> Result<(), GeneratorError> {
        self.port_list_call(START_CAPTURE, ports).await
    }

    async fn stop_capture(&self, ports: &[PortId]) -> Result<(), GeneratorError> {
        self.port_list_call(STOP_CAPTURE, ports).await
    }

    async fn start_transmit(&self, ports: &[PortId]) -> Result<(), GeneratorError> {
        self.port_list_call(START_TRANSMIT, ports).await
    }

    async fn stop_transmit(&self, ports: &[PortId]) -> Result<(), GeneratorError> {
        self.port_list_call(STOP_TRANSMIT, ports).await
    }

    async fn get_stats(
        &self,
        ports: &[PortId],
    ) -> Result<BTreeMap<PortId, PortCounters>, GeneratorError> {
        let list: proto::PortStatsList =
            self.unary(GET_STATS, proto::PortIdList::from(ports)).await?;

        let mut stats = BTreeMap::new();
        for entry in list.port_stats {
            let Some(port_id) = entry.port_id else {
                return Err(GeneratorError::Rejected {
                    method: GET_STATS,
                    notes: "port stats without port id".to_string(),
                });
            };
            stats.insert(
                PortId(port_id.id),
                PortCounters {
                    rx_bytes: entry.rx_bytes,
                    rx_frames: entry.rx_pkts,
                    tx_bytes: entry.tx_bytes,
                    tx_frames: entry.tx_pkts,
                },
            );
        }
        Ok(stats)
    }
}
