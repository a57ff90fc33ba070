//! Protobuf messages of the `OstProto.OstService` generator control contract.
//!
//! This is the contract `GrpcGenerator` is written against, and only the subset the measurement
//! engine uses is declared. The stream layering follows the drone's scheme: each protocol layer
//! names its kind in a nested `ProtocolId`, and its fields sit at the field number of that kind
//! (`mac` at 100, `ip4` at 301), which is how proto2 extensions appear on the wire. The fields
//! inside each layer message are this crate's own; a drone build must agree on them.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Void {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RpcStatus {
    Success = 0,
    Fail = 1,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ack {
    #[prost(enumeration = "RpcStatus", tag = "1")]
    pub status: i32,
    #[prost(string, tag = "2")]
    pub notes: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PortId {
    #[prost(uint32, tag = "1")]
    pub id: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PortIdList {
    #[prost(message, repeated, tag = "1")]
    pub port_id: ::prost::alloc::vec::Vec<PortId>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Port {
    #[prost(message, optional, tag = "1")]
    pub port_id: ::core::option::Option<PortId>,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub description: ::prost::alloc::string::String,
    #[prost(bool, tag = "4")]
    pub is_enabled: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PortConfigList {
    #[prost(message, repeated, tag = "1")]
    pub port: ::prost::alloc::vec::Vec<Port>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamId {
    #[prost(uint32, tag = "1")]
    pub id: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamIdList {
    #[prost(message, optional, tag = "1")]
    pub port_id: ::core::option::Option<PortId>,
    #[prost(message, repeated, tag = "2")]
    pub stream_id: ::prost::alloc::vec::Vec<StreamId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FrameLengthMode {
    Fixed = 0,
    Increment = 1,
    Decrement = 2,
    Random = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamCore {
    #[prost(bool, tag = "1")]
    pub is_enabled: bool,
    #[prost(enumeration = "FrameLengthMode", tag = "2")]
    pub len_mode: i32,
    #[prost(uint32, tag = "3")]
    pub frame_len: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamControl {
    #[prost(uint64, tag = "1")]
    pub num_packets: u64,
    #[prost(double, tag = "2")]
    pub packets_per_sec: f64,
}

/// Protocol numbers, which double as the field number of the layer's fields in `Protocol`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProtocolKind {
    Unspecified = 0,
    Mac = 100,
    Payload = 101,
    Eth2 = 200,
    Ip4 = 301,
    Udp = 401,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MacFields {
    #[prost(uint64, tag = "1")]
    pub src_mac: u64,
    #[prost(uint64, tag = "2")]
    pub dst_mac: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Ip4AddrMode {
    Fixed = 0,
    IncHost = 1,
    DecHost = 2,
    RandomHost = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ip4Fields {
    #[prost(fixed32, tag = "1")]
    pub src_ip: u32,
    #[prost(fixed32, tag = "2")]
    pub dst_ip: u32,
    #[prost(enumeration = "Ip4AddrMode", tag = "3")]
    pub src_ip_mode: i32,
    #[prost(enumeration = "Ip4AddrMode", tag = "4")]
    pub dst_ip_mode: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtocolId {
    #[prost(enumeration = "ProtocolKind", tag = "1")]
    pub id: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Protocol {
    #[prost(message, optional, tag = "1")]
    pub protocol_id: ::core::option::Option<ProtocolId>,
    #[prost(message, optional, tag = "100")]
    pub mac: ::core::option::Option<MacFields>,
    #[prost(message, optional, tag = "301")]
    pub ip4: ::core::option::Option<Ip4Fields>,
}

impl Protocol {
    pub fn of_kind(kind: ProtocolKind) -> Self {
        Protocol {
            protocol_id: Some(ProtocolId { id: kind as i32 }),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> Option<ProtocolKind> {
        self.protocol_id
            .as_ref()
            .and_then(|id| ProtocolKind::try_from(id.id).ok())
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Stream {
    #[prost(message, optional, tag = "1")]
    pub stream_id: ::core::option::Option<StreamId>,
    #[prost(message, optional, tag = "2")]
    pub core: ::core::option::Option<StreamCore>,
    #[prost(message, optional, tag = "3")]
    pub control: ::core::option::Option<StreamControl>,
    #[prost(message, repeated, tag = "4")]
    pub protocol: ::prost::alloc::vec::Vec<Protocol>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamConfigList {
    #[prost(message, optional, tag = "1")]
    pub port_id: ::core::option::Option<PortId>,
    #[prost(message, repeated, tag = "2")]
    pub stream: ::prost::alloc::vec::Vec<Stream>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PortStats {
    #[prost(message, optional, tag = "1")]
    pub port_id: ::core::option::Option<PortId>,
    #[prost(uint64, tag = "2")]
    pub rx_pkts: u64,
    #[prost(uint64, tag = "3")]
    pub rx_bytes: u64,
    #[prost(uint64, tag = "4")]
    pub tx_pkts: u64,
    #[prost(uint64, tag = "5")]
    pub tx_bytes: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PortStatsList {
    #[prost(message, repeated, tag = "1")]
    pub port_stats: ::prost::alloc::vec::Vec<PortStats>,
}

impl From<super::PortId> for PortId {
    fn from(value: super::PortId) -> Self {
        PortId { id: value.0 }
    }
}

impl From<&[super::PortId]> for PortIdList {
    fn from(value: &[super::PortId]) -> Self {
        PortIdList {
            port_id: value.iter().copied().map(PortId::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn bare_layer_encodes_only_its_protocol_id() {
        let bytes = Protocol::of_kind(ProtocolKind::Udp).encode_to_vec();
        // field 1 { field 1 = 401 }
        assert_eq!(bytes, [0x0a, 0x03, 0x08, 0x91, 0x03]);
    }

    #[test]
    fn mac_layer_sits_at_field_100() {
        let protocol = Protocol {
            mac: Some(MacFields {
                src_mac: 1,
                dst_mac: 2,
            }),
            ..Protocol::of_kind(ProtocolKind::Mac)
        };
        assert_eq!(
            protocol.encode_to_vec(),
            [0x0a, 0x02, 0x08, 0x64, 0xa2, 0x06, 0x04, 0x08, 0x01, 0x10, 0x02]
        );
    }

    #[test]
    fn ip4_layer_sits_at_field_301() {
        let protocol = Protocol {
            ip4: Some(Ip4Fields {
                src_ip: 0x0a00_0001,
                dst_ip: 0x0a00_0002,
                src_ip_mode: Ip4AddrMode::Fixed as i32,
                dst_ip_mode: Ip4AddrMode::Fixed as i32,
            }),
            ..Protocol::of_kind(ProtocolKind::Ip4)
        };
        assert_eq!(
            protocol.encode_to_vec(),
            [
                0x0a, 0x03, 0x08, 0xad, 0x02, // protocol_id 301
                0xea, 0x12, 0x0a, // field 301, 10 bytes
                0x0d, 0x01, 0x00, 0x00, 0x0a, // src_ip
                0x15, 0x02, 0x00, 0x00, 0x0a, // dst_ip
            ]
        );
    }

    #[test]
    fn decodes_what_it_encodes_with_kind() {
        let bytes = Protocol::of_kind(ProtocolKind::Eth2).encode_to_vec();
        let decoded = Protocol::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.kind(), Some(ProtocolKind::Eth2));
        assert_eq!(Protocol::default().kind(), None);
    }
}
