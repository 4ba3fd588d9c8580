//! 网络基础类型
//!
//! 节点标识、以太网帧解析、流匹配签名与 ECMP 五元组哈希。

mod ecmp;
mod flow_match;
mod id;
mod packet;

pub use ecmp::ecmp_hash;
pub use flow_match::FlowMatch;
pub use id::{Dpid, MacAddr, NodeName, PortNo};
pub use packet::{
    ETH_TYPE_ARP, ETH_TYPE_IPV4, IP_PROTO_TCP, IP_PROTO_UDP, Ipv4, L3, L4, Packet, PacketError,
};
