//! 流匹配签名
//!
//! 相当于 OpenFlow 1.0 的 `ofp_match.from_packet`：用触发 packet-in 的帧
//! 生成一条匹配，安装到路径上的每台交换机。入端口不同交换机各不相同，
//! 因此由调用方决定是否通配（`None`）。

use std::net::Ipv4Addr;

use serde::Serialize;

use super::id::{MacAddr, PortNo};
use super::packet::{L3, Packet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FlowMatch {
    pub in_port: Option<PortNo>,
    pub dl_src: MacAddr,
    pub dl_dst: MacAddr,
    pub dl_type: u16,
    pub nw_src: Option<Ipv4Addr>,
    pub nw_dst: Option<Ipv4Addr>,
    pub nw_proto: Option<u8>,
    pub tp_src: Option<u16>,
    pub tp_dst: Option<u16>,
}

impl FlowMatch {
    pub fn from_packet(pkt: &Packet, in_port: Option<PortNo>) -> Self {
        let mut m = FlowMatch {
            in_port,
            dl_src: pkt.src,
            dl_dst: pkt.dst,
            dl_type: pkt.ethertype,
            nw_src: None,
            nw_dst: None,
            nw_proto: None,
            tp_src: None,
            tp_dst: None,
        };
        if let L3::Ipv4(ip) = &pkt.l3 {
            m.nw_src = Some(ip.src);
            m.nw_dst = Some(ip.dst);
            m.nw_proto = Some(ip.protocol);
            if let Some((sp, dp)) = ip.l4.ports() {
                m.tp_src = Some(sp);
                m.tp_dst = Some(dp);
            }
        }
        m
    }

    /// 规则 `self` 是否命中从 `in_port` 进入的帧 `other`
    pub fn matches(&self, other: &FlowMatch, in_port: PortNo) -> bool {
        if self.in_port.is_some_and(|p| p != in_port) {
            return false;
        }
        self.dl_src == other.dl_src
            && self.dl_dst == other.dl_dst
            && self.dl_type == other.dl_type
            && self.nw_src == other.nw_src
            && self.nw_dst == other.nw_dst
            && self.nw_proto == other.nw_proto
            && self.tp_src == other.tp_src
            && self.tp_dst == other.tp_dst
    }
}
