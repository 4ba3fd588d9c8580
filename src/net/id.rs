//! 标识符类型
//!
//! 定义交换机/主机的结构化名字、DPID、端口号与 MAC 地址。

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::packet::PacketError;

/// 传输层分配的交换机标识符（datapath id）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dpid(pub u64);

impl fmt::Display for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 与 OpenFlow 工具一致：00-00-00-01-02-03
        let b = self.0.to_be_bytes();
        write!(
            f,
            "{:02x}-{:02x}-{:02x}-{:02x}-{:02x}-{:02x}",
            b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

/// 交换机端口号
pub type PortNo = u16;

/// 节点在 fabric 中的结构化位置：(pod, sw, host)。
///
/// 主机为 `(pod, edge, 2..)`，交换机的 `host` 字段固定为 1。
/// 名字打印为 `pod_sw_host`，与 DPID 一一对应。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeName {
    pub pod: u8,
    pub sw: u8,
    pub host: u8,
}

impl NodeName {
    pub const fn new(pod: u8, sw: u8, host: u8) -> Self {
        Self { pod, sw, host }
    }

    pub fn dpid(&self) -> Dpid {
        Dpid(((self.pod as u64) << 16) | ((self.sw as u64) << 8) | self.host as u64)
    }

    pub fn from_dpid(dpid: Dpid) -> Self {
        Self {
            pod: ((dpid.0 >> 16) & 0xff) as u8,
            sw: ((dpid.0 >> 8) & 0xff) as u8,
            host: (dpid.0 & 0xff) as u8,
        }
    }

    /// 主机的 MAC：DPID 的 6 字节大端编码
    pub fn mac(&self) -> MacAddr {
        let b = self.dpid().0.to_be_bytes();
        MacAddr([b[2], b[3], b[4], b[5], b[6], b[7]])
    }

    /// 主机的 IPv4：10.pod.sw.host
    pub fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::new(10, self.pod, self.sw, self.host)
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.pod, self.sw, self.host)
    }
}

impl FromStr for NodeName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split('_')
            .map(|p| p.parse::<u8>().map_err(|e| format!("bad node name {s:?}: {e}")))
            .collect::<Result<Vec<_>, _>>()?;
        match parts.as_slice() {
            [pod, sw, host] => Ok(NodeName::new(*pod, *sw, *host)),
            _ => Err(format!("bad node name {s:?}: expected pod_sw_host")),
        }
    }
}

/// 以太网地址
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    pub(crate) fn from_slice(b: &[u8]) -> Result<Self, PacketError> {
        let arr: [u8; 6] = b
            .get(..6)
            .and_then(|s| s.try_into().ok())
            .ok_or(PacketError::Truncated { layer: "ethernet", need: 6, have: b.len() })?;
        Ok(MacAddr(arr))
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}
