//! 数据包类型
//!
//! 解析 packet-in 携带的原始以太网帧（Ethernet II / IPv4 / TCP / UDP / ARP），
//! 以及为模拟与测试构造原始帧。

use std::net::Ipv4Addr;

use thiserror::Error;

use super::id::MacAddr;

pub const ETH_TYPE_IPV4: u16 = 0x0800;
pub const ETH_TYPE_ARP: u16 = 0x0806;
pub const IP_PROTO_TCP: u8 = 6;
pub const IP_PROTO_UDP: u8 = 17;

const ETH_HEADER_LEN: usize = 14;
const IPV4_MIN_HEADER_LEN: usize = 20;
const ARP_LEN: usize = 28;
const UDP_HEADER_LEN: usize = 8;
const TCP_MIN_HEADER_LEN: usize = 20;

/// 帧解析错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("truncated {layer} header: need {need} bytes, have {have}")]
    Truncated {
        layer: &'static str,
        need: usize,
        have: usize,
    },
    #[error("unsupported IP version {0}")]
    BadIpVersion(u8),
    #[error("bad IPv4 header length {0}")]
    BadIpHeaderLen(usize),
}

/// 四层信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L4 {
    Tcp { src_port: u16, dst_port: u16 },
    Udp { src_port: u16, dst_port: u16 },
    Other,
}

impl L4 {
    pub fn ports(&self) -> Option<(u16, u16)> {
        match *self {
            L4::Tcp { src_port, dst_port } | L4::Udp { src_port, dst_port } => {
                Some((src_port, dst_port))
            }
            L4::Other => None,
        }
    }
}

/// IPv4 头中路由关心的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4 {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
    pub l4: L4,
}

/// 三层信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L3 {
    Ipv4(Ipv4),
    Arp,
    Other,
}

/// 解析后的以太网帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub src: MacAddr,
    pub dst: MacAddr,
    pub ethertype: u16,
    pub l3: L3,
}

impl Packet {
    /// 解析原始以太网帧。
    pub fn parse(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < ETH_HEADER_LEN {
            return Err(PacketError::Truncated {
                layer: "ethernet",
                need: ETH_HEADER_LEN,
                have: data.len(),
            });
        }
        let dst = MacAddr::from_slice(&data[0..6])?;
        let src = MacAddr::from_slice(&data[6..12])?;
        let ethertype = u16::from_be_bytes([data[12], data[13]]);
        let body = &data[ETH_HEADER_LEN..];

        let l3 = match ethertype {
            ETH_TYPE_IPV4 => L3::Ipv4(parse_ipv4(body)?),
            ETH_TYPE_ARP => {
                if body.len() < ARP_LEN {
                    return Err(PacketError::Truncated {
                        layer: "arp",
                        need: ARP_LEN,
                        have: body.len(),
                    });
                }
                L3::Arp
            }
            _ => L3::Other,
        };

        Ok(Packet {
            src,
            dst,
            ethertype,
            l3,
        })
    }

    pub fn ipv4(&self) -> Option<&Ipv4> {
        match &self.l3 {
            L3::Ipv4(ip) => Some(ip),
            _ => None,
        }
    }

    /// 构造一个 UDP 帧
    pub fn udp(
        src: MacAddr,
        dst: MacAddr,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
    ) -> Self {
        Packet {
            src,
            dst,
            ethertype: ETH_TYPE_IPV4,
            l3: L3::Ipv4(Ipv4 {
                src: src_ip,
                dst: dst_ip,
                protocol: IP_PROTO_UDP,
                l4: L4::Udp { src_port, dst_port },
            }),
        }
    }

    /// 构造一个 TCP 帧
    pub fn tcp(
        src: MacAddr,
        dst: MacAddr,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
    ) -> Self {
        Packet {
            src,
            dst,
            ethertype: ETH_TYPE_IPV4,
            l3: L3::Ipv4(Ipv4 {
                src: src_ip,
                dst: dst_ip,
                protocol: IP_PROTO_TCP,
                l4: L4::Tcp { src_port, dst_port },
            }),
        }
    }

    /// 构造一个 ARP 帧（内容清零，只保留长度）
    pub fn arp(src: MacAddr, dst: MacAddr) -> Self {
        Packet {
            src,
            dst,
            ethertype: ETH_TYPE_ARP,
            l3: L3::Arp,
        }
    }

    /// 编码为原始帧。IPv4 校验和不计算（控制器不校验）。
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&self.dst.0);
        out.extend_from_slice(&self.src.0);
        out.extend_from_slice(&self.ethertype.to_be_bytes());

        match &self.l3 {
            L3::Ipv4(ip) => {
                let l4_len = match ip.l4 {
                    L4::Tcp { .. } => TCP_MIN_HEADER_LEN,
                    L4::Udp { .. } => UDP_HEADER_LEN,
                    L4::Other => 0,
                };
                let total = (IPV4_MIN_HEADER_LEN + l4_len) as u16;
                out.push(0x45);
                out.push(0);
                out.extend_from_slice(&total.to_be_bytes());
                out.extend_from_slice(&[0, 0, 0x40, 0]);
                out.push(64);
                out.push(ip.protocol);
                out.extend_from_slice(&[0, 0]);
                out.extend_from_slice(&ip.src.octets());
                out.extend_from_slice(&ip.dst.octets());
                match ip.l4 {
                    L4::Tcp { src_port, dst_port } => {
                        out.extend_from_slice(&src_port.to_be_bytes());
                        out.extend_from_slice(&dst_port.to_be_bytes());
                        out.extend_from_slice(&[0; 8]);
                        out.push(0x50);
                        out.push(0x02);
                        out.extend_from_slice(&[0; 6]);
                    }
                    L4::Udp { src_port, dst_port } => {
                        out.extend_from_slice(&src_port.to_be_bytes());
                        out.extend_from_slice(&dst_port.to_be_bytes());
                        out.extend_from_slice(&(UDP_HEADER_LEN as u16).to_be_bytes());
                        out.extend_from_slice(&[0, 0]);
                    }
                    L4::Other => {}
                }
            }
            L3::Arp => out.extend_from_slice(&[0; ARP_LEN]),
            L3::Other => {}
        }
        out
    }
}

fn parse_ipv4(body: &[u8]) -> Result<Ipv4, PacketError> {
    if body.len() < IPV4_MIN_HEADER_LEN {
        return Err(PacketError::Truncated {
            layer: "ipv4",
            need: IPV4_MIN_HEADER_LEN,
            have: body.len(),
        });
    }
    let version = body[0] >> 4;
    if version != 4 {
        return Err(PacketError::BadIpVersion(version));
    }
    let ihl = ((body[0] & 0x0f) as usize) * 4;
    if ihl < IPV4_MIN_HEADER_LEN {
        return Err(PacketError::BadIpHeaderLen(ihl));
    }
    if body.len() < ihl {
        return Err(PacketError::Truncated {
            layer: "ipv4",
            need: ihl,
            have: body.len(),
        });
    }
    let protocol = body[9];
    let src = Ipv4Addr::new(body[12], body[13], body[14], body[15]);
    let dst = Ipv4Addr::new(body[16], body[17], body[18], body[19]);

    let rest = &body[ihl..];
    let l4 = match protocol {
        IP_PROTO_TCP | IP_PROTO_UDP => {
            let (layer, need) = if protocol == IP_PROTO_TCP {
                ("tcp", TCP_MIN_HEADER_LEN)
            } else {
                ("udp", UDP_HEADER_LEN)
            };
            if rest.len() < need {
                return Err(PacketError::Truncated {
                    layer,
                    need,
                    have: rest.len(),
                });
            }
            let src_port = u16::from_be_bytes([rest[0], rest[1]]);
            let dst_port = u16::from_be_bytes([rest[2], rest[3]]);
            if protocol == IP_PROTO_TCP {
                L4::Tcp { src_port, dst_port }
            } else {
                L4::Udp { src_port, dst_port }
            }
        }
        _ => L4::Other,
    };

    Ok(Ipv4 {
        src,
        dst,
        protocol,
        l4,
    })
}
