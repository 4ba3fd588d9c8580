//! ECMP 五元组哈希
//!
//! 对 IPv4 上的 TCP/UDP 帧，把 (src_ip, dst_ip, proto, src_port, dst_port)
//! 按小端打包后做 CRC-32；其他形状的帧统一返回 0，
//! 因此 ARP/ICMP 等总是落在排序后候选列表的第 0 条路径上。

use super::packet::Packet;

pub fn ecmp_hash(pkt: &Packet) -> u32 {
    let Some(ip) = pkt.ipv4() else {
        return 0;
    };
    let Some((src_port, dst_port)) = ip.l4.ports() else {
        return 0;
    };

    let mut buf = [0u8; 14];
    buf[0..4].copy_from_slice(&u32::from(ip.src).to_le_bytes());
    buf[4..8].copy_from_slice(&u32::from(ip.dst).to_le_bytes());
    buf[8..10].copy_from_slice(&(ip.protocol as u16).to_le_bytes());
    buf[10..12].copy_from_slice(&src_port.to_le_bytes());
    buf[12..14].copy_from_slice(&dst_port.to_le_bytes());
    crc32fast::hash(&buf)
}
