use crate::net::{
    ETH_TYPE_ARP, ETH_TYPE_IPV4, FlowMatch, IP_PROTO_TCP, L3, L4, MacAddr, NodeName, Packet,
    PacketError,
};

fn hosts() -> (NodeName, NodeName) {
    (NodeName::new(0, 0, 2), NodeName::new(1, 1, 3))
}

#[test]
fn packet_parses_udp_frame_fields() {
    let (a, b) = hosts();
    let raw = Packet::udp(a.mac(), b.mac(), a.ip(), b.ip(), 40000, 5001).to_bytes();
    assert_eq!(raw.len(), 14 + 20 + 8);

    let pkt = Packet::parse(&raw).expect("parse udp");
    assert_eq!(pkt.src, a.mac());
    assert_eq!(pkt.dst, b.mac());
    assert_eq!(pkt.ethertype, ETH_TYPE_IPV4);
    let ip = pkt.ipv4().expect("ipv4");
    assert_eq!(ip.src, a.ip());
    assert_eq!(ip.dst, b.ip());
    assert_eq!(
        ip.l4,
        L4::Udp {
            src_port: 40000,
            dst_port: 5001
        }
    );
}

#[test]
fn packet_parses_tcp_ports() {
    let (a, b) = hosts();
    let raw = Packet::tcp(a.mac(), b.mac(), a.ip(), b.ip(), 1234, 80).to_bytes();
    let pkt = Packet::parse(&raw).expect("parse tcp");
    let ip = pkt.ipv4().expect("ipv4");
    assert_eq!(ip.protocol, IP_PROTO_TCP);
    assert_eq!(ip.l4.ports(), Some((1234, 80)));
}

#[test]
fn packet_parses_arp_broadcast() {
    let (a, _) = hosts();
    let raw = Packet::arp(a.mac(), MacAddr::BROADCAST).to_bytes();
    let pkt = Packet::parse(&raw).expect("parse arp");
    assert_eq!(pkt.ethertype, ETH_TYPE_ARP);
    assert_eq!(pkt.l3, L3::Arp);
    assert!(pkt.dst.is_broadcast());
    assert!(pkt.ipv4().is_none());
}

#[test]
fn packet_unknown_ethertype_is_other() {
    let (a, b) = hosts();
    let mut raw = Packet::arp(a.mac(), b.mac()).to_bytes();
    raw[12] = 0x86;
    raw[13] = 0xdd;
    let pkt = Packet::parse(&raw).expect("parse");
    assert_eq!(pkt.l3, L3::Other);
}

#[test]
fn packet_rejects_truncated_frames() {
    assert_eq!(
        Packet::parse(&[0u8; 5]),
        Err(PacketError::Truncated {
            layer: "ethernet",
            need: 14,
            have: 5
        })
    );

    let (a, b) = hosts();
    let raw = Packet::udp(a.mac(), b.mac(), a.ip(), b.ip(), 1, 2).to_bytes();
    assert!(matches!(
        Packet::parse(&raw[..20]),
        Err(PacketError::Truncated { layer: "ipv4", .. })
    ));
    assert!(matches!(
        Packet::parse(&raw[..raw.len() - 1]),
        Err(PacketError::Truncated { layer: "udp", .. })
    ));

    let arp = Packet::arp(a.mac(), b.mac()).to_bytes();
    assert!(matches!(
        Packet::parse(&arp[..20]),
        Err(PacketError::Truncated { layer: "arp", .. })
    ));
}

#[test]
fn packet_rejects_bad_ip_header() {
    let (a, b) = hosts();
    let mut raw = Packet::udp(a.mac(), b.mac(), a.ip(), b.ip(), 1, 2).to_bytes();
    raw[14] = 0x65;
    assert_eq!(Packet::parse(&raw), Err(PacketError::BadIpVersion(6)));
    raw[14] = 0x44;
    assert_eq!(Packet::parse(&raw), Err(PacketError::BadIpHeaderLen(16)));
}

#[test]
fn flow_match_wildcards_in_port_when_none() {
    let (a, b) = hosts();
    let pkt = Packet::udp(a.mac(), b.mac(), a.ip(), b.ip(), 7, 9);
    let rule = FlowMatch::from_packet(&pkt, None);
    assert_eq!(rule.tp_src, Some(7));
    assert_eq!(rule.tp_dst, Some(9));
    assert!(rule.matches(&rule, 1));
    assert!(rule.matches(&rule, 4));

    let pinned = FlowMatch::from_packet(&pkt, Some(3));
    assert!(pinned.matches(&rule, 3));
    assert!(!pinned.matches(&rule, 1));

    let other = FlowMatch::from_packet(
        &Packet::udp(a.mac(), b.mac(), a.ip(), b.ip(), 7, 10),
        None,
    );
    assert!(!rule.matches(&other, 1));
}

#[test]
fn node_name_addresses_follow_position() {
    let n = NodeName::new(1, 2, 3);
    assert_eq!(n.dpid().0, 0x01_02_03);
    assert_eq!(NodeName::from_dpid(n.dpid()), n);
    assert_eq!(n.mac(), MacAddr([0, 0, 0, 1, 2, 3]));
    assert_eq!(n.ip(), std::net::Ipv4Addr::new(10, 1, 2, 3));
    assert_eq!(n.to_string(), "1_2_3");
    assert_eq!("1_2_3".parse::<NodeName>(), Ok(n));
    assert!("1_2".parse::<NodeName>().is_err());
    assert_eq!(n.dpid().to_string(), "00-00-00-01-02-03");
}
