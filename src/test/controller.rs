use std::sync::{Arc, Mutex};

use crate::ctrl::{
    Connection, ControlError, Controller, ControllerConfig, ControllerState, PacketOutcome, Scheme,
    Timeouts,
};
use crate::net::{Dpid, FlowMatch, MacAddr, NodeName, Packet, PortNo, ecmp_hash};
use crate::routing::choose_hashed;
use crate::sched::{FlowKey, PathKey};
use crate::sim::{Outbox, OutboxConnection, SwitchCommand};
use crate::topo::fat_tree::{FatTreeOpts, FatTreeTopology, build_fat_tree};
use crate::topo::{Layer, TopologyBuilder};

fn n(pod: u8, sw: u8, host: u8) -> NodeName {
    NodeName::new(pod, sw, host)
}

struct FailingConnection;

impl Connection for FailingConnection {
    fn send_data(&mut self, _out_port: PortNo, _data: &[u8]) -> Result<(), ControlError> {
        Err(ControlError::Transport {
            dpid: Dpid(0),
            reason: "down".to_string(),
        })
    }

    fn install(
        &mut self,
        _out_port: PortNo,
        _m: &FlowMatch,
        _timeouts: Timeouts,
        _priority: u16,
    ) -> Result<(), ControlError> {
        Err(ControlError::Transport {
            dpid: Dpid(0),
            reason: "down".to_string(),
        })
    }

    fn set_config(&mut self, _miss_send_len: u16) -> Result<(), ControlError> {
        Ok(())
    }
}

struct Harness {
    fat: FatTreeTopology,
    ctrl: Controller,
    outbox: Outbox,
}

impl Harness {
    fn new(config: ControllerConfig) -> Self {
        let fat = build_fat_tree(&FatTreeOpts { k: 4 }).expect("build fat tree");
        let ctrl = Controller::new(fat.topo.clone(), config);
        Self {
            fat,
            ctrl,
            outbox: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn ready(config: ControllerConfig) -> Self {
        let mut h = Self::new(config);
        for sw in h.fat.topo.switches() {
            h.connect(sw);
        }
        h.take();
        h
    }

    fn connect(&mut self, sw: NodeName) {
        let dpid = sw.dpid();
        let conn = OutboxConnection::new(dpid, Arc::clone(&self.outbox));
        self.ctrl
            .on_connection_up(dpid, self.fat.topo.ports(sw), Box::new(conn))
            .expect("known switch");
    }

    fn take(&self) -> Vec<(Dpid, SwitchCommand)> {
        std::mem::take(&mut *self.outbox.lock().expect("outbox lock"))
    }

    /// 主机从其接入端口发一个帧
    fn host_sends(&mut self, host: NodeName, pkt: &Packet) -> PacketOutcome {
        let edge = self.fat.topo.up_nodes(host)[0];
        let (port, _) = self.fat.topo.port(edge, host).expect("host link");
        self.ctrl.on_packet_in(edge.dpid(), port, &pkt.to_bytes())
    }

    fn announce(&mut self, host: NodeName) {
        let outcome = self.host_sends(host, &Packet::arp(host.mac(), MacAddr::BROADCAST));
        assert!(matches!(outcome, PacketOutcome::Flooded { .. }));
        self.take();
    }
}

fn udp(src: NodeName, dst: NodeName, sport: u16, dport: u16) -> Packet {
    Packet::udp(src.mac(), dst.mac(), src.ip(), dst.ip(), sport, dport)
}

#[test]
fn controller_waits_for_every_switch() {
    let mut h = Harness::new(ControllerConfig::default());
    let switches = h.fat.topo.switches();
    let (last, rest) = switches.split_last().expect("switches");

    for &sw in rest {
        h.connect(sw);
    }
    assert_eq!(h.ctrl.state(), ControllerState::WaitingForFabric);
    assert!(h.ctrl.routing().is_none());
    assert_eq!(h.ctrl.scheduler().num_path_sets(), 0);

    let a = n(0, 0, 2);
    let outcome = h.host_sends(a, &Packet::arp(a.mac(), MacAddr::BROADCAST));
    assert_eq!(outcome, PacketOutcome::NotReady);
    assert_eq!(h.ctrl.mac_location(a.mac()), None);
    assert_eq!(h.ctrl.stats().dropped_not_ready, 1);

    let cmds = h.take();
    assert_eq!(cmds.len(), rest.len());
    assert!(cmds
        .iter()
        .all(|(_, c)| *c == SwitchCommand::SetConfig { miss_send_len: 2000 }));

    h.connect(*last);
    assert!(h.ctrl.is_ready());
    assert_eq!(h.ctrl.stats().route_computations, 1);
    // 8 台边缘交换机两两之间（含自身）
    assert_eq!(h.ctrl.scheduler().num_path_sets(), 64);

    // 重连不会再次计算
    h.ctrl.on_connection_down(last.dpid());
    h.connect(*last);
    assert_eq!(h.ctrl.stats().route_computations, 1);
}

#[test]
fn controller_ignores_unknown_switch() {
    let mut h = Harness::new(ControllerConfig::default());
    let conn = OutboxConnection::new(Dpid(0xdead), Arc::clone(&h.outbox));
    let err = h
        .ctrl
        .on_connection_up(Dpid(0xdead), vec![1, 2], Box::new(conn))
        .unwrap_err();
    assert!(matches!(err, ControlError::UnknownSwitch(Dpid(0xdead))));

    let host = n(0, 0, 2);
    let conn = OutboxConnection::new(host.dpid(), Arc::clone(&h.outbox));
    assert!(h.ctrl.on_connection_up(host.dpid(), vec![1], Box::new(conn)).is_err());

    assert_eq!(h.ctrl.stats().unknown_switch_events, 2);
    assert_eq!(h.ctrl.connected_switches(), 0);
    assert!(h.take().is_empty());
}

#[test]
fn controller_floods_unknown_destination_to_host_ports_only() {
    let mut h = Harness::ready(ControllerConfig::default());
    let a = n(0, 0, 2);
    let outcome = h.host_sends(a, &Packet::arp(a.mac(), MacAddr::BROADCAST));
    assert_eq!(outcome, PacketOutcome::Flooded { frames: 15 });
    assert_eq!(h.ctrl.mac_location(a.mac()), Some((n(0, 0, 1).dpid(), 1)));

    let cmds = h.take();
    assert_eq!(cmds.len(), 15);
    for (dpid, cmd) in &cmds {
        let SwitchCommand::PacketOut { port, .. } = cmd else {
            panic!("unexpected command {cmd:?}");
        };
        let sw = h.fat.topo.name(*dpid).expect("known switch");
        assert_eq!(h.fat.topo.layer(sw), Some(Layer::Edge));
        let (peer, _) = h.fat.topo.neighbor(sw, *port).expect("connected port");
        assert_eq!(h.fat.topo.layer(peer), Some(Layer::Host));
        assert!(!(sw == n(0, 0, 1) && *port == 1), "flooded back to ingress");
    }
    assert_eq!(h.ctrl.stats().floods, 1);
}

#[test]
fn controller_drops_malformed_frames() {
    let mut h = Harness::ready(ControllerConfig::default());
    let outcome = h.ctrl.on_packet_in(n(0, 0, 1).dpid(), 1, &[0u8; 5]);
    assert_eq!(outcome, PacketOutcome::Malformed);
    assert_eq!(h.ctrl.stats().malformed, 1);
    assert!(h.take().is_empty());
}

#[test]
fn controller_installs_cross_pod_path_and_forwards() {
    let mut h = Harness::ready(ControllerConfig::default());
    let (a, b) = (n(0, 0, 2), n(1, 0, 2));
    h.announce(a);
    h.announce(b);

    let outcome = h.host_sends(a, &udp(a, b, 40000, 5001));
    let PacketOutcome::Forwarded {
        path: Some(path),
        rules_installed,
    } = outcome
    else {
        panic!("expected forwarded, got {outcome:?}");
    };
    assert_eq!(rules_installed, 5);
    assert_eq!(path.len(), 5);
    assert_eq!(path.first(), Some(&n(0, 0, 1)));
    assert_eq!(path.last(), Some(&n(1, 0, 1)));

    let cmds = h.take();
    let mods: Vec<_> = cmds
        .iter()
        .filter_map(|(dpid, c)| match c {
            SwitchCommand::FlowMod {
                out_port,
                m,
                timeouts,
                priority,
            } => Some((*dpid, *out_port, *m, *timeouts, *priority)),
            _ => None,
        })
        .collect();
    assert_eq!(mods.len(), 5);
    for (i, (dpid, out_port, m, timeouts, priority)) in mods.iter().enumerate() {
        assert_eq!(*dpid, path[i].dpid());
        assert_eq!(m.in_port, None);
        assert_eq!(m.tp_dst, Some(5001));
        assert_eq!(*timeouts, Timeouts { idle: 10, hard: 0 });
        assert_eq!(*priority, 0x8000);
        let expected = match path.get(i + 1) {
            Some(&next) => h.fat.topo.port(path[i], next).unwrap().0,
            None => 1,
        };
        assert_eq!(*out_port, expected);
    }
    let last = cmds.last().expect("packet out");
    assert!(matches!(
        last,
        (dpid, SwitchCommand::PacketOut { port: 1, .. }) if *dpid == n(1, 0, 1).dpid()
    ));

    // 需求 1.0 占满整条路径
    assert_eq!(h.ctrl.scheduler().link_usage(path[0], path[1]), Some(1.0));
    assert_eq!(h.ctrl.scheduler().link_usage(path[1], path[0]), Some(1.0));
}

#[test]
fn controller_same_edge_flow_installs_single_rule() {
    let mut h = Harness::ready(ControllerConfig::default());
    let (a, b) = (n(0, 0, 2), n(0, 0, 3));
    h.announce(b);
    let outcome = h.host_sends(a, &udp(a, b, 1, 2));
    assert_eq!(
        outcome,
        PacketOutcome::Forwarded {
            path: Some(vec![n(0, 0, 1)]),
            rules_installed: 1
        }
    );
    let cmds = h.take();
    assert!(matches!(cmds[0].1, SwitchCommand::FlowMod { out_port: 2, .. }));
    assert!(matches!(cmds[1].1, SwitchCommand::PacketOut { port: 2, .. }));
}

#[test]
fn controller_second_flow_avoids_full_links() {
    let mut h = Harness::ready(ControllerConfig::default());
    let (a, c, b) = (n(0, 0, 2), n(0, 0, 3), n(1, 0, 2));
    h.announce(b);

    let first = match h.host_sends(a, &udp(a, b, 40000, 5001)) {
        PacketOutcome::Forwarded { path: Some(p), .. } => p,
        other => panic!("unexpected {other:?}"),
    };
    let second = match h.host_sends(c, &udp(c, b, 40001, 5002)) {
        PacketOutcome::Forwarded { path: Some(p), .. } => p,
        other => panic!("unexpected {other:?}"),
    };
    assert_ne!(first[1], second[1]);
    assert_eq!(
        h.ctrl.scheduler().estimate_demand(b.ip()),
        0.5,
        "two senders toward the same receiver"
    );

    // 同一流再次 packet-in 沿用原路径
    let again = match h.host_sends(a, &udp(a, b, 40000, 5001)) {
        PacketOutcome::Forwarded { path: Some(p), .. } => p,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(again, first);
}

#[test]
fn controller_forwards_known_non_ip_without_rules() {
    let mut h = Harness::ready(ControllerConfig::default());
    let (a, b) = (n(0, 0, 2), n(2, 1, 3));
    h.announce(a);
    let outcome = h.host_sends(b, &Packet::arp(b.mac(), a.mac()));
    assert_eq!(
        outcome,
        PacketOutcome::Forwarded {
            path: None,
            rules_installed: 0
        }
    );
    let cmds = h.take();
    assert_eq!(cmds.len(), 1);
    assert_eq!(cmds[0].0, n(0, 0, 1).dpid());
    assert!(matches!(cmds[0].1, SwitchCommand::PacketOut { port: 1, .. }));
}

#[test]
fn controller_ecmp_scheme_uses_hash_and_reserves_nothing() {
    let config = ControllerConfig {
        scheme: Scheme::Ecmp,
        ..ControllerConfig::default()
    };
    let mut h = Harness::ready(config);
    let (a, b) = (n(0, 0, 2), n(3, 1, 3));
    h.announce(b);

    let pkt = udp(a, b, 1234, 5001);
    let outcome = h.host_sends(a, &pkt);
    let candidates = h
        .ctrl
        .scheduler()
        .paths(PathKey::new(n(0, 0, 1), n(3, 1, 1)))
        .expect("path set")
        .to_vec();
    let expected = choose_hashed(&candidates, ecmp_hash(&pkt)).cloned();
    assert_eq!(
        outcome,
        PacketOutcome::Forwarded {
            path: expected,
            rules_installed: 5
        }
    );
    assert_eq!(h.ctrl.scheduler().max_link_usage(), 0.0);
    assert_eq!(
        h.ctrl.scheduler().assignment(FlowKey::new(a.ip(), b.ip())),
        None
    );
}

#[test]
fn controller_survives_disconnected_switch_on_path() {
    let mut h = Harness::ready(ControllerConfig::default());
    let (a, b) = (n(0, 0, 2), n(1, 0, 2));
    h.announce(b);

    h.ctrl.on_connection_down(n(1, 0, 1).dpid());
    assert!(h.ctrl.is_ready());

    let outcome = h.host_sends(a, &udp(a, b, 40000, 5001));
    assert!(matches!(
        outcome,
        PacketOutcome::Forwarded {
            path: Some(_),
            rules_installed: 4
        }
    ));
    // 末跳规则与 packet-out 都发不出去
    assert_eq!(h.ctrl.stats().send_failures, 2);
    let cmds = h.take();
    assert!(cmds.iter().all(|(d, _)| *d != n(1, 0, 1).dpid()));
}

#[test]
fn controller_counts_transport_failures_and_continues() {
    let mut h = Harness::ready(ControllerConfig::default());
    let (a, b) = (n(0, 0, 2), n(0, 1, 2));
    h.announce(b);

    let edge = n(0, 0, 1);
    h.ctrl
        .on_connection_up(edge.dpid(), h.fat.topo.ports(edge), Box::new(FailingConnection))
        .expect("known switch");

    let outcome = h.host_sends(a, &udp(a, b, 1, 2));
    assert!(matches!(
        outcome,
        PacketOutcome::Forwarded {
            path: Some(_),
            rules_installed: 2
        }
    ));
    assert_eq!(h.ctrl.stats().send_failures, 1);
}

#[test]
fn controller_drops_when_no_route_exists() {
    let (e1, e2) = (n(0, 0, 1), n(1, 0, 1));
    let (h1, h2) = (n(0, 0, 2), n(1, 0, 2));
    let mut b = TopologyBuilder::new();
    b.add_switch(e1, Layer::Edge).unwrap();
    b.add_switch(e2, Layer::Edge).unwrap();
    b.add_host(h1).unwrap();
    b.add_host(h2).unwrap();
    b.add_link(e1, h1).unwrap();
    b.add_link(e2, h2).unwrap();
    let topo = b.build();

    let outbox: Outbox = Arc::new(Mutex::new(Vec::new()));
    let mut ctrl = Controller::new(topo, ControllerConfig::default());
    for sw in [e1, e2] {
        let conn = OutboxConnection::new(sw.dpid(), Arc::clone(&outbox));
        ctrl.on_connection_up(sw.dpid(), vec![1], Box::new(conn))
            .unwrap();
    }
    assert!(ctrl.is_ready());

    ctrl.on_packet_in(e2.dpid(), 1, &Packet::arp(h2.mac(), MacAddr::BROADCAST).to_bytes());
    outbox.lock().unwrap().clear();

    let outcome = ctrl.on_packet_in(e1.dpid(), 1, &udp(h1, h2, 1, 2).to_bytes());
    assert_eq!(outcome, PacketOutcome::NoRoute);
    assert_eq!(ctrl.stats().no_route, 1);
    assert!(outbox.lock().unwrap().is_empty());
}
