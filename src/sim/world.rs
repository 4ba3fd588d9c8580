//! 控制器世界
//!
//! 薄传输适配层：把模拟的连接事件与到达交换机的帧翻译成对
//! [`Controller`] 的 `on_connection_up` / `on_connection_down` / `on_packet_in` 调用，
//! 并执行控制器发回的命令。

use std::sync::{Arc, Mutex};

use tracing::{debug, info, trace, warn};

use super::event::Event;
use super::fabric::{Fabric, Outbox, OutboxConnection, SwitchCommand};
use super::simulator::Simulator;
use super::time::SimTime;
use crate::ctrl::{Controller, PacketOutcome};
use crate::net::{Dpid, FlowMatch, NodeName, Packet, PortNo};
use crate::topo::Layer;

/// 一次 packet-in 的记录
#[derive(Debug, Clone)]
pub struct PacketInRecord {
    pub at: SimTime,
    pub dpid: Dpid,
    pub in_port: PortNo,
    pub packet: Option<Packet>,
    pub outcome: PacketOutcome,
}

pub struct ControllerWorld {
    pub controller: Controller,
    pub fabric: Fabric,
    pub hop_latency: SimTime,
    pub packet_ins: Vec<PacketInRecord>,
    outbox: Outbox,
}

impl ControllerWorld {
    pub fn new(controller: Controller) -> Self {
        Self {
            controller,
            fabric: Fabric::default(),
            hop_latency: SimTime::from_micros(1),
            packet_ins: Vec::new(),
            outbox: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn switch_up(&mut self, sim: &mut Simulator, dpid: Dpid) {
        let topo = self.controller.topology();
        let ports = topo.name(dpid).map(|n| topo.ports(n)).unwrap_or_default();
        let conn = OutboxConnection::new(dpid, Arc::clone(&self.outbox));
        if let Err(e) = self.controller.on_connection_up(dpid, ports, Box::new(conn)) {
            debug!(error = %e, "连接事件被控制器拒绝");
        }
        self.drain(sim);
    }

    /// 帧从 `in_port` 到达交换机 `node`：命中流表则转发，否则上送控制器。
    fn arrive(&mut self, sim: &mut Simulator, node: NodeName, in_port: PortNo, data: Vec<u8>) {
        let dpid = node.dpid();
        if !self.controller.switch(dpid).is_some_and(|s| s.is_connected()) {
            trace!(node = %node, "交换机离线，帧丢失");
            self.fabric.dropped += 1;
            return;
        }

        let parsed = Packet::parse(&data).ok();
        if let Some(pkt) = &parsed {
            let m = FlowMatch::from_packet(pkt, None);
            if let Some(out_port) = self.fabric.lookup(dpid, &m, in_port, sim.now()) {
                trace!(node = %node, out_port, "命中流表");
                self.emit(sim, node, out_port, data);
                return;
            }
        }

        let max_len = self
            .fabric
            .miss_send_len(dpid)
            .map_or(data.len(), |l| l as usize);
        let payload = &data[..data.len().min(max_len)];
        let outcome = self.controller.on_packet_in(dpid, in_port, payload);
        debug!(node = %node, in_port, outcome = ?outcome, "packet-in 处理完成");
        self.packet_ins.push(PacketInRecord {
            at: sim.now(),
            dpid,
            in_port,
            packet: parsed,
            outcome,
        });
        self.drain(sim);
    }

    /// 帧从 `node` 的 `port` 发出：送达主机或在下一跳交换机上到达。
    fn emit(&mut self, sim: &mut Simulator, node: NodeName, port: PortNo, data: Vec<u8>) {
        let topo = self.controller.topology();
        let Some((next, next_port)) = topo.neighbor(node, port) else {
            warn!(node = %node, port, "端口未连接，丢弃");
            self.fabric.dropped += 1;
            return;
        };
        if topo.layer(next) == Some(Layer::Host) {
            trace!(host = %next, "送达主机");
            self.fabric.deliver(next);
            return;
        }
        let at = sim.now().saturating_add(self.hop_latency);
        sim.schedule(
            at,
            FrameArrive {
                node: next,
                in_port: next_port,
                data,
            },
        );
    }

    /// 执行控制器在本次事件中发出的所有命令
    fn drain(&mut self, sim: &mut Simulator) {
        let cmds = match self.outbox.lock() {
            Ok(mut q) => std::mem::take(&mut *q),
            Err(_) => {
                warn!("发件箱已损坏");
                return;
            }
        };
        for (dpid, cmd) in cmds {
            let Some(node) = self.controller.topology().name(dpid) else {
                continue;
            };
            match cmd {
                SwitchCommand::PacketOut { port, data } => self.emit(sim, node, port, data),
                SwitchCommand::FlowMod {
                    out_port,
                    m,
                    timeouts,
                    priority,
                } => self
                    .fabric
                    .install(dpid, m, out_port, timeouts, priority, sim.now()),
                SwitchCommand::SetConfig { miss_send_len } => {
                    self.fabric.set_miss_send_len(dpid, miss_send_len)
                }
            }
        }
    }
}

/// 交换机连上控制器
#[derive(Debug)]
pub struct SwitchUp {
    pub dpid: Dpid,
}

impl Event for SwitchUp {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut ControllerWorld) {
        world.switch_up(sim, self.dpid);
    }
}

/// 交换机与控制器断开
#[derive(Debug)]
pub struct SwitchDown {
    pub dpid: Dpid,
}

impl Event for SwitchDown {
    fn execute(self: Box<Self>, _sim: &mut Simulator, world: &mut ControllerWorld) {
        info!(dpid = %self.dpid, "⛔ 交换机断开");
        world.controller.on_connection_down(self.dpid);
    }
}

/// 主机发出一个帧，经接入链路到达其边缘交换机
#[derive(Debug)]
pub struct HostSend {
    pub host: NodeName,
    pub data: Vec<u8>,
}

impl Event for HostSend {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut ControllerWorld) {
        let HostSend { host, data } = *self;
        let topo = world.controller.topology();
        let Some((edge, edge_port)) = topo.ports(host).first().and_then(|&p| topo.neighbor(host, p))
        else {
            warn!(host = %host, "主机没有接入链路");
            return;
        };
        world.arrive(sim, edge, edge_port, data);
    }
}

/// 帧到达交换机的某个端口
#[derive(Debug)]
pub struct FrameArrive {
    pub node: NodeName,
    pub in_port: PortNo,
    pub data: Vec<u8>,
}

impl Event for FrameArrive {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut ControllerWorld) {
        let FrameArrive {
            node,
            in_port,
            data,
        } = *self;
        world.arrive(sim, node, in_port, data);
    }
}
