//! 控制器状态机
//!
//! 所有状态（交换机表、MAC 表、路由集合、链路占用、流分配）都由 [`Controller`]
//! 持有，事件处理函数逐个执行到底，不需要加锁。

use std::collections::HashMap;

use tracing::{debug, info, trace, warn};

use super::config::{ControllerConfig, Scheme};
use super::error::ControlError;
use super::stats::ControllerStats;
use super::switch::{Connection, SwitchHandle, Timeouts};
use crate::net::{Dpid, FlowMatch, MacAddr, NodeName, Packet, PortNo, ecmp_hash};
use crate::routing::{Path, StructuredRouting};
use crate::sched::{FlowKey, GlobalFirstFit, PathKey};
use crate::topo::{Layer, Topology};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// 还有交换机没连上，所有 packet-in 都丢弃
    WaitingForFabric,
    /// 全部交换机已连上，路由已预计算；一旦进入不再回退
    Ready,
}

/// 一次 packet-in 的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketOutcome {
    NotReady,
    Malformed,
    /// 目的 MAC 未知，已向所有主机端口泛洪 `frames` 份
    Flooded { frames: usize },
    /// 目的 MAC 已知。IPv4 帧带有安装路径；其他帧只转发不装规则。
    Forwarded {
        path: Option<Path>,
        rules_installed: usize,
    },
    NoRoute,
}

pub struct Controller {
    config: ControllerConfig,
    topo: Topology,
    state: ControllerState,
    switches: HashMap<Dpid, SwitchHandle>,
    mac_table: HashMap<MacAddr, (Dpid, PortNo)>,
    routing: Option<StructuredRouting>,
    gff: GlobalFirstFit,
    stats: ControllerStats,
}

impl Controller {
    pub fn new(topo: Topology, config: ControllerConfig) -> Self {
        let gff = GlobalFirstFit::new(config.capacity);
        Self {
            config,
            topo,
            state: ControllerState::WaitingForFabric,
            switches: HashMap::new(),
            mac_table: HashMap::new(),
            routing: None,
            gff,
            stats: ControllerStats::default(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topo
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ControllerState::Ready
    }

    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    pub fn scheduler(&self) -> &GlobalFirstFit {
        &self.gff
    }

    pub fn routing(&self) -> Option<&StructuredRouting> {
        self.routing.as_ref()
    }

    pub fn switch(&self, dpid: Dpid) -> Option<&SwitchHandle> {
        self.switches.get(&dpid)
    }

    pub fn connected_switches(&self) -> usize {
        self.switches.values().filter(|s| s.is_connected()).count()
    }

    /// 学到的 MAC 位置：(交换机, 入端口)
    pub fn mac_location(&self, mac: MacAddr) -> Option<(Dpid, PortNo)> {
        self.mac_table.get(&mac).copied()
    }

    /// 交换机连上。未知交换机被忽略；全部连上时一次性预计算路由。
    #[tracing::instrument(skip(self, ports, connection), fields(dpid = %dpid))]
    pub fn on_connection_up(
        &mut self,
        dpid: Dpid,
        ports: Vec<PortNo>,
        connection: Box<dyn Connection>,
    ) -> Result<(), ControlError> {
        info!("🔌 交换机上线");
        if !self.topo.name(dpid).is_some_and(|n| self.topo.is_switch(n)) {
            warn!("忽略未知交换机");
            self.stats.unknown_switch_events += 1;
            return Err(ControlError::UnknownSwitch(dpid));
        }

        let sw = self.switches.entry(dpid).or_insert_with(|| {
            debug!("新交换机");
            SwitchHandle::new(dpid, Vec::new())
        });
        sw.connect(connection, ports);
        if let Err(e) = sw.set_config(self.config.miss_send_len) {
            warn!(error = %e, "下发 miss_send_len 失败");
            self.stats.send_failures += 1;
        }

        let connected = self.connected_switches();
        let total = self.topo.num_switches();
        debug!(connected, total, "交换机计数");

        if self.state == ControllerState::WaitingForFabric && connected == total {
            info!(total, "✅ 所有交换机已连上");
            self.compute_all_paths();
            self.state = ControllerState::Ready;
        }
        Ok(())
    }

    /// 交换机断开。不会撤销 Ready，也不清理已缓存的路由与占用。
    #[tracing::instrument(skip(self), fields(dpid = %dpid))]
    pub fn on_connection_down(&mut self, dpid: Dpid) {
        match self.switches.get_mut(&dpid) {
            Some(sw) => {
                info!("交换机下线");
                sw.disconnect();
            }
            None => debug!("未注册的交换机下线，忽略"),
        }
    }

    /// 处理一个 packet-in。任何错误都只影响本事件。
    #[tracing::instrument(skip(self, data), fields(dpid = %dpid, len = data.len()))]
    pub fn on_packet_in(&mut self, dpid: Dpid, in_port: PortNo, data: &[u8]) -> PacketOutcome {
        self.stats.packet_ins += 1;

        if !self.is_ready() {
            info!("交换机尚未全部连上，忽略 packet-in");
            self.stats.dropped_not_ready += 1;
            return PacketOutcome::NotReady;
        }

        let pkt = match Packet::parse(data) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "丢弃无法解析的帧");
                self.stats.malformed += 1;
                return PacketOutcome::Malformed;
            }
        };
        trace!(src = %pkt.src, dst = %pkt.dst, ethertype = pkt.ethertype, "packet-in");

        self.mac_table.insert(pkt.src, (dpid, in_port));

        let Some((out_dpid, out_port)) = self.mac_location(pkt.dst) else {
            let frames = self.flood(dpid, in_port, data);
            return PacketOutcome::Flooded { frames };
        };

        let (path, rules_installed) =
            match self.install_reactive_path(dpid, out_dpid, out_port, &pkt) {
                Ok(Some((path, n))) => (Some(path), n),
                Ok(None) => (None, 0),
                Err(e) => {
                    warn!(error = %e, "无法安装路径，丢弃");
                    self.stats.no_route += 1;
                    return PacketOutcome::NoRoute;
                }
            };

        self.send_data(out_dpid, out_port, data);
        PacketOutcome::Forwarded {
            path,
            rules_installed,
        }
    }

    /// 为每对主机缓存其接入交换机之间的全部等价路径，并把经过的链路占用置零。
    fn compute_all_paths(&mut self) {
        let routing = StructuredRouting::new(&self.topo, self.config.routing);

        let mut hosts = self.topo.hosts();
        hosts.sort_by_key(|h| h.dpid());
        let attach: Vec<(NodeName, NodeName)> = hosts
            .iter()
            .filter_map(|&h| match self.topo.up_nodes(h).as_slice() {
                [sw] => Some((h, *sw)),
                other => {
                    warn!(host = %h, uplinks = other.len(), "主机应恰好连一台边缘交换机");
                    None
                }
            })
            .collect();

        for &(_, src_sw) in &attach {
            for &(_, dst_sw) in &attach {
                let key = PathKey::new(src_sw, dst_sw);
                if self.gff.has_paths(key) {
                    continue;
                }
                match routing.routes(src_sw, dst_sw) {
                    Some(paths) => self.gff.insert_paths(key, paths),
                    None => warn!(key = %key, "边缘交换机之间不可达"),
                }
            }
        }

        info!(
            hosts = attach.len(),
            path_sets = self.gff.num_path_sets(),
            "🧮 路由集合预计算完成"
        );
        self.routing = Some(routing);
        self.stats.route_computations += 1;
    }

    /// 沿选出的路径在每台交换机上安装规则。
    ///
    /// 非 IPv4 帧返回 `Ok(None)`。单跳安装失败只记日志，不回滚已装好的跳。
    fn install_reactive_path(
        &mut self,
        in_dpid: Dpid,
        out_dpid: Dpid,
        final_port: PortNo,
        pkt: &Packet,
    ) -> Result<Option<(Path, usize)>, ControlError> {
        let Some(ip) = pkt.ipv4() else {
            return Ok(None);
        };

        let in_name = self
            .topo
            .name(in_dpid)
            .ok_or(ControlError::UnknownSwitch(in_dpid))?;
        let out_name = self
            .topo
            .name(out_dpid)
            .ok_or(ControlError::UnknownSwitch(out_dpid))?;

        let flow = FlowKey::new(ip.src, ip.dst);
        let key = PathKey::new(in_name, out_name);
        let hash = ecmp_hash(pkt);

        let route = if self.config.scheme == Scheme::Gff && self.gff.has_paths(key) {
            self.gff.mark_pending(flow);
            let demand = self.gff.estimate_demand(ip.dst);
            self.gff
                .assign_path(flow, key, demand, hash)
                .map(|a| a.into_path())
        } else {
            self.routing
                .as_ref()
                .and_then(|r| r.get_route(in_name, out_name, hash))
        };
        let route = route.ok_or(ControlError::NoRoute {
            src: in_name,
            dst: out_name,
        })?;
        info!(flow = %flow, route = ?route, "选路");

        let m = FlowMatch::from_packet(pkt, None);
        let timeouts = Timeouts {
            idle: self.config.idle_timeout,
            hard: self.config.hard_timeout,
        };
        let mut installed = 0usize;
        for (i, &node) in route.iter().enumerate() {
            let out_port = match route.get(i + 1) {
                Some(&next) => match self.topo.port(node, next) {
                    Some((p, _)) => p,
                    None => {
                        let e = ControlError::MissingAdjacency { a: node, b: next };
                        warn!(error = %e, "跳过该跳");
                        self.stats.send_failures += 1;
                        continue;
                    }
                },
                None => final_port,
            };
            let node_dpid = node.dpid();
            let res = match self.switches.get_mut(&node_dpid) {
                Some(sw) => sw.install(out_port, &m, timeouts, self.config.priority),
                None => Err(ControlError::NotConnected(node_dpid)),
            };
            match res {
                Ok(()) => installed += 1,
                Err(e) => {
                    warn!(node = %node, error = %e, "安装规则失败，继续下一跳");
                    self.stats.send_failures += 1;
                }
            }
        }
        self.stats.rules_installed += installed as u64;
        Ok(Some((route, installed)))
    }

    /// 向所有边缘交换机的主机端口发一份，入交换机的入端口除外。
    fn flood(&mut self, in_dpid: Dpid, in_port: PortNo, data: &[u8]) -> usize {
        self.stats.floods += 1;
        let mut targets = Vec::new();
        for sw in self.topo.layer_nodes(Layer::Edge) {
            let sw_dpid = sw.dpid();
            for host in self.topo.down_nodes(sw) {
                let Some((sw_port, _)) = self.topo.port(sw, host) else {
                    continue;
                };
                if sw_dpid == in_dpid && sw_port == in_port {
                    continue;
                }
                targets.push((sw_dpid, sw_port));
            }
        }
        debug!(frames = targets.len(), "📢 泛洪");
        targets
            .into_iter()
            .filter(|&(dpid, port)| self.send_data(dpid, port, data))
            .count()
    }

    fn send_data(&mut self, dpid: Dpid, port: PortNo, data: &[u8]) -> bool {
        let res = match self.switches.get_mut(&dpid) {
            Some(sw) => sw.send_data(port, data),
            None => Err(ControlError::NotConnected(dpid)),
        };
        match res {
            Ok(()) => {
                self.stats.frames_out += 1;
                true
            }
            Err(e) => {
                warn!(dpid = %dpid, port, error = %e, "发送失败");
                self.stats.send_failures += 1;
                false
            }
        }
    }
}
