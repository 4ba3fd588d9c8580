//! Global First Fit
//!
//! 候选路径按计算出的原始顺序逐条检查（first fit，而非 best fit）：
//! 路径上每一跳都满足 `usage + demand <= capacity` 即放置，
//! 并在正反两个方向预留 `demand`。都放不下时退回 ECMP 哈希选路，
//! 不预留、不绑定。预留只增不减，流结束时不会释放。

use std::collections::HashMap;
use std::net::Ipv4Addr;

use tracing::{debug, info, trace, warn};

use super::key::{FlowKey, LinkKey, PathKey};
use crate::net::NodeName;
use crate::routing::{Path, choose_hashed};

/// 流分配表中的一项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAssignment {
    /// 本次 packet 的选路尚未完成
    Pending,
    /// 已绑定到路由集合中的第 `n` 条路径，此后不再改变
    Pinned(usize),
}

/// 一次 `assign_path` 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// 之前已绑定，直接返回
    Pinned(Path),
    /// 首次放置成功并已预留容量
    Placed(Path),
    /// 没有路径放得下，按 ECMP 超额放置
    Oversubscribed(Path),
}

impl Assignment {
    pub fn path(&self) -> &Path {
        match self {
            Assignment::Pinned(p) | Assignment::Placed(p) | Assignment::Oversubscribed(p) => p,
        }
    }

    pub fn into_path(self) -> Path {
        match self {
            Assignment::Pinned(p) | Assignment::Placed(p) | Assignment::Oversubscribed(p) => p,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GlobalFirstFit {
    capacity: f64,
    paths: HashMap<PathKey, Vec<Path>>,
    link_usage: HashMap<LinkKey, f64>,
    flows: HashMap<FlowKey, FlowAssignment>,
    /// 目的 IP -> 见过的不同流键数量（只增不减）
    fan_in: HashMap<Ipv4Addr, usize>,
}

impl Default for GlobalFirstFit {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl GlobalFirstFit {
    pub fn new(capacity: f64) -> Self {
        Self {
            capacity,
            paths: HashMap::new(),
            link_usage: HashMap::new(),
            flows: HashMap::new(),
            fan_in: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// 缓存一组候选路径，并把它们经过的每条链路（双向）登记为零占用。
    pub fn insert_paths(&mut self, key: PathKey, paths: Vec<Path>) {
        for path in &paths {
            for hop in path.windows(2) {
                let link = LinkKey::new(hop[0], hop[1]);
                self.link_usage.entry(link).or_insert(0.0);
                self.link_usage.entry(link.reverse()).or_insert(0.0);
            }
        }
        trace!(key = %key, candidates = paths.len(), "缓存路由集合");
        self.paths.insert(key, paths);
    }

    pub fn has_paths(&self, key: PathKey) -> bool {
        self.paths.contains_key(&key)
    }

    pub fn paths(&self, key: PathKey) -> Option<&[Path]> {
        self.paths.get(&key).map(Vec::as_slice)
    }

    pub fn num_path_sets(&self) -> usize {
        self.paths.len()
    }

    /// 把流标记为待定；首次见到该流键时计入目的端的扇入。
    /// 已绑定的流保持原绑定。返回是否首次见到。
    pub fn mark_pending(&mut self, flow: FlowKey) -> bool {
        if self.flows.contains_key(&flow) {
            return false;
        }
        self.flows.insert(flow, FlowAssignment::Pending);
        *self.fan_in.entry(flow.dst).or_insert(0) += 1;
        true
    }

    pub fn assignment(&self, flow: FlowKey) -> Option<FlowAssignment> {
        self.flows.get(&flow).copied()
    }

    /// 需求估计：`1 / 目的端历史上见过的不同流键数`。
    ///
    /// 这是扇入公平性的近似，不是实测速率；没有见过任何流时按 1 计。
    pub fn estimate_demand(&self, dst: Ipv4Addr) -> f64 {
        let n = self.fan_in.get(&dst).copied().unwrap_or(0).max(1);
        1.0 / n as f64
    }

    pub fn link_usage(&self, from: NodeName, to: NodeName) -> Option<f64> {
        self.link_usage.get(&LinkKey::new(from, to)).copied()
    }

    pub fn link_usages(&self) -> impl Iterator<Item = (LinkKey, f64)> + '_ {
        self.link_usage.iter().map(|(k, v)| (*k, *v))
    }

    pub fn max_link_usage(&self) -> f64 {
        self.link_usage.values().copied().fold(0.0, f64::max)
    }

    fn fits(&self, path: &[NodeName], demand: f64) -> bool {
        path.windows(2).all(|hop| {
            let used = self
                .link_usage
                .get(&LinkKey::new(hop[0], hop[1]))
                .copied()
                .unwrap_or(0.0);
            used + demand <= self.capacity
        })
    }

    fn reserve(&mut self, path: &[NodeName], demand: f64) {
        for hop in path.windows(2) {
            let link = LinkKey::new(hop[0], hop[1]);
            *self.link_usage.entry(link).or_insert(0.0) += demand;
            *self.link_usage.entry(link.reverse()).or_insert(0.0) += demand;
        }
    }

    /// 为流选出一条路径。路由集合不存在或为空时返回 `None`。
    #[tracing::instrument(skip(self), fields(flow = %flow, key = %key))]
    pub fn assign_path(
        &mut self,
        flow: FlowKey,
        key: PathKey,
        demand: f64,
        ecmp_hash: u32,
    ) -> Option<Assignment> {
        let Some(paths) = self.paths.get(&key) else {
            warn!("没有缓存的路由集合");
            return None;
        };
        if paths.is_empty() {
            warn!("路由集合为空");
            return None;
        }

        if let Some(FlowAssignment::Pinned(idx)) = self.flows.get(&flow).copied() {
            if let Some(path) = paths.get(idx) {
                trace!(idx, "沿用已绑定路径");
                return Some(Assignment::Pinned(path.clone()));
            }
        }

        let chosen = paths
            .iter()
            .position(|p| self.fits(p, demand))
            .map(|idx| (idx, paths[idx].clone()));

        if let Some((idx, path)) = chosen {
            self.reserve(&path, demand);
            self.flows.insert(flow, FlowAssignment::Pinned(idx));
            info!(idx, demand, path = ?path, "📦 GFF 放置流");
            return Some(Assignment::Placed(path));
        }

        let path = choose_hashed(paths, ecmp_hash)?.clone();
        debug!(demand, ecmp_hash, path = ?path, "没有路径放得下，退回 ECMP");
        Some(Assignment::Oversubscribed(path))
    }
}
