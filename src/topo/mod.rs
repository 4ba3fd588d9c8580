//! 拓扑视图
//!
//! 对 fabric 图的只读查询接口：分层节点集合、端口对查询、名字与 DPID 的互查，
//! 以及路由引擎遍历用的 up/down 边枚举。具体形状（如 fat-tree）由 `fat_tree`
//! 等生成器通过 [`TopologyBuilder`] 构建。

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::net::{Dpid, NodeName, PortNo};

pub mod fat_tree;

/// 节点所在层级，数值越小越靠近核心
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Core = 0,
    Agg = 1,
    Edge = 2,
    Host = 3,
}

impl Layer {
    fn rank(self) -> u8 {
        self as u8
    }

    pub fn is_switch(self) -> bool {
        self != Layer::Host
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Layer::Core => "core",
            Layer::Agg => "agg",
            Layer::Edge => "edge",
            Layer::Host => "host",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("duplicate node {0}")]
    DuplicateNode(NodeName),
    #[error("unknown node {0}")]
    UnknownNode(NodeName),
    #[error("link {a} <-> {b} already exists")]
    DuplicateLink { a: NodeName, b: NodeName },
    #[error("link {a} ({la}) <-> {b} ({lb}) does not join adjacent layers")]
    LateralLink {
        a: NodeName,
        la: Layer,
        b: NodeName,
        lb: Layer,
    },
    #[error("node {0} has no free ports")]
    PortsExhausted(NodeName),
}

#[derive(Debug, Clone)]
struct NodeEntry {
    name: NodeName,
    layer: Layer,
    /// 按端口号排列的邻居：(本端端口, 邻居, 对端端口)
    ports: Vec<(PortNo, NodeName, PortNo)>,
}

/// 只读的 fabric 拓扑
#[derive(Debug, Clone, Default)]
pub struct Topology {
    nodes: Vec<NodeEntry>,
    index: HashMap<NodeName, usize>,
    by_dpid: HashMap<Dpid, NodeName>,
    links: HashMap<(NodeName, NodeName), (PortNo, PortNo)>,
}

impl Topology {
    /// 所有节点（按加入顺序）
    pub fn nodes(&self) -> impl Iterator<Item = NodeName> + '_ {
        self.nodes.iter().map(|n| n.name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: NodeName) -> bool {
        self.index.contains_key(&name)
    }

    pub fn layer(&self, name: NodeName) -> Option<Layer> {
        self.entry(name).map(|n| n.layer)
    }

    pub fn layer_nodes(&self, layer: Layer) -> Vec<NodeName> {
        self.nodes
            .iter()
            .filter(|n| n.layer == layer)
            .map(|n| n.name)
            .collect()
    }

    pub fn hosts(&self) -> Vec<NodeName> {
        self.layer_nodes(Layer::Host)
    }

    pub fn switches(&self) -> Vec<NodeName> {
        self.nodes
            .iter()
            .filter(|n| n.layer.is_switch())
            .map(|n| n.name)
            .collect()
    }

    pub fn num_switches(&self) -> usize {
        self.nodes.iter().filter(|n| n.layer.is_switch()).count()
    }

    pub fn is_switch(&self, name: NodeName) -> bool {
        self.layer(name).is_some_and(Layer::is_switch)
    }

    /// 名字 -> DPID
    pub fn dpid(&self, name: NodeName) -> Option<Dpid> {
        self.entry(name).map(|n| n.name.dpid())
    }

    /// DPID -> 名字
    pub fn name(&self, dpid: Dpid) -> Option<NodeName> {
        self.by_dpid.get(&dpid).copied()
    }

    /// `a` 与 `b` 相连时返回 (a 上的端口, b 上的端口)
    pub fn port(&self, a: NodeName, b: NodeName) -> Option<(PortNo, PortNo)> {
        self.links.get(&(a, b)).copied()
    }

    /// 节点的全部端口（升序）
    pub fn ports(&self, name: NodeName) -> Vec<PortNo> {
        self.entry(name)
            .map(|n| n.ports.iter().map(|(p, _, _)| *p).collect())
            .unwrap_or_default()
    }

    /// 从 `name` 的 `port` 出去连到的 (邻居, 邻居端口)
    pub fn neighbor(&self, name: NodeName, port: PortNo) -> Option<(NodeName, PortNo)> {
        self.entry(name)?
            .ports
            .iter()
            .find(|(p, _, _)| *p == port)
            .map(|(_, nb, nb_port)| (*nb, *nb_port))
    }

    /// 朝核心方向的邻居
    pub fn up_nodes(&self, name: NodeName) -> Vec<NodeName> {
        self.neighbors_in_layer(name, |mine, theirs| theirs + 1 == mine)
    }

    /// 朝主机方向的邻居
    pub fn down_nodes(&self, name: NodeName) -> Vec<NodeName> {
        self.neighbors_in_layer(name, |mine, theirs| mine + 1 == theirs)
    }

    pub fn up_edges(&self, name: NodeName) -> Vec<(NodeName, NodeName)> {
        self.up_nodes(name).into_iter().map(|n| (name, n)).collect()
    }

    pub fn down_edges(&self, name: NodeName) -> Vec<(NodeName, NodeName)> {
        self.down_nodes(name).into_iter().map(|n| (name, n)).collect()
    }

    fn neighbors_in_layer(&self, name: NodeName, pred: impl Fn(u8, u8) -> bool) -> Vec<NodeName> {
        let Some(entry) = self.entry(name) else {
            return Vec::new();
        };
        let mine = entry.layer.rank();
        entry
            .ports
            .iter()
            .filter(|(_, nb, _)| self.layer(*nb).is_some_and(|l| pred(mine, l.rank())))
            .map(|(_, nb, _)| *nb)
            .collect()
    }

    fn entry(&self, name: NodeName) -> Option<&NodeEntry> {
        self.index.get(&name).map(|&i| &self.nodes[i])
    }
}

/// 拓扑构建器：端口从 1 开始按连线顺序分配。
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    topo: Topology,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: NodeName, layer: Layer) -> Result<(), TopologyError> {
        if self.topo.index.contains_key(&name) {
            return Err(TopologyError::DuplicateNode(name));
        }
        self.topo.index.insert(name, self.topo.nodes.len());
        self.topo.by_dpid.insert(name.dpid(), name);
        self.topo.nodes.push(NodeEntry {
            name,
            layer,
            ports: Vec::new(),
        });
        Ok(())
    }

    pub fn add_host(&mut self, name: NodeName) -> Result<(), TopologyError> {
        self.add_node(name, Layer::Host)
    }

    pub fn add_switch(&mut self, name: NodeName, layer: Layer) -> Result<(), TopologyError> {
        self.add_node(name, layer)
    }

    /// 双向连接两个相邻层的节点，返回 (a 上的端口, b 上的端口)。
    pub fn add_link(&mut self, a: NodeName, b: NodeName) -> Result<(PortNo, PortNo), TopologyError> {
        let la = self.topo.layer(a).ok_or(TopologyError::UnknownNode(a))?;
        let lb = self.topo.layer(b).ok_or(TopologyError::UnknownNode(b))?;
        if la.rank().abs_diff(lb.rank()) != 1 {
            return Err(TopologyError::LateralLink { a, la, b, lb });
        }
        if self.topo.links.contains_key(&(a, b)) {
            return Err(TopologyError::DuplicateLink { a, b });
        }

        let pa = self.next_port(a)?;
        let pb = self.next_port(b)?;
        let ia = self.topo.index[&a];
        let ib = self.topo.index[&b];
        self.topo.nodes[ia].ports.push((pa, b, pb));
        self.topo.nodes[ib].ports.push((pb, a, pa));
        self.topo.links.insert((a, b), (pa, pb));
        self.topo.links.insert((b, a), (pb, pa));
        Ok((pa, pb))
    }

    fn next_port(&self, name: NodeName) -> Result<PortNo, TopologyError> {
        let used = self.topo.entry(name).map_or(0, |n| n.ports.len());
        PortNo::try_from(used + 1).map_err(|_| TopologyError::PortsExhausted(name))
    }

    pub fn build(self) -> Topology {
        debug!(
            nodes = self.topo.nodes.len(),
            links = self.topo.links.len() / 2,
            switches = self.topo.num_switches(),
            "拓扑构建完成"
        );
        self.topo
    }
}
