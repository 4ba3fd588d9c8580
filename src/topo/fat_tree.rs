//! Fat-tree 拓扑构建
//!
//! 命名（h = k/2）：主机 `(pod, edge, 2..h+2)`，边缘交换机 `(pod, 0..h, 1)`，
//! 汇聚交换机 `(pod, h..k, 1)`，核心交换机 `(k, j, i)`，`j, i ∈ 1..=h`。

use serde::{Deserialize, Serialize};

use super::{Layer, Topology, TopologyBuilder, TopologyError};
use crate::net::NodeName;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FatTreeOpts {
    pub k: usize,
}

impl Default for FatTreeOpts {
    fn default() -> Self {
        Self { k: 4 }
    }
}

#[derive(Debug, Clone)]
pub struct FatTreeTopology {
    pub k: usize,
    pub topo: Topology,
    pub hosts: Vec<NodeName>,
    pub edge_switches: Vec<NodeName>,
    pub agg_switches: Vec<NodeName>,
    pub core_switches: Vec<NodeName>,
}

impl FatTreeTopology {
    fn half(&self) -> usize {
        self.k / 2
    }

    pub fn host(&self, pod: usize, edge: usize, host: usize) -> NodeName {
        let half = self.half();
        let idx = (pod * half + edge) * half + host;
        self.hosts[idx]
    }

    pub fn edge(&self, pod: usize, edge: usize) -> NodeName {
        let half = self.half();
        self.edge_switches[pod * half + edge]
    }

    pub fn agg(&self, pod: usize, agg: usize) -> NodeName {
        let half = self.half();
        self.agg_switches[pod * half + agg]
    }

    pub fn core(&self, group: usize, index: usize) -> NodeName {
        let half = self.half();
        self.core_switches[group * half + index]
    }
}

pub fn build_fat_tree(opts: &FatTreeOpts) -> Result<FatTreeTopology, TopologyError> {
    let k = opts.k;
    assert!(
        k >= 2 && k % 2 == 0 && k < 255,
        "fat-tree k must be even, >= 2 and fit a u8 pod number"
    );

    let half = k / 2;
    let mut b = TopologyBuilder::new();

    let mut core_switches = Vec::with_capacity(half * half);
    for group in 0..half {
        for index in 0..half {
            let name = NodeName::new(k as u8, (group + 1) as u8, (index + 1) as u8);
            b.add_switch(name, Layer::Core)?;
            core_switches.push(name);
        }
    }

    let mut hosts = Vec::with_capacity(k * half * half);
    let mut edge_switches = Vec::with_capacity(k * half);
    let mut agg_switches = Vec::with_capacity(k * half);

    for pod in 0..k {
        let p = pod as u8;
        let edges: Vec<NodeName> = (0..half).map(|e| NodeName::new(p, e as u8, 1)).collect();
        let aggs: Vec<NodeName> = (half..k).map(|a| NodeName::new(p, a as u8, 1)).collect();

        for &e in &edges {
            b.add_switch(e, Layer::Edge)?;
        }
        for &a in &aggs {
            b.add_switch(a, Layer::Agg)?;
        }

        for &edge in &edges {
            for host in 0..half {
                let name = NodeName::new(p, edge.sw, (host + 2) as u8);
                b.add_host(name)?;
                b.add_link(edge, name)?;
                hosts.push(name);
            }
        }
        for &edge in &edges {
            for &agg in &aggs {
                b.add_link(edge, agg)?;
            }
        }

        edge_switches.extend(edges);
        agg_switches.extend(aggs);
    }

    for pod in 0..k {
        for agg in 0..half {
            let agg_id = agg_switches[pod * half + agg];
            for index in 0..half {
                b.add_link(agg_id, core_switches[agg * half + index])?;
            }
        }
    }

    Ok(FatTreeTopology {
        k,
        topo: b.build(),
        hosts,
        edge_switches,
        agg_switches,
        core_switches,
    })
}
