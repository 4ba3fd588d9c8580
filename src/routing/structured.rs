//! 结构化拓扑上的全最短路径枚举
//!
//! 只沿 up 边（朝核心）和 down 边（朝主机）扩展，不走同层捷径；
//! 路径长度受层数约束，松弛过程必然收敛。

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, trace};

use super::{Path, PathChoice};
use crate::net::NodeName;
use crate::topo::Topology;

/// 目的节点 -> 所有等长最短路径（按发现顺序）
pub type Reachability = HashMap<NodeName, Vec<Path>>;

/// `p1` 是否作为连续子序列出现在 `p2` 中（空序列视为子序列）
pub fn is_subpath(p1: &[NodeName], p2: &[NodeName]) -> bool {
    if p1.is_empty() {
        return true;
    }
    p2.windows(p1.len()).any(|w| w == p1)
}

/// 松弛过程中的前沿：保留节点首次到达的顺序，扫描顺序因此是确定的。
struct Frontier {
    order: Vec<NodeName>,
    paths: Reachability,
}

impl Frontier {
    fn seed(src: NodeName) -> Self {
        Self {
            order: vec![src],
            paths: HashMap::from([(src, vec![vec![src]])]),
        }
    }

    /// 候选被接受当且仅当：终点尚无路径，或者它不长于已知路径，
    /// 且与任何已知路径互不为子路径。
    fn accepts(&self, candidate: &[NodeName]) -> bool {
        let Some(b) = candidate.last() else {
            return false;
        };
        let Some(known) = self.paths.get(b) else {
            return true;
        };
        for path in known {
            if path.len() < candidate.len() {
                return false;
            }
            if is_subpath(candidate, path) || is_subpath(path, candidate) {
                return false;
            }
        }
        true
    }

    fn record(&mut self, candidate: Path) {
        let Some(&b) = candidate.last() else {
            return;
        };
        match self.paths.get_mut(&b) {
            Some(known) => {
                let best = known[0].len();
                if candidate.len() == best {
                    known.push(candidate);
                } else if candidate.len() < best {
                    *known = vec![candidate];
                }
            }
            None => {
                self.order.push(b);
                self.paths.insert(b, vec![candidate]);
            }
        }
    }

    /// 扫描一遍，接受第一个新候选后立即返回 true。
    fn relax_once(&mut self, topo: &Topology) -> bool {
        for i in 0..self.order.len() {
            let node = self.order[i];
            let mut edges = topo.up_edges(node);
            edges.extend(topo.down_edges(node));

            for (a, b) in edges {
                debug_assert_eq!(a, node);
                let n_paths = self.paths.get(&node).map_or(0, Vec::len);
                for p in 0..n_paths {
                    let mut candidate = self.paths[&node][p].clone();
                    candidate.push(b);
                    if self.accepts(&candidate) {
                        trace!(path = ?candidate, "接受候选路径");
                        self.record(candidate);
                        return true;
                    }
                }
            }
        }
        false
    }
}

/// 计算从 `src` 出发可达的所有节点及其全部等长最短路径。
///
/// 每接受一条候选就从头重新扫描，直到一整遍扫描没有新接受为止。
/// 最坏情况是二次的，但只在启动时对小规模固定拓扑运行一次。
pub fn compute_reachability(topo: &Topology, src: NodeName) -> Reachability {
    let mut frontier = Frontier::seed(src);
    let mut rounds = 0usize;
    while frontier.relax_once(topo) {
        rounds += 1;
    }
    trace!(src = %src, rounds, reached = frontier.order.len(), "可达性计算完成");
    frontier.paths
}

/// 结构化路由：构造时为每个节点预计算可达性，之后只读。
#[derive(Debug, Clone)]
pub struct StructuredRouting {
    choice: PathChoice,
    src_paths: HashMap<NodeName, Reachability>,
}

impl StructuredRouting {
    #[tracing::instrument(skip(topo), fields(nodes = topo.len()))]
    pub fn new(topo: &Topology, choice: PathChoice) -> Self {
        debug!("计算所有节点对的最短路径");
        let start = Instant::now();

        let src_paths = topo
            .nodes()
            .map(|node| (node, compute_reachability(topo, node)))
            .collect::<HashMap<_, _>>();

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            sources = src_paths.len(),
            "🧭 结构化路由初始化完成"
        );
        Self { choice, src_paths }
    }

    pub fn choice(&self) -> PathChoice {
        self.choice
    }

    /// `src` 到 `dst` 的全部候选路径；不可达时为 `None`。
    pub fn routes(&self, src: NodeName, dst: NodeName) -> Option<Vec<Path>> {
        if src == dst {
            return Some(vec![vec![src]]);
        }
        self.src_paths.get(&src)?.get(&dst).cloned()
    }

    /// 按策略选出一条路径；`None` 表示无路由，由调用方决定如何处理。
    pub fn get_route(&self, src: NodeName, dst: NodeName, hash: u32) -> Option<Path> {
        trace!(src = %src, dst = %dst, hash, "get_route");
        if src == dst {
            return Some(vec![src]);
        }
        let paths = self.src_paths.get(&src)?.get(&dst)?;
        let path = self.choice.choose(paths, src, dst, hash).cloned();
        debug!(src = %src, dst = %dst, path = ?path, choice = %self.choice, "选路");
        path
    }
}
