//! 结构化路由引擎
//!
//! 为每个 (源, 目的) 节点对预计算全部等长最短、无环的多路径，
//! 并按策略（最左 / 随机 / 哈希）从候选中选出一条。

mod choice;
mod structured;

pub use choice::{PathChoice, choose_hashed};
pub use structured::{Reachability, StructuredRouting, compute_reachability, is_subpath};

use crate::net::NodeName;

/// 从入口交换机到出口交换机（含两端）的节点序列
pub type Path = Vec<NodeName>;
