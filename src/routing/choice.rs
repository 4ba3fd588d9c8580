//! 路径选择策略

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::Path;
use crate::net::NodeName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathChoice {
    /// 总是第一条候选（生成树式单路径）
    #[serde(alias = "st")]
    Leftmost,
    /// 每次调用都重新均匀随机
    Random,
    /// 候选排序后按 `hash % len` 取（ECMP）
    #[default]
    Hashed,
}

impl PathChoice {
    /// 从候选集合中选一条；候选为空时返回 `None`。
    pub fn choose<'a>(
        &self,
        paths: &'a [Path],
        _src: NodeName,
        _dst: NodeName,
        hash: u32,
    ) -> Option<&'a Path> {
        match self {
            PathChoice::Leftmost => paths.first(),
            PathChoice::Random => paths.choose(&mut rand::thread_rng()),
            PathChoice::Hashed => choose_hashed(paths, hash),
        }
    }
}

/// ECMP：与调用方状态无关，同一 hash 总得到同一路径。
pub fn choose_hashed(paths: &[Path], hash: u32) -> Option<&Path> {
    if paths.is_empty() {
        return None;
    }
    let mut sorted: Vec<&Path> = paths.iter().collect();
    sorted.sort();
    Some(sorted[hash as usize % sorted.len()])
}

impl fmt::Display for PathChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PathChoice::Leftmost => "leftmost",
            PathChoice::Random => "random",
            PathChoice::Hashed => "hashed",
        };
        f.write_str(s)
    }
}

impl FromStr for PathChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "st" | "leftmost" => Ok(PathChoice::Leftmost),
            "random" => Ok(PathChoice::Random),
            "hashed" => Ok(PathChoice::Hashed),
            other => Err(format!(
                "unknown routing type {other:?}, expected st|leftmost|random|hashed"
            )),
        }
    }
}
