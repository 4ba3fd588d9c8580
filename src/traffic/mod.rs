//! 实验输入输出
//!
//! 流量矩阵文件：`{"发送方主机序号": [接收方主机序号, ...]}`；
//! 结果文件：每个流量模式一个 JSON 对象，键为 `{scheme}_mean_gbps` /
//! `{scheme}_stddev_gbps`，写入时保留其他方案已有的键。

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::json_file::{JsonFileError, read_json, write_json};
use crate::sched::LinkKey;

#[derive(Debug, Error)]
pub enum TrafficError {
    #[error(transparent)]
    File(#[from] JsonFileError),
    #[error("sender key {0:?} is not a host index")]
    BadSender(String),
    #[error("host index {idx} out of range ({hosts} hosts)")]
    HostOutOfRange { idx: usize, hosts: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrafficMatrix(pub BTreeMap<String, Vec<usize>>);

impl TrafficMatrix {
    pub fn load(path: &Path) -> Result<Self, TrafficError> {
        Ok(read_json(path)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), TrafficError> {
        Ok(write_json(path, self)?)
    }

    /// 所有 (发送方, 接收方) 对，按发送方序号排序，并检查序号不越界。
    pub fn pairs(&self, num_hosts: usize) -> Result<Vec<(usize, usize)>, TrafficError> {
        let mut out = Vec::new();
        for (sender, receivers) in &self.0 {
            let src: usize = sender
                .trim()
                .parse()
                .map_err(|_| TrafficError::BadSender(sender.clone()))?;
            for &dst in std::iter::once(&src).chain(receivers) {
                if dst >= num_hosts {
                    return Err(TrafficError::HostOutOfRange {
                        idx: dst,
                        hosts: num_hosts,
                    });
                }
            }
            out.extend(receivers.iter().map(|&dst| (src, dst)));
        }
        out.sort_by_key(|&(s, _)| s);
        Ok(out)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Results(pub BTreeMap<String, f64>);

impl Results {
    /// 读取已有结果；文件不存在时返回空结果。
    pub fn load_or_default(path: &Path) -> Result<Self, TrafficError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Ok(read_json(path)?)
    }

    pub fn record(&mut self, scheme: &str, mean_gbps: f64, stddev_gbps: f64) {
        self.0.insert(format!("{scheme}_mean_gbps"), mean_gbps);
        self.0.insert(format!("{scheme}_stddev_gbps"), stddev_gbps);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn save(&self, path: &Path) -> Result<(), TrafficError> {
        Ok(write_json(path, self)?)
    }
}

/// 估计每条流的吞吐：`link_gbps / 其路径上最拥挤有向链路的流数`。
pub fn estimate_throughputs(flows: &[Vec<LinkKey>], link_gbps: f64) -> Vec<f64> {
    let mut load: HashMap<LinkKey, usize> = HashMap::new();
    for links in flows {
        for link in links {
            *load.entry(*link).or_insert(0) += 1;
        }
    }
    flows
        .iter()
        .map(|links| {
            let worst = links.iter().map(|l| load[l]).max().unwrap_or(1).max(1);
            link_gbps / worst as f64
        })
        .collect()
}

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// 总体标准差
pub fn stddev(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    (xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / xs.len() as f64).sqrt()
}
