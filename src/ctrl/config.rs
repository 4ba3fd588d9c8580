//! 控制器配置

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::json_file::{JsonFileError, read_json};
use crate::routing::PathChoice;

/// 大流放置方案
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// Global First Fit，放不下时退回 ECMP
    #[default]
    Gff,
    /// 只用路由引擎的哈希选路
    Ecmp,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scheme::Gff => "gff",
            Scheme::Ecmp => "ecmp",
        })
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gff" => Ok(Scheme::Gff),
            "ecmp" => Ok(Scheme::Ecmp),
            other => Err(format!("unknown scheme {other:?}, expected gff|ecmp")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// packet-in 携带的最大字节数
    pub miss_send_len: u16,
    /// 规则空闲超时（秒）
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    /// 归一化的链路容量
    pub capacity: f64,
    pub routing: PathChoice,
    pub scheme: Scheme,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            miss_send_len: 2000,
            idle_timeout: 10,
            hard_timeout: 0,
            priority: 0x8000,
            capacity: 1.0,
            routing: PathChoice::Hashed,
            scheme: Scheme::Gff,
        }
    }
}

impl ControllerConfig {
    /// 从 JSON 文件加载；缺省字段取默认值。
    pub fn from_json_file(path: &Path) -> Result<Self, JsonFileError> {
        read_json(path)
    }
}
