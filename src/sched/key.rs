//! 调度表的键类型

use std::fmt;
use std::net::Ipv4Addr;

use crate::net::NodeName;

/// 流键：(源 IP, 目的 IP)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowKey {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl FlowKey {
    pub fn new(src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        Self { src, dst }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.src, self.dst)
    }
}

/// 路由集合键：(入口边缘交换机, 出口边缘交换机)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathKey {
    pub src: NodeName,
    pub dst: NodeName,
}

impl PathKey {
    pub fn new(src: NodeName, dst: NodeName) -> Self {
        Self { src, dst }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.src, self.dst)
    }
}

/// 有向链路键
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkKey {
    pub from: NodeName,
    pub to: NodeName,
}

impl LinkKey {
    pub fn new(from: NodeName, to: NodeName) -> Self {
        Self { from, to }
    }

    pub fn reverse(&self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.from, self.to)
    }
}
