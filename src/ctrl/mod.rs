//! 反应式调度控制器
//!
//! 事件驱动的状态机：等待整个 fabric 连上后一次性预计算路由，
//! 之后在每个 packet-in 上学习 MAC 位置，并泛洪或沿选出的路径安装转发规则。

mod config;
mod controller;
mod error;
mod stats;
mod switch;

pub use config::{ControllerConfig, Scheme};
pub use controller::{Controller, ControllerState, PacketOutcome};
pub use error::ControlError;
pub use stats::ControllerStats;
pub use switch::{Connection, SwitchHandle, Timeouts};
