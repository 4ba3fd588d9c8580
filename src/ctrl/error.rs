//! 控制器错误类型

use thiserror::Error;

use crate::net::{Dpid, NodeName};

#[derive(Debug, Error)]
pub enum ControlError {
    /// 连接事件引用了拓扑中不存在的交换机
    #[error("unknown switch {0}")]
    UnknownSwitch(Dpid),
    /// 交换机句柄不存在或当前没有连接
    #[error("switch {0} is not connected")]
    NotConnected(Dpid),
    /// 传输层发送失败
    #[error("send to switch {dpid} failed: {reason}")]
    Transport { dpid: Dpid, reason: String },
    #[error("no route from {src} to {dst}")]
    NoRoute { src: NodeName, dst: NodeName },
    #[error("no link between {a} and {b}")]
    MissingAdjacency { a: NodeName, b: NodeName },
}
