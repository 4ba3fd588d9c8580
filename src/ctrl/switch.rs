//! 交换机句柄
//!
//! 控制器对传输层的唯一期望：往端口发原始帧、安装转发规则、下发配置。
//! 连接本身（建连、分帧、计数）由实现 [`Connection`] 的适配层负责。

use tracing::{debug, trace};

use super::error::ControlError;
use crate::net::{Dpid, FlowMatch, PortNo};

/// 规则超时（秒），0 表示不超时
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timeouts {
    pub idle: u16,
    pub hard: u16,
}

/// 到一台交换机的传输连接，所有发送都是 fire-and-forget。
pub trait Connection: Send {
    /// 把原始帧从 `out_port` 发出
    fn send_data(&mut self, out_port: PortNo, data: &[u8]) -> Result<(), ControlError>;

    /// 请求交换机把命中 `m` 的后续帧从 `out_port` 转发
    fn install(
        &mut self,
        out_port: PortNo,
        m: &FlowMatch,
        timeouts: Timeouts,
        priority: u16,
    ) -> Result<(), ControlError>;

    /// 设置 packet-in 携带的最大字节数
    fn set_config(&mut self, miss_send_len: u16) -> Result<(), ControlError>;
}

/// 每台已连接交换机一个句柄，由控制器的交换机表独占。
pub struct SwitchHandle {
    dpid: Dpid,
    connection: Option<Box<dyn Connection>>,
    ports: Vec<PortNo>,
}

impl std::fmt::Debug for SwitchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitchHandle")
            .field("dpid", &self.dpid)
            .field("connected", &self.connection.is_some())
            .field("ports", &self.ports)
            .finish()
    }
}

impl SwitchHandle {
    pub fn new(dpid: Dpid, ports: Vec<PortNo>) -> Self {
        Self {
            dpid,
            connection: None,
            ports,
        }
    }

    pub fn dpid(&self) -> Dpid {
        self.dpid
    }

    pub fn ports(&self) -> &[PortNo] {
        &self.ports
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// 绑定（或替换）连接；端口集合只在首次连接时记录。
    pub fn connect(&mut self, connection: Box<dyn Connection>, ports: Vec<PortNo>) {
        if self.ports.is_empty() {
            self.ports = ports;
        }
        if self.connection.is_some() {
            debug!(dpid = %self.dpid, "替换旧连接");
        }
        self.connection = Some(connection);
    }

    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            debug!(dpid = %self.dpid, "断开连接");
        }
    }

    fn conn(&mut self) -> Result<&mut Box<dyn Connection>, ControlError> {
        self.connection
            .as_mut()
            .ok_or(ControlError::NotConnected(self.dpid))
    }

    pub fn send_data(&mut self, out_port: PortNo, data: &[u8]) -> Result<(), ControlError> {
        trace!(dpid = %self.dpid, out_port, len = data.len(), "packet-out");
        self.conn()?.send_data(out_port, data)
    }

    pub fn install(
        &mut self,
        out_port: PortNo,
        m: &FlowMatch,
        timeouts: Timeouts,
        priority: u16,
    ) -> Result<(), ControlError> {
        trace!(dpid = %self.dpid, out_port, "flow-mod");
        self.conn()?.install(out_port, m, timeouts, priority)
    }

    pub fn set_config(&mut self, miss_send_len: u16) -> Result<(), ControlError> {
        self.conn()?.set_config(miss_send_len)
    }
}
