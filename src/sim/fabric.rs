//! 模拟数据平面
//!
//! 每台交换机一张流表，规则按空闲/硬超时在交换机侧自行过期，
//! 控制器不跟踪。控制器经 [`OutboxConnection`] 发出的命令先进入共享发件箱，
//! 由世界在事件处理完后统一取出执行，因此 packet-out 不会递归触发新的 packet-in。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use super::time::SimTime;
use crate::ctrl::{Connection, ControlError, Timeouts};
use crate::net::{Dpid, FlowMatch, NodeName, PortNo};

/// 控制器发给交换机的一条命令
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchCommand {
    PacketOut {
        port: PortNo,
        data: Vec<u8>,
    },
    FlowMod {
        out_port: PortNo,
        m: FlowMatch,
        timeouts: Timeouts,
        priority: u16,
    },
    SetConfig {
        miss_send_len: u16,
    },
}

pub type Outbox = Arc<Mutex<Vec<(Dpid, SwitchCommand)>>>;

/// 把命令写进共享发件箱的连接
#[derive(Debug, Clone)]
pub struct OutboxConnection {
    dpid: Dpid,
    outbox: Outbox,
}

impl OutboxConnection {
    pub fn new(dpid: Dpid, outbox: Outbox) -> Self {
        Self { dpid, outbox }
    }

    fn push(&self, cmd: SwitchCommand) -> Result<(), ControlError> {
        self.outbox
            .lock()
            .map_err(|_| ControlError::Transport {
                dpid: self.dpid,
                reason: "outbox poisoned".to_string(),
            })?
            .push((self.dpid, cmd));
        Ok(())
    }
}

impl Connection for OutboxConnection {
    fn send_data(&mut self, out_port: PortNo, data: &[u8]) -> Result<(), ControlError> {
        self.push(SwitchCommand::PacketOut {
            port: out_port,
            data: data.to_vec(),
        })
    }

    fn install(
        &mut self,
        out_port: PortNo,
        m: &FlowMatch,
        timeouts: Timeouts,
        priority: u16,
    ) -> Result<(), ControlError> {
        self.push(SwitchCommand::FlowMod {
            out_port,
            m: *m,
            timeouts,
            priority,
        })
    }

    fn set_config(&mut self, miss_send_len: u16) -> Result<(), ControlError> {
        self.push(SwitchCommand::SetConfig { miss_send_len })
    }
}

#[derive(Debug, Clone)]
struct Rule {
    m: FlowMatch,
    out_port: PortNo,
    priority: u16,
    idle: Option<SimTime>,
    hard: Option<SimTime>,
    installed_at: SimTime,
    last_used: SimTime,
}

impl Rule {
    fn expired(&self, now: SimTime) -> bool {
        let idle = self
            .idle
            .is_some_and(|t| now.saturating_sub(self.last_used) >= t);
        let hard = self
            .hard
            .is_some_and(|t| now.saturating_sub(self.installed_at) >= t);
        idle || hard
    }
}

fn timeout(secs: u16) -> Option<SimTime> {
    (secs > 0).then(|| SimTime::from_secs(secs as u64))
}

#[derive(Debug, Default)]
pub struct Fabric {
    tables: HashMap<Dpid, Vec<Rule>>,
    miss_send_len: HashMap<Dpid, u16>,
    delivered: HashMap<NodeName, u64>,
    pub dropped: u64,
}

impl Fabric {
    pub fn install(
        &mut self,
        dpid: Dpid,
        m: FlowMatch,
        out_port: PortNo,
        timeouts: Timeouts,
        priority: u16,
        now: SimTime,
    ) {
        let table = self.tables.entry(dpid).or_default();
        // 相同匹配与优先级的规则被覆盖
        table.retain(|r| !(r.m == m && r.priority == priority));
        table.push(Rule {
            m,
            out_port,
            priority,
            idle: timeout(timeouts.idle),
            hard: timeout(timeouts.hard),
            installed_at: now,
            last_used: now,
        });
        trace!(dpid = %dpid, out_port, rules = table.len(), "安装规则");
    }

    /// 查流表：先清除过期规则，再取优先级最高的命中规则。
    pub fn lookup(
        &mut self,
        dpid: Dpid,
        m: &FlowMatch,
        in_port: PortNo,
        now: SimTime,
    ) -> Option<PortNo> {
        let table = self.tables.get_mut(&dpid)?;
        let before = table.len();
        table.retain(|r| !r.expired(now));
        if table.len() != before {
            debug!(dpid = %dpid, expired = before - table.len(), "规则过期");
        }
        let rule = table
            .iter_mut()
            .filter(|r| r.m.matches(m, in_port))
            .max_by_key(|r| r.priority)?;
        rule.last_used = now;
        Some(rule.out_port)
    }

    /// 当前（未过期的）规则数
    pub fn rule_count(&self, dpid: Dpid, now: SimTime) -> usize {
        self.tables
            .get(&dpid)
            .map_or(0, |t| t.iter().filter(|r| !r.expired(now)).count())
    }

    pub fn set_miss_send_len(&mut self, dpid: Dpid, len: u16) {
        self.miss_send_len.insert(dpid, len);
    }

    pub fn miss_send_len(&self, dpid: Dpid) -> Option<u16> {
        self.miss_send_len.get(&dpid).copied()
    }

    pub fn deliver(&mut self, host: NodeName) {
        *self.delivered.entry(host).or_insert(0) += 1;
    }

    /// 主机收到的帧数
    pub fn delivered(&self, host: NodeName) -> u64 {
        self.delivered.get(&host).copied().unwrap_or(0)
    }

    pub fn total_delivered(&self) -> u64 {
        self.delivered.values().sum()
    }
}
