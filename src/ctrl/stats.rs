//! 统计信息
//!
//! 控制器处理事件的计数。

/// 控制器统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ControllerStats {
    pub packet_ins: u64,
    pub dropped_not_ready: u64,
    pub malformed: u64,
    pub no_route: u64,
    pub floods: u64,
    pub frames_out: u64,
    pub rules_installed: u64,
    pub send_failures: u64,
    pub unknown_switch_events: u64,
    pub route_computations: u64,
}
