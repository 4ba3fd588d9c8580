//! 进程内传输适配层
//!
//! 用事件驱动仿真代替真实的 OpenFlow 连接：交换机上下线、主机发帧、
//! 帧逐跳到达交换机，都作为事件按时间顺序单线程执行。

// 子模块声明
mod event;
mod fabric;
mod simulator;
mod time;
mod world;

// 重新导出公共接口
pub use event::Event;
pub use fabric::{Fabric, Outbox, OutboxConnection, SwitchCommand};
pub use simulator::Simulator;
pub use time::SimTime;
pub use world::{ControllerWorld, FrameArrive, HostSend, PacketInRecord, SwitchDown, SwitchUp};
