//! 事件 trait
//!
//! 定义传输适配层投递给控制器世界的事件接口。

use super::simulator::Simulator;
use super::world::ControllerWorld;

/// 一次性事件，执行时取得自身所有权（帧数据随事件移动，不必克隆）。
pub trait Event: Send + 'static {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut ControllerWorld);
}
