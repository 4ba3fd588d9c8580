//! 仿真器
//!
//! 单线程事件循环：事件按 (时间, 序号) 依次执行，每个事件处理完才取下一个，
//! 这正是控制器所依赖的“处理函数跑到底”的调度模型。

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::{debug, info, trace};

use super::event::Event;
use super::time::SimTime;
use super::world::ControllerWorld;

struct Scheduled {
    at: SimTime,
    seq: u64,
    ev: Box<dyn Event>,
}

// BinaryHeap 是 max-heap；时间小、序号小的先出。
impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.at, other.seq).cmp(&(self.at, self.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    executed: u64,
    q: BinaryHeap<Scheduled>,
}

impl Simulator {
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 已执行的事件数
    pub fn executed(&self) -> u64 {
        self.executed
    }

    pub fn pending(&self) -> usize {
        self.q.len()
    }

    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        trace!(
            event_type = std::any::type_name::<E>(),
            at = %at,
            seq,
            "调度事件"
        );
        self.q.push(Scheduled {
            at: at.max(self.now),
            seq,
            ev: Box::new(ev),
        });
    }

    /// 运行直到事件队列为空或到达 `until`。
    pub fn run_until(&mut self, until: SimTime, world: &mut ControllerWorld) {
        while let Some(top) = self.q.peek() {
            if top.at > until {
                break;
            }
            let Some(item) = self.q.pop() else {
                break;
            };
            self.step(item, world);
        }
        self.now = self.now.max(until);
    }

    /// 运行所有事件直到队列为空。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut ControllerWorld) {
        info!(queued = self.q.len(), "▶️  开始运行");
        while let Some(item) = self.q.pop() {
            self.step(item, world);
        }
        info!(total_events = self.executed, final_time = %self.now, "✅ 运行完成");
    }

    fn step(&mut self, item: Scheduled, world: &mut ControllerWorld) {
        self.now = item.at;
        self.executed += 1;
        debug!(
            event_num = self.executed,
            now = %self.now,
            seq = item.seq,
            remaining_queue = self.q.len(),
            "执行事件"
        );
        item.ev.execute(self, world);
    }
}
