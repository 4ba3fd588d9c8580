//! 流调度（Global First Fit）
//!
//! 持有路由集合、链路预留容量和流到路径的绑定，
//! 为两台边缘交换机之间的流选出一条不超载的等价路径。

mod gff;
mod key;

pub use gff::{Assignment, FlowAssignment, GlobalFirstFit};
pub use key::{FlowKey, LinkKey, PathKey};
