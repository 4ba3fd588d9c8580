pub mod ctrl;
pub mod json_file;
pub mod net;
pub mod routing;
pub mod sched;
pub mod sim;
pub mod topo;
pub mod traffic;

#[cfg(test)]
mod test;
