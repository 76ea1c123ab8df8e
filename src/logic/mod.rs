pub mod async_gate;
pub mod broker;
pub mod planner;

pub use async_gate::*;
pub use broker::*;
pub use planner::*;
