// Position management and order planning
pub mod order_planner;
pub mod position_manager;

pub use order_planner::OrderPlanner;
pub use position_manager::{ManagementConfig, PositionManager};
