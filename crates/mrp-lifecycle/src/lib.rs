//! # MRP Lifecycle
//!
//! 生產工單狀態機與對外操作

pub mod engine;
pub mod state_machine;

// Re-export 主要類型
pub use engine::ProductionEngine;
pub use state_machine::{AdvancePayload, StateMachine};
