//! # MRP Calculation Engine
//!
//! 物料需求計算與倉庫分配

pub mod allocation;
pub mod calculator;
pub mod netting;

// Re-export 主要類型
pub use allocation::AllocationEngine;
pub use calculator::MrpCalculator;
pub use netting::{AggregatedLine, NettingCalculator};
