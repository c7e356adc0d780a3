//! # MRP Core
//!
//! 生產工單、物料分配與庫存帳的核心資料模型

pub mod allocation;
pub mod catalog;
pub mod config;
pub mod inventory;
pub mod ledger;
pub mod order;
pub mod requirement;

// Re-export 主要類型
pub use allocation::{
    Allocation, AllocationPlan, AllocationPolicy, MaterialAllocation, Reservation,
    ReservationState, WarehouseQty,
};
pub use catalog::{
    BomLine, BomResolver, StaticBomResolver, StaticWarehouseDirectory, StockQueryService,
    Warehouse, WarehouseDirectory, WarehouseFilter,
};
pub use config::{AutoAllocationOrder, ConsumptionTiming, EngineConfig, LossRatePolicy};
pub use inventory::StockLevel;
pub use ledger::{InventoryLogEntry, IoType};
pub use order::{
    OrderDraft, OrderStatus, OrderUpdate, ProductionOrder, ProductionOutcome, ProductionResult,
};
pub use requirement::{MaterialRequirement, MrpReport};

use rust_decimal::Decimal;

/// MRP 錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum MrpError {
    #[error("驗證失敗: {0}")]
    Validation(String),

    #[error("非法狀態轉換: {from} → {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("物料 {material} 指定數量與需求不符：需求 {required}, 指定 {allocated}, 差額 {delta}")]
    AllocationMismatch {
        material: String,
        required: Decimal,
        allocated: Decimal,
        delta: Decimal,
    },

    #[error("庫存不足: 物料 {material} 需要 {required}, 可用 {available}")]
    InsufficientStock {
        material: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("並行分配衝突: 物料 {material} 倉庫 {warehouse} 請求 {requested}, 目前可用 {available}")]
    ConcurrentAllocationConflict {
        material: String,
        warehouse: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("工單 {0} 已投入（消耗）")]
    AlreadyConsumed(String),

    #[error("工單 {0} 沒有有效的預約")]
    NoActiveReservation(String),

    #[error("不變量違反: {0}")]
    InvariantViolation(String),

    #[error("找不到生產工單: {0}")]
    OrderNotFound(String),

    #[error("外部服務錯誤: {0}")]
    Collaborator(String),

    #[error("配置錯誤: {0}")]
    Config(String),
}

/// 錯誤分類（呼叫端據此決定如何處理）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InsufficientStock,
    ConcurrentAllocationConflict,
    InvariantViolation,
    NotFound,
    Collaborator,
    Config,
}

impl MrpError {
    /// 取得錯誤分類
    pub fn kind(&self) -> ErrorKind {
        match self {
            MrpError::Validation(_)
            | MrpError::IllegalTransition { .. }
            | MrpError::AllocationMismatch { .. }
            | MrpError::AlreadyConsumed(_)
            | MrpError::NoActiveReservation(_) => ErrorKind::Validation,
            MrpError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            MrpError::ConcurrentAllocationConflict { .. } => {
                ErrorKind::ConcurrentAllocationConflict
            }
            MrpError::InvariantViolation(_) => ErrorKind::InvariantViolation,
            MrpError::OrderNotFound(_) => ErrorKind::NotFound,
            MrpError::Collaborator(_) => ErrorKind::Collaborator,
            MrpError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        MrpError::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, MrpError>;
