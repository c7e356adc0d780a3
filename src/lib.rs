//! # Prod MRP
//!
//! 生產工單生命週期與物料需求計劃（MRP）引擎
//!
//! - [`mrp_core`]：資料模型、錯誤、配置、外部服務介面
//! - [`mrp_calc`]：物料需求計算與倉庫分配
//! - [`mrp_ledger`]：交易式庫存帳（預約、投入、實績、入庫）
//! - [`mrp_lifecycle`]：工單狀態機與對外操作

pub mod logging;

pub use mrp_calc::{AllocationEngine, MrpCalculator};
pub use mrp_core::{
    AllocationPlan, AllocationPolicy, BomLine, BomResolver, EngineConfig, ErrorKind,
    InventoryLogEntry, IoType, MaterialRequirement, MrpError, MrpReport, OrderDraft, OrderStatus,
    OrderUpdate, ProductionOrder, ProductionResult, Reservation, ReservationState, Result,
    StaticBomResolver, StaticWarehouseDirectory, StockLevel, StockQueryService, Warehouse,
    WarehouseDirectory, WarehouseFilter, WarehouseQty,
};
pub use mrp_ledger::{InMemoryStore, ResultInput};
pub use mrp_lifecycle::{AdvancePayload, ProductionEngine, StateMachine};

pub use mrp_calc;
pub use mrp_core;
pub use mrp_ledger;
pub use mrp_lifecycle;
