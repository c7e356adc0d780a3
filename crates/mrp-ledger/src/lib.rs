//! # MRP Ledger
//!
//! 庫存帳與交易：預約、投入、生產實績、成品入庫

pub mod consumption;
pub mod dirty_tracking;
pub mod receipt;
pub mod reservation;
pub mod result;
pub mod store;

// Re-export 主要類型
pub use consumption::ConsumptionProcessor;
pub use dirty_tracking::DirtyTracker;
pub use receipt::ReceiptAllocator;
pub use reservation::ReservationLedger;
pub use result::{ResultInput, ResultRecorder};
pub use store::{InMemoryStore, StockKey, Transaction};
