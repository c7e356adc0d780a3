//! 庫存異動帳（只能附加）

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 異動類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IoType {
    /// 預約
    Reserve,
    /// 預約解除
    Unreserve,
    /// 生產投入
    ProdUsed,
    /// 生產實績 / 成品入庫
    ProdResult,
    /// 入庫
    In,
    /// 出庫
    Out,
}

impl IoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IoType::Reserve => "RESERVE",
            IoType::Unreserve => "UNRESERVE",
            IoType::ProdUsed => "PROD_USED",
            IoType::ProdResult => "PROD_RESULT",
            IoType::In => "IN",
            IoType::Out => "OUT",
        }
    }
}

impl fmt::Display for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 庫存異動記錄
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryLogEntry {
    pub id: Uuid,
    pub io_type: IoType,
    pub item_code: String,

    /// 出庫倉（投入、出庫）
    pub from_warehouse: Option<String>,

    /// 入庫倉（預約、入庫）
    pub to_warehouse: Option<String>,

    /// 異動數量
    pub qty: Decimal,

    /// 現有庫存增減
    pub qty_delta: Decimal,

    /// 已分配數量增減
    pub alloc_delta: Decimal,

    /// 來源單據（生產工單號）
    pub ref_no: Option<String>,

    pub remark: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl InventoryLogEntry {
    pub fn new(io_type: IoType, item_code: String, qty: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            io_type,
            item_code,
            from_warehouse: None,
            to_warehouse: None,
            qty,
            qty_delta: Decimal::ZERO,
            alloc_delta: Decimal::ZERO,
            ref_no: None,
            remark: None,
            timestamp,
        }
    }

    pub fn from_warehouse(mut self, warehouse_code: &str) -> Self {
        self.from_warehouse = Some(warehouse_code.to_string());
        self
    }

    pub fn to_warehouse(mut self, warehouse_code: &str) -> Self {
        self.to_warehouse = Some(warehouse_code.to_string());
        self
    }

    /// 建構器模式：設置庫存增減
    pub fn with_deltas(mut self, qty_delta: Decimal, alloc_delta: Decimal) -> Self {
        self.qty_delta = qty_delta;
        self.alloc_delta = alloc_delta;
        self
    }

    pub fn with_ref_no(mut self, ref_no: &str) -> Self {
        self.ref_no = Some(ref_no.to_string());
        self
    }

    pub fn with_remark(mut self, remark: Option<String>) -> Self {
        self.remark = remark;
        self
    }

    /// 異動涉及的倉庫（入庫倉優先）
    pub fn warehouse_code(&self) -> Option<&str> {
        self.to_warehouse
            .as_deref()
            .or(self.from_warehouse.as_deref())
    }
}
