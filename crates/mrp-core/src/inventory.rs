//! 庫存模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MrpError, Result};

/// 倉庫別庫存（品目 × 倉庫）
///
/// 可用量永遠由 `stock_qty - allocated_qty` 推導，不另外儲存。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    /// 品目
    pub item_code: String,

    /// 倉庫
    pub warehouse_code: String,

    /// 現有庫存
    pub stock_qty: Decimal,

    /// 已分配數量（預約鎖定）
    pub allocated_qty: Decimal,
}

impl StockLevel {
    /// 創建新的庫存記錄
    pub fn new(item_code: String, warehouse_code: String, stock_qty: Decimal) -> Self {
        Self {
            item_code,
            warehouse_code,
            stock_qty,
            allocated_qty: Decimal::ZERO,
        }
    }

    /// 建構器模式：設置已分配數量
    pub fn with_allocated_qty(mut self, allocated_qty: Decimal) -> Self {
        self.allocated_qty = allocated_qty;
        self
    }

    /// 可用庫存（現有 - 已分配）
    pub fn available_qty(&self) -> Decimal {
        self.stock_qty - self.allocated_qty
    }

    /// 套用庫存與分配量的增減
    ///
    /// 結果必須滿足 `0 <= allocated_qty <= stock_qty`，否則不做任何修改。
    /// 數值溢位同樣以 `InvariantViolation` 拒絕。
    pub fn apply_delta(&mut self, stock_delta: Decimal, alloc_delta: Decimal) -> Result<()> {
        let overflow = || {
            MrpError::InvariantViolation(format!(
                "{}@{} 庫存數量溢位",
                self.item_code, self.warehouse_code
            ))
        };
        let stock_qty = self.stock_qty.checked_add(stock_delta).ok_or_else(overflow)?;
        let allocated_qty = self.allocated_qty.checked_add(alloc_delta).ok_or_else(overflow)?;

        if allocated_qty < Decimal::ZERO {
            return Err(MrpError::InvariantViolation(format!(
                "{}@{} 已分配數量將為負數: {}",
                self.item_code, self.warehouse_code, allocated_qty
            )));
        }
        if allocated_qty > stock_qty {
            return Err(MrpError::InvariantViolation(format!(
                "{}@{} 已分配數量 {} 超過現有庫存 {}",
                self.item_code, self.warehouse_code, allocated_qty, stock_qty
            )));
        }

        self.stock_qty = stock_qty;
        self.allocated_qty = allocated_qty;
        Ok(())
    }
}
