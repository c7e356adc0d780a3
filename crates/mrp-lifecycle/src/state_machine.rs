//! 生產工單狀態機
//!
//! 正常推進只能前進一步；後退只允許開工前的兩種補償：
//! `MATERIAL_RESERVED → CONFIRMED`（解除預約）與 `CONFIRMED → PLANNING`。

use mrp_core::{AllocationPlan, MrpError, OrderStatus, Result, WarehouseQty};
use mrp_ledger::ResultInput;
use serde::{Deserialize, Serialize};

/// 推進時附帶的資料（依目標狀態而定）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AdvancePayload {
    /// → CONFIRMED
    Confirm {
        /// 缺料時仍確認
        acknowledge_shortage: bool,
    },

    /// → MATERIAL_RESERVED
    Reserve { plan: AllocationPlan },

    /// → PRODUCING
    StartProduction,

    /// → PRODUCED
    RecordResult(ResultInput),

    /// → WAREHOUSED
    Receive {
        allocations: Vec<WarehouseQty>,
        remark: Option<String>,
    },

    /// → CLOSED
    Close,
}

impl AdvancePayload {
    /// 確認（不接受缺料）
    pub fn confirm() -> Self {
        AdvancePayload::Confirm {
            acknowledge_shortage: false,
        }
    }

    /// 預約（全部自動分配）
    pub fn reserve_automatic() -> Self {
        AdvancePayload::Reserve {
            plan: AllocationPlan::automatic(),
        }
    }

    pub fn receive(allocations: Vec<WarehouseQty>) -> Self {
        AdvancePayload::Receive {
            allocations,
            remark: None,
        }
    }

    /// 此資料對應的目標狀態
    pub fn target(&self) -> OrderStatus {
        match self {
            AdvancePayload::Confirm { .. } => OrderStatus::Confirmed,
            AdvancePayload::Reserve { .. } => OrderStatus::MaterialReserved,
            AdvancePayload::StartProduction => OrderStatus::Producing,
            AdvancePayload::RecordResult(_) => OrderStatus::Produced,
            AdvancePayload::Receive { .. } => OrderStatus::Warehoused,
            AdvancePayload::Close => OrderStatus::Closed,
        }
    }
}

/// 狀態轉換規則
pub struct StateMachine;

impl StateMachine {
    /// 檢查正常推進
    pub fn check_advance(from: OrderStatus, to: OrderStatus) -> Result<()> {
        if from.next() == Some(to) {
            Ok(())
        } else {
            Err(MrpError::IllegalTransition { from, to })
        }
    }

    /// 檢查推進資料是否對應目標狀態
    pub fn check_payload(to: OrderStatus, payload: &AdvancePayload) -> Result<()> {
        let expected = payload.target();
        if expected != to {
            return Err(MrpError::Validation(format!(
                "推進資料對應狀態 {}，與目標狀態 {} 不符",
                expected, to
            )));
        }
        Ok(())
    }

    /// 檢查後退補償
    pub fn check_rollback(from: OrderStatus, to: OrderStatus) -> Result<()> {
        match (from, to) {
            (OrderStatus::MaterialReserved, OrderStatus::Confirmed)
            | (OrderStatus::Confirmed, OrderStatus::Planning) => Ok(()),
            _ => Err(MrpError::IllegalTransition { from, to }),
        }
    }

    /// 檢查取消（開工前才可取消）
    pub fn check_cancel(from: OrderStatus) -> Result<()> {
        if from.is_cancellable() {
            Ok(())
        } else {
            Err(MrpError::IllegalTransition {
                from,
                to: OrderStatus::Canceled,
            })
        }
    }

    /// 從某狀態可到達的全部狀態
    pub fn reachable_from(from: OrderStatus) -> Vec<OrderStatus> {
        OrderStatus::ALL
            .into_iter()
            .filter(|&to| {
                Self::check_advance(from, to).is_ok()
                    || Self::check_rollback(from, to).is_ok()
                    || (to == OrderStatus::Canceled && Self::check_cancel(from).is_ok())
            })
            .collect()
    }
}
