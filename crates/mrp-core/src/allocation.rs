//! 物料分配與預約模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 分配策略（每種物料獨立決定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocationPolicy {
    /// 作業員指定倉庫與數量
    Manual,
    /// 系統自動分配
    Automatic,
}

/// 倉庫 → 數量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseQty {
    pub warehouse_code: String,
    pub qty: Decimal,
}

impl WarehouseQty {
    pub fn new(warehouse_code: impl Into<String>, qty: Decimal) -> Self {
        Self {
            warehouse_code: warehouse_code.into(),
            qty,
        }
    }
}

/// 分配計劃
///
/// 只記錄作業員手動指定的物料；未出現在計劃中的物料於預約時自動分配。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationPlan {
    manual: BTreeMap<String, Vec<WarehouseQty>>,

    /// 預約備註（寫入庫存帳）
    pub remark: Option<String>,
}

impl AllocationPlan {
    /// 創建空計劃（全部自動分配）
    pub fn automatic() -> Self {
        Self::default()
    }

    /// 添加手動分配
    pub fn add_manual(&mut self, material_item_code: &str, warehouse_code: &str, qty: Decimal) {
        self.manual
            .entry(material_item_code.to_string())
            .or_default()
            .push(WarehouseQty::new(warehouse_code, qty));
    }

    /// 建構器模式：添加手動分配
    pub fn with_manual(
        mut self,
        material_item_code: &str,
        warehouse_code: &str,
        qty: Decimal,
    ) -> Self {
        self.add_manual(material_item_code, warehouse_code, qty);
        self
    }

    /// 建構器模式：設置備註
    pub fn with_remark(mut self, remark: String) -> Self {
        self.remark = Some(remark);
        self
    }

    /// 取得物料的手動分配（空清單視為未指定）
    pub fn manual_for(&self, material_item_code: &str) -> Option<&[WarehouseQty]> {
        self.manual
            .get(material_item_code)
            .filter(|lines| !lines.is_empty())
            .map(Vec::as_slice)
    }

    /// 手動指定的物料
    pub fn manual_materials(&self) -> impl Iterator<Item = &str> {
        self.manual.keys().map(String::as_str)
    }

    pub fn is_automatic(&self) -> bool {
        self.manual.values().all(Vec::is_empty)
    }
}

/// 單筆分配（工單 × 物料 × 倉庫）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub order_no: String,
    pub material_item_code: String,
    pub warehouse_code: String,
    pub qty: Decimal,
}

/// 單一物料的分配結果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialAllocation {
    pub material_item_code: String,
    pub policy: AllocationPolicy,
    pub required_qty: Decimal,
    pub allocations: Vec<Allocation>,
}

impl MaterialAllocation {
    /// 已分配合計
    pub fn allocated_qty(&self) -> Decimal {
        self.allocations.iter().map(|a| a.qty).sum()
    }

    /// 分配合計是否等於需求
    pub fn is_complete(&self) -> bool {
        self.allocated_qty() == self.required_qty
    }
}

/// 預約狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationState {
    /// 已鎖定庫存
    Active,
    /// 已投入生產（庫存已扣減）
    Consumed,
    /// 已釋放
    Released,
}

/// 預約記錄（持久化，取代以庫存帳重建分配）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub order_no: String,
    pub material_item_code: String,
    pub warehouse_code: String,
    pub qty: Decimal,
    pub policy: AllocationPolicy,
    pub state: ReservationState,
    pub reserved_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(
        allocation: &Allocation,
        policy: AllocationPolicy,
        reserved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_no: allocation.order_no.clone(),
            material_item_code: allocation.material_item_code.clone(),
            warehouse_code: allocation.warehouse_code.clone(),
            qty: allocation.qty,
            policy,
            state: ReservationState::Active,
            reserved_at,
        }
    }

    /// 尚未釋放（有效或已投入）
    pub fn is_outstanding(&self) -> bool {
        self.state != ReservationState::Released
    }
}
