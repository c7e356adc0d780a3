//! 生產工單模型

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{MrpError, Result};

/// 生產工單狀態
///
/// 排列順序即正常推進順序，`Canceled` 排在最後，
/// 因此 `status < OrderStatus::Producing` 可直接判斷「尚未開工」。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 01 準備（計劃中）
    Planning,
    /// 02 已確認
    Confirmed,
    /// 03 物料已預約
    MaterialReserved,
    /// 04 生產中
    Producing,
    /// 05 生產完成
    Produced,
    /// 06 已入庫
    Warehoused,
    /// 07 已結案
    Closed,
    /// 09 已取消（終止）
    Canceled,
}

impl OrderStatus {
    /// 全部狀態（依正常順序）
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Planning,
        OrderStatus::Confirmed,
        OrderStatus::MaterialReserved,
        OrderStatus::Producing,
        OrderStatus::Produced,
        OrderStatus::Warehoused,
        OrderStatus::Closed,
        OrderStatus::Canceled,
    ];

    /// 狀態代碼
    pub fn code(&self) -> &'static str {
        match self {
            OrderStatus::Planning => "01",
            OrderStatus::Confirmed => "02",
            OrderStatus::MaterialReserved => "03",
            OrderStatus::Producing => "04",
            OrderStatus::Produced => "05",
            OrderStatus::Warehoused => "06",
            OrderStatus::Closed => "07",
            OrderStatus::Canceled => "09",
        }
    }

    /// 由狀態代碼解析（取消接受 08 與 09）
    pub fn from_code(code: &str) -> Result<Self> {
        match code.trim() {
            "01" => Ok(OrderStatus::Planning),
            "02" => Ok(OrderStatus::Confirmed),
            "03" => Ok(OrderStatus::MaterialReserved),
            "04" => Ok(OrderStatus::Producing),
            "05" => Ok(OrderStatus::Produced),
            "06" => Ok(OrderStatus::Warehoused),
            "07" => Ok(OrderStatus::Closed),
            "08" | "09" => Ok(OrderStatus::Canceled),
            other => Err(MrpError::validation(format!("未知的工單狀態代碼: {}", other))),
        }
    }

    /// 狀態名稱
    pub fn name(&self) -> &'static str {
        match self {
            OrderStatus::Planning => "PLANNING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::MaterialReserved => "MATERIAL_RESERVED",
            OrderStatus::Producing => "PRODUCING",
            OrderStatus::Produced => "PRODUCED",
            OrderStatus::Warehoused => "WAREHOUSED",
            OrderStatus::Closed => "CLOSED",
            OrderStatus::Canceled => "CANCELED",
        }
    }

    /// 正常推進的下一個狀態
    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Planning => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::MaterialReserved),
            OrderStatus::MaterialReserved => Some(OrderStatus::Producing),
            OrderStatus::Producing => Some(OrderStatus::Produced),
            OrderStatus::Produced => Some(OrderStatus::Warehoused),
            OrderStatus::Warehoused => Some(OrderStatus::Closed),
            OrderStatus::Closed | OrderStatus::Canceled => None,
        }
    }

    /// 是否為終止狀態
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Closed | OrderStatus::Canceled)
    }

    /// 是否仍可取消（開工前）
    pub fn is_cancellable(&self) -> bool {
        *self < OrderStatus::Producing
    }

    /// 是否仍可修改計劃內容（品目、數量）
    pub fn is_plan_editable(&self) -> bool {
        matches!(self, OrderStatus::Planning | OrderStatus::Confirmed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

/// 生產實績摘要（保存在工單上）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionOutcome {
    pub good_qty: Decimal,
    pub bad_qty: Decimal,
    pub bad_reason: Option<String>,
}

/// 生產工單
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionOrder {
    /// 工單號（首次保存時產生，之後不可變）
    pub order_no: String,

    /// 計劃日期
    pub plan_date: NaiveDate,

    /// 成品品目
    pub product_item_code: String,

    /// 計劃數量（正整數）
    pub plan_qty: Decimal,

    /// 狀態
    pub status: OrderStatus,

    /// 備註
    pub remark: Option<String>,

    /// 最近一次生產實績
    pub outcome: Option<ProductionOutcome>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductionOrder {
    /// 由草稿建立新工單（狀態固定為 PLANNING）
    pub fn from_draft(order_no: String, draft: OrderDraft, now: DateTime<Utc>) -> Self {
        Self {
            order_no,
            plan_date: draft.plan_date,
            product_item_code: draft.product_item_code,
            plan_qty: draft.plan_qty,
            status: OrderStatus::Planning,
            remark: draft.remark,
            outcome: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 確認前的必要欄位檢查
    pub fn validate_plan(&self) -> Result<()> {
        if self.product_item_code.trim().is_empty() {
            return Err(MrpError::validation(format!(
                "工單 {} 未指定成品品目",
                self.order_no
            )));
        }
        validate_plan_qty(self.plan_qty)
    }

    /// 套用計劃修改
    pub fn apply_update(&mut self, update: OrderUpdate) {
        if let Some(plan_date) = update.plan_date {
            self.plan_date = plan_date;
        }
        if let Some(item) = update.product_item_code {
            if !item.trim().is_empty() {
                self.product_item_code = item;
            }
        }
        if let Some(qty) = update.plan_qty {
            self.plan_qty = qty;
        }
        if update.remark.is_some() {
            self.remark = update.remark;
        }
    }

    /// 良品數 = max(0, 計劃數 − 不良數)
    pub fn good_qty_for(&self, bad_qty: Decimal) -> Decimal {
        (self.plan_qty - bad_qty).max(Decimal::ZERO)
    }
}

/// 計劃數量必須為正整數
pub fn validate_plan_qty(plan_qty: Decimal) -> Result<()> {
    if plan_qty <= Decimal::ZERO {
        return Err(MrpError::validation(format!(
            "計劃數量必須大於 0: {}",
            plan_qty
        )));
    }
    if !plan_qty.fract().is_zero() {
        return Err(MrpError::validation(format!(
            "計劃數量必須為整數: {}",
            plan_qty
        )));
    }
    Ok(())
}

/// 新工單草稿
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub plan_date: NaiveDate,
    pub product_item_code: String,
    pub plan_qty: Decimal,
    pub remark: Option<String>,
}

impl OrderDraft {
    pub fn new(plan_date: NaiveDate, product_item_code: String, plan_qty: Decimal) -> Self {
        Self {
            plan_date,
            product_item_code,
            plan_qty,
            remark: None,
        }
    }

    /// 建構器模式：設置備註
    pub fn with_remark(mut self, remark: String) -> Self {
        self.remark = Some(remark);
        self
    }
}

/// 工單修改（未提供的欄位維持原值）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub plan_date: Option<NaiveDate>,
    pub product_item_code: Option<String>,
    pub plan_qty: Option<Decimal>,
    pub remark: Option<String>,
}

impl OrderUpdate {
    /// 是否會改變物料需求
    pub fn touches_requirements(&self) -> bool {
        self.product_item_code.is_some() || self.plan_qty.is_some()
    }
}

/// 生產實績記錄
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionResult {
    pub order_no: String,

    /// 同一工單內的實績序號（從 1 開始）
    pub seq: u32,

    pub result_date: NaiveDate,
    pub warehouse_code: Option<String>,
    pub good_qty: Decimal,
    pub bad_qty: Decimal,
    pub bad_reason: Option<String>,
    pub remark: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
