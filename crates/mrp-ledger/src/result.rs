//! 生產實績登錄

use chrono::NaiveDate;
use mrp_core::{
    InventoryLogEntry, IoType, MrpError, ProductionOutcome, ProductionResult, Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::store::Transaction;

/// 生產實績輸入（良品數由計劃數與不良數推導，不可直接指定）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultInput {
    pub bad_qty: Decimal,
    pub bad_reason: Option<String>,

    /// 實績日期（未指定時為當天）
    pub result_date: Option<NaiveDate>,

    pub warehouse_code: Option<String>,
    pub remark: Option<String>,
}

impl ResultInput {
    pub fn new(bad_qty: Decimal) -> Self {
        Self {
            bad_qty,
            ..Default::default()
        }
    }

    pub fn with_bad_reason(mut self, reason: &str) -> Self {
        self.bad_reason = Some(reason.to_string());
        self
    }

    pub fn with_result_date(mut self, date: NaiveDate) -> Self {
        self.result_date = Some(date);
        self
    }

    pub fn with_warehouse(mut self, warehouse_code: &str) -> Self {
        self.warehouse_code = Some(warehouse_code.to_string());
        self
    }

    pub fn with_remark(mut self, remark: &str) -> Self {
        self.remark = Some(remark.to_string());
        self
    }
}

/// 實績登錄器
pub struct ResultRecorder;

impl ResultRecorder {
    /// 登錄生產實績
    ///
    /// 不良數必須在 `[0, 計劃數]`，良品數 = max(0, 計劃數 − 不良數)。
    /// 實績保存在工單上，並寫入一筆不影響庫存的 PROD_RESULT 稽核帳。
    pub fn record(
        tx: &mut Transaction<'_>,
        order_no: &str,
        input: ResultInput,
    ) -> Result<ProductionResult> {
        let mut order = tx.order(order_no)?.clone();

        if input.bad_qty < Decimal::ZERO || input.bad_qty > order.plan_qty {
            return Err(MrpError::Validation(format!(
                "不良數量必須介於 0 與計劃數量 {} 之間: {}",
                order.plan_qty, input.bad_qty
            )));
        }
        if let Some(wh) = &input.warehouse_code {
            if wh.trim().is_empty() {
                return Err(MrpError::Validation("實績倉庫代碼不可為空白".to_string()));
            }
        }

        let good_qty = order.good_qty_for(input.bad_qty);
        let seq = tx.results(order_no).len() as u32 + 1;

        let result = ProductionResult {
            order_no: order_no.to_string(),
            seq,
            result_date: input
                .result_date
                .unwrap_or_else(|| tx.now().date_naive()),
            warehouse_code: input.warehouse_code,
            good_qty,
            bad_qty: input.bad_qty,
            bad_reason: input.bad_reason.clone(),
            remark: input.remark.clone(),
            recorded_at: tx.now(),
        };

        let entry = InventoryLogEntry::new(
            IoType::ProdResult,
            order.product_item_code.clone(),
            good_qty,
            tx.now(),
        )
        .with_ref_no(order_no)
        .with_remark(input.remark.or_else(|| Some("生產實績".to_string())));
        tx.append_log(entry);
        tx.push_result(result.clone());

        order.outcome = Some(ProductionOutcome {
            good_qty,
            bad_qty: input.bad_qty,
            bad_reason: input.bad_reason,
        });
        tx.put_order(order);

        tracing::info!(
            "工單 {} 實績 #{}：良品 {}，不良 {}",
            order_no,
            seq,
            good_qty,
            result.bad_qty
        );
        Ok(result)
    }
}
