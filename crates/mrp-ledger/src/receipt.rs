//! 成品入庫分配

use mrp_core::{
    EngineConfig, InventoryLogEntry, IoType, MrpError, ProductionOrder, Result,
    WarehouseDirectory, WarehouseQty,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::store::Transaction;

/// 入庫分配器
pub struct ReceiptAllocator;

impl ReceiptAllocator {
    /// 把工單良品數分配到一個或多個倉庫
    ///
    /// 合計必須剛好等於良品數，否則以 `InvariantViolation` 拒絕。
    /// 同一倉庫多筆會合併，回傳合併後的入庫明細（依倉庫代碼排序）。
    /// 良品數為 0 時入庫以 0 反映：明細可為空或全為 0，不寫入庫存。
    pub fn receive(
        tx: &mut Transaction<'_>,
        order: &ProductionOrder,
        allocations: &[WarehouseQty],
        directory: &dyn WarehouseDirectory,
        config: &EngineConfig,
        remark: Option<&str>,
    ) -> Result<Vec<WarehouseQty>> {
        let good_qty = order
            .outcome
            .as_ref()
            .map(|o| o.good_qty)
            .ok_or_else(|| {
                MrpError::Validation(format!("工單 {} 尚未登錄生產實績", order.order_no))
            })?;

        if good_qty.is_zero() && allocations.iter().all(|line| line.qty.is_zero()) {
            tracing::info!("工單 {} 良品數為 0，入庫以 0 反映", order.order_no);
            return Ok(Vec::new());
        }

        if allocations.is_empty() {
            return Err(MrpError::Validation(format!(
                "工單 {} 未指定入庫倉庫",
                order.order_no
            )));
        }

        let mut merged: BTreeMap<&str, Decimal> = BTreeMap::new();
        for line in allocations {
            let code = line.warehouse_code.trim();
            if code.is_empty() {
                return Err(MrpError::Validation("入庫倉庫代碼不可為空白".to_string()));
            }
            if line.qty <= Decimal::ZERO {
                return Err(MrpError::Validation(format!(
                    "倉庫 {} 入庫數量必須大於 0: {}",
                    code, line.qty
                )));
            }
            if config.require_integral_receipt && !line.qty.fract().is_zero() {
                return Err(MrpError::Validation(format!(
                    "倉庫 {} 入庫數量必須為整數: {}",
                    code, line.qty
                )));
            }
            *merged.entry(code).or_default() += line.qty;
        }

        for code in merged.keys() {
            if directory.warehouse(code)?.is_none() {
                return Err(MrpError::Validation(format!("找不到倉庫: {}", code)));
            }
        }

        let total: Decimal = merged.values().copied().sum();
        if total != good_qty {
            return Err(MrpError::InvariantViolation(format!(
                "工單 {} 入庫合計 {} 與良品數 {} 不符",
                order.order_no, total, good_qty
            )));
        }

        let remark = remark.unwrap_or("生產入庫").to_string();
        let mut received = Vec::with_capacity(merged.len());
        for (code, qty) in merged {
            tx.adjust_stock(&order.product_item_code, code, qty, Decimal::ZERO)?;

            let entry = InventoryLogEntry::new(
                IoType::ProdResult,
                order.product_item_code.clone(),
                qty,
                tx.now(),
            )
            .to_warehouse(code)
            .with_deltas(qty, Decimal::ZERO)
            .with_ref_no(&order.order_no)
            .with_remark(Some(remark.clone()));
            tx.append_log(entry);

            tracing::debug!("工單 {} 入庫 {}：{}", order.order_no, code, qty);
            received.push(WarehouseQty::new(code, qty));
        }

        tracing::info!(
            "工單 {} 成品入庫完成：{} 個倉庫，合計 {}",
            order.order_no,
            received.len(),
            total
        );
        Ok(received)
    }
}
