//! 物料預約與預約解除

use mrp_core::{
    InventoryLogEntry, IoType, MaterialAllocation, MrpError, Reservation, ReservationState,
    Result,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::store::{StockKey, Transaction};

/// 預約帳
pub struct ReservationLedger;

impl ReservationLedger {
    /// 預約：逐列增加已分配數量
    ///
    /// 先以目前庫存檢查整批（同一列多筆會累加），任何一筆不足即以
    /// `ConcurrentAllocationConflict` 失敗，不做任何修改。
    pub fn reserve(
        tx: &mut Transaction<'_>,
        order_no: &str,
        materials: &[MaterialAllocation],
        remark: Option<&str>,
    ) -> Result<Vec<Reservation>> {
        // Step 1: 整批檢查
        let mut requested: BTreeMap<StockKey, Decimal> = BTreeMap::new();
        for material in materials {
            for allocation in &material.allocations {
                if allocation.qty <= Decimal::ZERO {
                    return Err(MrpError::Validation(format!(
                        "物料 {} 倉庫 {} 預約數量必須大於 0",
                        allocation.material_item_code, allocation.warehouse_code
                    )));
                }
                *requested
                    .entry((
                        allocation.material_item_code.clone(),
                        allocation.warehouse_code.clone(),
                    ))
                    .or_default() += allocation.qty;
            }
        }

        if requested.is_empty() {
            return Err(MrpError::Validation(format!(
                "工單 {} 沒有可預約的物料（請確認 BOM 設定）",
                order_no
            )));
        }

        for ((item_code, warehouse_code), qty) in &requested {
            let available = tx
                .stock_level(item_code, warehouse_code)
                .map(|row| row.available_qty())
                .unwrap_or(Decimal::ZERO);
            if available < *qty {
                tracing::warn!(
                    "預約衝突：工單 {} 物料 {}@{} 請求 {}，可用 {}",
                    order_no,
                    item_code,
                    warehouse_code,
                    qty,
                    available
                );
                return Err(MrpError::ConcurrentAllocationConflict {
                    material: item_code.clone(),
                    warehouse: warehouse_code.clone(),
                    requested: *qty,
                    available,
                });
            }
        }

        // Step 2: 寫入
        let remark = remark.unwrap_or("生產預約").to_string();
        let mut reservations = Vec::new();
        for material in materials {
            for allocation in &material.allocations {
                tx.adjust_stock(
                    &allocation.material_item_code,
                    &allocation.warehouse_code,
                    Decimal::ZERO,
                    allocation.qty,
                )?;

                let entry = InventoryLogEntry::new(
                    IoType::Reserve,
                    allocation.material_item_code.clone(),
                    allocation.qty,
                    tx.now(),
                )
                .to_warehouse(&allocation.warehouse_code)
                .with_deltas(Decimal::ZERO, allocation.qty)
                .with_ref_no(order_no)
                .with_remark(Some(remark.clone()));
                tx.append_log(entry);

                let reservation = Reservation::new(allocation, material.policy, tx.now());
                tx.insert_reservation(reservation.clone());
                reservations.push(reservation);
            }
        }

        tracing::info!("工單 {} 預約完成：{} 筆", order_no, reservations.len());
        Ok(reservations)
    }

    /// 預約解除：依相反順序還原工單尚未釋放的預約
    ///
    /// - 有效預約：減少已分配數量
    /// - 已投入的預約（開工前）：把投入的數量退回現有庫存
    ///
    /// 沒有尚未釋放的預約時不做任何事，回傳 0。
    pub fn unreserve(
        tx: &mut Transaction<'_>,
        order_no: &str,
        remark: Option<&str>,
    ) -> Result<usize> {
        let outstanding: Vec<Reservation> = tx
            .reservations(order_no)
            .into_iter()
            .filter(Reservation::is_outstanding)
            .collect();

        if outstanding.is_empty() {
            tracing::debug!("工單 {} 沒有需要解除的預約", order_no);
            return Ok(0);
        }

        let remark = remark.unwrap_or("預約解除").to_string();
        for reservation in outstanding.iter().rev() {
            let (stock_delta, alloc_delta) = match reservation.state {
                ReservationState::Active => (Decimal::ZERO, -reservation.qty),
                ReservationState::Consumed => (reservation.qty, Decimal::ZERO),
                ReservationState::Released => continue,
            };

            tx.adjust_stock(
                &reservation.material_item_code,
                &reservation.warehouse_code,
                stock_delta,
                alloc_delta,
            )?;

            let entry = InventoryLogEntry::new(
                IoType::Unreserve,
                reservation.material_item_code.clone(),
                reservation.qty,
                tx.now(),
            )
            .to_warehouse(&reservation.warehouse_code)
            .with_deltas(stock_delta, alloc_delta)
            .with_ref_no(order_no)
            .with_remark(Some(remark.clone()));
            tx.append_log(entry);

            tx.set_reservation_state(reservation.id, ReservationState::Released)?;
        }

        tracing::info!("工單 {} 預約解除：{} 筆", order_no, outstanding.len());
        Ok(outstanding.len())
    }
}
