//! 物料投入（PROD_USED）

use mrp_core::{InventoryLogEntry, IoType, MrpError, Reservation, ReservationState, Result};

use crate::store::Transaction;

/// 投入處理器
pub struct ConsumptionProcessor;

impl ConsumptionProcessor {
    /// 把工單的有效預約轉為實際投入
    ///
    /// 每筆預約同時扣減現有庫存與已分配數量，並寫入 PROD_USED 帳。
    /// 回傳投入筆數。
    pub fn consume(
        tx: &mut Transaction<'_>,
        order_no: &str,
        remark: Option<&str>,
    ) -> Result<usize> {
        let reservations = tx.reservations(order_no);
        let active: Vec<&Reservation> = reservations
            .iter()
            .filter(|r| r.state == ReservationState::Active)
            .collect();

        if active.is_empty() {
            let consumed = reservations
                .iter()
                .any(|r| r.state == ReservationState::Consumed);
            return Err(if consumed {
                MrpError::AlreadyConsumed(order_no.to_string())
            } else {
                MrpError::NoActiveReservation(order_no.to_string())
            });
        }

        let remark = remark.unwrap_or("生產投入").to_string();
        for reservation in &active {
            tx.adjust_stock(
                &reservation.material_item_code,
                &reservation.warehouse_code,
                -reservation.qty,
                -reservation.qty,
            )?;

            let entry = InventoryLogEntry::new(
                IoType::ProdUsed,
                reservation.material_item_code.clone(),
                reservation.qty,
                tx.now(),
            )
            .from_warehouse(&reservation.warehouse_code)
            .with_deltas(-reservation.qty, -reservation.qty)
            .with_ref_no(order_no)
            .with_remark(Some(remark.clone()));
            tx.append_log(entry);

            tx.set_reservation_state(reservation.id, ReservationState::Consumed)?;
        }

        tracing::info!("工單 {} 物料投入：{} 筆", order_no, active.len());
        Ok(active.len())
    }
}
