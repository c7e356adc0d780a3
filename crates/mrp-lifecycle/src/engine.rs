//! 生產工單引擎
//!
//! 對外提供工單建立、推進、後退、取消與查詢。每個狀態轉換都在單一交易內完成：
//! 需要庫存資料的計算（MRP、分配）先在交易外以快照進行，交易內再重新檢查
//! 工單狀態，並由預約帳以目前庫存做最終檢查。

use mrp_calc::{AllocationEngine, MrpCalculator};
use mrp_core::{
    AllocationPlan, BomResolver, ConsumptionTiming, EngineConfig, InventoryLogEntry, MrpError,
    MrpReport, OrderDraft, OrderStatus, OrderUpdate, ProductionOrder, ProductionResult,
    Reservation, Result, StockQueryService, Warehouse, WarehouseDirectory, WarehouseFilter,
    WarehouseQty,
};
use mrp_ledger::{
    ConsumptionProcessor, InMemoryStore, ReceiptAllocator, ReservationLedger, ResultInput,
    ResultRecorder, Transaction,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::state_machine::{AdvancePayload, StateMachine};

/// 生產工單引擎
#[derive(Clone)]
pub struct ProductionEngine {
    store: Arc<InMemoryStore>,
    warehouses: Arc<dyn WarehouseDirectory>,
    calculator: MrpCalculator,
    allocator: AllocationEngine,
    config: EngineConfig,
}

impl ProductionEngine {
    /// 創建引擎（庫存查詢直接使用儲存本身）
    pub fn new(
        store: Arc<InMemoryStore>,
        bom: Arc<dyn BomResolver>,
        warehouses: Arc<dyn WarehouseDirectory>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let stock: Arc<dyn StockQueryService> = store.clone();
        Ok(Self {
            calculator: MrpCalculator::new(bom, stock, config.clone()),
            allocator: AllocationEngine::new(&config),
            store,
            warehouses,
            config,
        })
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========== 工單 ==========

    /// 建立工單（狀態 PLANNING）
    ///
    /// 工單號 = 前綴 + `yyyyMMddHHmmssSSS`；同一毫秒重複時加上 `-n`。
    pub fn create_order(&self, draft: OrderDraft) -> Result<ProductionOrder> {
        check_draft_qty(draft.plan_qty)?;

        self.store.transaction(|tx| {
            let base = format!(
                "{}{}",
                self.config.order_no_prefix,
                tx.now().format("%Y%m%d%H%M%S%3f")
            );
            let mut order_no = base.clone();
            let mut suffix = 1;
            while tx.contains_order(&order_no) {
                order_no = format!("{}-{}", base, suffix);
                suffix += 1;
            }

            let order = ProductionOrder::from_draft(order_no.clone(), draft, tx.now());
            tx.put_order(order);
            tracing::info!("建立工單 {}", order_no);
            Ok(tx.order(&order_no)?.clone())
        })
    }

    /// 修改工單計劃（僅 PLANNING / CONFIRMED）
    pub fn update_order(&self, order_no: &str, update: OrderUpdate) -> Result<ProductionOrder> {
        if let Some(qty) = update.plan_qty {
            check_draft_qty(qty)?;
        }

        self.store.transaction(|tx| {
            let mut order = tx.order(order_no)?.clone();
            if !order.status.is_plan_editable() {
                return Err(MrpError::Validation(format!(
                    "工單 {} 狀態 {} 不可修改",
                    order_no, order.status
                )));
            }

            let touches = update.touches_requirements();
            order.apply_update(update);
            if order.status == OrderStatus::Confirmed {
                order.validate_plan()?;
            }
            if touches {
                tracing::debug!("工單 {} 計劃變更，物料需求需重新計算", order_no);
            }

            tx.put_order(order);
            Ok(tx.order(order_no)?.clone())
        })
    }

    pub fn order(&self, order_no: &str) -> Result<ProductionOrder> {
        self.store.order(order_no)
    }

    pub fn results(&self, order_no: &str) -> Result<Vec<ProductionResult>> {
        self.store.results(order_no)
    }

    pub fn reservations(&self, order_no: &str) -> Result<Vec<Reservation>> {
        self.store.reservations(order_no)
    }

    /// 工單相關的庫存帳
    pub fn order_log(&self, order_no: &str) -> Result<Vec<InventoryLogEntry>> {
        self.store.order_log(order_no)
    }

    pub fn warehouses(&self, filter: &WarehouseFilter) -> Result<Vec<Warehouse>> {
        self.warehouses.warehouses(filter)
    }

    // ========== MRP ==========

    /// 物料需求報告
    pub fn mrp_report(&self, product_item_code: &str, plan_qty: Decimal) -> Result<MrpReport> {
        self.calculator.calculate(product_item_code, plan_qty)
    }

    /// 依工單目前計劃計算物料需求報告
    pub fn order_mrp_report(&self, order_no: &str) -> Result<MrpReport> {
        let order = self.store.order(order_no)?;
        order.validate_plan()?;
        self.mrp_report(&order.product_item_code, order.plan_qty)
    }

    // ========== 狀態轉換 ==========

    /// 推進工單狀態
    pub fn advance(
        &self,
        order_no: &str,
        target: OrderStatus,
        payload: AdvancePayload,
    ) -> Result<ProductionOrder> {
        let current = self.store.order(order_no)?;
        if let Err(err) = StateMachine::check_advance(current.status, target)
            .and_then(|_| StateMachine::check_payload(target, &payload))
        {
            tracing::warn!("工單 {} 推進被拒：{}", order_no, err);
            return Err(err);
        }

        let result = match payload {
            AdvancePayload::Confirm {
                acknowledge_shortage,
            } => self.confirm(&current, acknowledge_shortage),
            AdvancePayload::Reserve { plan } => self.reserve(&current, &plan),
            AdvancePayload::StartProduction => self.start_production(&current),
            AdvancePayload::RecordResult(input) => self.record_result(&current, input),
            AdvancePayload::Receive {
                allocations,
                remark,
            } => self.receive(&current, &allocations, remark.as_deref()),
            AdvancePayload::Close => self.commit_transition(&current, target, |_, _| Ok(())),
        };

        if let Err(err) = &result {
            tracing::warn!("工單 {} 推進至 {} 失敗：{}", order_no, target, err);
        }
        result
    }

    /// 後退補償（僅 03 → 02 與 02 → 01）
    pub fn rollback(&self, order_no: &str, target: OrderStatus) -> Result<ProductionOrder> {
        let current = self.store.order(order_no)?;
        StateMachine::check_rollback(current.status, target)?;

        self.commit_transition(&current, target, |tx, order| {
            if order.status == OrderStatus::MaterialReserved {
                ReservationLedger::unreserve(tx, &order.order_no, Some("預約取消"))?;
            }
            Ok(())
        })
    }

    /// 取消工單（開工前）；有預約時先解除
    pub fn cancel(&self, order_no: &str, remark: Option<&str>) -> Result<ProductionOrder> {
        let current = self.store.order(order_no)?;
        StateMachine::check_cancel(current.status)?;

        self.commit_transition(&current, OrderStatus::Canceled, |tx, order| {
            ReservationLedger::unreserve(tx, &order.order_no, remark.or(Some("工單取消")))?;
            Ok(())
        })
    }

    fn confirm(
        &self,
        current: &ProductionOrder,
        acknowledge_shortage: bool,
    ) -> Result<ProductionOrder> {
        current.validate_plan()?;

        let report = self.mrp_report(&current.product_item_code, current.plan_qty)?;
        if let Some(shortage) = report.shortages().next() {
            if !acknowledge_shortage {
                return Err(MrpError::InsufficientStock {
                    material: shortage.material_item_code.clone(),
                    required: shortage.required_qty,
                    available: shortage.available_qty,
                });
            }
            tracing::warn!(
                "工單 {} 在缺料 {} 種的情況下確認",
                current.order_no,
                report.shortages().count()
            );
        }

        self.commit_transition(current, OrderStatus::Confirmed, |_, order| {
            ensure_same_plan(current, order)?;
            order.validate_plan()
        })
    }

    fn reserve(&self, current: &ProductionOrder, plan: &AllocationPlan) -> Result<ProductionOrder> {
        // 交易外：以庫存快照計算分配
        let report = self.mrp_report(&current.product_item_code, current.plan_qty)?;
        let resolved = self.allocator.resolve(&current.order_no, &report, plan)?;

        // 交易內：預約帳以目前庫存做最終檢查
        self.commit_transition(current, OrderStatus::MaterialReserved, |tx, order| {
            ensure_same_plan(current, order)?;
            ReservationLedger::reserve(tx, &order.order_no, &resolved, plan.remark.as_deref())?;
            if self.config.consumption_timing == ConsumptionTiming::OnReserve {
                ConsumptionProcessor::consume(tx, &order.order_no, plan.remark.as_deref())?;
            }
            Ok(())
        })
    }

    fn start_production(&self, current: &ProductionOrder) -> Result<ProductionOrder> {
        let report = self.mrp_report(&current.product_item_code, current.plan_qty)?;
        let required: BTreeMap<String, Decimal> = report
            .into_requirements()
            .into_iter()
            .filter(|r| r.required_qty > Decimal::ZERO)
            .map(|r| (r.material_item_code, r.required_qty))
            .collect();

        self.commit_transition(current, OrderStatus::Producing, |tx, order| {
            ensure_same_plan(current, order)?;

            let mut reserved: BTreeMap<String, Decimal> = BTreeMap::new();
            for reservation in tx.reservations(&order.order_no) {
                if reservation.is_outstanding() {
                    *reserved.entry(reservation.material_item_code).or_default() +=
                        reservation.qty;
                }
            }
            if reserved != required {
                return Err(MrpError::Validation(format!(
                    "工單 {} 物料分配未完成，無法開工",
                    order.order_no
                )));
            }

            if self.config.consumption_timing == ConsumptionTiming::OnProductionStart {
                ConsumptionProcessor::consume(tx, &order.order_no, None)?;
            }
            Ok(())
        })
    }

    fn record_result(
        &self,
        current: &ProductionOrder,
        input: ResultInput,
    ) -> Result<ProductionOrder> {
        self.commit_transition(current, OrderStatus::Produced, |tx, order| {
            ResultRecorder::record(tx, &order.order_no, input)?;
            Ok(())
        })
    }

    fn receive(
        &self,
        current: &ProductionOrder,
        allocations: &[WarehouseQty],
        remark: Option<&str>,
    ) -> Result<ProductionOrder> {
        self.commit_transition(current, OrderStatus::Warehoused, |tx, order| {
            ReceiptAllocator::receive(
                tx,
                order,
                allocations,
                self.warehouses.as_ref(),
                &self.config,
                remark,
            )?;
            Ok(())
        })
    }

    /// 在交易內重新確認狀態、執行副作用並寫入新狀態
    fn commit_transition<F>(
        &self,
        current: &ProductionOrder,
        target: OrderStatus,
        side_effect: F,
    ) -> Result<ProductionOrder>
    where
        F: FnOnce(&mut Transaction<'_>, &ProductionOrder) -> Result<()>,
    {
        let order_no = current.order_no.as_str();
        let order = self.store.transaction(|tx| {
            let order = tx.order(order_no)?.clone();
            if order.status != current.status {
                return Err(MrpError::IllegalTransition {
                    from: order.status,
                    to: target,
                });
            }

            side_effect(tx, &order)?;

            let mut updated = tx.order(order_no)?.clone();
            updated.status = target;
            tx.put_order(updated);
            Ok(tx.order(order_no)?.clone())
        })?;

        tracing::info!("工單 {} 狀態 {} → {}", order_no, current.status, target);
        Ok(order)
    }
}

/// 草稿階段的計劃數量：可暫時為 0，但不可為負數或小數
fn check_draft_qty(plan_qty: Decimal) -> Result<()> {
    if plan_qty < Decimal::ZERO || !plan_qty.fract().is_zero() {
        return Err(MrpError::Validation(format!(
            "計劃數量必須為非負整數: {}",
            plan_qty
        )));
    }
    Ok(())
}

/// 交易外計算後，工單計劃不可被修改
fn ensure_same_plan(snapshot: &ProductionOrder, order: &ProductionOrder) -> Result<()> {
    if snapshot.product_item_code != order.product_item_code
        || snapshot.plan_qty != order.plan_qty
    {
        return Err(MrpError::Validation(format!(
            "工單 {} 計劃已在計算後被修改，請重新計算",
            order.order_no
        )));
    }
    Ok(())
}
