//! 集成測試

use chrono::NaiveDate;
use prod_mrp::mrp_ledger::ReservationLedger;
use prod_mrp::mrp_core::{AutoAllocationOrder, ConsumptionTiming, LossRatePolicy};
use prod_mrp::*;
use rstest::rstest;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

// ========== 測試環境 ==========

fn bom() -> StaticBomResolver {
    StaticBomResolver::new()
        // P 每單位需要 2 個 M
        .with_line(BomLine::new("P".into(), "M".into(), 10, Decimal::TWO))
        // Q：同一物料兩行（1 + 1.5）與一個無庫存物料
        .with_line(BomLine::new("Q".into(), "M".into(), 10, Decimal::ONE))
        .with_line(BomLine::new("Q".into(), "N".into(), 20, Decimal::ONE))
        .with_line(BomLine::new("Q".into(), "M".into(), 30, Decimal::new(15, 1)))
        // L：損耗率 10%
        .with_line(
            BomLine::new("L".into(), "M".into(), 10, Decimal::TWO).with_loss_rate(Decimal::TEN),
        )
}

fn warehouses() -> StaticWarehouseDirectory {
    StaticWarehouseDirectory::new()
        .with_warehouse("A", "原料 A 倉", "RAW")
        .with_warehouse("B", "原料 B 倉", "RAW")
        .with_warehouse("WH1", "成品一倉", "FINISHED")
        .with_warehouse("WH2", "成品二倉", "FINISHED")
}

/// M: A=15, B=10
fn engine_with(config: EngineConfig) -> ProductionEngine {
    let store = Arc::new(InMemoryStore::new());
    store.stock_in("M", "A", Decimal::from(15), None).unwrap();
    store.stock_in("M", "B", Decimal::from(10), None).unwrap();
    ProductionEngine::new(store, Arc::new(bom()), Arc::new(warehouses()), config).unwrap()
}

fn engine() -> ProductionEngine {
    engine_with(EngineConfig::default())
}

fn new_order(engine: &ProductionEngine, product: &str, qty: i64) -> String {
    engine
        .create_order(OrderDraft::new(
            NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
            product.to_string(),
            Decimal::from(qty),
        ))
        .unwrap()
        .order_no
}

fn confirmed_order(engine: &ProductionEngine, product: &str, qty: i64) -> String {
    let no = new_order(engine, product, qty);
    engine
        .advance(&no, OrderStatus::Confirmed, AdvancePayload::confirm())
        .unwrap();
    no
}

fn row(engine: &ProductionEngine, item: &str, wh: &str) -> StockLevel {
    engine.store().stock_level(item, wh).unwrap().unwrap()
}

// ========== 狀態機 ==========

#[test]
fn test_full_lifecycle_only_uses_table_transitions() {
    prod_mrp::logging::init_test();
    let engine = engine();
    let no = new_order(&engine, "P", 10);

    let steps = vec![
        (OrderStatus::Confirmed, AdvancePayload::confirm()),
        (OrderStatus::MaterialReserved, AdvancePayload::reserve_automatic()),
        (OrderStatus::Producing, AdvancePayload::StartProduction),
        (
            OrderStatus::Produced,
            AdvancePayload::RecordResult(ResultInput::new(Decimal::from(3))),
        ),
        (
            OrderStatus::Warehoused,
            AdvancePayload::receive(vec![
                WarehouseQty::new("WH1", Decimal::from(4)),
                WarehouseQty::new("WH2", Decimal::from(3)),
            ]),
        ),
        (OrderStatus::Closed, AdvancePayload::Close),
    ];

    let mut previous = engine.order(&no).unwrap().status;
    assert_eq!(previous, OrderStatus::Planning);
    for (target, payload) in steps {
        let order = engine.advance(&no, target, payload).unwrap();
        assert_eq!(order.status, target);
        assert!(StateMachine::check_advance(previous, order.status).is_ok());
        assert_eq!(OrderStatus::from_code(order.status.code()).unwrap(), order.status);
        previous = order.status;
    }

    // 結案後不可再推進或取消
    assert!(engine.cancel(&no, None).is_err());
    assert!(StateMachine::reachable_from(OrderStatus::Closed).is_empty());
}

#[test]
fn test_illegal_transitions_never_mutate() {
    let engine = engine();
    let no = confirmed_order(&engine, "P", 10);
    let before = engine.store().stock_snapshot().unwrap();

    // 跳過預約
    let err = engine
        .advance(&no, OrderStatus::Producing, AdvancePayload::StartProduction)
        .unwrap_err();
    assert!(matches!(err, MrpError::IllegalTransition { .. }));

    // 不允許的後退
    assert!(engine.rollback(&no, OrderStatus::Confirmed).is_err());

    engine.cancel(&no, None).unwrap();
    let err = engine
        .advance(&no, OrderStatus::MaterialReserved, AdvancePayload::reserve_automatic())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(engine.order(&no).unwrap().status, OrderStatus::Canceled);
    assert_eq!(engine.store().stock_snapshot().unwrap(), before);
    assert!(engine.order_log(&no).unwrap().is_empty());
}

#[test]
fn test_rollback_confirmed_to_planning() {
    let engine = engine();
    let no = confirmed_order(&engine, "P", 10);
    let before = engine.store().stock_snapshot().unwrap();

    let order = engine.rollback(&no, OrderStatus::Planning).unwrap();
    assert_eq!(order.status, OrderStatus::Planning);
    assert_eq!(engine.store().stock_snapshot().unwrap(), before);
    assert!(engine.order_log(&no).unwrap().is_empty());

    // 退回後可修改計劃並重新確認
    engine
        .update_order(
            &no,
            OrderUpdate {
                plan_qty: Some(Decimal::from(5)),
                ..Default::default()
            },
        )
        .unwrap();
    let order = engine
        .advance(&no, OrderStatus::Confirmed, AdvancePayload::confirm())
        .unwrap();
    assert_eq!(order.plan_qty, Decimal::from(5));
}

/// 預約後 BOM 用量由 2 變為 3
struct RevisedBom {
    revised: AtomicBool,
}

impl BomResolver for RevisedBom {
    fn bom_lines(&self, parent_item_code: &str) -> prod_mrp::Result<Vec<BomLine>> {
        if parent_item_code != "P" {
            return Ok(Vec::new());
        }
        let qty = if self.revised.load(Ordering::SeqCst) {
            Decimal::from(3)
        } else {
            Decimal::TWO
        };
        Ok(vec![BomLine::new("P".into(), "M".into(), 10, qty)])
    }
}

#[test]
fn test_start_production_rejects_incomplete_allocation() {
    let bom = Arc::new(RevisedBom {
        revised: AtomicBool::new(false),
    });
    let store = Arc::new(InMemoryStore::new());
    store.stock_in("M", "A", Decimal::from(15), None).unwrap();
    store.stock_in("M", "B", Decimal::from(10), None).unwrap();
    let engine = ProductionEngine::new(
        store,
        bom.clone(),
        Arc::new(warehouses()),
        EngineConfig::default(),
    )
    .unwrap();

    let no = confirmed_order(&engine, "P", 10);
    engine
        .advance(&no, OrderStatus::MaterialReserved, AdvancePayload::reserve_automatic())
        .unwrap();
    let before = engine.store().stock_snapshot().unwrap();
    let log_len = engine.order_log(&no).unwrap().len();

    bom.revised.store(true, Ordering::SeqCst);
    let err = engine
        .advance(&no, OrderStatus::Producing, AdvancePayload::StartProduction)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(engine.order(&no).unwrap().status, OrderStatus::MaterialReserved);
    assert_eq!(engine.store().stock_snapshot().unwrap(), before);
    assert_eq!(engine.order_log(&no).unwrap().len(), log_len);
}

#[test]
fn test_cannot_cancel_after_production_started() {
    let engine = engine();
    let no = confirmed_order(&engine, "P", 10);
    engine
        .advance(&no, OrderStatus::MaterialReserved, AdvancePayload::reserve_automatic())
        .unwrap();
    engine
        .advance(&no, OrderStatus::Producing, AdvancePayload::StartProduction)
        .unwrap();

    let err = engine.cancel(&no, None).unwrap_err();
    assert!(matches!(
        err,
        MrpError::IllegalTransition {
            from: OrderStatus::Producing,
            to: OrderStatus::Canceled
        }
    ));
    assert!(engine.rollback(&no, OrderStatus::MaterialReserved).is_err());
}

// ========== MRP ==========

#[test]
fn test_required_qty_sums_duplicate_lines() {
    let engine = engine();
    let report = engine.mrp_report("Q", Decimal::from(4)).unwrap();

    let m = report.requirement("M").unwrap();
    assert_eq!(m.quantity_per_unit, Decimal::new(25, 1));
    assert_eq!(m.required_qty, Decimal::from(10));
    assert_eq!(m.available_qty, Decimal::from(25));
    assert_eq!(m.shortage_qty, Decimal::ZERO);

    let n = report.requirement("N").unwrap();
    assert_eq!(n.available_qty, Decimal::ZERO);
    assert_eq!(n.shortage_qty, Decimal::from(4));
    assert!(!n.is_satisfied);
}

#[test]
fn test_loss_rate_excluded_from_baseline_formula() {
    let baseline = engine().mrp_report("L", Decimal::from(10)).unwrap();
    assert_eq!(baseline.requirement("M").unwrap().required_qty, Decimal::from(20));

    let config = EngineConfig::default().with_loss_rate_policy(LossRatePolicy::Inflate);
    let inflated = engine_with(config)
        .mrp_report("L", Decimal::from(10))
        .unwrap();
    // 20 / 0.9 = 22.2222… → 22.223
    assert_eq!(
        inflated.requirement("M").unwrap().required_qty,
        Decimal::new(22223, 3)
    );
}

#[test]
fn test_order_mrp_report_follows_plan_updates() {
    let engine = engine();
    let no = new_order(&engine, "P", 10);
    assert_eq!(
        engine.order_mrp_report(&no).unwrap().requirement("M").unwrap().required_qty,
        Decimal::from(20)
    );

    engine
        .update_order(
            &no,
            OrderUpdate {
                plan_qty: Some(Decimal::from(5)),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(
        engine.order_mrp_report(&no).unwrap().requirement("M").unwrap().required_qty,
        Decimal::from(10)
    );
}

// ========== 分配與預約 ==========

#[test]
fn test_automatic_allocation_draws_a_then_b() {
    let engine = engine_with(
        EngineConfig::default().with_consumption_timing(ConsumptionTiming::OnProductionStart),
    );
    let no = confirmed_order(&engine, "P", 10);
    engine
        .advance(&no, OrderStatus::MaterialReserved, AdvancePayload::reserve_automatic())
        .unwrap();

    let reservations = engine.reservations(&no).unwrap();
    assert_eq!(reservations.len(), 2);
    assert_eq!(
        (reservations[0].warehouse_code.as_str(), reservations[0].qty),
        ("A", Decimal::from(15))
    );
    assert_eq!(
        (reservations[1].warehouse_code.as_str(), reservations[1].qty),
        ("B", Decimal::from(5))
    );
    assert!(reservations
        .iter()
        .all(|r| r.policy == AllocationPolicy::Automatic && r.state == ReservationState::Active));

    let a = row(&engine, "M", "A");
    let b = row(&engine, "M", "B");
    assert_eq!(a.allocated_qty, Decimal::from(15));
    assert_eq!(a.available_qty(), Decimal::ZERO);
    assert_eq!(b.allocated_qty, Decimal::from(5));
    assert!(a.allocated_qty <= a.stock_qty && b.allocated_qty <= b.stock_qty);
}

#[test]
fn test_reserve_consumes_immediately_by_default() {
    let engine = engine();
    let no = confirmed_order(&engine, "P", 10);
    engine
        .advance(&no, OrderStatus::MaterialReserved, AdvancePayload::reserve_automatic())
        .unwrap();

    let a = row(&engine, "M", "A");
    let b = row(&engine, "M", "B");
    assert_eq!((a.stock_qty, a.allocated_qty), (Decimal::ZERO, Decimal::ZERO));
    assert_eq!((b.stock_qty, b.allocated_qty), (Decimal::from(5), Decimal::ZERO));

    let log = engine.order_log(&no).unwrap();
    let io_types: Vec<IoType> = log.iter().map(|e| e.io_type).collect();
    assert_eq!(
        io_types,
        vec![IoType::Reserve, IoType::Reserve, IoType::ProdUsed, IoType::ProdUsed]
    );

    // 庫存帳以代碼序列化
    let json = serde_json::to_value(&log).unwrap();
    assert_eq!(json[2]["io_type"], "PROD_USED");
    assert_eq!(json[2]["from_warehouse"], "A");
    assert!(engine
        .reservations(&no)
        .unwrap()
        .iter()
        .all(|r| r.state == ReservationState::Consumed));
}

#[rstest]
#[case(&[("A", 10), ("B", 10)], true)]
#[case(&[("A", 12), ("B", 8)], true)]
#[case(&[("A", 10), ("B", 9)], false)]
#[case(&[("A", 15), ("B", 10)], false)]
fn test_manual_plan_sum_must_equal_required(#[case] lines: &[(&str, i64)], #[case] ok: bool) {
    let engine = engine();
    let no = confirmed_order(&engine, "P", 10);
    let before = engine.store().stock_snapshot().unwrap();

    let mut plan = AllocationPlan::automatic();
    for (wh, qty) in lines {
        plan.add_manual("M", wh, Decimal::from(*qty));
    }
    let result = engine.advance(
        &no,
        OrderStatus::MaterialReserved,
        AdvancePayload::Reserve { plan },
    );

    assert_eq!(result.is_ok(), ok);
    if let Err(err) = result {
        assert!(matches!(err, MrpError::AllocationMismatch { .. }));
        assert_eq!(engine.store().stock_snapshot().unwrap(), before);
        assert_eq!(engine.order(&no).unwrap().status, OrderStatus::Confirmed);
    } else {
        assert!(engine
            .reservations(&no)
            .unwrap()
            .iter()
            .all(|r| r.policy == AllocationPolicy::Manual));
    }
}

#[test]
fn test_insufficient_stock_leaves_rows_unchanged() {
    let engine = engine();
    let no = new_order(&engine, "P", 13);
    engine
        .advance(
            &no,
            OrderStatus::Confirmed,
            AdvancePayload::Confirm {
                acknowledge_shortage: true,
            },
        )
        .unwrap();
    let before = engine.store().stock_snapshot().unwrap();

    let err = engine
        .advance(&no, OrderStatus::MaterialReserved, AdvancePayload::reserve_automatic())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    assert_eq!(engine.store().stock_snapshot().unwrap(), before);
    assert!(engine.order_log(&no).unwrap().is_empty());
    assert!(engine.reservations(&no).unwrap().is_empty());
    assert_eq!(engine.order(&no).unwrap().status, OrderStatus::Confirmed);
}

#[test]
fn test_largest_available_first_from_json_config() {
    let config = EngineConfig::from_json_str(
        r#"{
            "auto_allocation_order": "LargestAvailableFirst",
            "consumption_timing": "OnProductionStart"
        }"#,
    )
    .unwrap();
    assert_eq!(config.auto_allocation_order, AutoAllocationOrder::LargestAvailableFirst);

    let engine = engine_with(config);
    let no = confirmed_order(&engine, "P", 5);
    engine
        .advance(&no, OrderStatus::MaterialReserved, AdvancePayload::reserve_automatic())
        .unwrap();

    let reservations = engine.reservations(&no).unwrap();
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].warehouse_code, "A");
}

// ========== 預約解除 ==========

#[rstest]
#[case(ConsumptionTiming::OnReserve)]
#[case(ConsumptionTiming::OnProductionStart)]
fn test_rollback_restores_pre_reservation_rows(#[case] timing: ConsumptionTiming) {
    let engine = engine_with(EngineConfig::default().with_consumption_timing(timing));
    let no = confirmed_order(&engine, "P", 10);
    let before = engine.store().stock_snapshot().unwrap();

    engine
        .advance(&no, OrderStatus::MaterialReserved, AdvancePayload::reserve_automatic())
        .unwrap();
    let order = engine.rollback(&no, OrderStatus::Confirmed).unwrap();

    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(engine.store().stock_snapshot().unwrap(), before);

    let log = engine.order_log(&no).unwrap();
    let reserved: Vec<_> = log.iter().filter(|e| e.io_type == IoType::Reserve).collect();
    let unreserved: Vec<_> = log.iter().filter(|e| e.io_type == IoType::Unreserve).collect();
    assert_eq!(reserved.len(), unreserved.len());
    for entry in &reserved {
        assert!(unreserved.iter().any(|u| u.item_code == entry.item_code
            && u.warehouse_code() == entry.warehouse_code()
            && u.qty == entry.qty));
    }
    assert!(engine
        .reservations(&no)
        .unwrap()
        .iter()
        .all(|r| r.state == ReservationState::Released));

    // 可重新預約
    engine
        .advance(&no, OrderStatus::MaterialReserved, AdvancePayload::reserve_automatic())
        .unwrap();
}

#[test]
fn test_unreserve_twice_equals_once() {
    let engine = engine_with(
        EngineConfig::default().with_consumption_timing(ConsumptionTiming::OnProductionStart),
    );
    let no = confirmed_order(&engine, "P", 10);
    engine
        .advance(&no, OrderStatus::MaterialReserved, AdvancePayload::reserve_automatic())
        .unwrap();

    let unreserve = || {
        engine
            .store()
            .transaction(|tx| ReservationLedger::unreserve(tx, &no, None))
    };

    assert_eq!(unreserve().unwrap(), 2);
    let once_rows = engine.store().stock_snapshot().unwrap();
    let once_log = engine.order_log(&no).unwrap().len();

    assert_eq!(unreserve().unwrap(), 0);
    assert_eq!(engine.store().stock_snapshot().unwrap(), once_rows);
    assert_eq!(engine.order_log(&no).unwrap().len(), once_log);
}

#[test]
fn test_cancel_reserved_order_releases_stock() {
    let engine = engine();
    let no = confirmed_order(&engine, "P", 10);
    let before = engine.store().stock_snapshot().unwrap();
    engine
        .advance(&no, OrderStatus::MaterialReserved, AdvancePayload::reserve_automatic())
        .unwrap();

    let order = engine.cancel(&no, Some("客戶取消")).unwrap();
    assert_eq!(order.status, OrderStatus::Canceled);
    assert_eq!(order.status.code(), "09");
    assert_eq!(engine.store().stock_snapshot().unwrap(), before);
    assert!(engine
        .order_log(&no)
        .unwrap()
        .iter()
        .filter(|e| e.io_type == IoType::Unreserve)
        .all(|e| e.remark.as_deref() == Some("客戶取消")));
}

// ========== 實績與入庫 ==========

fn produced_order(engine: &ProductionEngine, bad: i64) -> String {
    let no = confirmed_order(engine, "P", 10);
    engine
        .advance(&no, OrderStatus::MaterialReserved, AdvancePayload::reserve_automatic())
        .unwrap();
    engine
        .advance(&no, OrderStatus::Producing, AdvancePayload::StartProduction)
        .unwrap();
    engine
        .advance(
            &no,
            OrderStatus::Produced,
            AdvancePayload::RecordResult(
                ResultInput::new(Decimal::from(bad)).with_bad_reason("破袋"),
            ),
        )
        .unwrap();
    no
}

#[test]
fn test_receipt_must_match_good_qty() {
    let engine = engine();
    let no = produced_order(&engine, 3);

    let order = engine.order(&no).unwrap();
    let outcome = order.outcome.unwrap();
    assert_eq!(outcome.good_qty, Decimal::from(7));
    assert_eq!(outcome.bad_reason.as_deref(), Some("破袋"));

    let err = engine
        .advance(
            &no,
            OrderStatus::Warehoused,
            AdvancePayload::receive(vec![
                WarehouseQty::new("WH1", Decimal::from(4)),
                WarehouseQty::new("WH2", Decimal::from(4)),
            ]),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    assert_eq!(engine.order(&no).unwrap().status, OrderStatus::Produced);
    assert!(engine.store().stock_level("P", "WH1").unwrap().is_none());

    let order = engine
        .advance(
            &no,
            OrderStatus::Warehoused,
            AdvancePayload::receive(vec![
                WarehouseQty::new("WH1", Decimal::from(4)),
                WarehouseQty::new("WH2", Decimal::from(3)),
            ]),
        )
        .unwrap();
    assert_eq!(order.status, OrderStatus::Warehoused);
    assert_eq!(row(&engine, "P", "WH1").stock_qty, Decimal::from(4));
    assert_eq!(row(&engine, "P", "WH2").stock_qty, Decimal::from(3));

    let receipts: Vec<_> = engine
        .order_log(&no)
        .unwrap()
        .into_iter()
        .filter(|e| e.io_type == IoType::ProdResult && e.to_warehouse.is_some())
        .collect();
    assert_eq!(receipts.len(), 2);
    assert!(receipts.iter().all(|e| e.ref_no.as_deref() == Some(no.as_str())));
}

#[rstest]
#[case(0, 10)]
#[case(3, 7)]
#[case(10, 0)]
fn test_good_qty_is_plan_minus_bad(#[case] bad: i64, #[case] good: i64) {
    let engine = engine();
    let no = produced_order(&engine, bad);

    let results = engine.results(&no).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].seq, 1);
    assert_eq!(results[0].good_qty, Decimal::from(good));
}

#[rstest]
#[case(vec![])]
#[case(vec![WarehouseQty::new("WH1", Decimal::ZERO)])]
fn test_all_defective_order_can_close(#[case] allocations: Vec<WarehouseQty>) {
    let engine = engine();
    let no = produced_order(&engine, 10);
    assert_eq!(engine.order(&no).unwrap().outcome.unwrap().good_qty, Decimal::ZERO);
    let before = engine.store().stock_snapshot().unwrap();
    let log_len = engine.order_log(&no).unwrap().len();

    let order = engine
        .advance(&no, OrderStatus::Warehoused, AdvancePayload::receive(allocations))
        .unwrap();
    assert_eq!(order.status, OrderStatus::Warehoused);
    assert_eq!(engine.store().stock_snapshot().unwrap(), before);
    assert_eq!(engine.order_log(&no).unwrap().len(), log_len);

    let order = engine.advance(&no, OrderStatus::Closed, AdvancePayload::Close).unwrap();
    assert_eq!(order.status, OrderStatus::Closed);
}

#[test]
fn test_bad_qty_above_plan_rejected() {
    let engine = engine();
    let no = confirmed_order(&engine, "P", 10);
    engine
        .advance(&no, OrderStatus::MaterialReserved, AdvancePayload::reserve_automatic())
        .unwrap();
    engine
        .advance(&no, OrderStatus::Producing, AdvancePayload::StartProduction)
        .unwrap();

    let err = engine
        .advance(
            &no,
            OrderStatus::Produced,
            AdvancePayload::RecordResult(ResultInput::new(Decimal::from(11))),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(engine.order(&no).unwrap().status, OrderStatus::Producing);
    assert!(engine.results(&no).unwrap().is_empty());
}

// ========== 並行 ==========

#[test]
fn test_concurrent_reservations_never_overcommit() {
    prod_mrp::logging::init_test();

    let store = Arc::new(InMemoryStore::new());
    store.stock_in("M", "A", Decimal::from(30), None).unwrap();
    store.stock_in("M", "B", Decimal::from(30), None).unwrap();
    let engine = ProductionEngine::new(
        store,
        Arc::new(bom()),
        Arc::new(warehouses()),
        EngineConfig::default().with_consumption_timing(ConsumptionTiming::OnProductionStart),
    )
    .unwrap();

    // 8 張工單各需 20，總可用 60
    let orders: Vec<String> = (0..8)
        .map(|_| {
            let no = new_order(&engine, "P", 10);
            engine
                .advance(
                    &no,
                    OrderStatus::Confirmed,
                    AdvancePayload::Confirm {
                        acknowledge_shortage: true,
                    },
                )
                .unwrap();
            no
        })
        .collect();

    let outcomes: Vec<Result<ProductionOrder>> = thread::scope(|s| {
        let handles: Vec<_> = orders
            .iter()
            .map(|no| {
                let engine = engine.clone();
                s.spawn(move || {
                    engine.advance(
                        no,
                        OrderStatus::MaterialReserved,
                        AdvancePayload::reserve_automatic(),
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // 衝突不自動重試，成功數最多 3 張
    let succeeded = outcomes.iter().filter(|r| r.is_ok()).count();
    assert!((1..=3).contains(&succeeded));
    for err in outcomes.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(
            err.kind(),
            ErrorKind::InsufficientStock | ErrorKind::ConcurrentAllocationConflict
        ));
    }

    let rows = engine.store().stock_snapshot().unwrap();
    let allocated: Decimal = rows.iter().map(|r| r.allocated_qty).sum();
    assert_eq!(allocated, Decimal::from(20 * succeeded as i64));
    assert!(rows.iter().all(|r| r.allocated_qty <= r.stock_qty));

    let reserved_orders = orders
        .iter()
        .filter(|no| engine.order(no).unwrap().status == OrderStatus::MaterialReserved)
        .count();
    assert_eq!(reserved_orders, succeeded);
}
