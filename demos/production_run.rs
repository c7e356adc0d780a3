//! 生產工單完整流程示例
//!
//! 執行：`RUST_LOG=debug cargo run --example production_run`

use chrono::NaiveDate;
use prod_mrp::{
    logging, AdvancePayload, AllocationPlan, BomLine, EngineConfig, InMemoryStore, OrderDraft,
    OrderStatus, ProductionEngine, ResultInput, StaticBomResolver, StaticWarehouseDirectory,
    WarehouseQty,
};
use rust_decimal::Decimal;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    logging::init();

    println!("=== 生產工單流程示例 ===\n");

    // 泡菜 1kg：白菜 2、辣椒粉 0.15、蒜 0.05
    let bom = StaticBomResolver::new()
        .with_line(BomLine::new("KIMCHI-1KG".into(), "RM-CABBAGE".into(), 10, Decimal::TWO))
        .with_line(BomLine::new("KIMCHI-1KG".into(), "RM-CHILI".into(), 20, Decimal::new(15, 2)))
        .with_line(BomLine::new("KIMCHI-1KG".into(), "RM-GARLIC".into(), 30, Decimal::new(5, 2)));

    let warehouses = StaticWarehouseDirectory::new()
        .with_warehouse("WH-RM1", "原料一倉", "RAW")
        .with_warehouse("WH-RM2", "原料二倉", "RAW")
        .with_warehouse("WH-FG1", "成品一倉", "FINISHED")
        .with_warehouse("WH-FG2", "成品二倉", "FINISHED");

    let store = Arc::new(InMemoryStore::new());
    store.stock_in("RM-CABBAGE", "WH-RM1", Decimal::from(15), None)?;
    store.stock_in("RM-CABBAGE", "WH-RM2", Decimal::from(10), None)?;
    store.stock_in("RM-CHILI", "WH-RM1", Decimal::from(5), None)?;
    store.stock_in("RM-GARLIC", "WH-RM2", Decimal::from(3), None)?;

    let engine = ProductionEngine::new(
        store,
        Arc::new(bom),
        Arc::new(warehouses),
        EngineConfig::default(),
    )?;

    // 1. 建立工單
    let order = engine.create_order(
        OrderDraft::new(
            NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
            "KIMCHI-1KG".to_string(),
            Decimal::from(10),
        )
        .with_remark("示範工單".to_string()),
    )?;
    let no = order.order_no.clone();
    println!("建立工單: {} [{}]", no, order.status);

    // 2. 需求報告
    let report = engine.order_mrp_report(&no)?;
    println!("\n物料需求:");
    for req in &report.requirements {
        println!(
            "  - {}: 需求 {}, 可用 {}, 缺料 {}",
            req.material_item_code, req.required_qty, req.available_qty, req.shortage_qty
        );
    }

    // 3. 確認、預約（蒜手動指定，其餘自動）
    engine.advance(&no, OrderStatus::Confirmed, AdvancePayload::confirm())?;
    let plan = AllocationPlan::automatic().with_manual("RM-GARLIC", "WH-RM2", Decimal::new(5, 1));
    let order = engine.advance(
        &no,
        OrderStatus::MaterialReserved,
        AdvancePayload::Reserve { plan },
    )?;
    println!("\n預約完成 [{}]:", order.status);
    for r in engine.reservations(&no)? {
        println!(
            "  - {}@{}: {} ({:?}, {:?})",
            r.material_item_code, r.warehouse_code, r.qty, r.policy, r.state
        );
    }

    // 4. 開工、實績、入庫、結案
    engine.advance(&no, OrderStatus::Producing, AdvancePayload::StartProduction)?;
    let order = engine.advance(
        &no,
        OrderStatus::Produced,
        AdvancePayload::RecordResult(ResultInput::new(Decimal::from(3)).with_bad_reason("破袋")),
    )?;
    if let Some(outcome) = &order.outcome {
        println!("\n生產實績: 良品 {}, 不良 {}", outcome.good_qty, outcome.bad_qty);
    }

    engine.advance(
        &no,
        OrderStatus::Warehoused,
        AdvancePayload::receive(vec![
            WarehouseQty::new("WH-FG1", Decimal::from(4)),
            WarehouseQty::new("WH-FG2", Decimal::from(3)),
        ]),
    )?;
    let order = engine.advance(&no, OrderStatus::Closed, AdvancePayload::Close)?;
    println!("工單狀態: {}", order.status);

    // 5. 庫存帳
    println!("\n庫存帳:");
    for entry in engine.order_log(&no)? {
        println!(
            "  {:<11} {:<12} {:<7} {:>6} (現有 {:+}, 分配 {:+})",
            entry.io_type,
            entry.item_code,
            entry.warehouse_code().unwrap_or("-"),
            entry.qty,
            entry.qty_delta,
            entry.alloc_delta
        );
    }

    tracing::info!("示例完成：工單 {}", no);
    Ok(())
}
