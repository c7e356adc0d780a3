//! MRP 主計算器

use mrp_core::order::validate_plan_qty;
use mrp_core::{
    BomResolver, EngineConfig, MaterialRequirement, MrpError, MrpReport, StockLevel,
    StockQueryService,
};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::netting::NettingCalculator;

/// MRP 計算器
///
/// 輸出為純粹的報告，不修改任何庫存；計劃數量或成品變更時可隨時重算。
#[derive(Clone)]
pub struct MrpCalculator {
    /// BOM 查詢服務
    bom: Arc<dyn BomResolver>,

    /// 庫存查詢服務
    stock: Arc<dyn StockQueryService>,

    config: EngineConfig,
}

impl MrpCalculator {
    /// 創建新的 MRP 計算器
    pub fn new(
        bom: Arc<dyn BomResolver>,
        stock: Arc<dyn StockQueryService>,
        config: EngineConfig,
    ) -> Self {
        Self { bom, stock, config }
    }

    /// 計算物料需求報告
    pub fn calculate(
        &self,
        product_item_code: &str,
        plan_qty: Decimal,
    ) -> mrp_core::Result<MrpReport> {
        if product_item_code.trim().is_empty() {
            return Err(MrpError::Validation("未指定成品品目".to_string()));
        }
        validate_plan_qty(plan_qty)?;

        tracing::debug!("開始 MRP 計算：成品 {}，計劃數量 {}", product_item_code, plan_qty);

        // Step 1: BOM 彙總
        let lines = self.bom.bom_lines(product_item_code)?;
        if lines.is_empty() {
            tracing::warn!("成品 {} 沒有 BOM 明細", product_item_code);
        }
        let aggregated = NettingCalculator::aggregate(&lines, plan_qty, &self.config)?;

        // Step 2: 逐物料查詢各倉庫存
        let stocks: Vec<Vec<StockLevel>> = aggregated
            .par_iter()
            .map(|line| self.stock.stock_levels(&line.material_item_code))
            .collect::<mrp_core::Result<_>>()?;

        // Step 3: 組合需求報告
        let requirements: Vec<MaterialRequirement> = aggregated
            .into_iter()
            .zip(stocks)
            .map(|(line, mut stock)| {
                stock.sort_by(|a, b| a.warehouse_code.cmp(&b.warehouse_code));
                MaterialRequirement::new(
                    line.material_item_code,
                    line.quantity_per_unit,
                    line.required_qty,
                    stock,
                )
            })
            .collect();

        let report = MrpReport {
            product_item_code: product_item_code.to_string(),
            plan_qty,
            requirements,
        };

        let shortage_count = report.shortages().count();
        tracing::info!(
            "MRP 計算完成：成品 {}，物料 {} 種，缺料 {} 種",
            product_item_code,
            report.requirements.len(),
            shortage_count
        );

        Ok(report)
    }

    /// 獲取配置引用
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
