//! BOM 彙總與需求量計算

use mrp_core::{BomLine, EngineConfig, LossRatePolicy, MrpError};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// 同一物料彙總後的 BOM 用量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedLine {
    pub material_item_code: String,

    /// 單位用量合計
    pub quantity_per_unit: Decimal,

    /// 需求量
    pub required_qty: Decimal,
}

/// 需求量計算器
pub struct NettingCalculator;

impl NettingCalculator {
    /// 依物料彙總 BOM 並乘上計劃數量
    ///
    /// 物料順序依 BOM 中首次出現的位置。損耗率只有在
    /// `LossRatePolicy::Inflate` 時才計入，且逐行膨脹後再合計。
    pub fn aggregate(
        lines: &[BomLine],
        plan_qty: Decimal,
        config: &EngineConfig,
    ) -> mrp_core::Result<Vec<AggregatedLine>> {
        let mut aggregated: Vec<AggregatedLine> = Vec::new();

        for line in lines {
            let required = Self::line_requirement(line, plan_qty, config)?;

            match aggregated
                .iter_mut()
                .find(|a| a.material_item_code == line.material_item_code)
            {
                Some(existing) => {
                    existing.quantity_per_unit = existing
                        .quantity_per_unit
                        .checked_add(line.quantity_per_unit)
                        .ok_or_else(|| overflow(line))?;
                    existing.required_qty = existing
                        .required_qty
                        .checked_add(required)
                        .ok_or_else(|| overflow(line))?;
                }
                None => aggregated.push(AggregatedLine {
                    material_item_code: line.material_item_code.clone(),
                    quantity_per_unit: line.quantity_per_unit,
                    required_qty: required,
                }),
            }
        }

        Ok(aggregated)
    }

    /// 單行 BOM 的需求量
    fn line_requirement(
        line: &BomLine,
        plan_qty: Decimal,
        config: &EngineConfig,
    ) -> mrp_core::Result<Decimal> {
        if line.quantity_per_unit < Decimal::ZERO {
            return Err(MrpError::Validation(format!(
                "BOM {} → {} 單位用量不可為負數: {}",
                line.parent_item_code, line.material_item_code, line.quantity_per_unit
            )));
        }

        let base = line
            .quantity_per_unit
            .checked_mul(plan_qty)
            .ok_or_else(|| overflow(line))?;

        match config.loss_rate_policy {
            LossRatePolicy::Ignore => Ok(base),
            LossRatePolicy::Inflate => {
                if line.loss_rate < Decimal::ZERO || line.loss_rate >= Decimal::ONE_HUNDRED {
                    return Err(MrpError::Validation(format!(
                        "BOM {} → {} 損耗率超出範圍: {}",
                        line.parent_item_code, line.material_item_code, line.loss_rate
                    )));
                }
                let yield_rate = Decimal::ONE - line.loss_rate / Decimal::ONE_HUNDRED;
                let inflated = base.checked_div(yield_rate).ok_or_else(|| overflow(line))?;
                Ok(inflated
                    .round_dp_with_strategy(config.quantity_scale, RoundingStrategy::AwayFromZero))
            }
        }
    }
}

fn overflow(line: &BomLine) -> MrpError {
    MrpError::Validation(format!(
        "BOM {} → {} 需求量溢位",
        line.parent_item_code, line.material_item_code
    ))
}
