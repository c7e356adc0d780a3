//! 物料需求報告模型（推導值，不持久化）

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::StockLevel;

/// 單一物料的需求與可用量
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialRequirement {
    pub material_item_code: String,

    /// 單位用量（同物料多行 BOM 已合計）
    pub quantity_per_unit: Decimal,

    /// 需求量
    pub required_qty: Decimal,

    /// 可用量（各倉 現有 - 已分配 合計）
    pub available_qty: Decimal,

    /// 缺料量 = max(0, 需求 - 可用)
    pub shortage_qty: Decimal,

    pub is_satisfied: bool,

    /// 各倉庫存明細
    pub stock: Vec<StockLevel>,
}

impl MaterialRequirement {
    /// 由需求量與各倉庫存建立
    pub fn new(
        material_item_code: String,
        quantity_per_unit: Decimal,
        required_qty: Decimal,
        stock: Vec<StockLevel>,
    ) -> Self {
        let available_qty: Decimal = stock.iter().map(StockLevel::available_qty).sum();
        let shortage_qty = (required_qty - available_qty).max(Decimal::ZERO);
        Self {
            material_item_code,
            quantity_per_unit,
            required_qty,
            available_qty,
            shortage_qty,
            is_satisfied: available_qty >= required_qty,
            stock,
        }
    }
}

/// 成品 × 計劃數量 的物料需求報告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrpReport {
    pub product_item_code: String,
    pub plan_qty: Decimal,
    pub requirements: Vec<MaterialRequirement>,
}

impl MrpReport {
    /// 全部物料是否足夠
    pub fn all_satisfied(&self) -> bool {
        self.requirements.iter().all(|r| r.is_satisfied)
    }

    /// 缺料物料
    pub fn shortages(&self) -> impl Iterator<Item = &MaterialRequirement> {
        self.requirements.iter().filter(|r| !r.is_satisfied)
    }

    pub fn requirement(&self, material_item_code: &str) -> Option<&MaterialRequirement> {
        self.requirements
            .iter()
            .find(|r| r.material_item_code == material_item_code)
    }

    pub fn into_requirements(self) -> Vec<MaterialRequirement> {
        self.requirements
    }
}
