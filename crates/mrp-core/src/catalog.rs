//! 外部主檔服務介面（BOM、庫存查詢、倉庫）
//!
//! 引擎只讀取這些資料；主檔維護不在此範圍內。

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::{Result, StockLevel};

/// BOM 明細：生產一個單位成品所需的一種物料
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomLine {
    pub parent_item_code: String,
    pub material_item_code: String,
    pub sequence_no: u32,

    /// 單位用量
    pub quantity_per_unit: Decimal,

    /// 損耗率（百分比，例如 5.00 表示 5%）
    pub loss_rate: Decimal,
}

impl BomLine {
    pub fn new(
        parent_item_code: String,
        material_item_code: String,
        sequence_no: u32,
        quantity_per_unit: Decimal,
    ) -> Self {
        Self {
            parent_item_code,
            material_item_code,
            sequence_no,
            quantity_per_unit,
            loss_rate: Decimal::ZERO,
        }
    }

    /// 建構器模式：設置損耗率
    pub fn with_loss_rate(mut self, loss_rate: Decimal) -> Self {
        self.loss_rate = loss_rate;
        self
    }
}

/// 倉庫主檔
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub code: String,
    pub name: String,
    pub wh_type: String,
}

/// 倉庫查詢條件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarehouseFilter {
    pub wh_type: Option<String>,
    pub name_contains: Option<String>,
}

impl WarehouseFilter {
    pub fn matches(&self, warehouse: &Warehouse) -> bool {
        let type_ok = self
            .wh_type
            .as_ref()
            .map_or(true, |t| &warehouse.wh_type == t);
        let name_ok = self
            .name_contains
            .as_ref()
            .map_or(true, |n| warehouse.name.contains(n.as_str()));
        type_ok && name_ok
    }
}

/// BOM 查詢服務
pub trait BomResolver: Send + Sync {
    /// 取得成品的 BOM 明細
    fn bom_lines(&self, parent_item_code: &str) -> Result<Vec<BomLine>>;
}

/// 庫存查詢服務
pub trait StockQueryService: Send + Sync {
    /// 取得品目在各倉庫的庫存
    fn stock_levels(&self, item_code: &str) -> Result<Vec<StockLevel>>;
}

/// 倉庫主檔服務
pub trait WarehouseDirectory: Send + Sync {
    fn warehouses(&self, filter: &WarehouseFilter) -> Result<Vec<Warehouse>>;

    fn warehouse(&self, code: &str) -> Result<Option<Warehouse>> {
        Ok(self
            .warehouses(&WarehouseFilter::default())?
            .into_iter()
            .find(|w| w.code == code))
    }
}

/// 記憶體內 BOM（測試與示範用）
#[derive(Debug, Clone, Default)]
pub struct StaticBomResolver {
    lines: HashMap<String, Vec<BomLine>>,
}

impl StaticBomResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加 BOM 明細
    pub fn add_line(&mut self, line: BomLine) {
        let lines = self
            .lines
            .entry(line.parent_item_code.clone())
            .or_default();
        lines.push(line);
        lines.sort_by_key(|l| l.sequence_no);
    }

    /// 建構器模式：添加 BOM 明細
    pub fn with_line(mut self, line: BomLine) -> Self {
        self.add_line(line);
        self
    }
}

impl BomResolver for StaticBomResolver {
    fn bom_lines(&self, parent_item_code: &str) -> Result<Vec<BomLine>> {
        Ok(self
            .lines
            .get(parent_item_code)
            .cloned()
            .unwrap_or_default())
    }
}

/// 記憶體內倉庫主檔（測試與示範用）
#[derive(Debug, Clone, Default)]
pub struct StaticWarehouseDirectory {
    warehouses: BTreeMap<String, Warehouse>,
}

impl StaticWarehouseDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warehouse(mut self, code: &str, name: &str, wh_type: &str) -> Self {
        self.warehouses.insert(
            code.to_string(),
            Warehouse {
                code: code.to_string(),
                name: name.to_string(),
                wh_type: wh_type.to_string(),
            },
        );
        self
    }
}

impl WarehouseDirectory for StaticWarehouseDirectory {
    fn warehouses(&self, filter: &WarehouseFilter) -> Result<Vec<Warehouse>> {
        Ok(self
            .warehouses
            .values()
            .filter(|w| filter.matches(w))
            .cloned()
            .collect())
    }

    fn warehouse(&self, code: &str) -> Result<Option<Warehouse>> {
        Ok(self.warehouses.get(code).cloned())
    }
}
