//! 倉庫分配
//!
//! 每種物料獨立決定分配策略：計劃中有手動分配就用手動，否則自動分配。

use mrp_core::{
    Allocation, AllocationPlan, AllocationPolicy, AutoAllocationOrder, EngineConfig,
    MaterialAllocation, MaterialRequirement, MrpError, MrpReport, StockLevel, WarehouseQty,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// 分配引擎
#[derive(Debug, Clone)]
pub struct AllocationEngine {
    order: AutoAllocationOrder,
}

impl AllocationEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            order: config.auto_allocation_order,
        }
    }

    /// 依需求報告與分配計劃，決定每種物料的倉庫分配
    ///
    /// 需求量為 0 的物料不分配。
    pub fn resolve(
        &self,
        order_no: &str,
        report: &MrpReport,
        plan: &AllocationPlan,
    ) -> mrp_core::Result<Vec<MaterialAllocation>> {
        // 手動分配的物料必須在需求報告中
        for material in plan.manual_materials() {
            if report.requirement(material).is_none() {
                return Err(MrpError::Validation(format!(
                    "物料 {} 不在成品 {} 的 BOM 中",
                    material, report.product_item_code
                )));
            }
        }

        let mut resolved = Vec::new();
        for requirement in &report.requirements {
            if requirement.required_qty <= Decimal::ZERO {
                continue;
            }

            let allocation = match plan.manual_for(&requirement.material_item_code) {
                Some(lines) => self.allocate_manual(order_no, requirement, lines)?,
                None => self.allocate_automatic(order_no, requirement)?,
            };

            tracing::debug!(
                "物料 {} 分配（{:?}）：{} 筆，合計 {}",
                allocation.material_item_code,
                allocation.policy,
                allocation.allocations.len(),
                allocation.allocated_qty()
            );
            resolved.push(allocation);
        }

        Ok(resolved)
    }

    /// 手動分配：指定合計必須剛好等於需求量
    pub fn allocate_manual(
        &self,
        order_no: &str,
        requirement: &MaterialRequirement,
        lines: &[WarehouseQty],
    ) -> mrp_core::Result<MaterialAllocation> {
        let material = &requirement.material_item_code;

        // 同倉庫多筆合併
        let mut by_warehouse: BTreeMap<&str, Decimal> = BTreeMap::new();
        for line in lines {
            if line.qty < Decimal::ZERO {
                return Err(MrpError::Validation(format!(
                    "物料 {} 倉庫 {} 指定數量不可為負數: {}",
                    material, line.warehouse_code, line.qty
                )));
            }
            if line.qty.is_zero() {
                continue;
            }
            *by_warehouse.entry(line.warehouse_code.as_str()).or_default() += line.qty;
        }

        let allocated: Decimal = by_warehouse.values().copied().sum();
        if allocated != requirement.required_qty {
            return Err(MrpError::AllocationMismatch {
                material: material.clone(),
                required: requirement.required_qty,
                allocated,
                delta: requirement.required_qty - allocated,
            });
        }

        let mut allocations = Vec::with_capacity(by_warehouse.len());
        for (warehouse_code, qty) in by_warehouse {
            let row = requirement
                .stock
                .iter()
                .find(|s| s.warehouse_code == warehouse_code)
                .ok_or_else(|| {
                    MrpError::Validation(format!(
                        "倉庫 {} 沒有物料 {} 的庫存資料",
                        warehouse_code, material
                    ))
                })?;

            if row.available_qty() < qty {
                return Err(MrpError::InsufficientStock {
                    material: format!("{}@{}", material, warehouse_code),
                    required: qty,
                    available: row.available_qty(),
                });
            }

            allocations.push(Allocation {
                order_no: order_no.to_string(),
                material_item_code: material.clone(),
                warehouse_code: warehouse_code.to_string(),
                qty,
            });
        }

        Ok(MaterialAllocation {
            material_item_code: material.clone(),
            policy: AllocationPolicy::Manual,
            required_qty: requirement.required_qty,
            allocations,
        })
    }

    /// 自動分配：依固定倉庫順序逐倉扣取，直到滿足需求量
    pub fn allocate_automatic(
        &self,
        order_no: &str,
        requirement: &MaterialRequirement,
    ) -> mrp_core::Result<MaterialAllocation> {
        let material = &requirement.material_item_code;

        if requirement.available_qty < requirement.required_qty {
            tracing::warn!(
                "物料 {} 庫存不足：需要 {}，可用 {}",
                material,
                requirement.required_qty,
                requirement.available_qty
            );
            return Err(MrpError::InsufficientStock {
                material: material.clone(),
                required: requirement.required_qty,
                available: requirement.available_qty,
            });
        }

        let mut rows: Vec<&StockLevel> = requirement.stock.iter().collect();
        match self.order {
            AutoAllocationOrder::WarehouseCode => {
                rows.sort_by(|a, b| a.warehouse_code.cmp(&b.warehouse_code));
            }
            AutoAllocationOrder::LargestAvailableFirst => {
                rows.sort_by(|a, b| {
                    b.available_qty()
                        .cmp(&a.available_qty())
                        .then_with(|| a.warehouse_code.cmp(&b.warehouse_code))
                });
            }
        }

        let mut remaining = requirement.required_qty;
        let mut allocations = Vec::new();
        for row in rows {
            if remaining <= Decimal::ZERO {
                break;
            }
            let available = row.available_qty();
            if available <= Decimal::ZERO {
                continue;
            }
            let take = available.min(remaining);
            allocations.push(Allocation {
                order_no: order_no.to_string(),
                material_item_code: material.clone(),
                warehouse_code: row.warehouse_code.clone(),
                qty: take,
            });
            remaining -= take;
        }

        if remaining > Decimal::ZERO {
            return Err(MrpError::InsufficientStock {
                material: material.clone(),
                required: requirement.required_qty,
                available: requirement.required_qty - remaining,
            });
        }

        Ok(MaterialAllocation {
            material_item_code: material.clone(),
            policy: AllocationPolicy::Automatic,
            required_qty: requirement.required_qty,
            allocations,
        })
    }
}
