//! 引擎配置模型

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{MrpError, Result};

/// 引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 損耗率是否計入需求量
    pub loss_rate_policy: LossRatePolicy,

    /// 自動分配的倉庫順序
    pub auto_allocation_order: AutoAllocationOrder,

    /// 物料投入時點
    pub consumption_timing: ConsumptionTiming,

    /// 需求量小數位數（損耗膨脹後無條件進位）
    pub quantity_scale: u32,

    /// 工單號前綴
    pub order_no_prefix: String,

    /// 成品入庫數量是否必須為整數
    pub require_integral_receipt: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            loss_rate_policy: LossRatePolicy::Ignore,
            auto_allocation_order: AutoAllocationOrder::WarehouseCode,
            consumption_timing: ConsumptionTiming::OnReserve,
            quantity_scale: 3,
            order_no_prefix: "P".to_string(),
            require_integral_receipt: true,
        }
    }
}

impl EngineConfig {
    /// 從 JSON 字串載入
    ///
    /// 未提供的欄位使用預設值。
    /// ```
    /// # use mrp_core::{EngineConfig, LossRatePolicy};
    /// let config = EngineConfig::from_json_str(r#"{ "loss_rate_policy": "Inflate" }"#).unwrap();
    /// assert_eq!(config.loss_rate_policy, LossRatePolicy::Inflate);
    /// assert_eq!(config.quantity_scale, 3);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| MrpError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 從 JSON 檔案載入
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| MrpError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.order_no_prefix.trim().is_empty() {
            return Err(MrpError::Config("工單號前綴不可為空".to_string()));
        }
        if self.quantity_scale > 10 {
            return Err(MrpError::Config(format!(
                "數量小數位數過大: {}",
                self.quantity_scale
            )));
        }
        Ok(())
    }

    /// 建構器模式：設置損耗率策略
    pub fn with_loss_rate_policy(mut self, policy: LossRatePolicy) -> Self {
        self.loss_rate_policy = policy;
        self
    }

    /// 建構器模式：設置自動分配順序
    pub fn with_auto_allocation_order(mut self, order: AutoAllocationOrder) -> Self {
        self.auto_allocation_order = order;
        self
    }

    /// 建構器模式：設置投入時點
    pub fn with_consumption_timing(mut self, timing: ConsumptionTiming) -> Self {
        self.consumption_timing = timing;
        self
    }

    pub fn with_quantity_scale(mut self, scale: u32) -> Self {
        self.quantity_scale = scale;
        self
    }

    pub fn with_order_no_prefix(mut self, prefix: String) -> Self {
        self.order_no_prefix = prefix;
        self
    }

    pub fn with_require_integral_receipt(mut self, require: bool) -> Self {
        self.require_integral_receipt = require;
        self
    }
}

/// 損耗率策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossRatePolicy {
    /// 不計入（需求 = 單位用量 × 計劃數量）
    Ignore,

    /// 膨脹需求（需求 = 單位用量 × 計劃數量 / (1 - 損耗率/100)）
    Inflate,
}

/// 自動分配倉庫順序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoAllocationOrder {
    /// 倉庫代碼升冪
    WarehouseCode,

    /// 可用量大者優先（同量依倉庫代碼）
    LargestAvailableFirst,
}

/// 物料投入時點
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumptionTiming {
    /// 預約成功即投入（預約與投入為同一步驟）
    OnReserve,

    /// 開始生產時投入
    OnProductionStart,
}
