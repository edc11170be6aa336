// ==========================================
// 冷链产销排产系统 - 成本参数
// ==========================================

use crate::domain::types::StorageState;
use serde::{Deserialize, Serialize};

/// 成本参数（单位成本均为非负）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostParameters {
    /// 冷冻库存持有成本（单位/天）
    #[serde(default = "default_frozen_holding")]
    pub holding_cost_frozen_per_unit_day: f64,
    /// 常温库存持有成本（单位/天）
    #[serde(default = "default_ambient_holding")]
    pub holding_cost_ambient_per_unit_day: f64,
    /// 每次产品启动（换产）成本
    #[serde(default)]
    pub changeover_cost_per_start: f64,
    /// 缺货惩罚（单位）
    #[serde(default = "default_shortfall_penalty")]
    pub shortfall_penalty_per_unit: f64,
    /// 节点内冷冻/解冻成本（单位）
    #[serde(default)]
    pub transition_cost_per_unit: f64,
}

fn default_frozen_holding() -> f64 {
    0.01
}

fn default_ambient_holding() -> f64 {
    0.002
}

fn default_shortfall_penalty() -> f64 {
    10_000.0
}

impl Default for CostParameters {
    fn default() -> Self {
        Self {
            holding_cost_frozen_per_unit_day: default_frozen_holding(),
            holding_cost_ambient_per_unit_day: default_ambient_holding(),
            changeover_cost_per_start: 0.0,
            shortfall_penalty_per_unit: default_shortfall_penalty(),
            transition_cost_per_unit: 0.0,
        }
    }
}

impl CostParameters {
    pub fn holding_cost(&self, state: StorageState) -> f64 {
        match state {
            StorageState::Frozen => self.holding_cost_frozen_per_unit_day,
            StorageState::Ambient => self.holding_cost_ambient_per_unit_day,
        }
    }

    /// 返回第一个非法字段
    pub fn invalid_field(&self) -> Option<(&'static str, f64)> {
        [
            ("holding_cost_frozen_per_unit_day", self.holding_cost_frozen_per_unit_day),
            ("holding_cost_ambient_per_unit_day", self.holding_cost_ambient_per_unit_day),
            ("changeover_cost_per_start", self.changeover_cost_per_start),
            ("shortfall_penalty_per_unit", self.shortfall_penalty_per_unit),
            ("transition_cost_per_unit", self.transition_cost_per_unit),
        ]
        .into_iter()
        .find(|(_, v)| !v.is_finite() || *v < 0.0)
    }
}
