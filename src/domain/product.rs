// ==========================================
// 冷链产销排产系统 - 产品领域模型
// ==========================================
// 红线: 常温批次可能是原生常温,也可能是解冻品,保质期取两者较短者
// ==========================================

use crate::domain::types::StorageState;
use serde::{Deserialize, Serialize};

/// 默认常温保质期（天）
pub const DEFAULT_AMBIENT_SHELF_LIFE_DAYS: u32 = 17;
/// 默认冷冻保质期（天）
pub const DEFAULT_FROZEN_SHELF_LIFE_DAYS: u32 = 120;
/// 默认解冻后保质期（天）
pub const DEFAULT_THAWED_SHELF_LIFE_DAYS: u32 = 14;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_ambient")]
    pub ambient_shelf_life_days: u32,
    #[serde(default = "default_frozen")]
    pub frozen_shelf_life_days: u32,
    #[serde(default = "default_thawed")]
    pub thawed_shelf_life_days: u32,
    /// 单位生产成本
    #[serde(default)]
    pub production_cost_per_unit: f64,
}

fn default_ambient() -> u32 {
    DEFAULT_AMBIENT_SHELF_LIFE_DAYS
}

fn default_frozen() -> u32 {
    DEFAULT_FROZEN_SHELF_LIFE_DAYS
}

fn default_thawed() -> u32 {
    DEFAULT_THAWED_SHELF_LIFE_DAYS
}

impl Product {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            ambient_shelf_life_days: DEFAULT_AMBIENT_SHELF_LIFE_DAYS,
            frozen_shelf_life_days: DEFAULT_FROZEN_SHELF_LIFE_DAYS,
            thawed_shelf_life_days: DEFAULT_THAWED_SHELF_LIFE_DAYS,
            production_cost_per_unit: 0.0,
        }
    }

    pub fn with_shelf_lives(mut self, ambient: u32, frozen: u32, thawed: u32) -> Self {
        self.ambient_shelf_life_days = ambient;
        self.frozen_shelf_life_days = frozen;
        self.thawed_shelf_life_days = thawed;
        self
    }

    pub fn with_production_cost(mut self, cost: f64) -> Self {
        self.production_cost_per_unit = cost;
        self
    }

    /// 指定状态下的有效保质期（天）
    ///
    /// 常温 = min(常温, 解冻)
    pub fn shelf_life(&self, state: StorageState) -> u32 {
        match state {
            StorageState::Frozen => self.frozen_shelf_life_days,
            StorageState::Ambient => self.ambient_shelf_life_days.min(self.thawed_shelf_life_days),
        }
    }

    /// 批次在指定年龄下是否仍有效
    pub fn is_valid_age(&self, state: StorageState, age_days: i64) -> bool {
        age_days >= 0 && age_days <= self.shelf_life(state) as i64
    }
}
