// ==========================================
// 冷链产销排产系统 - 领域类型定义
// ==========================================
// 红线: 只有冷冻/常温两种存储状态,解冻用"冷冻→常温"状态转换表达
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 存储状态 (Storage State)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据文件一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageState {
    Frozen,  // 冷冻
    Ambient, // 常温（含解冻后）
}

impl StorageState {
    /// 全部状态（固定顺序，保证建模顺序确定）
    pub const ALL: [StorageState; 2] = [StorageState::Frozen, StorageState::Ambient];

    /// 另一种状态
    pub fn other(self) -> Self {
        match self {
            StorageState::Frozen => StorageState::Ambient,
            StorageState::Ambient => StorageState::Frozen,
        }
    }

    /// 简短标识（用于变量命名）
    pub fn code(self) -> &'static str {
        match self {
            StorageState::Frozen => "F",
            StorageState::Ambient => "A",
        }
    }
}

impl fmt::Display for StorageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageState::Frozen => write!(f, "FROZEN"),
            StorageState::Ambient => write!(f, "AMBIENT"),
        }
    }
}

// ==========================================
// 运输模式 (Transport Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportMode {
    Frozen,  // 冷冻运输
    Ambient, // 常温运输
}

impl TransportMode {
    /// 运输途中批次所处的存储状态
    pub fn carried_state(self) -> StorageState {
        match self {
            TransportMode::Frozen => StorageState::Frozen,
            TransportMode::Ambient => StorageState::Ambient,
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Frozen => write!(f, "FROZEN"),
            TransportMode::Ambient => write!(f, "AMBIENT"),
        }
    }
}

// ==========================================
// 发车时段 (Departure Slot)
// ==========================================
// 上午车只能装前一日及以前完工的产品; 下午车可额外装当日产品
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepartureSlot {
    Morning,   // 上午
    Afternoon, // 下午
}

impl DepartureSlot {
    /// 是否可装当日生产
    pub fn loads_same_day_production(self) -> bool {
        matches!(self, DepartureSlot::Afternoon)
    }
}

impl fmt::Display for DepartureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepartureSlot::Morning => write!(f, "MORNING"),
            DepartureSlot::Afternoon => write!(f, "AFTERNOON"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_state_other_is_involution() {
        for state in StorageState::ALL {
            assert_ne!(state, state.other());
            assert_eq!(state, state.other().other());
        }
    }

    #[test]
    fn test_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&DepartureSlot::Afternoon).unwrap();
        assert_eq!(json, "\"AFTERNOON\"");
        let mode: TransportMode = serde_json::from_str("\"FROZEN\"").unwrap();
        assert_eq!(mode.carried_state(), StorageState::Frozen);
    }
}
