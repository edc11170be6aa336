// ==========================================
// 冷链产销排产系统 - 热启动传递
// ==========================================
// 职责: 提取已解窗口的全部变量取值、按日期平移、重叠率质量门
// 红线: 结构签名不同（产品/节点/路线/车辆/建模选项变化）一律冷启动
// 说明: 重叠率过低只是警告,不是失败
// ==========================================

use crate::engine::builder::ModelSignature;
use crate::engine::solution::WindowSolution;
use crate::engine::var_key::VarKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// 默认最小重叠率
pub const DEFAULT_MIN_OVERLAP_RATIO: f64 = 0.7;

// ==========================================
// WarmstartHints - 变量提示表
// ==========================================
#[derive(Debug, Clone)]
pub struct WarmstartHints {
    pub signature: ModelSignature,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub values: HashMap<VarKey, f64>,
}

impl WarmstartHints {
    /// 提取已解窗口的全部变量取值
    pub fn extract(solution: &WindowSolution) -> Self {
        Self {
            signature: solution.signature,
            window_start: solution.window.start,
            window_end: solution.window.end,
            values: solution.assignment.iter().cloned().collect(),
        }
    }

    /// 全部日期分量平移 days 天,丢弃任一日期落在 [new_start, new_end] 之外的键
    pub fn shift(&self, days: i64, new_start: NaiveDate, new_end: NaiveDate) -> Self {
        let values = self
            .values
            .iter()
            .filter_map(|(key, &value)| {
                let shifted = key.shifted(days);
                let inside = shifted
                    .dates()
                    .iter()
                    .all(|d| *d >= new_start && *d <= new_end);
                inside.then_some((shifted, value))
            })
            .collect();
        Self {
            signature: self.signature,
            window_start: new_start,
            window_end: new_end,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &VarKey) -> Option<f64> {
        self.values.get(key).copied()
    }
}

// ==========================================
// WarmstartPolicy - 质量门策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LowOverlapAction {
    /// 警告后继续使用提示
    Proceed,
    /// 警告后冷启动
    ColdStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarmstartPolicy {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_min_overlap")]
    pub min_overlap_ratio: f64,
    #[serde(default = "default_action")]
    pub on_low_overlap: LowOverlapAction,
}

fn default_enabled() -> bool {
    true
}

fn default_min_overlap() -> f64 {
    DEFAULT_MIN_OVERLAP_RATIO
}

fn default_action() -> LowOverlapAction {
    LowOverlapAction::Proceed
}

impl Default for WarmstartPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            min_overlap_ratio: DEFAULT_MIN_OVERLAP_RATIO,
            on_low_overlap: LowOverlapAction::Proceed,
        }
    }
}

impl WarmstartPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// 平移上一解并执行质量门
    ///
    /// # 参数
    /// - previous: 上一次求解提取的提示
    /// - delta_days: 新窗口首日相对上一窗口首日的天数
    /// - signature: 新窗口模型结构签名
    pub fn prepare(
        &self,
        previous: Option<&WarmstartHints>,
        delta_days: i64,
        new_start: NaiveDate,
        new_end: NaiveDate,
        signature: ModelSignature,
    ) -> WarmstartDecision {
        if !self.enabled {
            return WarmstartDecision::cold(ColdStartReason::Disabled);
        }
        let Some(previous) = previous else {
            return WarmstartDecision::cold(ColdStartReason::NoPrevious);
        };
        if previous.signature != signature {
            warn!("模型结构签名变化,热启动失效,改为冷启动");
            return WarmstartDecision::cold(ColdStartReason::StructureChanged);
        }
        if previous.is_empty() {
            return WarmstartDecision::cold(ColdStartReason::NoPrevious);
        }

        let shifted = previous.shift(delta_days, new_start, new_end);
        let ratio = shifted.len() as f64 / previous.len() as f64;
        debug!(
            delta_days,
            retained = shifted.len(),
            previous = previous.len(),
            ratio,
            "热启动提示平移完成"
        );

        if ratio < self.min_overlap_ratio {
            warn!(
                ratio,
                threshold = self.min_overlap_ratio,
                action = ?self.on_low_overlap,
                "热启动重叠率低于阈值"
            );
            return match self.on_low_overlap {
                LowOverlapAction::Proceed => WarmstartDecision {
                    hints: Some(shifted),
                    overlap_ratio: Some(ratio),
                    degraded: true,
                    cold_reason: None,
                },
                LowOverlapAction::ColdStart => WarmstartDecision {
                    hints: None,
                    overlap_ratio: Some(ratio),
                    degraded: true,
                    cold_reason: Some(ColdStartReason::LowOverlap),
                },
            };
        }

        WarmstartDecision {
            hints: Some(shifted),
            overlap_ratio: Some(ratio),
            degraded: false,
            cold_reason: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColdStartReason {
    Disabled,
    NoPrevious,
    StructureChanged,
    LowOverlap,
}

/// 质量门结果
#[derive(Debug, Clone)]
pub struct WarmstartDecision {
    pub hints: Option<WarmstartHints>,
    pub overlap_ratio: Option<f64>,
    /// 重叠率低于阈值
    pub degraded: bool,
    pub cold_reason: Option<ColdStartReason>,
}

impl WarmstartDecision {
    fn cold(reason: ColdStartReason) -> Self {
        Self {
            hints: None,
            overlap_ratio: None,
            degraded: false,
            cold_reason: Some(reason),
        }
    }

    pub fn is_warm(&self) -> bool {
        self.hints.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::StorageState;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn production(day: u32) -> VarKey {
        VarKey::Production {
            node: "M".into(),
            product: "P".into(),
            date: d(day),
        }
    }

    fn signature(ctx_seed: u64) -> ModelSignature {
        ModelSignature::from_value(ctx_seed)
    }

    fn hints(days: std::ops::RangeInclusive<u32>) -> WarmstartHints {
        WarmstartHints {
            signature: signature(42),
            window_start: d(1),
            window_end: d(14),
            values: days.map(|day| (production(day), day as f64)).collect(),
        }
    }

    #[test]
    fn test_shift_by_zero_is_identity_inside_window() {
        let original = hints(1..=14);
        let shifted = original.shift(0, d(1), d(14));
        assert_eq!(shifted.values, original.values);
    }

    #[test]
    fn test_shift_moves_keys_and_drops_out_of_range() {
        let original = hints(1..=14);
        let shifted = original.shift(-7, d(8), d(21));
        // 原 8..14 日 → 新 1..7 日,落在新窗口之外,全部丢弃
        assert!(shifted.is_empty());

        let shifted = original.shift(-7, d(1), d(14));
        assert_eq!(shifted.len(), 7);
        assert_eq!(shifted.get(&production(1)), Some(8.0));
        assert_eq!(shifted.get(&production(8)), None);
    }

    #[test]
    fn test_shift_drops_key_when_any_component_leaves_window() {
        let mut original = hints(1..=1);
        original.values.insert(
            VarKey::Inventory {
                node: "M".into(),
                product: "P".into(),
                production_date: d(2),
                date: d(9),
                state: StorageState::Ambient,
            },
            5.0,
        );
        let shifted = original.shift(-2, d(1), d(14));
        assert_eq!(shifted.len(), 1);
        assert!(shifted.values.keys().all(|k| matches!(k, VarKey::Inventory { .. })));
    }

    #[test]
    fn test_prepare_cold_starts_on_structure_change() {
        let policy = WarmstartPolicy::default();
        let previous = hints(1..=14);
        let decision = policy.prepare(Some(&previous), 0, d(1), d(14), signature(7));
        assert!(!decision.is_warm());
        assert_eq!(decision.cold_reason, Some(ColdStartReason::StructureChanged));
    }

    #[test]
    fn test_prepare_low_overlap_policy() {
        let previous = hints(1..=14);

        let proceed = WarmstartPolicy::default();
        let decision = proceed.prepare(Some(&previous), -7, d(1), d(14), signature(42));
        assert!(decision.is_warm());
        assert!(decision.degraded);
        assert_eq!(decision.overlap_ratio, Some(0.5));

        let cold = WarmstartPolicy {
            on_low_overlap: LowOverlapAction::ColdStart,
            ..WarmstartPolicy::default()
        };
        let decision = cold.prepare(Some(&previous), -7, d(1), d(14), signature(42));
        assert!(!decision.is_warm());
        assert_eq!(decision.cold_reason, Some(ColdStartReason::LowOverlap));

        let decision = cold.prepare(Some(&previous), -1, d(1), d(14), signature(42));
        assert!(decision.is_warm());
        assert!(!decision.degraded);
    }

    #[test]
    fn test_disabled_policy_never_hints() {
        let previous = hints(1..=14);
        let decision = WarmstartPolicy::disabled().prepare(Some(&previous), 0, d(1), d(14), signature(42));
        assert_eq!(decision.cold_reason, Some(ColdStartReason::Disabled));
    }
}
