// ==========================================
// 冷链产销排产系统 - 计划参数集合
// ==========================================
// 职责: 求解/滚动/建模三组参数的聚合与校验
// ==========================================

use crate::config::error::ConfigError;
use crate::engine::rolling::RollingConfig;
use crate::engine::window::ModelOptions;
use crate::solver::SolverConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannerSettings {
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub rolling: RollingConfig,
    #[serde(default)]
    pub model: ModelOptions,
}

impl PlannerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.solver
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.rolling
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = PlannerSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.rolling.window_size_days, 14);
        assert_eq!(settings.rolling.overlap_days, 7);
        assert!(!settings.model.allow_shortfall);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: PlannerSettings =
            serde_json::from_str(r#"{"rolling": {"window_size_days": 21}}"#).unwrap();
        assert_eq!(settings.rolling.window_size_days, 21);
        assert_eq!(settings.rolling.overlap_days, 7);
        assert_eq!(settings.solver, SolverConfig::default());
    }
}
