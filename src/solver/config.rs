// ==========================================
// 冷链产销排产系统 - 求解配置
// ==========================================
// 红线: 每次求解显式传入,不使用全局状态
// ==========================================

use crate::solver::error::{SolverError, SolverResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// 单窗口墙钟时限（秒）
    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: f64,
    /// 相对最优间隙目标
    #[serde(default = "default_mip_gap")]
    pub mip_gap: f64,
    /// 后端线程数（后端不支持多线程时提交前拒绝）
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// 是否使用热启动提示
    #[serde(default = "default_use_hints")]
    pub use_hints: bool,
    /// 可行性检查容差
    #[serde(default = "default_feasibility_tolerance")]
    pub feasibility_tolerance: f64,
}

fn default_time_limit_secs() -> f64 {
    120.0
}

fn default_mip_gap() -> f64 {
    0.01
}

fn default_threads() -> usize {
    1
}

fn default_use_hints() -> bool {
    true
}

fn default_feasibility_tolerance() -> f64 {
    1e-5
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: default_time_limit_secs(),
            mip_gap: default_mip_gap(),
            threads: default_threads(),
            use_hints: default_use_hints(),
            feasibility_tolerance: default_feasibility_tolerance(),
        }
    }
}

impl SolverConfig {
    pub fn with_time_limit(mut self, secs: f64) -> Self {
        self.time_limit_secs = secs;
        self
    }

    pub fn with_mip_gap(mut self, gap: f64) -> Self {
        self.mip_gap = gap;
        self
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs_f64(self.time_limit_secs)
    }

    pub fn validate(&self) -> SolverResult<()> {
        if !self.time_limit_secs.is_finite() || self.time_limit_secs <= 0.0 {
            return Err(SolverError::InvalidConfig(format!(
                "time_limit_secs 必须为正数: {}",
                self.time_limit_secs
            )));
        }
        if !(0.0..1.0).contains(&self.mip_gap) {
            return Err(SolverError::InvalidConfig(format!(
                "mip_gap 必须在 [0, 1) 内: {}",
                self.mip_gap
            )));
        }
        if self.threads == 0 {
            return Err(SolverError::InvalidConfig("threads 不能为 0".to_string()));
        }
        if !(self.feasibility_tolerance > 0.0) {
            return Err(SolverError::InvalidConfig(format!(
                "feasibility_tolerance 必须为正数: {}",
                self.feasibility_tolerance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time_limit(), Duration::from_secs(120));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(SolverConfig::default().with_time_limit(0.0).validate().is_err());
        assert!(SolverConfig::default().with_mip_gap(1.5).validate().is_err());
    }
}
