// ==========================================
// 冷链产销排产系统 - 计划配置读取 Trait
// ==========================================
// 职责: 定义计划引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::settings::PlannerSettings;
use crate::engine::rolling::RollingConfig;
use crate::engine::window::ModelOptions;
use crate::solver::SolverConfig;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// PlannerConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait PlannerConfigReader: Send + Sync {
    /// 求解参数
    ///
    /// # 默认值
    /// - time_limit_secs = 120, mip_gap = 0.01
    async fn get_solver_config(&self) -> Result<SolverConfig, Box<dyn Error>>;

    /// 滚动时域参数（含热启动策略）
    ///
    /// # 默认值
    /// - window_size_days = 14, overlap_days = 7
    async fn get_rolling_config(&self) -> Result<RollingConfig, Box<dyn Error>>;

    /// 建模选项
    async fn get_model_options(&self) -> Result<ModelOptions, Box<dyn Error>>;

    /// 全部计划参数
    async fn get_planner_settings(&self) -> Result<PlannerSettings, Box<dyn Error>> {
        let solver = self.get_solver_config().await?;
        let rolling = self.get_rolling_config().await?;
        let model = self.get_model_options().await?;
        Ok(PlannerSettings {
            solver,
            rolling,
            model,
        })
    }
}
