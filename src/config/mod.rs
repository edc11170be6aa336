// ==========================================
// 冷链产销排产系统 - 配置层
// ==========================================
// 职责: 计划参数管理（求解/滚动/热启动/建模）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod error;
pub mod planner_config_trait;
pub mod settings;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use error::ConfigError;
pub use planner_config_trait::PlannerConfigReader;
pub use settings::PlannerSettings;
