// ==========================================
// 冷链产销排产系统 - 核心库
// ==========================================
// 系统定位: 批次感知的多节点产销计划引擎
// 求解方式: 混合整数规划 + 滚动时域分解 + 热启动
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 节点/路线/产品/需求/人工/车辆
pub mod domain;

// 求解器层 - 模型中间表示与后端
pub mod solver;

// 引擎层 - 批次库存/生产资源约束/单窗口求解/滚动时域/热启动
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（配置存储）
pub mod db;

// 计划导出
pub mod export;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::types::{DepartureSlot, StorageState, TransportMode};

pub use domain::{
    CostParameters, DemandRecord, InTransitArrival, InitialInventoryRecord, LaborDay, ModelError,
    Network, Node, NodeCapabilities, PlanningContext, PlanningData, Product, Route, TruckSchedule,
};

pub use solver::{GoodLpBackend, SolverBackend, SolverConfig, SolverError, SolverStatus};

pub use engine::{
    DailyReplanner, ModelOptions, PlanResult, PlanningError, PlanningWindow, RollingConfig,
    RollingPlanner, WarmstartHints, WarmstartPolicy, WindowInputs, WindowOutcome, WindowSolution,
    WindowSolver,
};

pub use config::{ConfigManager, PlannerConfigReader, PlannerSettings};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "冷链产销排产系统";
