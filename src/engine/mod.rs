// ==========================================
// 冷链产销排产系统 - 引擎层
// ==========================================
// 职责: 批次库存引擎、生产/人工/车辆约束、单窗口求解、滚动时域、热启动
// 红线: 每个窗口独立构建不可变模型; 窗口之间只传递期末状态与提示表
// ==========================================

pub mod builder;
pub mod cohort;
pub mod error;
pub mod events;
pub mod labor;
pub mod plan_audit;
pub mod production;
pub mod replan;
pub mod rolling;
pub mod solution;
pub mod truck;
pub mod var_key;
pub mod warmstart;
pub mod window;
pub mod window_solver;

// 重导出核心类型
pub use builder::{ModelSignature, WindowModel};
pub use error::{PlanningError, PlanningResult};
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, PlanningEvent, PlanningEventPublisher,
    PlanningEventType,
};
pub use plan_audit::{AuditCheck, AuditReport, PlanAuditor};
pub use replan::{DailyReplanner, ReplanOutcome};
pub use rolling::{PlanResult, RollingConfig, RollingPlanner, WindowOutcome, WindowState};
pub use solution::{CostBreakdown, CostCategory, PlanRecords, WindowSolution};
pub use var_key::VarKey;
pub use warmstart::{LowOverlapAction, WarmstartDecision, WarmstartHints, WarmstartPolicy};
pub use window::{ModelOptions, PlanningWindow, WindowInputs};
pub use window_solver::{WindowAttempt, WindowSolver};
