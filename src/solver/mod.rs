// ==========================================
// 冷链产销排产系统 - 求解器层
// ==========================================
// 职责: MIP 中间表示 + 后端抽象 + 墙钟时限调度
// 说明: 分支定界/单纯形引擎本身视为外部服务
// ==========================================

pub mod backend;
pub mod config;
pub mod error;
pub mod good_lp_backend;
pub mod model;
pub mod runner;

pub use backend::{BackendSolution, SolverBackend, SolverStatus};
pub use config::SolverConfig;
pub use error::{SolverError, SolverResult};
pub use good_lp_backend::GoodLpBackend;
pub use model::{LinearExpr, MipModel, ModelStats, Sense, VarDef, VarId, VarKind};
pub use runner::solve_with_deadline;
