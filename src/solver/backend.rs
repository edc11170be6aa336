// ==========================================
// 冷链产销排产系统 - 求解后端接口
// ==========================================
// 职责: 定义外部 MIP 求解服务的抽象（模型 + 提示 + 预算 → 状态/目标/取值）
// 说明: 后端实现为同步阻塞调用; 支持原生时限的后端自行在时限处停止,
//       runner 的墙钟时限只作兜底
// ==========================================

use crate::solver::config::SolverConfig;
use crate::solver::error::SolverResult;
use crate::solver::model::MipModel;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 求解状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolverStatus {
    Optimal,             // 最优
    TimeLimitFeasible,   // 超时,有可行解
    TimeLimitNoSolution, // 超时,无可行解
    Infeasible,          // 证明不可行
    Error,               // 后端错误
}

impl SolverStatus {
    /// 是否带有可用解
    pub fn has_solution(self) -> bool {
        matches!(self, SolverStatus::Optimal | SolverStatus::TimeLimitFeasible)
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolverStatus::Optimal => "OPTIMAL",
            SolverStatus::TimeLimitFeasible => "TIME_LIMIT_FEASIBLE",
            SolverStatus::TimeLimitNoSolution => "TIME_LIMIT_NO_SOLUTION",
            SolverStatus::Infeasible => "INFEASIBLE",
            SolverStatus::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

// ==========================================
// 后端求解结果
// ==========================================
#[derive(Debug, Clone)]
pub struct BackendSolution {
    pub status: SolverStatus,
    pub objective: Option<f64>,
    /// 与模型变量同序; 无解时为 None
    pub values: Option<Vec<f64>>,
    /// 相对间隙（未知时为 None）
    pub gap: Option<f64>,
}

impl BackendSolution {
    pub fn optimal(objective: f64, values: Vec<f64>) -> Self {
        Self {
            status: SolverStatus::Optimal,
            objective: Some(objective),
            values: Some(values),
            gap: Some(0.0),
        }
    }

    /// 时限内找到的 incumbent,间隙未知
    pub fn time_limit_feasible(objective: f64, values: Vec<f64>) -> Self {
        Self {
            status: SolverStatus::TimeLimitFeasible,
            objective: Some(objective),
            values: Some(values),
            gap: None,
        }
    }

    pub fn infeasible() -> Self {
        Self {
            status: SolverStatus::Infeasible,
            objective: None,
            values: None,
            gap: None,
        }
    }

    pub fn no_solution(status: SolverStatus) -> Self {
        Self {
            status,
            objective: None,
            values: None,
            gap: None,
        }
    }
}

// ==========================================
// SolverBackend Trait
// ==========================================
pub trait SolverBackend: Send + Sync {
    /// 后端名称（日志用）
    fn name(&self) -> &str;

    /// 是否接受初始解提示
    fn supports_hints(&self) -> bool {
        false
    }

    /// 是否在 SolverConfig 时限处自行终止
    fn enforces_time_limit(&self) -> bool {
        false
    }

    /// 后端无法执行的配置（如线程数）在提交前拒绝
    fn check_config(&self, _config: &SolverConfig) -> SolverResult<()> {
        Ok(())
    }

    /// 阻塞求解
    ///
    /// # 参数
    /// - hints: 与模型变量同序的提示值（可为空切片）
    fn solve(
        &self,
        model: &MipModel,
        hints: &[Option<f64>],
        config: &SolverConfig,
    ) -> SolverResult<BackendSolution>;
}
