// ==========================================
// 冷链产销排产系统 - 单窗口求解门面
// ==========================================
// 职责: 构建窗口模型 → 展开热启动提示 → 限时求解 → 提取类型化解 → 审计
// 红线: 超时返回 incumbent 时状态必须是 TIME_LIMIT_FEASIBLE,不得标记为最优
// ==========================================

use crate::domain::scenario::PlanningContext;
use crate::engine::builder::WindowModel;
use crate::engine::error::PlanningResult;
use crate::engine::plan_audit::{AuditReport, PlanAuditor};
use crate::engine::solution::WindowSolution;
use crate::engine::warmstart::WarmstartHints;
use crate::engine::window::{ModelOptions, WindowInputs};
use crate::solver::model::ModelStats;
use crate::solver::{solve_with_deadline, GoodLpBackend, SolverBackend, SolverConfig, SolverStatus};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

// ==========================================
// WindowAttempt - 单次窗口求解结果
// ==========================================
#[derive(Debug, Clone)]
pub struct WindowAttempt {
    pub status: SolverStatus,
    pub objective: Option<f64>,
    pub gap: Option<f64>,
    pub stats: ModelStats,
    /// 命中热启动提示的变量数
    pub hinted_vars: usize,
    pub solution: Option<WindowSolution>,
    pub audit: Option<AuditReport>,
    pub elapsed_ms: u64,
}

impl WindowAttempt {
    pub fn is_feasible(&self) -> bool {
        self.status.has_solution() && self.solution.is_some()
    }

    /// 超时但有可行解（需要显式提示调用方）
    pub fn hit_time_limit(&self) -> bool {
        matches!(
            self.status,
            SolverStatus::TimeLimitFeasible | SolverStatus::TimeLimitNoSolution
        )
    }
}

// ==========================================
// WindowSolver
// ==========================================
#[derive(Clone)]
pub struct WindowSolver {
    backend: Arc<dyn SolverBackend>,
    config: SolverConfig,
}

impl WindowSolver {
    pub fn new(backend: Arc<dyn SolverBackend>, config: SolverConfig) -> Self {
        Self { backend, config }
    }

    /// 使用默认后端（good_lp/microlp）
    pub fn with_default_backend(config: SolverConfig) -> Self {
        Self::new(Arc::new(GoodLpBackend::new()), config)
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// 仅构建模型（诊断/测试）
    pub fn build(
        &self,
        ctx: &PlanningContext,
        inputs: &WindowInputs,
        options: &ModelOptions,
    ) -> PlanningResult<WindowModel> {
        Ok(WindowModel::build(ctx, inputs, options)?)
    }

    /// 构建并求解单个窗口
    #[instrument(skip_all, fields(window_index = inputs.window.index, start = %inputs.window.start, end = %inputs.window.end))]
    pub async fn solve(
        &self,
        ctx: &PlanningContext,
        inputs: &WindowInputs,
        options: &ModelOptions,
        hints: Option<&WarmstartHints>,
    ) -> PlanningResult<WindowAttempt> {
        let model = self.build(ctx, inputs, options)?;
        self.solve_model(ctx, inputs, options, &model, hints).await
    }

    /// 求解已构建的窗口模型
    pub async fn solve_model(
        &self,
        ctx: &PlanningContext,
        inputs: &WindowInputs,
        options: &ModelOptions,
        model: &WindowModel,
        hints: Option<&WarmstartHints>,
    ) -> PlanningResult<WindowAttempt> {
        let started = Instant::now();
        let stats = model.stats();

        let (hint_vector, hinted_vars) = match hints {
            Some(hints) if self.config.use_hints => model.hint_vector(hints),
            _ => (Vec::new(), 0),
        };
        if hints.is_some() && hinted_vars == 0 {
            warn!("热启动提示未命中任何变量");
        }

        let backend_solution = solve_with_deadline(
            Arc::clone(&self.backend),
            Arc::clone(model.model()),
            Arc::new(hint_vector),
            self.config.clone(),
        )
        .await?;

        let status = backend_solution.status;
        let (solution, audit) = match (&backend_solution.values, backend_solution.objective) {
            (Some(values), Some(objective)) if status.has_solution() => {
                let solution = WindowSolution::from_values(ctx, model, status, objective, backend_solution.gap, values);
                let audit = PlanAuditor::new(ctx, options).audit(inputs, &solution);
                if !audit.is_clean() {
                    warn!(
                        violations = audit.violations.len(),
                        first = ?audit.violations.first().map(|v| &v.detail),
                        "窗口解审计发现违规"
                    );
                }
                (Some(solution), Some(audit))
            }
            _ => (None, None),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            status = %status,
            objective = ?backend_solution.objective,
            gap = ?backend_solution.gap,
            vars = stats.variables,
            constraints = stats.constraints,
            hinted_vars,
            elapsed_ms,
            "窗口求解结束"
        );

        Ok(WindowAttempt {
            status,
            objective: backend_solution.objective,
            gap: backend_solution.gap,
            stats,
            hinted_vars,
            solution,
            audit,
            elapsed_ms,
        })
    }
}
