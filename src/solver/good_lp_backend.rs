// ==========================================
// 冷链产销排产系统 - good_lp 求解后端
// ==========================================
// 引擎: microlp（纯 Rust 单纯形 + 分支定界,单线程）
// 说明: 时限/间隙/初始解直接交给 microlp,到时限后求解线程自行结束
// ==========================================

use crate::solver::backend::{BackendSolution, SolverBackend, SolverStatus};
use crate::solver::config::SolverConfig;
use crate::solver::error::{SolverError, SolverResult};
use crate::solver::model::{MipModel, Sense, VarKind};
use good_lp::{
    constraint, microlp, variable, Expression, ProblemVariables, ResolutionError, Solution, SolutionStatus,
    SolverModel, Variable, WithInitialSolution, WithMipGap, WithTimeLimit,
};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpBackend;

impl GoodLpBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SolverBackend for GoodLpBackend {
    fn name(&self) -> &str {
        "good_lp/microlp"
    }

    fn supports_hints(&self) -> bool {
        true
    }

    fn enforces_time_limit(&self) -> bool {
        true
    }

    fn check_config(&self, config: &SolverConfig) -> SolverResult<()> {
        if config.threads > 1 {
            return Err(SolverError::InvalidConfig(format!(
                "{} 为单线程引擎,threads = {} 无法生效",
                self.name(),
                config.threads
            )));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(vars = model.num_vars(), constraints = model.constraints().len()))]
    fn solve(
        &self,
        model: &MipModel,
        hints: &[Option<f64>],
        config: &SolverConfig,
    ) -> SolverResult<BackendSolution> {
        if model.trivially_infeasible().is_some() {
            return Ok(BackendSolution::infeasible());
        }
        if model.num_vars() == 0 {
            return Ok(BackendSolution::optimal(0.0, Vec::new()));
        }
        self.check_config(config)?;
        debug!(
            time_limit_secs = config.time_limit_secs,
            mip_gap = config.mip_gap,
            hinted = hints.iter().filter(|h| h.is_some()).count(),
            "提交 microlp 求解"
        );

        let mut problem_vars = ProblemVariables::new();
        let vars: Vec<Variable> = model
            .vars()
            .iter()
            .map(|def| {
                let mut definition = match def.kind {
                    VarKind::Binary => variable().binary(),
                    VarKind::Integer => variable().integer(),
                    VarKind::Continuous => variable(),
                };
                definition = definition.min(def.lower);
                if let Some(upper) = def.upper {
                    definition = definition.max(upper);
                }
                problem_vars.add(definition.name(def.name.clone()))
            })
            .collect();

        let mut objective = Expression::from(0.0);
        for (def, var) in model.vars().iter().zip(&vars) {
            if def.cost != 0.0 {
                objective += def.cost * *var;
            }
        }

        let mut problem = problem_vars
            .minimise(objective)
            .using(microlp)
            .with_time_limit(config.time_limit_secs)
            .with_mip_gap(config.mip_gap as f32)
            .map_err(|e| SolverError::InvalidConfig(format!("mip_gap = {}: {:?}", config.mip_gap, e)))?;
        for c in model.constraints() {
            let mut lhs = Expression::from(0.0);
            for &(id, coef) in c.expr.terms() {
                lhs += coef * vars[id.index()];
            }
            let rhs = c.rhs;
            let built = match c.sense {
                Sense::Le => constraint!(lhs <= rhs),
                Sense::Ge => constraint!(lhs >= rhs),
                Sense::Eq => constraint!(lhs == rhs),
            };
            problem.add_constraint(built);
        }

        // 不可行或越界的提示由 microlp 自行忽略
        if config.use_hints && hints.len() == vars.len() && hints.iter().any(Option::is_some) {
            let initial: Vec<(Variable, f64)> = hints
                .iter()
                .zip(&vars)
                .filter_map(|(hint, var)| hint.map(|value| (*var, value)))
                .collect();
            problem = problem.with_initial_solution(initial);
        }

        match problem.solve() {
            Ok(solution) => {
                let values: Vec<f64> = model
                    .vars()
                    .iter()
                    .zip(&vars)
                    .map(|(def, var)| clean_value(def.kind, solution.value(*var)))
                    .collect();
                let objective = model.objective_value(&values);
                Ok(match solution.status() {
                    SolutionStatus::Optimal => BackendSolution::optimal(objective, values),
                    // 间隙目标内视为最优,间隙取目标值作为上界
                    SolutionStatus::GapLimit => BackendSolution {
                        gap: Some(config.mip_gap),
                        ..BackendSolution::optimal(objective, values)
                    },
                    SolutionStatus::TimeLimit => BackendSolution::time_limit_feasible(objective, values),
                })
            }
            Err(ResolutionError::Infeasible) => Ok(BackendSolution::infeasible()),
            Err(ResolutionError::Other(message)) if message.starts_with("Time limit") => {
                Ok(BackendSolution::no_solution(SolverStatus::TimeLimitNoSolution))
            }
            Err(ResolutionError::Unbounded) => Err(SolverError::Unbounded),
            Err(other) => Err(SolverError::Backend {
                backend: self.name().to_string(),
                message: other.to_string(),
            }),
        }
    }
}

/// 整数变量取整,消除数值噪声
fn clean_value(kind: VarKind, value: f64) -> f64 {
    match kind {
        VarKind::Binary | VarKind::Integer => value.round(),
        VarKind::Continuous if value.abs() < 1e-9 => 0.0,
        VarKind::Continuous => value,
    }
}
