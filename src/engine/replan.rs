// ==========================================
// 冷链产销排产系统 - 日常重排驱动
// ==========================================
// 职责: 连续的单窗口重排（每日一次）,上一次解平移后作为热启动提示
// 平移天数: 两次重排首日之差
// ==========================================

use crate::domain::scenario::PlanningContext;
use crate::engine::error::{PlanningError, PlanningResult};
use crate::engine::warmstart::{WarmstartHints, WarmstartPolicy};
use crate::engine::window::{ModelOptions, PlanningWindow, WindowInputs};
use crate::engine::window_solver::{WindowAttempt, WindowSolver};
use chrono::{Duration, NaiveDate};
use tracing::{info, instrument};

/// 单次重排结果
#[derive(Debug, Clone)]
pub struct ReplanOutcome {
    pub window: PlanningWindow,
    pub attempt: WindowAttempt,
    pub overlap_ratio: Option<f64>,
    pub warm: bool,
}

pub struct DailyReplanner {
    solver: WindowSolver,
    options: ModelOptions,
    policy: WarmstartPolicy,
    horizon_days: u32,
    previous: Option<(NaiveDate, WarmstartHints)>,
}

impl DailyReplanner {
    pub fn new(solver: WindowSolver, options: ModelOptions, horizon_days: u32) -> Self {
        Self {
            solver,
            options,
            policy: WarmstartPolicy::default(),
            horizon_days,
            previous: None,
        }
    }

    pub fn with_policy(mut self, policy: WarmstartPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 丢弃上一次的提示（下一次冷启动）
    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn has_hints(&self) -> bool {
        self.previous.is_some()
    }

    /// 以 start 为首日重排 horizon_days 天
    ///
    /// # 参数
    /// - inputs: 当日初始条件; None 时使用场景自带期初库存
    #[instrument(skip_all, fields(start = %start))]
    pub async fn replan(
        &mut self,
        ctx: &PlanningContext,
        start: NaiveDate,
        inputs: Option<WindowInputs>,
    ) -> PlanningResult<ReplanOutcome> {
        if self.horizon_days == 0 {
            return Err(PlanningError::InvalidRollingConfig("重排天数必须大于 0".into()));
        }
        let end = start + Duration::days(self.horizon_days as i64 - 1);
        let window = PlanningWindow::single(start, end)?;
        let inputs = match inputs {
            Some(mut inputs) => {
                inputs.window = window;
                inputs
            }
            None => WindowInputs::from_context(ctx, window),
        };

        let model = self.solver.build(ctx, &inputs, &self.options)?;
        let decision = self.policy.prepare(
            self.previous.as_ref().map(|(_, h)| h),
            self.previous
                .as_ref()
                .map_or(0, |(prev_start, _)| (start - *prev_start).num_days()),
            window.start,
            window.end,
            model.signature(),
        );

        let attempt = self
            .solver
            .solve_model(ctx, &inputs, &self.options, &model, decision.hints.as_ref())
            .await?;

        let Some(solution) = attempt.solution.as_ref().filter(|_| attempt.status.has_solution()) else {
            return Err(PlanningError::WindowFailed {
                index: 0,
                start: window.start,
                end: window.end,
                status: attempt.status,
            });
        };
        self.previous = Some((start, WarmstartHints::extract(solution)));

        info!(
            status = %attempt.status,
            warm = decision.is_warm(),
            overlap_ratio = ?decision.overlap_ratio,
            hinted_vars = attempt.hinted_vars,
            "日常重排完成"
        );

        Ok(ReplanOutcome {
            window,
            warm: decision.is_warm(),
            overlap_ratio: decision.overlap_ratio,
            attempt,
        })
    }
}
