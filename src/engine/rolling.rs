// ==========================================
// 冷链产销排产系统 - 滚动时域分解器
// ==========================================
// 职责: 长周期切分为重叠窗口,逐窗求解,只提交非重叠前缀,
//       以提交前缀的期末状态作为下一窗口初始条件
// 状态机: PENDING → SOLVING → (COMMITTED | FAILED)
// 红线: 提交天数必须是 7 的整数倍（周度车辆/人工周期对齐）,
//       不对齐默认直接拒绝; 仅实验开关 allow_unaligned 放行并告警
// 红线: 窗口失败不得跳过; 按配置放开缺货重试,否则停在第一个失败窗口并报告日期范围
// ==========================================

use crate::domain::scenario::PlanningContext;
use crate::engine::error::{PlanningError, PlanningResult};
use crate::engine::events::{OptionalEventPublisher, PlanningEvent, PlanningEventPublisher, PlanningEventType};
use crate::engine::solution::{CostBreakdown, PlanRecords};
use crate::engine::warmstart::{WarmstartHints, WarmstartPolicy};
use crate::engine::window::{ModelOptions, PlanningWindow, WindowInputs};
use crate::engine::window_solver::{WindowAttempt, WindowSolver};
use crate::solver::SolverStatus;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// 车辆/人工排班的运营周期（天）
pub const OPERATIONAL_CYCLE_DAYS: u32 = 7;
pub const DEFAULT_WINDOW_SIZE_DAYS: u32 = 14;
pub const DEFAULT_OVERLAP_DAYS: u32 = 7;

// ==========================================
// RollingConfig
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingConfig {
    #[serde(default = "default_window")]
    pub window_size_days: u32,
    #[serde(default = "default_overlap")]
    pub overlap_days: u32,
    /// 实验开关: 放行不对齐周周期的提交天数（仅用于回归研究）
    #[serde(default)]
    pub allow_unaligned: bool,
    /// 窗口不可行时放开缺货重试
    #[serde(default)]
    pub retry_with_shortfall: bool,
    #[serde(default)]
    pub warmstart: WarmstartPolicy,
}

fn default_window() -> u32 {
    DEFAULT_WINDOW_SIZE_DAYS
}

fn default_overlap() -> u32 {
    DEFAULT_OVERLAP_DAYS
}

impl Default for RollingConfig {
    fn default() -> Self {
        Self {
            window_size_days: DEFAULT_WINDOW_SIZE_DAYS,
            overlap_days: DEFAULT_OVERLAP_DAYS,
            allow_unaligned: false,
            retry_with_shortfall: false,
            warmstart: WarmstartPolicy::default(),
        }
    }
}

impl RollingConfig {
    pub fn new(window_size_days: u32, overlap_days: u32) -> Self {
        Self {
            window_size_days,
            overlap_days,
            ..Self::default()
        }
    }

    pub fn with_unaligned(mut self, allow: bool) -> Self {
        self.allow_unaligned = allow;
        self
    }

    pub fn with_shortfall_retry(mut self, retry: bool) -> Self {
        self.retry_with_shortfall = retry;
        self
    }

    pub fn with_warmstart(mut self, policy: WarmstartPolicy) -> Self {
        self.warmstart = policy;
        self
    }

    /// 每个窗口提交天数
    pub fn committed_days(&self) -> u32 {
        self.window_size_days.saturating_sub(self.overlap_days)
    }

    pub fn validate(&self) -> PlanningResult<()> {
        if self.window_size_days == 0 {
            return Err(PlanningError::InvalidRollingConfig("窗口天数必须大于 0".into()));
        }
        if self.overlap_days >= self.window_size_days {
            return Err(PlanningError::InvalidRollingConfig(format!(
                "重叠天数 {} 必须小于窗口天数 {}",
                self.overlap_days, self.window_size_days
            )));
        }
        let committed = self.committed_days();
        if committed % OPERATIONAL_CYCLE_DAYS != 0 {
            if !self.allow_unaligned {
                return Err(PlanningError::UnalignedCommitment {
                    window_size: self.window_size_days,
                    overlap: self.overlap_days,
                    committed_days: committed,
                });
            }
            warn!(
                window_size = self.window_size_days,
                overlap = self.overlap_days,
                committed_days = committed,
                "提交天数未对齐周周期,窗口将逐次错开星期,可能出现大量不可行窗口"
            );
        }
        if !(0.0..=1.0).contains(&self.warmstart.min_overlap_ratio) {
            return Err(PlanningError::InvalidRollingConfig(format!(
                "热启动最小重叠率必须在 [0, 1] 内: {}",
                self.warmstart.min_overlap_ratio
            )));
        }
        Ok(())
    }

    /// 切分计划区间
    ///
    /// 最后一个窗口截断到 end 并全部提交
    pub fn plan_windows(&self, start: NaiveDate, end: NaiveDate) -> PlanningResult<Vec<PlanningWindow>> {
        self.validate()?;
        if end < start {
            return Err(PlanningError::InvalidHorizon { start, end });
        }

        let size = Duration::days(self.window_size_days as i64 - 1);
        let committed = Duration::days(self.committed_days() as i64 - 1);
        let mut windows = Vec::new();
        let mut window_start = start;
        loop {
            let window_end = (window_start + size).min(end);
            let committed_end = if window_end == end {
                end
            } else {
                window_start + committed
            };
            let window = PlanningWindow::new(windows.len(), window_start, window_end, committed_end)?;
            windows.push(window);
            if window_end == end {
                break;
            }
            window_start = window.next_start();
        }
        Ok(windows)
    }
}

// ==========================================
// 窗口执行结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowState {
    Pending,
    Solving,
    Committed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowOutcome {
    pub window: PlanningWindow,
    pub state: WindowState,
    pub status: Option<SolverStatus>,
    pub objective: Option<f64>,
    pub gap: Option<f64>,
    pub hinted_vars: usize,
    pub overlap_ratio: Option<f64>,
    /// 放开缺货后重试才得到解
    pub used_shortfall: bool,
    pub audit_violations: usize,
    pub committed_cost: CostBreakdown,
    pub elapsed_ms: u64,
}

impl WindowOutcome {
    fn pending(window: PlanningWindow) -> Self {
        Self {
            window,
            state: WindowState::Pending,
            status: None,
            objective: None,
            gap: None,
            hinted_vars: 0,
            overlap_ratio: None,
            used_shortfall: false,
            audit_violations: 0,
            committed_cost: CostBreakdown::default(),
            elapsed_ms: 0,
        }
    }

    fn record_attempt(&mut self, attempt: &WindowAttempt) {
        self.status = Some(attempt.status);
        self.objective = attempt.objective;
        self.gap = attempt.gap;
        self.hinted_vars = attempt.hinted_vars;
        self.audit_violations = attempt.audit.as_ref().map_or(0, |a| a.violations.len());
        self.elapsed_ms += attempt.elapsed_ms;
    }
}

// ==========================================
// PlanResult - 整体计划结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResult {
    pub run_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub windows: Vec<WindowOutcome>,
    /// 全部已提交前缀拼接
    pub records: PlanRecords,
    pub cost: CostBreakdown,
}

impl PlanResult {
    /// 第一个失败窗口
    pub fn failed_window(&self) -> Option<&WindowOutcome> {
        self.windows.iter().find(|w| w.state == WindowState::Failed)
    }

    pub fn is_complete(&self) -> bool {
        self.windows.iter().all(|w| w.state == WindowState::Committed)
    }

    pub fn committed_windows(&self) -> usize {
        self.windows
            .iter()
            .filter(|w| w.state == WindowState::Committed)
            .count()
    }

    /// 失败窗口转为错误
    pub fn into_result(self) -> PlanningResult<PlanResult> {
        match self.failed_window() {
            Some(failed) => Err(PlanningError::WindowFailed {
                index: failed.window.index,
                start: failed.window.start,
                end: failed.window.end,
                status: failed.status.unwrap_or(SolverStatus::Error),
            }),
            None => Ok(self),
        }
    }
}

// ==========================================
// RollingPlanner
// ==========================================
pub struct RollingPlanner {
    solver: WindowSolver,
    config: RollingConfig,
    options: ModelOptions,
    events: OptionalEventPublisher,
}

impl RollingPlanner {
    pub fn new(solver: WindowSolver, config: RollingConfig, options: ModelOptions) -> Self {
        Self {
            solver,
            config,
            options,
            events: OptionalEventPublisher::none(),
        }
    }

    pub fn with_event_publisher(mut self, publisher: Arc<dyn PlanningEventPublisher>) -> Self {
        self.events = OptionalEventPublisher::with_publisher(publisher);
        self
    }

    pub fn config(&self) -> &RollingConfig {
        &self.config
    }

    /// 执行滚动计划; 任一窗口失败即返回 WindowFailed
    pub async fn plan(&self, ctx: &PlanningContext, start: NaiveDate, end: NaiveDate) -> PlanningResult<PlanResult> {
        self.execute(ctx, start, end).await?.into_result()
    }

    /// 执行滚动计划,失败窗口记录在结果中（停在第一个失败窗口,后续保持 PENDING）
    #[instrument(skip_all, fields(start = %start, end = %end))]
    pub async fn execute(&self, ctx: &PlanningContext, start: NaiveDate, end: NaiveDate) -> PlanningResult<PlanResult> {
        let windows = self.config.plan_windows(start, end)?;
        let run_id = Uuid::new_v4().to_string();
        info!(
            run_id = %run_id,
            windows = windows.len(),
            window_size = self.config.window_size_days,
            overlap = self.config.overlap_days,
            "开始滚动时域计划"
        );

        let mut outcomes: Vec<WindowOutcome> = windows.iter().copied().map(WindowOutcome::pending).collect();
        let mut records = PlanRecords::default();
        let mut inputs = WindowInputs::from_context(ctx, windows[0]);
        let mut previous: Option<(NaiveDate, WarmstartHints)> = None;

        for (i, window) in windows.iter().enumerate() {
            let range = (window.start, window.end);
            outcomes[i].state = WindowState::Solving;
            self.events
                .publish(PlanningEvent::for_window(&run_id, PlanningEventType::WindowStarted, i, range));

            let model = self.solver.build(ctx, &inputs, &self.options)?;
            let delta = previous
                .as_ref()
                .map_or(0, |(prev_start, _)| (window.start - *prev_start).num_days());
            let decision = self.config.warmstart.prepare(
                previous.as_ref().map(|(_, h)| h),
                delta,
                window.start,
                window.end,
                model.signature(),
            );
            outcomes[i].overlap_ratio = decision.overlap_ratio;
            if decision.degraded {
                self.events.publish(
                    PlanningEvent::for_window(&run_id, PlanningEventType::WarmstartDegraded, i, range)
                        .with_detail(format!("overlap_ratio={:.3}", decision.overlap_ratio.unwrap_or(0.0))),
                );
            }

            let mut attempt = self
                .solver
                .solve_model(ctx, &inputs, &self.options, &model, decision.hints.as_ref())
                .await?;
            outcomes[i].record_attempt(&attempt);

            if !attempt.is_feasible() && self.config.retry_with_shortfall && !self.options.allow_shortfall {
                warn!(
                    window_index = i,
                    status = %attempt.status,
                    "窗口不可行,放开缺货后重试"
                );
                let relaxed = self.options.clone().with_shortfall(true);
                attempt = self.solver.solve(ctx, &inputs, &relaxed, None).await?;
                outcomes[i].record_attempt(&attempt);
                outcomes[i].used_shortfall = true;
            }

            let solution = match attempt.solution {
                Some(solution) if attempt.status.has_solution() => solution,
                _ => {
                    outcomes[i].state = WindowState::Failed;
                    error!(
                        window_index = i,
                        start = %window.start,
                        end = %window.end,
                        status = %attempt.status,
                        "窗口求解失败,停止滚动"
                    );
                    self.events.publish(
                        PlanningEvent::for_window(&run_id, PlanningEventType::WindowFailed, i, range)
                            .with_detail(attempt.status.to_string()),
                    );
                    return Ok(self.finish(run_id, start, end, outcomes, records));
                }
            };

            if attempt.status == SolverStatus::TimeLimitFeasible {
                warn!(
                    window_index = i,
                    gap = ?attempt.gap,
                    "窗口在时限内未证明最优,提交当前可行解"
                );
            }

            let committed = solution.committed();
            outcomes[i].committed_cost = committed.total_cost();
            outcomes[i].state = WindowState::Committed;
            records.append(committed);
            info!(
                window_index = i,
                start = %window.start,
                committed_end = %window.committed_end,
                committed_cost = outcomes[i].committed_cost.total(),
                "窗口已提交"
            );
            self.events.publish(
                PlanningEvent::for_window(&run_id, PlanningEventType::WindowCommitted, i, range)
                    .with_detail(window.committed_end.to_string()),
            );

            if let Some(next) = windows.get(i + 1) {
                inputs = solution.carry_over(ctx, &inputs, *next);
            }
            previous = Some((window.start, WarmstartHints::extract(&solution)));
        }

        let result = self.finish(run_id, start, end, outcomes, records);
        self.events.publish(
            PlanningEvent::for_plan(&result.run_id, PlanningEventType::PlanCompleted, (start, end))
                .with_detail(format!("total_cost={:.2}", result.cost.total())),
        );
        Ok(result)
    }

    fn finish(
        &self,
        run_id: String,
        start: NaiveDate,
        end: NaiveDate,
        windows: Vec<WindowOutcome>,
        records: PlanRecords,
    ) -> PlanResult {
        let cost = records.total_cost();
        PlanResult {
            run_id,
            start,
            end,
            windows,
            records,
            cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    #[test]
    fn test_plan_windows_commits_non_overlapping_prefix() {
        let config = RollingConfig::default();
        let windows = config.plan_windows(d(1), d(28)).unwrap();
        let spans: Vec<_> = windows.iter().map(|w| (w.start, w.end, w.committed_end)).collect();
        assert_eq!(
            spans,
            vec![
                (d(1), d(14), d(7)),
                (d(8), d(21), d(14)),
                (d(15), d(28), d(28)),
            ]
        );
    }

    #[test]
    fn test_plan_windows_truncates_last_window() {
        let windows = RollingConfig::default().plan_windows(d(1), d(10)).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].end, d(10));
        assert_eq!(windows[0].committed_end, d(10));
    }

    #[test]
    fn test_unaligned_overlap_rejected_unless_overridden() {
        let config = RollingConfig::new(14, 5);
        match config.validate() {
            Err(PlanningError::UnalignedCommitment { committed_days, .. }) => assert_eq!(committed_days, 9),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(config.with_unaligned(true).validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_window() {
        assert!(matches!(
            RollingConfig::new(7, 7).validate(),
            Err(PlanningError::InvalidRollingConfig(_))
        ));
        assert!(RollingConfig::new(7, 0).validate().is_ok());
    }
}
