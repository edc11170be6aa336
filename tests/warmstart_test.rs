// ==========================================
// 热启动与超时集成测试
// ==========================================
// 测试目标: 日常重排沿用上一解、结构变化强制冷启动、超时时以提示解兜底
// ==========================================


use cold_chain_aps::engine::{
    DailyReplanner, ModelOptions, PlanningWindow, WarmstartHints, WarmstartPolicy, WindowInputs,
    WindowSolver,
};
use cold_chain_aps::solver::{BackendSolution, MipModel, SolverBackend, SolverResult};
use cold_chain_aps::{PlanningContext, Product, SolverConfig, SolverStatus};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use test_helpers::*;

const REPLAN_DAYS: u32 = 14;

/// 日需求 8000（第 3 天起）,枢纽期初 8000 覆盖任一重排首日
fn replan_context() -> PlanningContext {
    let mut data = single_lane_data(
        1400.0,
        fixed_labor(30),
        hub_demand(30, |n| if n >= 3 { 8000.0 } else { 0.0 }),
    );
    data.initial_inventory = vec![hub_stock(8000.0)];
    context(data)
}

/// 超过时限才返回的后端
struct SlowBackend;

impl SolverBackend for SlowBackend {
    fn name(&self) -> &str {
        "slow"
    }

    fn solve(&self, _: &MipModel, _: &[Option<f64>], _: &SolverConfig) -> SolverResult<BackendSolution> {
        thread::sleep(Duration::from_secs(3));
        Ok(BackendSolution::no_solution(SolverStatus::Error))
    }
}

#[tokio::test]
async fn test_consecutive_daily_replans_reuse_shifted_solution() {
    let ctx = replan_context();
    let solver = WindowSolver::with_default_backend(solver_config());
    let mut replanner = DailyReplanner::new(solver, ModelOptions::default(), REPLAN_DAYS);

    let first = replanner.replan(&ctx, day(1), None).await.unwrap();
    assert!(!first.warm);
    assert_eq!(first.attempt.hinted_vars, 0);
    assert!(replanner.has_hints());

    let second = replanner.replan(&ctx, day(2), None).await.unwrap();
    assert!(second.warm);
    let ratio = second.overlap_ratio.expect("热启动应给出重叠率");
    assert!(ratio >= 0.7, "重叠率 {} 低于阈值", ratio);
    assert!(second.attempt.hinted_vars > 0);
    assert_eq!(second.window.start, day(2));
    assert_eq!(second.window.end, day(15));
    assert_eq!(second.attempt.status, SolverStatus::Optimal);

    // 只改需求量不改结构,仍然热启动
    let reforecast = ctx
        .with_demand(hub_demand(30, |n| match n {
            1 | 2 => 0.0,
            3 => 8000.0,
            _ => 9000.0,
        }))
        .unwrap();
    let third = replanner.replan(&reforecast, day(3), None).await.unwrap();
    assert!(third.warm);
}

#[tokio::test]
async fn test_structure_change_forces_cold_start() {
    let ctx = replan_context();
    let solver = WindowSolver::with_default_backend(solver_config());
    let mut replanner = DailyReplanner::new(solver, ModelOptions::default(), REPLAN_DAYS);
    replanner.replan(&ctx, day(1), None).await.unwrap();

    let mut data = single_lane_data(
        1400.0,
        fixed_labor(30),
        hub_demand(30, |n| if n >= 3 { 8000.0 } else { 0.0 }),
    );
    data.initial_inventory = vec![hub_stock(8000.0)];
    data.products.push(Product::new("P2").with_production_cost(1.0));
    let extended = context(data);

    let outcome = replanner.replan(&extended, day(2), None).await.unwrap();
    assert!(!outcome.warm);
    assert!(outcome.overlap_ratio.is_none());
    assert_eq!(outcome.attempt.hinted_vars, 0);
}

#[tokio::test]
async fn test_disabled_policy_always_solves_cold() {
    let ctx = replan_context();
    let solver = WindowSolver::with_default_backend(solver_config());
    let mut replanner =
        DailyReplanner::new(solver, ModelOptions::default(), REPLAN_DAYS).with_policy(WarmstartPolicy::disabled());

    replanner.replan(&ctx, day(1), None).await.unwrap();
    let outcome = replanner.replan(&ctx, day(2), None).await.unwrap();
    assert!(!outcome.warm);

    replanner.reset();
    assert!(!replanner.has_hints());
}

#[tokio::test]
async fn test_timeout_returns_feasible_hint_as_incumbent() {
    let ctx = context(single_lane_data(
        100.0,
        fixed_labor(7),
        hub_demand(7, |n| if n >= 3 { 500.0 } else { 0.0 }),
    ));
    let inputs = WindowInputs::from_context(&ctx, PlanningWindow::single(day(1), day(7)).unwrap());
    let options = ModelOptions::default();

    let exact = WindowSolver::with_default_backend(solver_config())
        .solve(&ctx, &inputs, &options, None)
        .await
        .unwrap();
    assert_eq!(exact.status, SolverStatus::Optimal);
    let hints = WarmstartHints::extract(exact.solution.as_ref().unwrap());

    let slow = WindowSolver::new(Arc::new(SlowBackend), SolverConfig::default().with_time_limit(0.2));
    let attempt = slow.solve(&ctx, &inputs, &options, Some(&hints)).await.unwrap();
    assert_eq!(attempt.status, SolverStatus::TimeLimitFeasible);
    assert!(attempt.hit_time_limit());
    assert!(attempt.is_feasible());
    let objective = attempt.objective.unwrap();
    let expected = exact.objective.unwrap();
    assert!((objective - expected).abs() <= 1e-6 * expected.abs().max(1.0));
    assert!(attempt.solution.is_some());

    let cold = slow.solve(&ctx, &inputs, &options, None).await.unwrap();
    assert_eq!(cold.status, SolverStatus::TimeLimitNoSolution);
    assert!(cold.hit_time_limit());
    assert!(!cold.is_feasible());
    assert!(cold.solution.is_none());
}
