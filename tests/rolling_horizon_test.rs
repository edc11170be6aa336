// ==========================================
// 滚动时域集成测试
// ==========================================
// 测试目标: 多周计划逐窗提交、窗口间状态传递、失败与缺货重试、周期对齐校验
// ==========================================


use cold_chain_aps::engine::{
    ModelOptions, PlanningError, PlanningEvent, PlanningEventPublisher, PlanningEventType,
    RollingConfig, RollingPlanner, WindowSolver, WindowState,
};
use cold_chain_aps::DepartureSlot;
use std::error::Error;
use std::sync::{Arc, Mutex};
use test_helpers::*;

const EPS: f64 = 1e-3;
const HORIZON: i64 = 28;

/// 记录事件类型的发布者
#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<PlanningEventType>>,
}

impl RecordingPublisher {
    fn count(&self, event_type: PlanningEventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == event_type)
            .count()
    }
}

impl PlanningEventPublisher for RecordingPublisher {
    fn publish(&self, event: PlanningEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.events.lock().unwrap().push(event.event_type);
        Ok(())
    }
}

fn base_demand(n: i64) -> f64 {
    match n {
        19 => 30000.0,
        _ => 10000.0,
    }
}

/// 4 周场景: 工作日固定班 + 周末非固定日,每日下午车,第 19 天需求尖峰
fn four_week_context(demand: impl Fn(i64) -> f64) -> cold_chain_aps::PlanningContext {
    let mut data = single_lane_data(1400.0, weekly_labor(HORIZON), hub_demand(HORIZON, demand));
    data.trucks = vec![daily_truck(DepartureSlot::Afternoon, 40000.0)];
    data.initial_inventory = vec![hub_stock(10000.0)];
    context(data)
}

fn planner(config: RollingConfig) -> RollingPlanner {
    RollingPlanner::new(
        WindowSolver::with_default_backend(solver_config()),
        config,
        ModelOptions::default(),
    )
}

#[tokio::test]
async fn test_four_week_plan_commits_every_window() {
    let ctx = four_week_context(base_demand);
    let publisher = Arc::new(RecordingPublisher::default());
    let planner = planner(RollingConfig::default()).with_event_publisher(publisher.clone());

    let plan = planner.plan(&ctx, day(1), day(HORIZON)).await.unwrap();

    assert_eq!(plan.windows.len(), 3);
    assert!(plan.is_complete());
    assert!(plan.windows.iter().all(|w| w.state == WindowState::Committed));
    assert!(plan.records.total_shortfall() < EPS);

    // 每天的需求都被恰好满足一次（提交前缀互不重叠）
    for n in 1..=HORIZON {
        let consumed: f64 = plan
            .records
            .consumption
            .iter()
            .filter(|c| c.date == day(n))
            .map(|c| c.quantity)
            .sum();
        assert!(
            (consumed - base_demand(n)).abs() < EPS,
            "{} 消耗 {} 与需求 {} 不一致",
            day(n),
            consumed,
            base_demand(n)
        );
    }
    for n in 1..=HORIZON {
        let records = plan.records.production.iter().filter(|p| p.date == day(n)).count();
        assert!(records <= 1, "{} 出现重复提交的生产记录", day(n));
    }
    assert!(plan.records.production.iter().all(|p| p.date <= day(HORIZON)));

    // 第一个窗口冷启动,之后沿用平移后的上一解
    assert!(plan.windows[0].overlap_ratio.is_none());
    assert!(plan.windows[1].overlap_ratio.is_some());
    assert!(plan.windows[1].hinted_vars > 0);

    assert_eq!(publisher.count(PlanningEventType::WindowStarted), 3);
    assert_eq!(publisher.count(PlanningEventType::WindowCommitted), 3);
    assert_eq!(publisher.count(PlanningEventType::PlanCompleted), 1);
    assert_eq!(publisher.count(PlanningEventType::WindowFailed), 0);

    let committed_total: f64 = plan.windows.iter().map(|w| w.committed_cost.total()).sum();
    assert!((committed_total - plan.cost.total()).abs() < 1e-6 * plan.cost.total().max(1.0));
}

#[tokio::test]
async fn test_infeasible_window_stops_rolling() {
    // 第 18 天需求远超累计产能,只有第二个窗口能看到
    let ctx = four_week_context(|n| if n == 18 { 500000.0 } else { 10000.0 });
    let publisher = Arc::new(RecordingPublisher::default());
    let planner = planner(RollingConfig::default()).with_event_publisher(publisher.clone());

    let plan = planner.execute(&ctx, day(1), day(HORIZON)).await.unwrap();
    assert_eq!(plan.windows[0].state, WindowState::Committed);
    assert_eq!(plan.windows[1].state, WindowState::Failed);
    assert_eq!(plan.windows[2].state, WindowState::Pending);
    assert_eq!(plan.committed_windows(), 1);
    assert!(plan.records.production.iter().all(|p| p.date <= day(7)));
    assert_eq!(publisher.count(PlanningEventType::WindowFailed), 1);
    assert_eq!(publisher.count(PlanningEventType::PlanCompleted), 0);

    match plan.into_result() {
        Err(PlanningError::WindowFailed { index, start, end, .. }) => {
            assert_eq!(index, 1);
            assert_eq!(start, day(8));
            assert_eq!(end, day(21));
        }
        other => panic!("应返回窗口失败: {:?}", other.map(|p| p.run_id)),
    }
}

#[tokio::test]
async fn test_shortfall_retry_completes_infeasible_horizon() {
    let ctx = four_week_context(|n| if n == 18 { 500000.0 } else { 10000.0 });
    let planner = planner(RollingConfig::default().with_shortfall_retry(true));

    let plan = planner.plan(&ctx, day(1), day(HORIZON)).await.unwrap();
    assert!(plan.is_complete());
    assert!(!plan.windows[0].used_shortfall);
    assert!(plan.windows[1].used_shortfall);
    assert!(plan.records.total_shortfall() > EPS);
    assert!(plan.cost.shortfall > 0.0);
}

#[tokio::test]
async fn test_unaligned_commitment_rejected_before_solving() {
    let ctx = four_week_context(base_demand);

    let result = planner(RollingConfig::new(14, 5)).plan(&ctx, day(1), day(HORIZON)).await;
    match result {
        Err(PlanningError::UnalignedCommitment { committed_days, .. }) => assert_eq!(committed_days, 9),
        other => panic!("未对齐配置应被拒绝: {:?}", other.map(|p| p.run_id)),
    }

    let windows = RollingConfig::new(14, 5)
        .with_unaligned(true)
        .plan_windows(day(1), day(HORIZON))
        .unwrap();
    assert_eq!(windows[0].committed_end, day(9));
    assert_eq!(windows[1].start, day(10));
    assert_eq!(windows.last().unwrap().end, day(HORIZON));
}

#[tokio::test]
async fn test_unaligned_nine_day_commitment_covers_spike_horizon() {
    // 14 天窗口、5 天重叠: 每窗提交 9 天,与周期错位
    let ctx = four_week_context(base_demand);
    let config = RollingConfig::new(14, 5).with_unaligned(true);
    let expected = config.plan_windows(day(1), day(HORIZON)).unwrap();

    let plan = planner(config).execute(&ctx, day(1), day(HORIZON)).await.unwrap();

    assert_eq!(plan.windows.len(), expected.len());
    assert!(plan.windows.iter().all(|w| w.state == WindowState::Committed));
    assert!(plan.is_complete());
    assert!(plan.records.total_shortfall() < EPS);
    assert!(plan.windows.iter().all(|w| !w.used_shortfall));

    for n in 1..=HORIZON {
        let consumed: f64 = plan
            .records
            .consumption
            .iter()
            .filter(|c| c.date == day(n))
            .map(|c| c.quantity)
            .sum();
        assert!(
            (consumed - base_demand(n)).abs() < EPS,
            "{} 消耗 {} 与需求 {} 不一致",
            day(n),
            consumed,
            base_demand(n)
        );
    }
    // 第二个窗口（第 10-23 天）已看到第 19 天的尖峰,但只提交到第 18 天
    assert_eq!(expected.len(), 3);
    assert_eq!(expected[1].committed_end, day(18));
    assert_eq!(expected[2].start, day(19));
    assert!(plan.records.production.iter().all(|p| p.date <= day(HORIZON)));
}
