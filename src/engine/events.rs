// ==========================================
// 冷链产销排产系统 - 引擎层事件发布
// ==========================================
// 职责: 定义窗口生命周期事件与发布 trait
// 说明: Engine 层定义 trait,报表/界面等下游实现适配器
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 计划事件类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanningEventType {
    /// 窗口开始求解
    WindowStarted,
    /// 窗口前缀已提交
    WindowCommitted,
    /// 窗口失败（滚动终止）
    WindowFailed,
    /// 热启动重合率偏低
    WarmstartDegraded,
    /// 整个计划完成
    PlanCompleted,
}

impl PlanningEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            PlanningEventType::WindowStarted => "WindowStarted",
            PlanningEventType::WindowCommitted => "WindowCommitted",
            PlanningEventType::WindowFailed => "WindowFailed",
            PlanningEventType::WarmstartDegraded => "WarmstartDegraded",
            PlanningEventType::PlanCompleted => "PlanCompleted",
        }
    }
}

/// 计划事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningEvent {
    /// 计划运行 ID
    pub run_id: String,
    pub event_type: PlanningEventType,
    /// 窗口序号（计划级事件为 None）
    pub window_index: Option<usize>,
    /// 影响的日期范围
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// 附加说明
    pub detail: Option<String>,
}

impl PlanningEvent {
    /// 窗口级事件
    pub fn for_window(
        run_id: &str,
        event_type: PlanningEventType,
        window_index: usize,
        date_range: (NaiveDate, NaiveDate),
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            event_type,
            window_index: Some(window_index),
            date_range: Some(date_range),
            detail: None,
        }
    }

    /// 计划级事件
    pub fn for_plan(run_id: &str, event_type: PlanningEventType, date_range: (NaiveDate, NaiveDate)) -> Self {
        Self {
            run_id: run_id.to_string(),
            event_type,
            window_index: None,
            date_range: Some(date_range),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 计划事件发布者 Trait
///
/// # 返回
/// - `Err`: 发布失败（引擎只记录告警,不中断计划）
pub trait PlanningEventPublisher: Send + Sync {
    fn publish(&self, event: PlanningEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl PlanningEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: PlanningEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - run_id={}, event_type={}",
            event.run_id,
            event.event_type.as_str()
        );
        Ok(())
    }
}

/// 可选的事件发布者包装
#[derive(Clone)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn PlanningEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn PlanningEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（失败只告警）
    pub fn publish(&self, event: PlanningEvent) {
        match &self.inner {
            Some(publisher) => {
                let event_type = event.event_type;
                if let Err(e) = publisher.publish(event) {
                    tracing::warn!(event_type = event_type.as_str(), error = %e, "计划事件发布失败");
                }
            }
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者,跳过事件 - run_id={}, event_type={}",
                    event.run_id,
                    event.event_type.as_str()
                );
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FailingPublisher(Mutex<usize>);

    impl PlanningEventPublisher for FailingPublisher {
        fn publish(&self, _event: PlanningEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            *self.0.lock().unwrap() += 1;
            Err("queue closed".into())
        }
    }

    fn range() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
        )
    }

    #[test]
    fn test_window_event_fields() {
        let event = PlanningEvent::for_window("RUN1", PlanningEventType::WindowCommitted, 3, range())
            .with_detail("committed 7 days");
        assert_eq!(event.window_index, Some(3));
        assert_eq!(event.detail.as_deref(), Some("committed 7 days"));
    }

    #[test]
    fn test_noop_publisher() {
        let event = PlanningEvent::for_plan("RUN1", PlanningEventType::PlanCompleted, range());
        assert!(NoOpEventPublisher.publish(event).is_ok());
    }

    #[test]
    fn test_optional_publisher_swallows_failures() {
        let failing = Arc::new(FailingPublisher(Mutex::new(0)));
        let publisher = OptionalEventPublisher::with_publisher(failing.clone());
        assert!(publisher.is_configured());

        publisher.publish(PlanningEvent::for_plan("RUN1", PlanningEventType::PlanCompleted, range()));
        assert_eq!(*failing.0.lock().unwrap(), 1);

        assert!(!OptionalEventPublisher::none().is_configured());
    }
}
