// ==========================================
// 冷链产销排产系统 - 车辆班次
// ==========================================
// 职责: 班次适用日判断、班次与运输线路的对应
// ==========================================

use crate::domain::types::DepartureSlot;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruckSchedule {
    pub id: String,
    pub origin: String,
    pub destination: String,
    /// None 表示每日发车
    #[serde(default)]
    pub day_of_week: Option<Weekday>,
    pub slot: DepartureSlot,
    pub capacity: f64,
    /// 每次发车固定成本
    #[serde(default)]
    pub fixed_cost: f64,
}

impl TruckSchedule {
    pub fn daily(id: &str, origin: &str, destination: &str, slot: DepartureSlot, capacity: f64) -> Self {
        Self {
            id: id.to_string(),
            origin: origin.to_string(),
            destination: destination.to_string(),
            day_of_week: None,
            slot,
            capacity,
            fixed_cost: 0.0,
        }
    }

    pub fn weekly(
        id: &str,
        origin: &str,
        destination: &str,
        weekday: Weekday,
        slot: DepartureSlot,
        capacity: f64,
    ) -> Self {
        Self {
            day_of_week: Some(weekday),
            ..Self::daily(id, origin, destination, slot, capacity)
        }
    }

    pub fn with_fixed_cost(mut self, fixed_cost: f64) -> Self {
        self.fixed_cost = fixed_cost;
        self
    }

    /// 指定日期是否发车
    pub fn runs_on(&self, date: NaiveDate) -> bool {
        match self.day_of_week {
            None => true,
            Some(weekday) => date.weekday() == weekday,
        }
    }

    /// 线路键 (origin, destination)
    pub fn lane(&self) -> (&str, &str) {
        (&self.origin, &self.destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_on_weekday_and_daily() {
        // 2025-06-02 是周一
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let tuesday = monday.succ_opt().unwrap();

        let weekly = TruckSchedule::weekly("T1", "M", "D", Weekday::Mon, DepartureSlot::Morning, 100.0);
        assert!(weekly.runs_on(monday));
        assert!(!weekly.runs_on(tuesday));

        let daily = TruckSchedule::daily("T2", "M", "D", DepartureSlot::Afternoon, 100.0);
        assert!(daily.runs_on(monday) && daily.runs_on(tuesday));
    }
}
