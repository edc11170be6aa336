// ==========================================
// 冷链产销排产系统 - 人工日历
// ==========================================
// 红线: 非固定日（周末/节假日）只要开工就至少支付最低工时
// ==========================================

use crate::domain::error::{ModelError, ModelResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 固定日默认最大加班时长（小时）
pub const DEFAULT_MAX_OVERTIME_HOURS: f64 = 2.0;
/// 非固定日默认最大工时（小时）
pub const DEFAULT_NON_FIXED_MAX_HOURS: f64 = 14.0;
/// 非固定日最低支付工时（小时）
pub const DEFAULT_MINIMUM_PAID_HOURS: f64 = 4.0;

// ==========================================
// LaborDay - 单日人工参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaborDay {
    pub date: NaiveDate,
    /// 固定日的正常工时额度
    #[serde(default)]
    pub fixed_hours: f64,
    #[serde(default)]
    pub regular_rate: f64,
    #[serde(default)]
    pub overtime_rate: f64,
    /// 非固定日费率（缺省取加班费率）
    #[serde(default)]
    pub non_fixed_rate: Option<f64>,
    pub is_fixed_day: bool,
    /// 当日可用总工时（缺省: 固定日=额度+2h,非固定日=14h）
    #[serde(default)]
    pub max_hours: Option<f64>,
    #[serde(default = "default_minimum_paid_hours")]
    pub minimum_paid_hours: f64,
}

fn default_minimum_paid_hours() -> f64 {
    DEFAULT_MINIMUM_PAID_HOURS
}

impl LaborDay {
    /// 固定日
    pub fn fixed(date: NaiveDate, fixed_hours: f64, regular_rate: f64, overtime_rate: f64) -> Self {
        Self {
            date,
            fixed_hours,
            regular_rate,
            overtime_rate,
            non_fixed_rate: None,
            is_fixed_day: true,
            max_hours: None,
            minimum_paid_hours: DEFAULT_MINIMUM_PAID_HOURS,
        }
    }

    /// 非固定日（周末/节假日）
    pub fn non_fixed(date: NaiveDate, rate: f64) -> Self {
        Self {
            date,
            fixed_hours: 0.0,
            regular_rate: 0.0,
            overtime_rate: rate,
            non_fixed_rate: Some(rate),
            is_fixed_day: false,
            max_hours: None,
            minimum_paid_hours: DEFAULT_MINIMUM_PAID_HOURS,
        }
    }

    pub fn with_max_hours(mut self, max_hours: f64) -> Self {
        self.max_hours = Some(max_hours);
        self
    }

    /// 当日可用总工时
    pub fn available_hours(&self) -> f64 {
        match self.max_hours {
            Some(h) => h,
            None if self.is_fixed_day => self.fixed_hours + DEFAULT_MAX_OVERTIME_HOURS,
            None => DEFAULT_NON_FIXED_MAX_HOURS,
        }
    }

    /// 固定日可加班工时上限
    pub fn overtime_capacity(&self) -> f64 {
        if self.is_fixed_day {
            (self.available_hours() - self.fixed_hours).max(0.0)
        } else {
            0.0
        }
    }

    /// 非固定日费率
    pub fn effective_non_fixed_rate(&self) -> f64 {
        self.non_fixed_rate.unwrap_or(self.overtime_rate)
    }

    /// 按实际工时计算人工成本（用于计划复核）
    pub fn cost_for_hours(&self, hours_used: f64, producing: bool) -> f64 {
        if self.is_fixed_day {
            let within = hours_used.min(self.fixed_hours).max(0.0);
            let beyond = (hours_used - self.fixed_hours).max(0.0);
            within * self.regular_rate + beyond * self.overtime_rate
        } else {
            let floor = if producing { self.minimum_paid_hours } else { 0.0 };
            hours_used.max(floor) * self.effective_non_fixed_rate()
        }
    }

    fn validate(&self) -> ModelResult<()> {
        let values = [
            ("fixed_hours", self.fixed_hours),
            ("regular_rate", self.regular_rate),
            ("overtime_rate", self.overtime_rate),
            ("minimum_paid_hours", self.minimum_paid_hours),
            ("max_hours", self.available_hours()),
        ];
        for (field, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::InvalidQuantity {
                    context: format!("人工日历 {} 字段 {}", self.date, field),
                    value,
                });
            }
        }
        Ok(())
    }
}

// ==========================================
// LaborCalendar - 人工日历
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct LaborCalendar {
    days: BTreeMap<NaiveDate, LaborDay>,
}

impl LaborCalendar {
    pub fn new(days: Vec<LaborDay>) -> ModelResult<Self> {
        let mut map = BTreeMap::new();
        for day in days {
            day.validate()?;
            let date = day.date;
            if map.insert(date, day).is_some() {
                return Err(ModelError::DuplicateId {
                    kind: "人工日历日期",
                    id: date.to_string(),
                });
            }
        }
        Ok(Self { days: map })
    }

    pub fn get(&self, date: NaiveDate) -> Option<&LaborDay> {
        self.days.get(&date)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    #[test]
    fn test_available_hours_defaults() {
        let fixed = LaborDay::fixed(d(2), 12.0, 20.0, 30.0);
        assert_eq!(fixed.available_hours(), 14.0);
        assert_eq!(fixed.overtime_capacity(), 2.0);

        let weekend = LaborDay::non_fixed(d(7), 40.0);
        assert_eq!(weekend.available_hours(), 14.0);
        assert_eq!(weekend.overtime_capacity(), 0.0);

        let capped = LaborDay::fixed(d(3), 12.0, 20.0, 30.0).with_max_hours(12.0);
        assert_eq!(capped.overtime_capacity(), 0.0);
    }

    #[test]
    fn test_cost_for_hours_piecewise() {
        let fixed = LaborDay::fixed(d(2), 12.0, 20.0, 30.0);
        assert_eq!(fixed.cost_for_hours(10.0, true), 200.0);
        assert_eq!(fixed.cost_for_hours(13.0, true), 12.0 * 20.0 + 30.0);

        let weekend = LaborDay::non_fixed(d(7), 40.0);
        // 最低支付 4 小时
        assert_eq!(weekend.cost_for_hours(1.5, true), 160.0);
        assert_eq!(weekend.cost_for_hours(6.0, true), 240.0);
        assert_eq!(weekend.cost_for_hours(0.0, false), 0.0);
    }

    #[test]
    fn test_calendar_rejects_duplicate_dates() {
        let days = vec![LaborDay::fixed(d(2), 12.0, 20.0, 30.0), LaborDay::non_fixed(d(2), 40.0)];
        assert!(matches!(
            LaborCalendar::new(days).unwrap_err(),
            ModelError::DuplicateId { .. }
        ));
    }
}
