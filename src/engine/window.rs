// ==========================================
// 冷链产销排产系统 - 计划窗口与窗口输入
// ==========================================
// 职责: 窗口日期范围、提交前缀、窗口初始条件、建模选项
// ==========================================

use crate::domain::inventory::{InTransitArrival, InitialInventoryRecord};
use crate::domain::scenario::PlanningContext;
use crate::engine::error::{PlanningError, PlanningResult};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ==========================================
// PlanningWindow
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningWindow {
    pub index: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// 提交前缀最后一天（含）
    pub committed_end: NaiveDate,
}

impl PlanningWindow {
    pub fn new(index: usize, start: NaiveDate, end: NaiveDate, committed_end: NaiveDate) -> PlanningResult<Self> {
        if end < start || committed_end < start || committed_end > end {
            return Err(PlanningError::InvalidHorizon { start, end });
        }
        Ok(Self {
            index,
            start,
            end,
            committed_end,
        })
    }

    /// 单窗口（全部提交）
    pub fn single(start: NaiveDate, end: NaiveDate) -> PlanningResult<Self> {
        Self::new(0, start, end, end)
    }

    /// 窗口天数
    pub fn days(&self) -> u32 {
        ((self.end - self.start).num_days() + 1) as u32
    }

    pub fn committed_days(&self) -> u32 {
        ((self.committed_end - self.start).num_days() + 1) as u32
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.days() as i64).map(move |i| start + Duration::days(i))
    }

    /// 下一个窗口首日
    pub fn next_start(&self) -> NaiveDate {
        self.committed_end + Duration::days(1)
    }
}

// ==========================================
// ModelOptions - 建模选项（同时参与结构签名）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelOptions {
    /// 允许缺货（软需求）
    #[serde(default)]
    pub allow_shortfall: bool,
    /// 启用车辆装载时序约束
    #[serde(default = "default_true")]
    pub enforce_truck_timing: bool,
    /// 允许同时具备两种存储能力的节点做节点内冷冻/解冻
    #[serde(default = "default_true")]
    pub allow_in_node_transitions: bool,
    /// 启用节点库存上限
    #[serde(default = "default_true")]
    pub enforce_storage_capacity: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            allow_shortfall: false,
            enforce_truck_timing: true,
            allow_in_node_transitions: true,
            enforce_storage_capacity: true,
        }
    }
}

impl ModelOptions {
    pub fn with_shortfall(mut self, allow: bool) -> Self {
        self.allow_shortfall = allow;
        self
    }
}

// ==========================================
// WindowInputs - 窗口初始条件
// ==========================================
#[derive(Debug, Clone)]
pub struct WindowInputs {
    pub window: PlanningWindow,
    /// 窗口首日期初库存（年龄相对窗口首日）
    pub initial_inventory: Vec<InitialInventoryRecord>,
    /// 在本窗口及以后到达的在途货物
    pub in_transit: Vec<InTransitArrival>,
    /// 窗口前一日处于生产状态的 (节点, 产品)
    pub produced_before_start: BTreeSet<(String, String)>,
}

impl WindowInputs {
    /// 首个窗口: 使用场景自带的期初库存与在途
    pub fn from_context(ctx: &PlanningContext, window: PlanningWindow) -> Self {
        Self {
            window,
            initial_inventory: ctx.initial_inventory().to_vec(),
            in_transit: ctx.in_transit().to_vec(),
            produced_before_start: BTreeSet::new(),
        }
    }

    pub fn was_producing(&self, node: &str, product: &str) -> bool {
        self.produced_before_start
            .contains(&(node.to_string(), product.to_string()))
    }

    /// 指定节点/产品的期初库存合计
    pub fn initial_stock(&self, node: &str, product: &str) -> f64 {
        self.initial_inventory
            .iter()
            .filter(|r| r.node == node && r.product == product)
            .map(|r| r.quantity)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    #[test]
    fn test_window_day_counts() {
        let window = PlanningWindow::new(0, d(2), d(15), d(8)).unwrap();
        assert_eq!(window.days(), 14);
        assert_eq!(window.committed_days(), 7);
        assert_eq!(window.next_start(), d(9));
        assert_eq!(window.dates().count(), 14);
        assert!(window.contains(d(15)) && !window.contains(d(16)));
    }

    #[test]
    fn test_window_rejects_bad_ranges() {
        assert!(PlanningWindow::new(0, d(5), d(4), d(4)).is_err());
        assert!(PlanningWindow::new(0, d(1), d(4), d(5)).is_err());
    }
}
