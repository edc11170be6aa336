// ==========================================
// 冷链产销排产系统 - 决策变量语义键
// ==========================================
// 职责: 以完整语义索引（节点/产品/日期/状态等）标识每个决策变量
// 用途: 解提取、热启动平移、窗口间对齐
// ==========================================

use crate::domain::types::StorageState;
use crate::engine::solution::CostCategory;
use chrono::{Duration, NaiveDate};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VarKey {
    /// 批次库存 (节点, 产品, 生产日期, 当前日期, 状态)
    Inventory {
        node: String,
        product: String,
        production_date: NaiveDate,
        date: NaiveDate,
        state: StorageState,
    },
    /// 生产量
    Production { node: String, product: String, date: NaiveDate },
    /// 是否生产（二元）
    Produced { node: String, product: String, date: NaiveDate },
    /// 产品启动（二元, 0→1 跳变）
    ProductStart { node: String, product: String, date: NaiveDate },
    /// 当日启动次数（辅助变量）
    StartCount { node: String, date: NaiveDate },
    /// 当日是否开工（辅助变量）
    AnyProduction { node: String, date: NaiveDate },
    /// 当日换产次数 = max(启动次数 - 1, 0)
    ChangeoverCount { node: String, date: NaiveDate },
    /// 当日使用工时
    LaborHours { node: String, date: NaiveDate },
    /// 固定日额度内工时
    FixedHours { node: String, date: NaiveDate },
    /// 固定日加班工时
    OvertimeHours { node: String, date: NaiveDate },
    /// 加班门控（二元）
    OvertimeFlag { node: String, date: NaiveDate },
    /// 非固定日支付工时
    PaidHours { node: String, date: NaiveDate },
    /// 批次级发运 (路线, 产品, 生产日期, 发车日)
    Shipment {
        route: String,
        product: String,
        production_date: NaiveDate,
        departure: NaiveDate,
    },
    /// 节点内状态转换 (冷冻/解冻),转换后生产日期 = 转换日
    Transition {
        node: String,
        product: String,
        production_date: NaiveDate,
        date: NaiveDate,
        from: StorageState,
    },
    /// 需求消耗（按批次）
    Consumption {
        node: String,
        product: String,
        production_date: NaiveDate,
        date: NaiveDate,
        state: StorageState,
    },
    /// 缺货
    Shortfall { node: String, product: String, date: NaiveDate },
    /// 车辆装载量
    TruckLoad { truck: String, product: String, date: NaiveDate },
    /// 车辆是否发车（二元）
    TruckUsed { truck: String, date: NaiveDate },
}

impl VarKey {
    /// 全部日期分量
    pub fn dates(&self) -> Vec<NaiveDate> {
        match self {
            VarKey::Inventory {
                production_date, date, ..
            }
            | VarKey::Transition {
                production_date, date, ..
            }
            | VarKey::Consumption {
                production_date, date, ..
            } => vec![*production_date, *date],
            VarKey::Shipment {
                production_date,
                departure,
                ..
            } => vec![*production_date, *departure],
            _ => vec![self.primary_date()],
        }
    }

    /// 决策发生日期（成本归属日）
    pub fn primary_date(&self) -> NaiveDate {
        match self {
            VarKey::Inventory { date, .. }
            | VarKey::Production { date, .. }
            | VarKey::Produced { date, .. }
            | VarKey::ProductStart { date, .. }
            | VarKey::StartCount { date, .. }
            | VarKey::AnyProduction { date, .. }
            | VarKey::ChangeoverCount { date, .. }
            | VarKey::LaborHours { date, .. }
            | VarKey::FixedHours { date, .. }
            | VarKey::OvertimeHours { date, .. }
            | VarKey::OvertimeFlag { date, .. }
            | VarKey::PaidHours { date, .. }
            | VarKey::Transition { date, .. }
            | VarKey::Consumption { date, .. }
            | VarKey::Shortfall { date, .. }
            | VarKey::TruckLoad { date, .. }
            | VarKey::TruckUsed { date, .. } => *date,
            VarKey::Shipment { departure, .. } => *departure,
        }
    }

    /// 所有日期分量平移 days 天
    pub fn shifted(&self, days: i64) -> VarKey {
        let delta = Duration::days(days);
        let mut key = self.clone();
        match &mut key {
            VarKey::Inventory {
                production_date, date, ..
            }
            | VarKey::Transition {
                production_date, date, ..
            }
            | VarKey::Consumption {
                production_date, date, ..
            } => {
                *production_date += delta;
                *date += delta;
            }
            VarKey::Shipment {
                production_date,
                departure,
                ..
            } => {
                *production_date += delta;
                *departure += delta;
            }
            VarKey::Production { date, .. }
            | VarKey::Produced { date, .. }
            | VarKey::ProductStart { date, .. }
            | VarKey::StartCount { date, .. }
            | VarKey::AnyProduction { date, .. }
            | VarKey::ChangeoverCount { date, .. }
            | VarKey::LaborHours { date, .. }
            | VarKey::FixedHours { date, .. }
            | VarKey::OvertimeHours { date, .. }
            | VarKey::OvertimeFlag { date, .. }
            | VarKey::PaidHours { date, .. }
            | VarKey::Shortfall { date, .. }
            | VarKey::TruckLoad { date, .. }
            | VarKey::TruckUsed { date, .. } => {
                *date += delta;
            }
        }
        key
    }

    /// 目标函数成本类别（无成本的辅助变量为 None）
    pub fn cost_category(&self) -> Option<CostCategory> {
        match self {
            VarKey::Inventory { .. } => Some(CostCategory::Holding),
            VarKey::Production { .. } => Some(CostCategory::Production),
            VarKey::ProductStart { .. } => Some(CostCategory::Changeover),
            VarKey::FixedHours { .. } | VarKey::OvertimeHours { .. } | VarKey::PaidHours { .. } => {
                Some(CostCategory::Labor)
            }
            VarKey::Shipment { .. } => Some(CostCategory::Transport),
            VarKey::Transition { .. } => Some(CostCategory::Transition),
            VarKey::Shortfall { .. } => Some(CostCategory::Shortfall),
            VarKey::TruckUsed { .. } => Some(CostCategory::Truck),
            _ => None,
        }
    }

    /// 变量名（后端/日志使用）
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarKey::Inventory {
                node,
                product,
                production_date,
                date,
                state,
            } => write!(f, "inv[{},{},{},{},{}]", node, product, production_date, date, state.code()),
            VarKey::Production { node, product, date } => write!(f, "prod[{},{},{}]", node, product, date),
            VarKey::Produced { node, product, date } => write!(f, "on[{},{},{}]", node, product, date),
            VarKey::ProductStart { node, product, date } => write!(f, "start[{},{},{}]", node, product, date),
            VarKey::StartCount { node, date } => write!(f, "nstart[{},{}]", node, date),
            VarKey::AnyProduction { node, date } => write!(f, "any[{},{}]", node, date),
            VarKey::ChangeoverCount { node, date } => write!(f, "nchg[{},{}]", node, date),
            VarKey::LaborHours { node, date } => write!(f, "hours[{},{}]", node, date),
            VarKey::FixedHours { node, date } => write!(f, "fixed[{},{}]", node, date),
            VarKey::OvertimeHours { node, date } => write!(f, "ot[{},{}]", node, date),
            VarKey::OvertimeFlag { node, date } => write!(f, "otflag[{},{}]", node, date),
            VarKey::PaidHours { node, date } => write!(f, "paid[{},{}]", node, date),
            VarKey::Shipment {
                route,
                product,
                production_date,
                departure,
            } => write!(f, "ship[{},{},{},{}]", route, product, production_date, departure),
            VarKey::Transition {
                node,
                product,
                production_date,
                date,
                from,
            } => write!(f, "trans[{},{},{},{},{}]", node, product, production_date, date, from.code()),
            VarKey::Consumption {
                node,
                product,
                production_date,
                date,
                state,
            } => write!(f, "cons[{},{},{},{},{}]", node, product, production_date, date, state.code()),
            VarKey::Shortfall { node, product, date } => write!(f, "short[{},{},{}]", node, product, date),
            VarKey::TruckLoad { truck, product, date } => write!(f, "load[{},{},{}]", truck, product, date),
            VarKey::TruckUsed { truck, date } => write!(f, "truck[{},{}]", truck, date),
        }
    }
}
