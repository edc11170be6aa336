// ==========================================
// 冷链产销排产系统 - 窗口解审计
// ==========================================
// 职责: 对求解器返回的解做独立复核（不依赖模型约束）
// 检查项: 非负、保质期、节点级物料平衡（含报废）、车辆装载时序、需求满足
// 说明: 审计失败只记录违规,不修改解
// ==========================================

use crate::domain::scenario::PlanningContext;
use crate::domain::types::DepartureSlot;
use crate::engine::solution::{TruckLoadRecord, WindowSolution};
use crate::engine::window::{ModelOptions, WindowInputs};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 默认审计容差（按量级放大）
pub const DEFAULT_AUDIT_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCheck {
    NonNegative,
    ShelfLife,
    MassBalance,
    TruckTiming,
    DemandSatisfaction,
}

impl fmt::Display for AuditCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditCheck::NonNegative => "NON_NEGATIVE",
            AuditCheck::ShelfLife => "SHELF_LIFE",
            AuditCheck::MassBalance => "MASS_BALANCE",
            AuditCheck::TruckTiming => "TRUCK_TIMING",
            AuditCheck::DemandSatisfaction => "DEMAND_SATISFACTION",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditViolation {
    pub check: AuditCheck,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditReport {
    pub violations: Vec<AuditViolation>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn count(&self, check: AuditCheck) -> usize {
        self.violations.iter().filter(|v| v.check == check).count()
    }

    fn push(&mut self, check: AuditCheck, detail: String) {
        self.violations.push(AuditViolation { check, detail });
    }
}

// ==========================================
// PlanAuditor
// ==========================================
pub struct PlanAuditor<'a> {
    ctx: &'a PlanningContext,
    options: &'a ModelOptions,
    tolerance: f64,
}

impl<'a> PlanAuditor<'a> {
    pub fn new(ctx: &'a PlanningContext, options: &'a ModelOptions) -> Self {
        Self {
            ctx,
            options,
            tolerance: DEFAULT_AUDIT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn close(&self, lhs: f64, rhs: f64) -> bool {
        (lhs - rhs).abs() <= self.tolerance * lhs.abs().max(rhs.abs()).max(1.0)
    }

    pub fn audit(&self, inputs: &WindowInputs, solution: &WindowSolution) -> AuditReport {
        let mut report = AuditReport::default();
        self.check_non_negative(solution, &mut report);
        self.check_shelf_life(solution, &mut report);
        self.check_mass_balance(inputs, solution, &mut report);
        if self.options.enforce_truck_timing {
            self.check_truck_timing(inputs, solution, &mut report);
        }
        self.check_demand(solution, &mut report);
        report
    }

    fn check_non_negative(&self, solution: &WindowSolution, report: &mut AuditReport) {
        for (key, value) in &solution.assignment {
            if *value < -self.tolerance {
                report.push(AuditCheck::NonNegative, format!("{} = {:.6}", key, value));
            }
        }
    }

    fn check_shelf_life(&self, solution: &WindowSolution, report: &mut AuditReport) {
        for record in &solution.records.inventory {
            let Some(product) = self.ctx.product(&record.product) else {
                continue;
            };
            if !product.is_valid_age(record.state, record.age_days()) {
                report.push(
                    AuditCheck::ShelfLife,
                    format!(
                        "{}@{} 批次 {} 在 {} 年龄 {} 天超出保质期 {} 天",
                        record.product,
                        record.node,
                        record.production_date,
                        record.date,
                        record.age_days(),
                        product.shelf_life(record.state)
                    ),
                );
            }
        }
    }

    /// Σ库存[t] = Σ库存[t-1] - 报废[t-1] + 生产 + 到货 - 发出 - 消耗 (+ 期初/在途)
    fn check_mass_balance(&self, inputs: &WindowInputs, solution: &WindowSolution, report: &mut AuditReport) {
        let window = solution.window;
        let records = &solution.records;
        type Key = (String, String, NaiveDate);
        let mut stock: BTreeMap<Key, f64> = BTreeMap::new();
        let mut net: BTreeMap<Key, f64> = BTreeMap::new();
        let mut expired: BTreeMap<Key, f64> = BTreeMap::new();
        let key = |node: &str, product: &str, date: NaiveDate| (node.to_string(), product.to_string(), date);

        for r in &records.inventory {
            *stock.entry(key(&r.node, &r.product, r.date)).or_default() += r.quantity;
        }
        for r in &records.expired {
            *expired.entry(key(&r.node, &r.product, r.date)).or_default() += r.quantity;
        }
        for r in &records.production {
            *net.entry(key(&r.node, &r.product, r.date)).or_default() += r.quantity;
        }
        for r in &records.shipments {
            *net.entry(key(&r.origin, &r.product, r.departure)).or_default() -= r.quantity;
            *net.entry(key(&r.destination, &r.product, r.arrival)).or_default() += r.quantity;
        }
        for r in &records.consumption {
            *net.entry(key(&r.node, &r.product, r.date)).or_default() -= r.quantity;
        }
        for r in &inputs.initial_inventory {
            let valid = self
                .ctx
                .product(&r.product)
                .is_some_and(|p| p.is_valid_age(r.state, r.age_days as i64));
            if valid {
                *net.entry(key(&r.node, &r.product, window.start)).or_default() += r.quantity;
            }
        }
        for r in &inputs.in_transit {
            if !window.contains(r.arrival_date) {
                continue;
            }
            let age = (r.arrival_date - r.production_date).num_days();
            let valid = self
                .ctx
                .product(&r.product)
                .is_some_and(|p| p.is_valid_age(r.state, age));
            if valid {
                *net.entry(key(&r.destination, &r.product, r.arrival_date)).or_default() += r.quantity;
            }
        }

        let mut pairs: Vec<(String, String)> = stock
            .keys()
            .chain(net.keys())
            .map(|(n, p, _)| (n.clone(), p.clone()))
            .collect();
        pairs.sort();
        pairs.dedup();

        for (node, product) in pairs {
            let mut previous = 0.0;
            for date in window.dates() {
                let yesterday = date - Duration::days(1);
                let carried = previous
                    - expired
                        .get(&key(&node, &product, yesterday))
                        .copied()
                        .unwrap_or(0.0);
                let expected = carried + net.get(&key(&node, &product, date)).copied().unwrap_or(0.0);
                let actual = stock.get(&key(&node, &product, date)).copied().unwrap_or(0.0);
                if !self.close(actual, expected) {
                    report.push(
                        AuditCheck::MassBalance,
                        format!(
                            "{}@{} {}: 库存 {:.3} ≠ 期望 {:.3}",
                            product, node, date, actual, expected
                        ),
                    );
                }
                previous = actual;
            }
        }
    }

    /// 按 (产地, 产品) 累计: 截至每个班次的装载 ≤ 期初库存 + 可装生产
    /// （上午车: 前一日及以前; 下午车: 含当日; 同日上午先于下午）
    fn check_truck_timing(&self, inputs: &WindowInputs, solution: &WindowSolution, report: &mut AuditReport) {
        let network = self.ctx.network();
        let records = &solution.records;
        let mut groups: BTreeMap<(&str, &str), Vec<&TruckLoadRecord>> = BTreeMap::new();
        for load in &records.truck_loads {
            let manufactures = network
                .node(&load.origin)
                .is_some_and(|n| n.manufacturing.is_some());
            if manufactures {
                groups
                    .entry((load.origin.as_str(), load.product.as_str()))
                    .or_default()
                    .push(load);
            }
        }

        for ((origin, product), loads) in groups {
            let initial = inputs.initial_stock(origin, product);
            let mut checkpoints: Vec<(NaiveDate, DepartureSlot)> = loads.iter().map(|l| (l.date, l.slot)).collect();
            checkpoints.sort();
            checkpoints.dedup();

            for (date, slot) in checkpoints {
                let loaded: f64 = loads
                    .iter()
                    .filter(|l| l.date < date || (l.date == date && (slot == DepartureSlot::Afternoon || l.slot == DepartureSlot::Morning)))
                    .map(|l| l.quantity)
                    .sum();
                let produced: f64 = records
                    .production
                    .iter()
                    .filter(|p| p.node == origin && p.product == product)
                    .filter(|p| p.date < date || (p.date == date && slot.loads_same_day_production()))
                    .map(|p| p.quantity)
                    .sum();
                let available = produced + initial;
                if loaded > available + self.tolerance * available.max(1.0) {
                    report.push(
                        AuditCheck::TruckTiming,
                        format!(
                            "{} {} {} {} 累计装载 {:.3} 超过可装量 {:.3}",
                            origin, product, date, slot, loaded, available
                        ),
                    );
                }
            }
        }
    }

    fn check_demand(&self, solution: &WindowSolution, report: &mut AuditReport) {
        let window = solution.window;
        let records = &solution.records;
        for (node, product, date, demand) in self.ctx.demand_between(window.start, window.end) {
            let consumed: f64 = records
                .consumption
                .iter()
                .filter(|r| r.node == node && r.product == product && r.date == date)
                .map(|r| r.quantity)
                .sum();
            let short: f64 = records
                .shortfalls
                .iter()
                .filter(|r| r.node == node && r.product == product && r.date == date)
                .map(|r| r.quantity)
                .sum();
            if !self.close(consumed + short, demand) {
                report.push(
                    AuditCheck::DemandSatisfaction,
                    format!(
                        "{}@{} {}: 消耗 {:.3} + 缺货 {:.3} ≠ 需求 {:.3}",
                        product, node, date, consumed, short, demand
                    ),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::TransportMode;
    use crate::domain::{
        LaborDay, ManufacturingSpec, Node, NodeCapabilities, PlanningData, Product, Route, TruckSchedule,
    };
    use crate::engine::builder::ModelSignature;
    use crate::engine::solution::{PlanRecords, ProductionRecord};
    use crate::engine::window::PlanningWindow;
    use crate::solver::SolverStatus;
    use chrono::Weekday;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap() + Duration::days(n - 1)
    }

    fn caps(can_manufacture: bool) -> NodeCapabilities {
        NodeCapabilities {
            can_manufacture,
            can_store_frozen: false,
            can_store_ambient: true,
            has_demand: !can_manufacture,
        }
    }

    /// 周四下午车 + 周一上午车
    fn context() -> PlanningContext {
        let data = PlanningData {
            nodes: vec![
                Node::new("M1", caps(true)).with_manufacturing(ManufacturingSpec::with_rate(1400.0)),
                Node::new("H1", caps(false)),
            ],
            routes: vec![Route::new("R1", "M1", "H1", 1, TransportMode::Ambient)],
            products: vec![Product::new("P1")],
            labor: (1..=8).map(|n| LaborDay::fixed(day(n), 12.0, 20.0, 30.0)).collect(),
            trucks: vec![
                TruckSchedule::weekly("T1", "M1", "H1", Weekday::Mon, DepartureSlot::Morning, 40000.0),
                TruckSchedule::weekly("T2", "M1", "H1", Weekday::Thu, DepartureSlot::Afternoon, 40000.0),
            ],
            ..Default::default()
        };
        PlanningContext::new(data).unwrap()
    }

    fn production(date: NaiveDate, quantity: f64) -> ProductionRecord {
        ProductionRecord {
            node: "M1".into(),
            product: "P1".into(),
            date,
            quantity,
        }
    }

    fn load(truck: &str, slot: DepartureSlot, date: NaiveDate, quantity: f64) -> TruckLoadRecord {
        TruckLoadRecord {
            truck: truck.into(),
            origin: "M1".into(),
            destination: "H1".into(),
            slot,
            product: "P1".into(),
            date,
            quantity,
        }
    }

    fn solution(ctx: &PlanningContext, options: &ModelOptions, monday_load: f64) -> WindowSolution {
        let records = PlanRecords {
            production: vec![
                production(day(4), 16800.0),
                production(day(5), 6400.0),
                production(day(8), 16800.0),
            ],
            truck_loads: vec![
                load("T2", DepartureSlot::Afternoon, day(4), 16800.0),
                load("T1", DepartureSlot::Morning, day(8), monday_load),
            ],
            ..Default::default()
        };
        WindowSolution {
            window: PlanningWindow::single(day(1), day(8)).unwrap(),
            status: SolverStatus::Optimal,
            objective: 0.0,
            gap: None,
            signature: ModelSignature::of(ctx, options),
            records,
            assignment: Vec::new(),
        }
    }

    #[test]
    fn test_truck_timing_counts_loads_from_earlier_trucks() {
        let ctx = context();
        let options = ModelOptions::default();
        let inputs = WindowInputs::from_context(&ctx, PlanningWindow::single(day(1), day(8)).unwrap());
        let auditor = PlanAuditor::new(&ctx, &options);

        // 周一上午车只能装截至周日的 23200 - 已由周四车运走的 16800
        let mut report = AuditReport::default();
        auditor.check_truck_timing(&inputs, &solution(&ctx, &options, 23200.0), &mut report);
        assert_eq!(report.count(AuditCheck::TruckTiming), 1);

        let mut report = AuditReport::default();
        auditor.check_truck_timing(&inputs, &solution(&ctx, &options, 6400.0), &mut report);
        assert!(report.is_clean());
    }
}
