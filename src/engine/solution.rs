// ==========================================
// 冷链产销排产系统 - 窗口解与计划记录
// ==========================================
// 职责: 由变量取值提取类型化计划记录、按日成本台账、窗口间结转
// 说明: 提交前缀只保留 date ≤ committed_end 的记录与成本
// ==========================================

use crate::domain::inventory::{InTransitArrival, InitialInventoryRecord};
use crate::domain::network::arrival_outcome;
use crate::domain::scenario::PlanningContext;
use crate::domain::types::{DepartureSlot, StorageState};
use crate::engine::builder::{ModelSignature, WindowModel};
use crate::engine::var_key::VarKey;
use crate::engine::window::{PlanningWindow, WindowInputs};
use crate::solver::SolverStatus;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 取值视为零的阈值
pub const QUANTITY_EPS: f64 = 1e-6;

// ==========================================
// 成本类别与成本分解
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostCategory {
    Production,
    Labor,
    Transport,
    Truck,
    Holding,
    Changeover,
    Transition,
    Shortfall,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub production: f64,
    pub labor: f64,
    pub transport: f64,
    pub truck: f64,
    pub holding: f64,
    pub changeover: f64,
    pub transition: f64,
    pub shortfall: f64,
}

impl CostBreakdown {
    pub fn add(&mut self, category: CostCategory, amount: f64) {
        let slot = match category {
            CostCategory::Production => &mut self.production,
            CostCategory::Labor => &mut self.labor,
            CostCategory::Transport => &mut self.transport,
            CostCategory::Truck => &mut self.truck,
            CostCategory::Holding => &mut self.holding,
            CostCategory::Changeover => &mut self.changeover,
            CostCategory::Transition => &mut self.transition,
            CostCategory::Shortfall => &mut self.shortfall,
        };
        *slot += amount;
    }

    pub fn merge(&mut self, other: &CostBreakdown) {
        self.production += other.production;
        self.labor += other.labor;
        self.transport += other.transport;
        self.truck += other.truck;
        self.holding += other.holding;
        self.changeover += other.changeover;
        self.transition += other.transition;
        self.shortfall += other.shortfall;
    }

    pub fn total(&self) -> f64 {
        self.production
            + self.labor
            + self.transport
            + self.truck
            + self.holding
            + self.changeover
            + self.transition
            + self.shortfall
    }
}

// ==========================================
// 计划记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortInventory {
    pub node: String,
    pub product: String,
    pub production_date: NaiveDate,
    pub date: NaiveDate,
    pub state: StorageState,
    pub quantity: f64,
}

impl CohortInventory {
    pub fn age_days(&self) -> i64 {
        (self.date - self.production_date).num_days()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub node: String,
    pub product: String,
    pub date: NaiveDate,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentRecord {
    pub route: String,
    pub origin: String,
    pub destination: String,
    pub product: String,
    pub production_date: NaiveDate,
    pub departure: NaiveDate,
    pub arrival: NaiveDate,
    /// 运输途中状态
    pub state: StorageState,
    /// 到达后状态与生产日期（可能因状态转换重置）
    pub arrival_state: StorageState,
    pub arrival_production_date: NaiveDate,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruckLoadRecord {
    pub truck: String,
    pub origin: String,
    pub destination: String,
    pub slot: DepartureSlot,
    pub product: String,
    pub date: NaiveDate,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub node: String,
    pub product: String,
    pub production_date: NaiveDate,
    pub date: NaiveDate,
    pub from: StorageState,
    pub to: StorageState,
    pub quantity: f64,
}

/// 需求消耗（按节点/产品/日期汇总,不区分批次）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub node: String,
    pub product: String,
    pub date: NaiveDate,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortfallRecord {
    pub node: String,
    pub product: String,
    pub date: NaiveDate,
    pub quantity: f64,
}

/// 报废: 批次在最后有效日结束时的剩余量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiredRecord {
    pub node: String,
    pub product: String,
    pub production_date: NaiveDate,
    pub state: StorageState,
    /// 最后有效日
    pub date: NaiveDate,
    pub quantity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaborRecord {
    pub node: String,
    pub date: NaiveDate,
    pub hours_used: f64,
    pub fixed_hours: f64,
    pub overtime_hours: f64,
    pub paid_hours: f64,
    pub producing: bool,
    pub starts: u32,
}

// ==========================================
// PlanRecords - 计划记录集合
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanRecords {
    pub inventory: Vec<CohortInventory>,
    pub production: Vec<ProductionRecord>,
    pub shipments: Vec<ShipmentRecord>,
    pub truck_loads: Vec<TruckLoadRecord>,
    pub transitions: Vec<TransitionRecord>,
    pub consumption: Vec<ConsumptionRecord>,
    pub shortfalls: Vec<ShortfallRecord>,
    pub expired: Vec<ExpiredRecord>,
    pub labor: Vec<LaborRecord>,
    /// 按日成本台账
    pub daily_costs: BTreeMap<NaiveDate, CostBreakdown>,
}

impl PlanRecords {
    /// 仅保留 until（含）之前的决策
    pub fn restrict_to(&self, until: NaiveDate) -> PlanRecords {
        PlanRecords {
            inventory: self.inventory.iter().filter(|r| r.date <= until).cloned().collect(),
            production: self.production.iter().filter(|r| r.date <= until).cloned().collect(),
            shipments: self.shipments.iter().filter(|r| r.departure <= until).cloned().collect(),
            truck_loads: self.truck_loads.iter().filter(|r| r.date <= until).cloned().collect(),
            transitions: self.transitions.iter().filter(|r| r.date <= until).cloned().collect(),
            consumption: self.consumption.iter().filter(|r| r.date <= until).cloned().collect(),
            shortfalls: self.shortfalls.iter().filter(|r| r.date <= until).cloned().collect(),
            expired: self.expired.iter().filter(|r| r.date <= until).cloned().collect(),
            labor: self.labor.iter().filter(|r| r.date <= until).cloned().collect(),
            daily_costs: self
                .daily_costs
                .range(..=until)
                .map(|(d, c)| (*d, *c))
                .collect(),
        }
    }

    pub fn append(&mut self, other: PlanRecords) {
        self.inventory.extend(other.inventory);
        self.production.extend(other.production);
        self.shipments.extend(other.shipments);
        self.truck_loads.extend(other.truck_loads);
        self.transitions.extend(other.transitions);
        self.consumption.extend(other.consumption);
        self.shortfalls.extend(other.shortfalls);
        self.expired.extend(other.expired);
        self.labor.extend(other.labor);
        for (date, cost) in other.daily_costs {
            self.daily_costs.entry(date).or_default().merge(&cost);
        }
    }

    pub fn total_cost(&self) -> CostBreakdown {
        let mut total = CostBreakdown::default();
        for cost in self.daily_costs.values() {
            total.merge(cost);
        }
        total
    }

    pub fn total_shortfall(&self) -> f64 {
        self.shortfalls.iter().map(|r| r.quantity).sum()
    }

    pub fn total_production(&self) -> f64 {
        self.production.iter().map(|r| r.quantity).sum()
    }

    /// 指定节点/产品/日期的库存合计（跨批次）
    pub fn inventory_total(&self, node: &str, product: &str, date: NaiveDate) -> f64 {
        self.inventory
            .iter()
            .filter(|r| r.node == node && r.product == product && r.date == date)
            .map(|r| r.quantity)
            .sum()
    }

    /// 指定节点/日期的启动次数合计
    pub fn starts_on(&self, node: &str, date: NaiveDate) -> u32 {
        self.labor
            .iter()
            .filter(|r| r.node == node && r.date == date)
            .map(|r| r.starts)
            .sum()
    }
}

// ==========================================
// WindowSolution - 单窗口解
// ==========================================
#[derive(Debug, Clone)]
pub struct WindowSolution {
    pub window: PlanningWindow,
    pub status: SolverStatus,
    pub objective: f64,
    pub gap: Option<f64>,
    pub signature: ModelSignature,
    pub records: PlanRecords,
    /// 全部变量取值（热启动提取用）
    pub assignment: Vec<(VarKey, f64)>,
}

impl WindowSolution {
    /// 由变量取值提取类型化解
    pub fn from_values(
        ctx: &PlanningContext,
        model: &WindowModel,
        status: SolverStatus,
        objective: f64,
        gap: Option<f64>,
        values: &[f64],
    ) -> Self {
        let window = *model.window();
        let mip = model.model();
        let mut records = PlanRecords::default();
        let mut labor: BTreeMap<(String, NaiveDate), LaborRecord> = BTreeMap::new();
        let mut consumption: BTreeMap<(String, String, NaiveDate), f64> = BTreeMap::new();
        let mut assignment = Vec::with_capacity(values.len());

        for (idx, (key, &value)) in model.keys().iter().zip(values).enumerate() {
            assignment.push((key.clone(), value));

            let cost = mip.vars()[idx].cost * value;
            if cost != 0.0 {
                if let Some(category) = key.cost_category() {
                    records
                        .daily_costs
                        .entry(key.primary_date())
                        .or_default()
                        .add(category, cost);
                }
            }

            let positive = value > QUANTITY_EPS;
            match key {
                VarKey::Inventory {
                    node,
                    product,
                    production_date,
                    date,
                    state,
                } if positive => {
                    records.inventory.push(CohortInventory {
                        node: node.clone(),
                        product: product.clone(),
                        production_date: *production_date,
                        date: *date,
                        state: *state,
                        quantity: value,
                    });
                    let last_valid = ctx
                        .product(product)
                        .map(|p| *production_date + Duration::days(p.shelf_life(*state) as i64));
                    if last_valid == Some(*date) && *date < window.end {
                        records.expired.push(ExpiredRecord {
                            node: node.clone(),
                            product: product.clone(),
                            production_date: *production_date,
                            state: *state,
                            date: *date,
                            quantity: value,
                        });
                    }
                }
                VarKey::Production { node, product, date } if positive => {
                    records.production.push(ProductionRecord {
                        node: node.clone(),
                        product: product.clone(),
                        date: *date,
                        quantity: value,
                    });
                }
                VarKey::Shipment {
                    route,
                    product,
                    production_date,
                    departure,
                } if positive => {
                    if let Some(record) = shipment_record(ctx, route, product, *production_date, *departure, value) {
                        records.shipments.push(record);
                    }
                }
                VarKey::TruckLoad { truck, product, date } if positive => {
                    if let Some(schedule) = ctx.trucks().iter().find(|t| &t.id == truck) {
                        records.truck_loads.push(TruckLoadRecord {
                            truck: truck.clone(),
                            origin: schedule.origin.clone(),
                            destination: schedule.destination.clone(),
                            slot: schedule.slot,
                            product: product.clone(),
                            date: *date,
                            quantity: value,
                        });
                    }
                }
                VarKey::Transition {
                    node,
                    product,
                    production_date,
                    date,
                    from,
                } if positive => {
                    records.transitions.push(TransitionRecord {
                        node: node.clone(),
                        product: product.clone(),
                        production_date: *production_date,
                        date: *date,
                        from: *from,
                        to: from.other(),
                        quantity: value,
                    });
                }
                VarKey::Consumption {
                    node, product, date, ..
                } if positive => {
                    *consumption
                        .entry((node.clone(), product.clone(), *date))
                        .or_insert(0.0) += value;
                }
                VarKey::Shortfall { node, product, date } if positive => {
                    records.shortfalls.push(ShortfallRecord {
                        node: node.clone(),
                        product: product.clone(),
                        date: *date,
                        quantity: value,
                    });
                }
                VarKey::LaborHours { node, date } => {
                    labor_entry(&mut labor, node, *date).hours_used = value;
                }
                VarKey::FixedHours { node, date } => {
                    labor_entry(&mut labor, node, *date).fixed_hours = value;
                }
                VarKey::OvertimeHours { node, date } => {
                    labor_entry(&mut labor, node, *date).overtime_hours = value;
                }
                VarKey::PaidHours { node, date } => {
                    labor_entry(&mut labor, node, *date).paid_hours = value;
                }
                VarKey::AnyProduction { node, date } => {
                    labor_entry(&mut labor, node, *date).producing = value > 0.5;
                }
                VarKey::StartCount { node, date } => {
                    labor_entry(&mut labor, node, *date).starts = value.round().max(0.0) as u32;
                }
                _ => {}
            }
        }

        records.labor = labor.into_values().collect();
        records.consumption = consumption
            .into_iter()
            .map(|((node, product, date), quantity)| ConsumptionRecord {
                node,
                product,
                date,
                quantity,
            })
            .collect();

        Self {
            window,
            status,
            objective,
            gap,
            signature: model.signature(),
            records,
            assignment,
        }
    }

    /// 提交前缀
    pub fn committed(&self) -> PlanRecords {
        self.records.restrict_to(self.window.committed_end)
    }

    /// 提交前缀成本
    pub fn committed_cost(&self) -> CostBreakdown {
        self.committed().total_cost()
    }

    /// 结转为下一窗口初始条件
    ///
    /// - 提交前缀最后一天的期末批次库存（年龄相对下一窗口首日）
    /// - 已发出、在下一窗口首日及以后到达的在途货物
    /// - 提交前缀最后一天的在产标识
    pub fn carry_over(&self, ctx: &PlanningContext, inputs: &WindowInputs, next: PlanningWindow) -> WindowInputs {
        let cutoff = self.window.committed_end;
        let next_start = next.start;

        let mut initial_inventory = Vec::new();
        for record in self.records.inventory.iter().filter(|r| r.date == cutoff) {
            let age = (next_start - record.production_date).num_days();
            let valid = ctx
                .product(&record.product)
                .is_some_and(|p| p.is_valid_age(record.state, age));
            if valid {
                initial_inventory.push(InitialInventoryRecord::new(
                    &record.node,
                    &record.product,
                    age as u32,
                    record.state,
                    record.quantity,
                ));
            }
        }

        let mut in_transit: Vec<InTransitArrival> = inputs
            .in_transit
            .iter()
            .filter(|a| a.arrival_date >= next_start)
            .cloned()
            .collect();
        for shipment in self
            .records
            .shipments
            .iter()
            .filter(|s| s.departure <= cutoff && s.arrival >= next_start)
        {
            in_transit.push(InTransitArrival {
                route: shipment.route.clone(),
                destination: shipment.destination.clone(),
                product: shipment.product.clone(),
                production_date: shipment.arrival_production_date,
                state: shipment.arrival_state,
                arrival_date: shipment.arrival,
                quantity: shipment.quantity,
            });
        }

        let produced_before_start: BTreeSet<(String, String)> = self
            .records
            .production
            .iter()
            .filter(|r| r.date == cutoff)
            .map(|r| (r.node.clone(), r.product.clone()))
            .collect();

        WindowInputs {
            window: next,
            initial_inventory,
            in_transit,
            produced_before_start,
        }
    }
}

fn labor_entry<'m>(
    labor: &'m mut BTreeMap<(String, NaiveDate), LaborRecord>,
    node: &str,
    date: NaiveDate,
) -> &'m mut LaborRecord {
    labor
        .entry((node.to_string(), date))
        .or_insert_with(|| LaborRecord {
            node: node.to_string(),
            date,
            ..Default::default()
        })
}

fn shipment_record(
    ctx: &PlanningContext,
    route_id: &str,
    product: &str,
    production_date: NaiveDate,
    departure: NaiveDate,
    quantity: f64,
) -> Option<ShipmentRecord> {
    let network = ctx.network();
    let route = network.route(route_id)?;
    let destination = network.node(&route.destination)?;
    let outcome = arrival_outcome(route.mode, &destination.capabilities)?;
    let arrival = departure + Duration::days(route.transit_days as i64);
    Some(ShipmentRecord {
        route: route.id.clone(),
        origin: route.origin.clone(),
        destination: route.destination.clone(),
        product: product.to_string(),
        production_date,
        departure,
        arrival,
        state: route.mode.carried_state(),
        arrival_state: outcome.state,
        arrival_production_date: if outcome.resets_age { arrival } else { production_date },
        quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    #[test]
    fn test_cost_breakdown_total_and_merge() {
        let mut a = CostBreakdown::default();
        a.add(CostCategory::Labor, 10.0);
        a.add(CostCategory::Holding, 2.5);
        let mut b = CostBreakdown::default();
        b.add(CostCategory::Labor, 5.0);
        a.merge(&b);
        assert_eq!(a.labor, 15.0);
        assert_eq!(a.total(), 17.5);
    }

    #[test]
    fn test_restrict_to_keeps_committed_prefix() {
        let mut records = PlanRecords::default();
        for day in 1..=4 {
            records.production.push(ProductionRecord {
                node: "M".into(),
                product: "P".into(),
                date: d(day),
                quantity: 10.0,
            });
            records
                .daily_costs
                .entry(d(day))
                .or_default()
                .add(CostCategory::Production, 10.0);
        }
        let committed = records.restrict_to(d(2));
        assert_eq!(committed.production.len(), 2);
        assert_eq!(committed.total_cost().production, 20.0);
        assert_eq!(committed.total_production(), 20.0);
    }
}
