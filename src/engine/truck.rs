// ==========================================
// 冷链产销排产系统 - 车辆装载约束
// ==========================================
// 职责: 车辆容量/发车固定成本、装载与发运的等式联动、装载时序
// 红线: 上午车只能装 前一日及以前 完工的产品; 下午车可加装当日产品
//       按 (产地, 产品) 累计: 截至某班次的全部装载 ≤ 期初库存 + 截至该班次可装的累计生产
//       可用量只引用更早（或同日下午）的生产,不引用库存,避免循环依赖
// 说明: 没有任何班次的线路不受车辆约束
// ==========================================

use crate::domain::error::ModelResult;
use crate::domain::truck::TruckSchedule;
use crate::domain::types::DepartureSlot;
use crate::engine::builder::ModelBuilder;
use crate::engine::cohort::CohortVars;
use crate::engine::production::ProductionVars;
use crate::engine::var_key::VarKey;
use crate::solver::model::{LinearExpr, Sense, VarId};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

pub fn add_trucks(
    b: &mut ModelBuilder<'_>,
    production: &ProductionVars,
    cohorts: &CohortVars,
) -> ModelResult<()> {
    let ctx = b.ctx;
    let window = b.window();
    let network = ctx.network();
    let enforce_timing = b.options.enforce_truck_timing;

    // (产地, 产品) → [(发车日, 班次, 装载变量)]
    let mut origin_loads: BTreeMap<(&str, usize), Vec<(NaiveDate, DepartureSlot, VarId)>> = BTreeMap::new();

    // 线路 → 班次
    let mut lanes: BTreeMap<(&str, &str), Vec<&TruckSchedule>> = BTreeMap::new();
    for truck in ctx.trucks() {
        lanes.entry(truck.lane()).or_default().push(truck);
    }

    // (线路, 产品, 发车日) → 发运变量
    let mut lane_shipments: HashMap<((&str, &str), usize, NaiveDate), Vec<VarId>> = HashMap::new();
    for shipment in &cohorts.shipments {
        let route = &network.routes()[shipment.route_idx];
        let lane = (route.origin.as_str(), route.destination.as_str());
        if lanes.contains_key(&lane) {
            lane_shipments
                .entry((lane, shipment.product_idx, shipment.departure))
                .or_default()
                .push(shipment.var);
        }
    }

    for (&lane, trucks) in &lanes {
        let (origin, _) = lane;
        let origin_manufactures = network
            .node(origin)
            .is_some_and(|n| n.manufacturing.is_some());

        for date in window.dates() {
            let running: Vec<&TruckSchedule> = trucks.iter().copied().filter(|t| t.runs_on(date)).collect();
            let mut loads_by_product: Vec<Vec<VarId>> = vec![Vec::new(); ctx.products().len()];

            for truck in &running {
                let used = b.binary(
                    VarKey::TruckUsed {
                        truck: truck.id.clone(),
                        date,
                    },
                    truck.fixed_cost,
                );
                let mut capacity = LinearExpr::term(used, -truck.capacity);

                for (p_idx, product) in ctx.products().iter().enumerate() {
                    let load = b.continuous(
                        VarKey::TruckLoad {
                            truck: truck.id.clone(),
                            product: product.id.clone(),
                            date,
                        },
                        None,
                        0.0,
                    );
                    capacity.add_term(load, 1.0);
                    loads_by_product[p_idx].push(load);
                    if origin_manufactures {
                        origin_loads
                            .entry((origin, p_idx))
                            .or_default()
                            .push((date, truck.slot, load));
                    }
                }
                b.constrain("truck_capacity", capacity, Sense::Le, 0.0);
            }

            // Σ 装载 = Σ 发运（按线路/日期/产品）
            for (p_idx, loads) in loads_by_product.iter().enumerate() {
                let mut expr = LinearExpr::sum(loads.iter().copied());
                if let Some(vars) = lane_shipments.get(&(lane, p_idx, date)) {
                    for &var in vars {
                        expr.add_term(var, -1.0);
                    }
                }
                if !expr.is_empty() {
                    b.constrain("truck_shipment_link", expr, Sense::Eq, 0.0);
                }
            }
        }
    }

    if enforce_timing {
        add_timing(b, production, &origin_loads);
    }
    Ok(())
}

/// 装载 (d, s) 是否发生在 (date, slot) 班次及以前（同日上午先于下午）
fn loaded_by(load_date: NaiveDate, load_slot: DepartureSlot, date: NaiveDate, slot: DepartureSlot) -> bool {
    load_date < date || (load_date == date && (slot == DepartureSlot::Afternoon || load_slot == DepartureSlot::Morning))
}

/// Σ_{装载截至 (t, s)} ≤ 期初库存 + Σ_{τ<t} 生产 (+ 下午: 当日生产)
fn add_timing(
    b: &mut ModelBuilder<'_>,
    production: &ProductionVars,
    origin_loads: &BTreeMap<(&str, usize), Vec<(NaiveDate, DepartureSlot, VarId)>>,
) {
    let ctx = b.ctx;
    let inputs = b.inputs;
    let window = b.window();

    for (&(origin, p_idx), loads) in origin_loads {
        let product = &ctx.products()[p_idx].id;
        let initial = inputs.initial_stock(origin, product);

        for date in window.dates() {
            for slot in [DepartureSlot::Morning, DepartureSlot::Afternoon] {
                // 只在该班次有装载时约束
                if !loads.iter().any(|&(d, s, _)| d == date && s == slot) {
                    continue;
                }
                let mut expr = LinearExpr::new();
                for &(d, s, var) in loads {
                    if loaded_by(d, s, date, slot) {
                        expr.add_term(var, 1.0);
                    }
                }
                for day in window.dates() {
                    let eligible = day < date || (day == date && slot.loads_same_day_production());
                    if !eligible {
                        break;
                    }
                    if let Some(prod) = production.production(origin, product, day) {
                        expr.add_term(prod, -1.0);
                    }
                }
                b.constrain("truck_timing", expr, Sense::Le, initial);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_morning_precedes_afternoon_on_same_day() {
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let tuesday = monday + Duration::days(1);
        use DepartureSlot::{Afternoon, Morning};

        assert!(loaded_by(monday, Morning, monday, Morning));
        assert!(!loaded_by(monday, Afternoon, monday, Morning));
        assert!(loaded_by(monday, Afternoon, monday, Afternoon));
        assert!(loaded_by(monday, Afternoon, tuesday, Morning));
        assert!(!loaded_by(tuesday, Morning, monday, Afternoon));
    }
}
