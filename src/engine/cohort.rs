// ==========================================
// 冷链产销排产系统 - 批次库存引擎
// ==========================================
// 职责: 构建 (节点 × 产品 × 生产日期 × 当前日期 × 状态) 稀疏变量空间与
//       批次平衡/需求消耗/状态转换约束
// 红线: 批次只在 年龄 ≤ 保质期 期间存在（隐式报废,无变量即无法持有过期库存）
// 红线: 批次出库总量不超过库存由平衡等式保证,不另加不等式
// 说明: 本模块不做可行性修复,不可行由外层求解报告
// ==========================================

use crate::domain::error::ModelResult;
use crate::domain::types::StorageState;
use crate::engine::builder::ModelBuilder;
use crate::engine::production::ProductionVars;
use crate::engine::var_key::VarKey;
use crate::solver::model::{LinearExpr, Sense, VarId};
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, warn};

/// 批次来源键 (节点下标, 产品下标, 生产日期, 状态)
type OriginKey = (usize, usize, NaiveDate, StorageState);

/// 批次级发运变量（供车辆约束聚合）
#[derive(Debug, Clone)]
pub struct ShipmentVar {
    pub route_idx: usize,
    pub product_idx: usize,
    pub departure: NaiveDate,
    pub var: VarId,
}

#[derive(Debug, Default)]
pub struct CohortVars {
    pub shipments: Vec<ShipmentVar>,
    pub cohort_count: usize,
}

/// (批次, 日期) 上的流入/流出
#[derive(Debug, Default)]
struct FlowLedger {
    inflow: Vec<VarId>,
    outflow: Vec<VarId>,
    constant: f64,
}

/// 批次存续区间
#[derive(Debug, Clone, Copy)]
struct CohortSpan {
    first: NaiveDate,
    last: NaiveDate,
}

impl CohortSpan {
    fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first && date <= self.last
    }

    fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let first = self.first;
        let len = (self.last - self.first).num_days() + 1;
        (0..len).map(move |i| first + Duration::days(i))
    }
}

// ==========================================
// 可达批次搜索
// ==========================================
struct Reachability<'a, 'b> {
    b: &'b ModelBuilder<'a>,
    window_end: NaiveDate,
    spans: BTreeMap<OriginKey, CohortSpan>,
    queue: VecDeque<OriginKey>,
}

impl<'a, 'b> Reachability<'a, 'b> {
    fn new(b: &'b ModelBuilder<'a>) -> Self {
        Self {
            b,
            window_end: b.window().end,
            spans: BTreeMap::new(),
            queue: VecDeque::new(),
        }
    }

    fn shelf_life(&self, product_idx: usize, state: StorageState) -> i64 {
        self.b.ctx.products()[product_idx].shelf_life(state) as i64
    }

    /// 登记批次在 inflow_date 有流入; 首次流入提前时重新展开
    fn register(&mut self, key: OriginKey, inflow_date: NaiveDate) -> bool {
        let (_, product_idx, production_date, state) = key;
        let last_valid = production_date + Duration::days(self.shelf_life(product_idx, state));
        let last = last_valid.min(self.window_end);
        if inflow_date > last || inflow_date < production_date {
            return false;
        }
        match self.spans.get_mut(&key) {
            Some(span) if span.first <= inflow_date => {}
            Some(span) => {
                span.first = inflow_date;
                self.queue.push_back(key);
            }
            None => {
                self.spans.insert(
                    key,
                    CohortSpan {
                        first: inflow_date,
                        last,
                    },
                );
                self.queue.push_back(key);
            }
        }
        true
    }

    fn expand(&mut self) {
        let ctx = self.b.ctx;
        let network = ctx.network();
        let allow_transitions = self.b.options.allow_in_node_transitions;

        while let Some(key) = self.queue.pop_front() {
            let (node_idx, product_idx, production_date, state) = key;
            let Some(span) = self.spans.get(&key).copied() else {
                continue;
            };
            let node = &network.nodes()[node_idx];

            for date in span.dates() {
                for (route_idx, route) in network.routes_from(&node.id) {
                    if route.mode.carried_state() != state {
                        continue;
                    }
                    let arrival = date + Duration::days(route.transit_days as i64);
                    if arrival > self.window_end {
                        continue;
                    }
                    let outcome = network.arrival(route_idx);
                    let Some(dest_idx) = network.node_position(&route.destination) else {
                        continue;
                    };
                    let arrival_pd = if outcome.resets_age { arrival } else { production_date };
                    self.register((dest_idx, product_idx, arrival_pd, outcome.state), arrival);
                }

                if allow_transitions && node.capabilities.stores_both() && production_date < date {
                    self.register((node_idx, product_idx, date, state.other()), date);
                }
            }
        }
    }
}

/// 添加批次库存变量与约束
pub fn add_cohorts(b: &mut ModelBuilder<'_>, production: &ProductionVars) -> ModelResult<CohortVars> {
    let ctx = b.ctx;
    let inputs = b.inputs;
    let options = b.options;
    let window = b.window();
    let network = ctx.network();
    let costs = ctx.costs();

    let product_idx: HashMap<&str, usize> = ctx
        .products()
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id.as_str(), i))
        .collect();

    // ===== 1. 可达批次 =====
    let mut ledgers: HashMap<(OriginKey, NaiveDate), FlowLedger> = HashMap::new();
    let spans = {
        let mut reach = Reachability::new(b);

        for (node, spec) in network.manufacturing_nodes() {
            let Some(node_idx) = network.node_position(&node.id) else {
                continue;
            };
            for (p_idx, _) in ctx.products().iter().enumerate() {
                for date in window.dates() {
                    reach.register((node_idx, p_idx, date, spec.production_state), date);
                }
            }
        }

        for record in &inputs.initial_inventory {
            let (Some(node_idx), Some(&p_idx)) =
                (network.node_position(&record.node), product_idx.get(record.product.as_str()))
            else {
                continue;
            };
            let key = (node_idx, p_idx, record.production_date(window.start), record.state);
            if reach.register(key, window.start) {
                ledgers.entry((key, window.start)).or_default().constant += record.quantity;
            } else {
                warn!(
                    node = %record.node,
                    product = %record.product,
                    age_days = record.age_days,
                    state = %record.state,
                    quantity = record.quantity,
                    "期初库存已超过保质期,不参与建模"
                );
            }
        }

        for arrival in &inputs.in_transit {
            if arrival.arrival_date > window.end {
                continue;
            }
            if arrival.arrival_date < window.start {
                warn!(
                    route = %arrival.route,
                    arrival_date = %arrival.arrival_date,
                    "在途到货日期早于窗口首日,已忽略"
                );
                continue;
            }
            let (Some(node_idx), Some(&p_idx)) = (
                network.node_position(&arrival.destination),
                product_idx.get(arrival.product.as_str()),
            ) else {
                continue;
            };
            let key = (node_idx, p_idx, arrival.production_date, arrival.state);
            if reach.register(key, arrival.arrival_date) {
                ledgers
                    .entry((key, arrival.arrival_date))
                    .or_default()
                    .constant += arrival.quantity;
            } else {
                warn!(
                    route = %arrival.route,
                    arrival_date = %arrival.arrival_date,
                    product = %arrival.product,
                    production_date = %arrival.production_date,
                    quantity = arrival.quantity,
                    "在途到货到达日不在批次有效期内,不参与建模"
                );
            }
        }

        reach.expand();
        reach.spans
    };

    let node_id = |idx: usize| network.nodes()[idx].id.clone();
    let product_id = |idx: usize| ctx.products()[idx].id.clone();

    // ===== 2. 库存变量 =====
    let mut inventory: HashMap<(OriginKey, NaiveDate), VarId> = HashMap::new();
    let mut by_node_product: BTreeMap<(usize, usize), Vec<OriginKey>> = BTreeMap::new();
    let mut by_node_date: BTreeMap<(usize, NaiveDate), Vec<VarId>> = BTreeMap::new();
    for (&key, span) in &spans {
        let (node_idx, p_idx, production_date, state) = key;
        for date in span.dates() {
            let var = b.continuous(
                VarKey::Inventory {
                    node: node_id(node_idx),
                    product: product_id(p_idx),
                    production_date,
                    date,
                    state,
                },
                None,
                costs.holding_cost(state),
            );
            inventory.insert((key, date), var);
            by_node_date.entry((node_idx, date)).or_default().push(var);
        }
        by_node_product.entry((node_idx, p_idx)).or_default().push(key);
    }

    // ===== 3. 生产流入 =====
    for (node, spec) in network.manufacturing_nodes() {
        let Some(node_idx) = network.node_position(&node.id) else {
            continue;
        };
        for (p_idx, product) in ctx.products().iter().enumerate() {
            for date in window.dates() {
                let Some(prod) = production.production(&node.id, &product.id, date) else {
                    continue;
                };
                let key = (node_idx, p_idx, date, spec.production_state);
                if spans.contains_key(&key) {
                    ledgers.entry((key, date)).or_default().inflow.push(prod);
                }
            }
        }
    }

    // ===== 4. 发运与节点内转换 =====
    let mut shipments = Vec::new();
    for (&key, span) in &spans {
        let (node_idx, p_idx, production_date, state) = key;
        let node = &network.nodes()[node_idx];

        for date in span.dates() {
            for (route_idx, route) in network.routes_from(&node.id) {
                if route.mode.carried_state() != state {
                    continue;
                }
                let arrival = date + Duration::days(route.transit_days as i64);
                if arrival > window.end {
                    continue;
                }
                let outcome = network.arrival(route_idx);
                let Some(dest_idx) = network.node_position(&route.destination) else {
                    continue;
                };
                let arrival_pd = if outcome.resets_age { arrival } else { production_date };
                let dest_key = (dest_idx, p_idx, arrival_pd, outcome.state);
                if !spans.get(&dest_key).is_some_and(|s| s.contains(arrival)) {
                    continue;
                }

                let var = b.continuous(
                    VarKey::Shipment {
                        route: route.id.clone(),
                        product: product_id(p_idx),
                        production_date,
                        departure: date,
                    },
                    None,
                    route.cost_per_unit,
                );
                ledgers.entry((key, date)).or_default().outflow.push(var);
                ledgers.entry((dest_key, arrival)).or_default().inflow.push(var);
                shipments.push(ShipmentVar {
                    route_idx,
                    product_idx: p_idx,
                    departure: date,
                    var,
                });
            }

            if options.allow_in_node_transitions && node.capabilities.stores_both() && production_date < date {
                let target = (node_idx, p_idx, date, state.other());
                if spans.get(&target).is_some_and(|s| s.contains(date)) {
                    let var = b.continuous(
                        VarKey::Transition {
                            node: node.id.clone(),
                            product: product_id(p_idx),
                            production_date,
                            date,
                            from: state,
                        },
                        None,
                        costs.transition_cost_per_unit,
                    );
                    ledgers.entry((key, date)).or_default().outflow.push(var);
                    ledgers.entry((target, date)).or_default().inflow.push(var);
                }
            }
        }
    }

    // ===== 5. 需求消耗 =====
    for (node, product, date, quantity) in ctx.demand_between(window.start, window.end) {
        let (Some(node_idx), Some(&p_idx)) = (network.node_position(node), product_idx.get(product)) else {
            continue;
        };
        let mut expr = LinearExpr::new();
        if let Some(keys) = by_node_product.get(&(node_idx, p_idx)) {
            for &key in keys {
                if !spans[&key].contains(date) {
                    continue;
                }
                let (_, _, production_date, state) = key;
                let var = b.continuous(
                    VarKey::Consumption {
                        node: node.to_string(),
                        product: product.to_string(),
                        production_date,
                        date,
                        state,
                    },
                    None,
                    0.0,
                );
                ledgers.entry((key, date)).or_default().outflow.push(var);
                expr.add_term(var, 1.0);
            }
        }
        if options.allow_shortfall {
            let shortfall = b.continuous(
                VarKey::Shortfall {
                    node: node.to_string(),
                    product: product.to_string(),
                    date,
                },
                Some(quantity),
                costs.shortfall_penalty_per_unit,
            );
            expr.add_term(shortfall, 1.0);
        }
        b.constrain("demand", expr, Sense::Eq, quantity);
    }

    // ===== 6. 批次平衡 =====
    // inv[t] - inv[t-1] - 流入 + 流出 = 常量流入
    for (&key, span) in &spans {
        let mut previous: Option<VarId> = None;
        for date in span.dates() {
            let Some(&inv) = inventory.get(&(key, date)) else {
                continue;
            };
            let mut expr = LinearExpr::term(inv, 1.0);
            if let Some(prev) = previous {
                expr.add_term(prev, -1.0);
            }
            let mut constant = 0.0;
            if let Some(ledger) = ledgers.get(&(key, date)) {
                for &var in &ledger.inflow {
                    expr.add_term(var, -1.0);
                }
                for &var in &ledger.outflow {
                    expr.add_term(var, 1.0);
                }
                constant = ledger.constant;
            }
            b.constrain("cohort_balance", expr, Sense::Eq, constant);
            previous = Some(inv);
        }
    }

    // ===== 7. 节点库存上限 =====
    if options.enforce_storage_capacity {
        for (node_idx, node) in network.nodes().iter().enumerate() {
            let Some(capacity) = node.storage_capacity else {
                continue;
            };
            for date in window.dates() {
                let Some(vars) = by_node_date.get(&(node_idx, date)) else {
                    continue;
                };
                b.constrain("storage_capacity", LinearExpr::sum(vars.iter().copied()), Sense::Le, capacity);
            }
        }
    }

    debug!(
        cohorts = spans.len(),
        inventory_vars = inventory.len(),
        shipment_vars = shipments.len(),
        "批次变量空间构建完成"
    );

    Ok(CohortVars {
        cohort_count: spans.len(),
        shipments,
    })
}

#[cfg(test)]
mod tests {
    use crate::domain::{
        DemandRecord, InTransitArrival, LaborDay, ManufacturingSpec, Node, NodeCapabilities,
        PlanningContext, PlanningData, Product, Route,
    };
    use crate::domain::types::{StorageState, TransportMode};
    use crate::engine::builder::WindowModel;
    use crate::engine::var_key::VarKey;
    use crate::engine::window::{ModelOptions, PlanningWindow, WindowInputs};
    use chrono::{Duration, NaiveDate};

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap() + Duration::days(n - 1)
    }

    fn ambient(can_manufacture: bool, has_demand: bool) -> NodeCapabilities {
        NodeCapabilities {
            can_manufacture,
            can_store_frozen: false,
            can_store_ambient: true,
            has_demand,
        }
    }

    /// 常温保质期 2 天, M1 → H1 运输 1 天, 5 天窗口
    fn build(options: &ModelOptions) -> WindowModel {
        build_with(options, Vec::new())
    }

    fn build_with(options: &ModelOptions, in_transit: Vec<InTransitArrival>) -> WindowModel {
        let data = PlanningData {
            nodes: vec![
                Node::new("M1", ambient(true, false)).with_manufacturing(ManufacturingSpec::with_rate(100.0)),
                Node::new("H1", ambient(false, true)),
            ],
            routes: vec![Route::new("R1", "M1", "H1", 1, TransportMode::Ambient)],
            products: vec![Product::new("P1").with_shelf_lives(2, 120, 14)],
            demand: vec![DemandRecord::new("H1", "P1", day(3), 50.0)],
            labor: (1..=5).map(|n| LaborDay::fixed(day(n), 8.0, 20.0, 30.0)).collect(),
            ..Default::default()
        };
        let ctx = PlanningContext::new(data).unwrap();
        let mut inputs = WindowInputs::from_context(&ctx, PlanningWindow::single(day(1), day(5)).unwrap());
        inputs.in_transit.extend(in_transit);
        WindowModel::build(&ctx, &inputs, options).unwrap()
    }

    fn arrival(production_date: NaiveDate) -> InTransitArrival {
        InTransitArrival {
            route: "R1".to_string(),
            destination: "H1".to_string(),
            product: "P1".to_string(),
            production_date,
            state: StorageState::Ambient,
            arrival_date: day(2),
            quantity: 30.0,
        }
    }

    fn hub_inventory_dates(model: &WindowModel, pd: NaiveDate) -> Vec<NaiveDate> {
        model
            .keys()
            .iter()
            .filter_map(|k| match k {
                VarKey::Inventory {
                    node,
                    production_date,
                    date,
                    ..
                } if node == "H1" && *production_date == pd => Some(*date),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_inventory_never_exceeds_shelf_life() {
        let model = build(&ModelOptions::default());
        let mut inventory = 0;
        for key in model.keys() {
            if let VarKey::Inventory {
                production_date, date, ..
            } = key
            {
                inventory += 1;
                assert!((*date - *production_date).num_days() <= 2, "{} 超出保质期", key);
                assert!(*date >= *production_date);
            }
        }
        assert!(inventory > 0);
    }

    #[test]
    fn test_no_shipment_arrives_after_window_end() {
        let model = build(&ModelOptions::default());
        let departures: Vec<NaiveDate> = model
            .keys()
            .iter()
            .filter_map(|k| match k {
                VarKey::Shipment { departure, .. } => Some(*departure),
                _ => None,
            })
            .collect();
        assert!(!departures.is_empty());
        assert!(departures.iter().all(|d| *d <= day(4)));
    }

    #[test]
    fn test_shortfall_variables_only_when_allowed() {
        let is_shortfall = |k: &&VarKey| matches!(k, VarKey::Shortfall { .. });

        let strict = build(&ModelOptions::default());
        assert_eq!(strict.keys().iter().filter(is_shortfall).count(), 0);

        let relaxed = build(&ModelOptions::default().with_shortfall(true));
        assert_eq!(relaxed.keys().iter().filter(is_shortfall).count(), 1);
    }

    #[test]
    fn test_expired_in_transit_arrival_is_dropped() {
        // 到达日已超出常温保质期 2 天
        let stale = day(1) - Duration::days(3);
        let model = build_with(&ModelOptions::default(), vec![arrival(stale)]);
        assert!(hub_inventory_dates(&model, stale).is_empty());

        // 到达当日恰好到期: 只在到达日建模
        let last_day = day(1) - Duration::days(1);
        let model = build_with(&ModelOptions::default(), vec![arrival(last_day)]);
        assert_eq!(hub_inventory_dates(&model, last_day), vec![day(2)]);
    }
}
