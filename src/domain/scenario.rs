// ==========================================
// 冷链产销排产系统 - 计划场景数据
// ==========================================
// 职责: 场景数据加载（JSON / 需求 CSV）+ 校验 + 索引构建
// 红线: 数据不一致时立即报错,不做部分建模
// ==========================================

use crate::domain::cost::CostParameters;
use crate::domain::error::{ModelError, ModelResult};
use crate::domain::inventory::{DemandRecord, InTransitArrival, InitialInventoryRecord};
use crate::domain::labor::{LaborCalendar, LaborDay};
use crate::domain::network::{Network, Node, Route};
use crate::domain::product::Product;
use crate::domain::truck::TruckSchedule;
use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

// ==========================================
// PlanningData - 原始场景数据（外部输入）
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanningData {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub routes: Vec<Route>,
    pub products: Vec<Product>,
    #[serde(default)]
    pub demand: Vec<DemandRecord>,
    #[serde(default)]
    pub labor: Vec<LaborDay>,
    #[serde(default)]
    pub trucks: Vec<TruckSchedule>,
    #[serde(default)]
    pub initial_inventory: Vec<InitialInventoryRecord>,
    #[serde(default)]
    pub in_transit: Vec<InTransitArrival>,
    #[serde(default)]
    pub costs: CostParameters,
}

impl PlanningData {
    /// 从 JSON 文件加载场景
    pub fn load_json(path: &Path) -> ModelResult<Self> {
        let file = File::open(path)?;
        let data: PlanningData = serde_json::from_reader(file)?;
        info!(
            path = %path.display(),
            nodes = data.nodes.len(),
            routes = data.routes.len(),
            products = data.products.len(),
            demand_rows = data.demand.len(),
            "场景数据加载完成"
        );
        Ok(data)
    }

    /// 从 JSON 字符串解析场景
    pub fn from_json_str(raw: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// 读取需求 CSV（表头: node,product,date,quantity）
    pub fn load_demand_csv(path: &Path) -> ModelResult<Vec<DemandRecord>> {
        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut records = Vec::new();
        for result in reader.deserialize::<DemandRecord>() {
            records.push(result?);
        }
        debug!(path = %path.display(), rows = records.len(), "需求 CSV 读取完成");
        Ok(records)
    }
}

// ==========================================
// PlanningContext - 已校验的场景（求解期间只读）
// ==========================================
#[derive(Debug, Clone)]
pub struct PlanningContext {
    network: Network,
    products: Vec<Product>,
    product_index: HashMap<String, usize>,
    labor: LaborCalendar,
    trucks: Vec<TruckSchedule>,
    demand: BTreeMap<(String, String, NaiveDate), f64>,
    initial_inventory: Vec<InitialInventoryRecord>,
    in_transit: Vec<InTransitArrival>,
    costs: CostParameters,
}

impl PlanningContext {
    /// 校验场景数据并构建索引
    pub fn new(data: PlanningData) -> ModelResult<Self> {
        let PlanningData {
            nodes,
            routes,
            products,
            demand,
            labor,
            trucks,
            initial_inventory,
            in_transit,
            costs,
        } = data;

        let network = Network::new(nodes, routes)?;

        let mut product_index = HashMap::with_capacity(products.len());
        for (i, product) in products.iter().enumerate() {
            if product_index.insert(product.id.clone(), i).is_some() {
                return Err(ModelError::DuplicateId {
                    kind: "产品",
                    id: product.id.clone(),
                });
            }
            check_non_negative(
                &format!("产品 {} 单位生产成本", product.id),
                product.production_cost_per_unit,
            )?;
        }

        if let Some((field, value)) = costs.invalid_field() {
            return Err(ModelError::InvalidQuantity {
                context: format!("成本参数 {}", field),
                value,
            });
        }

        let labor = LaborCalendar::new(labor)?;

        let mut ctx = Self {
            network,
            products,
            product_index,
            labor,
            trucks: Vec::new(),
            demand: BTreeMap::new(),
            initial_inventory: Vec::new(),
            in_transit: Vec::new(),
            costs,
        };

        ctx.set_trucks(trucks)?;
        ctx.demand = ctx.index_demand(demand)?;
        ctx.initial_inventory = ctx.validate_initial_inventory(initial_inventory)?;
        ctx.in_transit = ctx.validate_in_transit(in_transit)?;

        info!(
            nodes = ctx.network.nodes().len(),
            routes = ctx.network.routes().len(),
            products = ctx.products.len(),
            trucks = ctx.trucks.len(),
            labor_days = ctx.labor.len(),
            demand_keys = ctx.demand.len(),
            "场景校验通过"
        );
        Ok(ctx)
    }

    /// 替换需求（每日重排使用,结构不变）
    pub fn with_demand(&self, demand: Vec<DemandRecord>) -> ModelResult<Self> {
        let mut next = self.clone();
        next.demand = self.index_demand(demand)?;
        Ok(next)
    }

    // ===== 访问器 =====

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.product_index.get(id).map(|&i| &self.products[i])
    }

    pub fn labor(&self) -> &LaborCalendar {
        &self.labor
    }

    pub fn trucks(&self) -> &[TruckSchedule] {
        &self.trucks
    }

    pub fn initial_inventory(&self) -> &[InitialInventoryRecord] {
        &self.initial_inventory
    }

    pub fn in_transit(&self) -> &[InTransitArrival] {
        &self.in_transit
    }

    pub fn costs(&self) -> &CostParameters {
        &self.costs
    }

    /// 指定 (节点, 产品, 日期) 的需求量（多行合计）
    pub fn demand_for(&self, node: &str, product: &str, date: NaiveDate) -> f64 {
        self.demand
            .get(&(node.to_string(), product.to_string(), date))
            .copied()
            .unwrap_or(0.0)
    }

    /// 日期区间 [start, end] 内的需求（按节点/产品/日期有序）
    pub fn demand_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Iterator<Item = (&str, &str, NaiveDate, f64)> + '_ {
        self.demand
            .iter()
            .filter(move |((_, _, date), _)| *date >= start && *date <= end)
            .map(|((node, product, date), qty)| (node.as_str(), product.as_str(), *date, *qty))
    }

    /// 全部需求记录（聚合后）
    pub fn demand_records(&self) -> Vec<DemandRecord> {
        self.demand
            .iter()
            .map(|((node, product, date), qty)| DemandRecord::new(node, product, *date, *qty))
            .collect()
    }

    // ===== 校验 =====

    fn require_node(&self, context: &str, node: &str) -> ModelResult<&Node> {
        self.network.node(node).ok_or_else(|| ModelError::UnknownNode {
            context: context.to_string(),
            node: node.to_string(),
        })
    }

    fn require_product(&self, context: &str, product: &str) -> ModelResult<()> {
        if self.product_index.contains_key(product) {
            Ok(())
        } else {
            Err(ModelError::UnknownProduct {
                context: context.to_string(),
                product: product.to_string(),
            })
        }
    }

    fn set_trucks(&mut self, trucks: Vec<TruckSchedule>) -> ModelResult<()> {
        let mut ids = HashMap::with_capacity(trucks.len());
        for truck in &trucks {
            if ids.insert(truck.id.clone(), ()).is_some() {
                return Err(ModelError::DuplicateId {
                    kind: "车辆班次",
                    id: truck.id.clone(),
                });
            }
            let context = format!("车辆 {}", truck.id);
            self.require_node(&context, &truck.origin)?;
            self.require_node(&context, &truck.destination)?;
            if !self.network.has_lane(&truck.origin, &truck.destination) {
                return Err(ModelError::TruckWithoutRoute {
                    truck: truck.id.clone(),
                    origin: truck.origin.clone(),
                    destination: truck.destination.clone(),
                });
            }
            check_non_negative(&format!("{} 容量", context), truck.capacity)?;
            check_non_negative(&format!("{} 固定成本", context), truck.fixed_cost)?;
        }
        self.trucks = trucks;
        Ok(())
    }

    fn index_demand(
        &self,
        demand: Vec<DemandRecord>,
    ) -> ModelResult<BTreeMap<(String, String, NaiveDate), f64>> {
        let mut index = BTreeMap::new();
        for record in demand {
            let context = format!("需求 {}/{}/{}", record.node, record.product, record.date);
            self.require_node(&context, &record.node)?;
            self.require_product(&context, &record.product)?;
            check_non_negative(&context, record.quantity)?;
            if record.quantity == 0.0 {
                continue;
            }
            *index
                .entry((record.node, record.product, record.date))
                .or_insert(0.0) += record.quantity;
        }
        Ok(index)
    }

    fn validate_initial_inventory(
        &self,
        records: Vec<InitialInventoryRecord>,
    ) -> ModelResult<Vec<InitialInventoryRecord>> {
        for record in &records {
            let context = format!("期初库存 {}/{}", record.node, record.product);
            let node = self.require_node(&context, &record.node)?;
            self.require_product(&context, &record.product)?;
            if !node.capabilities.supports(record.state) {
                return Err(ModelError::UnsupportedState {
                    node: record.node.clone(),
                    state: record.state,
                    context,
                });
            }
            check_non_negative(&context, record.quantity)?;
        }
        Ok(records)
    }

    fn validate_in_transit(
        &self,
        records: Vec<InTransitArrival>,
    ) -> ModelResult<Vec<InTransitArrival>> {
        for record in &records {
            let context = format!("在途 {} → {}/{}", record.route, record.destination, record.product);
            let node = self.require_node(&context, &record.destination)?;
            self.require_product(&context, &record.product)?;
            if !node.capabilities.supports(record.state) {
                return Err(ModelError::UnsupportedState {
                    node: record.destination.clone(),
                    state: record.state,
                    context,
                });
            }
            check_non_negative(&context, record.quantity)?;
        }
        Ok(records)
    }
}

fn check_non_negative(context: &str, value: f64) -> ModelResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ModelError::InvalidQuantity {
            context: context.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::network::{ManufacturingSpec, NodeCapabilities};
    use crate::domain::types::{DepartureSlot, StorageState, TransportMode};
    use std::io::Write;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn ambient() -> NodeCapabilities {
        NodeCapabilities {
            can_store_ambient: true,
            has_demand: true,
            ..Default::default()
        }
    }

    fn base_data() -> PlanningData {
        PlanningData {
            nodes: vec![
                Node::new("M", ambient()).with_manufacturing(ManufacturingSpec::with_rate(100.0)),
                Node::new("D", ambient()),
            ],
            routes: vec![Route::new("R1", "M", "D", 1, TransportMode::Ambient)],
            products: vec![Product::new("P1")],
            ..Default::default()
        }
    }

    #[test]
    fn test_demand_rows_are_aggregated() {
        let mut data = base_data();
        data.demand = vec![
            DemandRecord::new("D", "P1", d(3), 10.0),
            DemandRecord::new("D", "P1", d(3), 5.0),
            DemandRecord::new("D", "P1", d(4), 0.0),
        ];
        let ctx = PlanningContext::new(data).unwrap();
        assert_eq!(ctx.demand_for("D", "P1", d(3)), 15.0);
        assert_eq!(ctx.demand_between(d(1), d(10)).count(), 1);
    }

    #[test]
    fn test_truck_without_route_is_rejected() {
        let mut data = base_data();
        data.trucks = vec![TruckSchedule::daily("T1", "D", "M", DepartureSlot::Morning, 10.0)];
        assert!(matches!(
            PlanningContext::new(data).unwrap_err(),
            ModelError::TruckWithoutRoute { .. }
        ));
    }

    #[test]
    fn test_initial_inventory_state_must_be_supported() {
        let mut data = base_data();
        data.initial_inventory = vec![InitialInventoryRecord::new("D", "P1", 2, StorageState::Frozen, 5.0)];
        assert!(matches!(
            PlanningContext::new(data).unwrap_err(),
            ModelError::UnsupportedState { .. }
        ));
    }

    #[test]
    fn test_unknown_product_in_demand() {
        let mut data = base_data();
        data.demand = vec![DemandRecord::new("D", "PX", d(3), 1.0)];
        assert!(matches!(
            PlanningContext::new(data).unwrap_err(),
            ModelError::UnknownProduct { .. }
        ));
    }

    #[test]
    fn test_json_and_csv_loading() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("scenario.json");
        std::fs::write(&json_path, serde_json::to_string(&base_data()).unwrap()).unwrap();
        let data = PlanningData::load_json(&json_path).unwrap();
        assert_eq!(data.nodes.len(), 2);

        let csv_path = dir.path().join("demand.csv");
        let mut file = File::create(&csv_path).unwrap();
        writeln!(file, "node,product,date,quantity").unwrap();
        writeln!(file, "D, P1 ,2025-06-03,12.5").unwrap();
        drop(file);

        let rows = PlanningData::load_demand_csv(&csv_path).unwrap();
        assert_eq!(rows, vec![DemandRecord::new("D", "P1", d(3), 12.5)]);
    }
}
