// ==========================================
// 冷链产销排产系统 - 节点/路线领域模型
// ==========================================
// 职责: 节点能力、运输路线、到达状态转换规则
// 红线: 到达状态只取决于 (运输模式, 目的节点能力),与日期/产品无关
// ==========================================

use crate::domain::error::{ModelError, ModelResult};
use crate::domain::types::{StorageState, TransportMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// NodeCapabilities - 节点能力集
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeCapabilities {
    #[serde(default)]
    pub can_manufacture: bool,
    #[serde(default)]
    pub can_store_frozen: bool,
    #[serde(default)]
    pub can_store_ambient: bool,
    #[serde(default)]
    pub has_demand: bool,
}

impl NodeCapabilities {
    /// 是否可存储指定状态
    pub fn supports(&self, state: StorageState) -> bool {
        match state {
            StorageState::Frozen => self.can_store_frozen,
            StorageState::Ambient => self.can_store_ambient,
        }
    }

    /// 仅冷冻存储
    pub fn is_frozen_only(&self) -> bool {
        self.can_store_frozen && !self.can_store_ambient
    }

    /// 仅常温存储
    pub fn is_ambient_only(&self) -> bool {
        self.can_store_ambient && !self.can_store_frozen
    }

    /// 两种状态都可存储（允许节点内冷冻/解冻）
    pub fn stores_both(&self) -> bool {
        self.can_store_frozen && self.can_store_ambient
    }
}

// ==========================================
// ManufacturingSpec - 生产参数
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManufacturingSpec {
    /// 生产速率（单位/小时）
    pub production_rate_per_hour: f64,

    /// 开机准备时间（小时）
    #[serde(default = "default_startup_hours")]
    pub startup_hours: f64,

    /// 停机清理时间（小时）
    #[serde(default = "default_shutdown_hours")]
    pub shutdown_hours: f64,

    /// 产品切换时间（小时/次）
    #[serde(default = "default_changeover_hours")]
    pub changeover_hours: f64,

    /// 下线产品的存储状态
    #[serde(default = "default_production_state")]
    pub production_state: StorageState,
}

fn default_startup_hours() -> f64 {
    0.5
}

fn default_shutdown_hours() -> f64 {
    0.5
}

fn default_changeover_hours() -> f64 {
    1.0
}

fn default_production_state() -> StorageState {
    StorageState::Ambient
}

impl ManufacturingSpec {
    /// 按速率构造（开停机/换产时间为 0）
    pub fn with_rate(production_rate_per_hour: f64) -> Self {
        Self {
            production_rate_per_hour,
            startup_hours: 0.0,
            shutdown_hours: 0.0,
            changeover_hours: 0.0,
            production_state: StorageState::Ambient,
        }
    }

    /// 开停机合计时间
    pub fn fixed_overhead_hours(&self) -> f64 {
        self.startup_hours + self.shutdown_hours
    }
}

// ==========================================
// Node - 节点
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub capabilities: NodeCapabilities,
    #[serde(default)]
    pub manufacturing: Option<ManufacturingSpec>,
    /// 库存上限（全部批次合计）
    #[serde(default)]
    pub storage_capacity: Option<f64>,
}

impl Node {
    pub fn new(id: &str, capabilities: NodeCapabilities) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            capabilities,
            manufacturing: None,
            storage_capacity: None,
        }
    }

    pub fn with_manufacturing(mut self, spec: ManufacturingSpec) -> Self {
        self.capabilities.can_manufacture = true;
        self.manufacturing = Some(spec);
        self
    }

    pub fn with_storage_capacity(mut self, capacity: f64) -> Self {
        self.storage_capacity = Some(capacity);
        self
    }
}

// ==========================================
// Route - 运输路线（有向）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub transit_days: u32,
    pub mode: TransportMode,
    #[serde(default)]
    pub cost_per_unit: f64,
}

impl Route {
    pub fn new(id: &str, origin: &str, destination: &str, transit_days: u32, mode: TransportMode) -> Self {
        Self {
            id: id.to_string(),
            origin: origin.to_string(),
            destination: destination.to_string(),
            transit_days,
            mode,
            cost_per_unit: 0.0,
        }
    }

    pub fn with_cost(mut self, cost_per_unit: f64) -> Self {
        self.cost_per_unit = cost_per_unit;
        self
    }
}

// ==========================================
// 到达状态转换规则
// ==========================================

/// 到达结果: 到达后的存储状态 + 是否重置批次年龄
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalOutcome {
    pub state: StorageState,
    pub resets_age: bool,
}

/// 到达状态转换规则（纯函数）
///
/// 规则:
/// 1) 常温运输到达仅冷冻节点 → 冷冻,年龄归零
/// 2) 冷冻运输到达仅常温节点 → 常温（解冻）,年龄归零
/// 3) 其他情况保持运输状态,年龄继续累计
///
/// # 返回
/// - None: 目的节点无法存储任何状态
pub fn arrival_outcome(mode: TransportMode, destination: &NodeCapabilities) -> Option<ArrivalOutcome> {
    let carried = mode.carried_state();
    if destination.supports(carried) {
        return Some(ArrivalOutcome {
            state: carried,
            resets_age: false,
        });
    }
    let other = carried.other();
    if destination.supports(other) {
        return Some(ArrivalOutcome {
            state: other,
            resets_age: true,
        });
    }
    None
}

// ==========================================
// Network - 节点与路线集合（已校验）
// ==========================================
#[derive(Debug, Clone)]
pub struct Network {
    nodes: Vec<Node>,
    routes: Vec<Route>,
    arrivals: Vec<ArrivalOutcome>,
    node_index: HashMap<String, usize>,
}

impl Network {
    /// 构建并校验网络
    ///
    /// 校验内容:
    /// - 节点/路线标识唯一
    /// - 路线端点存在且不为自环
    /// - 起点具备运输状态的存储能力
    /// - 终点能接收到达状态
    /// - 生产能力声明与生产参数一致
    pub fn new(nodes: Vec<Node>, routes: Vec<Route>) -> ModelResult<Self> {
        let mut node_index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if node_index.insert(node.id.clone(), i).is_some() {
                return Err(ModelError::DuplicateId {
                    kind: "节点",
                    id: node.id.clone(),
                });
            }
            validate_node(node)?;
        }

        let mut route_ids = HashMap::with_capacity(routes.len());
        let mut arrivals = Vec::with_capacity(routes.len());
        for route in &routes {
            if route_ids.insert(route.id.clone(), ()).is_some() {
                return Err(ModelError::DuplicateId {
                    kind: "路线",
                    id: route.id.clone(),
                });
            }
            let context = format!("路线 {}", route.id);
            let origin = node_index
                .get(&route.origin)
                .map(|&i| &nodes[i])
                .ok_or_else(|| ModelError::UnknownNode {
                    context: context.clone(),
                    node: route.origin.clone(),
                })?;
            let destination = node_index
                .get(&route.destination)
                .map(|&i| &nodes[i])
                .ok_or_else(|| ModelError::UnknownNode {
                    context: context.clone(),
                    node: route.destination.clone(),
                })?;

            if origin.id == destination.id {
                return Err(ModelError::SelfLoopRoute {
                    route: route.id.clone(),
                    node: origin.id.clone(),
                });
            }
            if !route.cost_per_unit.is_finite() || route.cost_per_unit < 0.0 {
                return Err(ModelError::InvalidQuantity {
                    context: format!("路线 {} 单位运费", route.id),
                    value: route.cost_per_unit,
                });
            }

            let carried = route.mode.carried_state();
            if !origin.capabilities.supports(carried) {
                return Err(ModelError::RouteOriginLacksStorage {
                    route: route.id.clone(),
                    node: origin.id.clone(),
                    state: carried,
                });
            }

            let outcome = arrival_outcome(route.mode, &destination.capabilities).ok_or_else(|| {
                ModelError::RouteDestinationLacksStorage {
                    route: route.id.clone(),
                    node: destination.id.clone(),
                }
            })?;
            arrivals.push(outcome);
        }

        Ok(Self {
            nodes,
            routes,
            arrivals,
            node_index,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    /// 节点在 nodes() 中的下标
    pub fn node_position(&self, id: &str) -> Option<usize> {
        self.node_index.get(id).copied()
    }

    pub fn route(&self, id: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.id == id)
    }

    /// 路线到达结果（与 routes() 同序）
    pub fn arrival(&self, route_idx: usize) -> ArrivalOutcome {
        self.arrivals[route_idx]
    }

    /// 指定节点出发的路线（含下标）
    pub fn routes_from<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = (usize, &'a Route)> + 'a {
        self.routes
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.origin == node_id)
    }

    /// 具备生产能力的节点
    pub fn manufacturing_nodes(&self) -> impl Iterator<Item = (&Node, &ManufacturingSpec)> {
        self.nodes
            .iter()
            .filter_map(|n| n.manufacturing.as_ref().map(|spec| (n, spec)))
    }

    /// 存在连接 origin → destination 的路线
    pub fn has_lane(&self, origin: &str, destination: &str) -> bool {
        self.routes
            .iter()
            .any(|r| r.origin == origin && r.destination == destination)
    }
}

fn validate_node(node: &Node) -> ModelResult<()> {
    match (&node.manufacturing, node.capabilities.can_manufacture) {
        (Some(spec), true) => {
            if !spec.production_rate_per_hour.is_finite() || spec.production_rate_per_hour <= 0.0 {
                return Err(ModelError::ManufacturingMismatch {
                    node: node.id.clone(),
                    message: format!("生产速率必须为正数: {}", spec.production_rate_per_hour),
                });
            }
            let overheads = [spec.startup_hours, spec.shutdown_hours, spec.changeover_hours];
            if overheads.iter().any(|h| !h.is_finite() || *h < 0.0) {
                return Err(ModelError::ManufacturingMismatch {
                    node: node.id.clone(),
                    message: "开停机/换产时间不能为负".to_string(),
                });
            }
            if !node.capabilities.supports(spec.production_state) {
                return Err(ModelError::UnsupportedState {
                    node: node.id.clone(),
                    state: spec.production_state,
                    context: "下线产品状态".to_string(),
                });
            }
        }
        (None, false) => {}
        (Some(_), false) => {
            return Err(ModelError::ManufacturingMismatch {
                node: node.id.clone(),
                message: "提供了生产参数但未声明生产能力".to_string(),
            });
        }
        (None, true) => {
            return Err(ModelError::ManufacturingMismatch {
                node: node.id.clone(),
                message: "声明了生产能力但缺少生产参数".to_string(),
            });
        }
    }

    if let Some(capacity) = node.storage_capacity {
        if !capacity.is_finite() || capacity < 0.0 {
            return Err(ModelError::InvalidQuantity {
                context: format!("节点 {} 库存上限", node.id),
                value: capacity,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(frozen: bool, ambient: bool) -> NodeCapabilities {
        NodeCapabilities {
            can_manufacture: false,
            can_store_frozen: frozen,
            can_store_ambient: ambient,
            has_demand: false,
        }
    }

    #[test]
    fn test_arrival_outcome_table() {
        // 常温运输到仅冷冻节点: 冷冻并重置年龄
        assert_eq!(
            arrival_outcome(TransportMode::Ambient, &caps(true, false)),
            Some(ArrivalOutcome {
                state: StorageState::Frozen,
                resets_age: true
            })
        );
        // 冷冻运输到仅常温节点: 解冻并重置年龄
        assert_eq!(
            arrival_outcome(TransportMode::Frozen, &caps(false, true)),
            Some(ArrivalOutcome {
                state: StorageState::Ambient,
                resets_age: true
            })
        );
        // 两种都能存: 保持
        for mode in [TransportMode::Frozen, TransportMode::Ambient] {
            let outcome = arrival_outcome(mode, &caps(true, true)).unwrap();
            assert_eq!(outcome.state, mode.carried_state());
            assert!(!outcome.resets_age);
        }
        // 都不能存
        assert_eq!(arrival_outcome(TransportMode::Frozen, &caps(false, false)), None);
    }

    #[test]
    fn test_arrival_outcome_is_pure() {
        let dest = caps(true, false);
        let first = arrival_outcome(TransportMode::Ambient, &dest);
        for _ in 0..10 {
            assert_eq!(arrival_outcome(TransportMode::Ambient, &dest), first);
        }
    }

    #[test]
    fn test_network_rejects_destination_without_storage() {
        let nodes = vec![
            Node::new("M", caps(false, true)).with_manufacturing(ManufacturingSpec::with_rate(100.0)),
            Node::new("X", caps(false, false)),
        ];
        let routes = vec![Route::new("R1", "M", "X", 1, TransportMode::Ambient)];

        let err = Network::new(nodes, routes).unwrap_err();
        assert!(matches!(err, ModelError::RouteDestinationLacksStorage { .. }));
    }

    #[test]
    fn test_network_rejects_origin_without_mode_storage() {
        let nodes = vec![
            Node::new("M", caps(false, true)).with_manufacturing(ManufacturingSpec::with_rate(100.0)),
            Node::new("D", caps(true, true)),
        ];
        let routes = vec![Route::new("R1", "M", "D", 1, TransportMode::Frozen)];

        let err = Network::new(nodes, routes).unwrap_err();
        assert!(matches!(err, ModelError::RouteOriginLacksStorage { .. }));
    }

    #[test]
    fn test_network_rejects_manufacturing_mismatch() {
        let mut node = Node::new("M", caps(false, true));
        node.capabilities.can_manufacture = true;

        let err = Network::new(vec![node], vec![]).unwrap_err();
        assert!(matches!(err, ModelError::ManufacturingMismatch { .. }));
    }

    #[test]
    fn test_network_rejects_unknown_node_and_duplicates() {
        let nodes = vec![Node::new("A", caps(false, true)), Node::new("A", caps(true, false))];
        assert!(matches!(
            Network::new(nodes, vec![]).unwrap_err(),
            ModelError::DuplicateId { .. }
        ));

        let nodes = vec![Node::new("A", caps(false, true))];
        let routes = vec![Route::new("R", "A", "B", 1, TransportMode::Ambient)];
        assert!(matches!(
            Network::new(nodes, routes).unwrap_err(),
            ModelError::UnknownNode { .. }
        ));
    }
}
