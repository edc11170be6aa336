// ==========================================
// 冷链产销排产系统 - 领域模型层
// ==========================================
// 职责: 节点/路线/产品/需求/人工/车辆等只读实体及其校验
// 红线: 不含求解逻辑,不含引擎逻辑
// ==========================================

pub mod cost;
pub mod error;
pub mod inventory;
pub mod labor;
pub mod network;
pub mod product;
pub mod scenario;
pub mod truck;
pub mod types;

// 重导出核心类型
pub use cost::CostParameters;
pub use error::{ModelError, ModelResult};
pub use inventory::{DemandRecord, InTransitArrival, InitialInventoryRecord};
pub use labor::{LaborCalendar, LaborDay};
pub use network::{
    arrival_outcome, ArrivalOutcome, ManufacturingSpec, Network, Node, NodeCapabilities, Route,
};
pub use product::Product;
pub use scenario::{PlanningContext, PlanningData};
pub use truck::TruckSchedule;
pub use types::{DepartureSlot, StorageState, TransportMode};
