// ==========================================
// 冷链产销排产系统 - 需求与库存快照
// ==========================================
// 职责: 需求记录、期初库存、在途到货
// ==========================================

use crate::domain::types::StorageState;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

// ==========================================
// DemandRecord - 需求记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    pub node: String,
    pub product: String,
    pub date: NaiveDate,
    pub quantity: f64,
}

impl DemandRecord {
    pub fn new(node: &str, product: &str, date: NaiveDate, quantity: f64) -> Self {
        Self {
            node: node.to_string(),
            product: product.to_string(),
            date,
            quantity,
        }
    }
}

// ==========================================
// InitialInventoryRecord - 期初库存
// ==========================================
// age_days: 窗口首日时的批次年龄,生产日期 = 窗口首日 - age_days
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialInventoryRecord {
    pub node: String,
    pub product: String,
    pub age_days: u32,
    pub state: StorageState,
    pub quantity: f64,
}

impl InitialInventoryRecord {
    pub fn new(node: &str, product: &str, age_days: u32, state: StorageState, quantity: f64) -> Self {
        Self {
            node: node.to_string(),
            product: product.to_string(),
            age_days,
            state,
            quantity,
        }
    }

    /// 对应批次的生产日期（相对窗口首日）
    pub fn production_date(&self, window_start: NaiveDate) -> NaiveDate {
        window_start - Duration::days(self.age_days as i64)
    }
}

// ==========================================
// InTransitArrival - 在途到货
// ==========================================
// 已提交窗口发出、在后续窗口到达的货物; 到达批次身份已确定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InTransitArrival {
    pub route: String,
    pub destination: String,
    pub product: String,
    /// 到达后批次的生产日期（重置年龄时即到达日）
    pub production_date: NaiveDate,
    pub state: StorageState,
    pub arrival_date: NaiveDate,
    pub quantity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_inventory_production_date() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let record = InitialInventoryRecord::new("N1", "P1", 3, StorageState::Ambient, 100.0);
        assert_eq!(
            record.production_date(start),
            NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
        );
    }
}
