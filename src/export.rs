// ==========================================
// 冷链产销排产系统 - 计划导出
// ==========================================
// 职责: 已提交计划导出为 CSV 明细 + JSON 汇总
// 输出: production / shipments / truck_loads / inventory / transitions /
//       consumption / shortfalls / expired / labor / daily_costs .csv, summary.json
// ==========================================

use crate::engine::rolling::{PlanResult, WindowState};
use crate::engine::solution::CostBreakdown;
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("文件写入失败: {0}")]
    Io(String),

    #[error("CSV 写入失败: {0}")]
    Csv(String),

    #[error("JSON 序列化失败: {0}")]
    Json(String),
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::Csv(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Json(err.to_string())
    }
}

pub type ExportResult<T> = Result<T, ExportError>;

/// 按日成本行
#[derive(Debug, Serialize)]
struct DailyCostRow {
    date: NaiveDate,
    production: f64,
    labor: f64,
    transport: f64,
    truck: f64,
    holding: f64,
    changeover: f64,
    transition: f64,
    shortfall: f64,
    total: f64,
}

impl DailyCostRow {
    fn new(date: NaiveDate, cost: &CostBreakdown) -> Self {
        Self {
            date,
            production: cost.production,
            labor: cost.labor,
            transport: cost.transport,
            truck: cost.truck,
            holding: cost.holding,
            changeover: cost.changeover,
            transition: cost.transition,
            shortfall: cost.shortfall,
            total: cost.total(),
        }
    }
}

/// 计划汇总（summary.json）
#[derive(Debug, Serialize)]
pub struct PlanSummary<'a> {
    pub run_id: &'a str,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub windows: usize,
    pub committed_windows: usize,
    pub failed_window: Option<usize>,
    pub total_production: f64,
    pub total_shortfall: f64,
    pub total_expired: f64,
    pub cost: CostBreakdown,
    pub total_cost: f64,
}

impl<'a> PlanSummary<'a> {
    pub fn of(plan: &'a PlanResult) -> Self {
        Self {
            run_id: &plan.run_id,
            start: plan.start,
            end: plan.end,
            windows: plan.windows.len(),
            committed_windows: plan.committed_windows(),
            failed_window: plan
                .windows
                .iter()
                .find(|w| w.state == WindowState::Failed)
                .map(|w| w.window.index),
            total_production: plan.records.total_production(),
            total_shortfall: plan.records.total_shortfall(),
            total_expired: plan.records.expired.iter().map(|r| r.quantity).sum(),
            cost: plan.cost,
            total_cost: plan.cost.total(),
        }
    }
}

fn write_csv<T: Serialize>(dir: &Path, name: &str, rows: &[T]) -> ExportResult<PathBuf> {
    let path = dir.join(name);
    let mut writer = csv::Writer::from_path(&path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(path)
}

/// 导出已提交计划
///
/// # 返回
/// 写出的文件路径列表
pub fn export_plan(plan: &PlanResult, dir: &Path) -> ExportResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let records = &plan.records;

    let mut written = vec![
        write_csv(dir, "production.csv", &records.production)?,
        write_csv(dir, "shipments.csv", &records.shipments)?,
        write_csv(dir, "truck_loads.csv", &records.truck_loads)?,
        write_csv(dir, "inventory.csv", &records.inventory)?,
        write_csv(dir, "transitions.csv", &records.transitions)?,
        write_csv(dir, "consumption.csv", &records.consumption)?,
        write_csv(dir, "shortfalls.csv", &records.shortfalls)?,
        write_csv(dir, "expired.csv", &records.expired)?,
        write_csv(dir, "labor.csv", &records.labor)?,
    ];

    let daily: Vec<DailyCostRow> = records
        .daily_costs
        .iter()
        .map(|(date, cost)| DailyCostRow::new(*date, cost))
        .collect();
    written.push(write_csv(dir, "daily_costs.csv", &daily)?);

    let summary_path = dir.join("summary.json");
    fs::write(&summary_path, serde_json::to_string_pretty(&PlanSummary::of(plan))?)?;
    written.push(summary_path);

    info!(dir = %dir.display(), files = written.len(), "计划导出完成");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::solution::{PlanRecords, ProductionRecord};

    #[test]
    fn test_export_writes_csv_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let mut records = PlanRecords::default();
        records.production.push(ProductionRecord {
            node: "M1".into(),
            product: "P1".into(),
            date,
            quantity: 120.0,
        });
        let plan = PlanResult {
            run_id: "run-1".into(),
            start: date,
            end: date,
            windows: Vec::new(),
            records,
            cost: CostBreakdown::default(),
        };

        let files = export_plan(&plan, dir.path()).unwrap();
        assert_eq!(files.len(), 11);

        let production = fs::read_to_string(dir.path().join("production.csv")).unwrap();
        assert!(production.starts_with("node,product,date,quantity"));
        assert!(production.contains("M1,P1,2025-06-01,120"));

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("summary.json")).unwrap()).unwrap();
        assert_eq!(summary["total_production"], 120.0);
        assert_eq!(summary["run_id"], "run-1");
    }
}
