// ==========================================
// 冷链产销排产系统 - 建模数据错误类型
// ==========================================
// 用途: 输入数据不一致时立即报告,不尝试部分求解
// 工具: thiserror 派生宏
// ==========================================

use crate::domain::types::StorageState;
use chrono::NaiveDate;
use thiserror::Error;

/// 建模（数据校验）错误类型
#[derive(Error, Debug)]
pub enum ModelError {
    // ===== 标识相关错误 =====
    #[error("重复的{kind}标识: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("{context} 引用了未知节点: {node}")]
    UnknownNode { context: String, node: String },

    #[error("{context} 引用了未知产品: {product}")]
    UnknownProduct { context: String, product: String },

    // ===== 网络能力错误 =====
    #[error("路线 {route} 以 {state} 状态从节点 {node} 发出,但该节点不具备此存储能力")]
    RouteOriginLacksStorage {
        route: String,
        node: String,
        state: StorageState,
    },

    #[error("路线 {route} 的目的节点 {node} 无法存储任何状态的库存")]
    RouteDestinationLacksStorage { route: String, node: String },

    #[error("路线 {route} 的起点与终点相同: {node}")]
    SelfLoopRoute { route: String, node: String },

    #[error("节点 {node} 的生产能力声明与生产参数不一致: {message}")]
    ManufacturingMismatch { node: String, message: String },

    #[error("节点 {node} 不支持 {state} 状态库存（{context}）")]
    UnsupportedState {
        node: String,
        state: StorageState,
        context: String,
    },

    #[error("车辆 {truck} 的线路 {origin} → {destination} 没有对应的运输路线")]
    TruckWithoutRoute {
        truck: String,
        origin: String,
        destination: String,
    },

    // ===== 日历与数值错误 =====
    #[error("人工日历缺少日期 {date}（节点 {node} 具备生产能力）")]
    MissingLaborDay { node: String, date: NaiveDate },

    #[error("{context} 数值非法: {value}")]
    InvalidQuantity { context: String, value: f64 },

    #[error("计划窗口非法: start={start}, end={end}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    // ===== 数据文件错误 =====
    #[error("数据文件读取失败: {0}")]
    DataFile(String),

    #[error("JSON 解析失败: {0}")]
    JsonParse(String),

    #[error("CSV 解析失败 (行 {row}): {message}")]
    CsvParse { row: usize, message: String },
}

impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        ModelError::DataFile(err.to_string())
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::JsonParse(err.to_string())
    }
}

impl From<csv::Error> for ModelError {
    fn from(err: csv::Error) -> Self {
        let row = err
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(0);
        ModelError::CsvParse {
            row,
            message: err.to_string(),
        }
    }
}

/// Result 类型别名
pub type ModelResult<T> = Result<T, ModelError>;
