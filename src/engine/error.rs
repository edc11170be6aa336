// ==========================================
// 冷链产销排产系统 - 引擎层错误类型
// ==========================================
// 说明: 建模错误在求解前报告; 窗口失败时报告窗口序号与日期范围
// ==========================================

use crate::domain::error::ModelError;
use crate::solver::{SolverError, SolverStatus};
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanningError {
    #[error("建模数据错误: {0}")]
    Model(#[from] ModelError),

    #[error("求解器错误: {0}")]
    Solver(#[from] SolverError),

    #[error("滚动配置非法: {0}")]
    InvalidRollingConfig(String),

    #[error("提交天数 {committed_days} 不是 7 的整数倍（窗口 {window_size} 天, 重叠 {overlap} 天）,与周度车辆/人工周期不对齐")]
    UnalignedCommitment {
        window_size: u32,
        overlap: u32,
        committed_days: u32,
    },

    #[error("第 {index} 个窗口 [{start} ~ {end}] 求解失败: {status}")]
    WindowFailed {
        index: usize,
        start: NaiveDate,
        end: NaiveDate,
        status: SolverStatus,
    },

    #[error("计划区间非法: start={start}, end={end}")]
    InvalidHorizon { start: NaiveDate, end: NaiveDate },
}

pub type PlanningResult<T> = Result<T, PlanningError>;
