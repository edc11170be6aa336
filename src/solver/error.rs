// ==========================================
// 冷链产销排产系统 - 求解器错误类型
// ==========================================
// 说明: 不可行/超时属于求解状态,不是错误
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("求解后端 {backend} 失败: {message}")]
    Backend { backend: String, message: String },

    #[error("模型无界（检查目标函数系数）")]
    Unbounded,

    #[error("求解线程异常退出")]
    WorkerLost,

    #[error("求解配置非法: {0}")]
    InvalidConfig(String),
}

pub type SolverResult<T> = Result<T, SolverError>;
