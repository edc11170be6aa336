// ==========================================
// 冷链产销排产系统 - 配置层错误类型
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置值非法: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("配置校验失败: {0}")]
    Invalid(String),

    #[error("锁获取失败: {0}")]
    Lock(String),

    #[error("数据库错误: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("文件错误: {0}")]
    Io(#[from] std::io::Error),
}
