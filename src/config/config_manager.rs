// ==========================================
// 冷链产销排产系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写、快照与恢复
// 存储: config_kv 表 (key-value + scope)
// 说明: 缺失或格式错误的配置项回退默认值并告警
// ==========================================

use crate::config::error::ConfigError;
use crate::config::planner_config_trait::PlannerConfigReader;
use crate::config::settings::PlannerSettings;
use crate::db::{default_config_db_path, init_config_schema, open_sqlite_connection};
use crate::engine::rolling::RollingConfig;
use crate::engine::warmstart::{LowOverlapAction, WarmstartPolicy};
use crate::engine::window::ModelOptions;
use crate::solver::SolverConfig;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    pub const SOLVER_TIME_LIMIT_SECS: &str = "solver.time_limit_secs";
    pub const SOLVER_MIP_GAP: &str = "solver.mip_gap";
    pub const SOLVER_THREADS: &str = "solver.threads";
    pub const SOLVER_USE_HINTS: &str = "solver.use_hints";
    pub const SOLVER_FEASIBILITY_TOLERANCE: &str = "solver.feasibility_tolerance";

    pub const ROLLING_WINDOW_SIZE_DAYS: &str = "rolling.window_size_days";
    pub const ROLLING_OVERLAP_DAYS: &str = "rolling.overlap_days";
    pub const ROLLING_ALLOW_UNALIGNED: &str = "rolling.allow_unaligned";
    pub const ROLLING_RETRY_WITH_SHORTFALL: &str = "rolling.retry_with_shortfall";

    pub const WARMSTART_ENABLED: &str = "warmstart.enabled";
    pub const WARMSTART_MIN_OVERLAP_RATIO: &str = "warmstart.min_overlap_ratio";
    pub const WARMSTART_ON_LOW_OVERLAP: &str = "warmstart.on_low_overlap";

    pub const MODEL_ALLOW_SHORTFALL: &str = "model.allow_shortfall";
    pub const MODEL_ENFORCE_TRUCK_TIMING: &str = "model.enforce_truck_timing";
    pub const MODEL_ALLOW_IN_NODE_TRANSITIONS: &str = "model.allow_in_node_transitions";
    pub const MODEL_ENFORCE_STORAGE_CAPACITY: &str = "model.enforce_storage_capacity";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例（自动建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        init_config_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 打开用户数据目录下的默认配置库
    pub fn open_default() -> Result<Self, Box<dyn Error>> {
        let path = default_config_db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::from)?;
        }
        Self::new(&path.to_string_lossy())
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA 并建表（幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| ConfigError::Lock(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
            init_config_schema(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| ConfigError::Lock(e.to_string()))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| ConfigError::Lock(e.to_string()))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析配置值; 缺失返回默认值,解析失败告警后返回默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(value) => Ok(value),
                Err(_) => {
                    tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }

    fn get_bool_or_default(&self, key: &str, default: bool) -> Result<bool, Box<dyn Error>> {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => {
                    tracing::warn!(config_key = key, raw_value = %raw, "布尔配置格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }

    /// 将整组计划参数写入 config_kv
    pub fn save_planner_settings(&self, settings: &PlannerSettings) -> Result<(), Box<dyn Error>> {
        settings.validate()?;
        let solver = &settings.solver;
        let rolling = &settings.rolling;
        let model = &settings.model;
        let on_low_overlap = match rolling.warmstart.on_low_overlap {
            LowOverlapAction::Proceed => "PROCEED",
            LowOverlapAction::ColdStart => "COLD_START",
        };

        let entries: Vec<(&str, String)> = vec![
            (config_keys::SOLVER_TIME_LIMIT_SECS, solver.time_limit_secs.to_string()),
            (config_keys::SOLVER_MIP_GAP, solver.mip_gap.to_string()),
            (config_keys::SOLVER_THREADS, solver.threads.to_string()),
            (config_keys::SOLVER_USE_HINTS, solver.use_hints.to_string()),
            (
                config_keys::SOLVER_FEASIBILITY_TOLERANCE,
                solver.feasibility_tolerance.to_string(),
            ),
            (config_keys::ROLLING_WINDOW_SIZE_DAYS, rolling.window_size_days.to_string()),
            (config_keys::ROLLING_OVERLAP_DAYS, rolling.overlap_days.to_string()),
            (config_keys::ROLLING_ALLOW_UNALIGNED, rolling.allow_unaligned.to_string()),
            (
                config_keys::ROLLING_RETRY_WITH_SHORTFALL,
                rolling.retry_with_shortfall.to_string(),
            ),
            (config_keys::WARMSTART_ENABLED, rolling.warmstart.enabled.to_string()),
            (
                config_keys::WARMSTART_MIN_OVERLAP_RATIO,
                rolling.warmstart.min_overlap_ratio.to_string(),
            ),
            (config_keys::WARMSTART_ON_LOW_OVERLAP, on_low_overlap.to_string()),
            (config_keys::MODEL_ALLOW_SHORTFALL, model.allow_shortfall.to_string()),
            (config_keys::MODEL_ENFORCE_TRUCK_TIMING, model.enforce_truck_timing.to_string()),
            (
                config_keys::MODEL_ALLOW_IN_NODE_TRANSITIONS,
                model.allow_in_node_transitions.to_string(),
            ),
            (
                config_keys::MODEL_ENFORCE_STORAGE_CAPACITY,
                model.enforce_storage_capacity.to_string(),
            ),
        ];

        let mut conn = self.conn.lock().map_err(|e| ConfigError::Lock(e.to_string()))?;
        let tx = conn.transaction()?;
        for (key, value) in &entries {
            tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式,按键排序）
    ///
    /// # 用途
    /// - 计划运行时记录所用参数
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| ConfigError::Lock(e.to_string()))?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 覆盖现有的 global 配置; `__meta_` 前缀的元信息不回写
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> Result<usize, Box<dyn Error>> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json).map_err(ConfigError::from)?;

        let mut conn = self.conn.lock().map_err(|e| ConfigError::Lock(e.to_string()))?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            if key.starts_with("__meta_") {
                continue;
            }
            let affected = tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
                params![key, value],
            )?;
            count += affected;
        }

        tx.commit()?;
        Ok(count)
    }
}

// ==========================================
// PlannerConfigReader Trait 实现
// ==========================================
#[async_trait]
impl PlannerConfigReader for ConfigManager {
    async fn get_solver_config(&self) -> Result<SolverConfig, Box<dyn Error>> {
        let defaults = SolverConfig::default();
        let config = SolverConfig {
            time_limit_secs: self.get_parsed_or_default(config_keys::SOLVER_TIME_LIMIT_SECS, defaults.time_limit_secs)?,
            mip_gap: self.get_parsed_or_default(config_keys::SOLVER_MIP_GAP, defaults.mip_gap)?,
            threads: self.get_parsed_or_default(config_keys::SOLVER_THREADS, defaults.threads)?,
            use_hints: self.get_bool_or_default(config_keys::SOLVER_USE_HINTS, defaults.use_hints)?,
            feasibility_tolerance: self.get_parsed_or_default(
                config_keys::SOLVER_FEASIBILITY_TOLERANCE,
                defaults.feasibility_tolerance,
            )?,
        };
        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "求解配置非法，使用默认值");
            return Ok(defaults);
        }
        Ok(config)
    }

    async fn get_rolling_config(&self) -> Result<RollingConfig, Box<dyn Error>> {
        let defaults = RollingConfig::default();
        let on_low_overlap = match self
            .get_config_value(config_keys::WARMSTART_ON_LOW_OVERLAP)?
            .map(|v| v.trim().to_uppercase())
            .as_deref()
        {
            Some("COLD_START") => LowOverlapAction::ColdStart,
            Some("PROCEED") | None => LowOverlapAction::Proceed,
            Some(other) => {
                tracing::warn!(config_key = config_keys::WARMSTART_ON_LOW_OVERLAP, raw_value = %other, "配置格式错误，使用默认值");
                defaults.warmstart.on_low_overlap
            }
        };

        // 对齐校验交给 RollingConfig::validate,此处只负责读取
        Ok(RollingConfig {
            window_size_days: self
                .get_parsed_or_default(config_keys::ROLLING_WINDOW_SIZE_DAYS, defaults.window_size_days)?,
            overlap_days: self.get_parsed_or_default(config_keys::ROLLING_OVERLAP_DAYS, defaults.overlap_days)?,
            allow_unaligned: self.get_bool_or_default(config_keys::ROLLING_ALLOW_UNALIGNED, defaults.allow_unaligned)?,
            retry_with_shortfall: self.get_bool_or_default(
                config_keys::ROLLING_RETRY_WITH_SHORTFALL,
                defaults.retry_with_shortfall,
            )?,
            warmstart: WarmstartPolicy {
                enabled: self.get_bool_or_default(config_keys::WARMSTART_ENABLED, defaults.warmstart.enabled)?,
                min_overlap_ratio: self.get_parsed_or_default(
                    config_keys::WARMSTART_MIN_OVERLAP_RATIO,
                    defaults.warmstart.min_overlap_ratio,
                )?,
                on_low_overlap,
            },
        })
    }

    async fn get_model_options(&self) -> Result<ModelOptions, Box<dyn Error>> {
        let defaults = ModelOptions::default();
        Ok(ModelOptions {
            allow_shortfall: self.get_bool_or_default(config_keys::MODEL_ALLOW_SHORTFALL, defaults.allow_shortfall)?,
            enforce_truck_timing: self
                .get_bool_or_default(config_keys::MODEL_ENFORCE_TRUCK_TIMING, defaults.enforce_truck_timing)?,
            allow_in_node_transitions: self.get_bool_or_default(
                config_keys::MODEL_ALLOW_IN_NODE_TRANSITIONS,
                defaults.allow_in_node_transitions,
            )?,
            enforce_storage_capacity: self.get_bool_or_default(
                config_keys::MODEL_ENFORCE_STORAGE_CAPACITY,
                defaults.enforce_storage_capacity,
            )?,
        })
    }
}
