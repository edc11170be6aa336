// ==========================================
// ConfigManager 集成测试
// ==========================================
// 测试目标: 验证计划参数的读取/保存/快照恢复与容错
// ==========================================


use cold_chain_aps::config::{config_keys, ConfigManager, PlannerConfigReader, PlannerSettings};
use cold_chain_aps::engine::LowOverlapAction;
use test_helpers::create_test_db;

#[tokio::test]
async fn test_empty_db_yields_defaults() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    let settings = config_manager.get_planner_settings().await.unwrap();
    let defaults = PlannerSettings::default();
    assert_eq!(settings.rolling.window_size_days, defaults.rolling.window_size_days);
    assert_eq!(settings.rolling.overlap_days, defaults.rolling.overlap_days);
    assert_eq!(settings.solver.time_limit_secs, defaults.solver.time_limit_secs);
    assert_eq!(settings.model, defaults.model);
    assert_eq!(settings.rolling.warmstart.on_low_overlap, LowOverlapAction::Proceed);
}

#[tokio::test]
async fn test_save_and_reload_planner_settings() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    let mut settings = PlannerSettings::default();
    settings.rolling.window_size_days = 21;
    settings.rolling.overlap_days = 7;
    settings.rolling.retry_with_shortfall = true;
    settings.rolling.warmstart.on_low_overlap = LowOverlapAction::ColdStart;
    settings.solver.time_limit_secs = 45.0;
    settings.solver.mip_gap = 0.02;
    settings.model.allow_shortfall = true;
    config_manager.save_planner_settings(&settings).unwrap();

    // 新连接读取
    let reopened = ConfigManager::new(&db_path).expect("Failed to reopen ConfigManager");
    let loaded = reopened.get_planner_settings().await.unwrap();
    assert_eq!(loaded.rolling.window_size_days, 21);
    assert_eq!(loaded.rolling.overlap_days, 7);
    assert!(loaded.rolling.retry_with_shortfall);
    assert_eq!(loaded.rolling.warmstart.on_low_overlap, LowOverlapAction::ColdStart);
    assert_eq!(loaded.solver.time_limit_secs, 45.0);
    assert_eq!(loaded.solver.mip_gap, 0.02);
    assert!(loaded.model.allow_shortfall);
    assert!(loaded.validate().is_ok());
}

#[tokio::test]
async fn test_malformed_values_fall_back_to_defaults() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    config_manager
        .set_global_config_value(config_keys::ROLLING_WINDOW_SIZE_DAYS, "fourteen")
        .unwrap();
    config_manager
        .set_global_config_value(config_keys::MODEL_ALLOW_SHORTFALL, "maybe")
        .unwrap();
    config_manager
        .set_global_config_value(config_keys::SOLVER_MIP_GAP, "-1")
        .unwrap();

    let rolling = config_manager.get_rolling_config().await.unwrap();
    assert_eq!(rolling.window_size_days, 14);

    let model = config_manager.get_model_options().await.unwrap();
    assert!(!model.allow_shortfall);

    // 非法求解参数整体回退
    let solver = config_manager.get_solver_config().await.unwrap();
    assert_eq!(solver.mip_gap, 0.01);
}

#[tokio::test]
async fn test_unaligned_rolling_config_is_read_then_rejected() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");
    config_manager
        .set_global_config_value(config_keys::ROLLING_OVERLAP_DAYS, "5")
        .unwrap();

    let settings = config_manager.get_planner_settings().await.unwrap();
    assert_eq!(settings.rolling.overlap_days, 5);
    assert!(settings.validate().is_err());

    config_manager
        .set_global_config_value(config_keys::ROLLING_ALLOW_UNALIGNED, "true")
        .unwrap();
    let settings = config_manager.get_planner_settings().await.unwrap();
    assert!(settings.validate().is_ok());
}

#[tokio::test]
async fn test_snapshot_restore_roundtrip() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    config_manager
        .set_global_config_value(config_keys::SOLVER_TIME_LIMIT_SECS, "30")
        .unwrap();
    let snapshot = config_manager.get_config_snapshot().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
    assert_eq!(parsed[config_keys::SOLVER_TIME_LIMIT_SECS], "30");

    config_manager
        .set_global_config_value(config_keys::SOLVER_TIME_LIMIT_SECS, "90")
        .unwrap();

    let mut with_meta: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&snapshot).unwrap();
    with_meta.insert("__meta_run_id".into(), serde_json::Value::String("run-1".into()));
    let restored = config_manager
        .restore_config_from_snapshot(&serde_json::Value::Object(with_meta).to_string())
        .unwrap();
    assert_eq!(restored, 1);

    assert_eq!(
        config_manager
            .get_global_config_value(config_keys::SOLVER_TIME_LIMIT_SECS)
            .unwrap()
            .as_deref(),
        Some("30")
    );
    assert!(config_manager
        .get_global_config_value("__meta_run_id")
        .unwrap()
        .is_none());
    assert_eq!(config_manager.get_solver_config().await.unwrap().time_limit_secs, 30.0);
}
