// ==========================================
// 冷链产销排产系统 - 带墙钟时限的求解调度
// ==========================================
// 职责: 在独立线程上运行阻塞后端,超出时限按"超时"终止处理
// 红线: 超时不是挂起; 有可行提示解时作为 incumbent 返回,并明确标记为超时
// 说明: 原生时限后端在时限处自行返回,线程随之结束; 墙钟等待只多留一段余量
// ==========================================

use crate::solver::backend::{BackendSolution, SolverBackend, SolverStatus};
use crate::solver::config::SolverConfig;
use crate::solver::error::{SolverError, SolverResult};
use crate::solver::model::MipModel;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// 原生时限后端的墙钟等待余量
const NATIVE_LIMIT_GRACE: Duration = Duration::from_secs(2);

/// 提交模型并等待终止（最优/超时/不可行）
///
/// 墙钟超时后后台线程不再被等待,其结果被丢弃
pub async fn solve_with_deadline(
    backend: Arc<dyn SolverBackend>,
    model: Arc<MipModel>,
    hints: Arc<Vec<Option<f64>>>,
    config: SolverConfig,
) -> SolverResult<BackendSolution> {
    config.validate()?;
    backend.check_config(&config)?;

    if let Some(reason) = model.trivially_infeasible() {
        debug!(reason, "模型在构建阶段已不可行,跳过后端调用");
        return Ok(BackendSolution::infeasible());
    }

    let started = Instant::now();
    let (tx, rx) = oneshot::channel();
    let worker_backend = Arc::clone(&backend);
    let worker_model = Arc::clone(&model);
    let worker_hints = Arc::clone(&hints);
    let worker_config = config.clone();

    thread::Builder::new()
        .name("mip-solver".into())
        .spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                worker_backend.solve(&worker_model, &worker_hints, &worker_config)
            }));
            let _ = tx.send(outcome.unwrap_or(Err(SolverError::WorkerLost)));
        })
        .map_err(|e| SolverError::Backend {
            backend: backend.name().to_string(),
            message: format!("无法启动求解线程: {}", e),
        })?;

    let wait = if backend.enforces_time_limit() {
        config.time_limit() + NATIVE_LIMIT_GRACE
    } else {
        config.time_limit()
    };

    match tokio::time::timeout(wait, rx).await {
        Ok(Ok(result)) => {
            if let Ok(solution) = &result {
                info!(
                    backend = backend.name(),
                    status = %solution.status,
                    objective = ?solution.objective,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "求解完成"
                );
            }
            match result {
                Ok(solution) if solution.status == SolverStatus::TimeLimitNoSolution => {
                    Ok(hint_incumbent(&model, &hints, &config))
                }
                other => other,
            }
        }
        Ok(Err(_)) => Err(SolverError::WorkerLost),
        Err(_) => {
            warn!(
                backend = backend.name(),
                time_limit_secs = config.time_limit_secs,
                native_limit = backend.enforces_time_limit(),
                "求解超时,后台线程结果将被丢弃"
            );
            Ok(hint_incumbent(&model, &hints, &config))
        }
    }
}

/// 超时兜底: 提示解（缺失项取 0）可行时作为 incumbent
pub fn hint_incumbent(model: &MipModel, hints: &[Option<f64>], config: &SolverConfig) -> BackendSolution {
    if hints.len() != model.num_vars() || hints.iter().all(Option::is_none) {
        return BackendSolution::no_solution(SolverStatus::TimeLimitNoSolution);
    }
    let values: Vec<f64> = hints.iter().map(|h| h.unwrap_or(0.0)).collect();
    match model.check_feasibility(&values, config.feasibility_tolerance) {
        None => {
            let objective = model.objective_value(&values);
            info!(objective, "超时: 使用可行的热启动提示作为 incumbent");
            BackendSolution {
                status: SolverStatus::TimeLimitFeasible,
                objective: Some(objective),
                values: Some(values),
                gap: None,
            }
        }
        Some(violation) => {
            debug!(what = %violation.what, "热启动提示不可行,无 incumbent");
            BackendSolution::no_solution(SolverStatus::TimeLimitNoSolution)
        }
    }
}
