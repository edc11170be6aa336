// ==========================================
// 冷链产销排产系统 - 命令行入口
// ==========================================
// 用法:
//   cold-chain-aps solve <scenario.json> <start> <end>
//       [--window N] [--overlap N] [--time-limit S] [--gap G]
//       [--demand FILE.csv] [--config DB] [--export DIR] [--allow-unaligned]
// 说明: 任一窗口失败时以非零码退出
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use cold_chain_aps::config::{ConfigManager, PlannerConfigReader, PlannerSettings};
use cold_chain_aps::domain::{PlanningContext, PlanningData};
use cold_chain_aps::engine::{RollingPlanner, WindowSolver};
use cold_chain_aps::{export, logging};
use std::path::PathBuf;

const USAGE: &str = "用法: cold-chain-aps solve <scenario.json> <start YYYY-MM-DD> <end YYYY-MM-DD> \
[--window N] [--overlap N] [--time-limit S] [--gap G] [--demand FILE.csv] [--config DB] [--export DIR] [--allow-unaligned]";

#[derive(Debug, Default)]
struct SolveArgs {
    scenario: PathBuf,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    window: Option<u32>,
    overlap: Option<u32>,
    time_limit: Option<f64>,
    gap: Option<f64>,
    demand: Option<PathBuf>,
    config_db: Option<String>,
    export_dir: Option<PathBuf>,
    allow_unaligned: bool,
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("日期格式错误: {}", raw))
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<SolveArgs> {
    match args.next().as_deref() {
        Some("solve") => {}
        Some(other) => bail!("未知命令: {}\n{}", other, USAGE),
        None => bail!("{}", USAGE),
    }

    let mut parsed = SolveArgs::default();
    let mut positional = Vec::new();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().ok_or_else(|| anyhow!("{} 缺少参数值", flag));
        match arg.as_str() {
            "--window" => parsed.window = Some(value("--window")?.parse().context("--window")?),
            "--overlap" => parsed.overlap = Some(value("--overlap")?.parse().context("--overlap")?),
            "--time-limit" => parsed.time_limit = Some(value("--time-limit")?.parse().context("--time-limit")?),
            "--gap" => parsed.gap = Some(value("--gap")?.parse().context("--gap")?),
            "--demand" => parsed.demand = Some(PathBuf::from(value("--demand")?)),
            "--config" => parsed.config_db = Some(value("--config")?),
            "--export" => parsed.export_dir = Some(PathBuf::from(value("--export")?)),
            "--allow-unaligned" => parsed.allow_unaligned = true,
            flag if flag.starts_with("--") => bail!("未知参数: {}\n{}", flag, USAGE),
            _ => positional.push(arg.clone()),
        }
    }

    let [scenario, start, end]: [String; 3] = positional
        .try_into()
        .map_err(|_| anyhow!("需要 3 个位置参数\n{}", USAGE))?;
    parsed.scenario = PathBuf::from(scenario);
    parsed.start = Some(parse_date(&start)?);
    parsed.end = Some(parse_date(&end)?);
    Ok(parsed)
}

async fn load_settings(args: &SolveArgs) -> Result<PlannerSettings> {
    let mut settings = match &args.config_db {
        Some(path) => {
            let manager = ConfigManager::new(path).map_err(|e| anyhow!("配置库打开失败: {}", e))?;
            manager
                .get_planner_settings()
                .await
                .map_err(|e| anyhow!("配置读取失败: {}", e))?
        }
        None => PlannerSettings::default(),
    };

    if let Some(window) = args.window {
        settings.rolling.window_size_days = window;
    }
    if let Some(overlap) = args.overlap {
        settings.rolling.overlap_days = overlap;
    }
    if let Some(limit) = args.time_limit {
        settings.solver.time_limit_secs = limit;
    }
    if let Some(gap) = args.gap {
        settings.solver.mip_gap = gap;
    }
    if args.allow_unaligned {
        settings.rolling.allow_unaligned = true;
    }
    settings.validate()?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args = parse_args(std::env::args().skip(1))?;
    let (Some(start), Some(end)) = (args.start, args.end) else {
        bail!("{}", USAGE);
    };
    let settings = load_settings(&args).await?;

    tracing::info!("==================================================");
    tracing::info!("{} v{}", cold_chain_aps::APP_NAME, cold_chain_aps::VERSION);
    tracing::info!("==================================================");

    let data = PlanningData::load_json(&args.scenario)
        .with_context(|| format!("场景文件加载失败: {}", args.scenario.display()))?;
    let mut ctx = PlanningContext::new(data)?;
    if let Some(path) = &args.demand {
        let demand = PlanningData::load_demand_csv(path)
            .with_context(|| format!("需求表加载失败: {}", path.display()))?;
        ctx = ctx.with_demand(demand)?;
    }

    let solver = WindowSolver::with_default_backend(settings.solver.clone());
    let planner = RollingPlanner::new(solver, settings.rolling.clone(), settings.model.clone());
    let plan = planner.execute(&ctx, start, end).await?;

    if let Some(dir) = &args.export_dir {
        export::export_plan(&plan, dir)?;
    }

    for outcome in &plan.windows {
        println!(
            "window {:>3} [{} ~ {}] {:?} status={} objective={}",
            outcome.window.index,
            outcome.window.start,
            outcome.window.end,
            outcome.state,
            outcome.status.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
            outcome
                .objective
                .map(|o| format!("{:.2}", o))
                .unwrap_or_else(|| "-".into()),
        );
    }
    println!(
        "run_id={} committed={}/{} total_cost={:.2} shortfall={:.2}",
        plan.run_id,
        plan.committed_windows(),
        plan.windows.len(),
        plan.cost.total(),
        plan.records.total_shortfall()
    );

    plan.into_result()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> impl Iterator<Item = String> {
        raw.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_solve_args() {
        let parsed = parse_args(args(&[
            "solve",
            "scenario.json",
            "2025-06-01",
            "2025-06-28",
            "--window",
            "21",
            "--gap",
            "0.05",
        ]))
        .unwrap();
        assert_eq!(parsed.scenario, PathBuf::from("scenario.json"));
        assert_eq!(parsed.window, Some(21));
        assert_eq!(parsed.gap, Some(0.05));
        assert_eq!(parsed.end, NaiveDate::from_ymd_opt(2025, 6, 28));
    }

    #[test]
    fn test_parse_rejects_missing_positionals() {
        assert!(parse_args(args(&["solve", "scenario.json"])).is_err());
        assert!(parse_args(args(&["plan"])).is_err());
    }
}
