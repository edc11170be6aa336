// ==========================================
// 冷链产销排产系统 - 生产与换产约束
// ==========================================
// 职责: 生产量/开工标识/产品启动检测/工时占用
// 红线: 启动只在 0→1 跳变时计数（start ≥ on[t] - on[t-1]）,持续生产与停机都不计数
// 说明: 启动次数与是否开工预聚合为 (节点, 日期) 上的两个辅助变量
// ==========================================

use crate::domain::error::{ModelError, ModelResult};
use crate::engine::builder::ModelBuilder;
use crate::engine::var_key::VarKey;
use crate::solver::model::{LinearExpr, Sense, VarId};
use chrono::NaiveDate;
use std::collections::HashMap;

/// 各 (节点, 产品, 日期) 的生产变量及 (节点, 日期) 的工时/开工变量
#[derive(Debug, Default)]
pub struct ProductionVars {
    pub production: HashMap<(String, String, NaiveDate), VarId>,
    pub hours: HashMap<(String, NaiveDate), VarId>,
    pub any: HashMap<(String, NaiveDate), VarId>,
}

impl ProductionVars {
    pub fn production(&self, node: &str, product: &str, date: NaiveDate) -> Option<VarId> {
        self.production
            .get(&(node.to_string(), product.to_string(), date))
            .copied()
    }
}

/// 添加全部生产节点的生产变量与工时约束
pub fn add_production(b: &mut ModelBuilder<'_>) -> ModelResult<ProductionVars> {
    let ctx = b.ctx;
    let window = b.window();
    let costs = ctx.costs();
    let mut vars = ProductionVars::default();

    for (node, spec) in ctx.network().manufacturing_nodes() {
        let rate = spec.production_rate_per_hour;
        let mut previous_on: HashMap<&str, Option<VarId>> = HashMap::new();

        for date in window.dates() {
            let labor = ctx.labor().get(date).ok_or_else(|| ModelError::MissingLaborDay {
                node: node.id.clone(),
                date,
            })?;
            let available = labor.available_hours();
            let big_m = rate * available;

            let mut starts = Vec::with_capacity(ctx.products().len());
            let mut ons = Vec::with_capacity(ctx.products().len());
            let mut hours_expr = LinearExpr::new();

            for product in ctx.products() {
                let prod = b.continuous(
                    VarKey::Production {
                        node: node.id.clone(),
                        product: product.id.clone(),
                        date,
                    },
                    Some(big_m),
                    product.production_cost_per_unit,
                );
                let on = b.binary(
                    VarKey::Produced {
                        node: node.id.clone(),
                        product: product.id.clone(),
                        date,
                    },
                    0.0,
                );
                let start = b.binary(
                    VarKey::ProductStart {
                        node: node.id.clone(),
                        product: product.id.clone(),
                        date,
                    },
                    costs.changeover_cost_per_start,
                );

                // 生产量仅在开工标识为 1 时可为正
                b.constrain(
                    "production_link",
                    LinearExpr::term(prod, 1.0).with_term(on, -big_m),
                    Sense::Le,
                    0.0,
                );

                // 启动检测: start ≥ on[t] - on[t-1]; start ≤ on[t]; start ≤ 1 - on[t-1]
                let prev = previous_on.get(product.id.as_str()).copied().flatten();
                match prev {
                    Some(prev_on) => {
                        b.constrain(
                            "start_detect",
                            LinearExpr::term(start, 1.0).with_term(on, -1.0).with_term(prev_on, 1.0),
                            Sense::Ge,
                            0.0,
                        );
                        b.constrain(
                            "start_upper",
                            LinearExpr::term(start, 1.0).with_term(prev_on, 1.0),
                            Sense::Le,
                            1.0,
                        );
                    }
                    None => {
                        let carried = if b.inputs.was_producing(&node.id, &product.id) {
                            1.0
                        } else {
                            0.0
                        };
                        b.constrain(
                            "start_detect",
                            LinearExpr::term(start, 1.0).with_term(on, -1.0),
                            Sense::Ge,
                            -carried,
                        );
                        b.constrain("start_upper", LinearExpr::term(start, 1.0), Sense::Le, 1.0 - carried);
                    }
                }
                b.constrain(
                    "start_upper",
                    LinearExpr::term(start, 1.0).with_term(on, -1.0),
                    Sense::Le,
                    0.0,
                );

                previous_on.insert(product.id.as_str(), Some(on));
                hours_expr.add_term(prod, 1.0 / rate);
                vars.production
                    .insert((node.id.clone(), product.id.clone(), date), prod);
                starts.push(start);
                ons.push(on);
            }

            // 辅助变量: 启动次数 / 是否开工 / 换产次数
            let start_count = b.integer(
                VarKey::StartCount {
                    node: node.id.clone(),
                    date,
                },
                starts.len() as f64,
            );
            let mut count_expr = LinearExpr::term(start_count, 1.0);
            for &start in &starts {
                count_expr.add_term(start, -1.0);
            }
            b.constrain("start_count", count_expr, Sense::Eq, 0.0);

            let any = b.binary(
                VarKey::AnyProduction {
                    node: node.id.clone(),
                    date,
                },
                0.0,
            );
            let mut any_upper = LinearExpr::term(any, 1.0);
            for &on in &ons {
                b.constrain("any_lower", LinearExpr::term(any, 1.0).with_term(on, -1.0), Sense::Ge, 0.0);
                any_upper.add_term(on, -1.0);
            }
            b.constrain("any_upper", any_upper, Sense::Le, 0.0);

            let changeovers = b.continuous(
                VarKey::ChangeoverCount {
                    node: node.id.clone(),
                    date,
                },
                None,
                0.0,
            );
            b.constrain(
                "changeover_count",
                LinearExpr::term(changeovers, 1.0)
                    .with_term(start_count, -1.0)
                    .with_term(any, 1.0),
                Sense::Ge,
                0.0,
            );

            // 工时占用 = Σ 产量/速率 + (开机+停机)·开工 + 换产时间·换产次数
            let hours = b.continuous(
                VarKey::LaborHours {
                    node: node.id.clone(),
                    date,
                },
                None,
                0.0,
            );
            hours_expr.add_term(any, spec.fixed_overhead_hours());
            hours_expr.add_term(changeovers, spec.changeover_hours);
            let mut balance = LinearExpr::term(hours, 1.0);
            balance.add_expr(&hours_expr, -1.0);
            b.constrain("hours_used", balance, Sense::Eq, 0.0);
            b.constrain("capacity", LinearExpr::term(hours, 1.0), Sense::Le, available);

            vars.hours.insert((node.id.clone(), date), hours);
            vars.any.insert((node.id.clone(), date), any);
        }
    }

    Ok(vars)
}

/// 按开工序列统计启动次数（与约束语义一致的参考实现）
///
/// # 参数
/// - was_producing: 序列前一日是否在产
/// - pattern: 按日期顺序的开工标识
pub fn count_starts(was_producing: bool, pattern: &[bool]) -> usize {
    let mut previous = was_producing;
    let mut starts = 0;
    for &on in pattern {
        if on && !previous {
            starts += 1;
        }
        previous = on;
    }
    starts
}
