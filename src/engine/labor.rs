// ==========================================
// 冷链产销排产系统 - 人工成本约束（分段）
// ==========================================
// 固定日: 额度内工时 × 正常费率 + 超额工时 × 加班费率,
//         二元门控保证额度用满前加班为 0
// 非固定日: 支付工时 ≥ max(使用工时, 4h × 是否开工),成本 = 费率 × 支付工时
// ==========================================

use crate::domain::error::{ModelError, ModelResult};
use crate::engine::builder::ModelBuilder;
use crate::engine::production::ProductionVars;
use crate::engine::var_key::VarKey;
use crate::solver::model::{LinearExpr, Sense};

pub fn add_labor(b: &mut ModelBuilder<'_>, production: &ProductionVars) -> ModelResult<()> {
    let ctx = b.ctx;
    let window = b.window();

    for (node, _) in ctx.network().manufacturing_nodes() {
        for date in window.dates() {
            let labor = ctx.labor().get(date).ok_or_else(|| ModelError::MissingLaborDay {
                node: node.id.clone(),
                date,
            })?;
            let key = (node.id.clone(), date);
            let (Some(&hours), Some(&any)) = (production.hours.get(&key), production.any.get(&key)) else {
                continue;
            };

            if labor.is_fixed_day {
                let overtime_cap = labor.overtime_capacity();
                let fixed = b.continuous(
                    VarKey::FixedHours {
                        node: node.id.clone(),
                        date,
                    },
                    Some(labor.fixed_hours),
                    labor.regular_rate,
                );
                let overtime = b.continuous(
                    VarKey::OvertimeHours {
                        node: node.id.clone(),
                        date,
                    },
                    Some(overtime_cap),
                    labor.overtime_rate,
                );
                b.constrain(
                    "labor_split",
                    LinearExpr::term(hours, 1.0)
                        .with_term(fixed, -1.0)
                        .with_term(overtime, -1.0),
                    Sense::Eq,
                    0.0,
                );

                if overtime_cap > 0.0 {
                    let flag = b.binary(
                        VarKey::OvertimeFlag {
                            node: node.id.clone(),
                            date,
                        },
                        0.0,
                    );
                    b.constrain(
                        "overtime_gate",
                        LinearExpr::term(overtime, 1.0).with_term(flag, -overtime_cap),
                        Sense::Le,
                        0.0,
                    );
                    b.constrain(
                        "overtime_after_allotment",
                        LinearExpr::term(fixed, 1.0).with_term(flag, -labor.fixed_hours),
                        Sense::Ge,
                        0.0,
                    );
                }
            } else {
                let paid = b.continuous(
                    VarKey::PaidHours {
                        node: node.id.clone(),
                        date,
                    },
                    None,
                    labor.effective_non_fixed_rate(),
                );
                b.constrain(
                    "paid_covers_used",
                    LinearExpr::term(paid, 1.0).with_term(hours, -1.0),
                    Sense::Ge,
                    0.0,
                );
                b.constrain(
                    "minimum_payment",
                    LinearExpr::term(paid, 1.0).with_term(any, -labor.minimum_paid_hours),
                    Sense::Ge,
                    0.0,
                );
            }
        }
    }
    Ok(())
}
