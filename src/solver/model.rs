// ==========================================
// 冷链产销排产系统 - 混合整数模型中间表示
// ==========================================
// 职责: 与具体求解后端无关的变量/约束/目标表示
// 红线: 模型构建完成后只读（窗口快照）,仅允许 fix 用于测试/诊断
// ==========================================

use std::collections::BTreeMap;

/// 数值容差（约束检查）
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

// ==========================================
// 变量
// ==========================================

/// 变量标识（模型内下标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Continuous,
    Integer,
    Binary,
}

#[derive(Debug, Clone)]
pub struct VarDef {
    pub name: String,
    pub kind: VarKind,
    pub lower: f64,
    pub upper: Option<f64>,
    /// 目标函数系数
    pub cost: f64,
}

impl VarDef {
    pub fn continuous(name: String) -> Self {
        Self {
            name,
            kind: VarKind::Continuous,
            lower: 0.0,
            upper: None,
            cost: 0.0,
        }
    }

    pub fn integer(name: String) -> Self {
        Self {
            kind: VarKind::Integer,
            ..Self::continuous(name)
        }
    }

    pub fn binary(name: String) -> Self {
        Self {
            kind: VarKind::Binary,
            upper: Some(1.0),
            ..Self::continuous(name)
        }
    }

    pub fn with_upper(mut self, upper: f64) -> Self {
        self.upper = Some(upper);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }
}

// ==========================================
// 线性表达式
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// 单项表达式 coef * var
    pub fn term(var: VarId, coef: f64) -> Self {
        let mut expr = Self::new();
        expr.add_term(var, coef);
        expr
    }

    /// Σ vars
    pub fn sum<I: IntoIterator<Item = VarId>>(vars: I) -> Self {
        let mut expr = Self::new();
        for var in vars {
            expr.add_term(var, 1.0);
        }
        expr
    }

    pub fn add_term(&mut self, var: VarId, coef: f64) -> &mut Self {
        if coef != 0.0 {
            self.terms.push((var, coef));
        }
        self
    }

    pub fn with_term(mut self, var: VarId, coef: f64) -> Self {
        self.add_term(var, coef);
        self
    }

    pub fn add_constant(&mut self, value: f64) -> &mut Self {
        self.constant += value;
        self
    }

    pub fn add_expr(&mut self, other: &LinearExpr, scale: f64) -> &mut Self {
        for &(var, coef) in &other.terms {
            self.add_term(var, coef * scale);
        }
        self.constant += other.constant * scale;
        self
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coef)| coef * values[var.index()])
            .sum::<f64>()
            + self.constant
    }
}

// ==========================================
// 约束
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

impl Sense {
    fn holds(self, lhs: f64, rhs: f64, tol: f64) -> bool {
        match self {
            Sense::Le => lhs <= rhs + tol,
            Sense::Ge => lhs >= rhs - tol,
            Sense::Eq => (lhs - rhs).abs() <= tol,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Sense::Le => "<=",
            Sense::Ge => ">=",
            Sense::Eq => "=",
        }
    }
}

/// 线性约束（常数项已移到右端）
#[derive(Debug, Clone)]
pub struct LinearConstraint {
    /// 约束族（用于统计与结构签名）
    pub family: &'static str,
    pub expr: LinearExpr,
    pub sense: Sense,
    pub rhs: f64,
}

/// 可行性检查发现的第一个违反项
#[derive(Debug, Clone, PartialEq)]
pub struct FeasibilityViolation {
    pub what: String,
    pub lhs: f64,
    pub rhs: f64,
}

/// 模型规模统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelStats {
    pub variables: usize,
    pub binaries: usize,
    pub integers: usize,
    pub constraints: usize,
    pub families: BTreeMap<&'static str, usize>,
}

// ==========================================
// MipModel
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct MipModel {
    vars: Vec<VarDef>,
    constraints: Vec<LinearConstraint>,
    trivially_infeasible: Option<String>,
}

impl MipModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_var(&mut self, def: VarDef) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(def);
        id
    }

    /// 添加约束 expr (sense) rhs
    ///
    /// 无变量项的约束直接求值: 不成立时模型记为平凡不可行
    pub fn add_constraint(&mut self, family: &'static str, expr: LinearExpr, sense: Sense, rhs: f64) {
        let rhs = rhs - expr.constant;
        let mut expr = expr;
        expr.constant = 0.0;

        if expr.is_empty() {
            if !sense.holds(0.0, rhs, DEFAULT_TOLERANCE) && self.trivially_infeasible.is_none() {
                self.trivially_infeasible = Some(format!("{}: 0 {} {}", family, sense.symbol(), rhs));
            }
            return;
        }

        self.constraints.push(LinearConstraint {
            family,
            expr,
            sense,
            rhs,
        });
    }

    /// 固定变量取值（上下界相同）
    pub fn fix(&mut self, var: VarId, value: f64) {
        let def = &mut self.vars[var.index()];
        def.lower = value;
        def.upper = Some(value);
    }

    pub fn vars(&self) -> &[VarDef] {
        &self.vars
    }

    pub fn var(&self, id: VarId) -> &VarDef {
        &self.vars[id.index()]
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// 构建阶段已发现的不可行原因
    pub fn trivially_infeasible(&self) -> Option<&str> {
        self.trivially_infeasible.as_deref()
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.vars
            .iter()
            .zip(values)
            .map(|(def, v)| def.cost * v)
            .sum()
    }

    /// 检查一组取值是否满足全部界、整数性与约束
    pub fn check_feasibility(&self, values: &[f64], tol: f64) -> Option<FeasibilityViolation> {
        if values.len() != self.vars.len() {
            return Some(FeasibilityViolation {
                what: format!("取值长度 {} 与变量数 {} 不一致", values.len(), self.vars.len()),
                lhs: values.len() as f64,
                rhs: self.vars.len() as f64,
            });
        }
        if let Some(reason) = &self.trivially_infeasible {
            return Some(FeasibilityViolation {
                what: reason.clone(),
                lhs: 0.0,
                rhs: 0.0,
            });
        }

        for (def, &v) in self.vars.iter().zip(values) {
            if !v.is_finite() || v < def.lower - tol {
                return Some(FeasibilityViolation {
                    what: format!("变量 {} 低于下界", def.name),
                    lhs: v,
                    rhs: def.lower,
                });
            }
            if let Some(upper) = def.upper {
                if v > upper + tol {
                    return Some(FeasibilityViolation {
                        what: format!("变量 {} 超过上界", def.name),
                        lhs: v,
                        rhs: upper,
                    });
                }
            }
            if def.kind != VarKind::Continuous && (v - v.round()).abs() > tol {
                return Some(FeasibilityViolation {
                    what: format!("变量 {} 不满足整数性", def.name),
                    lhs: v,
                    rhs: v.round(),
                });
            }
        }

        for constraint in &self.constraints {
            let lhs = constraint.expr.evaluate(values);
            if !constraint.sense.holds(lhs, constraint.rhs, tol.max(tol * constraint.rhs.abs())) {
                return Some(FeasibilityViolation {
                    what: format!("约束族 {} ({})", constraint.family, constraint.sense.symbol()),
                    lhs,
                    rhs: constraint.rhs,
                });
            }
        }
        None
    }

    pub fn stats(&self) -> ModelStats {
        let mut stats = ModelStats {
            variables: self.vars.len(),
            constraints: self.constraints.len(),
            ..Default::default()
        };
        for def in &self.vars {
            match def.kind {
                VarKind::Binary => stats.binaries += 1,
                VarKind::Integer => stats.integers += 1,
                VarKind::Continuous => {}
            }
        }
        for constraint in &self.constraints {
            *stats.families.entry(constraint.family).or_insert(0) += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_moves_to_rhs() {
        let mut model = MipModel::new();
        let x = model.add_var(VarDef::continuous("x".into()));
        let mut expr = LinearExpr::term(x, 2.0);
        expr.add_constant(3.0);
        model.add_constraint("test", expr, Sense::Le, 10.0);

        let c = &model.constraints()[0];
        assert_eq!(c.rhs, 7.0);
        assert_eq!(c.expr.constant(), 0.0);
    }

    #[test]
    fn test_empty_constraint_marks_infeasible_only_when_violated() {
        let mut model = MipModel::new();
        model.add_constraint("ok", LinearExpr::new(), Sense::Le, 5.0);
        assert!(model.trivially_infeasible().is_none());
        assert!(model.constraints().is_empty());

        let mut expr = LinearExpr::new();
        expr.add_constant(12.0);
        model.add_constraint("demand", expr, Sense::Eq, 0.0);
        assert!(model.trivially_infeasible().unwrap().starts_with("demand"));
    }

    #[test]
    fn test_check_feasibility_reports_bounds_and_integrality() {
        let mut model = MipModel::new();
        let b = model.add_var(VarDef::binary("b".into()));
        let x = model.add_var(VarDef::continuous("x".into()).with_cost(2.0));
        model.add_constraint("link", LinearExpr::term(x, 1.0).with_term(b, -10.0), Sense::Le, 0.0);

        assert!(model.check_feasibility(&[1.0, 5.0], DEFAULT_TOLERANCE).is_none());
        assert!(model.check_feasibility(&[0.0, 5.0], DEFAULT_TOLERANCE).is_some());
        assert!(model.check_feasibility(&[0.5, 5.0], DEFAULT_TOLERANCE).is_some());
        assert!(model.check_feasibility(&[1.0, -1.0], DEFAULT_TOLERANCE).is_some());
        assert_eq!(model.objective_value(&[1.0, 5.0]), 10.0);
    }

    #[test]
    fn test_stats_counts_families() {
        let mut model = MipModel::new();
        let b = model.add_var(VarDef::binary("b".into()));
        let n = model.add_var(VarDef::integer("n".into()));
        model.add_constraint("a", LinearExpr::term(b, 1.0), Sense::Le, 1.0);
        model.add_constraint("a", LinearExpr::term(n, 1.0), Sense::Le, 3.0);
        model.add_constraint("b", LinearExpr::sum([b, n]), Sense::Ge, 0.0);

        let stats = model.stats();
        assert_eq!(stats.binaries, 1);
        assert_eq!(stats.integers, 1);
        assert_eq!(stats.families.get("a"), Some(&2));
    }
}
