// ==========================================
// 冷链产销排产系统 - 窗口模型构建器
// ==========================================
// 职责: 按窗口重建完整约束系统,产出不可变模型快照
// 红线: 滚动分解器不触碰上一窗口的模型对象; 每个窗口独立构建
// 顺序: 生产变量 → 人工 → 批次库存 → 车辆
// ==========================================

use crate::domain::error::ModelResult;
use crate::domain::scenario::PlanningContext;
use crate::engine::cohort::{self, CohortVars};
use crate::engine::labor;
use crate::engine::production::{self, ProductionVars};
use crate::engine::truck;
use crate::engine::var_key::VarKey;
use crate::engine::warmstart::WarmstartHints;
use crate::engine::window::{ModelOptions, PlanningWindow, WindowInputs};
use crate::solver::model::{LinearExpr, MipModel, ModelStats, Sense, VarDef, VarId};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, instrument};

// ==========================================
// ModelSignature - 模型结构签名
// ==========================================
// 产品/节点/路线/车辆/建模选项 不同即视为结构变化
// 仅在进程内比较（热启动提示表与新模型对照）,不做持久化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelSignature(u64);

/// FNV-1a 64 位,算法固定,不随标准库版本变化
struct SignatureHasher(u64);

impl SignatureHasher {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    fn new() -> Self {
        Self(Self::OFFSET)
    }
}

impl Hasher for SignatureHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= byte as u64;
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

impl ModelSignature {
    pub fn of(ctx: &PlanningContext, options: &ModelOptions) -> Self {
        let mut hasher = SignatureHasher::new();

        let mut products: Vec<&str> = ctx.products().iter().map(|p| p.id.as_str()).collect();
        products.sort_unstable();
        products.hash(&mut hasher);

        let mut nodes: Vec<_> = ctx
            .network()
            .nodes()
            .iter()
            .map(|n| (n.id.as_str(), n.capabilities, n.storage_capacity.is_some()))
            .collect();
        nodes.sort_unstable_by(|a, b| a.0.cmp(b.0));
        for (id, caps, capped) in nodes {
            id.hash(&mut hasher);
            caps.hash(&mut hasher);
            capped.hash(&mut hasher);
        }

        let mut routes: Vec<_> = ctx
            .network()
            .routes()
            .iter()
            .map(|r| (r.id.as_str(), r.origin.as_str(), r.destination.as_str(), r.transit_days, r.mode))
            .collect();
        routes.sort_unstable();
        routes.hash(&mut hasher);

        let mut trucks: Vec<_> = ctx
            .trucks()
            .iter()
            .map(|t| {
                (
                    t.id.as_str(),
                    t.origin.as_str(),
                    t.destination.as_str(),
                    t.slot,
                    t.day_of_week.map(|w| w.num_days_from_monday()),
                )
            })
            .collect();
        trucks.sort_unstable();
        trucks.hash(&mut hasher);

        options.hash(&mut hasher);
        Self(hasher.finish())
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_value(value: u64) -> Self {
        Self(value)
    }
}

// ==========================================
// ModelBuilder - 构建期可变状态
// ==========================================
pub struct ModelBuilder<'a> {
    pub(crate) ctx: &'a PlanningContext,
    pub(crate) inputs: &'a WindowInputs,
    pub(crate) options: &'a ModelOptions,
    model: MipModel,
    keys: Vec<VarKey>,
    index: HashMap<VarKey, VarId>,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(ctx: &'a PlanningContext, inputs: &'a WindowInputs, options: &'a ModelOptions) -> Self {
        Self {
            ctx,
            inputs,
            options,
            model: MipModel::new(),
            keys: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub(crate) fn window(&self) -> &'a PlanningWindow {
        &self.inputs.window
    }

    fn add_var(&mut self, key: VarKey, def: VarDef) -> VarId {
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = self.model.add_var(def);
        self.index.insert(key.clone(), id);
        self.keys.push(key);
        id
    }

    /// 非负连续变量（可选上界）
    pub(crate) fn continuous(&mut self, key: VarKey, upper: Option<f64>, cost: f64) -> VarId {
        let mut def = VarDef::continuous(key.label()).with_cost(cost);
        if let Some(upper) = upper {
            def = def.with_upper(upper);
        }
        self.add_var(key, def)
    }

    pub(crate) fn binary(&mut self, key: VarKey, cost: f64) -> VarId {
        let def = VarDef::binary(key.label()).with_cost(cost);
        self.add_var(key, def)
    }

    pub(crate) fn integer(&mut self, key: VarKey, upper: f64) -> VarId {
        let def = VarDef::integer(key.label()).with_upper(upper);
        self.add_var(key, def)
    }

    pub(crate) fn constrain(&mut self, family: &'static str, expr: LinearExpr, sense: Sense, rhs: f64) {
        self.model.add_constraint(family, expr, sense, rhs);
    }

    fn finish(self, signature: ModelSignature) -> WindowModel {
        WindowModel {
            window: self.inputs.window,
            model: Arc::new(self.model),
            keys: self.keys,
            index: self.index,
            signature,
        }
    }
}

// ==========================================
// WindowModel - 窗口模型快照（不可变）
// ==========================================
#[derive(Debug, Clone)]
pub struct WindowModel {
    window: PlanningWindow,
    model: Arc<MipModel>,
    keys: Vec<VarKey>,
    index: HashMap<VarKey, VarId>,
    signature: ModelSignature,
}

impl WindowModel {
    /// 构建窗口模型
    ///
    /// # 错误
    /// - 人工日历缺日、数据不一致等建模错误,不做部分求解
    #[instrument(skip_all, fields(window_index = inputs.window.index, start = %inputs.window.start, end = %inputs.window.end))]
    pub fn build(ctx: &PlanningContext, inputs: &WindowInputs, options: &ModelOptions) -> ModelResult<Self> {
        let mut builder = ModelBuilder::new(ctx, inputs, options);

        let production: ProductionVars = production::add_production(&mut builder)?;
        labor::add_labor(&mut builder, &production)?;
        let cohorts: CohortVars = cohort::add_cohorts(&mut builder, &production)?;
        truck::add_trucks(&mut builder, &production, &cohorts)?;

        let model = builder.finish(ModelSignature::of(ctx, options));
        let stats = model.stats();
        debug!(
            vars = stats.variables,
            binaries = stats.binaries,
            integers = stats.integers,
            constraints = stats.constraints,
            cohorts = cohorts.cohort_count,
            "窗口模型构建完成"
        );
        Ok(model)
    }

    pub fn window(&self) -> &PlanningWindow {
        &self.window
    }

    pub fn model(&self) -> &Arc<MipModel> {
        &self.model
    }

    pub fn keys(&self) -> &[VarKey] {
        &self.keys
    }

    pub fn var(&self, key: &VarKey) -> Option<VarId> {
        self.index.get(key).copied()
    }

    pub fn signature(&self) -> ModelSignature {
        self.signature
    }

    pub fn stats(&self) -> ModelStats {
        self.model.stats()
    }

    /// 固定指定变量的取值（诊断/测试）
    pub fn fix(&mut self, key: &VarKey, value: f64) -> bool {
        match self.index.get(key) {
            Some(&id) => {
                Arc::make_mut(&mut self.model).fix(id, value);
                true
            }
            None => false,
        }
    }

    /// 按变量顺序展开热启动提示
    ///
    /// # 返回
    /// (提示向量, 命中变量数); 结构签名不一致时返回全空
    pub fn hint_vector(&self, hints: &WarmstartHints) -> (Vec<Option<f64>>, usize) {
        if hints.signature != self.signature {
            return (Vec::new(), 0);
        }
        let mut hinted = 0;
        let vector = self
            .keys
            .iter()
            .map(|key| {
                let value = hints.values.get(key).copied();
                if value.is_some() {
                    hinted += 1;
                }
                value
            })
            .collect();
        (vector, hinted)
    }
}
