// crates/mh_blocks/src/interpolation/block.rs

//! 内部网格 → 模式网格插值块
//!
//! 内侧是在每个进程上完整复制的小规则网格，外侧是按分块分布的模式网格。
//! 输入与输出变量完全相同，块只改变水平离散：
//!
//! - `multiply`:    模式场 = W · 内部场（逐层）
//! - `multiply_ad`: 内部场 = Wᵀ · 模式场（逐层，之后全局归约）
//!
//! 没有校准逆变换。

use std::fmt;

use serde::{Deserialize, Serialize};

use mh_config::BlockConfig;
use mh_fieldset::{Distribution, FieldSet, FunctionSpace, VariableSet};

use super::grid::InternalGridParameters;
use super::unstructured::UnstructuredInterpolation;
use super::weights::InterpolationMethod;
use crate::block::{check_fields, describe_common, BlockContext, OuterBlock};
use crate::error::{BlockError, BlockResult};
use crate::registry::ParameterSchema;

/// 块名
pub const BLOCK_NAME: &str = "gsi interpolation to model grid";

/// 插值块参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterpolationParameters {
    /// 内部网格
    pub grid: InternalGridParameters,
    /// 插值方法
    #[serde(default)]
    pub method: InterpolationMethod,
}

/// 参数模式
pub fn parameters() -> ParameterSchema {
    ParameterSchema::new(BLOCK_NAME, &["grid", "method"], |config| {
        let params: InterpolationParameters = config.params()?;
        params
            .method
            .validate()
            .map_err(|reason| BlockError::InvalidParameter {
                block: config.name.clone(),
                key: "method".to_string(),
                reason,
            })
    })
}

/// 内部网格插值块
#[derive(Debug)]
pub struct GridInterpolationBlock {
    /// 配置中声明的块名
    name: String,
    variables: VariableSet,
    inner_extra_fields: FieldSet,
    interpolator: UnstructuredInterpolation,
}

impl GridInterpolationBlock {
    /// 由上下文与配置构造
    pub fn new(ctx: &BlockContext<'_>, config: &BlockConfig) -> BlockResult<Self> {
        let name = config.name.as_str();
        log::trace!("{} 构造开始", name);

        let input = config.input_variables()?;
        let output = config.output_variables()?;
        if input != output {
            return Err(BlockError::variable_mismatch(
                name,
                format!("输入变量 {} 与输出变量 {} 必须相同", input, output),
            ));
        }
        let variables = ctx.resolve_outer_variables(name, config)?;

        // 插值作用于全部变量，活动变量只需属于变量列表
        if let Some(missing) = config.active_variables.iter().find(|v| !variables.has(v)) {
            return Err(BlockError::variable_mismatch(
                name,
                format!("活动变量 '{}' 不在变量列表 {} 中", missing, variables),
            ));
        }

        let params: InterpolationParameters = config.params()?;
        let internal = params
            .grid
            .build(&ctx.outer_function_space, ctx.comm.as_ref())
            .map_err(|e| BlockError::from_field(name, e))?;
        let interpolator = UnstructuredInterpolation::new(
            params.method,
            internal,
            ctx.outer_function_space.clone(),
            ctx.comm.clone(),
        )
        .map_err(|e| BlockError::from_field(name, e))?;

        log::trace!("{} 构造结束", name);
        Ok(Self {
            name: name.to_string(),
            variables,
            inner_extra_fields: FieldSet::new(),
            interpolator,
        })
    }

    /// 插值算子
    pub fn interpolator(&self) -> &UnstructuredInterpolation {
        &self.interpolator
    }

    /// 在 `space` 上为输入集合中的每个场分配同名同层数的零值场
    fn allocate(
        &self,
        fields: &FieldSet,
        from: &FunctionSpace,
        to: &FunctionSpace,
    ) -> BlockResult<FieldSet> {
        check_fields(&self.name, fields, &self.variables, from)?;
        Ok(fields
            .iter()
            .map(|f| to.create_field(f.name(), f.levels()))
            .collect())
    }
}

impl OuterBlock for GridInterpolationBlock {
    fn name(&self) -> &str {
        &self.name
    }

    fn inner_function_space(&self) -> &FunctionSpace {
        self.interpolator.source()
    }

    fn inner_variables(&self) -> &VariableSet {
        &self.variables
    }

    fn inner_extra_fields(&self) -> &FieldSet {
        &self.inner_extra_fields
    }

    fn outer_function_space(&self) -> &FunctionSpace {
        self.interpolator.target()
    }

    fn outer_variables(&self) -> &VariableSet {
        &self.variables
    }

    fn inner_distribution(&self, _outer: Distribution) -> Distribution {
        Distribution::Replicated
    }

    fn multiply(&self, fields: &mut FieldSet) -> BlockResult<()> {
        log::trace!("{} multiply 开始", self.name);
        let mut out = self.allocate(fields, self.interpolator.source(), self.interpolator.target())?;
        self.interpolator
            .apply(fields, &mut out)
            .map_err(|e| BlockError::from_field(&self.name, e))?;
        fields.replace_with(out);
        log::trace!("{} multiply 结束", self.name);
        Ok(())
    }

    fn multiply_ad(&self, fields: &mut FieldSet) -> BlockResult<()> {
        log::trace!("{} multiply_ad 开始", self.name);
        let mut out = self.allocate(fields, self.interpolator.target(), self.interpolator.source())?;
        self.interpolator
            .apply_ad(fields, &mut out)
            .map_err(|e| BlockError::from_field(&self.name, e))?;
        fields.replace_with(out);
        log::trace!("{} multiply_ad 结束", self.name);
        Ok(())
    }

    fn describe(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        describe_common(self, out)?;
        let weights = self.interpolator.weights();
        writeln!(
            out,
            "  方法: {}, 权重 {}×{}, nnz={}",
            self.interpolator.method().name(),
            weights.n_rows(),
            weights.n_cols(),
            weights.nnz()
        )
    }
}

impl fmt::Display for GridInterpolationBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.describe(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use mh_fieldset::{BoundingBox, Field, SerialComm};
    use serde_json::json;

    fn native() -> FunctionSpace {
        FunctionSpace::regular_grid("model", 6, 6, BoundingBox::new(0.0, 0.0, 1.0, 1.0)).unwrap()
    }

    fn config() -> BlockConfig {
        let vars = VariableSet::from_pairs([("temperature", 2)]).unwrap();
        BlockConfig::new(BLOCK_NAME)
            .with_variables(vars)
            .with_param("grid", json!({"nx": 3, "ny": 3}))
            .with_param("method", json!({"type": "bilinear"}))
    }

    fn build(config: &BlockConfig) -> BlockResult<GridInterpolationBlock> {
        let xb = FieldSet::new();
        let fg = FieldSet::new();
        let ctx = BlockContext::new(Arc::new(SerialComm::new()), native(), &xb, &fg);
        GridInterpolationBlock::new(&ctx, config)
    }

    #[test]
    fn test_geometry() {
        let block = build(&config()).unwrap();
        assert_eq!(block.inner_function_space().size(), 9);
        assert_eq!(block.outer_function_space().size(), 36);
        assert_eq!(block.inner_variables(), block.outer_variables());
        assert_eq!(block.name(), BLOCK_NAME);
        assert_eq!(
            block.inner_distribution(Distribution::Partitioned),
            Distribution::Replicated
        );
    }

    #[test]
    fn test_input_output_must_match() {
        let mut cfg = config();
        cfg.output_variables = Some(VariableSet::from_pairs([("temperature", 3)]).unwrap());
        assert!(matches!(build(&cfg), Err(BlockError::VariableMismatch { .. })));

        let cfg = config().with_active_variables(["humidity"]);
        assert!(matches!(build(&cfg), Err(BlockError::VariableMismatch { .. })));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let cfg = config().with_param("gird", json!({}));
        assert!(matches!(build(&cfg), Err(BlockError::Config(_))));
    }

    #[test]
    fn test_multiply_replaces_bundle() {
        let block = build(&config()).unwrap();
        let mut fields = FieldSet::new();
        fields.add(Field::filled("temperature", 2, 9, 2.0)).unwrap();

        block.multiply(&mut fields).unwrap();
        let t = fields.get("temperature").unwrap();
        assert_eq!(t.shape(), (2, 36));
        assert!(t.data().iter().all(|v| (v - 2.0).abs() < 1e-12));

        block.multiply_ad(&mut fields).unwrap();
        assert_eq!(fields.get("temperature").unwrap().shape(), (2, 9));
    }

    #[test]
    fn test_failed_multiply_leaves_bundle_untouched() {
        let block = build(&config()).unwrap();
        let mut fields = FieldSet::new();
        fields.add(Field::filled("temperature", 2, 9, 1.0)).unwrap();
        fields.add(Field::filled("humidity", 2, 9, 1.0)).unwrap();
        let before = fields.clone();

        assert!(matches!(
            block.multiply(&mut fields),
            Err(BlockError::UnknownVariable { .. })
        ));
        assert_eq!(fields, before);

        let mut wrong = FieldSet::new();
        wrong.add(Field::filled("temperature", 2, 36, 1.0)).unwrap();
        assert!(matches!(
            block.multiply(&mut wrong),
            Err(BlockError::DiscretizationSizeMismatch { expected: 9, actual: 36, .. })
        ));
    }

    #[test]
    fn test_calibration_inverse_is_noop() {
        let block = build(&config()).unwrap();
        let mut fields = FieldSet::new();
        fields.add(Field::filled("temperature", 2, 36, 0.1)).unwrap();
        let before = fields.clone();
        block.calibration_inverse_multiply(&mut fields).unwrap();
        assert_eq!(fields, before);
    }

    #[test]
    fn test_schema() {
        let schema = parameters();
        assert!(schema.validate(&config()).is_ok());
        let bad = config().with_param("method", json!({"type": "inverse_distance", "neighbors": 0}));
        assert!(matches!(
            schema.validate(&bad),
            Err(BlockError::InvalidParameter { .. })
        ));
    }
}
