// crates/mh_blocks/src/std_dev.rs

//! 标准差缩放块
//!
//! 对每个活动变量逐点乘以冻结的背景误差标准差 σ：
//!
//! - `multiply` / `multiply_ad`: x ← σ·x（对角算子，自伴）
//! - `calibration_inverse_multiply`: x ← x / σ（σ = 0 处结果为 0）
//!
//! σ 优先取自辅助场集合中与变量同名的场，否则使用 `default value`。
//! 没有 σ 的变量原样通过。

use std::fmt;

use serde::{Deserialize, Serialize};

use mh_config::BlockConfig;
use mh_fieldset::{Field, FieldSet, FunctionSpace, VariableSet};

use crate::block::{check_fields, describe_common, BlockContext, OuterBlock};
use crate::error::{BlockError, BlockResult};
use crate::registry::ParameterSchema;

/// 块名
pub const BLOCK_NAME: &str = "standard deviation";

/// 标准差块参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StdDevParameters {
    /// 辅助场缺失时使用的统一标准差
    #[serde(rename = "default value", default)]
    pub default_value: Option<f64>,
}

fn check_value(block: &str, key: &str, value: f64) -> BlockResult<()> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(BlockError::InvalidParameter {
            block: block.to_string(),
            key: key.to_string(),
            reason: format!("标准差必须为非负有限值: {}", value),
        });
    }
    Ok(())
}

/// 参数模式
pub fn parameters() -> ParameterSchema {
    ParameterSchema::new(BLOCK_NAME, &["default value"], |config| {
        let params: StdDevParameters = config.params()?;
        match params.default_value {
            Some(v) => check_value(&config.name, "default value", v),
            None => Ok(()),
        }
    })
}

/// 标准差块
#[derive(Debug)]
pub struct StdDevBlock {
    /// 配置中声明的块名
    name: String,
    function_space: FunctionSpace,
    extra_fields: FieldSet,
    variables: VariableSet,
    /// 冻结的标准差，场名即变量名
    std_dev: FieldSet,
}

impl StdDevBlock {
    /// 由上下文与配置构造
    pub fn new(ctx: &BlockContext<'_>, config: &BlockConfig) -> BlockResult<Self> {
        let block = config.name.as_str();
        log::trace!("{} 构造开始", block);

        let params: StdDevParameters = config.params()?;
        let variables = ctx.resolve_outer_variables(block, config)?;
        if let Some(input) = config.input_variables.as_ref() {
            if *input != variables {
                return Err(BlockError::variable_mismatch(
                    block,
                    format!("输入变量 {} 与输出变量 {} 必须相同", input, variables),
                ));
            }
        }

        let active: Vec<&str> = if config.active_variables.is_empty() {
            variables.names()
        } else {
            config.active_variables.iter().map(String::as_str).collect()
        };

        let space = &ctx.outer_function_space;
        let mut std_dev = FieldSet::with_capacity(active.len());
        for name in active {
            let levels = variables.levels(name).ok_or_else(|| {
                BlockError::variable_mismatch(
                    block,
                    format!("活动变量 '{}' 不在变量列表 {} 中", name, variables),
                )
            })?;

            let sigma = match ctx.field_sets.iter().find_map(|set| set.get(name)) {
                Some(field) => {
                    if field.levels() != levels {
                        return Err(BlockError::variable_mismatch(
                            block,
                            format!(
                                "标准差场 '{}' 层数为 {}，期望 {}",
                                name,
                                field.levels(),
                                levels
                            ),
                        ));
                    }
                    space
                        .check_field(field)
                        .map_err(|e| BlockError::from_field(block, e))?;
                    field.clone()
                }
                None => match params.default_value {
                    Some(v) => Field::filled(name, levels, space.size(), v),
                    None => {
                        log::warn!("{}: 变量 '{}' 没有标准差，原样通过", block, name);
                        continue;
                    }
                },
            };
            if let Some(&bad) = sigma.data().iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
                check_value(block, name, bad)?;
            }
            std_dev.add(sigma)?;
        }

        log::trace!("{} 构造结束", block);
        Ok(Self {
            name: block.to_string(),
            function_space: space.clone(),
            extra_fields: ctx.outer_extra_fields.clone(),
            variables,
            std_dev,
        })
    }

    /// 冻结的标准差
    pub fn std_dev(&self) -> &FieldSet {
        &self.std_dev
    }

    fn transform(&self, fields: &FieldSet, op: impl Fn(f64, f64) -> f64) -> BlockResult<FieldSet> {
        check_fields(&self.name, fields, &self.variables, &self.function_space)?;
        let mut out = FieldSet::with_capacity(fields.len());
        for field in fields {
            let mut next = field.clone();
            if let Some(sigma) = self.std_dev.get(field.name()) {
                for (v, s) in next.data_mut().iter_mut().zip(sigma.data()) {
                    *v = op(*v, *s);
                }
            }
            out.add(next)?;
        }
        Ok(out)
    }
}

impl OuterBlock for StdDevBlock {
    fn name(&self) -> &str {
        &self.name
    }

    fn inner_function_space(&self) -> &FunctionSpace {
        &self.function_space
    }

    fn inner_variables(&self) -> &VariableSet {
        &self.variables
    }

    fn inner_extra_fields(&self) -> &FieldSet {
        &self.extra_fields
    }

    fn outer_function_space(&self) -> &FunctionSpace {
        &self.function_space
    }

    fn outer_variables(&self) -> &VariableSet {
        &self.variables
    }

    fn multiply(&self, fields: &mut FieldSet) -> BlockResult<()> {
        log::trace!("{} multiply 开始", self.name);
        let out = self.transform(fields, |v, s| v * s)?;
        fields.replace_with(out);
        log::trace!("{} multiply 结束", self.name);
        Ok(())
    }

    fn multiply_ad(&self, fields: &mut FieldSet) -> BlockResult<()> {
        log::trace!("{} multiply_ad 开始", self.name);
        let out = self.transform(fields, |v, s| v * s)?;
        fields.replace_with(out);
        log::trace!("{} multiply_ad 结束", self.name);
        Ok(())
    }

    fn calibration_inverse_multiply(&self, fields: &mut FieldSet) -> BlockResult<()> {
        log::trace!("{} calibration_inverse_multiply 开始", self.name);
        let out = self.transform(fields, |v, s| if s > 0.0 { v / s } else { 0.0 })?;
        fields.replace_with(out);
        log::trace!("{} calibration_inverse_multiply 结束", self.name);
        Ok(())
    }

    fn describe(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        describe_common(self, out)?;
        writeln!(out, "  标准差变量: {:?}", self.std_dev.names())
    }
}
