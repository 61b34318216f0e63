// crates/mh_blocks/src/vader/air_temperature.rs

//! 位温 → 气温
//!
//! 非线性关系 `T = Π·θ` 在背景态处线性化。Exner 函数 `Π` 取自背景场，
//! 构造时冻结，因此切线性与伴随都是逐点对角缩放：
//!
//! - `multiply`:    δT = Π·δθ
//! - `multiply_ad`: δθ = Π·δT
//!
//! 其余变量原样通过。

use std::fmt;

use serde::{Deserialize, Serialize};

use mh_config::BlockConfig;
use mh_fieldset::{Field, FieldSet, FunctionSpace, VariableSet};

use crate::block::{check_fields, describe_common, BlockContext, OuterBlock};
use crate::error::{BlockError, BlockResult};
use crate::registry::ParameterSchema;

/// 块名
pub const BLOCK_NAME: &str = "air temperature";

/// 外侧变量
pub const AIR_TEMPERATURE: &str = "air_temperature";

/// 内侧变量
pub const POTENTIAL_TEMPERATURE: &str = "potential_temperature";

fn default_exner_field() -> String {
    "exner".to_string()
}

/// 气温块参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AirTemperatureParameters {
    /// 背景场中 Exner 函数的场名
    #[serde(rename = "exner field", default = "default_exner_field")]
    pub exner_field: String,
}

impl Default for AirTemperatureParameters {
    fn default() -> Self {
        Self {
            exner_field: default_exner_field(),
        }
    }
}

/// 参数模式
pub fn parameters() -> ParameterSchema {
    ParameterSchema::new(BLOCK_NAME, &["exner field"], |config| {
        let _: AirTemperatureParameters = config.params()?;
        Ok(())
    })
}

/// 气温块
#[derive(Debug)]
pub struct AirTemperatureBlock {
    /// 配置中声明的块名
    name: String,
    function_space: FunctionSpace,
    extra_fields: FieldSet,
    outer_variables: VariableSet,
    inner_variables: VariableSet,
    /// 冻结的 Exner 函数（与气温同层数）
    exner: Field,
}

impl AirTemperatureBlock {
    /// 由上下文与配置构造
    pub fn new(ctx: &BlockContext<'_>, config: &BlockConfig) -> BlockResult<Self> {
        let name = config.name.as_str();
        log::trace!("{} 构造开始", name);

        let params: AirTemperatureParameters = config.params()?;
        let outer_variables = ctx.resolve_outer_variables(name, config)?;
        let levels = outer_variables.levels(AIR_TEMPERATURE).ok_or_else(|| {
            BlockError::variable_mismatch(
                name,
                format!("外侧变量 {} 不含 '{}'", outer_variables, AIR_TEMPERATURE),
            )
        })?;
        if outer_variables.has(POTENTIAL_TEMPERATURE) {
            return Err(BlockError::variable_mismatch(
                name,
                format!("外侧变量已包含 '{}'", POTENTIAL_TEMPERATURE),
            ));
        }
        let inner_variables = outer_variables.renamed(AIR_TEMPERATURE, POTENTIAL_TEMPERATURE)?;
        if let Some(input) = config.input_variables.as_ref() {
            if *input != inner_variables {
                return Err(BlockError::variable_mismatch(
                    name,
                    format!("输入变量 {} 应为 {}", input, inner_variables),
                ));
            }
        }

        let exner = ctx
            .xb
            .get(&params.exner_field)
            .ok_or_else(|| BlockError::missing_field(name, &params.exner_field))?;
        if exner.levels() != levels {
            return Err(BlockError::variable_mismatch(
                name,
                format!(
                    "Exner 场 '{}' 层数为 {}，'{}' 层数为 {}",
                    params.exner_field,
                    exner.levels(),
                    AIR_TEMPERATURE,
                    levels
                ),
            ));
        }
        ctx.outer_function_space
            .check_field(exner)
            .map_err(|e| BlockError::from_field(name, e))?;

        log::trace!("{} 构造结束", name);
        Ok(Self {
            name: name.to_string(),
            function_space: ctx.outer_function_space.clone(),
            extra_fields: ctx.outer_extra_fields.clone(),
            outer_variables,
            inner_variables,
            exner: exner.clone(),
        })
    }

    /// 冻结的 Exner 函数
    pub fn exner(&self) -> &Field {
        &self.exner
    }

    /// 把 `from` 替换为 `to = Π·from`，其余场复制
    fn scale(&self, fields: &FieldSet, from: &str, to: &str) -> BlockResult<FieldSet> {
        let mut out = FieldSet::with_capacity(fields.len());
        for field in fields {
            if field.name() == from {
                let data = field
                    .data()
                    .iter()
                    .zip(self.exner.data())
                    .map(|(v, pi)| v * pi)
                    .collect();
                out.add(Field::from_data(to, field.levels(), field.n_points(), data)?)?;
            } else {
                out.add(field.clone())?;
            }
        }
        Ok(out)
    }
}

impl OuterBlock for AirTemperatureBlock {
    fn name(&self) -> &str {
        &self.name
    }

    fn inner_function_space(&self) -> &FunctionSpace {
        &self.function_space
    }

    fn inner_variables(&self) -> &VariableSet {
        &self.inner_variables
    }

    fn inner_extra_fields(&self) -> &FieldSet {
        &self.extra_fields
    }

    fn outer_function_space(&self) -> &FunctionSpace {
        &self.function_space
    }

    fn outer_variables(&self) -> &VariableSet {
        &self.outer_variables
    }

    fn multiply(&self, fields: &mut FieldSet) -> BlockResult<()> {
        log::trace!("{} multiply 开始", self.name);
        check_fields(&self.name, fields, &self.inner_variables, &self.function_space)?;
        let out = self.scale(fields, POTENTIAL_TEMPERATURE, AIR_TEMPERATURE)?;
        fields.replace_with(out);
        log::trace!("{} multiply 结束", self.name);
        Ok(())
    }

    fn multiply_ad(&self, fields: &mut FieldSet) -> BlockResult<()> {
        log::trace!("{} multiply_ad 开始", self.name);
        check_fields(&self.name, fields, &self.outer_variables, &self.function_space)?;
        let out = self.scale(fields, AIR_TEMPERATURE, POTENTIAL_TEMPERATURE)?;
        fields.replace_with(out);
        log::trace!("{} multiply_ad 结束", self.name);
        Ok(())
    }

    fn describe(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        describe_common(self, out)?;
        writeln!(out, "  Exner 场: {} 层", self.exner.levels())
    }
}
