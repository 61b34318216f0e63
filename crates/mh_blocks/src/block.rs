// crates/mh_blocks/src/block.rs

//! 外层算子块接口
//!
//! 每个算子块是一个（拟）线性变换，连接外侧（靠近模式网格）与
//! 内侧（靠近分析网格）两种表示：
//!
//! ```text
//!   内侧 (inner)  ──multiply──▶  外侧 (outer)
//!   内侧 (inner)  ◀─multiply_ad─ 外侧 (outer)
//! ```
//!
//! 构造时捕获的辅助状态（插值权重、背景场轨迹、统计量）之后不再改变。
//! 所有变换都在新的 [`FieldSet`] 中构建输出，成功后才整体替换输入，
//! 出错时调用方看到的集合保持原样。

use std::fmt;
use std::sync::Arc;

use mh_config::BlockConfig;
use mh_fieldset::{Communicator, Distribution, FieldSet, FunctionSpace, VariableSet};

use crate::error::{BlockError, BlockResult};
use crate::interpolation::GridInterpolationBlock;
use crate::std_dev::StdDevBlock;
use crate::vader::AirTemperatureBlock;

/// 构造算子块时的外部输入
///
/// 外侧几何随算子链由外向内逐级替换，其余字段在整条链中共享。
#[derive(Debug, Clone)]
pub struct BlockContext<'a> {
    /// 通信器
    pub comm: Arc<dyn Communicator>,
    /// 外侧函数空间
    pub outer_function_space: FunctionSpace,
    /// 外侧附加几何场
    pub outer_extra_fields: FieldSet,
    /// 外侧活动变量（为空时由块配置决定）
    pub outer_variables: VariableSet,
    /// 背景场
    pub xb: &'a FieldSet,
    /// 初猜场
    pub fg: &'a FieldSet,
    /// 辅助场集合（预计算统计量等）
    pub field_sets: &'a [FieldSet],
}

impl<'a> BlockContext<'a> {
    /// 以模式网格为外侧创建上下文
    pub fn new(
        comm: Arc<dyn Communicator>,
        outer_function_space: FunctionSpace,
        xb: &'a FieldSet,
        fg: &'a FieldSet,
    ) -> Self {
        Self {
            comm,
            outer_function_space,
            outer_extra_fields: FieldSet::new(),
            outer_variables: VariableSet::new(),
            xb,
            fg,
            field_sets: &[],
        }
    }

    /// 设置外侧变量
    pub fn with_outer_variables(mut self, vars: VariableSet) -> Self {
        self.outer_variables = vars;
        self
    }

    /// 设置外侧附加几何场
    pub fn with_outer_extra_fields(mut self, fields: FieldSet) -> Self {
        self.outer_extra_fields = fields;
        self
    }

    /// 设置辅助场集合
    pub fn with_field_sets(mut self, field_sets: &'a [FieldSet]) -> Self {
        self.field_sets = field_sets;
        self
    }

    /// 以 `block` 的内侧几何作为下一级的外侧
    pub fn inward(&self, block: &dyn OuterBlock) -> Self {
        Self {
            comm: Arc::clone(&self.comm),
            outer_function_space: block.inner_function_space().clone(),
            outer_extra_fields: block.inner_extra_fields().clone(),
            outer_variables: block.inner_variables().clone(),
            xb: self.xb,
            fg: self.fg,
            field_sets: self.field_sets,
        }
    }

    /// 确定块的外侧变量
    ///
    /// 配置给出的输出变量优先；上下文变量非空时两者必须一致。
    pub fn resolve_outer_variables(
        &self,
        block: &str,
        config: &BlockConfig,
    ) -> BlockResult<VariableSet> {
        match config.output_variables.as_ref() {
            Some(vars) => {
                if !self.outer_variables.is_empty() && *vars != self.outer_variables {
                    return Err(BlockError::variable_mismatch(
                        block,
                        format!(
                            "输出变量 {} 与外侧变量 {} 不一致",
                            vars, self.outer_variables
                        ),
                    ));
                }
                Ok(vars.clone())
            }
            None if !self.outer_variables.is_empty() => Ok(self.outer_variables.clone()),
            None => Err(BlockError::variable_mismatch(
                block,
                "既没有配置输出变量，也没有外侧变量",
            )),
        }
    }
}

/// 外层算子块
pub trait OuterBlock: Send + Sync + fmt::Debug {
    /// 块名（与注册名一致）
    fn name(&self) -> &str;

    /// 内侧函数空间
    fn inner_function_space(&self) -> &FunctionSpace;

    /// 内侧变量
    fn inner_variables(&self) -> &VariableSet;

    /// 内侧附加几何场
    fn inner_extra_fields(&self) -> &FieldSet;

    /// 外侧函数空间
    fn outer_function_space(&self) -> &FunctionSpace;

    /// 外侧变量
    fn outer_variables(&self) -> &VariableSet;

    /// 外侧数据分布为 `outer` 时内侧数据的分布
    fn inner_distribution(&self, outer: Distribution) -> Distribution {
        outer
    }

    /// 正向切线性变换：内侧 → 外侧
    fn multiply(&self, fields: &mut FieldSet) -> BlockResult<()>;

    /// 伴随变换：外侧 → 内侧
    fn multiply_ad(&self, fields: &mut FieldSet) -> BlockResult<()>;

    /// 校准逆变换：外侧 → 内侧
    ///
    /// 没有逆变换的块保持集合逐位不变。
    fn calibration_inverse_multiply(&self, _fields: &mut FieldSet) -> BlockResult<()> {
        log::info!("{}: 没有校准逆变换，输入保持不变", self.name());
        Ok(())
    }

    /// 输出块的文字描述
    fn describe(&self, out: &mut dyn fmt::Write) -> fmt::Result;
}

/// 检查场集合中的每个场都属于 `vars` 且与 `space` 尺寸一致
pub fn check_fields(
    block: &str,
    fields: &FieldSet,
    vars: &VariableSet,
    space: &FunctionSpace,
) -> BlockResult<()> {
    for field in fields {
        let levels = vars
            .levels(field.name())
            .ok_or_else(|| BlockError::unknown_variable(block, field.name()))?;
        if levels != field.levels() {
            return Err(BlockError::variable_mismatch(
                block,
                format!(
                    "变量 '{}' 层数为 {}，期望 {}",
                    field.name(),
                    field.levels(),
                    levels
                ),
            ));
        }
        space
            .check_field(field)
            .map_err(|e| BlockError::from_field(block, e))?;
    }
    Ok(())
}

/// 写出块的通用描述
pub(crate) fn describe_common(block: &dyn OuterBlock, out: &mut dyn fmt::Write) -> fmt::Result {
    writeln!(out, "{}:", block.name())?;
    writeln!(
        out,
        "  外侧: {} 变量 {}",
        block.outer_function_space(),
        block.outer_variables()
    )?;
    writeln!(
        out,
        "  内侧: {} 变量 {}",
        block.inner_function_space(),
        block.inner_variables()
    )
}

/// 内置算子块的闭合集合
#[derive(Debug)]
pub enum BlockVariant {
    /// 内部网格 → 模式网格插值
    GridInterpolation(GridInterpolationBlock),
    /// 位温 → 气温
    AirTemperature(AirTemperatureBlock),
    /// 标准差缩放
    StdDev(StdDevBlock),
}

macro_rules! dispatch {
    ($self:ident, $block:ident => $body:expr) => {
        match $self {
            BlockVariant::GridInterpolation($block) => $body,
            BlockVariant::AirTemperature($block) => $body,
            BlockVariant::StdDev($block) => $body,
        }
    };
}

impl OuterBlock for BlockVariant {
    fn name(&self) -> &str {
        dispatch!(self, b => b.name())
    }

    fn inner_function_space(&self) -> &FunctionSpace {
        dispatch!(self, b => b.inner_function_space())
    }

    fn inner_variables(&self) -> &VariableSet {
        dispatch!(self, b => b.inner_variables())
    }

    fn inner_extra_fields(&self) -> &FieldSet {
        dispatch!(self, b => b.inner_extra_fields())
    }

    fn outer_function_space(&self) -> &FunctionSpace {
        dispatch!(self, b => b.outer_function_space())
    }

    fn outer_variables(&self) -> &VariableSet {
        dispatch!(self, b => b.outer_variables())
    }

    fn inner_distribution(&self, outer: Distribution) -> Distribution {
        dispatch!(self, b => b.inner_distribution(outer))
    }

    fn multiply(&self, fields: &mut FieldSet) -> BlockResult<()> {
        dispatch!(self, b => b.multiply(fields))
    }

    fn multiply_ad(&self, fields: &mut FieldSet) -> BlockResult<()> {
        dispatch!(self, b => b.multiply_ad(fields))
    }

    fn calibration_inverse_multiply(&self, fields: &mut FieldSet) -> BlockResult<()> {
        dispatch!(self, b => b.calibration_inverse_multiply(fields))
    }

    fn describe(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        dispatch!(self, b => b.describe(out))
    }
}

impl From<GridInterpolationBlock> for BlockVariant {
    fn from(block: GridInterpolationBlock) -> Self {
        Self::GridInterpolation(block)
    }
}

impl From<AirTemperatureBlock> for BlockVariant {
    fn from(block: AirTemperatureBlock) -> Self {
        Self::AirTemperature(block)
    }
}

impl From<StdDevBlock> for BlockVariant {
    fn from(block: StdDevBlock) -> Self {
        Self::StdDev(block)
    }
}

impl fmt::Display for BlockVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.describe(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mh_fieldset::{BoundingBox, Field, SerialComm};

    fn space() -> FunctionSpace {
        FunctionSpace::regular_grid("model", 3, 3, BoundingBox::new(0.0, 0.0, 1.0, 1.0)).unwrap()
    }

    #[test]
    fn test_check_fields() {
        let vars = VariableSet::from_pairs([("temperature", 2)]).unwrap();
        let fs = space();

        let mut ok = FieldSet::new();
        ok.add(fs.create_field("temperature", 2)).unwrap();
        assert!(check_fields("blk", &ok, &vars, &fs).is_ok());

        let mut unknown = FieldSet::new();
        unknown.add(fs.create_field("humidity", 2)).unwrap();
        assert!(matches!(
            check_fields("blk", &unknown, &vars, &fs),
            Err(BlockError::UnknownVariable { .. })
        ));

        let mut wrong_levels = FieldSet::new();
        wrong_levels.add(fs.create_field("temperature", 3)).unwrap();
        assert!(matches!(
            check_fields("blk", &wrong_levels, &vars, &fs),
            Err(BlockError::VariableMismatch { .. })
        ));

        let mut wrong_size = FieldSet::new();
        wrong_size.add(Field::zeros("temperature", 2, 4)).unwrap();
        assert!(matches!(
            check_fields("blk", &wrong_size, &vars, &fs),
            Err(BlockError::DiscretizationSizeMismatch { expected: 9, actual: 4, .. })
        ));
    }

    #[test]
    fn test_resolve_outer_variables() {
        let xb = FieldSet::new();
        let fg = FieldSet::new();
        let ctx = BlockContext::new(Arc::new(SerialComm::new()), space(), &xb, &fg);
        let vars = VariableSet::from_pairs([("temperature", 2)]).unwrap();

        let config = BlockConfig::new("blk");
        assert!(ctx.resolve_outer_variables("blk", &config).is_err());

        let config = config.with_output_variables(vars.clone());
        assert_eq!(ctx.resolve_outer_variables("blk", &config).unwrap(), vars);

        let other = VariableSet::from_pairs([("humidity", 2)]).unwrap();
        let ctx = ctx.with_outer_variables(other);
        assert!(matches!(
            ctx.resolve_outer_variables("blk", &config),
            Err(BlockError::VariableMismatch { .. })
        ));
    }
}
