// crates/mh_blocks/src/chain.rs

//! 外层算子链
//!
//! 配置按应用顺序声明：第一个块最先被 `apply`，最后一个块的输出位于模式网格。
//!
//! ```text
//!   分析表示 ─▶ blocks[0] ─▶ blocks[1] ─▶ … ─▶ blocks[n-1] ─▶ 模式表示
//! ```
//!
//! 构造从模式几何出发，按声明的逆序逐级向内：每个块的内侧几何
//! 作为下一个（更靠内的）块的外侧几何。

use std::fmt;
use std::sync::Arc;

use mh_config::{BlockConfig, ChainConfig};
use mh_fieldset::{Communicator, Distribution, FieldSet, FunctionSpace, VariableSet};

use crate::block::{BlockContext, BlockVariant, OuterBlock};
use crate::error::{BlockError, BlockResult};
use crate::registry::{global, BlockRegistry};
use crate::testing::AdjointTestReport;

/// 外层算子链
#[derive(Debug)]
pub struct OperatorChain {
    /// 按应用顺序排列
    blocks: Vec<BlockVariant>,
    outer_function_space: FunctionSpace,
    comm: Arc<dyn Communicator>,
}

impl OperatorChain {
    /// 用给定注册中心构造算子链
    ///
    /// `ctx` 的外侧几何为模式网格。
    pub fn build(
        registry: &BlockRegistry,
        ctx: &BlockContext<'_>,
        config: &ChainConfig,
    ) -> BlockResult<Self> {
        Self::build_with(ctx, config, |ctx, block| registry.create(ctx, block))
    }

    /// 用进程级注册中心构造算子链
    pub fn build_global(ctx: &BlockContext<'_>, config: &ChainConfig) -> BlockResult<Self> {
        global::with_registry(|registry| Self::build(registry, ctx, config))
    }

    fn build_with(
        ctx: &BlockContext<'_>,
        config: &ChainConfig,
        create: impl Fn(&BlockContext<'_>, &BlockConfig) -> BlockResult<BlockVariant>,
    ) -> BlockResult<Self> {
        if config.blocks.is_empty() {
            return Err(BlockError::EmptyChain);
        }
        config.validate()?;
        log::debug!("构造算子链: {:?}", config.block_names());

        let mut blocks = Vec::with_capacity(config.blocks.len());
        let mut current = ctx.clone();
        for (stage, block_config) in config.blocks.iter().enumerate().rev() {
            let block = create(&current, block_config)?;
            if !block.outer_function_space().ptr_eq(&current.outer_function_space) {
                return Err(BlockError::ChainMismatch {
                    stage,
                    detail: format!(
                        "'{}' 的外侧函数空间 {} 不是 {}",
                        block.name(),
                        block.outer_function_space(),
                        current.outer_function_space
                    ),
                });
            }
            if !current.outer_variables.is_empty()
                && *block.outer_variables() != current.outer_variables
            {
                return Err(BlockError::ChainMismatch {
                    stage,
                    detail: format!(
                        "'{}' 的外侧变量 {} 不是 {}",
                        block.name(),
                        block.outer_variables(),
                        current.outer_variables
                    ),
                });
            }
            current = current.inward(&block);
            blocks.push(block);
        }
        blocks.reverse();

        Ok(Self {
            blocks,
            outer_function_space: ctx.outer_function_space.clone(),
            comm: Arc::clone(&ctx.comm),
        })
    }

    /// 块数
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// 是否为空（构造保证非空）
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// 块名（应用顺序）
    pub fn names(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.name()).collect()
    }

    /// 各块（应用顺序）
    pub fn blocks(&self) -> &[BlockVariant] {
        &self.blocks
    }

    fn innermost(&self) -> &BlockVariant {
        // 构造保证非空
        &self.blocks[0]
    }

    fn outermost(&self) -> &BlockVariant {
        &self.blocks[self.blocks.len() - 1]
    }

    /// 最内侧变量
    pub fn inner_variables(&self) -> &VariableSet {
        self.innermost().inner_variables()
    }

    /// 最内侧函数空间
    pub fn inner_function_space(&self) -> &FunctionSpace {
        self.innermost().inner_function_space()
    }

    /// 模式变量
    pub fn outer_variables(&self) -> &VariableSet {
        self.outermost().outer_variables()
    }

    /// 模式函数空间
    pub fn outer_function_space(&self) -> &FunctionSpace {
        &self.outer_function_space
    }

    /// 模式数据分块分布时，最内侧数据的分布
    pub fn inner_distribution(&self) -> Distribution {
        self.blocks
            .iter()
            .rev()
            .fold(Distribution::Partitioned, |dist, b| b.inner_distribution(dist))
    }

    /// 正向：分析表示 → 模式表示
    pub fn apply(&self, mut fields: FieldSet) -> BlockResult<FieldSet> {
        for block in &self.blocks {
            block.multiply(&mut fields)?;
        }
        Ok(fields)
    }

    /// 伴随：模式表示 → 分析表示
    pub fn apply_adjoint(&self, mut fields: FieldSet) -> BlockResult<FieldSet> {
        for block in self.blocks.iter().rev() {
            block.multiply_ad(&mut fields)?;
        }
        Ok(fields)
    }

    /// 校准逆：模式表示 → 分析表示
    pub fn apply_calibration_inverse(&self, mut fields: FieldSet) -> BlockResult<FieldSet> {
        for block in self.blocks.iter().rev() {
            block.calibration_inverse_multiply(&mut fields)?;
        }
        Ok(fields)
    }

    /// 整条链的伴随检验
    ///
    /// `inner` 位于最内侧，`outer` 位于模式网格。
    pub fn adjoint_test(&self, inner: &FieldSet, outer: &FieldSet) -> BlockResult<AdjointTestReport> {
        let forward = self.apply(inner.clone())?;
        let backward = self.apply_adjoint(outer.clone())?;
        let lhs = forward.dot(outer, self.comm.as_ref(), Distribution::Partitioned)?;
        let rhs = inner.dot(&backward, self.comm.as_ref(), self.inner_distribution())?;
        Ok(AdjointTestReport::new(lhs, rhs))
    }

    /// 输出链的文字描述
    pub fn describe(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "算子链 ({} 个块):", self.blocks.len())?;
        for block in &self.blocks {
            block.describe(out)?;
        }
        Ok(())
    }
}

impl fmt::Display for OperatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.describe(f)
    }
}
