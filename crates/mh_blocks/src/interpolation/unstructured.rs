// crates/mh_blocks/src/interpolation/unstructured.rs

//! 非结构点对点插值算子
//!
//! 在两个函数空间之间做纯水平插值，各层独立处理。
//! 权重只在构造时计算一次，之后正向与伴随共用：
//!
//! - `apply`:    target = W · source
//! - `apply_ad`: source = Wᵀ · target，再对源做全局归约
//!
//! 源（内部网格）在每个进程上完整复制，目标（模式网格）按分块分布。
//! 每个进程的 Wᵀ 只包含本地目标点的贡献，所以伴随结果需要
//! `all_reduce_sum` 才是完整的转置。

use std::sync::Arc;

use mh_fieldset::{Communicator, Field, FieldError, FieldResult, FieldSet, FunctionSpace};

use super::csr::CsrMatrix;
use super::weights::{compute_weights, InterpolationMethod};

/// 非结构插值算子
#[derive(Debug)]
pub struct UnstructuredInterpolation {
    method: InterpolationMethod,
    source: FunctionSpace,
    target: FunctionSpace,
    weights: CsrMatrix,
    comm: Arc<dyn Communicator>,
}

impl UnstructuredInterpolation {
    /// 创建插值算子并预计算权重
    pub fn new(
        method: InterpolationMethod,
        source: FunctionSpace,
        target: FunctionSpace,
        comm: Arc<dyn Communicator>,
    ) -> FieldResult<Self> {
        let weights = compute_weights(method, &source, &target)?;
        let (min_nnz, max_nnz) = weights.row_nnz_range();
        log::debug!(
            "插值权重 {} -> {} ({}): nnz={}, 每行 {}..={}, rank {}/{}",
            source,
            target,
            method.name(),
            weights.nnz(),
            min_nnz,
            max_nnz,
            comm.rank(),
            comm.size()
        );
        if min_nnz == 0 {
            log::warn!("部分目标点没有插值权重，其值将为 0");
        }

        Ok(Self {
            method,
            source,
            target,
            weights,
            comm,
        })
    }

    /// 插值方法
    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    /// 源函数空间
    pub fn source(&self) -> &FunctionSpace {
        &self.source
    }

    /// 目标函数空间
    pub fn target(&self) -> &FunctionSpace {
        &self.target
    }

    /// 权重矩阵 (n_target × n_source)
    pub fn weights(&self) -> &CsrMatrix {
        &self.weights
    }

    /// 正向插值：对 `target_fields` 中每个场，从同名源场插值
    ///
    /// `target_fields` 需预先按目标函数空间分配好。
    pub fn apply(&self, source_fields: &FieldSet, target_fields: &mut FieldSet) -> FieldResult<()> {
        for out in target_fields.iter_mut() {
            let src = source_fields.field(out.name())?;
            self.check_pair(src, &self.source, out, &self.target)?;
            for level in 0..out.levels() {
                self.weights.mul_vec(src.level(level), out.level_mut(level));
            }
        }
        Ok(())
    }

    /// 伴随插值：对 `source_fields` 中每个场，从同名目标场做转置插值
    ///
    /// `source_fields` 需预先按源函数空间分配好，原有值被覆盖。
    pub fn apply_ad(&self, target_fields: &FieldSet, source_fields: &mut FieldSet) -> FieldResult<()> {
        for out in source_fields.iter_mut() {
            let tgt = target_fields.field(out.name())?;
            self.check_pair(tgt, &self.target, out, &self.source)?;
            for level in 0..out.levels() {
                self.weights
                    .mul_vec_transpose(tgt.level(level), out.level_mut(level));
            }
            self.comm.all_reduce_sum(out.data_mut());
        }
        Ok(())
    }

    fn check_pair(
        &self,
        input: &Field,
        input_space: &FunctionSpace,
        output: &Field,
        output_space: &FunctionSpace,
    ) -> FieldResult<()> {
        input_space.check_field(input)?;
        output_space.check_field(output)?;
        if input.levels() != output.levels() {
            return Err(FieldError::ShapeMismatch {
                name: input.name().to_string(),
                left: input.shape(),
                right: output.shape(),
            });
        }
        Ok(())
    }
}
