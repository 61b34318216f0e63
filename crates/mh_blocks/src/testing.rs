// crates/mh_blocks/src/testing.rs

//! 伴随（点积）检验工具
//!
//! 对线性算子 M 与任意 x（内侧）、y（外侧），精确伴随满足
//!
//! ```text
//! <M x, y>_outer = <x, Mᵀ y>_inner
//! ```
//!
//! 内积按各自的数据分布计算：分块数据做全局归约，复制数据不归约。

use mh_fieldset::{Communicator, Distribution, Field, FieldResult, FieldSet, VariableSet};

use crate::block::OuterBlock;
use crate::error::BlockResult;

/// 相对误差的分母下限
const DENOMINATOR_FLOOR: f64 = 1e-300;

/// 伴随检验结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjointTestReport {
    /// <M x, y>
    pub lhs: f64,
    /// <x, Mᵀ y>
    pub rhs: f64,
    /// |lhs - rhs| / max(|lhs|, |rhs|)
    pub relative_error: f64,
}

impl AdjointTestReport {
    /// 由两侧内积创建
    pub fn new(lhs: f64, rhs: f64) -> Self {
        let scale = lhs.abs().max(rhs.abs()).max(DENOMINATOR_FLOOR);
        Self {
            lhs,
            rhs,
            relative_error: (lhs - rhs).abs() / scale,
        }
    }

    /// 相对误差是否在容差内
    pub fn passed(&self, tolerance: f64) -> bool {
        self.relative_error <= tolerance
    }
}

/// 单个块的伴随检验
///
/// `inner` 位于块内侧，`outer` 位于块外侧，两者都不会被修改。
pub fn adjoint_test(
    block: &dyn OuterBlock,
    inner: &FieldSet,
    outer: &FieldSet,
    comm: &dyn Communicator,
    outer_distribution: Distribution,
) -> BlockResult<AdjointTestReport> {
    let mut forward = inner.clone();
    block.multiply(&mut forward)?;
    let mut backward = outer.clone();
    block.multiply_ad(&mut backward)?;

    let lhs = forward.dot(outer, comm, outer_distribution)?;
    let rhs = inner.dot(&backward, comm, block.inner_distribution(outer_distribution))?;
    let report = AdjointTestReport::new(lhs, rhs);
    log::debug!(
        "{} 伴随检验: lhs={:e}, rhs={:e}, 相对误差={:e}",
        block.name(),
        report.lhs,
        report.rhs,
        report.relative_error
    );
    Ok(report)
}

/// 线性同余伪随机数生成器（结果可复现）
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    /// 以种子创建
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0x5DEE_CE66_D,
        }
    }

    /// [-1, 1) 内的下一个值
    pub fn next_f64(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let unit = (self.state >> 11) as f64 / (1u64 << 53) as f64;
        2.0 * unit - 1.0
    }
}

/// 为每个变量生成伪随机场
pub fn random_fieldset(vars: &VariableSet, n_points: usize, seed: u64) -> FieldResult<FieldSet> {
    let mut rng = Lcg::new(seed);
    vars.iter()
        .map(|v| {
            let data = (0..v.levels * n_points).map(|_| rng.next_f64()).collect();
            Field::from_data(v.name.clone(), v.levels, n_points, data)
        })
        .collect()
}
