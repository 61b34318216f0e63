// crates/mh_blocks/src/interpolation/mod.rs

//! 水平插值
//!
//! # 模块
//!
//! - [`csr`]: 权重稀疏矩阵
//! - [`weights`]: 最近邻 / 反距离加权 / 双线性权重
//! - [`unstructured`]: 点对点插值算子（正向与伴随）
//! - [`grid`]: 内部网格参数
//! - [`block`]: 内部网格 → 模式网格插值块

pub mod block;
pub mod csr;
pub mod grid;
pub mod unstructured;
pub mod weights;

pub use block::{parameters, GridInterpolationBlock, InterpolationParameters, BLOCK_NAME};
pub use csr::{CsrBuilder, CsrMatrix};
pub use grid::{InternalGridParameters, INTERNAL_GRID_NAME};
pub use unstructured::UnstructuredInterpolation;
pub use weights::{compute_weights, InterpolationMethod};
