// crates/mh_blocks/src/lib.rs

//! MariHydro 外层算子块
//!
//! 背景误差协方差建模中，模式的原生变量/网格表示与内部分析表示之间
//! 由一串外层算子块连接。每个块提供正向切线性变换、其精确伴随，
//! 以及可选的校准逆变换。
//!
//! # 设计原则
//!
//! 1. **伴随精确**: 正向与伴随共用同一份冻结状态，点积检验相对误差 < 1e-10
//! 2. **整体替换**: 变换在新集合中构建，成功后才替换输入，出错时输入不变
//! 3. **显式失败**: 未知变量、尺寸不符一律报错，从不静默重采样
//!
//! # 模块结构
//!
//! - `block`: 算子块接口 [`OuterBlock`]、构造上下文、内置块集合 [`BlockVariant`]
//! - `registry`: 块名 → 工厂的注册中心（含进程级两阶段注册中心）
//! - `interpolation`: 内部网格 → 模式网格插值块及其权重/稀疏矩阵
//! - `vader`: 变量变换块（位温 → 气温）
//! - `std_dev`: 标准差缩放块
//! - `chain`: 算子链 [`OperatorChain`]
//! - `testing`: 伴随检验与可复现随机场
//!
//! # 使用示例
//!
//! ```ignore
//! use mh_blocks::{BlockContext, OperatorChain};
//! use mh_config::ChainConfig;
//!
//! let config = ChainConfig::from_file("chain.json")?;
//! let ctx = BlockContext::new(comm, model_space, &xb, &fg)
//!     .with_outer_variables(model_vars);
//! let chain = OperatorChain::build_global(&ctx, &config)?;
//!
//! let increment = chain.apply(analysis_increment)?;
//! let gradient = chain.apply_adjoint(model_gradient)?;
//! ```
//!
//! # 特性开关
//!
//! - `parallel`: 稀疏矩阵-向量乘法使用 rayon 并行

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod chain;
pub mod error;
pub mod interpolation;
pub mod registry;
pub mod std_dev;
pub mod testing;
pub mod vader;

/// 层级标识
pub const LAYER: u8 = 3;

// 重导出核心类型
pub use block::{check_fields, BlockContext, BlockVariant, OuterBlock};
pub use chain::OperatorChain;
pub use error::{BlockError, BlockResult};
pub use interpolation::{GridInterpolationBlock, InterpolationMethod, InternalGridParameters};
pub use registry::{global, BlockFactory, BlockRegistry, MakeFn, ParameterSchema};
pub use std_dev::StdDevBlock;
pub use testing::{adjoint_test, random_fieldset, AdjointTestReport};
pub use vader::AirTemperatureBlock;
