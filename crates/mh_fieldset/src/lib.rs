// crates/mh_fieldset/src/lib.rs

//! MariHydro 场数据模型层
//!
//! 为协方差算子链提供基础数据结构，无任何物理语义。
//!
//! # 模块概览
//!
//! - [`variables`]: 变量集（名称 + 垂直层数）
//! - [`field`]: 多层场 `Field` 与场集合 `FieldSet`
//! - [`function_space`]: 函数空间（点云/规则网格）
//! - [`geometry`]: 二维点与边界框
//! - [`comm`]: 进程间通信接口
//! - [`error`]: 错误类型
//!
//! # 设计原则
//!
//! 1. **不做隐式转换**: 场与函数空间水平尺寸不一致时报错，绝不静默重采样
//! 2. **层优先存储**: 各层独立，便于逐层做水平插值
//! 3. **廉价共享**: 函数空间内部 `Arc` 共享
//!
//! # 示例
//!
//! ```
//! use mh_fieldset::{BoundingBox, FieldSet, FunctionSpace, VariableSet};
//!
//! let fs = FunctionSpace::regular_grid("gsi", 10, 10, BoundingBox::new(0.0, 0.0, 1.0, 1.0)).unwrap();
//! let vars = VariableSet::from_pairs([("temperature", 2)]).unwrap();
//! let bundle = FieldSet::zeros_like(&vars, fs.size());
//! assert_eq!(bundle.get("temperature").unwrap().n_points(), 100);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod comm;
pub mod error;
pub mod field;
pub mod function_space;
pub mod geometry;
pub mod variables;

// 重导出常用类型
pub use comm::{Communicator, Distribution, SerialComm};
pub use error::{FieldError, FieldResult};
pub use field::{Field, FieldSet};
pub use function_space::{FunctionSpace, SpaceKind};
pub use geometry::{BoundingBox, Point2D};
pub use variables::{Variable, VariableSet};
