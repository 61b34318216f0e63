// crates/mh_config/src/lib.rs

//! MariHydro 算子链配置层
//!
//! 将 JSON 配置解析为算子块/算子链配置对象。本层只负责通用字段，
//! 块专属参数以 `serde_json::Map` 形式透传，由 `mh_blocks` 中各块
//! 反序列化为带默认值的参数结构体。
//!
//! # 模块概览
//!
//! - [`block_config`]: BlockConfig 单块配置
//! - [`chain_config`]: ChainConfig 算子链配置
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! Layer 3: mh_blocks   ─> 算子块、注册中心、算子链
//! Layer 2: mh_config   ─> BlockConfig, ChainConfig (本层)
//! Layer 1: mh_fieldset ─> VariableSet, FieldSet, FunctionSpace
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block_config;
pub mod chain_config;
pub mod error;

/// 层级标识
pub const LAYER: u8 = 2;

// 重导出核心类型
pub use block_config::BlockConfig;
pub use chain_config::ChainConfig;
pub use error::ConfigError;
