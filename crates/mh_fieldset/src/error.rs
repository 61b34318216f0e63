// crates/mh_fieldset/src/error.rs

//! 数据模型层错误类型
//!
//! 提供 `FieldError` 枚举和 `FieldResult` 类型别名。
//! 所有错误都携带变量名或函数空间名，便于与配置对应。

use thiserror::Error;

/// 数据模型层结果类型
pub type FieldResult<T> = Result<T, FieldError>;

/// 变量集/场集合错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    /// 变量集中出现重复名称
    #[error("变量重复: {name}")]
    DuplicateVariable {
        /// 重复的变量名
        name: String,
    },

    /// 层数无效（必须 ≥ 1）
    #[error("变量 {name} 的层数无效: {levels}")]
    InvalidLevels {
        /// 变量名
        name: String,
        /// 给定层数
        levels: usize,
    },

    /// 同名变量层数不一致
    #[error("变量 {name} 层数冲突: {left} vs {right}")]
    LevelConflict {
        /// 变量名
        name: String,
        /// 左侧层数
        left: usize,
        /// 右侧层数
        right: usize,
    },

    /// 场集合中出现重复场
    #[error("场重复: {name}")]
    DuplicateField {
        /// 场名
        name: String,
    },

    /// 场不存在
    #[error("场不存在: {name}")]
    MissingField {
        /// 场名
        name: String,
    },

    /// 场数据长度与形状不匹配
    #[error("场 {name} 数据长度不匹配: 期望 {expected} (层数×水平点数), 实际 {actual}")]
    DataLength {
        /// 场名
        name: String,
        /// 期望长度
        expected: usize,
        /// 实际长度
        actual: usize,
    },

    /// 水平尺寸与函数空间不匹配
    #[error("场 {name} 与函数空间 {space} 水平尺寸不匹配: 期望 {expected}, 实际 {actual}")]
    SizeMismatch {
        /// 场名
        name: String,
        /// 函数空间名
        space: String,
        /// 期望水平点数
        expected: usize,
        /// 实际水平点数
        actual: usize,
    },

    /// 两个场形状（层数或水平尺寸）不一致
    #[error("场 {name} 形状不一致: {left:?} vs {right:?}")]
    ShapeMismatch {
        /// 场名
        name: String,
        /// 左侧 (层数, 水平点数)
        left: (usize, usize),
        /// 右侧 (层数, 水平点数)
        right: (usize, usize),
    },

    /// 函数空间定义无效
    #[error("函数空间 {space} 无效: {message}")]
    InvalidFunctionSpace {
        /// 函数空间名
        space: String,
        /// 原因
        message: String,
    },
}

impl FieldError {
    /// 缺失场的便捷构造
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingField { name: name.into() }
    }

    /// 无效函数空间的便捷构造
    pub fn invalid_space(space: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFunctionSpace {
            space: space.into(),
            message: message.into(),
        }
    }
}
