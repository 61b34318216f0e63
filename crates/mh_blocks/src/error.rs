// crates/mh_blocks/src/error.rs

//! 算子块错误类型
//!
//! 所有错误都是致命的：当前算子链的构建或应用立即中止，不做内部重试。
//! 每个变体都携带块名与出错的变量/函数空间名，便于对照配置定位。

use mh_config::ConfigError;
use mh_fieldset::FieldError;
use thiserror::Error;

/// 算子块结果类型
pub type BlockResult<T> = Result<T, BlockError>;

/// 算子块错误
#[derive(Error, Debug)]
pub enum BlockError {
    /// 同名块重复注册（启动期编程错误）
    #[error("算子块 '{name}' 已在注册中心注册")]
    DuplicateRegistration {
        /// 块名
        name: String,
    },

    /// 注册阶段已结束
    #[error("注册中心已封闭，无法再注册算子块 '{name}'")]
    RegistrySealed {
        /// 块名
        name: String,
    },

    /// 配置引用了未注册的块
    #[error("算子块 '{name}' 不存在于注册中心")]
    UnknownBlockType {
        /// 块名
        name: String,
    },

    /// 变量集不一致
    #[error("算子块 '{block}' 变量不匹配: {detail}")]
    VariableMismatch {
        /// 块名
        block: String,
        /// 详情
        detail: String,
    },

    /// 场集合中出现块未声明的变量
    #[error("变量 '{variable}' 不在算子块 '{block}' 的变量列表中")]
    UnknownVariable {
        /// 块名
        block: String,
        /// 变量名
        variable: String,
    },

    /// 场的水平尺寸与期望的函数空间不一致
    #[error(
        "算子块 '{block}': 变量 '{variable}' 与函数空间 {space} 尺寸不匹配 (期望 {expected}, 实际 {actual})"
    )]
    DiscretizationSizeMismatch {
        /// 块名
        block: String,
        /// 变量名
        variable: String,
        /// 函数空间名
        space: String,
        /// 期望水平点数
        expected: usize,
        /// 实际水平点数
        actual: usize,
    },

    /// 构造所需的场缺失（轨迹、统计量等）
    #[error("算子块 '{block}' 缺少场 '{field}'")]
    MissingField {
        /// 块名
        block: String,
        /// 场名
        field: String,
    },

    /// 块参数取值无效
    #[error("算子块 '{block}' 参数 '{key}' 无效: {reason}")]
    InvalidParameter {
        /// 块名
        block: String,
        /// 参数键
        key: String,
        /// 原因
        reason: String,
    },

    /// 算子链为空
    #[error("算子链不含任何算子块")]
    EmptyChain,

    /// 相邻块之间的变量或函数空间衔接不上
    #[error("算子链第 {stage} 级衔接错误: {detail}")]
    ChainMismatch {
        /// 块序号（声明顺序）
        stage: usize,
        /// 详情
        detail: String,
    },

    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 数据模型错误
    #[error(transparent)]
    Field(#[from] FieldError),
}

impl BlockError {
    /// 变量不匹配的便捷构造
    pub fn variable_mismatch(block: &str, detail: impl Into<String>) -> Self {
        Self::VariableMismatch {
            block: block.to_string(),
            detail: detail.into(),
        }
    }

    /// 未知变量的便捷构造
    pub fn unknown_variable(block: &str, variable: &str) -> Self {
        Self::UnknownVariable {
            block: block.to_string(),
            variable: variable.to_string(),
        }
    }

    /// 缺失场的便捷构造
    pub fn missing_field(block: &str, field: &str) -> Self {
        Self::MissingField {
            block: block.to_string(),
            field: field.to_string(),
        }
    }

    /// 将数据模型层的尺寸错误附上块名
    ///
    /// 其它错误原样包装。
    pub fn from_field(block: &str, err: FieldError) -> Self {
        match err {
            FieldError::SizeMismatch {
                name,
                space,
                expected,
                actual,
            } => Self::DiscretizationSizeMismatch {
                block: block.to_string(),
                variable: name,
                space,
                expected,
                actual,
            },
            FieldError::MissingField { name } => Self::UnknownVariable {
                block: block.to_string(),
                variable: name,
            },
            other => Self::Field(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_field_attaches_block_name() {
        let field_err = FieldError::SizeMismatch {
            name: "temperature".into(),
            space: "gsi".into(),
            expected: 100,
            actual: 400,
        };
        let err = BlockError::from_field("gsi interpolation to model grid", field_err);
        match &err {
            BlockError::DiscretizationSizeMismatch {
                block,
                variable,
                expected,
                actual,
                ..
            } => {
                assert_eq!(block, "gsi interpolation to model grid");
                assert_eq!(variable, "temperature");
                assert_eq!((*expected, *actual), (100, 400));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("gsi interpolation to model grid"));
    }

    #[test]
    fn test_missing_field_becomes_unknown_variable() {
        let err = BlockError::from_field("air temperature", FieldError::missing("humidity"));
        assert!(matches!(err, BlockError::UnknownVariable { .. }));
    }

    #[test]
    fn test_messages_name_offenders() {
        let err = BlockError::unknown_variable("air temperature", "humidity");
        let msg = err.to_string();
        assert!(msg.contains("air temperature"));
        assert!(msg.contains("humidity"));
    }
}
