// crates/mh_config/src/error.rs

//! 配置层错误类型

use mh_fieldset::FieldError;

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 无效值
    #[error("无效值 '{key}': {value} - {reason}")]
    InvalidValue {
        /// 配置键
        key: String,
        /// 配置值
        value: String,
        /// 原因
        reason: String,
    },

    /// 缺失配置
    #[error("缺失配置: {0}")]
    Missing(String),

    /// 块参数反序列化失败
    #[error("算子块 '{block}' 参数错误: {message}")]
    BlockParameters {
        /// 块名
        block: String,
        /// 详情
        message: String,
    },

    /// 变量列表无效
    #[error("变量列表无效: {0}")]
    Variables(#[from] FieldError),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
