// crates/mh_config/src/block_config.rs

//! BlockConfig - 单个算子块配置
//!
//! 通用字段（块名、输入/输出变量、活动变量）在这里解析，
//! 其余键原样保存在 `params` 中，由各算子块反序列化为自己的参数结构体。
//!
//! # JSON 示例
//!
//! ```json
//! {
//!   "block name": "gsi interpolation to model grid",
//!   "input variables": [{"name": "temperature", "levels": 2}],
//!   "output variables": [{"name": "temperature", "levels": 2}],
//!   "active variables": ["temperature"],
//!   "grid": {"nx": 10, "ny": 10}
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use mh_fieldset::VariableSet;

use crate::error::ConfigError;

/// 单个算子块配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockConfig {
    /// 块名（注册中心查找键）
    #[serde(rename = "block name")]
    pub name: String,

    /// 输入（内侧）变量
    #[serde(
        rename = "input variables",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub input_variables: Option<VariableSet>,

    /// 输出（外侧）变量
    #[serde(
        rename = "output variables",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub output_variables: Option<VariableSet>,

    /// 活动变量
    #[serde(
        rename = "active variables",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub active_variables: Vec<String>,

    /// 块专属参数
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl BlockConfig {
    /// 创建只含块名的配置
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_variables: None,
            output_variables: None,
            active_variables: Vec::new(),
            params: Map::new(),
        }
    }

    /// 设置输入变量
    pub fn with_input_variables(mut self, vars: VariableSet) -> Self {
        self.input_variables = Some(vars);
        self
    }

    /// 设置输出变量
    pub fn with_output_variables(mut self, vars: VariableSet) -> Self {
        self.output_variables = Some(vars);
        self
    }

    /// 输入输出设为同一变量集
    pub fn with_variables(self, vars: VariableSet) -> Self {
        self.with_input_variables(vars.clone())
            .with_output_variables(vars)
    }

    /// 设置活动变量
    pub fn with_active_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_variables = names.into_iter().map(Into::into).collect();
        self
    }

    /// 设置块专属参数
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// 从 JSON 字符串解析
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 输入变量，缺失时返回 `Missing`
    pub fn input_variables(&self) -> Result<&VariableSet, ConfigError> {
        self.input_variables
            .as_ref()
            .ok_or_else(|| ConfigError::Missing(format!("{}: input variables", self.name)))
    }

    /// 输出变量，缺失时返回 `Missing`
    pub fn output_variables(&self) -> Result<&VariableSet, ConfigError> {
        self.output_variables
            .as_ref()
            .ok_or_else(|| ConfigError::Missing(format!("{}: output variables", self.name)))
    }

    /// 将块专属参数反序列化为具体参数类型
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        serde_json::from_value(Value::Object(self.params.clone())).map_err(|e| {
            ConfigError::BlockParameters {
                block: self.name.clone(),
                message: e.to_string(),
            }
        })
    }

    /// 验证通用字段
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "block name".to_string(),
                value: self.name.clone(),
                reason: "块名不能为空".to_string(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for name in &self.active_variables {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: format!("{}: active variables", self.name),
                    value: name.clone(),
                    reason: "活动变量重复".to_string(),
                });
            }
        }
        Ok(())
    }
}
