// crates/mh_config/src/chain_config.rs

//! ChainConfig - 算子链配置
//!
//! 块按正向应用顺序声明：第一个块最先被应用，最后一个块的输出位于模式网格上。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::block_config::BlockConfig;
use crate::error::ConfigError;

/// 算子链配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// 外层算子块（按正向应用顺序）
    #[serde(rename = "outer blocks", default)]
    pub blocks: Vec<BlockConfig>,
}

impl ChainConfig {
    /// 从块列表创建
    pub fn new(blocks: Vec<BlockConfig>) -> Self {
        Self { blocks }
    }

    /// 从 JSON 字符串解析
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        log::debug!("加载算子链配置: {}", path.as_ref().display());
        Self::from_json_str(&content)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blocks.is_empty() {
            return Err(ConfigError::Missing("outer blocks".to_string()));
        }
        for block in &self.blocks {
            block.validate()?;
        }
        Ok(())
    }

    /// 块名列表（声明顺序）
    pub fn block_names(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "outer blocks": [
            {
                "block name": "standard deviation",
                "active variables": ["temperature"],
                "default value": 2.0
            },
            {
                "block name": "gsi interpolation to model grid",
                "input variables": [{"name": "temperature", "levels": 2}],
                "output variables": [{"name": "temperature", "levels": 2}],
                "grid": {"nx": 10, "ny": 10}
            }
        ]
    }"#;

    #[test]
    fn test_parse_chain() {
        let config = ChainConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(
            config.block_names(),
            vec!["standard deviation", "gsi interpolation to model grid"]
        );
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert!(ChainConfig::from_json_str(r#"{"outer blocks": []}"#).is_err());
        assert!(ChainConfig::from_json_str("{}").is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let config = ChainConfig::from_json_str(SAMPLE).unwrap();
        let path = std::env::temp_dir().join(format!("mh_chain_{}.json", std::process::id()));
        config.save_to_file(&path).unwrap();
        let loaded = ChainConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let err = ChainConfig::from_file("/nonexistent/chain.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
