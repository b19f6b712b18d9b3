//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。
//! Content is first read into a generic JSON tree so that dotted overrides
//! can be applied before the typed `RunConfig` is built.

use contracts::{ContractError, RunConfig};
use serde_json::Value;

use crate::overrides::{apply_overrides, Override};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析为通用配置树
pub fn parse_tree(content: &str, format: ConfigFormat) -> Result<Value, ContractError> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ContractError::ConfigParse {
            message: format!("TOML parse error: {e}"),
            source: Some(Box::new(e)),
        }),
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
                message: format!("JSON parse error: {e}"),
                source: Some(Box::new(e)),
            })
        }
    }
}

/// 配置树 -> RunConfig
pub fn from_tree(tree: Value) -> Result<RunConfig, ContractError> {
    serde_json::from_value(tree).map_err(|e| ContractError::ConfigParse {
        message: format!("invalid configuration: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置，并应用覆盖项
pub fn parse(
    content: &str,
    format: ConfigFormat,
    overrides: &[Override],
) -> Result<RunConfig, ContractError> {
    let mut tree = parse_tree(content, format)?;
    apply_overrides(&mut tree, overrides)?;
    from_tree(tree)
}
