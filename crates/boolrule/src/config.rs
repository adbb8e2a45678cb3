//! 引擎配置
//!
//! 支持配置文件加载与环境变量覆盖。

use crate::parser::DEFAULT_MAX_NESTING_DEPTH;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 规则引擎配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 首次评估时才编译规则
    pub lazy: bool,
    /// 最大括号嵌套层数
    pub max_nesting_depth: usize,
    /// 评估时记录详细追踪
    pub trace: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lazy: false,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            trace: false,
        }
    }
}

impl EngineConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. 内置默认值
    /// 2. {CONFIG_DIR}/boolrule.toml（可选，CONFIG_DIR 默认为 config）
    /// 3. 环境变量（BOOLRULE_ 前缀，如 BOOLRULE_MAX_NESTING_DEPTH -> max_nesting_depth）
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
        Self::load_from(Path::new(&config_dir).join("boolrule.toml"))
    }

    /// 从指定文件和环境变量加载配置
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Config::builder()
            .set_default("lazy", defaults.lazy)?
            .set_default("max_nesting_depth", defaults.max_nesting_depth as u64)?
            .set_default("trace", defaults.trace)?
            .add_source(File::from(path.as_ref()).required(false))
            // 环境变量覆盖，单下划线属于字段名本身
            .add_source(
                Environment::with_prefix("BOOLRULE")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
