//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则解析失败: {0}")]
    ParseError(String),

    #[error("缺少变量: {0}")]
    MissingVariable(String),

    #[error("未知的操作符: '{0}'")]
    UnknownOperator(String),

    #[error("类型不匹配: 操作符 {operator} 不支持 {left} 与 {right}")]
    TypeMismatch {
        operator: String,
        left: String,
        right: String,
    },

    #[error("规则未找到: {0}")]
    RuleNotFound(String),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RuleError {
    /// 是否为缺少变量错误
    pub fn is_missing_variable(&self) -> bool {
        matches!(self, Self::MissingVariable(_))
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
