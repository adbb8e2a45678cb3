//! 规则操作符定义

use crate::error::RuleError;
use std::fmt;
use std::str::FromStr;

/// 条件操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // 通用比较
    Eq,
    Neq,

    // 有序比较
    Gt,
    Gte,
    Lt,
    Lte,

    // 成员检查
    In,
    NotIn,

    // 同一性检查
    Is,
    IsNot,

    // 集合操作
    Subset,
    Superset,
    Intersects,
}

impl Operator {
    /// 所有操作符
    pub const ALL: [Operator; 13] = [
        Self::Eq,
        Self::Neq,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::In,
        Self::NotIn,
        Self::Is,
        Self::IsNot,
        Self::Subset,
        Self::Superset,
        Self::Intersects,
    ];

    /// 该操作符可接受的全部写法
    pub fn tokens(&self) -> &'static [&'static str] {
        match self {
            Self::Eq => &["=", "==", "eq"],
            Self::Neq => &["!=", "ne", "≠"],
            Self::Gt => &[">", "gt"],
            Self::Gte => &[">=", "ge", "≥"],
            Self::Lt => &["<", "lt"],
            Self::Lte => &["<=", "le", "≤"],
            Self::In => &["in", "∈"],
            Self::NotIn => &["notin", "∉"],
            Self::Is => &["is"],
            Self::IsNot => &["isnot"],
            Self::Subset => &["⊆"],
            Self::Superset => &["⊇"],
            Self::Intersects => &["∩"],
        }
    }
}

impl FromStr for Operator {
    type Err = RuleError;

    /// 单词形式不区分大小写
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let lowered = token.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|op| op.tokens().contains(&lowered.as_str()))
            .ok_or_else(|| RuleError::UnknownOperator(token.to_string()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::In => "in",
            Self::NotIn => "notin",
            Self::Is => "is",
            Self::IsNot => "isnot",
            Self::Subset => "⊆",
            Self::Superset => "⊇",
            Self::Intersects => "∩",
        };
        write!(f, "{}", s)
    }
}

/// 逻辑连接词
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
        }
    }
}
