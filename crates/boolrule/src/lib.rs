//! 布尔规则引擎
//!
//! 将 `foo.bar = "x" and (y > 10 or y in (1, 2, 3))` 形式的规则文本编译为扁平的节点序列，
//! 再针对可选的上下文求值，支持：
//! - 字面量、属性路径与值列表
//! - 比较、成员与集合操作符
//! - 无优先级的从左到右短路求值
//! - 延迟编译与命名规则存储

pub mod compiler;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod metrics;
pub mod models;
pub mod operators;
pub mod parser;
pub mod resolver;
pub mod rule;
pub mod store;

pub use compiler::{CompiledRule, RuleCompiler};
pub use config::EngineConfig;
pub use error::{Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use executor::RuleExecutor;
pub use models::{
    Condition, EvaluationContext, EvaluationResult, Node, ParsedSequence, Value,
};
pub use operators::{LogicalOperator, Operator};
pub use parser::{parse, parse_with_max_depth, DEFAULT_MAX_NESTING_DEPTH};
pub use resolver::{Accessor, AttributeAccessor, KeyAccessor, PathResolver};
pub use rule::{BoolRule, MATCH_ALL};
pub use store::{RuleStore, RuleStoreStats};
