//! 布尔规则
//!
//! 规则文本只编译一次，之后的每次评估都复用缓存的解析序列。

use crate::compiler::{CompiledRule, RuleCompiler};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::executor::RuleExecutor;
use crate::models::{EvaluationContext, EvaluationResult};
use crate::resolver::PathResolver;
use once_cell::sync::{Lazy, OnceCell};
use std::fmt;

/// 匹配所有上下文的规则文本
pub const MATCH_ALL: &str = "*";

static MATCH_ALL_COMPILED: Lazy<CompiledRule> = Lazy::new(|| CompiledRule {
    query: MATCH_ALL.to_string(),
    sequence: Default::default(),
    required_fields: Default::default(),
});

/// 布尔规则
///
/// ```
/// use boolrule::{BoolRule, EvaluationContext};
/// use serde_json::json;
///
/// let rule = BoolRule::new("foo = \"bar\" and baz > 10").unwrap();
/// let context = EvaluationContext::new(json!({"foo": "bar", "baz": 20}));
/// assert!(rule.test(Some(&context)).unwrap());
/// ```
pub struct BoolRule {
    query: String,
    compiler: RuleCompiler,
    executor: RuleExecutor,
    compiled: OnceCell<CompiledRule>,
}

impl BoolRule {
    /// 创建规则并立即编译
    pub fn new(query: impl Into<String>) -> Result<Self> {
        Self::with_config(query, &EngineConfig::default())
    }

    /// 创建规则，首次评估时才编译
    pub fn lazy(query: impl Into<String>) -> Self {
        Self::build(query.into(), &EngineConfig::default())
    }

    /// 按配置创建规则（`config.lazy` 为假时立即编译，`*` 规则从不编译）
    pub fn with_config(query: impl Into<String>, config: &EngineConfig) -> Result<Self> {
        let rule = Self::build(query.into(), config);
        if !config.lazy && !rule.is_match_all() {
            rule.compile()?;
        }
        Ok(rule)
    }

    fn build(query: String, config: &EngineConfig) -> Self {
        let mut executor = RuleExecutor::new();
        if config.trace {
            executor = executor.with_trace();
        }

        Self {
            query,
            compiler: RuleCompiler::new().with_max_nesting_depth(config.max_nesting_depth),
            executor,
            compiled: OnceCell::new(),
        }
    }

    /// 使用自定义的路径解析器（如替换或追加 [`Accessor`](crate::resolver::Accessor)）
    pub fn with_resolver(mut self, resolver: PathResolver) -> Self {
        self.executor = self.executor.with_resolver(resolver);
        self
    }

    /// 原始规则文本
    pub fn query(&self) -> &str {
        &self.query
    }

    /// 是否为匹配所有上下文的 `*` 规则
    pub fn is_match_all(&self) -> bool {
        self.query == MATCH_ALL
    }

    /// 是否已编译
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// 编译规则，已编译时直接返回缓存结果
    ///
    /// `*` 规则不需要编译，返回共享的空序列且不标记为已编译。编译失败不会被缓存。
    pub fn compile(&self) -> Result<&CompiledRule> {
        if self.is_match_all() {
            return Ok(Lazy::force(&MATCH_ALL_COMPILED));
        }
        self.compiled.get_or_try_init(|| self.compiler.compile(&self.query))
    }

    /// 已编译的规则（未编译时为 `None`）
    pub fn compiled(&self) -> Option<&CompiledRule> {
        self.compiled.get()
    }

    /// 使用上下文评估规则
    pub fn test(&self, context: Option<&EvaluationContext>) -> Result<bool> {
        if self.is_match_all() {
            return Ok(true);
        }

        let compiled = self.compile()?;
        self.executor.evaluate(compiled.sequence(), context)
    }

    /// 评估规则并返回匹配的条件、评估追踪和耗时
    pub fn explain(&self, context: Option<&EvaluationContext>) -> Result<EvaluationResult> {
        if self.is_match_all() {
            let mut result = EvaluationResult::new();
            result.matched = true;
            return Ok(result);
        }

        let compiled = self.compile()?;
        self.executor
            .clone()
            .with_trace()
            .execute(compiled.sequence(), context)
    }
}

impl fmt::Debug for BoolRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoolRule")
            .field("query", &self.query)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

impl fmt::Display for BoolRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleError;
    use serde_json::json;

    #[test]
    fn test_eager_compile() {
        let rule = BoolRule::new("5 > 3").unwrap();
        assert!(rule.is_compiled());
        assert!(rule.test(None).unwrap());
    }

    #[test]
    fn test_eager_compile_reports_parse_error() {
        let err = BoolRule::new("5 > 4)").unwrap_err();
        assert!(matches!(err, RuleError::ParseError(_)));
    }

    #[test]
    fn test_lazy_compile() {
        let rule = BoolRule::lazy("5 > 3");
        assert!(!rule.is_compiled());
        assert!(rule.compiled().is_none());

        assert!(rule.test(None).unwrap());
        assert!(rule.is_compiled());
    }

    #[test]
    fn test_lazy_parse_error_surfaces_on_test() {
        let rule = BoolRule::lazy("1=1 and 2 in (1, 3 = 3)");
        let err = rule.test(None).unwrap_err();
        assert!(matches!(err, RuleError::ParseError(_)));
        assert!(!rule.is_compiled());
        assert!(rule.test(None).is_err());
    }

    #[test]
    fn test_match_all() {
        let rule = BoolRule::new("*").unwrap();
        assert!(rule.is_match_all());
        assert!(rule.test(None).unwrap());
        assert!(rule.test(Some(&EvaluationContext::default())).unwrap());
        assert!(rule.explain(None).unwrap().matched);
    }

    #[test]
    fn test_match_all_eager_is_not_compiled() {
        let rule = BoolRule::new(MATCH_ALL).unwrap();
        assert!(!rule.is_compiled());
        assert!(rule.compiled().is_none());
        assert!(rule.test(None).unwrap());

        assert!(rule.compile().unwrap().sequence().is_empty());
        assert!(!rule.is_compiled());
    }

    #[test]
    fn test_custom_resolver() {
        use crate::resolver::{Accessor, KeyAccessor};
        use std::borrow::Cow;
        use std::sync::Arc;

        /// 对象暴露 `size` 属性
        struct SizeAccessor;

        impl Accessor for SizeAccessor {
            fn name(&self) -> &'static str {
                "size"
            }

            fn access<'a>(
                &self,
                current: &'a serde_json::Value,
                segment: &str,
            ) -> Option<Cow<'a, serde_json::Value>> {
                match (current, segment) {
                    (serde_json::Value::Object(map), "size") => {
                        Some(Cow::Owned(serde_json::Value::from(map.len())))
                    }
                    _ => None,
                }
            }
        }

        let context = EvaluationContext::new(json!({"cart": {"a": 1, "b": 2}, "tags": [1, 2]}));

        let rule = BoolRule::new("cart.size = 2")
            .unwrap()
            .with_resolver(PathResolver::new(vec![
                Arc::new(SizeAccessor),
                Arc::new(KeyAccessor),
            ]));
        assert!(rule.test(Some(&context)).unwrap());

        // 未注册属性访问时 `length` 按键查找
        let rule = BoolRule::new("tags.length = 2")
            .unwrap()
            .with_resolver(PathResolver::new(vec![Arc::new(KeyAccessor)]));
        assert!(rule.test(Some(&context)).unwrap_err().is_missing_variable());
    }

    #[test]
    fn test_match_all_lazy_never_parses() {
        let rule = BoolRule::lazy("*");
        assert!(rule.test(None).unwrap());
        assert!(!rule.is_compiled());
    }

    #[test]
    fn test_compile_is_cached() {
        let rule = BoolRule::new("a = 1 or b = 2").unwrap();
        let first = rule.compile().unwrap() as *const CompiledRule;
        let second = rule.compile().unwrap() as *const CompiledRule;
        assert_eq!(first, second);
    }

    #[test]
    fn test_repeated_tests_are_stable() {
        let rule = BoolRule::new("x in (5, 6, 7)").unwrap();
        let hit = EvaluationContext::new(json!({"x": 5}));
        let miss = EvaluationContext::new(json!({"x": 8}));

        for _ in 0..3 {
            assert!(rule.test(Some(&hit)).unwrap());
            assert!(!rule.test(Some(&miss)).unwrap());
        }
    }

    #[test]
    fn test_with_config() {
        let config = EngineConfig {
            lazy: true,
            max_nesting_depth: 1,
            trace: false,
        };

        let rule = BoolRule::with_config("((a = 1))", &config).unwrap();
        assert!(!rule.is_compiled());
        assert!(rule.test(None).is_err());

        let config = EngineConfig {
            lazy: false,
            ..config
        };
        assert!(BoolRule::with_config("((a = 1))", &config).is_err());
    }

    #[test]
    fn test_explain() {
        let rule = BoolRule::new("a > 1 or b > 1").unwrap();
        let context = EvaluationContext::new(json!({"a": 5}));
        let result = rule.explain(Some(&context)).unwrap();

        assert!(result.matched);
        assert_eq!(result.matched_conditions, vec!["a > 1"]);
        assert!(result.evaluation_trace.iter().any(|t| t.contains("OR 短路")));
    }

    #[test]
    fn test_rule_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BoolRule>();
    }

    #[test]
    fn test_debug_and_display() {
        let rule = BoolRule::lazy("a = 1");
        assert_eq!(rule.to_string(), "a = 1");
        assert!(format!("{:?}", rule).contains("compiled: false"));
    }
}
