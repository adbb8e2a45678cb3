//! 规则执行器
//!
//! 从左到右扫描解析序列并短路求值：
//! - 遇到 `or` 且当前结果为真，立即返回 `true`
//! - 遇到 `and` 且当前结果为假，立即返回 `false`
//! - 否则继续，由下一个条件或分组覆盖当前结果
//!
//! `and` / `or` 之间没有优先级，`A and B or C` 在 A 为假时直接返回 `false`。

use crate::error::Result;
use crate::evaluator::ConditionEvaluator;
use crate::metrics;
use crate::models::{Condition, EvaluationContext, EvaluationResult, Node, ParsedSequence};
use crate::operators::LogicalOperator;
use crate::resolver::PathResolver;
use std::time::Instant;
use tracing::trace;

/// 规则执行器
#[derive(Clone, Default)]
pub struct RuleExecutor {
    resolver: PathResolver,
    /// 是否记录详细评估追踪
    trace_enabled: bool,
}

impl RuleExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义的路径解析器
    pub fn with_resolver(mut self, resolver: PathResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    /// 评估解析序列，只返回布尔结果
    pub fn evaluate(
        &self,
        sequence: &ParsedSequence,
        context: Option<&EvaluationContext>,
    ) -> Result<bool> {
        let start = Instant::now();
        let outcome = self.evaluate_sequence(sequence, context, None, "root");
        Self::record(&outcome, start);
        outcome
    }

    /// 执行规则评估，返回匹配结果和评估追踪
    pub fn execute(
        &self,
        sequence: &ParsedSequence,
        context: Option<&EvaluationContext>,
    ) -> Result<EvaluationResult> {
        let start = Instant::now();
        let mut result = EvaluationResult::new();

        let outcome = self.evaluate_sequence(sequence, context, Some(&mut result), "root");
        Self::record(&outcome, start);

        result.matched = outcome?;
        result.evaluation_time_us = start.elapsed().as_micros() as u64;

        Ok(result)
    }

    fn record(outcome: &Result<bool>, start: Instant) {
        let label = match outcome {
            Ok(true) => "matched",
            Ok(false) => "not_matched",
            Err(_) => "error",
        };
        metrics::record_evaluation(label, start.elapsed().as_secs_f64());
    }

    /// 扫描序列（顶层与每个分组使用同一算法）
    fn evaluate_sequence(
        &self,
        sequence: &ParsedSequence,
        context: Option<&EvaluationContext>,
        mut result: Option<&mut EvaluationResult>,
        path: &str,
    ) -> Result<bool> {
        let mut passed = false;

        for (i, node) in sequence.iter().enumerate() {
            let node_path = format!("{}[{}]", path, i);

            match node {
                Node::Condition(cond) => {
                    passed =
                        self.evaluate_condition(cond, context, result.as_deref_mut(), &node_path)?;
                }
                Node::Group(inner) => {
                    passed =
                        self.evaluate_sequence(inner, context, result.as_deref_mut(), &node_path)?;
                }
                Node::Connective(LogicalOperator::Or) if passed => {
                    trace!(path = %node_path, "OR 短路");
                    if let Some(result) = result.as_deref_mut() {
                        self.push_trace(result, format!("{}: OR 短路 - 前项为真", node_path));
                    }
                    return Ok(true);
                }
                Node::Connective(LogicalOperator::And) if !passed => {
                    trace!(path = %node_path, "AND 短路");
                    if let Some(result) = result.as_deref_mut() {
                        self.push_trace(result, format!("{}: AND 短路 - 前项为假", node_path));
                    }
                    return Ok(false);
                }
                Node::Connective(_) => {}
            }
        }

        Ok(passed)
    }

    /// 评估条件节点
    fn evaluate_condition(
        &self,
        cond: &Condition,
        context: Option<&EvaluationContext>,
        result: Option<&mut EvaluationResult>,
        path: &str,
    ) -> Result<bool> {
        let left = self.resolver.expand(&cond.left, context)?;
        let right = self.resolver.expand(&cond.right, context)?;

        let matched = ConditionEvaluator::evaluate(&left, cond.operator, &right)?;

        if let Some(result) = result {
            self.push_trace(
                result,
                format!(
                    "{}: {} ({} {} {}) => {}",
                    path,
                    cond,
                    left,
                    cond.operator,
                    right,
                    if matched { "MATCHED" } else { "NOT_MATCHED" }
                ),
            );

            if matched {
                result.matched_conditions.push(cond.to_string());
            }
        }

        Ok(matched)
    }

    fn push_trace(&self, result: &mut EvaluationResult, line: String) {
        if self.trace_enabled {
            result.evaluation_trace.push(line);
        }
    }
}
