//! 规则编译器
//!
//! 将规则文本解析为扁平解析序列，校验结构并预提取属性路径。

use crate::error::{Result, RuleError};
use crate::metrics;
use crate::models::{Node, ParsedSequence};
use crate::parser::{self, DEFAULT_MAX_NESTING_DEPTH};
use std::collections::BTreeSet;
use tracing::debug;

/// 编译后的规则
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    /// 原始规则文本
    pub query: String,
    /// 解析序列
    pub sequence: ParsedSequence,
    /// 规则中引用的所有属性路径
    pub required_fields: BTreeSet<String>,
}

impl CompiledRule {
    /// 获取解析序列
    pub fn sequence(&self) -> &ParsedSequence {
        &self.sequence
    }

    /// 规则可能读取的上下文路径（按字典序）
    pub fn property_paths(&self) -> impl Iterator<Item = &str> {
        self.required_fields.iter().map(String::as_str)
    }
}

/// 规则编译器
#[derive(Debug, Clone)]
pub struct RuleCompiler {
    max_nesting_depth: usize,
}

impl RuleCompiler {
    pub fn new() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    /// 设置最大括号嵌套层数
    pub fn with_max_nesting_depth(mut self, max_nesting_depth: usize) -> Self {
        self.max_nesting_depth = max_nesting_depth;
        self
    }

    pub fn max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
    }

    /// 编译规则文本
    pub fn compile(&self, query: &str) -> Result<CompiledRule> {
        let result =
            parser::parse_with_max_depth(query, self.max_nesting_depth).and_then(|sequence| {
                self.validate_sequence(&sequence, "root")?;
                Ok(sequence)
            });

        let sequence = match result {
            Ok(sequence) => sequence,
            Err(e) => {
                metrics::record_compilation(false);
                debug!(query, error = %e, "规则编译失败");
                return Err(e);
            }
        };

        let required_fields = self.extract_fields(&sequence);
        metrics::record_compilation(true);
        debug!(
            query,
            nodes = sequence.len(),
            fields = required_fields.len(),
            "规则已编译"
        );

        Ok(CompiledRule {
            query: query.to_string(),
            sequence,
            required_fields,
        })
    }

    /// 验证序列结构：条件/组与连接词交替出现，且不以连接词结尾
    fn validate_sequence(&self, sequence: &ParsedSequence, path: &str) -> Result<()> {
        if sequence.is_empty() {
            return Err(RuleError::ParseError(format!("表达式 '{}' 不能为空", path)));
        }

        for (i, node) in sequence.iter().enumerate() {
            let expects_operand = i % 2 == 0;
            match node {
                Node::Connective(_) if expects_operand => {
                    return Err(RuleError::ParseError(format!(
                        "表达式 '{}' 的第 {} 个节点应为条件或分组",
                        path, i
                    )));
                }
                Node::Condition(_) | Node::Group(_) if !expects_operand => {
                    return Err(RuleError::ParseError(format!(
                        "表达式 '{}' 的第 {} 个节点应为 and / or",
                        path, i
                    )));
                }
                Node::Group(inner) => {
                    self.validate_sequence(inner, &format!("{}[{}]", path, i))?;
                }
                _ => {}
            }
        }

        if sequence.len() % 2 == 0 {
            return Err(RuleError::ParseError(format!(
                "表达式 '{}' 不能以 and / or 结尾",
                path
            )));
        }

        Ok(())
    }

    /// 提取规则中使用的所有字段
    fn extract_fields(&self, sequence: &ParsedSequence) -> BTreeSet<String> {
        let mut fields = BTreeSet::new();
        self.collect_fields(sequence, &mut fields);
        fields
    }

    /// 递归收集字段
    fn collect_fields(&self, sequence: &ParsedSequence, fields: &mut BTreeSet<String>) {
        for node in sequence {
            match node {
                Node::Condition(cond) => {
                    let mut paths = Vec::new();
                    cond.left.collect_paths(&mut paths);
                    cond.right.collect_paths(&mut paths);
                    fields.extend(paths.into_iter().map(str::to_string));
                }
                Node::Group(inner) => self.collect_fields(inner, fields),
                Node::Connective(_) => {}
            }
        }
    }
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new()
    }
}
