//! 规则引擎领域模型

use crate::error::Result;
use crate::operators::{LogicalOperator, Operator};
use serde::Serialize;
use std::fmt;

/// 操作数：字面量、属性路径或字面量列表
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
    /// 点号分隔的属性路径，如 `foo.bar.baz`，评估时从上下文中解析
    PropertyPath(String),
    /// 括号包裹、逗号分隔的值列表
    List(Vec<Value>),
}

impl Value {
    /// 收集值中引用的所有属性路径
    pub fn collect_paths<'a>(&'a self, paths: &mut Vec<&'a str>) {
        match self {
            Self::PropertyPath(path) => paths.push(path),
            Self::List(items) => items.iter().for_each(|item| item.collect_paths(paths)),
            _ => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(n) => {
                // 保证输出可重新解析为实数（必须带小数点）
                let mut s = format!("{:?}", n);
                if !s.contains('.') {
                    match s.find('e') {
                        Some(pos) => s.insert_str(pos, ".0"),
                        None => s.push_str(".0"),
                    }
                }
                write!(f, "{}", s)
            }
            Self::Str(s) if s.contains('"') => write!(f, "'{}'", s),
            Self::Str(s) => write!(f, "\"{}\"", s),
            Self::Bool(b) => write!(f, "{}", b),
            Self::None => write!(f, "none"),
            Self::PropertyPath(path) => write!(f, "{}", path),
            Self::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// 条件节点
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub operator: Operator,
    pub left: Value,
    pub right: Value,
}

impl Condition {
    pub fn new(left: Value, operator: Operator, right: Value) -> Self {
        Self {
            operator,
            left,
            right,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.operator, self.right)
    }
}

/// 解析序列中的节点
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Condition(Condition),
    Connective(LogicalOperator),
    /// 括号子表达式，整体求值为一个布尔值
    Group(ParsedSequence),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Condition(cond) => write!(f, "{}", cond),
            Self::Connective(op) => write!(f, "{}", op),
            Self::Group(seq) => write!(f, "({})", seq),
        }
    }
}

/// 解析结果：`[条件|组, 连接词, 条件|组, ...]` 的扁平序列
///
/// `and` / `or` 之间没有优先级，只有括号会产生嵌套（[`Node::Group`]）。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedSequence {
    nodes: Vec<Node>,
}

impl ParsedSequence {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    /// 嵌套深度（无括号组时为 1）
    pub fn depth(&self) -> usize {
        1 + self
            .nodes
            .iter()
            .map(|node| match node {
                Node::Group(inner) => inner.depth(),
                _ => 0,
            })
            .max()
            .unwrap_or(0)
    }
}

impl<'a> IntoIterator for &'a ParsedSequence {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl fmt::Display for ParsedSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

/// 评估上下文 - 提供给规则引擎的数据
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    data: serde_json::Value,
}

impl EvaluationContext {
    pub fn new(data: serde_json::Value) -> Self {
        Self { data }
    }

    /// 从 JSON 对象创建
    pub fn from_json(json: &str) -> Result<Self> {
        let data = serde_json::from_str(json)?;
        Ok(Self { data })
    }

    /// 从任意可序列化的宿主类型创建（结构体字段成为可访问的成员）
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        let data = serde_json::to_value(value)?;
        Ok(Self { data })
    }

    /// 上下文是否为空：`null`、`false`、`0`、`""`、`{}` 或 `[]`
    pub fn is_empty(&self) -> bool {
        match &self.data {
            serde_json::Value::Null => true,
            serde_json::Value::Bool(b) => !b,
            serde_json::Value::Number(n) => n.as_f64() == Some(0.0),
            serde_json::Value::String(s) => s.is_empty(),
            serde_json::Value::Object(map) => map.is_empty(),
            serde_json::Value::Array(arr) => arr.is_empty(),
        }
    }

    /// 获取底层数据
    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }
}

impl From<serde_json::Value> for EvaluationContext {
    fn from(data: serde_json::Value) -> Self {
        Self::new(data)
    }
}

/// 评估结果
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub matched: bool,
    pub matched_conditions: Vec<String>,
    pub evaluation_trace: Vec<String>,
    pub evaluation_time_us: u64,
}

impl EvaluationResult {
    pub fn new() -> Self {
        Self {
            matched: false,
            matched_conditions: Vec::new(),
            evaluation_trace: Vec::new(),
            evaluation_time_us: 0,
        }
    }
}

impl Default for EvaluationResult {
    fn default() -> Self {
        Self::new()
    }
}
