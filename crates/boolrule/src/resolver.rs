//! 操作数解析
//!
//! 字面量解析为自身，属性路径按 `.` 拆分后逐段从上下文中取值。
//! 每一段先尝试属性访问，再尝试键访问。

use crate::error::{Result, RuleError};
use crate::models::{EvaluationContext, Value};
use serde_json::Value as JsonValue;
use std::borrow::Cow;
use std::sync::Arc;

/// 属性路径分隔符
pub const PATH_DELIMITER: char = '.';

/// 路径段访问方式
///
/// 返回 `None` 表示该方式不适用或未找到，解析器会继续尝试下一种方式。
pub trait Accessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn access<'a>(&self, current: &'a JsonValue, segment: &str) -> Option<Cow<'a, JsonValue>>;
}

/// 属性访问：数组和字符串暴露 `length` 属性
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeAccessor;

impl Accessor for AttributeAccessor {
    fn name(&self) -> &'static str {
        "attribute"
    }

    fn access<'a>(&self, current: &'a JsonValue, segment: &str) -> Option<Cow<'a, JsonValue>> {
        let length = match (current, segment) {
            (JsonValue::Array(arr), "length") => arr.len(),
            (JsonValue::String(s), "length") => s.chars().count(),
            _ => return None,
        };
        Some(Cow::Owned(JsonValue::from(length)))
    }
}

/// 键访问：对象按键取值
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyAccessor;

impl Accessor for KeyAccessor {
    fn name(&self) -> &'static str {
        "key"
    }

    fn access<'a>(&self, current: &'a JsonValue, segment: &str) -> Option<Cow<'a, JsonValue>> {
        current.as_object()?.get(segment).map(Cow::Borrowed)
    }
}

/// 属性路径解析器
#[derive(Clone)]
pub struct PathResolver {
    accessors: Vec<Arc<dyn Accessor>>,
}

impl PathResolver {
    /// 按给定顺序尝试访问方式
    pub fn new(accessors: Vec<Arc<dyn Accessor>>) -> Self {
        Self { accessors }
    }

    /// 访问方式名称（按尝试顺序）
    pub fn accessor_names(&self) -> Vec<&'static str> {
        self.accessors.iter().map(|a| a.name()).collect()
    }

    /// 将操作数展开为具体值
    pub fn expand(&self, value: &Value, context: Option<&EvaluationContext>) -> Result<JsonValue> {
        match value {
            Value::Int(i) => Ok(JsonValue::from(*i)),
            // 解析阶段已保证实数有限
            Value::Float(f) => Ok(serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null)),
            Value::Str(s) => Ok(JsonValue::String(s.clone())),
            Value::Bool(b) => Ok(JsonValue::Bool(*b)),
            Value::None => Ok(JsonValue::Null),
            Value::PropertyPath(path) => self.resolve(path, context).map(Cow::into_owned),
            Value::List(items) => items
                .iter()
                .map(|item| self.expand(item, context))
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array),
        }
    }

    /// 从上下文中解析属性路径
    pub fn resolve<'a>(
        &self,
        path: &str,
        context: Option<&'a EvaluationContext>,
    ) -> Result<Cow<'a, JsonValue>> {
        let context = match context {
            Some(ctx) if !ctx.is_empty() => ctx,
            _ => {
                return Err(RuleError::MissingVariable(format!(
                    "上下文缺失或为空，无法解析 {}",
                    path
                )));
            }
        };

        let mut current = Cow::Borrowed(context.data());
        for segment in path.split(PATH_DELIMITER) {
            current = self.step(current, segment).ok_or_else(|| {
                RuleError::MissingVariable(format!("未提供变量 {} 的值", path))
            })?;
        }

        Ok(current)
    }

    fn step<'a>(&self, current: Cow<'a, JsonValue>, segment: &str) -> Option<Cow<'a, JsonValue>> {
        match current {
            Cow::Borrowed(value) => self.access(value, segment),
            Cow::Owned(value) => self
                .access(&value, segment)
                .map(|child| Cow::Owned(child.into_owned())),
        }
    }

    fn access<'a>(&self, value: &'a JsonValue, segment: &str) -> Option<Cow<'a, JsonValue>> {
        self.accessors
            .iter()
            .find_map(|accessor| accessor.access(value, segment))
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(vec![Arc::new(AttributeAccessor), Arc::new(KeyAccessor)])
    }
}
