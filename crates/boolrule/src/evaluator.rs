//! 条件评估器
//!
//! 对已展开的左右操作数应用操作符。
//!
//! 类型规则：
//! - 整数与实数按数值比较，整数之间精确比较
//! - 布尔值在与数值比较时视为 0 / 1（`true == 1` 成立）
//! - 字符串不会转换为数值
//! - 列表与对象按结构逐元素比较
//! - `is` / `isnot` 要求类型相同且值严格相等，不做任何转换

use crate::error::{Result, RuleError};
use crate::operators::Operator;
use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// # Arguments
    /// * `left` - 展开后的左操作数
    /// * `operator` - 操作符
    /// * `right` - 展开后的右操作数
    pub fn evaluate(left: &Value, operator: Operator, right: &Value) -> Result<bool> {
        match operator {
            Operator::Eq => Ok(Self::eq(left, right)),
            Operator::Neq => Ok(!Self::eq(left, right)),
            Operator::Gt => Self::compare(left, right, operator).map(|o| o == Ordering::Greater),
            Operator::Gte => Self::compare(left, right, operator).map(|o| o != Ordering::Less),
            Operator::Lt => Self::compare(left, right, operator).map(|o| o == Ordering::Less),
            Operator::Lte => Self::compare(left, right, operator).map(|o| o != Ordering::Greater),
            Operator::In => Self::contains(right, left, operator),
            Operator::NotIn => Self::contains(right, left, operator).map(|r| !r),
            Operator::Is => Ok(Self::identical(left, right)),
            Operator::IsNot => Ok(!Self::identical(left, right)),
            Operator::Subset => Self::all_contained(left, right, operator),
            Operator::Superset => Self::all_contained(right, left, operator),
            Operator::Intersects => Self::any_contained(left, right, operator),
        }
    }

    /// 结构相等
    pub fn eq(left: &Value, right: &Value) -> bool {
        if let (Some(a), Some(b)) = (Number::of(left), Number::of(right)) {
            return a.compare(&b) == Some(Ordering::Equal);
        }

        match (left, right) {
            (Value::Null, Value::Null) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Self::eq(x, y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| Self::eq(v, other)))
            }
            _ => false,
        }
    }

    /// 有序比较：数值、字符串、列表（字典序）
    fn compare(left: &Value, right: &Value, operator: Operator) -> Result<Ordering> {
        if let (Some(a), Some(b)) = (Number::of(left), Number::of(right)) {
            return a
                .compare(&b)
                .ok_or_else(|| Self::type_mismatch(operator, left, right));
        }

        match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b) {
                    if !Self::eq(x, y) {
                        return Self::compare(x, y, operator);
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => Err(Self::type_mismatch(operator, left, right)),
        }
    }

    /// 成员检查：`item` 是否属于 `container`
    fn contains(container: &Value, item: &Value, operator: Operator) -> Result<bool> {
        match container {
            Value::Array(arr) => Ok(arr.iter().any(|x| Self::eq(item, x))),
            Value::String(s) => match item {
                Value::String(sub) => Ok(s.contains(sub.as_str())),
                _ => Err(Self::type_mismatch(operator, item, container)),
            },
            Value::Object(map) => Ok(item.as_str().is_some_and(|key| map.contains_key(key))),
            _ => Err(Self::type_mismatch(operator, item, container)),
        }
    }

    /// `subset` 的每个元素都属于 `superset`
    fn all_contained(subset: &Value, superset: &Value, operator: Operator) -> Result<bool> {
        for item in Self::items(subset, operator)? {
            if !Self::contains(superset, &item, operator)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// 两侧至少有一个共同元素
    fn any_contained(left: &Value, right: &Value, operator: Operator) -> Result<bool> {
        for item in Self::items(left, operator)? {
            if Self::contains(right, &item, operator)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// 可迭代值的元素：列表元素、字符串字符、对象键
    fn items(value: &Value, operator: Operator) -> Result<Vec<Cow<'_, Value>>> {
        match value {
            Value::Array(arr) => Ok(arr.iter().map(Cow::Borrowed).collect()),
            Value::String(s) => Ok(s
                .chars()
                .map(|c| Cow::Owned(Value::String(c.to_string())))
                .collect()),
            Value::Object(map) => Ok(map
                .keys()
                .map(|k| Cow::Owned(Value::String(k.clone())))
                .collect()),
            _ => Err(RuleError::TypeMismatch {
                operator: operator.to_string(),
                left: Self::type_name(value).to_string(),
                right: "iterable".to_string(),
            }),
        }
    }

    /// 同一性：类型相同且值严格相等
    fn identical(left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => {
                a.is_f64() == b.is_f64() && Self::eq(left, right)
            }
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Self::identical(x, y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| Self::identical(v, other)))
            }
            _ => std::mem::discriminant(left) == std::mem::discriminant(right) && left == right,
        }
    }

    fn type_mismatch(operator: Operator, left: &Value, right: &Value) -> RuleError {
        RuleError::TypeMismatch {
            operator: operator.to_string(),
            left: Self::type_name(left).to_string(),
            right: Self::type_name(right).to_string(),
        }
    }

    /// 获取值的类型名称
    pub fn type_name(value: &Value) -> &'static str {
        match value {
            Value::Null => "none",
            Value::Bool(_) => "bool",
            Value::Number(n) if n.is_f64() => "float",
            Value::Number(_) => "int",
            Value::String(_) => "string",
            Value::Array(_) => "list",
            Value::Object(_) => "object",
        }
    }
}

/// 数值视图：布尔值视为 0 / 1
#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i128),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Int(i128::from(*b))),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Int(i128::from(i)))
                } else if let Some(u) = n.as_u64() {
                    Some(Self::Int(i128::from(u)))
                } else {
                    n.as_f64().map(Self::Float)
                }
            }
            _ => None,
        }
    }

    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (*self, *other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(&b)),
            (Self::Int(a), Self::Float(b)) => Self::compare_int_float(a, b),
            (Self::Float(a), Self::Int(b)) => {
                Self::compare_int_float(b, a).map(Ordering::reverse)
            }
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(&b),
        }
    }

    /// 整数与实数精确比较，不经过 f64 舍入
    fn compare_int_float(a: i128, b: f64) -> Option<Ordering> {
        // 2^127，i128 的取值边界
        const LIMIT: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

        if b.is_nan() {
            return None;
        }
        if b >= LIMIT {
            return Some(Ordering::Less);
        }
        if b < -LIMIT {
            return Some(Ordering::Greater);
        }

        let floor = b.floor();
        match a.cmp(&(floor as i128)) {
            Ordering::Equal if b > floor => Some(Ordering::Less),
            ordering => Some(ordering),
        }
    }
}
