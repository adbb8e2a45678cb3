//! 规则语法解析器
//!
//! 将规则文本解析为扁平的 [`ParsedSequence`]：
//! - `foo.bar = "x"`
//! - `x in (5, 6, 7)`
//! - `foo = "bar" and (baz > 10 or baz ∈ (1, 2, 3))`

use crate::error::{Result, RuleError};
use crate::models::{Condition, Node, ParsedSequence, Value};
use crate::operators::{LogicalOperator, Operator};
use pest::error::LineColLocation;
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

/// 默认最大括号嵌套层数
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct RuleParser;

/// 使用默认嵌套上限解析规则文本
pub fn parse(query: &str) -> Result<ParsedSequence> {
    parse_with_max_depth(query, DEFAULT_MAX_NESTING_DEPTH)
}

/// 解析规则文本，括号嵌套超过 `max_depth` 层时报错
pub fn parse_with_max_depth(query: &str, max_depth: usize) -> Result<ParsedSequence> {
    // 在进入递归语法之前检查嵌套层数
    check_nesting_depth(query, max_depth)?;

    let mut pairs = RuleParser::parse(Rule::main, query).map_err(convert_pest_error)?;
    let main = next_pair(&mut pairs, "main")?;
    let expression = next_pair(&mut main.into_inner(), "expression")?;

    build_sequence(expression)
}

/// 扫描括号嵌套层数（忽略字符串字面量中的括号）
fn check_nesting_depth(query: &str, max_depth: usize) -> Result<()> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = query.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(_), '\\') => {
                chars.next();
            }
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => {
                depth += 1;
                if depth > max_depth {
                    return Err(RuleError::ParseError(format!(
                        "括号嵌套层数超过上限 {}",
                        max_depth
                    )));
                }
            }
            (None, ')') => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    Ok(())
}

fn convert_pest_error(err: pest::error::Error<Rule>) -> RuleError {
    let (line, col) = match err.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
    };
    RuleError::ParseError(format!(
        "第 {} 行第 {} 列: {}",
        line,
        col,
        err.variant.message()
    ))
}

fn next_pair<'i>(pairs: &mut Pairs<'i, Rule>, expected: &str) -> Result<Pair<'i, Rule>> {
    pairs
        .next()
        .ok_or_else(|| RuleError::ParseError(format!("缺少语法节点: {}", expected)))
}

fn unexpected(pair: &Pair<'_, Rule>) -> RuleError {
    RuleError::ParseError(format!(
        "意外的语法节点 {:?}: '{}'",
        pair.as_rule(),
        pair.as_str()
    ))
}

fn build_sequence(pair: Pair<'_, Rule>) -> Result<ParsedSequence> {
    let nodes = pair
        .into_inner()
        .map(build_node)
        .collect::<Result<Vec<_>>>()?;
    Ok(ParsedSequence::new(nodes))
}

fn build_node(pair: Pair<'_, Rule>) -> Result<Node> {
    match pair.as_rule() {
        Rule::condition => build_condition(pair).map(Node::Condition),
        Rule::group => {
            let inner = next_pair(&mut pair.into_inner(), "expression")?;
            build_sequence(inner).map(Node::Group)
        }
        Rule::and => Ok(Node::Connective(LogicalOperator::And)),
        Rule::or => Ok(Node::Connective(LogicalOperator::Or)),
        _ => Err(unexpected(&pair)),
    }
}

fn build_condition(pair: Pair<'_, Rule>) -> Result<Condition> {
    let mut inner = pair.into_inner();
    let left = build_value(next_pair(&mut inner, "左操作数")?)?;
    let operator: Operator = next_pair(&mut inner, "操作符")?.as_str().parse()?;
    let right = build_value(next_pair(&mut inner, "右操作数")?)?;

    Ok(Condition::new(left, operator, right))
}

fn build_value(pair: Pair<'_, Rule>) -> Result<Value> {
    match pair.as_rule() {
        Rule::real => parse_real(pair.as_str()),
        Rule::integer => parse_integer(pair.as_str()),
        Rule::string => {
            let content = pair
                .into_inner()
                .next()
                .map(|inner| inner.as_str())
                .unwrap_or_default();
            Ok(Value::Str(content.to_string()))
        }
        Rule::boolean => Ok(Value::Bool(pair.as_str().eq_ignore_ascii_case("true"))),
        Rule::none => Ok(Value::None),
        Rule::property_path => Ok(Value::PropertyPath(pair.as_str().to_string())),
        Rule::value_list => pair
            .into_inner()
            .map(build_value)
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        _ => Err(unexpected(&pair)),
    }
}

fn parse_real(text: &str) -> Result<Value> {
    let n: f64 = text
        .parse()
        .map_err(|e| RuleError::ParseError(format!("无效的实数 '{}': {}", text, e)))?;

    if !n.is_finite() {
        return Err(RuleError::ParseError(format!("实数超出范围: '{}'", text)));
    }

    Ok(Value::Float(n))
}

/// 整数允许指数后缀，如 `5e3` == 5000
fn parse_integer(text: &str) -> Result<Value> {
    let out_of_range = || RuleError::ParseError(format!("整数超出范围: '{}'", text));

    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(pos) => (&text[..pos], Some(&text[pos + 1..])),
        None => (text, None),
    };

    let mut n: i64 = mantissa.parse().map_err(|_| out_of_range())?;

    if let Some(exponent) = exponent {
        let exp: u32 = exponent.parse().map_err(|_| out_of_range())?;
        let scale = 10i64.checked_pow(exp).ok_or_else(out_of_range)?;
        n = n.checked_mul(scale).ok_or_else(out_of_range)?;
    }

    Ok(Value::Int(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(left: Value, operator: Operator, right: Value) -> Node {
        Node::Condition(Condition::new(left, operator, right))
    }

    fn path(p: &str) -> Value {
        Value::PropertyPath(p.to_string())
    }

    fn only_condition(query: &str) -> Condition {
        let seq = parse(query).unwrap();
        assert_eq!(seq.len(), 1, "expected a single condition in '{}'", query);
        match &seq.nodes()[0] {
            Node::Condition(c) => c.clone(),
            other => panic!("expected condition, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_comparison() {
        let seq = parse("5 > 3").unwrap();
        assert_eq!(
            seq.nodes(),
            &[cond(Value::Int(5), Operator::Gt, Value::Int(3))]
        );
    }

    #[test]
    fn test_parse_without_whitespace() {
        let c = only_condition("x>=10");
        assert_eq!(c, Condition::new(path("x"), Operator::Gte, Value::Int(10)));
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(only_condition("a = 1.5").right, Value::Float(1.5));
        assert_eq!(only_condition("a = .5").right, Value::Float(0.5));
        assert_eq!(only_condition("a = 2.").right, Value::Float(2.0));
        assert_eq!(only_condition("a = -1.5e2").right, Value::Float(-150.0));
        assert_eq!(only_condition("a = -7").right, Value::Int(-7));
        assert_eq!(only_condition("a = +7").right, Value::Int(7));
        assert_eq!(only_condition("a = 5e3").right, Value::Int(5000));
        assert_eq!(only_condition("a = \"x y\"").right, Value::Str("x y".into()));
        assert_eq!(only_condition("a = 'single'").right, Value::Str("single".into()));
        assert_eq!(only_condition("a = ''").right, Value::Str(String::new()));
        assert_eq!(only_condition("a = TRUE").right, Value::Bool(true));
        assert_eq!(only_condition("a = False").right, Value::Bool(false));
        assert_eq!(only_condition("a is None").right, Value::None);
    }

    #[test]
    fn test_real_is_never_parsed_as_integer() {
        assert_eq!(only_condition("a = 10.0").right, Value::Float(10.0));
    }

    #[test]
    fn test_string_escapes_are_kept_verbatim() {
        assert_eq!(
            only_condition(r#"a = "say \"hi\"""#).right,
            Value::Str(r#"say \"hi\""#.into())
        );
    }

    #[test]
    fn test_keywords_are_whole_words() {
        assert_eq!(only_condition("a = true_value").right, path("true_value"));
        assert_eq!(only_condition("a = nonesuch").right, path("nonesuch"));
        assert_eq!(only_condition("orange = android").left, path("orange"));
        assert!(parse("a = 1 andy = 2").is_err());
    }

    #[test]
    fn test_numbers_cannot_run_into_keywords() {
        for query in ["1=1and 2=2", "a = 5or b = 1", "a = 1.5and b = 1", "a = 5e3x"] {
            let err = parse(query).unwrap_err();
            assert!(matches!(err, RuleError::ParseError(_)), "{}", query);
        }
        assert!(parse("(a = 1)and (b = 2)").is_ok());
        assert!(parse("a = 'x'or b = 1").is_ok());
    }

    #[test]
    fn test_parse_property_path() {
        let c = only_condition("foo.bar.baz = \"x\"");
        assert_eq!(c.left, path("foo.bar.baz"));
        assert!(parse("foo . bar = 1").is_err());
    }

    #[test]
    fn test_parse_operators() {
        let cases = [
            ("a = 1", Operator::Eq),
            ("a == 1", Operator::Eq),
            ("a eq 1", Operator::Eq),
            ("a != 1", Operator::Neq),
            ("a ne 1", Operator::Neq),
            ("a ≠ 1", Operator::Neq),
            ("a gt 1", Operator::Gt),
            ("a ≥ 1", Operator::Gte),
            ("a GE 1", Operator::Gte),
            ("a < 1", Operator::Lt),
            ("a le 1", Operator::Lte),
            ("a ∈ (1)", Operator::In),
            ("a IN (1)", Operator::In),
            ("a notin (1)", Operator::NotIn),
            ("a ∉ (1)", Operator::NotIn),
            ("a is none", Operator::Is),
            ("a isnot none", Operator::IsNot),
            ("a ⊆ (1)", Operator::Subset),
            ("a ⊇ (1)", Operator::Superset),
            ("a ∩ (1)", Operator::Intersects),
        ];

        for (query, expected) in cases {
            assert_eq!(only_condition(query).operator, expected, "query: {}", query);
        }
    }

    #[test]
    fn test_parse_value_lists() {
        let c = only_condition("x in (5, 6.5, 'a', y)");
        assert_eq!(
            c.right,
            Value::List(vec![
                Value::Int(5),
                Value::Float(6.5),
                Value::Str("a".into()),
                path("y"),
            ])
        );

        // 单元素列表以及出现在左侧的列表
        let c = only_condition("(1) ⊆ (1, 2)");
        assert_eq!(c.left, Value::List(vec![Value::Int(1)]));
    }

    #[test]
    fn test_sequence_is_flat() {
        let seq = parse("a = 1 and b = 2 or c = 3").unwrap();
        assert_eq!(
            seq.nodes(),
            &[
                cond(path("a"), Operator::Eq, Value::Int(1)),
                Node::Connective(LogicalOperator::And),
                cond(path("b"), Operator::Eq, Value::Int(2)),
                Node::Connective(LogicalOperator::Or),
                cond(path("c"), Operator::Eq, Value::Int(3)),
            ]
        );
    }

    #[test]
    fn test_parentheses_create_groups() {
        let seq = parse("5 > 3 AND (3 > 5 Or 3 > 1)").unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.nodes()[1], Node::Connective(LogicalOperator::And));

        match &seq.nodes()[2] {
            Node::Group(inner) => {
                assert_eq!(
                    inner.nodes(),
                    &[
                        cond(Value::Int(3), Operator::Gt, Value::Int(5)),
                        Node::Connective(LogicalOperator::Or),
                        cond(Value::Int(3), Operator::Gt, Value::Int(1)),
                    ]
                );
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_leading_group() {
        let seq = parse("(a = 1 or b = 2) and c = 3").unwrap();
        assert!(matches!(seq.nodes()[0], Node::Group(_)));
        assert_eq!(seq.depth(), 2);
    }

    #[test]
    fn test_rejects_malformed_input() {
        let malformed = [
            "",
            "   ",
            "5 > 4)",
            "(5 > 4",
            "foo = \"bar\" or (",
            "1=1 and 2 in (1, 3 = 3)",
            "a =~ 1",
            "a 1",
            "a = ",
            "a = 1 and",
            "and a = 1",
            "a = ()",
            "a = 'unterminated",
        ];

        for query in malformed {
            let err = parse(query).unwrap_err();
            assert!(
                matches!(err, RuleError::ParseError(_)),
                "'{}' should be a parse error, got {:?}",
                query,
                err
            );
        }
    }

    #[test]
    fn test_rejects_out_of_range_numbers() {
        assert!(parse("a = 99999999999999999999").is_err());
        assert!(parse("a = 9e30").is_err());
        assert!(parse("a = 1.0e999").is_err());
    }

    #[test]
    fn test_nesting_depth_limit() {
        let nested = format!("{}a = 1{}", "(".repeat(10), ")".repeat(10));
        assert!(parse_with_max_depth(&nested, 10).is_ok());

        let err = parse_with_max_depth(&nested, 9).unwrap_err();
        assert!(err.to_string().contains("嵌套层数"));
    }

    #[test]
    fn test_nesting_depth_ignores_quoted_parens() {
        assert!(parse_with_max_depth("a = '((((('", 1).is_ok());
        assert!(parse_with_max_depth(r#"a = "\"(((""#, 1).is_ok());
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        let nested = format!("{}a = 1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(parse(&nested).is_err());
    }

    #[test]
    fn test_error_reports_position() {
        let err = parse("a = 1 and b ? 2").unwrap_err();
        assert!(err.to_string().contains("第 1 行"));
    }
}
