//! 默认操作符库
//!
//! 比较、字符串模式、集合成员以及逻辑组合子。
//! 比较类操作符（`$eq`、`$ne`、`$gt`、`$gte`、`$lt`、`$lte`）遵循同一套类型转换：
//! - 观测值为数字时，规则参数按 JavaScript `Number()` 规则转为数字；
//! - 观测值为日期时，规则参数转为毫秒时间戳，观测值同样取毫秒时间戳；
//! - 其余情况规则参数保持原样。

use crate::models::{Rule, Value};
use crate::operators::{Mode, Next, Operator, Resolution};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use glob::{MatchOptions, Pattern};
use regex::Regex;
use std::borrow::Cow;
use std::cmp::Ordering;
use tracing::warn;

/// 内置操作符名称
pub mod names {
    pub const EQ: &str = "$eq";
    pub const NE: &str = "$ne";
    pub const GT: &str = "$gt";
    pub const GTE: &str = "$gte";
    pub const LT: &str = "$lt";
    pub const LTE: &str = "$lte";
    pub const EXACT: &str = "$exact";
    pub const EXISTS: &str = "$exists";
    pub const EMPTY: &str = "$empty";
    pub const NULL: &str = "$null";
    pub const REGEX: &str = "$regex";
    pub const LIKE: &str = "$like";
    pub const ILIKE: &str = "$ilike";
    pub const INCLUDES: &str = "$includes";
    pub const ONE_OF: &str = "$oneOf";
    pub const AND: &str = "$and";
    pub const OR: &str = "$or";
    pub const NOT: &str = "$not";
    pub const LOWER: &str = "$lower";
    pub const UPPER: &str = "$upper";
}

/// 默认操作符集合
pub fn default_operators() -> Vec<(&'static str, Operator)> {
    vec![
        (names::EQ, Operator::new(eq)),
        (names::NE, Operator::new(ne)),
        (names::GT, Operator::new(gt)),
        (names::GTE, Operator::new(gte)),
        (names::LT, Operator::new(lt)),
        (names::LTE, Operator::new(lte)),
        (names::EXACT, Operator::new(exact)),
        (names::EXISTS, Operator::new(exists)),
        (names::EMPTY, Operator::new(empty)),
        (names::NULL, Operator::new(null)),
        (names::REGEX, Operator::new(regex)),
        (names::LIKE, Operator::new(like)),
        (names::ILIKE, Operator::new(ilike)),
        (names::INCLUDES, Operator::new(includes)),
        (names::ONE_OF, Operator::new(one_of)),
        (names::AND, Operator::new(and)),
        (names::OR, Operator::new(or)),
        (names::NOT, Operator::new(not)),
        (names::LOWER, Operator::new(lower)),
        (names::UPPER, Operator::new(upper)),
    ]
}

// ==================== 比较 ====================

pub fn eq<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    Resolution::Terminal(coerced_eq(rule, value))
}

/// `$eq` 的取反，两侧使用相同的类型转换
pub fn ne<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    Resolution::Terminal(!coerced_eq(rule, value))
}

pub fn gt<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    Resolution::Terminal(coerced_order(rule, value, Ordering::is_gt))
}

pub fn gte<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    Resolution::Terminal(coerced_order(rule, value, Ordering::is_ge))
}

pub fn lt<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    Resolution::Terminal(coerced_order(rule, value, Ordering::is_lt))
}

pub fn lte<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    Resolution::Terminal(coerced_order(rule, value, Ordering::is_le))
}

/// 严格结构相等，不做类型转换；NaN 与 NaN 视为相等
pub fn exact<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    let matched = match (operand(rule), value) {
        (Some(expected), Some(value)) => deep_equal(&expected, value),
        _ => false,
    };
    Resolution::Terminal(matched)
}

// ==================== 存在性 ====================

pub fn exists<'a>(_rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    Resolution::Terminal(value.is_some())
}

pub fn empty<'a>(_rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    Resolution::Terminal(is_empty(value))
}

pub fn null<'a>(_rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    Resolution::Terminal(matches!(value, Some(Value::Null)))
}

// ==================== 字符串模式 ====================

pub fn regex<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    let Some(s) = value.and_then(Value::as_str) else {
        return Resolution::Terminal(false);
    };

    let matched = match rule {
        Rule::Regex(re) => re.is_match(s),
        Rule::Literal(Value::String(pattern)) => match Regex::new(pattern) {
            Ok(re) => re.is_match(s),
            Err(e) => {
                warn!("无效的正则表达式 '{}': {}", pattern, e);
                false
            }
        },
        _ => false,
    };

    Resolution::Terminal(matched)
}

/// 通配匹配，`%` 是 `*` 的简写
pub fn like<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    let matched = match (rule.as_literal().and_then(Value::as_str), value.and_then(Value::as_str)) {
        (Some(pattern), Some(s)) => like_match(pattern, s),
        _ => false,
    };
    Resolution::Terminal(matched)
}

/// 双方转小写后交给 `$like`
pub fn ilike<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    let pattern = match rule {
        Rule::Literal(Value::String(s)) => Rule::Literal(Value::String(s.to_lowercase())),
        other => other.clone(),
    };
    let folded = value.map(fold_case(str::to_lowercase));

    Resolution::combinator(move |next: Next<'_>| {
        next(&Rule::entry(names::LIKE, pattern), folded.as_ref(), Mode::And)
    })
}

// ==================== 集合成员 ====================

/// 值（非数组时视为单元素数组）包含规则参数
pub fn includes<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    let matched = match (operand(rule), value) {
        (Some(expected), Some(Value::Array(items))) => items.contains(expected.as_ref()),
        (Some(expected), Some(value)) => expected.as_ref() == value,
        _ => false,
    };
    Resolution::Terminal(matched)
}

/// 规则参数（序列或字符串）包含值
pub fn one_of<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    let Some(value) = value else {
        return Resolution::Terminal(false);
    };

    let matched = match operand(rule).as_deref() {
        Some(Value::Array(items)) => items.contains(value),
        Some(Value::String(haystack)) => value.as_str().is_some_and(|s| haystack.contains(s)),
        _ => false,
    };
    Resolution::Terminal(matched)
}

// ==================== 逻辑组合子 ====================

pub fn and<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    Resolution::combinator(move |next: Next<'_>| next(rule, value, Mode::And))
}

pub fn or<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    Resolution::combinator(move |next: Next<'_>| next(rule, value, Mode::Or))
}

pub fn not<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    Resolution::combinator(move |next: Next<'_>| next(rule, value, Mode::And).map(|m| !m))
}

/// 仅对字符串生效
pub fn lower<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    fold_then_continue(rule, value, str::to_lowercase)
}

/// 仅对字符串生效
pub fn upper<'a>(rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
    fold_then_continue(rule, value, str::to_uppercase)
}

fn fold_then_continue<'a>(
    rule: &'a Rule,
    value: Option<&'a Value>,
    fold: fn(&str) -> String,
) -> Resolution<'a> {
    let folded = value.and_then(Value::as_str).map(|s| Value::String(fold(s)));

    Resolution::combinator(move |next: Next<'_>| match folded {
        Some(folded) => next(rule, Some(&folded), Mode::And),
        None => Ok(false),
    })
}

fn fold_case(fold: fn(&str) -> String) -> impl Fn(&Value) -> Value {
    move |value| match value {
        Value::String(s) => Value::String(fold(s)),
        other => other.clone(),
    }
}

// ==================== 辅助函数 ====================

/// 规则参数对应的数据
fn operand(rule: &Rule) -> Option<Cow<'_, Value>> {
    match rule {
        Rule::Literal(v) => Some(Cow::Borrowed(v)),
        other => other.to_value().map(Cow::Owned),
    }
}

fn coerced_eq(rule: &Rule, value: Option<&Value>) -> bool {
    let (Some(expected), Some(value)) = (operand(rule), value) else {
        return false;
    };
    coerce(&expected, value) == to_compare(value)
}

fn coerced_order(rule: &Rule, value: Option<&Value>, accept: fn(Ordering) -> bool) -> bool {
    let (Some(expected), Some(value)) = (operand(rule), value) else {
        return false;
    };
    js_order(&to_compare(value), &coerce(&expected, value)).is_some_and(accept)
}

/// 按观测值的类型转换规则参数
fn coerce<'r>(rule: &'r Value, observed: &Value) -> Cow<'r, Value> {
    match observed {
        Value::Number(_) => Cow::Owned(Value::Number(to_number(rule))),
        Value::Date(_) => Cow::Owned(Value::Number(to_epoch_millis(rule))),
        _ => Cow::Borrowed(rule),
    }
}

/// 观测值中的日期参与比较时取毫秒时间戳
fn to_compare(value: &Value) -> Cow<'_, Value> {
    match value {
        Value::Date(d) => Cow::Owned(Value::Number(d.timestamp_millis() as f64)),
        other => Cow::Borrowed(other),
    }
}

/// 大小比较：字符串按字典序，其余标量按数字，数组和对象不可比较
fn js_order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (a, b) if is_scalar(a) && is_scalar(b) => to_number(a).partial_cmp(&to_number(b)),
        _ => None,
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Date(_)
    )
}

/// JavaScript `Number()` 转换
pub(crate) fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => *n,
        Value::String(s) => parse_number(s),
        Value::Date(d) => d.timestamp_millis() as f64,
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            [single] => to_number(single),
            _ => f64::NAN,
        },
        Value::Object(_) | Value::Lazy(_) => f64::NAN,
    }
}

fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    match s {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => {
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                return i64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
            }
            // 排除 Rust 接受而 JavaScript 不接受的 "inf"、"nan" 等写法
            if s.chars().any(|c| c.is_alphabetic() && c != 'e' && c != 'E') {
                return f64::NAN;
            }
            s.parse().unwrap_or(f64::NAN)
        }
    }
}

/// JavaScript `new Date(x).getTime()` 转换
pub(crate) fn to_epoch_millis(value: &Value) -> f64 {
    // ECMAScript 时间值的有效范围
    const MAX_TIME: f64 = 8.64e15;

    match value {
        Value::Date(d) => d.timestamp_millis() as f64,
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) if n.is_finite() && n.abs() <= MAX_TIME => n.trunc(),
        Value::String(s) => parse_datetime(s).unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// 解析日期时间字符串，无时区的写法按 UTC 处理
fn parse_datetime(s: &str) -> Option<f64> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis() as f64);
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc().timestamp_millis() as f64);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis() as f64)
}

/// 只有字符串、数组和对象可能非空，其余值（数字、布尔、日期）一律为空
fn is_empty(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(arr)) => arr.is_empty(),
        Some(Value::Object(obj)) => obj.is_empty(),
        _ => true,
    }
}

fn deep_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| deep_equal(x, y)))
        }
        _ => left == right,
    }
}

fn like_match(pattern: &str, s: &str) -> bool {
    const OPTIONS: MatchOptions = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let glob = collapse_stars(&pattern.replace('%', "*"));
    // 括号不成对时按字面字符处理
    let compiled = Pattern::new(&glob).or_else(|_| Pattern::new(&literal_brackets(&glob)));
    match compiled {
        Ok(compiled) => compiled.matches_with(s, OPTIONS),
        Err(e) => {
            warn!("无效的通配模式 '{}': {}", pattern, e);
            false
        }
    }
}

/// `**` 只能独占一个路径段，段内连续的 `*` 合并为一个
fn collapse_stars(glob: &str) -> String {
    glob.split('/')
        .map(|segment| {
            if segment.len() > 1 && segment.chars().all(|c| c == '*') {
                return "**".to_string();
            }
            let mut out = String::with_capacity(segment.len());
            for c in segment.chars() {
                if !(c == '*' && out.ends_with('*')) {
                    out.push(c);
                }
            }
            out
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn literal_brackets(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len());
    for c in glob.chars() {
        match c {
            '[' => out.push_str("[[]"),
            ']' => out.push_str("[]]"),
            other => out.push(other),
        }
    }
    out
}
