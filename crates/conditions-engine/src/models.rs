//! 规则引擎领域模型
//!
//! - [`Value`]：被测试的数据，可以包含日期和惰性求值的生产者函数；
//! - [`Rule`]：声明式的匹配规则，字面量、正则、函数、序列与键映射的递归组合。
//!
//! "未定义"统一用 `Option<&Value>::None` 表示，例如路径读取不到字段。

use crate::error::{Result, RuleError};
use crate::operators::Mode;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// 值生产者：以当前规则和模式为参数，返回真实的值（`None` 表示未定义）
pub type ProducerFn = dyn Fn(&Rule, Mode) -> Option<Value> + Send + Sync;

/// 规则函数：以原始值和模式为参数，直接给出匹配结果
pub type RuleFn = dyn Fn(Option<&Value>, Mode) -> Result<bool> + Send + Sync;

/// 被测试的值
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    /// 惰性值，在比较之前由求值器解析
    Lazy(Arc<ProducerFn>),
}

impl Value {
    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn(&Rule, Mode) -> Option<Value> + Send + Sync + 'static,
    {
        Self::Lazy(Arc::new(f))
    }

    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }

    /// 按 JavaScript 的真值规则判断
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Date(_) | Self::Array(_) | Self::Object(_) | Self::Lazy(_) => true,
        }
    }

    /// 获取值的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Lazy(_) => "lazy",
        }
    }
}

/// 结构相等：日期按时间点比较，惰性值只与自身相等
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Lazy(a), Self::Lazy(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Date(d) => write!(f, "Date({})", d.to_rfc3339()),
            Self::Array(arr) => f.debug_list().entries(arr).finish(),
            Self::Object(map) => f.debug_map().entries(map).finish(),
            Self::Lazy(_) => f.write_str("<lazy>"),
        }
    }
}

macro_rules! value_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Self::Number(n as f64)
                }
            }
        )*
    };
}

value_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(arr) => Self::Array(arr.into_iter().map(Into::into).collect()),
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null | Self::Lazy(_) => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => {
                // 整数按整数输出，避免 "1.0"
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Self::String(s) => serializer.serialize_str(s),
            Self::Date(d) => serializer.serialize_str(&d.to_rfc3339()),
            Self::Array(arr) => arr.serialize(serializer),
            Self::Object(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Into::into)
    }
}

/// 匹配规则
#[derive(Clone)]
pub enum Rule {
    /// 字面量（包括日期），按 `$eq` 比较
    Literal(Value),
    /// 正则表达式，按 `$regex` 比较
    Regex(Regex),
    /// 规则函数，包括嵌套的已编译谓词
    Func(Arc<RuleFn>),
    /// 有序序列，按当前模式 AND/OR 合并
    Seq(Vec<Rule>),
    /// 键映射，键是操作符名或字段路径
    Map(IndexMap<String, Rule>),
}

impl Rule {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| RuleError::invalid_pattern(pattern, e))
    }

    /// 从 JSON 文本解析规则
    pub fn parse(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Err(RuleError::ParseError("规则为空".to_string()));
        }
        Ok(serde_json::from_str::<serde_json::Value>(json)?.into())
    }

    pub fn func<F>(f: F) -> Self
    where
        F: Fn(Option<&Value>, Mode) -> Result<bool> + Send + Sync + 'static,
    {
        Self::Func(Arc::new(f))
    }

    pub fn seq<I>(rules: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Rule>,
    {
        Self::Seq(rules.into_iter().map(Into::into).collect())
    }

    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Rule)>,
    {
        Self::Map(entries.into_iter().map(|(k, r)| (k.into(), r)).collect())
    }

    /// 单键映射，如 `{"$like": "wor%"}` 或 `{"name": "bob"}`
    pub fn entry(key: impl Into<String>, rule: impl Into<Rule>) -> Self {
        Self::map([(key.into(), rule.into())])
    }

    /// `{"$and": [..]}`
    pub fn all<I>(rules: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Rule>,
    {
        Self::entry("$and", Self::seq(rules))
    }

    /// `{"$or": [..]}`
    pub fn any<I>(rules: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Rule>,
    {
        Self::entry("$or", Self::seq(rules))
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(v) => Some(v),
            _ => None,
        }
    }

    /// 将规则参数还原为普通数据
    ///
    /// 正则还原为其源字符串；函数无法还原，返回 `None`。
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Self::Literal(v) => Some(v.clone()),
            Self::Regex(re) => Some(Value::String(re.as_str().to_string())),
            Self::Func(_) => None,
            Self::Seq(rules) => rules
                .iter()
                .map(Rule::to_value)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Self::Map(map) => map
                .iter()
                .map(|(k, r)| r.to_value().map(|v| (k.clone(), v)))
                .collect::<Option<IndexMap<_, _>>>()
                .map(Value::Object),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{v:?}"),
            Self::Regex(re) => write!(f, "/{}/", re.as_str()),
            Self::Func(_) => f.write_str("<fn>"),
            Self::Seq(rules) => f.debug_list().entries(rules).finish(),
            Self::Map(map) => f.debug_map().entries(map).finish(),
        }
    }
}

/// 数据到规则的转换：数组成为序列，对象成为键映射，其余为字面量
impl From<Value> for Rule {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Seq(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
            other => Self::Literal(other),
        }
    }
}

impl From<serde_json::Value> for Rule {
    fn from(json: serde_json::Value) -> Self {
        Value::from(json).into()
    }
}

impl From<Regex> for Rule {
    fn from(re: Regex) -> Self {
        Self::Regex(re)
    }
}

impl From<Vec<Rule>> for Rule {
    fn from(rules: Vec<Rule>) -> Self {
        Self::Seq(rules)
    }
}

macro_rules! rule_from_scalar {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Rule {
                fn from(v: $t) -> Self {
                    Self::Literal(v.into())
                }
            }
        )*
    };
}

rule_from_scalar!(bool, f64, f32, i32, i64, u32, u64, usize, &str, String, DateTime<Utc>);

impl<'de> Deserialize<'de> for Rule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_from_json_shapes() {
        let rule = Rule::from(json!({"name": "bob", "$or": [{"$lt": 10}, {"$gt": 20}]}));
        let Rule::Map(map) = &rule else {
            panic!("expected map, got {rule:?}");
        };
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["name", "$or"]);
        assert!(matches!(map["name"], Rule::Literal(Value::String(_))));
        assert!(matches!(&map["$or"], Rule::Seq(items) if items.len() == 2));
    }

    #[test]
    fn test_rule_deserialization() {
        let rule: Rule = serde_json::from_str(r#"{"hello": {"$like": "wor%"}}"#).unwrap();
        assert!(matches!(rule, Rule::Map(_)));
    }

    #[test]
    fn test_all_any_shapes() {
        let all = Rule::all([json!({"$gt": 1}), json!({"$lt": 10})]);
        assert_eq!(
            all.to_value(),
            Some(Value::from(json!({"$and": [{"$gt": 1}, {"$lt": 10}]})))
        );
        let any = Rule::any(["a", "b"]);
        assert_eq!(any.to_value(), Some(Value::from(json!({"$or": ["a", "b"]}))));
    }

    #[test]
    fn test_rule_parse() {
        assert!(matches!(Rule::parse(r#"[1, {"$gt": 2}]"#).unwrap(), Rule::Seq(_)));
        assert!(matches!(Rule::parse("  "), Err(RuleError::ParseError(_))));
        assert!(matches!(Rule::parse("{oops"), Err(RuleError::JsonError(_))));
    }

    #[test]
    fn test_rule_to_value() {
        let rule = Rule::from(json!({"hi": "mom", "list": [1, 2]}));
        assert_eq!(
            rule.to_value(),
            Some(Value::from(json!({"hi": "mom", "list": [1, 2]})))
        );

        let re = Rule::regex("^b.*").unwrap();
        assert_eq!(re.to_value(), Some(Value::from("^b.*")));

        let with_fn = Rule::seq([Rule::from(1), Rule::func(|_, _| Ok(true))]);
        assert_eq!(with_fn.to_value(), None);
    }

    #[test]
    fn test_invalid_regex() {
        let err = Rule::regex("[invalid").unwrap_err();
        assert!(err.to_string().contains("无效的匹配模式"));
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_ne!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_ne!(Value::from("1"), Value::from(1));

        let lazy = Value::lazy(|_, _| None);
        assert_eq!(lazy.clone(), lazy);
        assert_ne!(lazy, Value::lazy(|_, _| None));
    }

    #[test]
    fn test_value_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from(f64::NAN).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from(1).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn test_value_serialization() {
        let value = Value::from(json!({"a": 1, "b": [1.5, "x", null], "c": true}));
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({"a": 1, "b": [1.5, "x", null], "c": true})
        );

        let date = DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            serde_json::to_value(Value::from(date)).unwrap(),
            json!("2024-01-15T10:00:00+00:00")
        );
    }
}
