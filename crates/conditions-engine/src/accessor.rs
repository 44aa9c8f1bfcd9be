//! 字段路径访问
//!
//! 键映射规则中非操作符的键被视为字段路径，由 [`PathAccessor`] 从值中读取。
//! 默认实现 [`DottedPath`] 支持点号和方括号路径，如 `user.profile.age`、`items[0].name`。
//! 数组和字符串还可以读取 `length`，字符串按位置取单个字符。

use crate::models::Value;
use std::borrow::Cow;

/// 路径访问器
///
/// 读取不到时返回 `None`（未定义），此时该键直接判定为不匹配。
pub trait PathAccessor: Send + Sync {
    fn get<'v>(&self, container: &'v Value, path: &str) -> Option<Cow<'v, Value>>;
}

/// 默认路径访问器
#[derive(Debug, Clone, Copy, Default)]
pub struct DottedPath;

impl DottedPath {
    /// 拆分路径，`a[0].b` 与 `a.0.b` 等价
    fn segments(path: &str) -> Vec<&str> {
        path.split(['.', '[', ']'])
            .filter(|segment| !segment.is_empty())
            .collect()
    }

    fn step<'v>(current: &'v Value, segment: &str) -> Option<Cow<'v, Value>> {
        match current {
            Value::Object(map) => map.get(segment).map(Cow::Borrowed),
            Value::Array(arr) if segment == "length" => Some(Cow::Owned(Value::from(arr.len()))),
            Value::Array(arr) => {
                let index: usize = segment.parse().ok()?;
                arr.get(index).map(Cow::Borrowed)
            }
            // 长度按 UTF-16 码元计算
            Value::String(s) if segment == "length" => {
                Some(Cow::Owned(Value::from(s.encode_utf16().count())))
            }
            Value::String(s) => {
                let index: usize = segment.parse().ok()?;
                s.chars().nth(index).map(|c| Cow::Owned(Value::from(c.to_string())))
            }
            _ => None,
        }
    }
}

impl PathAccessor for DottedPath {
    fn get<'v>(&self, container: &'v Value, path: &str) -> Option<Cow<'v, Value>> {
        // 整个路径恰好是一个键时优先按键读取
        if let Value::Object(map) = container {
            if let Some(v) = map.get(path) {
                return Some(Cow::Borrowed(v));
            }
        }

        let segments = Self::segments(path);
        if segments.is_empty() {
            return None;
        }

        let mut current = Cow::Borrowed(container);
        for segment in segments {
            current = match current {
                Cow::Borrowed(v) => Self::step(v, segment)?,
                Cow::Owned(v) => Cow::Owned(Self::step(&v, segment)?.into_owned()),
            };
        }

        Some(current)
    }
}

/// 以闭包实现的路径访问器
pub struct FnAccessor<F>(pub F);

impl<F> PathAccessor for FnAccessor<F>
where
    F: Fn(&Value, &str) -> Option<Value> + Send + Sync,
{
    fn get<'v>(&self, container: &'v Value, path: &str) -> Option<Cow<'v, Value>> {
        (self.0)(container, path).map(Cow::Owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        Value::from(json!({
            "event": {"type": "PURCHASE"},
            "order": {
                "amount": 1000,
                "items": [
                    {"name": "ticket", "price": 500},
                    {"name": "food", "price": 500}
                ]
            },
            "user.name": "literal",
            "user": {"name": "nested", "is_vip": true, "note": null}
        }))
    }

    fn get(path: &str) -> Option<Value> {
        let data = sample();
        DottedPath.get(&data, path).map(Cow::into_owned)
    }

    #[test]
    fn test_dotted_paths() {
        assert_eq!(get("event.type"), Some(Value::from("PURCHASE")));
        assert_eq!(get("order.amount"), Some(Value::from(1000)));
        assert_eq!(get("order.items.0.name"), Some(Value::from("ticket")));
        assert_eq!(get("order.items[1].name"), Some(Value::from("food")));
        assert_eq!(get("user.is_vip"), Some(Value::from(true)));
    }

    #[test]
    fn test_length_and_string_index() {
        assert_eq!(get("order.items.length"), Some(Value::from(2)));
        assert_eq!(get("event.type.length"), Some(Value::from(8)));
        assert_eq!(get("event.type.0"), Some(Value::from("P")));
        assert_eq!(get("event.type[1].length"), Some(Value::from(1)));
        assert_eq!(get("event.type.8"), None);
        assert_eq!(get("event.length"), None);
        assert_eq!(get("order.amount.length"), None);
    }

    #[test]
    fn test_literal_key_wins() {
        assert_eq!(get("user.name"), Some(Value::from("literal")));
    }

    #[test]
    fn test_missing_paths() {
        assert_eq!(get("nonexistent"), None);
        assert_eq!(get("event.type.kind"), None);
        assert_eq!(get("order.items.5"), None);
        assert_eq!(get("order.items.x"), None);
        assert_eq!(get(""), None);
    }

    #[test]
    fn test_null_is_defined() {
        assert_eq!(get("user.note"), Some(Value::Null));
    }

    #[test]
    fn test_scalar_container() {
        assert!(DottedPath.get(&Value::from(4), "name").is_none());
        assert!(DottedPath.get(&Value::from("bob"), "0").is_none());
    }

    #[test]
    fn test_fn_accessor() {
        let accessor = FnAccessor(|_: &Value, path: &str| Some(Value::from(path.len())));
        let got = accessor.get(&Value::Null, "abc").map(Cow::into_owned);
        assert_eq!(got, Some(Value::from(3)));
    }
}
