//! 操作符契约定义
//!
//! 操作符以 `(规则参数, 值)` 为输入，返回 [`Resolution`]：
//! - `Terminal(bool)`：终结谓词，直接给出匹配结果；
//! - `Combinator(..)`：组合子，接收求值器的 `check` 续体，自行决定以何种规则、值和模式继续求值。

use crate::error::Result;
use crate::models::{Rule, Value};
use std::fmt;
use std::sync::Arc;

/// 聚合模式
///
/// 决定映射规则的多个键、序列规则的多个元素如何合并结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    And,
    Or,
}

impl Mode {
    pub fn flip(self) -> Self {
        match self {
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// 求值续体，即求值器的 `check(rule, value, mode)`
pub type Next<'n> = &'n dyn Fn(&Rule, Option<&Value>, Mode) -> Result<bool>;

/// 操作符的两种返回形态
pub enum Resolution<'a> {
    Terminal(bool),
    Combinator(Box<dyn FnOnce(Next<'_>) -> Result<bool> + 'a>),
}

impl<'a> Resolution<'a> {
    pub fn combinator<F>(f: F) -> Self
    where
        F: FnOnce(Next<'_>) -> Result<bool> + 'a,
    {
        Self::Combinator(Box::new(f))
    }

    /// 用给定续体完成求值
    pub fn finish(self, next: Next<'_>) -> Result<bool> {
        match self {
            Self::Terminal(matched) => Ok(matched),
            Self::Combinator(f) => f(next),
        }
    }
}

impl fmt::Debug for Resolution<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminal(matched) => f.debug_tuple("Terminal").field(matched).finish(),
            Self::Combinator(_) => f.write_str("Combinator(..)"),
        }
    }
}

type ResolveFn = dyn for<'a> Fn(&'a Rule, Option<&'a Value>) -> Resolution<'a> + Send + Sync;

/// 已注册的操作符实现
///
/// 内部为 `Arc`，克隆代价很低；注册表在调用前会把句柄克隆出来。
#[derive(Clone)]
pub struct Operator(Arc<ResolveFn>);

impl Operator {
    /// 以原始解析函数创建操作符
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a Rule, Option<&'a Value>) -> Resolution<'a> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// 只产生终结结果的操作符
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Rule, Option<&Value>) -> bool + Send + Sync + 'static,
    {
        Self::new(move |rule, value| Resolution::Terminal(f(rule, value)))
    }

    /// 组合子操作符，闭包的第三个参数是求值续体
    pub fn combinator<F>(f: F) -> Self
    where
        F: Fn(&Rule, Option<&Value>, Next<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(move |rule, value| {
            let f = Arc::clone(&f);
            Resolution::combinator(move |next: Next<'_>| f(rule, value, next))
        })
    }

    pub fn resolve<'a>(&self, rule: &'a Rule, value: Option<&'a Value>) -> Resolution<'a> {
        (self.0)(rule, value)
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Operator(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_default_and_flip() {
        assert_eq!(Mode::default(), Mode::And);
        assert_eq!(Mode::And.flip(), Mode::Or);
        assert_eq!(Mode::Or.flip(), Mode::And);
        assert_eq!(Mode::Or.to_string(), "OR");
    }

    #[test]
    fn test_predicate_is_terminal() {
        let op = Operator::predicate(|_, value| value.is_some());
        let rule = Rule::from(true);
        let resolution = op.resolve(&rule, Some(&Value::Null));
        assert!(matches!(resolution, Resolution::Terminal(true)));
        assert!(matches!(op.resolve(&rule, None), Resolution::Terminal(false)));
    }

    #[test]
    fn test_combinator_calls_continuation() {
        let op = Operator::combinator(|rule, value, next| next(rule, value, Mode::Or));
        let rule = Rule::from(1.0);
        let value = Value::from(2.0);
        let next =
            |_: &Rule, _: Option<&Value>, mode: Mode| -> Result<bool> { Ok(mode == Mode::Or) };

        let resolution = op.resolve(&rule, Some(&value));
        assert!(matches!(resolution, Resolution::Combinator(_)));
        assert!(resolution.finish(&next).unwrap());
    }
}
