//! 规则求值器
//!
//! 递归地将规则树与值树对齐匹配。解析优先级：
//! 1. 规则是函数：直接交给函数；
//! 2. 值是惰性生产者：先求出真实值再继续；
//! 3. 规则是序列：按模式 AND/OR 短路合并各元素；
//! 4. 规则是正则：交给 `$regex`；
//! 5. 规则是字面量：交给 `$eq`；
//! 6. 规则是键映射：每个键先查注册表，是操作符则调用，否则作为字段路径读取后递归。

use crate::accessor::PathAccessor;
use crate::builtins::names;
use crate::error::Result;
use crate::models::{Rule, Value};
use crate::operators::{Mode, Operator};
use crate::registry::OperatorRegistry;
use std::sync::Arc;
use tracing::trace;

/// 键映射中一个键的含义
#[derive(Debug, Clone)]
pub enum KeyKind {
    /// 注册表中存在同名操作符
    Operator(Operator),
    /// 字段路径
    Field,
}

/// 规则求值器
pub struct Evaluator {
    registry: OperatorRegistry,
    accessor: Arc<dyn PathAccessor>,
}

impl Evaluator {
    pub fn new(registry: OperatorRegistry, accessor: Arc<dyn PathAccessor>) -> Self {
        Self { registry, accessor }
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// 判定键的含义，在求值时进行，因此操作符是延迟绑定的
    pub fn resolve_key(&self, key: &str) -> KeyKind {
        match self.registry.get(key) {
            Some(op) => KeyKind::Operator(op),
            None => KeyKind::Field,
        }
    }

    /// 评估规则
    pub fn check(&self, rule: &Rule, value: Option<&Value>, mode: Mode) -> Result<bool> {
        if let Rule::Func(f) = rule {
            return f(value, mode);
        }

        if let Some(Value::Lazy(produce)) = value {
            trace!(%mode, "解析惰性值");
            let produced = produce(rule, mode);
            return self.check(rule, produced.as_ref(), mode);
        }

        match rule {
            Rule::Seq(rules) => aggregate(rules, mode, |item| self.check(item, value, Mode::And)),
            Rule::Regex(_) => self.apply(names::REGEX, rule, value),
            Rule::Map(map) => aggregate(map, mode, |(key, sub)| self.check_key(key, sub, value)),
            Rule::Literal(_) | Rule::Func(_) => self.apply(names::EQ, rule, value),
        }
    }

    /// 评估键映射中的单个键
    fn check_key(&self, key: &str, sub: &Rule, value: Option<&Value>) -> Result<bool> {
        match self.resolve_key(key) {
            KeyKind::Operator(op) => {
                let next = |r: &Rule, v: Option<&Value>, m: Mode| self.check(r, v, m);
                op.resolve(sub, value).finish(&next)
            }
            KeyKind::Field => {
                let found = value.and_then(|container| self.accessor.get(container, key));
                match found {
                    Some(field) => self.check(sub, Some(field.as_ref()), Mode::And),
                    None => {
                        trace!(path = key, "字段不存在");
                        Ok(false)
                    }
                }
            }
        }
    }

    /// 调用内置的兜底操作符，未注册时返回错误
    fn apply(&self, name: &str, rule: &Rule, value: Option<&Value>) -> Result<bool> {
        let next = |r: &Rule, v: Option<&Value>, m: Mode| self.check(r, v, m);
        self.registry.invoke(name, rule, value)?.finish(&next)
    }
}

/// 按模式短路合并：AND 遇到 false 立即返回，OR 遇到 true 立即返回
///
/// 空集合在 AND 下为真，在 OR 下为假。
fn aggregate<I, F>(items: I, mode: Mode, mut test: F) -> Result<bool>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Result<bool>,
{
    for item in items {
        let matched = test(item)?;
        match mode {
            Mode::And if !matched => return Ok(false),
            Mode::Or if matched => return Ok(true),
            _ => {}
        }
    }
    Ok(mode == Mode::And)
}
