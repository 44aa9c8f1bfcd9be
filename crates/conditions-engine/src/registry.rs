//! 操作符注册表
//!
//! 使用 DashMap 提供线程安全的名称到操作符映射，支持运行时增删。
//! 同一引擎编译出的所有谓词共享这张表：编译之后的增删会被已有谓词观察到（延迟绑定）。
//! 因此谓词在引擎生命周期内的行为并不保证稳定。

use crate::error::{Result, RuleError};
use crate::models::{Rule, Value};
use crate::operators::{Operator, Resolution};
use dashmap::DashMap;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info};

/// 删除请求
///
/// - `Name`：删除单个名称，不存在时忽略；
/// - `List`：逐个删除，嵌套列表会被展开；
/// - `Filter`：只删除值为真的键，便于复用批量注册时的映射。
#[derive(Debug, Clone, PartialEq)]
pub enum Removal {
    Name(String),
    List(Vec<Removal>),
    Filter(IndexMap<String, bool>),
}

impl Removal {
    fn collect_names<'r>(&'r self, names: &mut Vec<&'r str>) {
        match self {
            Self::Name(name) => names.push(name),
            Self::List(items) => items.iter().for_each(|item| item.collect_names(names)),
            Self::Filter(map) => names.extend(
                map.iter()
                    .filter(|(_, keep)| **keep)
                    .map(|(name, _)| name.as_str()),
            ),
        }
    }
}

impl From<&str> for Removal {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Removal {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl<T: Into<Removal>> From<Vec<T>> for Removal {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Removal>, const N: usize> From<[T; N]> for Removal {
    fn from(items: [T; N]) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, bool>> for Removal {
    fn from(map: IndexMap<String, bool>) -> Self {
        Self::Filter(map)
    }
}

/// 字符串为名称，数组为列表，对象按值的真假过滤；其余形态不删除任何内容
impl From<serde_json::Value> for Removal {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::String(name) => Self::Name(name),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(map) => Self::Filter(
                map.into_iter()
                    .map(|(name, keep)| (name, Value::from(keep).is_truthy()))
                    .collect(),
            ),
            _ => Self::List(Vec::new()),
        }
    }
}

/// 操作符注册表
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    ops: Arc<DashMap<String, Operator>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operators<K, I>(ops: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Operator)>,
    {
        let registry = Self::new();
        registry.add_all(ops);
        registry
    }

    /// 当前注册的操作符数量
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// 克隆出操作符句柄，调用时不持有分片锁
    pub fn get(&self, name: &str) -> Option<Operator> {
        self.ops.get(name).map(|entry| entry.value().clone())
    }

    /// 调用操作符；名称未注册属于调用方错误
    pub fn invoke<'a>(
        &self,
        name: &str,
        rule: &'a Rule,
        value: Option<&'a Value>,
    ) -> Result<Resolution<'a>> {
        let op = self
            .get(name)
            .ok_or_else(|| RuleError::UnknownOperator(name.to_string()))?;
        Ok(op.resolve(rule, value))
    }

    /// 注册单个操作符，同名覆盖
    pub fn add(&self, name: impl Into<String>, op: Operator) {
        let name = name.into();
        debug!(operator = %name, "注册操作符");
        self.ops.insert(name, op);
    }

    /// 批量注册，同名覆盖
    pub fn add_all<K, I>(&self, ops: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Operator)>,
    {
        let mut count = 0usize;
        for (name, op) in ops {
            self.add(name, op);
            count += 1;
        }
        info!("操作符已注册: {} 个", count);
    }

    /// 删除操作符，返回实际删除的数量
    pub fn remove(&self, removal: &Removal) -> usize {
        let mut names = Vec::new();
        removal.collect_names(&mut names);

        let removed = names
            .into_iter()
            .filter(|name| {
                let hit = self.ops.remove(*name).is_some();
                if hit {
                    debug!(operator = %name, "删除操作符");
                }
                hit
            })
            .count();

        info!("操作符已删除: {} 个", removed);
        removed
    }

    /// 所有操作符名称（已排序）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ops.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("names", &self.names())
            .finish()
    }
}
