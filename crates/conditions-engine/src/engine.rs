//! 规则引擎工厂
//!
//! [`Engine`] 绑定自己的操作符注册表和路径访问器，把规则编译成可重复调用的 [`Predicate`]。
//!
//! 注意：谓词编译后仍然引用引擎的注册表。之后通过 `add_op` / `remove_op` 做的修改
//! 会影响所有已编译的谓词。这是为插件式扩展准备的延迟绑定，并非缺陷；
//! 需要稳定行为时，请使用独立的引擎实例。

use crate::accessor::{DottedPath, FnAccessor, PathAccessor};
use crate::builtins::default_operators;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::models::{Rule, Value};
use crate::operators::{Mode, Operator};
use crate::registry::{OperatorRegistry, Removal};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

/// 引擎配置
#[derive(Clone, Default)]
pub struct EngineConfig {
    /// 额外的操作符，合并进默认操作符库（同名覆盖）
    pub ops: HashMap<String, Operator>,
    /// 自定义路径访问器，缺省为 [`DottedPath`]
    pub getter: Option<Arc<dyn PathAccessor>>,
}

/// 引擎构建器
pub struct EngineBuilder {
    config: EngineConfig,
    defaults: bool,
}

impl EngineBuilder {
    fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            defaults: true,
        }
    }

    pub fn op(mut self, name: impl Into<String>, op: Operator) -> Self {
        self.config.ops.insert(name.into(), op);
        self
    }

    pub fn ops<K, I>(mut self, ops: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Operator)>,
    {
        self.config
            .ops
            .extend(ops.into_iter().map(|(name, op)| (name.into(), op)));
        self
    }

    pub fn getter(mut self, accessor: impl PathAccessor + 'static) -> Self {
        self.config.getter = Some(Arc::new(accessor));
        self
    }

    /// 以闭包作为路径访问器
    pub fn getter_fn<F>(self, f: F) -> Self
    where
        F: Fn(&Value, &str) -> Option<Value> + Send + Sync + 'static,
    {
        self.getter(FnAccessor(f))
    }

    /// 不加载默认操作符库
    pub fn without_defaults(mut self) -> Self {
        self.defaults = false;
        self
    }

    pub fn build(self) -> Engine {
        let registry = OperatorRegistry::new();
        if self.defaults {
            registry.add_all(default_operators());
        }
        registry.add_all(self.config.ops);

        let accessor = self
            .config
            .getter
            .unwrap_or_else(|| Arc::new(DottedPath));

        info!("规则引擎已创建: {} 个操作符", registry.len());

        Engine {
            evaluator: Arc::new(Evaluator::new(registry, accessor)),
        }
    }
}

/// 规则引擎实例
///
/// 克隆只复制 `Arc`，克隆体共享同一个注册表。
#[derive(Clone)]
pub struct Engine {
    evaluator: Arc<Evaluator>,
}

impl Engine {
    /// 使用默认操作符库和默认路径访问器
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn configure(config: EngineConfig) -> Self {
        EngineBuilder {
            config,
            defaults: true,
        }
        .build()
    }

    /// 编译规则为谓词
    pub fn compile(&self, rule: impl Into<Rule>) -> Predicate {
        let rule = rule.into();
        debug!(?rule, "规则已编译");
        Predicate {
            engine: self.clone(),
            rule: Arc::new(rule),
        }
    }

    /// 直接评估规则
    pub fn check(&self, rule: &Rule, value: Option<&Value>, mode: Mode) -> Result<bool> {
        self.evaluator.check(rule, value, mode)
    }

    pub fn add_op(&self, name: impl Into<String>, op: Operator) {
        self.evaluator.registry().add(name, op);
    }

    pub fn add_ops<K, I>(&self, ops: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Operator)>,
    {
        self.evaluator.registry().add_all(ops);
    }

    /// 删除操作符，接受名称、名称列表或按真值过滤的映射
    pub fn remove_op(&self, removal: impl Into<Removal>) -> usize {
        self.evaluator.registry().remove(&removal.into())
    }

    /// 同 [`Engine::remove_op`]
    pub fn remove_ops(&self, removal: impl Into<Removal>) -> usize {
        self.remove_op(removal)
    }

    pub fn has_op(&self, name: &str) -> bool {
        self.evaluator.registry().exists(name)
    }

    pub fn operator_names(&self) -> Vec<String> {
        self.evaluator.registry().names()
    }

    pub fn registry(&self) -> &OperatorRegistry {
        self.evaluator.registry()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("registry", self.evaluator.registry())
            .finish()
    }
}

/// 编译后的谓词
#[derive(Clone)]
pub struct Predicate {
    engine: Engine,
    rule: Arc<Rule>,
}

impl Predicate {
    pub fn test(&self, value: &Value) -> Result<bool> {
        self.test_opt(Some(value))
    }

    /// `None` 表示未定义的值
    pub fn test_opt(&self, value: Option<&Value>) -> Result<bool> {
        self.engine.check(&self.rule, value, Mode::And)
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("rule", &self.rule).finish()
    }
}

/// 嵌套的已编译谓词作为规则函数使用，忽略外层模式
impl From<Predicate> for Rule {
    fn from(predicate: Predicate) -> Self {
        Rule::func(move |value, _mode| predicate.test_opt(value))
    }
}

static DEFAULT_ENGINE: LazyLock<Engine> = LazyLock::new(Engine::new);

/// 进程级共享的默认引擎
pub fn default_engine() -> &'static Engine {
    &DEFAULT_ENGINE
}

/// 使用默认引擎编译规则
pub fn compile(rule: impl Into<Rule>) -> Predicate {
    default_engine().compile(rule)
}
