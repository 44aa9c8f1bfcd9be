//! 声明式条件匹配引擎
//!
//! 以 MongoDB 风格的嵌套查询对象描述规则，判断任意内存中的值是否匹配：
//! - 字面量、正则、函数、序列和键映射的递归组合
//! - 以 `$` 开头的可插拔操作符（`$gt`、`$and`、`$like` 等），运行时可增删
//! - AND/OR 模式的短路求值，组合子可切换模式或取反
//!
//! ```
//! use conditions::{compile, Value};
//! use serde_json::json;
//!
//! let rule = compile(json!({"$and": [{"$gt": 1}, {"$lt": 10}]}));
//! assert!(rule.test(&Value::from(4)).unwrap());
//! assert!(!rule.test(&Value::from(40)).unwrap());
//! ```
//!
//! 求值是单线程同步的递归遍历。注册表可以在多线程间共享，
//! 但在求值过程中并发修改注册表会让结果取决于时序。

pub mod accessor;
pub mod builtins;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod operators;
pub mod registry;

pub use accessor::{DottedPath, FnAccessor, PathAccessor};
pub use engine::{compile, default_engine, Engine, EngineBuilder, EngineConfig, Predicate};
pub use error::{Result, RuleError};
pub use evaluator::{Evaluator, KeyKind};
pub use models::{Rule, Value};
pub use operators::{Mode, Next, Operator, Resolution};
pub use registry::{OperatorRegistry, Removal};
