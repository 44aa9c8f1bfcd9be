//! 规则引擎错误类型
//!
//! 数据层面的不匹配（类型不符、字段缺失）不会产生错误，而是求值为 `false`。
//! 这里只列出调用方契约被破坏或输入无法构造成规则的情况。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("未注册的操作符: {0}")]
    UnknownOperator(String),

    #[error("无效的匹配模式 '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("规则解析失败: {0}")]
    ParseError(String),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RuleError {
    pub(crate) fn invalid_pattern(pattern: &str, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
