//! CLI 命令定义与执行
//!
//! 从文件或标准输入逐行读取 JSON，用规则过滤后输出。

use anyhow::{bail, Context, Result};
use clap::Parser;
use conditions::{Engine, Predicate, Rule, Value};
use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, warn};

/// 条件过滤命令行工具
///
/// 规则是 MongoDB 风格的 JSON 查询对象，输入为每行一个 JSON 值。
#[derive(Parser, Debug)]
#[command(name = "conditions")]
#[command(version, about = "用声明式规则过滤 JSON 行")]
pub struct Cli {
    /// 规则 JSON，如 '{"age": {"$gte": 18}}'
    #[arg(short, long, conflicts_with = "rule_file")]
    pub rule: Option<String>,

    /// 规则文件路径
    #[arg(long)]
    pub rule_file: Option<PathBuf>,

    /// 输入文件路径，缺省读取标准输入
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// 输出不匹配的行
    #[arg(short = 'v', long)]
    pub invert: bool,

    /// 只输出匹配数量
    #[arg(short, long)]
    pub count: bool,

    /// 日志级别 (trace, debug, info, warn, error)，覆盖配置文件
    #[arg(short, long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// 读取规则文本
    pub fn rule_source(&self) -> Result<String> {
        match (&self.rule, &self.rule_file) {
            (Some(rule), _) => Ok(rule.clone()),
            (None, Some(path)) => fs::read_to_string(path)
                .with_context(|| format!("无法读取规则文件: {}", path.display())),
            (None, None) => bail!("必须通过 --rule 或 --rule-file 提供规则"),
        }
    }
}

/// 过滤统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterStats {
    pub total: usize,
    pub matched: usize,
    pub skipped: usize,
}

/// 过滤执行器
pub struct FilterRunner {
    predicate: Predicate,
    invert: bool,
    fail_on_parse_error: bool,
}

impl FilterRunner {
    pub fn new(engine: &Engine, rule_json: &str) -> Result<Self> {
        let rule = Rule::parse(rule_json).context("规则不是合法的 JSON")?;
        Ok(Self {
            predicate: engine.compile(rule),
            invert: false,
            fail_on_parse_error: false,
        })
    }

    pub fn invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn fail_on_parse_error(mut self, fail: bool) -> Self {
        self.fail_on_parse_error = fail;
        self
    }

    /// 逐行过滤；`count_only` 时只在结尾输出数量
    pub fn run<R: BufRead, W: Write>(
        &self,
        input: R,
        mut out: W,
        count_only: bool,
    ) -> Result<FilterStats> {
        let mut stats = FilterStats::default();

        for (index, line) in input.lines().enumerate() {
            let line = line.context("读取输入失败")?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            stats.total += 1;
            let value: Value = match serde_json::from_str(trimmed) {
                Ok(value) => value,
                Err(e) if self.fail_on_parse_error => {
                    return Err(e).with_context(|| format!("第 {} 行不是合法的 JSON", index + 1));
                }
                Err(e) => {
                    warn!("跳过第 {} 行: {}", index + 1, e);
                    stats.skipped += 1;
                    continue;
                }
            };

            let matched = self.predicate.test(&value)?;
            debug!(line = index + 1, matched, "行已评估");

            if matched != self.invert {
                stats.matched += 1;
                if !count_only {
                    writeln!(out, "{}", trimmed)?;
                }
            }
        }

        if count_only {
            writeln!(out, "{}", stats.matched)?;
        }

        Ok(stats)
    }
}
