//! 条件过滤命令行入口
//!
//! 配置从 config/{service_name}.toml 等位置加载，命令行参数优先。

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, FilterRunner};
use conditions::default_engine;
use conditions_shared::config::AppConfig;
use conditions_shared::observability;
use std::fs::File;
use std::io::{self, BufReader};
use tracing::info;

const SERVICE_NAME: &str = "conditions";

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    observability::init(&config.observability)?;

    let runner = FilterRunner::new(default_engine(), &cli.rule_source()?)?
        .invert(cli.invert || config.filter.invert)
        .fail_on_parse_error(config.filter.fail_on_parse_error);

    let stdout = io::stdout().lock();
    let stats = match &cli.input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("无法打开输入文件: {}", path.display()))?;
            runner.run(BufReader::new(file), stdout, cli.count)?
        }
        None => runner.run(io::stdin().lock(), stdout, cli.count)?,
    };

    info!(
        total = stats.total,
        matched = stats.matched,
        skipped = stats.skipped,
        "过滤完成"
    );

    Ok(())
}
