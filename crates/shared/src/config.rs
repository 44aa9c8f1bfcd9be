//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use crate::observability::ObservabilityConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 过滤行为配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// 输出不匹配的行
    pub invert: bool,
    /// 遇到无法解析的输入行时中止，而不是跳过
    pub fail_on_parse_error: bool,
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub observability: ObservabilityConfig,
    pub filter: FilterConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "conditions".to_string(),
            environment: "development".to_string(),
            observability: ObservabilityConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（CONDITIONS_ 前缀，层级用双下划线，如 CONDITIONS_FILTER__INVERT -> filter.invert）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("CONDITIONS_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), service_name, &env)
    }

    /// 从指定目录加载配置
    pub fn load_from(
        config_dir: &Path,
        service_name: &str,
        env: &str,
    ) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            // 环境变量覆盖（CONDITIONS_OBSERVABILITY__LOG_LEVEL）
            .add_source(
                Environment::with_prefix("CONDITIONS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("conditions-config-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.service_name, "conditions");
        assert_eq!(config.observability.log_level, "info");
        assert!(!config.filter.invert);
        assert!(!config.is_production());
    }

    #[test]
    fn test_load_without_files_uses_defaults() {
        let dir = temp_dir("empty");
        let config = AppConfig::load_from(&dir, "conditions", "test").unwrap();

        assert_eq!(config.service_name, "conditions");
        assert_eq!(config.environment, "test");
        assert_eq!(config.observability.log_format, "pretty");
        assert!(!config.filter.fail_on_parse_error);
    }

    #[test]
    fn test_load_layers_override() {
        let dir = temp_dir("layers");
        fs::write(
            dir.join("default.toml"),
            "[observability]\nlog_level = \"warn\"\n\n[filter]\ninvert = true\n",
        )
        .unwrap();
        fs::write(
            dir.join("production.toml"),
            "[observability]\nlog_format = \"json\"\n",
        )
        .unwrap();
        fs::write(
            dir.join("conditions.toml"),
            "[filter]\nfail_on_parse_error = true\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&dir, "conditions", "production").unwrap();

        assert!(config.is_production());
        assert_eq!(config.observability.log_level, "warn");
        assert_eq!(config.observability.log_format, "json");
        assert!(config.filter.invert);
        assert!(config.filter.fail_on_parse_error);
    }
}
