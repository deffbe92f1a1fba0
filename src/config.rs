use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// 单个阶段的调度配置
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// 是否合并为批量调用
    pub batching_enabled: bool,
    /// 每批条目数
    pub batch_size: usize,
    /// 本阶段最多处理的条目数
    pub max_items: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            batching_enabled: false,
            batch_size: 1,
            max_items: 1,
        }
    }
}

impl StageConfig {
    /// 阶段开始时校验，任何外部调用之前
    pub fn validate(&self, stage: &str) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid_batch_size(stage));
        }
        if self.max_items == 0 {
            return Err(ConfigError::invalid_stage_limit(stage));
        }
        Ok(())
    }
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 预设名称（testing / quick_scan / budget / comprehensive）
    pub preset: Option<String>,
    // --- 限流 ---
    pub rate_limiting_enabled: bool,
    /// 每 60 秒最多调用次数
    pub rate_limit_rpm: u32,
    /// 相邻两次调用的最小间隔（秒）
    pub min_request_interval_secs: f64,
    pub log_rate_limit_waits: bool,
    // --- 阶段 ---
    /// 总开关：同时打开两个阶段的批量模式
    pub use_batching: bool,
    pub detailed_analysis_enabled: bool,
    pub summarization_enabled: bool,
    pub details: StageConfig,
    pub analysis: StageConfig,
    pub max_patents_to_fetch: usize,
    pub max_abstract_sentences: usize,
    pub max_claim_sentences: usize,
    /// 同时在途的批次数
    pub max_concurrent_batches: usize,
    // --- 超时 ---
    pub call_timeout_secs: f64,
    pub stage_timeout_secs: Option<f64>,
    // --- 备用通道 ---
    pub secondary_fetch_enabled: bool,
    pub secondary_analysis_enabled: bool,
    pub patents_base_url: String,
    pub secondary_min_interval_secs: f64,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    // --- 输入输出 ---
    pub input_file: String,
    pub output_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preset: None,
            rate_limiting_enabled: true,
            rate_limit_rpm: 10,
            min_request_interval_secs: 6.0,
            log_rate_limit_waits: true,
            use_batching: false,
            detailed_analysis_enabled: false,
            summarization_enabled: false,
            details: StageConfig::default(),
            analysis: StageConfig::default(),
            max_patents_to_fetch: 1,
            max_abstract_sentences: 3,
            max_claim_sentences: 5,
            max_concurrent_batches: 1,
            call_timeout_secs: 120.0,
            stage_timeout_secs: None,
            secondary_fetch_enabled: true,
            secondary_analysis_enabled: true,
            patents_base_url: "https://patents.google.com".to_string(),
            secondary_min_interval_secs: 1.0,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_max_tokens: 4000,
            llm_temperature: 0.3,
            input_file: "data/sample_invention.json".to_string(),
            output_file: "output/results.json".to_string(),
            verbose_logging: true,
        }
    }
}

impl Config {
    /// 加载配置：默认值 → TOML 文件 → 预设 → 环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var("CONFIG_FILE").ok();
        let path = explicit.clone().unwrap_or_else(|| "config.toml".to_string());

        let mut config = if explicit.is_some() || Path::new(&path).exists() {
            Self::from_toml_file(&path)?
        } else {
            Self::default()
        };

        if let Ok(preset) = std::env::var("PRESET") {
            config.preset = Some(preset);
        }
        if let Some(preset) = config.preset.clone() {
            config.apply_preset(&preset)?;
        }

        config.apply_env();
        Ok(config)
    }

    /// 从 TOML 文件读取（缺失的字段使用默认值）
    pub fn from_toml_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadFailed {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::FileParseFailed { message, .. } => ConfigError::FileParseFailed {
                path: path.to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::FileParseFailed {
            path: String::new(),
            message: e.to_string(),
        })
    }

    /// 环境变量覆盖
    pub fn apply_env(&mut self) {
        let default = self.clone();
        self.llm_api_key = std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key);
        self.llm_api_base_url = std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url);
        self.llm_model_name = std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name);
        self.rate_limit_rpm = env_parse("RATE_LIMIT_RPM").unwrap_or(default.rate_limit_rpm);
        self.min_request_interval_secs =
            env_parse("MIN_REQUEST_INTERVAL").unwrap_or(default.min_request_interval_secs);
        self.rate_limiting_enabled =
            env_flag("USE_RATE_LIMITING").unwrap_or(default.rate_limiting_enabled);
        self.use_batching = env_flag("USE_BATCHING").unwrap_or(default.use_batching);
        self.detailed_analysis_enabled =
            env_flag("USE_DETAILED_ANALYSIS").unwrap_or(default.detailed_analysis_enabled);
        self.summarization_enabled =
            env_flag("USE_SUMMARIZATION").unwrap_or(default.summarization_enabled);
        self.max_concurrent_batches =
            env_parse("MAX_CONCURRENT_BATCHES").unwrap_or(default.max_concurrent_batches);
        self.input_file = std::env::var("INPUT_FILE").unwrap_or(default.input_file);
        self.output_file = std::env::var("OUTPUT_FILE").unwrap_or(default.output_file);
        self.verbose_logging = env_flag("VERBOSE_LOGGING").unwrap_or(default.verbose_logging);
    }

    /// 应用预设
    pub fn apply_preset(&mut self, name: &str) -> Result<(), ConfigError> {
        match name {
            "testing" => {
                self.rate_limiting_enabled = true;
                self.use_batching = false;
                self.summarization_enabled = false;
                self.detailed_analysis_enabled = false;
                self.max_patents_to_fetch = 10;
                self.analysis.max_items = 1;
                self.details.max_items = 1;
            }
            "quick_scan" => {
                self.rate_limiting_enabled = true;
                self.use_batching = false;
                self.summarization_enabled = false;
                self.detailed_analysis_enabled = false;
                self.max_patents_to_fetch = 100;
                self.analysis.max_items = 15;
            }
            "budget" => {
                self.rate_limiting_enabled = true;
                self.use_batching = true;
                self.summarization_enabled = true;
                self.detailed_analysis_enabled = true;
                self.max_patents_to_fetch = 50;
                self.details.max_items = 15;
                self.analysis.max_items = 5;
            }
            "comprehensive" => {
                self.rate_limiting_enabled = true;
                self.use_batching = true;
                self.summarization_enabled = true;
                self.detailed_analysis_enabled = true;
                self.max_patents_to_fetch = 100;
                self.details.max_items = 20;
                self.analysis.max_items = 20;
            }
            other => {
                return Err(ConfigError::UnknownPreset {
                    name: other.to_string(),
                })
            }
        }
        self.preset = Some(name.to_string());
        Ok(())
    }

    /// 校验全部配置；任何错误对整次运行都是致命的
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_rpm == 0 {
            return Err(ConfigError::InvalidRateCeiling);
        }
        check_seconds("min_request_interval_secs", self.min_request_interval_secs)?;
        check_seconds("secondary_min_interval_secs", self.secondary_min_interval_secs)?;
        check_seconds("call_timeout_secs", self.call_timeout_secs)?;
        if let Some(stage_timeout) = self.stage_timeout_secs {
            check_seconds("stage_timeout_secs", stage_timeout)?;
        }
        if self.max_concurrent_batches == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.max_patents_to_fetch == 0 {
            return Err(ConfigError::invalid_stage_limit("search"));
        }
        self.details.validate("details")?;
        self.analysis.validate("analysis")?;
        Ok(())
    }

    /// details 阶段的有效配置（总开关会打开批量模式）
    pub fn details_stage(&self) -> StageConfig {
        self.effective(self.details)
    }

    /// analysis 阶段的有效配置
    pub fn analysis_stage(&self) -> StageConfig {
        self.effective(self.analysis)
    }

    pub fn min_request_interval(&self) -> Duration {
        seconds(self.min_request_interval_secs)
    }

    pub fn secondary_min_interval(&self) -> Duration {
        seconds(self.secondary_min_interval_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        seconds(self.call_timeout_secs)
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs.map(seconds)
    }

    fn effective(&self, stage: StageConfig) -> StageConfig {
        StageConfig {
            batching_enabled: stage.batching_enabled || self.use_batching,
            ..stage
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        warn!("⚠️ 环境变量 {}={:?} 无法解析，已忽略", name, raw);
    }
    parsed
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    let parsed = parse_flag(&raw);
    if parsed.is_none() {
        warn!("⚠️ 环境变量 {}={:?} 不是布尔值，已忽略", name, raw);
    }
    parsed
}

/// 不区分大小写：true/false、1/0、yes/no、on/off
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn check_seconds(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid_interval(name, value))
    }
}

// validate() 之后调用，负数已被排除
fn seconds(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let mut config = Config::default();
        config.analysis.batch_size = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidBatchSize {
                stage: "analysis".to_string()
            })
        );
    }

    #[test]
    fn test_negative_interval_is_rejected() {
        let mut config = Config::default();
        config.min_request_interval_secs = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidInterval { .. })
        ));

        let mut config = Config::default();
        config.stage_timeout_secs = Some(f64::NAN);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn test_zero_rate_ceiling_is_rejected() {
        let mut config = Config::default();
        config.rate_limit_rpm = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidRateCeiling));
    }

    #[test]
    fn test_presets() {
        let mut config = Config::default();
        config.apply_preset("budget").unwrap();
        assert!(config.use_batching);
        assert!(config.detailed_analysis_enabled);
        assert_eq!(config.max_patents_to_fetch, 50);
        assert!(config.details_stage().batching_enabled);
        assert!(config.analysis_stage().batching_enabled);

        assert!(matches!(
            config.apply_preset("turbo"),
            Err(ConfigError::UnknownPreset { .. })
        ));
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = Config::from_toml_str(
            r#"
rate_limit_rpm = 30
stage_timeout_secs = 90.0

[details]
batching_enabled = true
batch_size = 5
"#,
        )
        .unwrap();

        assert_eq!(config.rate_limit_rpm, 30);
        assert_eq!(config.min_request_interval_secs, 6.0);
        assert_eq!(config.stage_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.details.batch_size, 5);
        assert_eq!(config.details.max_items, 1);
        assert!(!config.analysis_stage().batching_enabled);
    }

    #[test]
    fn test_flags_parse_case_insensitively() {
        assert_eq!(parse_flag("True"), Some(true));
        assert_eq!(parse_flag("FALSE"), Some(false));
        assert_eq!(parse_flag(" 1 "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_env_flag_reads_capitalized_value() {
        std::env::set_var("PATENT_ENRICH_TEST_FLAG", "True");
        assert_eq!(env_flag("PATENT_ENRICH_TEST_FLAG"), Some(true));
        std::env::set_var("PATENT_ENRICH_TEST_FLAG", "sometimes");
        assert_eq!(env_flag("PATENT_ENRICH_TEST_FLAG"), None);
        std::env::remove_var("PATENT_ENRICH_TEST_FLAG");
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        assert!(matches!(
            Config::from_toml_str("rate_limit_rpm = \"many\""),
            Err(ConfigError::FileParseFailed { .. })
        ));
    }
}
