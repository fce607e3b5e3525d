use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{ReportError, SecretValue, require_env};

const DEFAULT_CONFIG_PATH: &str = "reportforge.toml";
const CONFIG_PATH_ENV: &str = "REPORTFORGE_CONFIG";

/// Top-level configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub visualization: VisualizationConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Resolve the configured LLM secret value (from environment only).
    pub fn llm_api_key(&self) -> Result<SecretValue, ReportError> {
        require_env(&self.llm.api_key_env)
    }
}

/// Helper to load configuration with best-practice guard rails.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `REPORTFORGE_CONFIG` environment variable.
    /// 3. `reportforge.toml` in the current working directory.
    pub fn load(path: Option<PathBuf>) -> Result<Config, ReportError> {
        let candidate = resolve_path(path);
        let raw = fs::read_to_string(&candidate)
            .map_err(|err| ReportError::config_io(candidate.clone(), err))?;
        let config: Config = toml::from_str(&raw)
            .map_err(|err| ReportError::InvalidConfiguration(err.to_string()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &Config) -> Result<(), ReportError> {
        if config.llm.api_key_env.trim().is_empty() {
            return Err(ReportError::InvalidConfiguration(
                "llm.api_key_env must reference an environment variable".into(),
            ));
        }

        // Ensure the variable exists at load time to discourage inline secrets.
        require_env(&config.llm.api_key_env)?;

        if config.research.concurrent_requests == 0 {
            return Err(ReportError::InvalidConfiguration(
                "research.concurrent_requests must be at least 1".into(),
            ));
        }
        if config.research.max_sources_per_query == 0 {
            return Err(ReportError::InvalidConfiguration(
                "research.max_sources_per_query must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

fn resolve_path(path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = path {
        return path;
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return PathBuf::from(from_env);
        }
    }

    Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub api_key_env: String,
    #[serde(default = "LlmConfig::default_temperature")]
    pub temperature: f32,
    #[serde(default = "LlmConfig::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "LlmConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl LlmConfig {
    const fn default_temperature() -> f32 {
        0.7
    }

    const fn default_max_tokens() -> u32 {
        8_000
    }

    const fn default_timeout_secs() -> u64 {
        60
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "ResearchConfig::default_max_sources_per_query")]
    pub max_sources_per_query: usize,
    #[serde(default = "ResearchConfig::default_concurrent_requests")]
    pub concurrent_requests: usize,
    #[serde(default = "ResearchConfig::default_max_results_per_source")]
    pub max_results_per_source: usize,
    #[serde(default = "ResearchConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ResearchConfig {
    const fn default_max_sources_per_query() -> usize {
        10
    }

    const fn default_concurrent_requests() -> usize {
        3
    }

    const fn default_max_results_per_source() -> usize {
        5
    }

    const fn default_request_timeout_secs() -> u64 {
        20
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_sources_per_query: Self::default_max_sources_per_query(),
            concurrent_requests: Self::default_concurrent_requests(),
            max_results_per_source: Self::default_max_results_per_source(),
            request_timeout_secs: Self::default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisualizationConfig {
    #[serde(default = "VisualizationConfig::default_max_charts")]
    pub max_charts_per_report: usize,
    #[serde(default = "VisualizationConfig::default_style")]
    pub style: String,
}

impl VisualizationConfig {
    const fn default_max_charts() -> usize {
        8
    }

    fn default_style() -> String {
        "academic".to_string()
    }
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            max_charts_per_report: Self::default_max_charts(),
            style: Self::default_style(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "ReportConfig::default_output_dir")]
    pub output_dir: PathBuf,
}

impl ReportConfig {
    fn default_output_dir() -> PathBuf {
        PathBuf::from("outputs")
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: Self::default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_config_with_defaults() {
        unsafe {
            std::env::set_var("REPORTFORGE_TEST_KEY", "sk-test");
        }

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[llm]\nprovider = \"openai\"\nmodel = \"gpt-4o-mini\"\napi_key_env = \"REPORTFORGE_TEST_KEY\"\n"
        )
        .unwrap();

        let config = ConfigLoader::load(Some(file.path().to_path_buf())).expect("config loads");
        assert_eq!(config.research.max_sources_per_query, 10);
        assert_eq!(config.research.concurrent_requests, 3);
        assert_eq!(config.visualization.max_charts_per_report, 8);
        assert_eq!(config.report.output_dir, PathBuf::from("outputs"));
    }

    #[test]
    fn rejects_zero_concurrency() {
        unsafe {
            std::env::set_var("REPORTFORGE_TEST_KEY2", "sk-test");
        }

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[llm]\nprovider = \"openai\"\nmodel = \"gpt-4o-mini\"\napi_key_env = \"REPORTFORGE_TEST_KEY2\"\n\n[research]\nconcurrent_requests = 0\n"
        )
        .unwrap();

        let err = ConfigLoader::load(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ReportError::InvalidConfiguration(_)));
    }

    #[test]
    fn missing_file_maps_to_config_io() {
        let err = ConfigLoader::load(Some(PathBuf::from("/nonexistent/reportforge.toml")))
            .unwrap_err();
        assert!(matches!(err, ReportError::ConfigIo { .. }));
    }
}
