use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::layout::AnalyzerConfig;
use crate::optimizer::OptimizerConfig;

const DEFAULT_LLM_API_URL: &str = "https://api.perplexity.ai/chat/completions";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub latex_bin: String,
    pub latex_timeout_secs: u64,
    pub data_dir: PathBuf,
    pub optimizer: OptimizerConfig,
    pub analyzer: AnalyzerConfig,
    pub port: u16,
    pub rust_log: String,
}

/// Connection settings for the chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let optimizer = OptimizerConfig {
            min_fill: parse_env("MIN_FILL_RATIO", 0.88)?,
            max_fill: parse_env("MAX_FILL_RATIO", 0.96)?,
            max_attempts: parse_env("MAX_OPTIMIZATION_ATTEMPTS", 5)?,
        };
        if optimizer.min_fill > optimizer.max_fill {
            bail!(
                "MIN_FILL_RATIO ({}) must not exceed MAX_FILL_RATIO ({})",
                optimizer.min_fill,
                optimizer.max_fill
            );
        }

        let defaults = AnalyzerConfig::default();
        let analyzer = AnalyzerConfig {
            bottom_margin_pt: parse_env("LAYOUT_BOTTOM_MARGIN_PT", defaults.bottom_margin_pt)?,
            empty_page_ratio: parse_env("LAYOUT_EMPTY_PAGE_RATIO", defaults.empty_page_ratio)?,
            failed_measurement_ratio: parse_env(
                "LAYOUT_FAILED_MEASUREMENT_RATIO",
                defaults.failed_measurement_ratio,
            )?,
        };

        Ok(Config {
            llm: LlmConfig {
                api_key: require_env("PERPLEXITY_API_KEY")?,
                api_url: std::env::var("LLM_API_URL")
                    .unwrap_or_else(|_| DEFAULT_LLM_API_URL.to_string()),
                model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "sonar".to_string()),
                temperature: parse_env("LLM_TEMPERATURE", 0.2)?,
                max_tokens: parse_env("LLM_MAX_TOKENS", 4096)?,
                timeout_secs: parse_env("LLM_TIMEOUT_SECS", 120)?,
            },
            latex_bin: std::env::var("LATEX_BIN").unwrap_or_else(|_| "pdflatex".to_string()),
            latex_timeout_secs: parse_env("LATEX_TIMEOUT_SECS", 120)?,
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            optimizer,
            analyzer,
            port: parse_env("PORT", 5000)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Reads an optional variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} has an invalid value: '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_accepts_padded_numbers() {
        let v: f64 = parse_value("MIN_FILL_RATIO", " 0.9 ").unwrap();
        assert!((v - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_parse_value_reports_key_on_failure() {
        let err = parse_value::<u16>("PORT", "eighty").unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let v: u32 = parse_env("TAILOR_TEST_SURELY_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(v, 7);
    }
}
