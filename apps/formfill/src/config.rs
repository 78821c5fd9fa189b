use std::str::FromStr;

use anyhow::{Context, Result};

pub const DEFAULT_API_URL: &str = "https://api-inference.modelscope.cn/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-V3.2";

/// Sampling parameters sent with one kind of completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
    pub enable_thinking: Option<bool>,
}

/// Per-stage sampling: the primary fill call, the lightweight analysis calls
/// (missing-field scan and field naming) and the audit call.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceSettings {
    pub fill: SamplingParams,
    pub analysis: SamplingParams,
    pub audit: SamplingParams,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            fill: SamplingParams {
                temperature: 0.2,
                top_p: 0.3,
                max_tokens: None,
                enable_thinking: Some(true),
            },
            analysis: SamplingParams {
                temperature: 0.3,
                top_p: 0.7,
                max_tokens: Some(500),
                enable_thinking: None,
            },
            audit: SamplingParams {
                temperature: 0.3,
                top_p: 0.7,
                max_tokens: Some(2000),
                enable_thinking: None,
            },
        }
    }
}

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed numbers are rejected.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    /// Client-side request timeout. `None` leaves the call unbounded.
    pub timeout_secs: Option<u64>,
    pub inference: InferenceSettings,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = InferenceSettings::default();
        let inference = InferenceSettings {
            fill: SamplingParams {
                temperature: parse_env("FILL_TEMPERATURE", defaults.fill.temperature)?,
                top_p: parse_env("FILL_TOP_P", defaults.fill.top_p)?,
                max_tokens: parse_optional_env("FILL_MAX_TOKENS")?.or(defaults.fill.max_tokens),
                enable_thinking: parse_optional_env("FILL_ENABLE_THINKING")?
                    .or(defaults.fill.enable_thinking),
            },
            analysis: SamplingParams {
                temperature: parse_env("ANALYSIS_TEMPERATURE", defaults.analysis.temperature)?,
                top_p: parse_env("ANALYSIS_TOP_P", defaults.analysis.top_p)?,
                max_tokens: parse_optional_env("ANALYSIS_MAX_TOKENS")?
                    .or(defaults.analysis.max_tokens),
                enable_thinking: None,
            },
            audit: SamplingParams {
                temperature: parse_env("AUDIT_TEMPERATURE", defaults.audit.temperature)?,
                top_p: parse_env("AUDIT_TOP_P", defaults.audit.top_p)?,
                max_tokens: parse_optional_env("AUDIT_MAX_TOKENS")?.or(defaults.audit.max_tokens),
                enable_thinking: None,
            },
        };

        Ok(Config {
            api_url: env_or("LLM_API_URL", DEFAULT_API_URL),
            api_key: env_or("MODELSCOPE_API_KEY", ""),
            model: env_or("MODEL_ENDPOINT", DEFAULT_MODEL),
            timeout_secs: parse_optional_env("LLM_TIMEOUT_SECS")?,
            inference,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

/// Reads `key`, treating unset and blank values alike.
fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    non_empty_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_optional_env(key)?.unwrap_or(default))
}

fn parse_optional_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    non_empty_env(key)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_match_stage_profiles() {
        let settings = InferenceSettings::default();
        assert_eq!(settings.fill.temperature, 0.2);
        assert_eq!(settings.fill.enable_thinking, Some(true));
        assert_eq!(settings.analysis.max_tokens, Some(500));
        assert_eq!(settings.audit.max_tokens, Some(2000));
    }

    #[test]
    fn test_parse_env_rejects_malformed_numbers() {
        std::env::set_var("FORMFILL_TEST_BAD_NUMBER", "abc");
        let err = parse_env::<f32>("FORMFILL_TEST_BAD_NUMBER", 1.0).unwrap_err();
        assert!(err.to_string().contains("FORMFILL_TEST_BAD_NUMBER"));
    }

    #[test]
    fn test_parse_env_uses_default_when_blank() {
        std::env::set_var("FORMFILL_TEST_BLANK", "  ");
        assert_eq!(parse_env::<u32>("FORMFILL_TEST_BLANK", 7).unwrap(), 7);
        std::env::set_var("FORMFILL_TEST_SET", "42");
        assert_eq!(parse_env::<u32>("FORMFILL_TEST_SET", 7).unwrap(), 42);
    }
}
