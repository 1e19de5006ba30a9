use std::path::PathBuf;
use std::time::Duration;

use trackline_core::AppError;

use crate::cargoes::{DEFAULT_API_TIMEOUT, DEFAULT_ENDPOINT};
use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::vision::DEFAULT_VISION_MODEL;

/// Runtime settings shared by the server and the CLI.
#[derive(Debug, Clone)]
pub struct TracklineConfig {
    /// Empty when unset; the fast path is then disabled.
    pub cargoes_api_key: String,
    pub cargoes_org_token: String,
    pub cargoes_endpoint: String,
    pub api_timeout: Duration,
    pub openai_api_key: String,
    pub llm_base_url: String,
    pub model: String,
    pub vision_model: String,
    pub headless: bool,
    pub chrome_bin: Option<PathBuf>,
}

impl TracklineConfig {
    /// Read configuration from environment variables.
    ///
    /// - `OPENAI_API_KEY` (required)
    /// - `CARGOES_FLOW_API_KEY`, `CARGOES_FLOW_ORG_TOKEN` (optional)
    /// - `CARGOES_FLOW_BASE_URL` (optional, full shipments endpoint)
    /// - `TRACKLINE_BASE_URL`, `TRACKLINE_MODEL`, `TRACKLINE_VISION_MODEL` (optional)
    /// - `TRACKLINE_HEADLESS` (optional, defaults to true)
    /// - `TRACKLINE_API_TIMEOUT_SECS` (optional, defaults to 20)
    /// - `CHROME_BIN` (optional)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`TracklineConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let openai_api_key = get("OPENAI_API_KEY").ok_or_else(|| {
            AppError::ConfigError(
                "OPENAI_API_KEY not set. Required for interpretation and challenge solving.".into(),
            )
        })?;

        let headless = match get("TRACKLINE_HEADLESS") {
            None => true,
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                AppError::ConfigError(format!(
                    "Invalid TRACKLINE_HEADLESS '{raw}': expected true or false"
                ))
            })?,
        };

        let api_timeout = match get("TRACKLINE_API_TIMEOUT_SECS") {
            None => DEFAULT_API_TIMEOUT,
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    AppError::ConfigError(format!(
                        "Invalid TRACKLINE_API_TIMEOUT_SECS '{raw}': must be a positive integer"
                    ))
                })?;
                if secs == 0 {
                    return Err(AppError::ConfigError(
                        "TRACKLINE_API_TIMEOUT_SECS must be at least 1".into(),
                    ));
                }
                Duration::from_secs(secs)
            }
        };

        Ok(Self {
            cargoes_api_key: get("CARGOES_FLOW_API_KEY").unwrap_or_default(),
            cargoes_org_token: get("CARGOES_FLOW_ORG_TOKEN").unwrap_or_default(),
            cargoes_endpoint: get("CARGOES_FLOW_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_timeout,
            openai_api_key,
            llm_base_url: get("TRACKLINE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: get("TRACKLINE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            vision_model: get("TRACKLINE_VISION_MODEL")
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            headless,
            chrome_bin: get("CHROME_BIN").map(PathBuf::from),
        })
    }

    pub fn fast_path_configured(&self) -> bool {
        !self.cargoes_api_key.is_empty() && !self.cargoes_org_token.is_empty()
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
