//! Provider credentials loaded from the environment at startup.
//!
//! Missing or placeholder credentials never fail loading. They are reported
//! as diagnostics, and the first real call fails instead.

use tracing::{error, warn};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Values shipped in sample env files that mean "not configured".
const PLACEHOLDER_KEYS: &[&str] = &["YOUR_GEMINI_API_KEY_HERE", "YOUR-GEMINI-API-KEY", "-"];

/// The upstream generation provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Azure,
}

impl Provider {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "gemini" => Some(Provider::Gemini),
            "azure" => Some(Provider::Azure),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: Option<Provider>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub azure_endpoint: Option<String>,
    pub azure_api_key: Option<String>,
    pub azure_deployment_id: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Some(Provider::Gemini),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            azure_endpoint: None,
            azure_api_key: None,
            azure_deployment_id: None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_configured(value: &Option<String>) -> bool {
    match value {
        Some(v) => !PLACEHOLDER_KEYS.contains(&v.as_str()),
        None => false,
    }
}

impl LlmConfig {
    /// Loads provider configuration from environment variables.
    pub fn from_env() -> Self {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let provider = match non_empty_var("API_PROVIDER") {
            Some(raw) => {
                let parsed = Provider::parse(&raw);
                if parsed.is_none() {
                    warn!(provider = %raw, "Unrecognized API_PROVIDER, expected 'gemini' or 'azure'");
                }
                parsed
            }
            None => None,
        };

        Self {
            provider,
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            gemini_model: non_empty_var("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_api_base: non_empty_var("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
            azure_endpoint: non_empty_var("AZURE_ENDPOINT"),
            azure_api_key: non_empty_var("AZURE_API_KEY"),
            azure_deployment_id: non_empty_var("AZURE_DEPLOYMENT_ID"),
        }
    }

    /// Describes every credential problem that will make calls fail later.
    pub fn credential_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        match self.provider {
            Some(Provider::Gemini) => {
                if !is_configured(&self.gemini_api_key) {
                    warnings.push("Gemini API key is not configured (GEMINI_API_KEY)".to_string());
                }
            }
            Some(Provider::Azure) => {
                for (name, value) in [
                    ("AZURE_ENDPOINT", &self.azure_endpoint),
                    ("AZURE_API_KEY", &self.azure_api_key),
                    ("AZURE_DEPLOYMENT_ID", &self.azure_deployment_id),
                ] {
                    if !is_configured(value) {
                        warnings.push(format!("Azure credentials incomplete: {name} is not set"));
                    }
                }
            }
            None => {
                warnings.push(
                    "API_PROVIDER is not set to 'gemini' or 'azure'; falling back to Gemini"
                        .to_string(),
                );
                if !is_configured(&self.gemini_api_key) {
                    warnings.push("Gemini API key is not configured (GEMINI_API_KEY)".to_string());
                }
            }
        }
        warnings
    }

    /// Logs every credential diagnostic. Returns `true` if there were none.
    pub fn log_diagnostics(&self) -> bool {
        let warnings = self.credential_warnings();
        for warning in &warnings {
            error!("CRITICAL ERROR: {}", warning);
        }
        warnings.is_empty()
    }
}
