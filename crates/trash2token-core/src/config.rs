//! ============================================================================
//! Application Configuration
//! ============================================================================
//! Environment-driven settings. Call `dotenvy::dotenv()` before building one
//! so values from `.env` are visible.
//! ============================================================================

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::refresh::DEFAULT_REFRESH_INTERVAL_SECS;
use crate::verification::{
    GeminiVisionClient, VerificationClient, Verifier, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS,
    GEMINI_API_BASE,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Vision model API key
    #[serde(skip_serializing)]
    pub model_api_key: Option<String>,
    pub model: String,
    pub model_base_url: String,
    /// Database path; None falls back to WasteDb's default location
    pub db_path: Option<String>,
    pub verify_timeout_secs: u64,
    pub refresh_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_api_key: std::env::var("MODEL_API_KEY").ok(),
            model: std::env::var("T2T_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            model_base_url: std::env::var("T2T_MODEL_BASE_URL")
                .unwrap_or_else(|_| GEMINI_API_BASE.to_string()),
            db_path: std::env::var("T2T_DB_PATH").ok(),
            verify_timeout_secs: env_secs("T2T_VERIFY_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
            refresh_interval_secs: env_secs("T2T_REFRESH_INTERVAL_SECS", DEFAULT_REFRESH_INTERVAL_SECS),
        }
    }
}

impl AppConfig {
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs.max(1))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    /// Build the one verifier the process shares.
    pub fn build_verifier(&self) -> Result<Verifier> {
        let api_key = self
            .model_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("MODEL_API_KEY is not set"))?;

        let model = GeminiVisionClient::new_custom(api_key, self.model_base_url.clone(), self.model.clone());
        Ok(Verifier::new(VerificationClient::new(
            Arc::new(model),
            self.verify_timeout(),
        )))
    }
}

fn env_secs(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            model_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            model_base_url: GEMINI_API_BASE.to_string(),
            db_path: None,
            verify_timeout_secs: 15,
            refresh_interval_secs: 0,
        }
    }

    #[test]
    fn test_durations() {
        let cfg = config();
        assert_eq!(cfg.verify_timeout(), Duration::from_secs(15));
        // Zero would spin the refresh loop
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_build_verifier_requires_key() {
        let mut cfg = config();
        assert!(cfg.build_verifier().is_err());
        cfg.model_api_key = Some("  ".into());
        assert!(cfg.build_verifier().is_err());
        cfg.model_api_key = Some("key".into());
        assert!(cfg.build_verifier().is_ok());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut cfg = config();
        cfg.model_api_key = Some("secret".into());
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("secret"));
    }
}
