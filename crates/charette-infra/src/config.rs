//! Configuration loader for Charette.
//!
//! Reads `charette.toml` from the data directory (`~/.charette/` in
//! production) and deserializes it into [`CharetteConfig`]. Falls back to
//! defaults when the file is missing or malformed -- a broken config never
//! blocks a session from starting.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use charette_core::llm::{DEFAULT_MODEL, max_tokens_for};
use charette_core::llm::resilient::DEFAULT_MAX_RETRIES;

/// Global configuration for the charette binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CharetteConfig {
    /// Model id used for every generation.
    pub model: String,
    /// Retry budget per generation tier.
    pub max_retries: u32,
    /// Override for the Anthropic API base URL (proxies, testing).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic_base_url: Option<String>,
    /// Base URL of the OpenAI-compatible fallback endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_base_url: Option<String>,
}

impl Default for CharetteConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            anthropic_base_url: None,
            openai_base_url: None,
        }
    }
}

impl CharetteConfig {
    /// Output token cap for the configured model.
    pub fn max_tokens(&self) -> u32 {
        max_tokens_for(&self.model)
    }
}

/// Resolve the data directory: `$CHARETTE_DATA_DIR`, else `~/.charette`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHARETTE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".charette")
}

/// Load configuration from `{data_dir}/charette.toml`.
///
/// - Missing file: returns [`CharetteConfig::default()`].
/// - Unreadable or unparseable file: logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> CharetteConfig {
    let config_path = data_dir.join("charette.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No charette.toml found at {}, using defaults",
                config_path.display()
            );
            return CharetteConfig::default();
        }
        Err(err) => {
            tracing::warn!(
                "Failed to read {}: {err}, using defaults",
                config_path.display()
            );
            return CharetteConfig::default();
        }
    };

    match toml::from_str::<CharetteConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            CharetteConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.anthropic_base_url.is_none());
    }

    #[tokio::test]
    async fn test_valid_toml_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("charette.toml"),
            r#"
model = "claude-3-7-sonnet-20250219"
max_retries = 5
openai_base_url = "http://localhost:8080/v1"
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.model, "claude-3-7-sonnet-20250219");
        assert_eq!(config.max_retries, 5);
        assert_eq!(
            config.openai_base_url.as_deref(),
            Some("http://localhost:8080/v1")
        );
    }

    #[tokio::test]
    async fn test_partial_toml_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("charette.toml"), "max_retries = 1\n")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn test_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("charette.toml"), "not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_max_tokens_tracks_model() {
        let config = CharetteConfig::default();
        assert_eq!(config.max_tokens(), 12_000);
    }
}
