use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::provider::Provider;

pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2000;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// What's stored in `config.json`. Every field is optional.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub ollama_url: Option<String>,
    pub max_output_tokens: Option<u32>,
}

/// Config with environment overrides and defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub provider: Provider,
    pub model: String,
    pub gemini_api_key: Option<String>,
    pub ollama_url: String,
    pub max_output_tokens: u32,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::Gemini.as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Remember `model` in the file at `path`, keeping the other fields.
    ///
    /// A file that can't be read or parsed is left untouched and the error returned.
    pub fn save_model(path: &Path, model: &str) -> Result<()> {
        let mut config = Self::load_from(path)?;
        config.model = Some(model.to_string());
        config.save_to(path)
    }

    /// Resolve against the process environment
    pub fn resolve(&self) -> Settings {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve using `env` to look up variables.
    ///
    /// `GEMINI_API_KEY`, `PARLEY_PROVIDER` and `PARLEY_MODEL` win over the file.
    pub fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> Settings {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let provider = non_empty(env("PARLEY_PROVIDER"))
            .or_else(|| self.provider.clone())
            .and_then(|p| Provider::from_str(&p))
            .unwrap_or(Provider::Gemini);

        let model = non_empty(env("PARLEY_MODEL"))
            .or_else(|| non_empty(self.model.clone()))
            .unwrap_or_else(|| provider.default_model().to_string());

        let gemini_api_key =
            non_empty(env("GEMINI_API_KEY")).or_else(|| non_empty(self.gemini_api_key.clone()));

        Settings {
            provider,
            model,
            gemini_api_key,
            ollama_url: self
                .ollama_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            max_output_tokens: self.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("parley").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());

        let settings = config.resolve_with(env_from(&[]));
        assert_eq!(settings.provider, Provider::Gemini);
        assert_eq!(settings.model, "gemini-1.5-flash");
        assert_eq!(settings.max_output_tokens, 2000);
        assert_eq!(settings.ollama_url, "http://localhost:11434");
        assert_eq!(settings.gemini_api_key, None);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            provider: Some("ollama".to_string()),
            model: Some("llava:7b".to_string()),
            max_output_tokens: Some(512),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_save_model_keeps_other_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        Config {
            gemini_api_key: Some("k".to_string()),
            ..Config::new()
        }
        .save_to(&path)
        .unwrap();

        Config::save_model(&path, "gemini-1.5-pro").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model.as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(config.gemini_api_key.as_deref(), Some("k"));
        assert_eq!(config.provider.as_deref(), Some("gemini"));
    }

    #[test]
    fn test_save_model_does_not_clobber_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let original = r#"{"gemini_api_key": "SECRET", "provider": "gemini",}"#;
        fs::write(&path, original).unwrap();

        assert!(Config::save_model(&path, "gemini-1.5-pro").is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_save_model_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("parley").join("config.json");

        Config::save_model(&path, "llava:7b").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model.as_deref(), Some("llava:7b"));
        assert_eq!(config.provider.as_deref(), Some("gemini"));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }

    #[test]
    fn test_env_overrides_file() {
        let config = Config {
            provider: Some("gemini".to_string()),
            model: Some("gemini-1.5-pro".to_string()),
            gemini_api_key: Some("from-file".to_string()),
            ..Config::default()
        };

        let settings = config.resolve_with(env_from(&[("GEMINI_API_KEY", "from-env")]));
        assert_eq!(settings.gemini_api_key.as_deref(), Some("from-env"));
        assert_eq!(settings.model, "gemini-1.5-pro");

        let settings = config.resolve_with(env_from(&[
            ("PARLEY_PROVIDER", "ollama"),
            ("PARLEY_MODEL", "llava:7b"),
        ]));
        assert_eq!(settings.provider, Provider::Ollama);
        assert_eq!(settings.model, "llava:7b");
        assert_eq!(settings.gemini_api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_default_model_follows_provider() {
        let config = Config {
            provider: Some("ollama".to_string()),
            ..Config::default()
        };
        let settings = config.resolve_with(env_from(&[]));
        assert_eq!(settings.model, "llama3.2:latest");
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = Config {
            gemini_api_key: Some("  ".to_string()),
            model: Some(String::new()),
            ..Config::new()
        };
        let settings = config.resolve_with(env_from(&[("GEMINI_API_KEY", "")]));
        assert_eq!(settings.gemini_api_key, None);
        assert_eq!(settings.model, "gemini-1.5-flash");
    }
}
