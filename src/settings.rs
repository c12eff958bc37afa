//! Application settings storage
//!
//! Stores configuration like API keys in a JSON file in the user data
//! directory. Settings are loaded once at startup and handed to whoever needs
//! them; nothing here is global.

use crate::layout::LayoutConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    #[default]
    Anthropic,
    Ollama,
}

impl LlmBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmBackend::Anthropic => "anthropic",
            LlmBackend::Ollama => "ollama",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Some(LlmBackend::Anthropic),
            "ollama" => Some(LlmBackend::Ollama),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    /// LLM backend: "anthropic" or "ollama" (default: "anthropic")
    #[serde(default)]
    pub llm_backend: LlmBackend,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    /// Ollama model name (default: "qwen2.5:7b")
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    /// Database file; None = `<data dir>/cogmap/cogmap.db`
    #[serde(default)]
    pub db_path: Option<String>,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// User the CLI acts as when `--user` is not given
    #[serde(default = "default_user")]
    pub default_user: String,
    #[serde(default)]
    pub layout: LayoutConfig,
}

fn default_anthropic_model() -> String {
    "claude-haiku-4-5-20251001".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "qwen2.5:7b".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:3741".to_string()
}

fn default_user() -> String {
    "local".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            llm_backend: LlmBackend::Anthropic,
            anthropic_model: default_anthropic_model(),
            ollama_url: default_ollama_url(),
            ollama_model: default_ollama_model(),
            db_path: None,
            bind_addr: default_bind_addr(),
            default_user: default_user(),
            layout: LayoutConfig::default(),
        }
    }
}

/// `<data dir>/cogmap`, or the working directory when the platform has none
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("cogmap"))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_config_path() -> PathBuf {
    app_data_dir().join("settings.json")
}

/// Keys understood by `cogmap-cli config get/set`
pub const CONFIG_KEYS: &[&str] = &[
    "anthropic-api-key",
    "llm-backend",
    "anthropic-model",
    "ollama-url",
    "ollama-model",
    "db-path",
    "bind-addr",
    "default-user",
];

impl Settings {
    /// Load settings from disk or fall back to defaults. A file that fails to
    /// parse is reported and ignored rather than aborting startup.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Settings::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable settings file");
                Settings::default()
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not read settings file");
                Settings::default()
            }
        }
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, content)
            .map_err(|e| format!("Failed to write settings: {}", e))?;

        tracing::info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// File at `path` (or the default location) with environment overrides
    /// applied on top.
    pub fn resolve(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
        let mut settings = Settings::load(&path);
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings
    }

    /// Apply `ANTHROPIC_API_KEY`, `COGMAP_DB`, `COGMAP_BIND` and
    /// `COGMAP_LLM_BACKEND` from `lookup`. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = Some(key);
        }
        if let Some(db) = get("COGMAP_DB") {
            self.db_path = Some(db);
        }
        if let Some(bind) = get("COGMAP_BIND") {
            self.bind_addr = bind;
        }
        if let Some(raw) = get("COGMAP_LLM_BACKEND") {
            match LlmBackend::from_str(&raw) {
                Some(backend) => self.llm_backend = backend,
                None => tracing::warn!(value = %raw, "Unknown COGMAP_LLM_BACKEND, keeping {}", self.llm_backend.as_str()),
            }
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.anthropic_api_key.as_deref().filter(|k| !k.is_empty())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Masked API key for display (shows first 8 / last 4 chars)
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key().map(|key| {
            if key.len() > 12 && key.is_ascii() {
                format!("{}...{}", &key[..8], &key[key.len() - 4..])
            } else {
                "*".repeat(key.chars().count())
            }
        })
    }

    /// Display value of a config key. The API key is masked.
    pub fn get_value(&self, key: &str) -> Result<String, String> {
        let value = match key {
            "anthropic-api-key" => self.masked_api_key().unwrap_or_else(|| "not set".to_string()),
            "llm-backend" => self.llm_backend.as_str().to_string(),
            "anthropic-model" => self.anthropic_model.clone(),
            "ollama-url" => self.ollama_url.clone(),
            "ollama-model" => self.ollama_model.clone(),
            "db-path" => self.db_path().display().to_string(),
            "bind-addr" => self.bind_addr.clone(),
            "default-user" => self.default_user.clone(),
            _ => return Err(format!("Unknown config key: {}", key)),
        };
        Ok(value)
    }

    /// Set a config key from its string form. An empty value clears the
    /// API key and the database path.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        let optional = || Some(value.to_string()).filter(|v| !v.is_empty());
        let required = |name: &str| {
            if value.is_empty() {
                Err(format!("{} cannot be empty", name))
            } else {
                Ok(value.to_string())
            }
        };

        match key {
            "anthropic-api-key" => self.anthropic_api_key = optional(),
            "llm-backend" => {
                self.llm_backend = LlmBackend::from_str(value)
                    .ok_or_else(|| format!("Unknown backend '{}' (anthropic, ollama)", value))?;
            }
            "anthropic-model" => self.anthropic_model = required(key)?,
            "ollama-url" => self.ollama_url = required(key)?,
            "ollama-model" => self.ollama_model = required(key)?,
            "db-path" => self.db_path = optional(),
            "bind-addr" => self.bind_addr = required(key)?,
            "default-user" => self.default_user = required(key)?,
            _ => return Err(format!("Unknown config key: {}", key)),
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        match &self.db_path {
            Some(p) => PathBuf::from(p),
            None => app_data_dir().join("cogmap.db"),
        }
    }
}
