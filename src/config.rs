// src/config.rs
use crate::api::{TechnicalLevel, DEFAULT_TARGET_LENGTH, MAX_TARGET_LENGTH, MIN_TARGET_LENGTH};
use crate::player::{state::clamp_volume, PlaybackRate};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_DIR: &str = "fionntan";
const CONFIG_FILE: &str = "config.json";
const TOKEN_XOR_KEY: &[u8] = b"fionntan-local-key-v1";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;
pub const MIN_POLL_INTERVAL_MS: u64 = 250;

pub const ENV_API_URL: &str = "FIONNTAN_API_URL";
pub const ENV_ACCESS_TOKEN: &str = "FIONNTAN_ACCESS_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration directory available on this platform")]
    NoConfigDir,

    #[error("Config I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub access_token_obfuscated: Option<String>,
    pub poll_interval_ms: u64,
    pub volume: f32,
    pub playback_rate: f32,
    pub technical_level: TechnicalLevel,
    pub target_length_minutes: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            access_token_obfuscated: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            volume: 1.0,
            playback_rate: 1.0,
            technical_level: TechnicalLevel::default(),
            target_length_minutes: DEFAULT_TARGET_LENGTH,
        }
    }
}

impl AppConfig {
    pub fn access_token(&self) -> Option<String> {
        self.access_token_obfuscated
            .as_deref()
            .and_then(deobfuscate_token)
    }

    /// Stores `token`; an empty token clears it.
    pub fn set_access_token(&mut self, token: &str) {
        let trimmed = token.trim();
        self.access_token_obfuscated = if trimmed.is_empty() {
            None
        } else {
            Some(obfuscate_token(trimmed))
        };
    }

    pub fn clear_access_token(&mut self) {
        self.access_token_obfuscated = None;
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(normalize_poll_interval(self.poll_interval_ms))
    }

    pub fn rate(&self) -> PlaybackRate {
        PlaybackRate::nearest(self.playback_rate)
    }
}

/// Effective settings for one run: the persisted file plus env overrides.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: String,
    pub access_token: Option<String>,
    pub poll_interval: Duration,
    pub volume: f32,
    pub playback_rate: PlaybackRate,
    pub technical_level: TechnicalLevel,
    pub target_length_minutes: u32,
}

impl Settings {
    pub fn resolve(config: &AppConfig) -> Self {
        Self::resolve_with(config, |key| std::env::var(key).ok())
    }

    pub fn resolve_with(config: &AppConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let api_base_url = non_empty(ENV_API_URL)
            .map(|url| normalize_base_url(&url))
            .unwrap_or_else(|| normalize_base_url(&config.api_base_url));
        let access_token = non_empty(ENV_ACCESS_TOKEN)
            .map(|token| token.trim().to_string())
            .or_else(|| config.access_token());

        Self {
            api_base_url,
            access_token,
            poll_interval: config.poll_interval(),
            volume: clamp_volume(config.volume),
            playback_rate: config.rate(),
            technical_level: config.technical_level,
            target_length_minutes: normalize_target_length(config.target_length_minutes),
        }
    }

    pub fn masked_token(&self) -> Option<String> {
        self.access_token.as_deref().map(masked_token)
    }
}

pub fn normalize_base_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_BASE_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn normalize_poll_interval(ms: u64) -> u64 {
    ms.max(MIN_POLL_INTERVAL_MS)
}

pub fn normalize_target_length(minutes: u32) -> u32 {
    minutes.clamp(MIN_TARGET_LENGTH, MAX_TARGET_LENGTH)
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = dirs::config_dir()
        .ok_or(ConfigError::NoConfigDir)?
        .join(CONFIG_DIR);
    fs::create_dir_all(&dir).map_err(|source| ConfigError::Io {
        path: dir.clone(),
        source,
    })?;
    Ok(dir.join(CONFIG_FILE))
}

pub fn load_or_create() -> Result<AppConfig, ConfigError> {
    load_or_create_at(&config_path()?)
}

pub fn save(config: &AppConfig) -> Result<(), ConfigError> {
    save_at(&config_path()?, config)
}

/// Reads `path`, writing defaults when it is missing. A file that fails to
/// parse is kept as `.json.bak` and replaced by defaults.
pub fn load_or_create_at(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        let config = AppConfig::default();
        save_at(path, &config)?;
        return Ok(config);
    }

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match serde_json::from_str::<AppConfig>(&raw) {
        Ok(mut config) => {
            normalize_config(&mut config);
            Ok(config)
        }
        Err(e) => {
            tracing::warn!("Config: {} is corrupt ({}), restoring defaults", path.display(), e);
            let backup = path.with_extension("json.bak");
            let _ = fs::copy(path, backup);
            let config = AppConfig::default();
            save_at(path, &config)?;
            Ok(config)
        }
    }
}

pub fn save_at(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn normalize_config(config: &mut AppConfig) {
    config.api_base_url = normalize_base_url(&config.api_base_url);
    config.poll_interval_ms = normalize_poll_interval(config.poll_interval_ms);
    config.volume = clamp_volume(config.volume);
    config.playback_rate = config.rate().as_f32();
    config.target_length_minutes = normalize_target_length(config.target_length_minutes);
    if config
        .access_token_obfuscated
        .as_deref()
        .is_some_and(|value| deobfuscate_token(value).is_none())
    {
        config.access_token_obfuscated = None;
    }
}

fn obfuscate_token(token: &str) -> String {
    let mut bytes = token.as_bytes().to_vec();
    for (idx, byte) in bytes.iter_mut().enumerate() {
        *byte ^= TOKEN_XOR_KEY[idx % TOKEN_XOR_KEY.len()];
    }
    BASE64_STANDARD.encode(bytes)
}

fn deobfuscate_token(obfuscated: &str) -> Option<String> {
    let mut bytes = BASE64_STANDARD.decode(obfuscated).ok()?;
    for (idx, byte) in bytes.iter_mut().enumerate() {
        *byte ^= TOKEN_XOR_KEY[idx % TOKEN_XOR_KEY.len()];
    }
    String::from_utf8(bytes).ok()
}

pub fn masked_token(token: &str) -> String {
    if token.len() <= 10 || !token.is_ascii() {
        return "******".to_string();
    }

    let prefix = &token[..6];
    let suffix = &token[token.len().saturating_sub(4)..];
    format!("{}********{}", prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn token_is_never_stored_in_clear() {
        let mut config = AppConfig::default();
        config.set_access_token("  eyJhbGciOiJIUzI1NiJ9.payload.sig  ");

        let stored = config.access_token_obfuscated.clone().unwrap();
        assert!(!stored.contains("eyJ"));
        assert_eq!(
            config.access_token().as_deref(),
            Some("eyJhbGciOiJIUzI1NiJ9.payload.sig")
        );

        config.set_access_token("   ");
        assert!(config.access_token_obfuscated.is_none());
    }

    #[test]
    fn masking() {
        assert_eq!(masked_token("short"), "******");
        assert_eq!(masked_token("abcdefghijklmnop"), "abcdef********mnop");
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = load_or_create_at(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn corrupt_file_is_backed_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let config = load_or_create_at(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        let backup = fs::read_to_string(dir.path().join("config.json.bak")).unwrap();
        assert_eq!(backup, "{ not json");
    }

    #[test]
    fn load_normalizes_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"api_base_url":"https://api.example.org/","poll_interval_ms":10,"volume":3.0,"playback_rate":1.3,"target_length_minutes":90}"#,
        )
        .unwrap();

        let config = load_or_create_at(&path).unwrap();
        assert_eq!(config.api_base_url, "https://api.example.org");
        assert_eq!(config.poll_interval_ms, MIN_POLL_INTERVAL_MS);
        assert_eq!(config.volume, 1.0);
        assert_eq!(config.playback_rate, 1.25);
        assert_eq!(config.target_length_minutes, MAX_TARGET_LENGTH);
        assert_eq!(config.technical_level, TechnicalLevel::Intermediate);
    }

    #[test]
    fn save_then_load_keeps_token() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.set_access_token("token-1234567890");
        save_at(&path, &config).unwrap();

        let loaded = load_or_create_at(&path).unwrap();
        assert_eq!(loaded.access_token().as_deref(), Some("token-1234567890"));
    }

    #[test]
    fn env_overrides_file() {
        let mut config = AppConfig::default();
        config.set_access_token("from-file-token");

        let settings = Settings::resolve_with(&config, |key| match key {
            ENV_API_URL => Some("http://staging:8080/".to_string()),
            ENV_ACCESS_TOKEN => Some("from-env-token-abc".to_string()),
            _ => None,
        });
        assert_eq!(settings.api_base_url, "http://staging:8080");
        assert_eq!(settings.access_token.as_deref(), Some("from-env-token-abc"));
        assert_eq!(settings.masked_token().as_deref(), Some("from-e********-abc"));

        let settings = Settings::resolve_with(&config, |_| Some(String::new()));
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(settings.access_token.as_deref(), Some("from-file-token"));
        assert_eq!(settings.poll_interval, Duration::from_millis(5000));
    }
}
