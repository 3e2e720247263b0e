//! Credential store and runtime settings.
//!
//! The proxy keeps three persisted values, stored as JSON under the user's
//! config directory (`~/.config/netpad-proxy/config.json` on Linux):
//!
//! ```json
//! { "netpadUrl": "https://www.netpad.io", "apiKey": "np_live_...", "port": 3001 }
//! ```
//!
//! The store is re-read on every access so a `config set` takes effect on the
//! next forwarded request without restarting the server.
//!
//! **Environment variables:**
//! - `NETPAD_PROXY_CONFIG`: override the config file location
//! - `PORT`: server port (overrides the stored port)
//! - `REQUEST_TIMEOUT_SECS`: upstream request timeout (default: 120)

use crate::{ProxyError, Result};
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;

pub const DEFAULT_NETPAD_URL: &str = "https://www.netpad.io";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

const CONFIG_PATH_ENV: &str = "NETPAD_PROXY_CONFIG";

/// A key understood by the credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKey {
    NetpadUrl,
    ApiKey,
    Port,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 3] = [Self::NetpadUrl, Self::ApiKey, Self::Port];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NetpadUrl => "netpadUrl",
            Self::ApiKey => "apiKey",
            Self::Port => "port",
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialKey {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProxyError::UnknownKey(s.to_string()))
    }
}

/// Where forwarded calls go, read fresh for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub base_url: String,
    pub api_key: String,
}

impl UpstreamTarget {
    pub fn base_url_trimmed(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// On-disk shape of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netpad_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl StoredConfig {
    fn get(&self, key: CredentialKey) -> Option<String> {
        match key {
            CredentialKey::NetpadUrl => self.netpad_url.clone(),
            CredentialKey::ApiKey => self.api_key.clone(),
            CredentialKey::Port => self.port.map(|p| p.to_string()),
        }
    }

    fn set(&mut self, key: CredentialKey, value: &str) -> Result<()> {
        let value = validate(key, value)?;
        match key {
            CredentialKey::NetpadUrl => self.netpad_url = Some(value),
            CredentialKey::ApiKey => self.api_key = Some(value),
            CredentialKey::Port => {
                self.port = Some(value.parse().map_err(|_| invalid(key, "not a port number"))?)
            }
        }
        Ok(())
    }
}

fn invalid(key: CredentialKey, reason: &str) -> ProxyError {
    ProxyError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate(key: CredentialKey, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(key, "must not be empty"));
    }
    match key {
        CredentialKey::NetpadUrl => {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(invalid(key, "must start with http:// or https://"));
            }
            Ok(value.trim_end_matches('/').to_string())
        }
        CredentialKey::Port => match value.parse::<u16>() {
            Ok(0) | Err(_) => Err(invalid(key, "must be between 1 and 65535")),
            Ok(_) => Ok(value.to_string()),
        },
        // The key travels as the `x-api-key` header on every call.
        CredentialKey::ApiKey => match HeaderValue::from_str(value) {
            Ok(_) => Ok(value.to_string()),
            Err(_) => Err(invalid(
                key,
                "contains characters not allowed in an HTTP header",
            )),
        },
    }
}

/// Persisted proxy settings.
///
/// Reads happen on the request path and must stay cheap and synchronous;
/// writes only come from the `config` subcommands.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: CredentialKey) -> Result<Option<String>>;
    fn set(&self, key: CredentialKey, value: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;

    /// Configured NetPad base URL, falling back to the public instance.
    fn base_url(&self) -> Result<String> {
        Ok(self
            .get(CredentialKey::NetpadUrl)?
            .unwrap_or_else(|| DEFAULT_NETPAD_URL.to_string()))
    }

    /// The forward target, or `None` while no API key is configured.
    fn target(&self) -> Result<Option<UpstreamTarget>> {
        let api_key = match self.get(CredentialKey::ApiKey)? {
            Some(k) if !k.trim().is_empty() => k,
            _ => return Ok(None),
        };
        Ok(Some(UpstreamTarget {
            base_url: self.base_url()?,
            api_key,
        }))
    }
}

/// JSON file store.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$NETPAD_PROXY_CONFIG`, or `<config_dir>/netpad-proxy/config.json`.
    pub fn at_default_location() -> Result<Self> {
        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            return Ok(Self::new(path));
        }
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ProxyError::StorageError("No config directory found".to_string()))?;
        Ok(Self::new(config_dir.join("netpad-proxy").join("config.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StoredConfig> {
        if !self.path.exists() {
            return Ok(StoredConfig::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| ProxyError::StorageError(format!("Failed to read: {}", e)))?;
        if content.trim().is_empty() {
            return Ok(StoredConfig::default());
        }

        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, stored: &StoredConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ProxyError::StorageError(format!("Failed to create dir: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(stored)?;
        std::fs::write(&self.path, content)
            .map_err(|e| ProxyError::StorageError(format!("Failed to write: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>> {
        Ok(self.load()?.get(key))
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        let mut stored = self.load()?;
        stored.set(key, value)?;
        self.save(&stored)
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProxyError::StorageError(format!("Failed to remove: {}", e))),
        }
    }
}

/// Process-local store, used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<StoredConfig>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(base_url: &str, api_key: &str) -> Result<Self> {
        let store = Self::new();
        store.set(CredentialKey::NetpadUrl, base_url)?;
        store.set(CredentialKey::ApiKey, api_key)?;
        Ok(store)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>> {
        let guard = self
            .inner
            .read()
            .map_err(|_| ProxyError::StorageError("store lock poisoned".to_string()))?;
        Ok(guard.get(key))
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| ProxyError::StorageError("store lock poisoned".to_string()))?;
        guard.set(key, value)
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| ProxyError::StorageError("store lock poisoned".to_string()))?;
        *guard = StoredConfig::default();
        Ok(())
    }
}

/// Settings for one server run.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ProxyConfig {
    /// Resolve the port: `PORT` env, then the stored port, then the default.
    pub fn from_store(store: &dyn CredentialStore) -> Result<Self> {
        let mut config = Self::default();
        if env::var("PORT").is_err() {
            if let Some(port) = store.get(CredentialKey::Port)? {
                config.port = port
                    .parse()
                    .map_err(|_| invalid(CredentialKey::Port, "not a port number"))?;
            }
        }
        Ok(config)
    }
}

/// Mask an API key for display, keeping a short prefix.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(8).collect();
    if secret.chars().count() <= 8 {
        "*".repeat(secret.chars().count())
    } else {
        format!("{}…", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_parsing() {
        assert_eq!("apiKey".parse::<CredentialKey>().unwrap(), CredentialKey::ApiKey);
        assert_eq!("NETPADURL".parse::<CredentialKey>().unwrap(), CredentialKey::NetpadUrl);
        assert_eq!("port".parse::<CredentialKey>().unwrap(), CredentialKey::Port);
        assert!(matches!(
            "token".parse::<CredentialKey>(),
            Err(ProxyError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_set_validates_values() {
        let store = MemoryCredentialStore::new();
        assert!(store.set(CredentialKey::NetpadUrl, "ftp://example.com").is_err());
        assert!(store.set(CredentialKey::Port, "0").is_err());
        assert!(store.set(CredentialKey::Port, "70000").is_err());
        assert!(store.set(CredentialKey::ApiKey, "   ").is_err());

        store.set(CredentialKey::NetpadUrl, "https://netpad.example.com/").unwrap();
        assert_eq!(
            store.get(CredentialKey::NetpadUrl).unwrap().as_deref(),
            Some("https://netpad.example.com")
        );
    }

    #[test]
    fn test_api_key_must_be_a_valid_header_value() {
        let store = MemoryCredentialStore::new();
        for bad in ["bad\nkey", "bad\rkey", "bad\u{7f}key", "bad\0key"] {
            let err = store.set(CredentialKey::ApiKey, bad).unwrap_err();
            assert!(matches!(err, ProxyError::InvalidValue { .. }), "{bad:?}");
        }
        assert_eq!(store.get(CredentialKey::ApiKey).unwrap(), None);
        assert!(MemoryCredentialStore::with_values("http://x.test", "bad\nkey").is_err());

        store.set(CredentialKey::ApiKey, "np_live_AZaz09-_.").unwrap();
        assert_eq!(
            store.get(CredentialKey::ApiKey).unwrap().as_deref(),
            Some("np_live_AZaz09-_.")
        );
    }

    #[test]
    fn test_target_requires_api_key() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.target().unwrap(), None);
        assert_eq!(store.base_url().unwrap(), DEFAULT_NETPAD_URL);

        store.set(CredentialKey::ApiKey, "np_live_abc").unwrap();
        let target = store.target().unwrap().unwrap();
        assert_eq!(target.api_key, "np_live_abc");
        assert_eq!(target.base_url, DEFAULT_NETPAD_URL);
    }

    #[test]
    fn test_clear_resets_everything() {
        let store = MemoryCredentialStore::with_values("http://localhost:3000", "key").unwrap();
        store.set(CredentialKey::Port, "4000").unwrap();
        store.clear().unwrap();
        for key in CredentialKey::ALL {
            assert_eq!(store.get(key).unwrap(), None);
        }
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested").join("config.json"));

        assert_eq!(store.get(CredentialKey::ApiKey).unwrap(), None);
        store.set(CredentialKey::ApiKey, "np_live_abc").unwrap();
        store.set(CredentialKey::Port, "3005").unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["apiKey"], "np_live_abc");
        assert_eq!(json["port"], 3005);

        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret("np_live_0123456789"), "np_live_…");
    }
}
