// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub proxy: ProxyConfig,
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub server: String,
    pub user: String,
    pub pass: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub listen: String,
    pub refresh_interval_secs: u64,
    /// Start every refresh from the static category whitelist instead of
    /// the set accumulated by earlier refreshes.
    pub reset_discovered_each_refresh: bool,
}

/// The three static lists. Entries are raw here; `Policy::from_config`
/// normalizes them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
    #[serde(rename = "whitelist-category")]
    pub whitelist_category: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            server: "http://remote-server:8080".to_string(),
            user: "user".to_string(),
            pass: "pass".to_string(),
            timeout_secs: 10,
            user_agent: "okhttp/3.14.17".to_string(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".to_string(),
            refresh_interval_secs: 24 * 3600,
            reset_discovered_each_refresh: false,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ProxyConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source,
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;

        url::Url::parse(&config.upstream.server).map_err(|source| {
            ConfigError::InvalidServer {
                url: config.upstream.server.clone(),
                source,
            }
        })?;

        Ok(config)
    }

    /// A missing file is not an error; the built-in defaults are used.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if !path.as_ref().exists() {
            tracing::warn!(
                "Config file {} not found, using defaults",
                path.as_ref().display()
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("xtream-proxy").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("xtream_proxy.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.upstream.server, "http://remote-server:8080");
        assert_eq!(config.upstream.user, "user");
        assert_eq!(config.upstream.timeout(), Duration::from_secs(10));
        assert_eq!(config.proxy.refresh_interval(), Duration::from_secs(86400));
        assert!(!config.proxy.reset_discovered_each_refresh);
        assert!(config.filter.whitelist.is_empty());
        assert!(config.filter.blacklist.is_empty());
        assert!(config.filter.whitelist_category.is_empty());
    }

    #[test]
    fn test_full_document() {
        let config = Config::from_toml(
            r#"
            [upstream]
            server = "http://example.com:8080"
            user = "alice"
            pass = "secret"

            [proxy]
            listen = "127.0.0.1:9000"
            refresh_interval_secs = 60
            reset_discovered_each_refresh = true

            [filter]
            whitelist = ["News", " sport "]
            blacklist = ["XXX"]
            whitelist-category = ["12", "40"]
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.server, "http://example.com:8080");
        assert_eq!(config.upstream.pass, "secret");
        assert_eq!(config.upstream.user_agent, "okhttp/3.14.17");
        assert_eq!(config.proxy.listen, "127.0.0.1:9000");
        assert!(config.proxy.reset_discovered_each_refresh);
        assert_eq!(config.filter.whitelist, vec!["News", " sport "]);
        assert_eq!(config.filter.whitelist_category, vec!["12", "40"]);
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        let err = Config::from_toml("[upstream\nserver = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_server_url_is_an_error() {
        let err = Config::from_toml("[upstream]\nserver = \"not a url\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidServer { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[filter]\nblacklist = [\"adult\"]").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.filter.blacklist, vec!["adult"]);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.proxy.listen, "0.0.0.0:8000");
    }

    #[test]
    fn test_unreadable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory exists but cannot be read as a file.
        let err = Config::load_or_default(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
