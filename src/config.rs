//! Configuration Management
//!
//! Handles persistent configuration storage for nestedpatch. Effective values
//! resolve command line > environment > config file > built-in default.

use crate::gcp::client::DEFAULT_BASE_PATH;
use crate::nested::{LockRegistry, Timeouts, DEFAULT_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Overrides the Access Context Manager endpoint
pub const ENDPOINT_ENV: &str = "GOOGLE_ACCESS_CONTEXT_MANAGER_CUSTOM_ENDPOINT";

/// Project billed for API usage
pub const BILLING_PROJECT_ENV: &str = "GOOGLE_BILLING_PROJECT";

/// Default `User-Agent`
pub const DEFAULT_USER_AGENT: &str = concat!("nestedpatch/", env!("CARGO_PKG_VERSION"));

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// API endpoint, e.g. `https://accesscontextmanager.googleapis.com/v1/`
    #[serde(default)]
    pub base_path: Option<String>,
    /// Project sent as `X-Goog-User-Project`
    #[serde(default)]
    pub billing_project: Option<String>,
    #[serde(default)]
    pub create_timeout_secs: Option<u64>,
    #[serde(default)]
    pub update_timeout_secs: Option<u64>,
    #[serde(default)]
    pub delete_timeout_secs: Option<u64>,
    /// Give up waiting for a parent's lock after this long; unset waits forever
    #[serde(default)]
    pub lock_timeout_secs: Option<u64>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("nestedpatch").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load from an explicit path; missing or unreadable files yield defaults
    pub fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unparsable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Get effective endpoint (CLI > env > config > default)
    pub fn effective_base_path(&self, cli: Option<&str>) -> String {
        self.resolve_base_path(cli, env_var(ENDPOINT_ENV))
    }

    fn resolve_base_path(&self, cli: Option<&str>, env: Option<String>) -> String {
        cli.map(str::to_string)
            .or(env)
            .or_else(|| self.base_path.clone())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_PATH.to_string())
    }

    /// Get effective billing project (CLI > env > config)
    pub fn effective_billing_project(&self, cli: Option<&str>) -> Option<String> {
        self.resolve_billing_project(cli, env_var(BILLING_PROJECT_ENV))
    }

    fn resolve_billing_project(&self, cli: Option<&str>, env: Option<String>) -> Option<String> {
        cli.map(str::to_string)
            .or(env)
            .or_else(|| self.billing_project.clone())
            .filter(|s| !s.is_empty())
    }

    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    /// Per-operation timeouts, 20 minutes unless configured
    pub fn timeouts(&self) -> Timeouts {
        let secs = |v: Option<u64>| v.map(Duration::from_secs).unwrap_or(DEFAULT_TIMEOUT);
        Timeouts {
            create: secs(self.create_timeout_secs),
            update: secs(self.update_timeout_secs),
            delete: secs(self.delete_timeout_secs),
        }
    }

    pub fn lock_registry(&self) -> LockRegistry {
        match self.lock_timeout_secs {
            Some(secs) => LockRegistry::with_timeout(Duration::from_secs(secs)),
            None => LockRegistry::new(),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_path_precedence() {
        let config = Config {
            base_path: Some("http://file/".into()),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_base_path(Some("http://cli/"), Some("http://env/".into())),
            "http://cli/"
        );
        assert_eq!(
            config.resolve_base_path(None, Some("http://env/".into())),
            "http://env/"
        );
        assert_eq!(config.resolve_base_path(None, None), "http://file/");
        assert_eq!(
            Config::default().resolve_base_path(None, None),
            DEFAULT_BASE_PATH
        );
    }

    #[test]
    fn test_billing_project_precedence() {
        let config = Config {
            billing_project: Some("from-file".into()),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_billing_project(None, Some("from-env".into())),
            Some("from-env".into())
        );
        assert_eq!(
            config.resolve_billing_project(None, None),
            Some("from-file".into())
        );
        assert_eq!(Config::default().resolve_billing_project(None, None), None);
    }

    #[test]
    fn test_timeouts() {
        let config = Config {
            delete_timeout_secs: Some(30),
            ..Default::default()
        };
        let t = config.timeouts();
        assert_eq!(t.create, DEFAULT_TIMEOUT);
        assert_eq!(t.update, DEFAULT_TIMEOUT);
        assert_eq!(t.delete, Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_parses() {
        let config: Config = serde_json::from_str(r#"{"lock_timeout_secs": 5}"#).unwrap();
        assert_eq!(config.lock_timeout_secs, Some(5));
        assert_eq!(config.base_path, None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("nestedpatch-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"billing_project": "billing", "update_timeout_secs": 60}"#).unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.billing_project.as_deref(), Some("billing"));
        assert_eq!(config.timeouts().update, Duration::from_secs(60));

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = std::env::temp_dir().join("nestedpatch-does-not-exist/config.json");
        assert_eq!(Config::load_from(&path), Config::default());
    }
}
