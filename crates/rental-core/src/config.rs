use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::directory::Scope;
use crate::model::Namespace;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "RENTAL_CONFIG";
/// Environment variable carrying the wiki API token.
pub const TOKEN_ENV: &str = "RENTAL_WIKI_TOKEN";
/// Environment variable overriding the wiki server.
pub const SERVER_ENV: &str = "RENTAL_WIKI_SERVER";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    #[serde(default)]
    pub wiki: WikiConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_groups_with_edit_rights")]
    pub groups_with_edit_rights: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            admin_email: default_admin_email(),
            wiki: WikiConfig::default(),
            directory: DirectoryConfig::default(),
            cache: CacheConfig::default(),
            groups_with_edit_rights: default_groups_with_edit_rights(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiConfig {
    #[serde(default = "default_wiki_server")]
    pub server: String,
    #[serde(default = "default_namespace")]
    pub namespace: Namespace,
    /// API token. Prefer setting it through `RENTAL_WIKI_TOKEN`.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    #[serde(default = "default_wiki_timeout_secs")]
    pub timeout_secs: u64,
}

impl WikiConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            server: default_wiki_server(),
            namespace: default_namespace(),
            token: None,
            timeout_secs: default_wiki_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_base_dn")]
    pub base_dn: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default = "default_directory_timeout_secs")]
    pub timeout_secs: u64,
    /// TOML file with directory entries served by the static directory.
    #[serde(default)]
    pub entries_file: Option<PathBuf>,
}

impl DirectoryConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_dn: default_base_dn(),
            scope: Scope::default(),
            timeout_secs: default_directory_timeout_secs(),
            entries_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub persist: bool,
    /// Snapshot location; defaults to the platform cache dir.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

impl CacheConfig {
    /// Where the snapshot lives, or `None` when persistence is off or no
    /// cache directory is known.
    #[must_use]
    pub fn resolved_snapshot_path(&self) -> Option<PathBuf> {
        if !self.persist {
            return None;
        }
        self.snapshot_path
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("rental/snapshot.json")))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persist: default_true(),
            snapshot_path: None,
        }
    }
}

/// Config file used when none is given explicitly.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rental/config.toml"))
}

/// Load config from `explicit`, `RENTAL_CONFIG`, or the user config dir,
/// then apply environment overrides.
///
/// A missing default file yields defaults; a missing explicit file is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
    let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
        Some(path) => load_config_file(&path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => load_config_file(&path)?,
            _ => Config::default(),
        },
    };
    apply_env_overrides(&mut config, |key| env::var(key).ok());
    Ok(config)
}

pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut config = toml::from_str::<Config>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if let Some(entries) = config.directory.entries_file.as_mut()
        && entries.is_relative()
        && let Some(parent) = path.parent()
    {
        *entries = parent.join(&*entries);
    }
    tracing::debug!(path = %path.display(), "config loaded");
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(token) = lookup(TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
        config.wiki.token = Some(token);
    }
    if let Some(server) = lookup(SERVER_ENV).filter(|s| !s.trim().is_empty()) {
        config.wiki.server = server;
    }
}

const fn default_true() -> bool {
    true
}

fn default_app_name() -> String {
    "MI Rental".to_string()
}

fn default_admin_email() -> String {
    "raphael.wimmer@ur.de".to_string()
}

fn default_wiki_server() -> String {
    "https://wiki.mi.ur.de".to_string()
}

fn default_namespace() -> Namespace {
    Namespace::new("lab:ausstattung:")
}

const fn default_wiki_timeout_secs() -> u64 {
    30
}

fn default_base_dn() -> String {
    "o=uni-regensburg,c=de".to_string()
}

const fn default_directory_timeout_secs() -> u64 {
    5
}

fn default_groups_with_edit_rights() -> Vec<String> {
    vec![
        "mi-staff.mi.sprachlit.uni-regensburg.de".to_string(),
        "mi-shk.mi.sprachlit.uni-regensburg.de".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_file_uses_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").expect("write");

        let cfg = load_config_file(&path).expect("load should succeed");
        assert_eq!(cfg.app_name, "MI Rental");
        assert_eq!(cfg.wiki.namespace.prefix(), "lab:ausstattung:");
        assert_eq!(cfg.wiki.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.directory.base_dn, "o=uni-regensburg,c=de");
        assert_eq!(cfg.directory.scope, Scope::Subtree);
        assert_eq!(cfg.directory.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.groups_with_edit_rights.len(), 2);
        assert!(cfg.cache.persist);
    }

    #[test]
    fn sections_override_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
groups_with_edit_rights = ["admins.example"]

[wiki]
server = "https://wiki.example.org"
namespace = "inventar"

[directory]
scope = "one_level"
entries_file = "people.toml"

[cache]
persist = false
"#,
        )
        .expect("write");

        let cfg = load_config_file(&path).expect("load should succeed");
        assert_eq!(cfg.wiki.server, "https://wiki.example.org");
        assert_eq!(cfg.wiki.namespace.prefix(), "inventar:");
        assert_eq!(cfg.directory.scope, Scope::OneLevel);
        assert_eq!(
            cfg.directory.entries_file,
            Some(dir.path().join("people.toml"))
        );
        assert_eq!(cfg.groups_with_edit_rights, vec!["admins.example"]);
        assert_eq!(cfg.cache.resolved_snapshot_path(), None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[wiki\nserver = 1").expect("write");

        let err = load_config_file(&path).expect_err("parse should fail");
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn env_overrides_token_and_server() {
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg, |key| match key {
            TOKEN_ENV => Some("secret".to_string()),
            SERVER_ENV => Some("http://localhost:8080".to_string()),
            _ => None,
        });
        assert_eq!(cfg.wiki.token.as_deref(), Some("secret"));
        assert_eq!(cfg.wiki.server, "http://localhost:8080");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg, |_| Some("  ".to_string()));
        assert!(cfg.wiki.token.is_none());
        assert_eq!(cfg.wiki.server, "https://wiki.mi.ur.de");
    }

    #[test]
    fn explicit_snapshot_path_wins() {
        let cache = CacheConfig {
            persist: true,
            snapshot_path: Some(PathBuf::from("/tmp/rental.json")),
        };
        assert_eq!(
            cache.resolved_snapshot_path(),
            Some(PathBuf::from("/tmp/rental.json"))
        );
    }
}
