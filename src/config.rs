//! Configuration for variant-sync

use anyhow::{Context, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::color::{Classifier, DEFAULT_THRESHOLD};
use crate::reconcile::SyncOptions;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file holding products, variants and sizes
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Leave persisted variants and sizes that match the baseline out of a pass
    #[serde(default)]
    pub skip_unchanged: bool,

    /// Redmean distance under which a picked color takes a palette name
    #[serde(default = "default_color_threshold")]
    pub color_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Label shown by `token --list`
    pub name: String,
    /// Argon2 PHC string; plain text is still accepted
    pub token_hash: String,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3040
}

fn default_db_path() -> PathBuf {
    PathBuf::from("variant-sync.sqlite")
}

fn default_color_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            skip_unchanged: false,
            color_threshold: default_color_threshold(),
        }
    }
}

impl SyncConfig {
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            skip_unchanged: self.skip_unchanged,
        }
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.color_threshold)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind: default_bind(),
                port: default_port(),
            },
            database: DatabaseConfig {
                path: default_db_path(),
            },
            sync: SyncConfig::default(),
            tokens: Vec::new(),
        }
    }
}

impl Config {
    /// Where the config lives: `$VARIANT_SYNC_CONFIG`, then `./config.toml`,
    /// then `/data/config.toml`, falling back to the XDG config dir
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("VARIANT_SYNC_CONFIG") {
            return Ok(PathBuf::from(env_path));
        }

        if let Some(found) = ["config.toml", "/data/config.toml"]
            .into_iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.exists())
        {
            return Ok(found);
        }

        let dir = dirs::config_dir().context("No user config directory on this platform")?;
        Ok(dir.join("variant-sync").join("config.toml"))
    }

    /// Config at the default path, or built-in defaults when there is none
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from `path` if given, otherwise from the default location
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Write the config, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let body = toml::to_string_pretty(self).context("Failed to serialize config")?;
        let content = format!(
            "# variant-sync configuration\n\n{}\n\n\
             # Add API tokens with: variant-sync token --name <client-name>\n",
            body
        );
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))
    }

    /// Accept `token` if it matches any configured entry. Entries are argon2
    /// hashes; anything that does not parse as one is compared as plain text.
    pub fn validate_token(&self, token: &str) -> bool {
        let argon2 = Argon2::default();
        self.tokens
            .iter()
            .any(|entry| match PasswordHash::new(&entry.token_hash) {
                Ok(hash) => argon2.verify_password(token.as_bytes(), &hash).is_ok(),
                Err(_) => entry.token_hash == token,
            })
    }
}

/// Argon2 hash of `token` in PHC string form
pub fn hash_token(token: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(token.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash token: {}", e))
}
