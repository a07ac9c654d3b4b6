use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf, sync::Arc};

use crate::auth::ClientParams;
use crate::db::DatabaseConfig;
use crate::store::{AllowAllProtection, StaticUserProtection, UserProtection};

/// Runtime configuration for the sync hooks and their SurrealDB adapters.
///
/// Loaded from JSON; string values may reference environment variables as
/// `${NAME}`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    pub database: DatabaseConfig,
    /// Maximum number of users; absent means unlimited.
    pub user_quota: Option<u64>,
    /// Logins external auth modules may never take over or rewrite.
    pub protected_logins: Vec<String>,
    /// Client params applied when the caller does not set its own.
    pub defaults: ClientParams,
}

impl SyncConfig {
    /// Protection policy for the configured logins.
    pub fn user_protection(&self) -> Arc<dyn UserProtection> {
        if self.protected_logins.is_empty() {
            Arc::new(AllowAllProtection)
        } else {
            Arc::new(StaticUserProtection::new(self.protected_logins.iter().cloned()))
        }
    }
}

/// Locate the config file: `IDENTITY_SYNC_CONFIG`, then
/// `$XDG_CONFIG_HOME/identity-sync/config.json`, then `./identity-sync.json`.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(p) = env::var("IDENTITY_SYNC_CONFIG") {
        return Some(PathBuf::from(p));
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let candidate = PathBuf::from(xdg).join("identity-sync").join("config.json");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let candidate = PathBuf::from("identity-sync.json");
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

/// Load the config from `path`, or from the resolved location when `None`.
///
/// With no explicit path and no file found, defaults are returned. An
/// explicit path that cannot be read is an error.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<SyncConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match resolve_config_path() {
            Some(p) => p,
            None => return Ok(SyncConfig::default()),
        },
    };

    let raw = fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    parse_config(&raw)
}

pub fn parse_config(raw: &str) -> anyhow::Result<SyncConfig> {
    let cfg: SyncConfig = serde_json::from_str(raw)?;
    Ok(expand_config(cfg))
}

fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if let Ok(val) = env::var(&name) {
                out.push_str(&val);
            } else {
                out.push_str("${");
                out.push_str(&name);
                out.push('}');
            }
        } else {
            out.push(ch);
        }
    }

    out
}

fn expand_config(cfg: SyncConfig) -> SyncConfig {
    let mut cfg = cfg;

    let db = &mut cfg.database;
    db.url = expand_env_vars(&db.url);
    db.namespace = expand_env_vars(&db.namespace);
    db.database = expand_env_vars(&db.database);
    if let Some(username) = db.username.as_mut() {
        *username = expand_env_vars(username);
    }
    if let Some(password) = db.password.as_mut() {
        *password = expand_env_vars(password);
    }

    cfg.protected_logins = cfg
        .protected_logins
        .into_iter()
        .map(|l| expand_env_vars(&l))
        .collect();

    cfg
}
