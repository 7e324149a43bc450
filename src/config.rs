//! Process configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `JOKEBOOK_HOST` | `0.0.0.0` |
//! | `PORT` | `3000` |
//! | `DATABASE_URL` | `sqlite://jokebook.db` |
//! | `JOKEBOOK_SEED` | `true` |
//! | `JOKEBOOK_LOG_JSON` | `false` |

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid {key} value `{value}`: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Where jokes live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Database {
    /// SQLite file at this path.
    Sqlite(PathBuf),
    /// Private SQLite in-memory database, gone when the process exits.
    SqliteMemory,
    /// Vector-backed store, no SQL involved.
    Memory,
}

impl FromStr for Database {
    type Err = String;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        match url {
            "memory" => return Ok(Self::Memory),
            ":memory:" | "sqlite::memory:" | "sqlite://:memory:" => return Ok(Self::SqliteMemory),
            _ => {}
        }
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        if path.is_empty() {
            return Err("no database path".to_owned());
        }
        if path.contains("://") {
            return Err("only sqlite URLs are supported".to_owned());
        }
        Ok(Self::Sqlite(PathBuf::from(path)))
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: Database,
    /// Insert the default categories at start-up.
    pub seed: bool,
    pub log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            host: try_load(&lookup, "JOKEBOOK_HOST", "0.0.0.0")?,
            port: try_load(&lookup, "PORT", "3000")?,
            database: try_load(&lookup, "DATABASE_URL", "sqlite://jokebook.db")?,
            seed: try_load_flag(&lookup, "JOKEBOOK_SEED", true)?,
            log_json: try_load_flag(&lookup, "JOKEBOOK_LOG_JSON", false)?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| default.to_owned());
    value.trim().parse().map_err(|e: T::Err| ConfigError {
        key,
        reason: e.to_string(),
        value,
    })
}

fn try_load_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            key,
            value,
            reason: "expected true or false".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert_eq!(cfg.database, Database::Sqlite(PathBuf::from("jokebook.db")));
        assert!(cfg.seed);
        assert!(!cfg.log_json);
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "sqlite:/var/lib/jokes.db"),
            ("JOKEBOOK_SEED", "off"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.database, Database::Sqlite(PathBuf::from("/var/lib/jokes.db")));
        assert!(!cfg.seed);
    }

    #[test]
    fn rejects_bad_values() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(err.key, "PORT");
        assert!(config(&[("JOKEBOOK_LOG_JSON", "maybe")]).is_err());
        assert!(config(&[("DATABASE_URL", "postgres://db/jokes")]).is_err());
    }

    #[test]
    fn recognises_memory_databases() {
        assert_eq!("memory".parse::<Database>(), Ok(Database::Memory));
        assert_eq!("sqlite::memory:".parse::<Database>(), Ok(Database::SqliteMemory));
    }
}
