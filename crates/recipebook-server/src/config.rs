use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::info;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key).unwrap_or_else(|| {
                info!("{} not set, using default: {}", key, default);
                default.to_string()
            })
        };

        let jwt_secret = lookup("RECIPEBOOK_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("RECIPEBOOK_JWT_SECRET is unset or still a placeholder; it must match the auth provider's signing secret");
        }

        let host = var("RECIPEBOOK_HOST", "0.0.0.0");
        let port: u16 = var("RECIPEBOOK_PORT", "8000")
            .parse()
            .context("RECIPEBOOK_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            addr,
            db_path: var("RECIPEBOOK_DB_PATH", "recipebook.db").into(),
            jwt_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("RECIPEBOOK_JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.addr.to_string(), "0.0.0.0:8000");
        assert_eq!(config.db_path, PathBuf::from("recipebook.db"));
    }

    #[test]
    fn placeholder_secret_is_refused() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(
            Config::from_lookup(lookup(&[("RECIPEBOOK_JWT_SECRET", "dev-secret-change-me")]))
                .is_err()
        );
    }

    #[test]
    fn bad_port_is_an_error() {
        let result = Config::from_lookup(lookup(&[
            ("RECIPEBOOK_JWT_SECRET", "s3cret"),
            ("RECIPEBOOK_PORT", "eighty"),
        ]));
        assert!(result.is_err());
    }
}
