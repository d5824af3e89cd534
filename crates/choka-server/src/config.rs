use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::FixedOffset;

const PLACEHOLDER_SECRETS: [&str; 2] = ["dev-secret-change-me", "change-me-to-a-random-string"];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub utc_offset: FixedOffset,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = var("CHOKA_JWT_SECRET").context("CHOKA_JWT_SECRET must be set")?;
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CHOKA_JWT_SECRET is still a placeholder; set a random value");
        }

        let db_path = PathBuf::from(var("CHOKA_DB_PATH").unwrap_or_else(|| "choka.db".into()));
        let host = var("CHOKA_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("CHOKA_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("CHOKA_PORT is not a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let hours: i32 = var("CHOKA_UTC_OFFSET_HOURS")
            .unwrap_or_else(|| "9".into())
            .parse()
            .context("CHOKA_UTC_OFFSET_HOURS is not a whole number")?;
        let utc_offset = FixedOffset::east_opt(hours * 3600)
            .with_context(|| format!("UTC offset out of range: {hours}"))?;

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            utc_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[("CHOKA_JWT_SECRET", "s3cr3t-value")]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("choka.db"));
        assert_eq!(config.addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.utc_offset.local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn secret_is_required_and_not_a_placeholder() {
        assert!(load(&[]).is_err());
        assert!(load(&[("CHOKA_JWT_SECRET", "dev-secret-change-me")]).is_err());
        assert!(load(&[("CHOKA_JWT_SECRET", "change-me-to-a-random-string")]).is_err());
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("CHOKA_JWT_SECRET", "s3cr3t-value"),
            ("CHOKA_HOST", "127.0.0.1"),
            ("CHOKA_PORT", "8080"),
            ("CHOKA_UTC_OFFSET_HOURS", "0"),
        ])
        .unwrap();
        assert_eq!(config.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.utc_offset.local_minus_utc(), 0);
        assert!(load(&[("CHOKA_JWT_SECRET", "x1"), ("CHOKA_PORT", "http")]).is_err());
    }
}
