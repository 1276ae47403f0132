use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = var("SHUTTER_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("SHUTTER_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let port = match var("SHUTTER_PORT") {
            Some(v) => v.parse().with_context(|| format!("invalid SHUTTER_PORT '{v}'"))?,
            None => 3000,
        };
        let max_upload_bytes = match var("SHUTTER_MAX_UPLOAD_MB") {
            Some(v) => v
                .parse::<usize>()
                .ok()
                .and_then(|mb| mb.checked_mul(1024 * 1024))
                .with_context(|| format!("invalid SHUTTER_MAX_UPLOAD_MB '{v}'"))?,
            None => 10 * 1024 * 1024,
        };

        Ok(Self {
            jwt_secret,
            db_path: var("SHUTTER_DB_PATH").unwrap_or_else(|| "shutter.db".into()).into(),
            host: var("SHUTTER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            upload_dir: var("SHUTTER_UPLOAD_DIR").unwrap_or_else(|| "./uploads".into()).into(),
            max_upload_bytes,
        })
    }
}
