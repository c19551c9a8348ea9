use std::{net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use platform_authn::AuthConfig;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Defaults for everything except the signing secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: jwt_secret.into(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
            upload_dir: PathBuf::from("./uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cors_allowed_origins: Vec::new(),
        }
    }

    pub fn load() -> Result<Self> {
        let jwt_secret = env_required("JWT_SECRET")?;
        if jwt_secret.len() < 16 {
            return Err(anyhow!("JWT_SECRET must be at least 16 characters"));
        }
        let mut config = Self::new(jwt_secret);

        if let Ok(bind) = std::env::var("BIND") {
            config.bind = bind
                .parse()
                .with_context(|| format!("invalid BIND address {}", bind))?;
        }
        config.access_token_ttl_minutes =
            env_parse("ACCESS_TOKEN_TTL_MINUTES", config.access_token_ttl_minutes)?;
        config.refresh_token_ttl_days =
            env_parse("REFRESH_TOKEN_TTL_DAYS", config.refresh_token_ttl_days)?;
        config.max_upload_bytes = env_parse("MAX_UPLOAD_BYTES", config.max_upload_bytes)?;
        if let Ok(dir) = std::env::var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        config.cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect();

        Ok(config)
    }

    pub fn auth(&self) -> AuthConfig {
        AuthConfig {
            jwt_secret: self.jwt_secret.clone(),
            access_ttl_minutes: self.access_token_ttl_minutes,
            refresh_ttl_days: self.refresh_token_ttl_days,
        }
    }
}

fn env_required(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing env {}", key))
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|err| anyhow!("invalid {}: {}", key, err)),
        Err(_) => Ok(default),
    }
}
