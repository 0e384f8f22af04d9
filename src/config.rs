use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,
    pub db_max_connections: u32,
    pub run_migrations: bool,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Image storage
    pub image_upload_dir: String,
    pub max_image_bytes: usize,

    // Logging
    pub log_dir: String,
    pub log_level: String,

    /// Seeded on startup when both email and password are present
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup so tests don't touch the process env.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| get(key).ok_or_else(|| anyhow!("{key} must be set"));

        let bootstrap_admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin {
                    name: get("ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
                    email: email.trim().to_lowercase(),
                    password,
                })
            }
            _ => None,
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parse_or(&get, "ACCESS_TOKEN_TTL", 3600)?, // 1 hour
            refresh_token_ttl: parse_or(&get, "REFRESH_TOKEN_TTL", 604_800)?, // 7 days
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
            run_migrations: parse_or(&get, "RUN_MIGRATIONS", true)?,

            rate_login_per_min: parse_or(&get, "RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parse_or(&get, "RATE_REGISTER_PER_MIN", 30)?,
            rate_refresh_per_min: parse_or(&get, "RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: parse_or(&get, "RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: get("API_PREFIX").unwrap_or_else(|| "/api".to_string()),

            image_upload_dir: get("IMAGE_UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),
            max_image_bytes: parse_or(&get, "MAX_IMAGE_BYTES", 5 * 1024 * 1024)?,

            log_dir: get("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "debug".to_string()),

            bootstrap_admin,
        })
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
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

    const BASE: [(&str, &str); 3] = [
        ("SERVER_ADDR", "127.0.0.1:8080"),
        ("DATABASE_URL", "mysql://hr:hr@localhost/hr"),
        ("JWT_SECRET", "secret"),
    ];

    #[test]
    fn defaults_apply_when_optional_keys_missing() {
        let config = Config::from_lookup(lookup(&BASE)).unwrap();

        assert_eq!(config.access_token_ttl, 3600);
        assert_eq!(config.refresh_token_ttl, 604_800);
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.image_upload_dir, "uploads");
        assert!(config.run_migrations);
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn missing_required_key_is_reported() {
        let err = Config::from_lookup(lookup(&BASE[..2])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn invalid_number_is_an_error() {
        let mut pairs = BASE.to_vec();
        pairs.push(("ACCESS_TOKEN_TTL", "soon"));

        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("ACCESS_TOKEN_TTL"));
    }

    #[test]
    fn bootstrap_admin_needs_email_and_password() {
        let mut pairs = BASE.to_vec();
        pairs.push(("ADMIN_EMAIL", " Admin@Corp.io "));
        assert!(Config::from_lookup(lookup(&pairs)).unwrap().bootstrap_admin.is_none());

        pairs.push(("ADMIN_PASSWORD", "changeme"));
        let admin = Config::from_lookup(lookup(&pairs))
            .unwrap()
            .bootstrap_admin
            .unwrap();
        assert_eq!(admin.email, "admin@corp.io");
        assert_eq!(admin.name, "Administrator");
    }
}
