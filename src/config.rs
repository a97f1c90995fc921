use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

use crate::error::{Error, Result};

const DEV_JWT_SECRET: &str = "tiendita-dev-secret-change-me";
const DEFAULT_CORS_ORIGINS: &str =
    "http://localhost:5173,http://127.0.0.1:5173,http://localhost:8080,http://127.0.0.1:8080";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub jwt_secret: String,
    /// MySQL URL; `None` keeps the catalog in memory.
    pub database_url: Option<String>,
    /// MongoDB URI; `None` keeps users and sales in memory.
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,
    pub catalog_csv: PathBuf,
    pub seed_admin: bool,
    pub admin_email: String,
    pub admin_password: String,
    pub cors_origins: Vec<String>,
    pub low_stock_threshold: i64,
}

impl Config {
    pub fn load() -> Result<Self> {
        let database_url = optional("DATABASE_URL");
        let mongodb_uri = optional("MONGODB_URI");
        let any_in_memory = database_url.is_none() || mongodb_uri.is_none();

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, using an insecure development secret");
            DEV_JWT_SECRET.to_string()
        });

        Ok(Self {
            port: try_load("PORT", "3001")?,
            jwt_secret,
            database_url,
            mongodb_uri,
            mongodb_database: try_load("MONGODB_DATABASE", "tiendita")?,
            catalog_csv: try_load("CATALOG_CSV", "data/catalog.csv")?,
            seed_admin: try_load("SEED_ADMIN", if any_in_memory { "true" } else { "false" })?,
            admin_email: try_load("SEED_ADMIN_EMAIL", "admin@admin.com")?,
            admin_password: try_load("SEED_ADMIN_PASSWORD", "admin123")?,
            cors_origins: split_list(&try_load::<String>("CORS_ORIGINS", DEFAULT_CORS_ORIGINS)?),
            low_stock_threshold: try_load("LOW_STOCK_THRESHOLD", "10")?,
        })
    }
}

impl Default for Config {
    /// Everything in memory, default admin seeded, development secret.
    fn default() -> Self {
        Self {
            port: 3001,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            database_url: None,
            mongodb_uri: None,
            mongodb_database: "tiendita".to_string(),
            catalog_csv: PathBuf::from("data/catalog.csv"),
            seed_admin: true,
            admin_email: "admin@admin.com".to_string(),
            admin_password: "admin123".to_string(),
            cors_origins: split_list(DEFAULT_CORS_ORIGINS),
            low_stock_threshold: 10,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn optional(key: &str) -> Option<String> {
    let value = var(key);
    if value.is_none() {
        info!("{key} not set, using in-memory storage");
    }
    value
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {key} value: {e}")))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
