use std::{env, fmt::Display, str::FromStr};

use anyhow::Context;
use tracing::{debug, warn};

pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        Ok(Self {
            database_url,
            max_connections: try_load("AYURDIET_DB_MAX_CONNECTIONS", 5)?,
        })
    }
}

fn try_load<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow::anyhow!("invalid {key} value '{raw}': {e}")
        }),
        Err(_) => {
            debug!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
