//! Runtime configuration from flags and environment.

use anyhow::{bail, Result};
use clap::{ArgAction, Parser};
use std::{fmt, net::SocketAddr, time::Duration};

#[derive(Parser, Clone)]
#[command(name = "loja")]
#[command(about = "Storefront API: accounts, tokens and product catalog")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "loja.db")]
    pub database_path: String,

    /// Initial signing secret; a random key is generated when absent
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Token lifetime in hours
    #[arg(long, env = "TOKEN_TTL_HOURS", default_value_t = 24)]
    pub token_ttl_hours: i64,

    /// Rotate the signing key after this many days
    #[arg(long, env = "KEY_ROTATION_DAYS", default_value_t = 7)]
    pub key_rotation_days: u64,

    /// How often the rotation task checks whether rotation is due
    #[arg(long, env = "KEY_ROTATION_TICK_SECS", default_value_t = 86_400)]
    pub key_rotation_tick_secs: u64,

    /// bcrypt work factor
    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    /// Enable the in-memory product cache
    #[arg(long, env = "CACHE_ENABLED", default_value_t = true, action = ArgAction::Set)]
    pub cache_enabled: bool,

    /// Seed an admin account with this email on startup
    #[arg(long, env = "ADMIN_EMAIL")]
    pub admin_email: Option<String>,

    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    #[arg(long, env = "ADMIN_NAME", default_value = "Administrator")]
    pub admin_name: String,

    /// Insert demo products into an empty catalog
    #[arg(long, env = "SEED_PRODUCTS", default_value_t = false, action = ArgAction::Set)]
    pub seed_products: bool,
}

const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;
const MAX_KEY_ROTATION_DAYS: u64 = 365;
const MAX_ROTATION_TICK_SECS: u64 = 30 * 86_400;

/// Credentials for the startup admin account.
pub struct AdminSeed<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub name: &'a str,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.token_ttl_hours) {
            bail!("TOKEN_TTL_HOURS must be between 1 and {MAX_TOKEN_TTL_HOURS}");
        }
        if !(1..=MAX_KEY_ROTATION_DAYS).contains(&self.key_rotation_days) {
            bail!("KEY_ROTATION_DAYS must be between 1 and {MAX_KEY_ROTATION_DAYS}");
        }
        if !(1..=MAX_ROTATION_TICK_SECS).contains(&self.key_rotation_tick_secs) {
            bail!("KEY_ROTATION_TICK_SECS must be between 1 and {MAX_ROTATION_TICK_SECS}");
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31");
        }
        if let Some(secret) = &self.jwt_secret {
            if secret.len() < 32 {
                bail!("JWT_SECRET must be at least 32 bytes");
            }
        }
        if self.admin_email.is_some() != self.admin_password.is_some() {
            bail!("ADMIN_EMAIL and ADMIN_PASSWORD must be set together");
        }
        Ok(())
    }

    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.key_rotation_days.saturating_mul(86_400))
    }

    pub fn rotation_tick(&self) -> Duration {
        Duration::from_secs(self.key_rotation_tick_secs)
    }

    pub fn admin_seed(&self) -> Option<AdminSeed<'_>> {
        match (&self.admin_email, &self.admin_password) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email,
                password,
                name: &self.admin_name,
            }),
            _ => None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("database_path", &self.database_path)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("key_rotation_days", &self.key_rotation_days)
            .field("key_rotation_tick_secs", &self.key_rotation_tick_secs)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("cache_enabled", &self.cache_enabled)
            .field("admin_email", &self.admin_email)
            .field("seed_products", &self.seed_products)
            .finish()
    }
}
