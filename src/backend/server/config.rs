/**
 * Server Configuration
 *
 * This module handles loading of server configuration from environment
 * variables, and the optional PostgreSQL database connection.
 *
 * # Configuration Sources
 *
 * | Variable | Default |
 * |---|---|
 * | `SERVER_PORT` | `3000` |
 * | `JWT_SECRET` | development secret (logged as a warning) |
 * | `SESSION_COOKIE_NAME` | `tripsync_session` |
 * | `DATABASE_URL` | unset: in-memory trip store with no members |
 * | `TRIPSYNC_OPEN_MEMBERSHIP` | `false`; `true` lets the in-memory store admit everyone (development only) |
 * | `WS_PING_INTERVAL_SECS` | `30` |
 * | `WS_PONG_TIMEOUT_SECS` | `10` |
 * | `WS_OUTBOUND_BUFFER` | `256` |
 *
 * # Error Handling
 *
 * Configuration errors are logged but do not prevent server startup.
 * Invalid numbers fall back to their defaults; a database that cannot be
 * reached is replaced by the in-memory store.
 */

use std::str::FromStr;
use std::time::Duration;

use sqlx::PgPool;

use crate::backend::realtime::SocketSettings;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_COOKIE_NAME: &str = "tripsync_session";
const DEV_JWT_SECRET: &str = "tripsync-development-secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub jwt_secret: String,
    pub cookie_name: String,
    pub database_url: Option<String>,
    /// Only consulted when no database is available
    pub open_membership: bool,
    pub socket: SocketSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            database_url: None,
            open_membership: false,
            socket: SocketSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let jwt_secret = match non_empty_var("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set. Using the development secret; do not deploy this.");
                defaults.jwt_secret
            }
        };

        Self {
            port: parsed_var("SERVER_PORT", defaults.port),
            jwt_secret,
            cookie_name: non_empty_var("SESSION_COOKIE_NAME").unwrap_or(defaults.cookie_name),
            database_url: non_empty_var("DATABASE_URL"),
            open_membership: flag_var("TRIPSYNC_OPEN_MEMBERSHIP"),
            socket: SocketSettings {
                ping_interval: Duration::from_secs(parsed_var(
                    "WS_PING_INTERVAL_SECS",
                    defaults.socket.ping_interval.as_secs(),
                )),
                pong_timeout: Duration::from_secs(parsed_var(
                    "WS_PONG_TIMEOUT_SECS",
                    defaults.socket.pong_timeout.as_secs(),
                )),
                outbound_buffer: parsed_var("WS_OUTBOUND_BUFFER", defaults.socket.outbound_buffer),
            },
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn flag_var(name: &str) -> bool {
    non_empty_var(name).is_some_and(|value| {
        matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
    })
}

/// Parse a positive number, falling back to `default` when unset or invalid
fn parsed_var<T>(name: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    let Some(raw) = non_empty_var(name) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            tracing::warn!("{} has invalid value {:?}, using {}", name, raw, default);
            default
        }
    }
}

/// Database configuration result
///
/// `None` if the database is not configured or not reachable.
pub type DatabaseConfig = Option<PgPool>;

/// Connect to PostgreSQL and run migrations
///
/// # Returns
///
/// - `Some(PgPool)` if the database is successfully configured
/// - `None` if `database_url` is `None` or the connection fails
pub async fn load_database(database_url: Option<&str>) -> DatabaseConfig {
    let Some(database_url) = database_url else {
        tracing::warn!("DATABASE_URL not set. Using the in-memory trip store.");
        return None;
    };

    tracing::info!("Connecting to database...");

    let pool = match PgPool::connect(database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {:?}", e);
            tracing::warn!("Falling back to the in-memory trip store.");
            return None;
        }
    };

    tracing::info!("Running database migrations...");
    match sqlx::migrate!().run(&pool).await {
        Ok(_) => tracing::info!("Database migrations completed successfully"),
        Err(e) => {
            tracing::error!("Failed to run database migrations: {}", e);
            tracing::warn!("Continuing without migrations - database might not be up to date");
        }
    }

    Some(pool)
}
