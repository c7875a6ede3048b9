use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Argon2 cost. Defaults match `argon2::Params::default()`.
#[derive(Debug, Clone, Deserialize)]
pub struct HasherConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub token_ttl_hours: i64,
    pub hasher: HasherConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_hours: 72,
            hasher: HasherConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs the server on the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => Some(DatabaseConfig {
                url,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
            }),
            _ => None,
        };
        let defaults = HasherConfig::default();
        let auth = AuthConfig {
            token_ttl_hours: env_or("TOKEN_TTL_HOURS", 72)?,
            hasher: HasherConfig {
                memory_kib: env_or("ARGON2_MEMORY_KIB", defaults.memory_kib)?,
                iterations: env_or("ARGON2_ITERATIONS", defaults.iterations)?,
                parallelism: env_or("ARGON2_PARALLELISM", defaults.parallelism)?,
            },
        };
        anyhow::ensure!(auth.token_ttl_hours > 0, "TOKEN_TTL_HOURS must be positive");

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080)?,
            database,
            auth,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key}={v:?}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_to_default() {
        let v: u32 = env_or("EXPENSE_TRACKER_TEST_UNSET_VAR", 7).unwrap();
        assert_eq!(v, 7);
    }

    #[test]
    fn env_or_rejects_garbage() {
        std::env::set_var("EXPENSE_TRACKER_TEST_BAD_PORT", "eighty");
        let err = env_or::<u16>("EXPENSE_TRACKER_TEST_BAD_PORT", 80).unwrap_err();
        assert!(err.to_string().contains("EXPENSE_TRACKER_TEST_BAD_PORT"));
    }

    #[test]
    fn default_token_ttl_is_three_days() {
        assert_eq!(AuthConfig::default().token_ttl_hours, 72);
    }
}
