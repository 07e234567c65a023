//! Environment-driven settings.

use crate::error::ConfigError;
use crate::query::QueryLimits;
use crate::service::{ErrorVerbosity, NormalizerPolicy};
use axum::http::StatusCode;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Postgres => f.write_str("postgres"),
            StoreBackend::Memory => f.write_str("memory"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub app_name: String,
    pub host: String,
    pub port: u16,
    /// `APP_ENV`; `development` turns on verbose error messages.
    pub environment: String,
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub database_max_connections: u32,
    pub data_schema: String,
    pub limits: QueryLimits,
    pub delete_failure_status: StatusCode,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            app_name: "crud-scaffold".into(),
            host: "0.0.0.0".into(),
            port: 3000,
            environment: "production".into(),
            store_backend: StoreBackend::Postgres,
            database_url: "postgres://localhost/crud_scaffold".into(),
            database_max_connections: 5,
            data_schema: "public".into(),
            limits: QueryLimits::default(),
            delete_failure_status: StatusCode::OK,
        }
    }
}

fn parse<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}

impl AppConfig {
    /// Build from any key lookup; unset or blank keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = AppConfig::default();

        let store_backend = match get("STORE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => defaults.store_backend,
        };
        let default_limit = parse("QUERY_DEFAULT_LIMIT", get("QUERY_DEFAULT_LIMIT"), defaults.limits.default_limit)?;
        let max_limit = parse("QUERY_MAX_LIMIT", get("QUERY_MAX_LIMIT"), defaults.limits.max_limit)?;
        let status_code: u16 = parse("DELETE_FAILURE_STATUS", get("DELETE_FAILURE_STATUS"), 200)?;
        let delete_failure_status = StatusCode::from_u16(status_code).map_err(|_| ConfigError::InvalidValue {
            key: "DELETE_FAILURE_STATUS",
            value: status_code.to_string(),
        })?;
        let data_schema = get("DATA_SCHEMA").unwrap_or(defaults.data_schema);
        if !data_schema.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::InvalidValue {
                key: "DATA_SCHEMA",
                value: data_schema,
            });
        }

        Ok(AppConfig {
            app_name: get("APP_NAME").unwrap_or(defaults.app_name),
            host: get("APP_HOST").unwrap_or(defaults.host),
            port: parse("APP_PORT", get("APP_PORT"), defaults.port)?,
            environment: get("APP_ENV").unwrap_or(defaults.environment),
            store_backend,
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections: parse(
                "DATABASE_MAX_CONNECTIONS",
                get("DATABASE_MAX_CONNECTIONS"),
                defaults.database_max_connections,
            )?,
            data_schema,
            limits: QueryLimits::new(default_limit, max_limit),
            delete_failure_status,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `.env` (if present) into the process environment, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, ".env could not be read");
            }
        }
        Self::from_env()
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn normalizer_policy(&self) -> NormalizerPolicy {
        NormalizerPolicy {
            verbosity: if self.is_development() {
                ErrorVerbosity::Verbose
            } else {
                ErrorVerbosity::Terse
            },
            delete_failure_status: self.delete_failure_status,
            limits: self.limits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let c = config(&[]).unwrap();
        assert_eq!(c.bind_address(), "0.0.0.0:3000");
        assert_eq!(c.store_backend, StoreBackend::Postgres);
        assert_eq!(c.limits, QueryLimits::new(20, 100));
        assert_eq!(c.delete_failure_status, StatusCode::OK);
        assert_eq!(c.normalizer_policy().verbosity, ErrorVerbosity::Terse);
    }

    #[test]
    fn overrides_are_parsed() {
        let c = config(&[
            ("APP_PORT", "8080"),
            ("APP_ENV", "Development"),
            ("STORE_BACKEND", "memory"),
            ("QUERY_DEFAULT_LIMIT", "500"),
            ("QUERY_MAX_LIMIT", "50"),
            ("DELETE_FAILURE_STATUS", "404"),
        ])
        .unwrap();
        assert_eq!(c.port, 8080);
        assert_eq!(c.store_backend, StoreBackend::Memory);
        assert_eq!(c.limits.max_limit, 50);
        assert_eq!(c.limits.default_limit, 50);
        let policy = c.normalizer_policy();
        assert_eq!(policy.verbosity, ErrorVerbosity::Verbose);
        assert_eq!(policy.delete_failure_status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            config(&[("APP_PORT", "http")]),
            Err(ConfigError::InvalidValue { key: "APP_PORT", .. })
        ));
        assert!(matches!(config(&[("STORE_BACKEND", "mongo")]), Err(ConfigError::UnknownBackend(_))));
        assert!(matches!(
            config(&[("DELETE_FAILURE_STATUS", "42")]),
            Err(ConfigError::InvalidValue { key: "DELETE_FAILURE_STATUS", .. })
        ));
        assert!(matches!(
            config(&[("DATA_SCHEMA", "public; drop")]),
            Err(ConfigError::InvalidValue { key: "DATA_SCHEMA", .. })
        ));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let c = config(&[("APP_HOST", "  "), ("QUERY_MAX_LIMIT", "")]).unwrap();
        assert_eq!(c.host, "0.0.0.0");
        assert_eq!(c.limits.max_limit, 100);
    }
}
