use std::{env, fmt::Display, str::FromStr, time::Duration};

use miette::Diagnostic;
use ranking::resolver::{ResolverConfig, DEFAULT_MARGIN, DEFAULT_MAX_ATTEMPTS};

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("env var {name} is not set")]
    #[diagnostic(code(config::env_var_not_set), help("set it in the environment or in .env"))]
    EnvVarNotSet { name: &'static str },

    #[error("env var {name} has invalid value `{value}`: {reason}")]
    #[diagnostic(code(config::invalid_value))]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub resolver: ResolverConfig,
    pub leaderboard_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(Error::EnvVarNotSet {
            name: "DATABASE_URL",
        })?;

        let margin: f64 = parse_var(&lookup, "TITLE_MARGIN", DEFAULT_MARGIN)?;
        if !margin.is_finite() || margin < 0.0 {
            return Err(Error::InvalidValue {
                name: "TITLE_MARGIN",
                value: margin.to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }

        let max_attempts: u32 = parse_var(&lookup, "MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(Error::InvalidValue {
                name: "MAX_ATTEMPTS",
                value: max_attempts.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let backoff_ms: u64 = parse_var(&lookup, "RETRY_BACKOFF_MS", 5)?;

        Ok(Self {
            database_url,
            resolver: ResolverConfig {
                margin,
                max_attempts,
                initial_backoff: Duration::from_millis(backoff_ms),
                ..ResolverConfig::default()
            },
            leaderboard_limit: parse_var(&lookup, "LEADERBOARD_LIMIT", DEFAULT_LEADERBOARD_LIMIT)?,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, Error>
where
    F: Fn(&'static str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|err: T::Err| Error::InvalidValue {
            name,
            reason: err.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use approx::assert_relative_eq;

    use super::*;

    fn config(vars: &[(&'static str, &str)]) -> Result<Config, Error> {
        let vars: HashMap<_, _> = vars
            .iter()
            .map(|(name, value)| (*name, value.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = config(&[("DATABASE_URL", "sqlite::memory:")]).unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_relative_eq!(config.resolver.margin, 0.1);
        assert_eq!(config.resolver.max_attempts, 5);
        assert_eq!(config.leaderboard_limit, 10);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/kings"),
            ("TITLE_MARGIN", "0.5"),
            ("MAX_ATTEMPTS", "8"),
            ("RETRY_BACKOFF_MS", "20"),
            ("LEADERBOARD_LIMIT", "25"),
        ])
        .unwrap();

        assert_relative_eq!(config.resolver.margin, 0.5);
        assert_eq!(config.resolver.max_attempts, 8);
        assert_eq!(config.resolver.initial_backoff, Duration::from_millis(20));
        assert_eq!(config.leaderboard_limit, 25);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        assert!(matches!(
            config(&[]),
            Err(Error::EnvVarNotSet {
                name: "DATABASE_URL"
            })
        ));
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = config(&[("DATABASE_URL", "x"), ("MAX_ATTEMPTS", "many")]).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { name: "MAX_ATTEMPTS", .. }));

        let err = config(&[("DATABASE_URL", "x"), ("TITLE_MARGIN", "-1")]).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { name: "TITLE_MARGIN", .. }));

        let err = config(&[("DATABASE_URL", "x"), ("MAX_ATTEMPTS", "0")]).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { name: "MAX_ATTEMPTS", .. }));
    }
}
