use std::fmt::Display;
use std::str::FromStr;

use crate::error::ConfigError;

/// Source of configuration values, normally the process environment.
pub(crate) type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Read an env var, treating empty or whitespace-only values as unset.
pub(crate) fn optional_env(env: EnvLookup<'_>, key: &str) -> Result<Option<String>, ConfigError> {
    Ok(env(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}

pub(crate) fn required_env(env: EnvLookup<'_>, key: &str) -> Result<String, ConfigError> {
    optional_env(env, key)?.ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

pub(crate) fn parse_string_env(
    env: EnvLookup<'_>,
    key: &str,
    default: impl Into<String>,
) -> Result<String, ConfigError> {
    Ok(optional_env(env, key)?.unwrap_or_else(|| default.into()))
}

pub(crate) fn parse_env<T>(env: EnvLookup<'_>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match optional_env(env, key)? {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}
