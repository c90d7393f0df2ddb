use secrecy::SecretString;
use url::Url;

use crate::config::helpers::{EnvLookup, parse_env, parse_string_env, required_env};
use crate::error::ConfigError;

/// How `/matrix` requests are authenticated.
#[derive(Debug, Clone)]
pub enum AuthConfig {
    /// Static bearer token; every holder acts as `user_id`.
    Token {
        token: SecretString,
        user_id: String,
    },
    /// Sessions are checked against an external auth provider.
    Remote { session_url: Url },
}

impl AuthConfig {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::Remote { .. } => "remote",
        }
    }

    fn resolve(env: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let mode = parse_string_env(env, "AUTH_MODE", "token")?;
        match mode.to_ascii_lowercase().as_str() {
            "token" => Ok(Self::Token {
                token: SecretString::from(required_env(env, "GATEWAY_AUTH_TOKEN")?),
                user_id: parse_string_env(env, "GATEWAY_USER_ID", "default")?,
            }),
            "remote" => {
                let raw = required_env(env, "AUTH_SESSION_URL")?;
                let session_url = parse_http_url("AUTH_SESSION_URL", &raw)?;
                Ok(Self::Remote { session_url })
            }
            other => Err(ConfigError::InvalidValue {
                key: "AUTH_MODE".to_string(),
                message: format!("unsupported mode '{other}'"),
            }),
        }
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub auth: AuthConfig,
}

fn parse_http_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}': {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}' must use http or https"),
        });
    }
    Ok(url)
}

/// Split a comma-separated origin list and normalize each entry to
/// `scheme://host[:port]`.
fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|origin| {
            let url = parse_http_url("CORS_ORIGIN", origin)?;
            Ok(url.origin().ascii_serialization())
        })
        .collect()
}

impl GatewayConfig {
    pub(crate) fn resolve(env: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let cors_origins = parse_origins(&parse_string_env(
            env,
            "CORS_ORIGIN",
            "http://localhost:3001",
        )?)?;

        Ok(Self {
            host: parse_string_env(env, "GATEWAY_HOST", "127.0.0.1")?,
            port: parse_env(env, "GATEWAY_PORT", 3000)?,
            cors_origins,
            auth: AuthConfig::resolve(env)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn resolve(pairs: &[(&str, &str)]) -> Result<GatewayConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        GatewayConfig::resolve(&|key| map.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn token_mode_defaults() {
        let config = resolve(&[("GATEWAY_AUTH_TOKEN", "s3cret")]).expect("config");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_origins, vec!["http://localhost:3001".to_string()]);
        let AuthConfig::Token { token, user_id } = config.auth else {
            panic!("expected token auth");
        };
        assert_eq!(token.expose_secret(), "s3cret");
        assert_eq!(user_id, "default");
    }

    #[test]
    fn token_mode_requires_a_token() {
        let err = resolve(&[]).expect_err("missing token");
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "GATEWAY_AUTH_TOKEN"));
    }

    #[test]
    fn remote_mode_validates_session_url() {
        let config = resolve(&[
            ("AUTH_MODE", "remote"),
            ("AUTH_SESSION_URL", "http://auth.local:4000/api/auth/get-session"),
        ])
        .expect("remote config");
        assert_eq!(config.auth.mode(), "remote");

        let err = resolve(&[("AUTH_MODE", "remote"), ("AUTH_SESSION_URL", "ftp://auth")])
            .expect_err("bad scheme");
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "AUTH_SESSION_URL"));
    }

    #[test]
    fn cors_origins_are_normalized() {
        let config = resolve(&[
            ("GATEWAY_AUTH_TOKEN", "t"),
            ("CORS_ORIGIN", "https://app.example.com/, http://localhost:5173"),
        ])
        .expect("config");
        assert_eq!(
            config.cors_origins,
            vec![
                "https://app.example.com".to_string(),
                "http://localhost:5173".to_string()
            ]
        );

        let err = resolve(&[("GATEWAY_AUTH_TOKEN", "t"), ("CORS_ORIGIN", "not a url")])
            .expect_err("invalid origin");
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CORS_ORIGIN"));
    }

    #[test]
    fn unknown_auth_mode_is_rejected() {
        let err = resolve(&[("AUTH_MODE", "oauth")]).expect_err("unknown mode");
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "AUTH_MODE"));
    }
}
