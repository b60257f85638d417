//! Request identity for the HTTP surface.
//!
//! Session issuance lives outside this service. Handlers only need a way to
//! turn a presented bearer token into an owner id, which is what
//! [`IdentityProvider`] describes.

use crate::{
    config::AppConfig,
    errors::{Error, Result},
};
use axum::http::{HeaderMap, header::AUTHORIZATION};
use std::collections::HashMap;

/// Resolves a session token to the id of the user it belongs to
pub trait IdentityProvider: Send + Sync {
    /// Returns the owner id for `token`.
    ///
    /// # Errors
    /// `Unauthorized` when the token is unknown or expired.
    fn resolve(&self, token: &str) -> Result<String>;
}

/// Identity provider backed by the `[[sessions]]` table of the configuration
#[derive(Debug, Clone, Default)]
pub struct StaticTokenIdentity {
    sessions: HashMap<String, String>,
}

impl StaticTokenIdentity {
    /// Builds the token table from configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            sessions: config
                .sessions
                .iter()
                .map(|s| (s.token.clone(), s.user_id.clone()))
                .collect(),
        }
    }
}

impl IdentityProvider for StaticTokenIdentity {
    fn resolve(&self, token: &str) -> Result<String> {
        self.sessions
            .get(token)
            .cloned()
            .ok_or_else(|| Error::Unauthorized {
                reason: "invalid session".to_string(),
            })
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolves the caller of a request or fails with `Unauthorized`.
pub fn authenticate(provider: &dyn IdentityProvider, headers: &HeaderMap) -> Result<String> {
    let token = bearer_token(headers).ok_or_else(|| Error::Unauthorized {
        reason: "missing session".to_string(),
    })?;
    provider.resolve(token)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::app::SessionConfig;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer  abc ")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_static_token_identity() {
        let mut config = AppConfig::default();
        config.sessions.push(SessionConfig {
            token: "tok".to_string(),
            user_id: "alice".to_string(),
        });
        let provider = StaticTokenIdentity::from_config(&config);

        assert_eq!(authenticate(&provider, &headers("Bearer tok")).unwrap(), "alice");
        assert!(matches!(
            authenticate(&provider, &headers("Bearer nope")),
            Err(Error::Unauthorized { .. })
        ));
        assert!(matches!(
            authenticate(&provider, &HeaderMap::new()),
            Err(Error::Unauthorized { .. })
        ));
    }
}
