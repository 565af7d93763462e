//! Caller identity: roles and how they are derived from a request.
//!
//! Two modes are supported:
//! - `token`: the role claim of an HS256 bearer token whose signature,
//!   issuer and expiry have been verified.
//! - `header`: the role asserted in `x-user-role`, taken as given. This mode
//!   reproduces the legacy behaviour and is meant for staging and demos only.

use std::fmt;
use std::str::FromStr;

use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{IdentityConfig, IdentityMode};

pub const X_USER_ROLE: &str = "x-user-role";

/// Closed set of roles known to the authorization policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Developer,
    Tester,
    Designer,
    Guest,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Developer,
        Role::Tester,
        Role::Designer,
        Role::Guest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Developer => "developer",
            Role::Tester => "tester",
            Role::Designer => "designer",
            Role::Guest => "guest",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Claims carried by tokens from the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleClaims {
    pub sub: String,
    pub iss: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("token rejected: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

/// Derives the caller's role from request headers.
#[derive(Clone)]
pub struct RoleResolver {
    mode: IdentityMode,
    key: DecodingKey,
    validation: Validation,
}

impl RoleResolver {
    pub fn new(config: &IdentityConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Self {
            mode: config.mode,
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Resolve a role, or `None` when no role can be derived.
    pub fn resolve(&self, headers: &HeaderMap) -> Option<Role> {
        match self.mode {
            IdentityMode::Header => Self::from_asserted_header(headers),
            IdentityMode::Token => match self.verify(headers) {
                Ok(claims) => Some(claims.role.unwrap_or(Role::Guest)),
                Err(IdentityError::MissingToken) => None,
                Err(e) => {
                    tracing::debug!(error = %e, "Bearer token failed verification");
                    None
                }
            },
        }
    }

    /// Verify the bearer token and return its claims.
    pub fn verify(&self, headers: &HeaderMap) -> Result<RoleClaims, IdentityError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(IdentityError::MissingToken)?;

        let data = decode::<RoleClaims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }

    /// Legacy resolution: no headers at all means anonymous, anything else
    /// is trusted, with unknown values collapsing to guest.
    fn from_asserted_header(headers: &HeaderMap) -> Option<Role> {
        let role_header = headers.get(X_USER_ROLE).and_then(|v| v.to_str().ok());
        let has_auth = headers.contains_key(header::AUTHORIZATION);

        if role_header.is_none() && !has_auth {
            return None;
        }

        Some(
            role_header
                .and_then(|r| r.parse().ok())
                .unwrap_or(Role::Guest),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    fn token(secret: &str, iss: &str, role: Option<Role>, exp: u64) -> String {
        let claims = RoleClaims {
            sub: "ada".into(),
            iss: iss.into(),
            exp,
            role,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::Designer.to_string(), "designer");
    }

    #[test]
    fn test_verified_token_role() {
        let resolver = RoleResolver::new(&IdentityConfig::default());
        let headers = bearer(&token("secretkey", "LocalIdP", Some(Role::Developer), now() + 600));
        assert_eq!(resolver.resolve(&headers), Some(Role::Developer));

        let no_claim = bearer(&token("secretkey", "LocalIdP", None, now() + 600));
        assert_eq!(resolver.resolve(&no_claim), Some(Role::Guest));
    }

    #[test]
    fn test_forged_or_foreign_tokens_resolve_nothing() {
        let resolver = RoleResolver::new(&IdentityConfig::default());

        let forged = bearer(&token("not-the-secret", "LocalIdP", Some(Role::Admin), now() + 600));
        assert_eq!(resolver.resolve(&forged), None);

        let foreign = bearer(&token("secretkey", "SomeoneElse", Some(Role::Admin), now() + 600));
        assert_eq!(resolver.resolve(&foreign), None);

        let expired = bearer(&token("secretkey", "LocalIdP", Some(Role::Admin), now() - 3600));
        assert_eq!(resolver.resolve(&expired), None);
    }

    #[test]
    fn test_token_mode_ignores_asserted_header() {
        let resolver = RoleResolver::new(&IdentityConfig::default());
        let mut headers = HeaderMap::new();
        headers.insert(X_USER_ROLE, HeaderValue::from_static("admin"));
        assert_eq!(resolver.resolve(&headers), None);
    }

    #[test]
    fn test_header_mode_trusts_assertion() {
        let config = IdentityConfig {
            mode: IdentityMode::Header,
            ..IdentityConfig::default()
        };
        let resolver = RoleResolver::new(&config);

        assert_eq!(resolver.resolve(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(X_USER_ROLE, HeaderValue::from_static("admin"));
        assert_eq!(resolver.resolve(&headers), Some(Role::Admin));

        headers.insert(X_USER_ROLE, HeaderValue::from_static("superuser"));
        assert_eq!(resolver.resolve(&headers), Some(Role::Guest));

        let mut auth_only = HeaderMap::new();
        auth_only.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer anything"));
        assert_eq!(resolver.resolve(&auth_only), Some(Role::Guest));
    }
}
