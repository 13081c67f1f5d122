//! Session token issuance and validation.
//!
//! # Format
//! HS256-signed JWT carrying `{sub, role, iat, exp}` (seconds since epoch).
//!
//! # Design Decisions
//! - Stateless: validity depends only on signature and expiry, there is no
//!   revocation list and no replay protection
//! - Expiry is checked here against the injected [`Clock`], not by the JWT
//!   library, so `now >= exp` is rejected exactly and tests can move time
//! - Every decode failure collapses into `MalformedOrForgedToken`

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::security::clock::Clock;
use crate::security::error::{SecurityError, SecurityResult};

/// Decoded contents of a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "sub")]
    pub principal_id: String,
    /// Role snapshot at issuance.
    pub role: String,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl TokenClaims {
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at, 0).single()
    }
}

/// A freshly issued token and the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

impl IssuedToken {
    /// Remaining lifetime in seconds at issuance.
    pub fn expires_in(&self) -> i64 {
        self.claims.expires_at - self.claims.issued_at
    }
}

/// Issues and validates signed session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(secret: &[u8], clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            clock,
        }
    }

    /// Issue a token for `principal_id` that expires `ttl` from now.
    pub fn issue(&self, principal_id: &str, role: &str, ttl: Duration) -> SecurityResult<IssuedToken> {
        let issued_at = self.clock.now().timestamp();
        let claims = TokenClaims {
            principal_id: principal_id.to_string(),
            role: role.to_string(),
            issued_at,
            expires_at: issued_at.saturating_add(ttl.num_seconds()),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to sign session token");
                SecurityError::TokenSigning
            })?;

        tracing::debug!(principal = %principal_id, role = %role, expires_at = claims.expires_at, "Issued session token");
        Ok(IssuedToken { token, claims })
    }

    /// Check signature and expiry, returning the embedded claims.
    pub fn validate(&self, token: &str) -> SecurityResult<TokenClaims> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Token rejected");
            SecurityError::MalformedOrForgedToken
        })?;
        let claims = data.claims;

        if claims.expires_at < claims.issued_at {
            return Err(SecurityError::MalformedOrForgedToken);
        }
        if self.clock.now().timestamp() >= claims.expires_at {
            return Err(SecurityError::ExpiredToken);
        }
        Ok(claims)
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let token = header_value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::clock::ManualClock;

    const SECRET: &[u8] = b"test-secret-key-that-is-long-enough!!";

    fn service() -> (TokenService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));
        (TokenService::new(SECRET, clock.clone()), clock)
    }

    #[test]
    fn test_issue_then_validate() {
        let (tokens, _) = service();
        let issued = tokens.issue("test_user", "analyst", Duration::hours(24)).unwrap();
        assert!(issued.token.len() > 50);
        assert_eq!(issued.expires_in(), 86_400);

        let claims = tokens.validate(&issued.token).unwrap();
        assert_eq!(claims.principal_id, "test_user");
        assert_eq!(claims.role, "analyst");
        assert_eq!(claims.expires_at, claims.issued_at + 86_400);
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let (tokens, clock) = service();
        let issued = tokens.issue("p1", "viewer", Duration::seconds(60)).unwrap();

        clock.advance(Duration::seconds(59));
        assert!(tokens.validate(&issued.token).is_ok());

        clock.advance(Duration::seconds(1));
        assert_eq!(tokens.validate(&issued.token), Err(SecurityError::ExpiredToken));
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        let (tokens, _) = service();
        let issued = tokens.issue("p1", "viewer", Duration::zero()).unwrap();
        assert_eq!(tokens.validate(&issued.token), Err(SecurityError::ExpiredToken));
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let (tokens, clock) = service();
        let other = TokenService::new(b"a-completely-different-signing-key!!!", clock);
        let issued = other.issue("p1", "admin", Duration::hours(1)).unwrap();
        assert_eq!(
            tokens.validate(&issued.token),
            Err(SecurityError::MalformedOrForgedToken)
        );
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let (tokens, _) = service();
        let issued = tokens.issue("p1", "viewer", Duration::hours(1)).unwrap();
        let forged_claims = TokenClaims {
            role: "admin".to_string(),
            ..issued.claims.clone()
        };
        let forged_payload = {
            use base64::Engine;
            base64::engine::general_purpose::URL_SAFE_NO_PAD
                .encode(serde_json::to_vec(&forged_claims).unwrap())
        };
        let mut parts: Vec<&str> = issued.token.split('.').collect();
        parts[1] = &forged_payload;
        let forged = parts.join(".");

        assert_eq!(tokens.validate(&forged), Err(SecurityError::MalformedOrForgedToken));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let (tokens, _) = service();
        for input in ["", "abc", "a.b.c", "Bearer xyz"] {
            assert_eq!(tokens.validate(input), Err(SecurityError::MalformedOrForgedToken));
        }
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
