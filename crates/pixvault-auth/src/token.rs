//! HS256 bearer tokens (compact JWS).
//!
//! Format: `base64url(header).base64url(claims).base64url(HMAC-SHA256(secret, header.claims))`
//! with header `{"alg":"HS256","typ":"JWT"}` and claims `{"sub","iat","exp"}`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use pixvault_crypto::{
    base64url_decode, base64url_encode, hkdf_derive, DERIVATION_SALT, TOKEN_SIGNING_INFO,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::clock::Clock;
use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Shortest signing secret accepted, in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

const ALGORITHM: &str = "HS256";

/// HMAC key used to sign and verify tokens.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TokenSecret(Vec<u8>);

impl TokenSecret {
    pub fn new(secret: &[u8]) -> Result<Self, AuthError> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(AuthError::InvalidSecret(format!(
                "expected at least {} bytes, got {}",
                MIN_SECRET_LENGTH,
                secret.len()
            )));
        }
        Ok(Self(secret.to_vec()))
    }

    /// Derive the signing secret from a master secret.
    pub fn derive(master: &[u8]) -> Result<Self, AuthError> {
        let mut okm = hkdf_derive(master, DERIVATION_SALT, TOKEN_SIGNING_INFO)?;
        let secret = Self(okm.to_vec());
        okm.zeroize();
        Ok(secret)
    }

    pub fn generate() -> Result<Self, AuthError> {
        let mut bytes = vec![0u8; MIN_SECRET_LENGTH];
        getrandom::getrandom(&mut bytes).map_err(|e| AuthError::InvalidSecret(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenSecret(<redacted>)")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Signed claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly issued token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct BearerToken {
    pub token: String,
    pub claims: Claims,
}

impl BearerToken {
    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    pub fn into_response(self) -> TokenResponse {
        TokenResponse {
            access_token: self.token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Login endpoint response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Issues and validates bearer tokens. Immutable after construction.
pub struct TokenIssuer {
    secret: TokenSecret,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(secret: TokenSecret, default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret,
            default_ttl,
            clock,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a token for `subject` valid for `ttl` from now.
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<BearerToken, AuthError> {
        self.issue_at(subject, ttl, self.clock.unix_seconds())
    }

    /// Issue a token with `iat = now_seconds` and `exp = iat + ttl`.
    pub fn issue_at(
        &self,
        subject: &str,
        ttl: Duration,
        now_seconds: i64,
    ) -> Result<BearerToken, AuthError> {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: subject.to_string(),
            iat: now_seconds,
            exp: now_seconds.saturating_add(ttl_secs),
        };

        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        };
        let header_b64 = base64url_encode(&serde_json::to_vec(&header)?);
        let claims_b64 = base64url_encode(&serde_json::to_vec(&claims)?);
        let signing_input = format!("{}.{}", header_b64, claims_b64);
        let signature = self.mac(signing_input.as_bytes())?.finalize().into_bytes();
        let signature_b64 = base64url_encode(&signature);

        Ok(BearerToken {
            token: format!("{}.{}", signing_input, signature_b64),
            claims,
        })
    }

    /// Validate a token and return its subject.
    pub fn validate(&self, token: &str) -> Result<String, AuthError> {
        self.validate_at(token, self.clock.unix_seconds())
            .map(|claims| claims.sub)
    }

    /// Validate a token against an explicit current time.
    ///
    /// Order matters: structure, then signature, then claims, then expiry.
    /// Claims are only parsed once the signature has been verified.
    pub fn validate_at(&self, token: &str, now_seconds: i64) -> Result<Claims, AuthError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(reject(AuthError::MalformedToken(
                "expected three dot-separated segments".into(),
            )));
        };

        let header: Header = base64url_decode(header_b64)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(|| reject(AuthError::MalformedToken("unreadable header".into())))?;
        if header.alg != ALGORITHM {
            return Err(reject(AuthError::MalformedToken(format!(
                "unsupported algorithm {:?}",
                header.alg
            ))));
        }
        let signature = base64url_decode(signature_b64)
            .map_err(|_| reject(AuthError::MalformedToken("unreadable signature".into())))?;

        let mut mac = self.mac(header_b64.as_bytes())?;
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| reject(AuthError::InvalidSignature))?;

        let claims: Claims = base64url_decode(claims_b64)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(|| reject(AuthError::MalformedToken("unreadable claims".into())))?;

        if now_seconds >= claims.exp {
            return Err(reject(AuthError::ExpiredToken));
        }
        Ok(claims)
    }

    fn mac(&self, data: &[u8]) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AuthError::InvalidSecret(e.to_string()))?;
        mac.update(data);
        Ok(mac)
    }
}

fn reject(err: AuthError) -> AuthError {
    tracing::debug!(reason = %err, "rejected bearer token");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            TokenSecret::generate().unwrap(),
            Duration::from_secs(1800),
            Arc::new(SystemClock),
        )
    }

    fn segments(token: &str) -> Vec<String> {
        token.split('.').map(str::to_string).collect()
    }

    #[test]
    fn issued_token_validates_to_subject() {
        let issuer = issuer();
        let token = issuer.issue("alice", issuer.default_ttl()).unwrap();
        assert_eq!(token.subject(), "alice");
        assert_eq!(token.claims.exp - token.claims.iat, 1800);
        assert_eq!(issuer.validate(&token.token).unwrap(), "alice");
    }

    #[test]
    fn header_is_standard_hs256() {
        let token = issuer().issue("alice", Duration::from_secs(60)).unwrap();
        let header = base64url_decode(&segments(&token.token)[0]).unwrap();
        let header: serde_json::Value = serde_json::from_slice(&header).unwrap();
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");
    }

    #[test]
    fn zero_ttl_is_immediately_expired() {
        let issuer = issuer();
        let token = issuer.issue("alice", Duration::ZERO).unwrap();
        assert!(matches!(
            issuer.validate(&token.token).unwrap_err(),
            AuthError::ExpiredToken
        ));
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let issuer = issuer();
        let token = issuer.issue_at("alice", Duration::from_secs(10), 1_000).unwrap();
        assert!(issuer.validate_at(&token.token, 1_009).is_ok());
        assert!(matches!(
            issuer.validate_at(&token.token, 1_010).unwrap_err(),
            AuthError::ExpiredToken
        ));
    }

    #[test]
    fn token_expires_as_clock_advances() {
        let clock = Arc::new(ManualClock::new());
        let issuer = TokenIssuer::new(
            TokenSecret::generate().unwrap(),
            Duration::from_secs(1800),
            clock.clone(),
        );
        let token = issuer.issue("alice", Duration::from_secs(1800)).unwrap();
        clock.advance(Duration::from_secs(1799));
        assert!(issuer.validate(&token.token).is_ok());
        clock.advance(Duration::from_secs(1));
        assert!(matches!(
            issuer.validate(&token.token).unwrap_err(),
            AuthError::ExpiredToken
        ));
    }

    #[test]
    fn altered_subject_fails_signature() {
        let issuer = issuer();
        let token = issuer.issue("alice", Duration::from_secs(600)).unwrap();
        let parts = segments(&token.token);

        let mut claims = token.claims.clone();
        claims.sub = "mallory".into();
        let forged_claims = base64url_encode(&serde_json::to_vec(&claims).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);

        assert!(matches!(
            issuer.validate(&forged).unwrap_err(),
            AuthError::InvalidSignature
        ));
    }

    #[test]
    fn extended_expiry_fails_signature() {
        let issuer = issuer();
        let token = issuer.issue("alice", Duration::from_secs(600)).unwrap();
        let parts = segments(&token.token);

        let mut claims = token.claims.clone();
        claims.exp += 86_400;
        let forged_claims = base64url_encode(&serde_json::to_vec(&claims).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);

        assert!(matches!(
            issuer.validate(&forged).unwrap_err(),
            AuthError::InvalidSignature
        ));
    }

    #[test]
    fn token_from_other_secret_fails_signature() {
        let token = issuer().issue("alice", Duration::from_secs(600)).unwrap();
        assert!(matches!(
            issuer().validate(&token.token).unwrap_err(),
            AuthError::InvalidSignature
        ));
    }

    #[test]
    fn forged_and_expired_reports_forgery() {
        let issuer = issuer();
        let token = issuer.issue_at("alice", Duration::ZERO, 0).unwrap();
        let other = issuer_with_secret(&[7u8; 32]);
        assert!(matches!(
            other.validate(&token.token).unwrap_err(),
            AuthError::InvalidSignature
        ));
    }

    fn issuer_with_secret(secret: &[u8]) -> TokenIssuer {
        TokenIssuer::new(
            TokenSecret::new(secret).unwrap(),
            Duration::from_secs(60),
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn garbage_is_malformed() {
        let issuer = issuer();
        for garbage in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert!(
                matches!(
                    issuer.validate(garbage).unwrap_err(),
                    AuthError::MalformedToken(_)
                ),
                "{:?}",
                garbage
            );
        }
    }

    #[test]
    fn alg_none_is_refused() {
        let issuer = issuer();
        let token = issuer.issue("alice", Duration::from_secs(600)).unwrap();
        let parts = segments(&token.token);
        let none_header = base64url_encode(br#"{"alg":"none","typ":"JWT"}"#);
        let forged = format!("{}.{}.", none_header, parts[1]);
        assert!(matches!(
            issuer.validate(&forged).unwrap_err(),
            AuthError::MalformedToken(_)
        ));
    }

    #[test]
    fn short_secret_is_rejected() {
        assert!(matches!(
            TokenSecret::new(b"too short").unwrap_err(),
            AuthError::InvalidSecret(_)
        ));
    }

    #[test]
    fn response_uses_bearer_type() {
        let token = issuer().issue("alice", Duration::from_secs(60)).unwrap();
        let raw = token.token.clone();
        let response = token.into_response();
        assert_eq!(response.token_type, "bearer");
        assert_eq!(response.access_token, raw);
    }
}
