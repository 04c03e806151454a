//! Signed access tokens.
//!
//! Every protected portal URL carries a compact signed token in its `key`
//! query parameter. A token binds a capability scope (`"auth"` for portal
//! access, `"ics"` for calendar feeds) and an expiry to an optional speaker
//! id, and is signed with a process-wide secret so it cannot be forged or
//! altered. Tokens are stateless: there is no server-side store and no
//! revocation before expiry.
//!
//! The wire format is a standard HS256 JWT (`header.payload.signature`,
//! base64url without padding), so the output is URL-safe as-is.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

use crate::error::{PortalError, PortalResult};

type HmacSha256 = Hmac<Sha256>;

/// Constant JWT header. Issuance must be deterministic, so the header is a
/// fixed string rather than a serialized struct.
const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Claims carried by an access token.
///
/// Field order matters: issuance serializes the struct in declaration order
/// so that identical inputs always produce identical tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Capability class this token authorizes (exact match required).
    pub scope: String,
    /// Expiry as unix seconds. Valid while `now <= exp`.
    pub exp: i64,
    /// Speaker id the token is bound to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

/// Issues and verifies access tokens with a process-wide secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenSigner([REDACTED])")
    }
}

impl TokenSigner {
    /// Create a signer. An empty secret is a configuration error: the server
    /// must refuse to start rather than sign with a guessable key.
    pub fn new(secret: impl Into<Vec<u8>>) -> PortalResult<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(PortalError::Config("signing secret is empty".to_string()));
        }
        Ok(Self { secret })
    }

    /// Issue a token authorizing `scope` until `expires_at` (seconds
    /// resolution), optionally bound to a speaker id.
    ///
    /// Deterministic: no issued-at or nonce is embedded, so identical inputs
    /// yield identical tokens. Link regeneration is therefore idempotent.
    pub fn issue(
        &self,
        expires_at: DateTime<Utc>,
        scope: &str,
        subject: Option<&str>,
    ) -> PortalResult<String> {
        if scope.is_empty() {
            return Err(PortalError::InvalidArgument("scope must not be empty"));
        }

        let claims = Claims {
            scope: scope.to_string(),
            exp: expires_at.timestamp(),
            sub: subject.map(str::to_string),
        };
        let payload = serde_json::to_vec(&claims).expect("serialize claims");

        let header_b64 = URL_SAFE_NO_PAD.encode(HEADER);
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload);
        let signing_input = format!("{header_b64}.{payload_b64}");

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any length");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Authenticate a token and return its claims.
    ///
    /// Returns `None` on any failure: wrong segment count, undecodable
    /// base64, unexpected header, bad signature, unparseable claims, or
    /// expiry in the past. Callers never learn which check failed, and no
    /// input can make this panic, so it is safe on attacker-controlled
    /// strings.
    pub fn decode(&self, token: &str) -> Option<Claims> {
        let mut parts = token.split('.');
        let header_b64 = parts.next()?;
        let payload_b64 = parts.next()?;
        let signature_b64 = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        // Only tokens we issued are acceptable: the header must decode to
        // the exact constant, which pins the algorithm to HS256.
        let header = URL_SAFE_NO_PAD.decode(header_b64).ok()?;
        if header != HEADER.as_bytes() {
            return None;
        }

        let signature = URL_SAFE_NO_PAD.decode(signature_b64).ok()?;
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        // Constant-time comparison, via the Mac verifier.
        mac.verify_slice(&signature).ok()?;

        let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let claims: Claims = serde_json::from_slice(&payload).ok()?;

        if Utc::now().timestamp() > claims.exp {
            return None;
        }

        Some(claims)
    }

    /// Authenticate a token and check that its scope matches exactly.
    pub fn verify(&self, token: &str, expected_scope: &str) -> bool {
        self.decode(token)
            .is_some_and(|claims| claims.scope == expected_scope)
    }
}
