//! Optional stateless-session variant: a session's entire `SessionValue`
//! serialized, base64-encoded, and HMAC-SHA256-signed with a shared secret
//! to form a portable token that does not require server-side storage.
//!
//! Signing uses the `sha2`/`hmac`/`subtle` crate trio already in the root
//! `Cargo.toml`'s `workspace.dependencies` — no new cryptography dependency
//! is introduced. `base64` is pulled in from the wider example pack
//! (`stencila-stencila`, `swedishembedded-sven`, `unicity-astrid-astrid`
//! all depend on `base64 = "0.22"`).

use base64::Engine as _;
use hmac::{Hmac, Mac};
use mcpi_protocol::SessionValue;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("signature verification failed")]
    BadSignature,

    #[error("HMAC key of invalid length")]
    BadKey,
}

pub type Result<T> = std::result::Result<T, TokenError>;

/// A portable, signed encoding of a [`SessionValue`]. The `payload` is the
/// base64-url-encoded canonical JSON serialization; `signature` is the
/// base64-url-encoded HMAC-SHA256 of that payload, or empty when signing is
/// disabled (empty secret).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatelessToken {
    pub payload: String,
    pub signature: String,
}

impl StatelessToken {
    /// Serializes `session` to canonical JSON, base64-encodes it, and signs
    /// it with `secret`. An empty `secret` disables signing: `signature` is
    /// the empty string.
    pub fn sign(session: &SessionValue, secret: &[u8]) -> Result<Self> {
        let json = serde_json::to_vec(session)?;
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json);
        let signature = if secret.is_empty() {
            String::new()
        } else {
            let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::BadKey)?;
            mac.update(payload.as_bytes());
            let tag = mac.finalize().into_bytes();
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(tag)
        };
        Ok(Self { payload, signature })
    }

    /// Encodes as `payload.signature`, the conventional compact form.
    pub fn to_compact(&self) -> String {
        format!("{}.{}", self.payload, self.signature)
    }

    pub fn from_compact(s: &str) -> Result<Self> {
        let (payload, signature) = s.split_once('.').unwrap_or((s, ""));
        Ok(Self { payload: payload.to_string(), signature: signature.to_string() })
    }

    /// Recomputes the HMAC over `payload` with `secret` and compares it to
    /// `signature` in constant time. An empty `secret` always verifies (the
    /// empty-secret convention disables verification).
    pub fn verify(&self, secret: &[u8]) -> bool {
        if secret.is_empty() {
            return true;
        }
        let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
            return false;
        };
        mac.update(self.payload.as_bytes());
        let expected = mac.finalize().into_bytes();
        let Ok(actual) = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(&self.signature) else {
            return false;
        };
        if actual.len() != expected.len() {
            return false;
        }
        actual.ct_eq(&expected).into()
    }

    /// Decodes and deserializes the payload back into a [`SessionValue`].
    /// Does not itself check the signature — call [`verify`](Self::verify)
    /// first if the token is untrusted.
    pub fn deserialize(&self) -> Result<SessionValue> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(&self.payload)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Rebuilds and re-signs a token after the caller has mutated the decoded
/// session value (e.g. a tool handler updated `accumulated_data`).
pub fn update_token(session: &SessionValue, secret: &[u8]) -> Result<StatelessToken> {
    StatelessToken::sign(session, secret)
}
