/// Signed playback tokens
///
/// Tokens carry the secret material a license or stream proxy needs to serve a
/// single channel, sealed so that the browser can hold them without being able
/// to read or alter them.
///
/// ## Format
///
/// `base64url(json envelope) "." base64url(HMAC-SHA256(encoded envelope))`
///
/// The envelope is `{"exp": <unix seconds>, "grant": {"kind": ..., ...}}`.
/// Verification needs nothing but the token and the signing secret: there is
/// no server-side grant store, and an expired token simply stops verifying.
///
/// ## Security Design
///
/// - **MAC before parse**: the signature is checked (in constant time) before
///   a single byte of the payload is deserialized
/// - **Tagged grants**: an unknown `kind` fails deserialization, so it never
///   reaches a handler
/// - **Redacted Debug**: grants print their kind only
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Upper bound on accepted token length; anything longer is rejected unread.
pub const MAX_TOKEN_LENGTH: usize = 16 * 1024;

const MIN_SECRET_LENGTH: usize = 16;

// ============================================================================
// Data Structures
// ============================================================================

/// What a token authorizes its bearer to do.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TokenGrant {
    /// Synthesize a ClearKey license locally from the embedded key pair
    ClearkeyLicense {
        #[serde(rename = "keyId")]
        key_id: String,
        key: String,
    },

    /// Forward the license challenge to an upstream license server
    WidevineLicense {
        #[serde(rename = "licenseUrl")]
        license_url: String,
        #[serde(rename = "licenseHeaders", default)]
        license_headers: BTreeMap<String, String>,
    },

    /// Relay a stream resource that needs secret request headers
    StreamProxy {
        #[serde(rename = "streamUrl")]
        stream_url: String,
        #[serde(rename = "streamHeaders", default)]
        stream_headers: BTreeMap<String, String>,
    },
}

impl TokenGrant {
    /// Wire name of the grant kind
    pub fn kind(&self) -> &'static str {
        match self {
            TokenGrant::ClearkeyLicense { .. } => "clearkey-license",
            TokenGrant::WidevineLicense { .. } => "widevine-license",
            TokenGrant::StreamProxy { .. } => "stream-proxy",
        }
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct SealedEnvelope<'a> {
    exp: i64,
    grant: &'a TokenGrant,
}

#[derive(Deserialize)]
struct OpenedEnvelope {
    exp: i64,
    grant: TokenGrant,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing secret must be at least 16 bytes")]
    WeakSecret,

    #[error("token is malformed")]
    Malformed,

    #[error("token signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token payload rejected: {0}")]
    Payload(#[from] serde_json::Error),
}

// ============================================================================
// Signer
// ============================================================================

/// Issues and verifies playback tokens with a server-held HMAC key.
#[derive(Clone)]
pub struct TokenSigner {
    mac: HmacSha256,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenSigner(..)")
    }
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(TokenError::WeakSecret);
        }

        let mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::WeakSecret)?;
        Ok(Self { mac })
    }

    /// Signer with a random per-process key. Tokens die with the process.
    pub fn ephemeral() -> Result<Self, TokenError> {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        Self::new(secret)
    }

    pub fn issue(&self, grant: &TokenGrant, ttl_seconds: i64) -> Result<String, TokenError> {
        self.issue_at(grant, ttl_seconds, unix_now())
    }

    pub fn issue_at(
        &self,
        grant: &TokenGrant,
        ttl_seconds: i64,
        now: i64,
    ) -> Result<String, TokenError> {
        let envelope = SealedEnvelope {
            exp: now.saturating_add(ttl_seconds),
            grant,
        };

        let payload = BASE64_URL.encode(serde_json::to_vec(&envelope)?);
        let signature = BASE64_URL.encode(self.sign(payload.as_bytes()));

        Ok(format!("{}.{}", payload, signature))
    }

    /// Verify a token against the current clock.
    ///
    /// Every failure collapses to `None`; the reason is only logged at debug.
    pub fn verify(&self, token: &str) -> Option<TokenGrant> {
        self.verify_at(token, unix_now())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Option<TokenGrant> {
        match self.open(token, now) {
            Ok(grant) => Some(grant),
            Err(err) => {
                tracing::debug!(error = %err, "Playback token rejected");
                None
            }
        }
    }

    /// Verify with a typed failure reason.
    pub fn open(&self, token: &str, now: i64) -> Result<TokenGrant, TokenError> {
        if token.is_empty() || token.len() > MAX_TOKEN_LENGTH {
            return Err(TokenError::Malformed);
        }

        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let signature = BASE64_URL
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let bytes = BASE64_URL
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let envelope: OpenedEnvelope = serde_json::from_slice(&bytes)?;

        if envelope.exp < now {
            return Err(TokenError::Expired);
        }

        Ok(envelope.grant)
    }

    fn sign(&self, bytes: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(bytes);
        mac.finalize().into_bytes().to_vec()
    }
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-signing-secret";

    fn signer() -> TokenSigner {
        TokenSigner::new(SECRET).unwrap()
    }

    /// Seal an arbitrary JSON envelope with a valid MAC.
    fn seal_raw(signer: &TokenSigner, json: &str) -> String {
        let payload = BASE64_URL.encode(json.as_bytes());
        let signature = BASE64_URL.encode(signer.sign(payload.as_bytes()));
        format!("{}.{}", payload, signature)
    }

    #[test]
    fn test_rejects_short_secret() {
        assert!(matches!(
            TokenSigner::new("short"),
            Err(TokenError::WeakSecret)
        ));
    }

    #[test]
    fn test_unknown_kind_is_rejected_even_with_valid_mac() {
        let signer = signer();
        let token = seal_raw(
            &signer,
            r#"{"exp":9999999999,"grant":{"kind":"admin-session","user":"root"}}"#,
        );

        assert!(matches!(
            signer.open(&token, 0),
            Err(TokenError::Payload(_))
        ));
        assert!(signer.verify_at(&token, 0).is_none());
    }

    #[test]
    fn test_missing_kind_is_rejected() {
        let signer = signer();
        let token = seal_raw(&signer, r#"{"exp":9999999999,"grant":{"keyId":"a","key":"b"}}"#);

        assert!(signer.verify_at(&token, 0).is_none());
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let grant = TokenGrant::ClearkeyLicense {
            key_id: "k1".into(),
            key: "v1".into(),
        };
        let token = signer().issue_at(&grant, 60, 1_000).unwrap();
        let other = TokenSigner::new("another-secret-of-enough-length").unwrap();

        assert!(matches!(
            other.open(&token, 1_000),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_token_is_url_safe() {
        let mut headers = BTreeMap::new();
        headers.insert("Referer".to_string(), "https://origin.example/?a=b&c=d".to_string());
        let grant = TokenGrant::WidevineLicense {
            license_url: "https://lic.example/wv?x=1+2/3".into(),
            license_headers: headers,
        };

        let token = signer().issue_at(&grant, 60, 0).unwrap();

        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
    }

    #[test]
    fn test_debug_output_hides_secret_material() {
        let grant = TokenGrant::WidevineLicense {
            license_url: "https://secret-license.example".into(),
            license_headers: BTreeMap::new(),
        };

        let printed = format!("{:?}", grant);
        assert!(printed.contains("widevine-license"));
        assert!(!printed.contains("secret-license"));
        assert_eq!(format!("{:?}", signer()), "TokenSigner(..)");
    }

    #[test]
    fn test_oversized_token_is_rejected_unread() {
        let token = "a".repeat(MAX_TOKEN_LENGTH + 1);
        assert!(matches!(signer().open(&token, 0), Err(TokenError::Malformed)));
    }
}
