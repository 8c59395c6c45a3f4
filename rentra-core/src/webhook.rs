use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age (and clock skew) of a signed event, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is malformed")]
    Malformed,
    #[error("signature timestamp is outside the accepted tolerance")]
    Stale,
    #[error("no candidate signature matched the payload")]
    Mismatch,
}

/// Parsed form of the provider's signature header:
/// `t=<unix-seconds>,v1=<hex-hmac>[,v1=...][,v0=...]`.
///
/// Unknown schemes are ignored; only `v1` entries are candidates.
#[derive(Debug)]
struct SignatureHeader {
    timestamp: i64,
    candidates: Vec<String>,
}

impl SignatureHeader {
    fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut candidates = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or(SignatureError::Malformed)?;
            match key.trim() {
                "t" => {
                    timestamp =
                        Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?);
                }
                "v1" => candidates.push(value.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            timestamp: timestamp.ok_or(SignatureError::Malformed)?,
            candidates,
        })
    }
}

/// Verifies webhook payloads against the shared endpoint secret.
///
/// Verification runs over the raw request bytes, before any JSON parsing,
/// and compares in constant time via the MAC itself.
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// Verify `header` against the raw, unparsed request body.
    pub fn verify(&self, header: &str, payload: &[u8]) -> Result<(), SignatureError> {
        self.verify_at(header, payload, chrono::Utc::now().timestamp())
    }

    fn verify_at(&self, header: &str, payload: &[u8], now: i64) -> Result<(), SignatureError> {
        let parsed = SignatureHeader::parse(header)?;

        if (now - parsed.timestamp).abs() > self.tolerance_secs {
            return Err(SignatureError::Stale);
        }

        for candidate in &parsed.candidates {
            let Ok(bytes) = hex::decode(candidate) else {
                continue;
            };
            let mac = signed_mac(&self.secret, parsed.timestamp, payload);
            if mac.verify_slice(&bytes).is_ok() {
                return Ok(());
            }
        }

        Err(SignatureError::Mismatch)
    }
}

fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Hex signature for `payload` at `timestamp`. Exposed so fixtures and local
/// tooling can mint headers the verifier accepts.
pub fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    hex::encode(signed_mac(secret, timestamp, payload).finalize().into_bytes())
}
