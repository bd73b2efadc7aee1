//! Request signing for Binance's SIGNED endpoints
//!
//! Binance authenticates a request with two pieces:
//! - the API key, sent in the `X-MBX-APIKEY` header
//! - an HMAC-SHA256 signature of the full query string, keyed with the API
//!   secret and appended as the final `signature` parameter
//!
//! The signature must cover exactly the bytes that are sent, so the query
//! string is rendered once by [`QueryString`] and reused for both signing and
//! the request URL.

use hmac::{Hmac, Mac};
use itertools::Itertools;
use sha2::Sha256;
use url::form_urlencoded::byte_serialize;

type HmacSha256 = Hmac<Sha256>;

/// Generate an HMAC-SHA256 signature, hex encoded
///
/// # Example
///
/// ```
/// use testnet_trader::auth::sign_request;
///
/// let signature = sign_request("symbol=BTCUSDT&side=BUY", "secret");
/// assert_eq!(signature.len(), 64);
/// ```
pub fn sign_request(payload: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a signature against the expected value
pub fn verify_signature(payload: &str, secret: &str, signature: &str) -> bool {
    let computed = sign_request(payload, secret);
    constant_time_eq(computed.as_bytes(), signature.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Append `timestamp` and `signature` to a parameter list
///
/// Returns the complete query string, ready to follow `?` in the URL.
pub fn signed_query(params: &QueryString, secret: &str, timestamp_ms: i64) -> String {
    let mut params = params.clone();
    params.push("timestamp", timestamp_ms);
    let payload = params.encode();
    let signature = sign_request(&payload, secret);
    format!("{}&signature={}", payload, signature)
}

/// API credentials container
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    /// Sign a payload with this secret
    pub fn sign(&self, payload: &str) -> String {
        sign_request(payload, &self.api_secret)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Ordered query parameters
///
/// Parameters render in insertion order. Duplicate keys are kept as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryString {
    pairs: Vec<(String, String)>,
}

impl QueryString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter
    pub fn push(&mut self, key: impl Into<String>, value: impl std::fmt::Display) -> &mut Self {
        self.pairs.push((key.into(), value.to_string()));
        self
    }

    /// Builder-style variant of [`push`](Self::push)
    pub fn with(mut self, key: impl Into<String>, value: impl std::fmt::Display) -> Self {
        self.push(key, value);
        self
    }

    /// Append a parameter only when a value is present
    pub fn push_opt<V: std::fmt::Display>(
        &mut self,
        key: impl Into<String>,
        value: Option<V>,
    ) -> &mut Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Render as `k1=v1&k2=v2`, form-urlencoding keys and values
    pub fn encode(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    byte_serialize(k.as_bytes()).collect::<String>(),
                    byte_serialize(v.as_bytes()).collect::<String>()
                )
            })
            .join("&")
    }
}

impl std::fmt::Display for QueryString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

impl<K: Into<String>, V: std::fmt::Display> FromIterator<(K, V)> for QueryString {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = QueryString::new();
        for (k, v) in iter {
            query.push(k, v);
        }
        query
    }
}
