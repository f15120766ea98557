//! OAuth 1.0a request signing (HMAC-SHA1).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha1::Sha1;
use std::fmt;

type HmacSha1 = Hmac<Sha1>;

/// The four secrets the platform issues to an app acting for one account.
#[derive(Clone)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("access_token", &self.access_token)
            .finish_non_exhaustive()
    }
}

/// RFC 3986 percent-encoding (only `A-Za-z0-9-._~` pass through).
fn encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Compute the base64 HMAC-SHA1 signature for a request.
///
/// `params` holds every query and form parameter plus the `oauth_*` ones,
/// unencoded. JSON bodies are not part of the signature.
pub fn signature(
    method: &str,
    base_url: &str,
    params: &[(&str, &str)],
    consumer_secret: &str,
    token_secret: &str,
) -> String {
    let mut encoded: Vec<(String, String)> =
        params.iter().map(|(k, v)| (encode(k), encode(v))).collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let base_string = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(base_url),
        encode(&param_string)
    );
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));

    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(base_string.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// `Authorization` header value with an explicit nonce and timestamp.
pub fn authorization_header_with(
    credentials: &Credentials,
    method: &str,
    base_url: &str,
    query: &[(&str, &str)],
    nonce: &str,
    timestamp: &str,
) -> String {
    let oauth: [(&str, &str); 6] = [
        ("oauth_consumer_key", credentials.consumer_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_token", credentials.access_token.as_str()),
        ("oauth_version", "1.0"),
    ];

    let all: Vec<(&str, &str)> = oauth.iter().chain(query.iter()).copied().collect();
    let sig = signature(
        method,
        base_url,
        &all,
        &credentials.consumer_secret,
        &credentials.access_token_secret,
    );

    let mut fields: Vec<String> = oauth
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect();
    fields.push(format!("oauth_signature=\"{}\"", encode(&sig)));
    fields.sort();

    format!("OAuth {}", fields.join(", "))
}

/// `Authorization` header value with a fresh nonce and the current time.
pub fn authorization_header(
    credentials: &Credentials,
    method: &str,
    base_url: &str,
    query: &[(&str, &str)],
) -> String {
    let nonce: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    let timestamp = chrono::Utc::now().timestamp().to_string();
    authorization_header_with(credentials, method, base_url, query, &nonce, &timestamp)
}
