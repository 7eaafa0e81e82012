//! SASL PLAIN answers to 407 authentication challenges.

use base64::Engine as _;
use gremlin_core::RequestId;
use gremlin_settings::AuthSettings;
use serde_json::{Value, json};

/// Base64 of `\0user\0password` (RFC 4616 PLAIN, empty authzid).
pub fn sasl_token(auth: &AuthSettings) -> String {
    let plain = format!("\0{}\0{}", auth.user, auth.password);
    base64::engine::general_purpose::STANDARD.encode(plain)
}

/// Message answering the challenge for `request_id`.
///
/// The server resumes the original request once it accepts the answer, so
/// the response reuses the challenged request's ID.
pub fn challenge_response(request_id: &RequestId, processor: &str, auth: &AuthSettings) -> Value {
    json!({
        "requestId": request_id,
        "processor": processor,
        "op": "authentication",
        "args": { "sasl": sasl_token(auth) },
    })
}
