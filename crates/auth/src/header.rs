//! `Authorization` header convention.
//!
//! Sign-in: `<scheme> base64(<nick>:<password>)`.
//! Later calls: `<scheme> base64(<session token>)`, or the raw token alone.
//!
//! Hosts are free to use any other transport; nothing in the engine requires it.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use keyward_core::Nick;

use crate::AuthError;

/// Decode sign-in credentials from a header value.
pub fn parse_credentials(value: &str, scheme: &str) -> Result<(Nick, String), AuthError> {
    let decoded = decode_payload(value, scheme).ok_or(AuthError::InvalidAuthorization)?;
    // Nicks never contain ':', passwords might.
    let (nick, password) = decoded
        .split_once(':')
        .ok_or(AuthError::InvalidAuthorization)?;
    if nick.is_empty() {
        return Err(AuthError::InvalidAuthorization);
    }
    Ok((Nick::new(nick), password.to_string()))
}

/// Extract a session token from a header value.
pub fn parse_token(value: &str, scheme: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if !value.contains(' ') {
        return Some(value.to_string());
    }
    decode_payload(value, scheme).filter(|t| !t.is_empty())
}

pub fn encode_credentials(scheme: &str, nick: &Nick, password: &str) -> String {
    format!("{scheme} {}", STANDARD.encode(format!("{nick}:{password}")))
}

pub fn encode_token(scheme: &str, token: &str) -> String {
    format!("{scheme} {}", STANDARD.encode(token))
}

fn decode_payload(value: &str, scheme: &str) -> Option<String> {
    let (given_scheme, payload) = value.trim().split_once(' ')?;
    if given_scheme != scheme {
        return None;
    }
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    String::from_utf8(bytes).ok()
}
