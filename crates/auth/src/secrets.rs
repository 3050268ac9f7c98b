//! Credential hashing and random credential generation.
//!
//! All randomness comes from the operating system's CSPRNG.

use rand::Rng;
use rand::rngs::OsRng;

use crate::AuthError;

/// Alphabet for session tokens.
pub const TOKEN_CHARS: &[u8] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz.,-+#(){}[];:_*!$%=?|@~";
/// Alphabet for nicks, PINs and enrollment tokens (no look-alike characters).
pub const NICK_CHARS: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZ";
/// Alphabet for generated passwords and secrets.
pub const PASSWORD_CHARS: &[u8] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz.,-+#";

pub const SESSION_TOKEN_LEN: usize = 24;
pub const ENROLLMENT_TOKEN_LEN: usize = 32;
pub const PIN_LEN: usize = 6;
pub const NICK_LEN: usize = 8;
pub const PASSWORD_LEN: usize = 32;
pub const SECRET_LEN: usize = 64;

/// Draw `len` characters uniformly from `alphabet`.
pub fn random_string(alphabet: &[u8], len: usize) -> String {
    let mut rng = OsRng;
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

pub fn session_token() -> String {
    random_string(TOKEN_CHARS, SESSION_TOKEN_LEN)
}

pub fn enrollment_token() -> String {
    random_string(NICK_CHARS, ENROLLMENT_TOKEN_LEN)
}

pub fn pin() -> String {
    random_string(NICK_CHARS, PIN_LEN)
}

pub fn nick() -> String {
    random_string(NICK_CHARS, NICK_LEN)
}

pub fn password() -> String {
    random_string(PASSWORD_CHARS, PASSWORD_LEN)
}

pub fn secret() -> String {
    random_string(PASSWORD_CHARS, SECRET_LEN)
}

/// Salted bcrypt hash of `plain`.
pub fn hash(plain: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(plain, cost).map_err(|e| AuthError::Configuration(format!("hashing failed: {e}")))
}

/// Compare `plain` against a stored bcrypt hash. Malformed hashes never match.
pub fn verify(plain: &str, hash: &str) -> bool {
    match bcrypt::verify(plain, hash) {
        Ok(matches) => matches,
        Err(err) => {
            tracing::warn!(error = %err, "stored credential hash is malformed");
            false
        }
    }
}

/// Compare two short secrets without stopping at the first differing byte.
///
/// Only the length may leak; PINs and tokens have fixed lengths.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_plain_equality() {
        assert!(constant_time_eq("A1B2C3", "A1B2C3"));
        assert!(!constant_time_eq("A1B2C3", "A1B2C4"));
        assert!(!constant_time_eq("A1B2C3", "A1B2C"));
        assert!(!constant_time_eq("", "A"));
        assert!(constant_time_eq("", ""));
    }

    const TEST_COST: u32 = 4;

    #[test]
    fn generators_respect_length_and_alphabet() {
        let cases = [
            (session_token(), TOKEN_CHARS, SESSION_TOKEN_LEN),
            (enrollment_token(), NICK_CHARS, ENROLLMENT_TOKEN_LEN),
            (pin(), NICK_CHARS, PIN_LEN),
            (nick(), NICK_CHARS, NICK_LEN),
            (password(), PASSWORD_CHARS, PASSWORD_LEN),
            (secret(), PASSWORD_CHARS, SECRET_LEN),
        ];
        for (value, alphabet, len) in cases {
            assert_eq!(value.len(), len);
            assert!(value.bytes().all(|b| alphabet.contains(&b)), "{value}");
        }
    }

    #[test]
    fn generated_tokens_differ() {
        assert_ne!(session_token(), session_token());
        assert_ne!(enrollment_token(), enrollment_token());
    }

    #[test]
    fn hash_and_verify() {
        let hashed = hash("PaSsWoRdPaSsWoRd", TEST_COST).unwrap();
        assert_ne!(hashed, "PaSsWoRdPaSsWoRd");
        assert!(verify("PaSsWoRdPaSsWoRd", &hashed));
        assert!(!verify("wrong", &hashed));
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!verify("anything", "not-a-bcrypt-hash"));
    }

    #[test]
    fn invalid_cost_is_a_configuration_error() {
        assert!(matches!(hash("x", 99), Err(AuthError::Configuration(_))));
    }
}
