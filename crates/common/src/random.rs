//! Secure random strings
//!
//! Used for PKCE verifiers, authorize-URL state, product keys and launcher
//! bearer tokens. All of them share the ASCII alphanumeric alphabet so the
//! values survive URLs, headers and cookies without escaping.

use rand::RngExt;

const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Largest multiple of 62 that fits in a byte. Bytes at or above it are
/// rejected so every character is equally likely.
const ACCEPT_BELOW: u8 = 248;

/// Generate a random string of `len` ASCII alphanumeric characters.
///
/// Draws from the thread-local CSPRNG. A failing entropy source panics
/// inside `rand`; there is no recoverable error path.
pub fn secure_alphanumeric(len: usize) -> String {
    let mut out = String::with_capacity(len);
    let mut rng = rand::rng();
    let mut buf = [0u8; 64];

    while out.len() < len {
        rng.fill(&mut buf);
        for &b in buf.iter().filter(|&&b| b < ACCEPT_BELOW) {
            if out.len() == len {
                break;
            }
            out.push(ALPHABET[(b % 62) as usize] as char);
        }
    }

    out
}
