//! Product key and bearer token formats
//!
//! Product keys are five dash-separated groups of five ASCII alphanumerics
//! (`XXXXX-XXXXX-XXXXX-XXXXX-XXXXX`). Launcher bearer tokens are 64 ASCII
//! alphanumerics.

use common::secure_alphanumeric;

const GROUPS: usize = 5;
const GROUP_LEN: usize = 5;

/// Length of a formatted product key, dashes included.
pub const PRODUCT_KEY_LEN: usize = GROUPS * GROUP_LEN + (GROUPS - 1);

/// Length of a launcher bearer token.
pub const ACCESS_TOKEN_LEN: usize = 64;

pub fn generate_product_key() -> String {
    let raw = secure_alphanumeric(GROUPS * GROUP_LEN);
    let mut key = String::with_capacity(PRODUCT_KEY_LEN);
    for (i, c) in raw.chars().enumerate() {
        if i > 0 && i % GROUP_LEN == 0 {
            key.push('-');
        }
        key.push(c);
    }
    key
}

pub fn generate_access_token() -> String {
    secure_alphanumeric(ACCESS_TOKEN_LEN)
}

pub fn is_valid_product_key(key: &str) -> bool {
    key.len() == PRODUCT_KEY_LEN
        && key.bytes().enumerate().all(|(i, b)| {
            if i % (GROUP_LEN + 1) == GROUP_LEN {
                b == b'-'
            } else {
                b.is_ascii_alphanumeric()
            }
        })
}

pub fn is_valid_access_token(token: &str) -> bool {
    token.len() == ACCESS_TOKEN_LEN && token.bytes().all(|b| b.is_ascii_alphanumeric())
}
