//! Product keys for the offline launcher
//!
//! Administrators issue batches of product keys per edition. A launcher
//! redeems an active key for a short-lived bearer token and presents that
//! token on every request.
//!
//! Key lifecycle:
//! 1. `generate_keys` creates N `Active` keys bound to an edition
//! 2. `revoke` / `activate` toggle the status (keys are never deleted)
//! 3. `redeem` mints a `LauncherSession` from an `Active` key
//! 4. `validate_session` resolves a bearer token to its credential and edition
//! 5. The sweeper drops sessions past their expiry from the store
//!
//! Revoking a key stops new redemptions. Sessions already minted stay valid
//! until their own expiry.

pub mod error;
pub mod key;
pub mod service;
pub mod sweep;

pub use error::{Error, Result};
pub use key::{
    ACCESS_TOKEN_LEN, PRODUCT_KEY_LEN, generate_access_token, generate_product_key,
    is_valid_access_token, is_valid_product_key,
};
pub use service::{
    DEFAULT_SESSION_TTL, LauncherCredentialService, MAX_KEYS_PER_REQUEST, parse_status,
};
pub use sweep::spawn_session_sweeper;
