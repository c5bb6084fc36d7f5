//! Identity provider endpoints and login constants
//!
//! Paths are appended to the configured provider base URL
//! (e.g. `https://q.trap.jp/api/v3`).

/// Browser-facing authorization endpoint
pub const AUTHORIZE_PATH: &str = "/oauth2/authorize";

/// Token endpoint for code exchange
pub const TOKEN_PATH: &str = "/oauth2/token";

/// Token revocation endpoint
pub const REVOKE_PATH: &str = "/oauth2/revoke";

/// User-info endpoint returning the caller's identity
pub const USER_INFO_PATH: &str = "/users/me";

/// Subtracted from the provider's `expires_in` so a session considered
/// live locally is still accepted upstream.
pub const EXPIRY_MARGIN_MILLIS: u64 = 5_000;

/// PKCE verifier length. RFC 7636 allows 43-128 characters.
pub const VERIFIER_LEN: usize = 64;

/// Length of the opaque `state` parameter.
pub const STATE_LEN: usize = 32;

/// Default timeout for identity-provider calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
