//! PKCE (Proof Key for Code Exchange) per RFC 7636
//!
//! The verifier stays in the client session; the challenge goes out in the
//! authorize URL. At code exchange the identity provider recomputes the
//! challenge from the verifier and compares.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{AUTHORIZE_PATH, STATE_LEN, VERIFIER_LEN};
use crate::error::{Error, Result};

/// Challenge derivation method. Only S256 is ever issued, so an unsupported
/// method cannot be represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    #[default]
    #[serde(rename = "S256")]
    S256,
}

impl CodeChallengeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeChallengeMethod::S256 => "S256",
        }
    }
}

/// Generate a random PKCE code verifier.
///
/// 64 ASCII alphanumerics, a subset of the RFC's unreserved characters.
pub fn generate_verifier() -> String {
    common::secure_alphanumeric(VERIFIER_LEN)
}

/// Generate the opaque `state` parameter echoed back by the provider.
pub fn generate_state() -> String {
    common::secure_alphanumeric(STATE_LEN)
}

/// Derive the code challenge from a verifier.
///
/// `S256`: `BASE64URL(SHA256(verifier))` without padding.
pub fn derive_challenge(verifier: &str, method: CodeChallengeMethod) -> String {
    match method {
        CodeChallengeMethod::S256 => URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes())),
    }
}

/// Recompute the challenge and compare it with the one presented.
pub fn verify_challenge(verifier: &str, challenge: &str, method: CodeChallengeMethod) -> bool {
    derive_challenge(verifier, method) == challenge
}

/// Build the authorize URL at `{base_url}/oauth2/authorize`.
pub fn build_authorization_url(
    base_url: &str,
    client_id: &str,
    challenge: &str,
    method: CodeChallengeMethod,
    state: &str,
) -> Result<String> {
    let endpoint = format!("{}{}", base_url.trim_end_matches('/'), AUTHORIZE_PATH);
    let url = reqwest::Url::parse_with_params(
        &endpoint,
        &[
            ("response_type", "code"),
            ("client_id", client_id),
            ("code_challenge", challenge),
            ("code_challenge_method", method.as_str()),
            ("state", state),
        ],
    )
    .map_err(|e| Error::InvalidUrl(format!("{endpoint}: {e}")))?;

    Ok(url.into())
}
