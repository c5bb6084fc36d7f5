//! Browser login for the trap collection
//!
//! PKCE generation, the identity-provider client and the login state machine.
//! This crate has no HTTP server of its own; the gateway stores the values it
//! produces in the client-held session cookie.
//!
//! Login flow:
//! 1. `LoginFlow::begin()` returns the authorize URL and an `AuthorizationState`
//! 2. The user authorizes at the identity provider and comes back with a code
//! 3. `LoginFlow::callback()` exchanges the code and resolves the identity
//! 4. `authenticate()` checks the stored `IdentitySession` on every request
//! 5. `LoginFlow::logout()` revokes the upstream token

pub mod constants;
pub mod error;
pub mod flow;
pub mod pkce;
pub mod provider;
pub mod session;

pub use constants::*;
pub use error::{Error, Result};
pub use flow::{Authentication, Login, LoginFlow, authenticate};
pub use pkce::{
    CodeChallengeMethod, build_authorization_url, derive_challenge, generate_state,
    generate_verifier, verify_challenge,
};
pub use provider::{IdentityProvider, ProviderConfig, TokenResponse, TraqProvider};
pub use session::{AuthorizationState, IdentitySession, UserIdentity};
