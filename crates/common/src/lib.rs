//! Common types for the trap collection services

mod clock;
mod error;
mod random;
mod secret;

pub use clock::now_millis;
pub use error::{Error, Result};
pub use random::secure_alphanumeric;
pub use secret::Secret;
