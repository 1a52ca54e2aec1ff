// ============================
// taskvault-backend/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod password;
pub mod token;
pub mod verifier;

pub use password::{hash_password, hash_password_blocking, verify_password, verify_password_blocking};
pub use token::{Claims, TokenCodec, TokenError};
pub use verifier::{bearer_token, AuthVerifier, AuthenticatedUser};
