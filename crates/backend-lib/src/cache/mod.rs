// ============================
// taskvault-backend/src/cache/mod.rs
// ============================
//! In-process caches with time-based expiry.

pub mod activation;
pub mod expiring;

pub use activation::{ActivationCache, CodeCheck};
pub use expiring::ExpiringStore;
