// ============================
// taskvault-backend/src/auth/password.rs
// ============================
//! Password hashing and verification.
use scrypt::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Params, Scrypt,
};
use zeroize::Zeroizing;

use crate::config::PasswordSettings;
use crate::error::{AppError, AppResult};

/// Hash a password using scrypt with the configured cost
pub fn hash_password(plain: &str, settings: &PasswordSettings) -> anyhow::Result<String> {
    let params = Params::new(settings.log_n, settings.r, settings.p, Params::RECOMMENDED_LEN)?;
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())?;
    let hash = Scrypt
        .hash_password_customized(plain.as_bytes(), None, None, params, &salt)?
        .to_string();
    Ok(hash)
}

/// Verify a password against a hash
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
}

/// Hash on the blocking pool; the plaintext is wiped once hashed.
pub async fn hash_password_blocking(plain: Zeroizing<String>, settings: PasswordSettings) -> AppResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain, &settings))
        .await?
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Verify on the blocking pool.
pub async fn verify_password_blocking(hash: String, plain: Zeroizing<String>) -> AppResult<bool> {
    Ok(tokio::task::spawn_blocking(move || verify_password(&hash, &plain)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> PasswordSettings {
        PasswordSettings { log_n: 4, r: 8, p: 1 }
    }

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("correct horse battery", &cheap()).unwrap();
        assert!(hash.starts_with("$scrypt$"));
        assert!(verify_password(&hash, "correct horse battery"));
        assert!(!verify_password(&hash, "wrong horse battery"));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same password", &cheap()).unwrap();
        let b = hash_password("same password", &cheap()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        assert!(!verify_password("not-a-phc-string", "anything"));
        assert!(!verify_password("", ""));
    }

    #[tokio::test]
    async fn test_blocking_helpers() {
        let hash = hash_password_blocking(Zeroizing::new("pa55word!".to_string()), cheap())
            .await
            .unwrap();
        assert!(verify_password_blocking(hash.clone(), Zeroizing::new("pa55word!".to_string()))
            .await
            .unwrap());
        assert!(!verify_password_blocking(hash, Zeroizing::new("pa55word?".to_string()))
            .await
            .unwrap());
    }
}
