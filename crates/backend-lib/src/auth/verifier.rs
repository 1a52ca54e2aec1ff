// ============================
// taskvault-backend/src/auth/verifier.rs
// ============================
//! Bearer token → live user.
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use chrono::Utc;
use metrics::counter;
use tracing::debug;

use super::token::TokenCodec;
use crate::error::{AppError, AppResult};
use crate::metrics::AUTH_FAILED;
use crate::models::User;
use crate::storage::Storage;

const INVALID_TOKEN: &str = "invalid or expired authentication token";

/// The user resolved for the current request. Inserted into request
/// extensions by the authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("you must be authenticated to access this resource".into()))
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("missing authentication token".into()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized(INVALID_TOKEN.into()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme == "Bearer" && !token.is_empty() && !token.contains(' ') => {
            Ok(token)
        },
        _ => Err(AppError::Unauthorized(INVALID_TOKEN.into())),
    }
}

/// Verifies tokens and resolves their subject through storage.
pub struct AuthVerifier {
    codec: Arc<TokenCodec>,
    storage: Arc<dyn Storage>,
}

impl AuthVerifier {
    pub fn new(codec: Arc<TokenCodec>, storage: Arc<dyn Storage>) -> Self {
        Self { codec, storage }
    }

    /// Every codec failure collapses into one `Unauthorized`; a subject that
    /// no longer exists is `Unauthorized` too.
    pub async fn verify(&self, raw: &str) -> AppResult<User> {
        let claims = self.codec.verify(raw, Utc::now().timestamp()).map_err(|e| {
            counter!(AUTH_FAILED, "reason" => "token").increment(1);
            debug!(error = %e, "token rejected");
            AppError::Unauthorized(INVALID_TOKEN.into())
        })?;

        match self.storage.user_by_id(claims.sub).await? {
            Some(user) => Ok(user),
            None => {
                counter!(AUTH_FAILED, "reason" => "unknown_user").increment(1);
                debug!(user_id = claims.sub, "token subject no longer exists");
                Err(AppError::Unauthorized("user no longer exists".into()))
            },
        }
    }
}

impl std::fmt::Debug for AuthVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthVerifier")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::Claims;
    use crate::models::NewUser;
    use crate::storage::MemoryStorage;
    use axum::http::HeaderValue;
    use std::time::Duration;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    async fn fixture() -> (AuthVerifier, Arc<TokenCodec>, Arc<MemoryStorage>, User) {
        let storage = Arc::new(MemoryStorage::new());
        let user = storage
            .insert_user(NewUser {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        let codec = Arc::new(TokenCodec::new(SECRET, Duration::from_secs(3600)));
        let verifier = AuthVerifier::new(codec.clone(), storage.clone());
        (verifier, codec, storage, user)
    }

    #[tokio::test]
    async fn test_valid_token_resolves_user() {
        let (verifier, codec, _, user) = fixture().await;
        let (token, _) = codec.issue(user.id).unwrap();
        let resolved = verifier.verify(&token).await.unwrap();
        assert_eq!(resolved.id, user.id);
        assert_eq!(resolved.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_bad_tokens_are_unauthorized() {
        let (verifier, codec, _, user) = fixture().await;
        let expired = codec
            .sign(&Claims {
                sub: user.id,
                exp: Utc::now().timestamp() - 1,
            })
            .unwrap();
        let foreign = TokenCodec::new("ffffffffffffffffffffffffffffffff", Duration::from_secs(60))
            .issue(user.id)
            .unwrap()
            .0;

        for token in [expired.as_str(), foreign.as_str(), "garbage"] {
            let err = verifier.verify(token).await.unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(ref m) if m == INVALID_TOKEN));
        }
    }

    #[tokio::test]
    async fn test_deleted_user_is_unauthorized() {
        let (verifier, codec, storage, user) = fixture().await;
        let (token, _) = codec.issue(user.id).unwrap();
        storage.delete_user(user.id).await.unwrap();

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "user no longer exists"));
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");

        for bad in ["Basic abc", "Bearer", "Bearer ", "bearer abc", "Bearer a b"] {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_static(bad));
            assert!(bearer_token(&headers).is_err(), "{bad:?} should be rejected");
        }
    }
}
