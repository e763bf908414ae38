//! auth.rs
//!
//! Регистрация, вход и выход. Пароли хранятся как bcrypt-хеши, клиент
//! получает JWT (HS256) с id пользователя (`sub`) и id сессии (`sid`).
//! Выход удаляет сессию, после чего токен перестает приниматься,
//! даже если `exp` еще не наступил.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::{Profile, ProfileMetadata};
use crate::store::{normalize_email, Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("session has ended")]
    SessionEnded,
    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("token encoding failed: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub sid: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// Результат успешного входа или регистрации
#[derive(Debug, Serialize)]
pub struct AuthSession {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: chrono::DateTime<Utc>,
    pub profile: Profile,
}

#[derive(Clone)]
pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    bcrypt_cost: u32,
    admin_emails: Vec<String>,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            ttl: Duration::hours(config.expires_in_hours),
            bcrypt_cost: config.bcrypt_cost,
            admin_emails: config.admin_emails.clone(),
        }
    }

    fn is_admin_email(&self, email: &str) -> bool {
        let email = normalize_email(email);
        self.admin_emails.iter().any(|a| *a == email)
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        Ok(bcrypt::hash(password, self.bcrypt_cost)?)
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    pub fn issue_token(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        exp: chrono::DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id,
            sid: session_id,
            iat: Utc::now().timestamp(),
            exp: exp.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AuthError::Encoding)
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    async fn open_session(
        &self,
        store: &dyn Store,
        profile: Profile,
    ) -> Result<AuthSession, AuthError> {
        let expires_at = Utc::now() + self.ttl;
        let session = store.create_session(profile.id, expires_at).await?;
        let access_token = self.issue_token(profile.id, session.id, expires_at)?;
        Ok(AuthSession {
            access_token,
            token_type: "bearer",
            expires_at,
            profile,
        })
    }

    pub async fn sign_up(
        &self,
        store: &dyn Store,
        email: &str,
        password: &str,
        metadata: ProfileMetadata,
    ) -> Result<AuthSession, AuthError> {
        let hash = self.hash_password(password)?;
        let is_admin = self.is_admin_email(email);
        let (identity, profile) = store
            .create_identity(email, &hash, metadata, is_admin)
            .await?;
        info!("New identity {} registered", identity.id);
        if profile.is_admin {
            info!("Identity {} granted admin", identity.id);
        }
        self.open_session(store, profile).await
    }

    pub async fn sign_in(
        &self,
        store: &dyn Store,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let identity = store
            .find_identity_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.verify_password(password, &identity.password_hash) {
            warn!("Failed sign-in for identity {}", identity.id);
            return Err(AuthError::InvalidCredentials);
        }

        let profile = store
            .get_profile(identity.id)
            .await?
            .ok_or_else(|| StoreError::not_found("profile", identity.id))?;
        self.open_session(store, profile).await
    }

    pub async fn sign_out(&self, store: &dyn Store, session_id: Uuid) -> Result<(), AuthError> {
        if !store.delete_session(session_id).await? {
            return Err(AuthError::SessionEnded);
        }
        Ok(())
    }

    /// Токен -> активная сессия -> профиль
    pub async fn authenticate(
        &self,
        store: &dyn Store,
        token: &str,
    ) -> Result<(Profile, Uuid), AuthError> {
        let claims = self.decode_token(token)?;
        let session = store
            .find_session(claims.sid)
            .await?
            .ok_or(AuthError::SessionEnded)?;

        if session.identity_id != claims.sub || session.is_expired(Utc::now()) {
            return Err(AuthError::SessionEnded);
        }

        let profile = store
            .get_profile(claims.sub)
            .await?
            .ok_or(AuthError::SessionEnded)?;
        Ok((profile, session.id))
    }
}
