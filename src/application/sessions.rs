//! Account signup/login and cookie sessions.
//!
//! Sessions are opaque bearer tokens of the form `cv_<prefix>_<secret>`.
//! Only a SHA-256 digest of the secret is persisted; authentication looks
//! the session up by prefix and compares digests in constant time. The same
//! salted-digest scheme guards passwords.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo, UsersWriteRepo,
};
use crate::cache::{CacheInvalidator, Mutation};
use crate::domain::entities::UserRecord;

const TOKEN_PREFIX: &str = "cv";
const MIN_SECRET_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("missing session token")]
    Missing,
    #[error("invalid session token")]
    Invalid,
    #[error("expired session token")]
    Expired,
}

impl AuthError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[derive(Debug, Clone)]
pub struct SignupCommand {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

/// A freshly opened session: the record's owner plus the one-time token the
/// cookie will carry.
#[derive(Debug, Clone)]
pub struct SessionOpened {
    pub user: UserRecord,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct SessionService {
    users: Arc<dyn UsersRepo>,
    users_write: Arc<dyn UsersWriteRepo>,
    sessions: Arc<dyn SessionsRepo>,
    invalidator: CacheInvalidator,
    session_ttl: Duration,
}

impl SessionService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        users_write: Arc<dyn UsersWriteRepo>,
        sessions: Arc<dyn SessionsRepo>,
        invalidator: CacheInvalidator,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            users_write,
            sessions,
            invalidator,
            session_ttl,
        }
    }

    pub async fn signup(&self, cmd: SignupCommand) -> Result<SessionOpened, AuthError> {
        if cmd.user_name.trim().is_empty() || cmd.email.trim().is_empty() {
            return Err(AuthError::validation("all fields are required"));
        }
        if cmd.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }
        if self.users.find_by_email(cmd.email.trim()).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let salt = generate_salt();
        let password_hash = hash_password(&cmd.password, &salt);
        let user = self
            .users_write
            .create_user(CreateUserParams {
                user_name: cmd.user_name.trim().to_string(),
                email: cmd.email.trim().to_string(),
                password_hash,
                password_salt: salt,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => AuthError::EmailTaken,
                other => AuthError::Repo(other),
            })?;

        // A new account may show up in anyone's suggestions.
        self.invalidator.apply(Mutation::UserJoined);

        self.open_session(user).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionOpened, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::validation("email and password are required"));
        }

        let user = self
            .users
            .find_by_email(email.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_salt, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        self.open_session(user).await
    }

    /// Resolve a cookie token to its user. Any mismatch reads as `Invalid`
    /// rather than leaking which part failed.
    pub async fn authenticate(&self, token: &str) -> Result<UserRecord, AuthError> {
        let parsed = parse_token(token).ok_or(AuthError::Invalid)?;
        let session = self
            .sessions
            .find_by_prefix(&parsed.prefix)
            .await
            .map_err(|_| AuthError::Invalid)?
            .ok_or(AuthError::Invalid)?;

        if session.expires_at <= OffsetDateTime::now_utc() {
            return Err(AuthError::Expired);
        }

        let hashed_input = hash_secret(&parsed.secret);
        if session.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(AuthError::Invalid);
        }

        self.users
            .find_by_id(session.user_id)
            .await
            .map_err(|_| AuthError::Invalid)?
            .ok_or(AuthError::Invalid)
    }

    /// Drop the session behind a token. Unknown tokens are a no-op so logout
    /// is always safe to call.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        if let Some(parsed) = parse_token(token) {
            self.sessions.delete_by_prefix(&parsed.prefix).await?;
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    async fn open_session(&self, user: UserRecord) -> Result<SessionOpened, AuthError> {
        let prefix = generate_prefix();
        let secret = generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;

        self.sessions
            .create_session(CreateSessionParams {
                user_id: user.id,
                prefix,
                hashed_secret: hash_secret(&secret),
                expires_at,
            })
            .await?;

        Ok(SessionOpened {
            user,
            token,
            expires_at,
        })
    }
}

// ============================================================================
// Token and password primitives
// ============================================================================

pub(crate) fn generate_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

pub(crate) fn hash_password(password: &str, salt: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

pub(crate) fn verify_password(password: &str, salt: &str, expected: &[u8]) -> bool {
    let hashed = hash_password(password, salt);
    expected.ct_eq(&hashed).unwrap_u8() == 1
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.splitn(3, '_');
    let prefix_tag = parts.next()?;
    if prefix_tag != TOKEN_PREFIX {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if secret.len() < MIN_SECRET_LEN || prefix.is_empty() {
        return None;
    }
    Some(ParsedToken {
        prefix: prefix.to_string(),
        secret: secret.to_string(),
    })
}

struct ParsedToken {
    prefix: String,
    secret: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let salt = generate_salt();
        let hash = hash_password("hunter22", &salt);

        assert!(verify_password("hunter22", &salt, &hash));
        assert!(!verify_password("hunter23", &salt, &hash));
        assert!(!verify_password("hunter22", "other-salt", &hash));
    }

    #[test]
    fn same_password_different_salt_differs() {
        let a = hash_password("secret-enough", "salt-a");
        let b = hash_password("secret-enough", "salt-b");
        assert_ne!(a, b);
    }

    #[test]
    fn token_parsing_rejects_malformed_input() {
        assert!(parse_token("").is_none());
        assert!(parse_token("cv_onlyprefix").is_none());
        assert!(parse_token("xx_prefix_0123456789012345678901234567890123").is_none());
        assert!(parse_token("cv_prefix_short").is_none());

        let secret = "a".repeat(MIN_SECRET_LEN);
        let parsed = parse_token(&format!("cv_prefix_{secret}")).expect("well-formed token");
        assert_eq!(parsed.prefix, "prefix");
        assert_eq!(parsed.secret, secret);
    }
}
