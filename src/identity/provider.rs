use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::security::{self, PasswordHasherConfig};
use crate::storage::{normalize_email, ImageRef, NewUser, SharedStore, UserRecord};

pub const MIN_PASSWORD_CHARS: usize = 6;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

#[derive(Debug)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: SecretString,
    /// Already stored in the blob layer.
    pub profile_picture: Option<ImageRef>,
}

#[derive(Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: SecretString,
}

/// Credential store seam: account creation and password checks.
/// Implementations hash on the calling thread; async callers should use `spawn_blocking`.
pub trait AuthProvider: Send + Sync {
    fn register(&self, req: &RegisterRequest) -> AppResult<UserRecord>;
    fn verify_credentials(&self, req: &LoginRequest) -> AppResult<UserRecord>;
}

pub struct LocalAuthProvider {
    store: SharedStore,
    hasher: PasswordHasherConfig,
    /// Checked against when the email is unknown so both failure paths cost one verification.
    dummy_hash: String,
}

impl LocalAuthProvider {
    pub fn new(store: SharedStore, hasher: PasswordHasherConfig) -> Result<Self> {
        let dummy_hash = hasher.hash_password("eventshare-dummy-password")?;
        Ok(Self { store, hasher, dummy_hash })
    }
}

fn validate_registration(req: &RegisterRequest) -> AppResult<(String, String)> {
    let name = req.name.trim();
    let email = normalize_email(&req.email);
    let password = req.password.expose_secret();
    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::validation("All fields are mandatory"));
    }
    if !EMAIL_RE.is_match(&email) {
        return Err(AppError::validation("Invalid email"));
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::validation(format!("Password must be at least {} characters", MIN_PASSWORD_CHARS)));
    }
    Ok((name.to_string(), email))
}

impl AuthProvider for LocalAuthProvider {
    fn register(&self, req: &RegisterRequest) -> AppResult<UserRecord> {
        let (name, email) = validate_registration(req)?;
        // Fail fast before paying for a hash; the insert re-checks under the lock.
        if self.store.0.lock().user_by_email(&email).is_some() {
            return Err(AppError::duplicate_email());
        }
        let password_hash = self.hasher.hash_password(req.password.expose_secret())?;
        let user = self.store.0.lock().insert_user(NewUser {
            name,
            email,
            password_hash,
            profile_picture: req.profile_picture.clone(),
        })?;
        debug!(target: "eventshare::auth", "auth.register user={}", user.id);
        Ok(user)
    }

    fn verify_credentials(&self, req: &LoginRequest) -> AppResult<UserRecord> {
        let found = self.store.0.lock().user_by_email(&req.email).cloned();
        let hash = found.as_ref().map(|u| u.password_hash.as_str()).unwrap_or(self.dummy_hash.as_str());
        let password_ok = security::verify_password(hash, req.password.expose_secret());
        match found {
            Some(user) if password_ok => {
                debug!(target: "eventshare::auth", "auth.login user={}", user.id);
                Ok(user)
            }
            Some(user) => {
                debug!(target: "eventshare::auth", "auth.login rejected: wrong password for user={}", user.id);
                Err(AppError::invalid_credentials())
            }
            None => {
                debug!(target: "eventshare::auth", "auth.login rejected: unknown email");
                Err(AppError::invalid_credentials())
            }
        }
    }
}
