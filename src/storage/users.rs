use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::{normalize_email, ImageRef, Store, UserRecord};
use crate::error::{AppError, AppResult};

/// Fields for a user about to be inserted. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub profile_picture: Option<ImageRef>,
}

impl Store {
    /// Insert a new user. Fails with `duplicate_email` when the email is taken.
    pub fn insert_user(&mut self, new: NewUser) -> AppResult<UserRecord> {
        let email = normalize_email(&new.email);
        if self.emails.contains_key(&email) {
            debug!(target: "eventshare::storage", "insert_user: email already registered");
            return Err(AppError::duplicate_email());
        }
        let user = UserRecord {
            id: Uuid::new_v4(),
            name: new.name,
            email: email.clone(),
            password_hash: new.password_hash,
            profile_picture: new.profile_picture,
            followers: Vec::new(),
            created_at: Utc::now(),
        };
        self.emails.insert(email.clone(), user.id);
        self.users.insert(user.id, user.clone());
        if let Err(e) = self.persist() {
            self.emails.remove(&email);
            self.users.remove(&user.id);
            return Err(e);
        }
        debug!(target: "eventshare::storage", "insert_user: id={}", user.id);
        Ok(user)
    }

    pub fn user(&self, id: Uuid) -> Option<&UserRecord> { self.users.get(&id) }

    pub fn user_by_email(&self, email: &str) -> Option<&UserRecord> {
        self.emails.get(&normalize_email(email)).and_then(|id| self.users.get(id))
    }

    /// Replace the user's profile picture, returning the one it replaced.
    pub fn set_profile_picture(&mut self, id: Uuid, image: ImageRef) -> AppResult<Option<ImageRef>> {
        let user = self.users.get_mut(&id).ok_or_else(|| AppError::missing("User"))?;
        let previous = user.profile_picture.replace(image);
        if let Err(e) = self.persist() {
            if let Some(user) = self.users.get_mut(&id) { user.profile_picture = previous; }
            return Err(e);
        }
        Ok(previous)
    }

    /// Add `follower` to `followed`'s followers if absent.
    /// Returns `false` when the follow already existed.
    pub fn add_follower(&mut self, followed: Uuid, follower: Uuid) -> AppResult<bool> {
        if followed == follower {
            return Err(AppError::validation("Users cannot follow themselves"));
        }
        if !self.users.contains_key(&follower) {
            return Err(AppError::missing("User"));
        }
        let target = self.users.get_mut(&followed).ok_or_else(|| AppError::missing("User"))?;
        if target.followers.contains(&follower) {
            return Ok(false);
        }
        target.followers.push(follower);
        if let Err(e) = self.persist() {
            if let Some(target) = self.users.get_mut(&followed) { target.followers.retain(|f| *f != follower); }
            return Err(e);
        }
        debug!(target: "eventshare::storage", "add_follower: {} -> {}", follower, followed);
        Ok(true)
    }

    /// Ids of every user whose followers include `user`.
    pub fn followed_by(&self, user: Uuid) -> Vec<Uuid> {
        self.users
            .values()
            .filter(|u| u.followers.contains(&user))
            .map(|u| u.id)
            .collect()
    }
}
