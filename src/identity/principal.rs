use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::UserRecord;

/// Authenticated identity attached to a request. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&UserRecord> for Principal {
    fn from(u: &UserRecord) -> Self {
        Self { user_id: u.id, name: u.name.clone(), email: u.email.clone() }
    }
}
