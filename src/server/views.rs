//! JSON response bodies. Records are never serialized directly, so the
//! password hash cannot leak into a response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::{EventRecord, UserRecord};

/// Body of a successful register or login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub id: Uuid,
    pub owner: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Blob file names, in upload order.
    pub images: Vec<String>,
    pub participants: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<EventRecord> for EventView {
    fn from(e: EventRecord) -> Self {
        Self {
            id: e.id,
            owner: e.owner,
            title: e.title,
            description: e.description,
            location: e.location,
            start_date: e.start_date,
            end_date: e.end_date,
            images: e.images.into_iter().map(|i| i.file).collect(),
            participants: e.participants,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Download path for the picture, when one is set.
    pub profile_picture: Option<String>,
    pub followers: Vec<Uuid>,
    pub events: Vec<EventView>,
}

pub fn profile_picture_url(user_id: Uuid) -> String {
    format!("/users/profilePicture/{}", user_id)
}

impl ProfileView {
    pub fn new(user: &UserRecord, events: Vec<EventRecord>) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            profile_picture: user.profile_picture.as_ref().map(|_| profile_picture_url(user.id)),
            followers: user.followers.clone(),
            events: events.into_iter().map(EventView::from).collect(),
        }
    }
}

pub fn event_views(events: Vec<EventRecord>) -> Vec<EventView> {
    events.into_iter().map(EventView::from).collect()
}
