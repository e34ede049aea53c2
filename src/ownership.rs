//! Event ownership, participation and follow relationships.
//!
//! Every operation locks the store once, so "check then append" never races with
//! another request. An event's owner is fixed at creation and is not added to
//! its participants.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::storage::{EventRecord, ImageRef, SharedStore};

/// Client-supplied event fields before validation.
#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Event fields that passed validation.
#[derive(Debug, Clone)]
pub struct ValidEvent {
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl EventDraft {
    /// Required fields present and `now <= start_date <= end_date`.
    pub fn validate(&self, now: DateTime<Utc>) -> AppResult<ValidEvent> {
        let title = required(&self.title, "title")?;
        let description = required(&self.description, "description")?;
        let location = required(&self.location, "location")?;
        let start_date = self.start_date.ok_or_else(|| AppError::validation("startDate is required"))?;
        let end_date = self.end_date.ok_or_else(|| AppError::validation("endDate is required"))?;
        if start_date < now {
            return Err(AppError::validation("startDate cannot be in the past"));
        }
        if end_date < start_date {
            return Err(AppError::validation("endDate must not be before startDate"));
        }
        Ok(ValidEvent { title, description, location, start_date, end_date })
    }
}

fn required(value: &str, field: &str) -> AppResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(AppError::validation(format!("{} is required", field)));
    }
    Ok(v.to_string())
}

/// Accepts RFC 3339, or a naive `YYYY-MM-DDTHH:MM[:SS]` read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Store `valid` as a new event owned by `owner`, keeping `images` in order.
/// `now` must be the instant the draft was validated at; it becomes `created_at`.
pub fn create_event(
    store: &SharedStore,
    owner: Uuid,
    valid: ValidEvent,
    images: Vec<ImageRef>,
    now: DateTime<Utc>,
) -> AppResult<EventRecord> {
    let record = EventRecord {
        id: Uuid::new_v4(),
        owner,
        title: valid.title,
        description: valid.description,
        location: valid.location,
        start_date: valid.start_date,
        end_date: valid.end_date,
        images,
        participants: Vec::new(),
        created_at: now,
    };
    let event = store.0.lock().insert_event(record)?;
    info!(target: "eventshare::events", "event created id={} owner={} images={}", event.id, owner, event.images.len());
    Ok(event)
}

pub fn join_event(store: &SharedStore, user: Uuid, event_id: Uuid) -> AppResult<EventRecord> {
    let event = store.0.lock().add_participant(event_id, user)?;
    info!(target: "eventshare::events", "user={} joined event={}", user, event_id);
    Ok(event)
}

/// Make `follower` follow `followed`. Repeating a follow is a no-op; returns whether it was new.
pub fn follow(store: &SharedStore, follower: Uuid, followed: Uuid) -> AppResult<bool> {
    let added = store.0.lock().add_follower(followed, follower)?;
    if added {
        info!(target: "eventshare::follow", "user={} now follows user={}", follower, followed);
    }
    Ok(added)
}

/// Events owned by anyone `user` follows, newest first.
pub fn list_followed_events(store: &SharedStore, user: Uuid) -> Vec<EventRecord> {
    let guard = store.0.lock();
    let owners: HashSet<Uuid> = guard.followed_by(user).into_iter().collect();
    guard.events_owned_by_any(&owners)
}

/// Every event, newest first.
pub fn list_all_events(store: &SharedStore) -> Vec<EventRecord> {
    store.0.lock().events_newest_first()
}

pub fn events_owned_by(store: &SharedStore, user: Uuid) -> Vec<EventRecord> {
    let owners: HashSet<Uuid> = [user].into_iter().collect();
    store.0.lock().events_owned_by_any(&owners)
}
