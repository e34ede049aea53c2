use std::collections::HashSet;

use tracing::debug;
use uuid::Uuid;

use super::{EventRecord, Store};
use crate::error::{AppError, AppResult};

impl Store {
    /// Append a fully validated event. The owner must be a known user.
    pub fn insert_event(&mut self, event: EventRecord) -> AppResult<EventRecord> {
        if !self.users.contains_key(&event.owner) {
            return Err(AppError::missing("User"));
        }
        if self.event_index.contains_key(&event.id) {
            return Err(AppError::storage(format!("event id collision: {}", event.id)));
        }
        self.event_index.insert(event.id, self.events.len());
        self.events.push(event.clone());
        if let Err(e) = self.persist() {
            self.events.pop();
            self.event_index.remove(&event.id);
            return Err(e);
        }
        debug!(target: "eventshare::storage", "insert_event: id={} owner={}", event.id, event.owner);
        Ok(event)
    }

    pub fn event(&self, id: Uuid) -> Option<&EventRecord> {
        self.event_index.get(&id).map(|&i| &self.events[i])
    }

    /// Add `user` to the event's participants. Fails with `already_joined` on a repeat.
    pub fn add_participant(&mut self, event_id: Uuid, user: Uuid) -> AppResult<EventRecord> {
        let idx = *self.event_index.get(&event_id).ok_or_else(|| AppError::missing("Event"))?;
        if self.events[idx].participants.contains(&user) {
            return Err(AppError::already_joined());
        }
        self.events[idx].participants.push(user);
        if let Err(e) = self.persist() {
            self.events[idx].participants.pop();
            return Err(e);
        }
        debug!(target: "eventshare::storage", "add_participant: event={} user={}", event_id, user);
        Ok(self.events[idx].clone())
    }

    /// All events, most recently created first.
    pub fn events_newest_first(&self) -> Vec<EventRecord> {
        self.events.iter().rev().cloned().collect()
    }

    /// Events owned by any of `owners`, most recently created first.
    pub fn events_owned_by_any(&self, owners: &HashSet<Uuid>) -> Vec<EventRecord> {
        self.events.iter().rev().filter(|e| owners.contains(&e.owner)).cloned().collect()
    }
}
