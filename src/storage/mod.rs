//!
//! eventshare storage module
//! -------------------------
//! The store keeps the two collections of the service, users and events, in
//! memory and persists them as a single bincode snapshot (`store.bin`) after every
//! mutation. Writes go to a temporary file that is renamed over the snapshot, so a
//! crash mid-write leaves the previous snapshot intact.
//!
//! Key responsibilities:
//! - Email uniqueness (case-insensitive) enforced at insert time.
//! - Set semantics for followers and participants ("append if absent").
//! - Events kept in creation order; feeds are served newest first.
//! - Rolling back the in-memory change when the snapshot cannot be written.
//!
//! The public API centers around the `Store` type, which is wrapped in a
//! thread-safe `SharedStore` (`Arc<Mutex<Store>>`). Every read-modify-write
//! happens inside a single lock acquisition. Image bytes never enter the store;
//! see `blobs` for the file-backed image layer.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub mod blobs;
mod events;
mod users;

pub use blobs::BlobStore;
pub use users::NewUser;

const SNAPSHOT_VERSION: u32 = 1;

/// Reference to an image held by the blob layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRef {
    /// Generated file name relative to the blob directory.
    pub file: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    /// Always stored trimmed and lowercased.
    pub email: String,
    pub password_hash: String,
    pub profile_picture: Option<ImageRef>,
    /// Ids of the users following this user, in follow order. No duplicates, never `id`.
    pub followers: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRecord {
    pub id: Uuid,
    pub owner: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub images: Vec<ImageRef>,
    /// Users who joined, in join order. No duplicates.
    pub participants: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    users: Vec<UserRecord>,
    events: Vec<EventRecord>,
}

/// In-memory collections backed by an on-disk snapshot.
pub struct Store {
    path: PathBuf,
    users: HashMap<Uuid, UserRecord>,
    /// Lowercased email -> user id.
    emails: HashMap<String, Uuid>,
    /// Creation order.
    events: Vec<EventRecord>,
    /// Event id -> position in `events`.
    event_index: HashMap<Uuid, usize>,
}

impl Store {
    /// Open the store at `path`, loading the snapshot if one exists.
    /// The parent directory is created if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating store folder {}", dir.display()))?;
        }
        let mut store = Self {
            path,
            users: HashMap::new(),
            emails: HashMap::new(),
            events: Vec::new(),
            event_index: HashMap::new(),
        };
        if store.path.exists() {
            let bytes = fs::read(&store.path).with_context(|| format!("reading {}", store.path.display()))?;
            let snap: Snapshot = bincode::deserialize(&bytes)
                .with_context(|| format!("decoding store snapshot {}", store.path.display()))?;
            if snap.version != SNAPSHOT_VERSION {
                anyhow::bail!("unsupported store snapshot version {} in {}", snap.version, store.path.display());
            }
            for user in snap.users {
                store.emails.insert(normalize_email(&user.email), user.id);
                store.users.insert(user.id, user);
            }
            for event in snap.events {
                store.event_index.insert(event.id, store.events.len());
                store.events.push(event);
            }
        }
        info!(
            target: "eventshare::storage",
            "store opened: path='{}' users={} events={}",
            store.path.display(),
            store.users.len(),
            store.events.len()
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn user_count(&self) -> usize { self.users.len() }

    pub fn event_count(&self) -> usize { self.events.len() }

    /// Write the full snapshot via a temp file + rename.
    fn persist(&self) -> AppResult<()> {
        let mut users: Vec<UserRecord> = self.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let snap = Snapshot { version: SNAPSHOT_VERSION, users, events: self.events.clone() };
        let bytes = bincode::serialize(&snap)
            .map_err(|e| AppError::storage(format!("encoding store snapshot: {}", e)))?;
        let tmp = self.path.with_extension("bin.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        debug!(target: "eventshare::storage", "snapshot written: users={} events={}", self.users.len(), self.events.len());
        Ok(())
    }
}

/// Trim and lowercase an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
pub struct SharedStore(pub Arc<Mutex<Store>>);

impl SharedStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self(Arc::new(Mutex::new(Store::open(path)?))))
    }
}
