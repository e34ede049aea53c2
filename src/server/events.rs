use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Serialize;

use super::form::{read_multipart, Form};
use super::users::parse_id;
use super::views::{event_views, EventView};
use super::{blocking, AppState, MAX_EVENT_IMAGES};
use crate::error::{AppError, AppResult};
use crate::identity::Principal;
use crate::ownership::{self, parse_timestamp, EventDraft};
use crate::storage::ImageRef;

#[derive(Debug, Serialize)]
pub struct EventEnvelope {
    pub message: &'static str,
    pub event: EventView,
}

/// Absent or unparseable dates become `None` and are rejected by validation.
fn draft_from(form: &Form) -> AppResult<EventDraft> {
    let date = |name: &str| -> AppResult<Option<chrono::DateTime<Utc>>> {
        let raw = form.text(name);
        if raw.trim().is_empty() {
            return Ok(None);
        }
        parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| AppError::validation(format!("{} is not a valid date", name)))
    };
    Ok(EventDraft {
        title: form.text("title"),
        description: form.text("description"),
        location: form.text("location"),
        start_date: date("startDate")?,
        end_date: date("endDate")?,
    })
}

/// Multipart: `title`, `description`, `location`, `startDate`, `endDate`, and up to
/// ten `images` files. Nothing is written until every field and file has been checked.
pub async fn create_event(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    req: Request,
) -> AppResult<(StatusCode, Json<EventEnvelope>)> {
    let form = read_multipart(req, &state).await?;
    let now = Utc::now();
    let valid = draft_from(&form)?.validate(now)?;

    let files: Vec<_> = form.files_named("images").collect();
    if files.len() > MAX_EVENT_IMAGES {
        return Err(AppError::validation(format!("at most {} images per event", MAX_EVENT_IMAGES)));
    }
    for f in &files {
        state.blobs.validate(&f.bytes, &f.content_type)?;
    }

    let mut images: Vec<ImageRef> = Vec::with_capacity(files.len());
    for f in files {
        match state.blobs.save(&f.bytes, &f.content_type).await {
            Ok(image) => images.push(image),
            Err(e) => {
                state.blobs.delete_all(&images).await;
                return Err(e);
            }
        }
    }

    let store = state.store.clone();
    let owner = principal.user_id;
    let saved = images.clone();
    match blocking(move || ownership::create_event(&store, owner, valid, saved, now)).await {
        Ok(event) => Ok((
            StatusCode::CREATED,
            Json(EventEnvelope { message: "Event created", event: EventView::from(event) }),
        )),
        Err(e) => {
            state.blobs.delete_all(&images).await;
            Err(e)
        }
    }
}

pub async fn discovery(State(state): State<AppState>) -> AppResult<Json<Vec<EventView>>> {
    let store = state.store.clone();
    let events = blocking(move || Ok(ownership::list_all_events(&store))).await?;
    Ok(Json(event_views(events)))
}

/// Events owned by users the caller follows.
pub async fn followed(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Vec<EventView>>> {
    let store = state.store.clone();
    let user = principal.user_id;
    let events = blocking(move || Ok(ownership::list_followed_events(&store, user))).await?;
    Ok(Json(event_views(events)))
}

pub async fn join_event(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(event_id): Path<String>,
) -> AppResult<Json<EventEnvelope>> {
    let event_id = parse_id(&event_id, "Event")?;
    let store = state.store.clone();
    let user = principal.user_id;
    let event = blocking(move || ownership::join_event(&store, user, event_id)).await?;
    Ok(Json(EventEnvelope { message: "Joined event", event: EventView::from(event) }))
}
