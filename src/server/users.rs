use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::form::{is_multipart, read_json, read_multipart};
use super::views::{profile_picture_url, AuthResponse, ProfileView};
use super::{blocking, AppState};
use crate::error::{AppError, AppResult};
use crate::identity::{LoginRequest, Principal, RegisterRequest};
use crate::ownership;
use crate::storage::{ImageRef, UserRecord};

#[derive(Deserialize)]
struct RegisterPayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct LoginPayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// Path ids that do not parse can never match a record.
pub(crate) fn parse_id(raw: &str, what: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::missing(what))
}

fn auth_response(state: &AppState, user: &UserRecord) -> AppResult<AuthResponse> {
    let token = state
        .tokens
        .issue(user.id)
        .map_err(|e| AppError::storage(format!("issuing token: {}", e)))?;
    Ok(AuthResponse {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        token: token.expose_secret().to_string(),
    })
}

/// Create an account from a JSON body, or a multipart form with an optional `profilePicture`.
pub async fn register(State(state): State<AppState>, req: Request) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let (payload, picture) = if is_multipart(req.headers()) {
        let form = read_multipart(req, &state).await?;
        let picture = form.files_named("profilePicture").next().cloned();
        let payload = RegisterPayload { name: form.text("name"), email: form.text("email"), password: form.text("password") };
        (payload, picture)
    } else {
        (read_json::<RegisterPayload, _>(req, &state).await?, None)
    };

    let mut stored: Option<ImageRef> = None;
    if let Some(file) = picture {
        stored = Some(state.blobs.save(&file.bytes, &file.content_type).await?);
    }

    let request = RegisterRequest {
        name: payload.name,
        email: payload.email,
        password: SecretString::from(payload.password),
        profile_picture: stored.clone(),
    };
    let auth = state.auth.clone();
    let user = match blocking(move || auth.register(&request)).await {
        Ok(user) => user,
        Err(e) => {
            if let Some(image) = stored {
                state.blobs.delete(&image).await;
            }
            return Err(e);
        }
    };
    // The account is stored at this point; a signing failure leaves it in place and
    // the client recovers by logging in.
    let body = auth_response(&state, &user).map_err(|e| {
        warn!(target: "eventshare::users", "user registered id={} but no token was issued: {}", user.id, e);
        e
    })?;
    info!(target: "eventshare::users", "user registered id={}", user.id);
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn login(State(state): State<AppState>, req: Request) -> AppResult<Json<AuthResponse>> {
    let payload = read_json::<LoginPayload, _>(req, &state).await?;
    let request = LoginRequest { email: payload.email, password: SecretString::from(payload.password) };
    let auth = state.auth.clone();
    let user = blocking(move || auth.verify_credentials(&request)).await?;
    info!(target: "eventshare::users", "user logged in id={}", user.id);
    Ok(Json(auth_response(&state, &user)?))
}

/// The caller's profile and the events they own.
pub async fn me(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> AppResult<Json<ProfileView>> {
    let store = state.store.clone();
    let (user, events) = blocking(move || {
        let user = store.0.lock().user(principal.user_id).cloned().ok_or_else(|| AppError::missing("User"))?;
        let events = ownership::events_owned_by(&store, user.id);
        Ok((user, events))
    })
    .await?;
    Ok(Json(ProfileView::new(&user, events)))
}

pub async fn profile_picture(State(state): State<AppState>, Path(user_id): Path<String>) -> AppResult<Response> {
    let user_id = parse_id(&user_id, "User")?;
    let store = state.store.clone();
    let image = blocking(move || {
        let store = store.0.lock();
        let user = store.user(user_id).ok_or_else(|| AppError::missing("User"))?;
        user.profile_picture.clone().ok_or_else(|| AppError::missing("Profile picture"))
    })
    .await?;
    let bytes = state.blobs.read(&image).await?;
    let content_type = HeaderValue::from_str(&image.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// Replace the caller's picture. The old file is removed once the record points at the new one.
pub async fn upload_profile_picture(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    req: Request,
) -> AppResult<Json<serde_json::Value>> {
    let form = read_multipart(req, &state).await?;
    let file = form
        .files_named("profilePicture")
        .next()
        .ok_or_else(|| AppError::validation("profilePicture file is required"))?;
    let image = state.blobs.save(&file.bytes, &file.content_type).await?;
    let store = state.store.clone();
    let stored = image.clone();
    let replaced = blocking(move || store.0.lock().set_profile_picture(principal.user_id, stored)).await;
    match replaced {
        Ok(previous) => {
            if let Some(old) = previous {
                state.blobs.delete(&old).await;
            }
        }
        Err(e) => {
            state.blobs.delete(&image).await;
            return Err(e);
        }
    }
    info!(target: "eventshare::users", "profile picture updated user={}", principal.user_id);
    Ok(Json(serde_json::json!({
        "message": "Profile picture updated",
        "profilePicture": profile_picture_url(principal.user_id),
    })))
}

pub async fn follow_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let followed = parse_id(&user_id, "User")?;
    let store = state.store.clone();
    let follower = principal.user_id;
    let added = blocking(move || ownership::follow(&store, follower, followed)).await?;
    let message = if added { "Now following user" } else { "Already following user" };
    Ok(Json(serde_json::json!({ "message": message, "followed": followed, "added": added })))
}
