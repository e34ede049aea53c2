//! Request body helpers: multipart forms and JSON, with extractor rejections
//! mapped onto `validation_error`.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};

/// A file part of a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// A fully read multipart form: text fields by name, file parts in arrival order.
#[derive(Debug, Default)]
pub struct Form {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl Form {
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// Files sent under `name`, also accepting the `name[]` spelling.
    pub fn files_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a UploadedFile> + 'a {
        self.files
            .iter()
            .filter(move |f| f.field == name || f.field.strip_suffix("[]") == Some(name))
    }
}

pub fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Read every part of a multipart request. File inputs left blank are dropped.
pub async fn read_multipart<S: Send + Sync>(req: Request, state: &S) -> AppResult<Form> {
    let mut multipart = Multipart::from_request(req, state)
        .await
        .map_err(|e| AppError::validation(e.body_text()))?;
    let mut form = Form::default();
    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::validation(e.body_text()))? {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name() {
            let unnamed = file_name.trim().is_empty();
            let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
            let bytes = field.bytes().await.map_err(|e| AppError::validation(e.body_text()))?;
            // Browsers send an unnamed, empty part for a file input left blank.
            if unnamed && bytes.is_empty() {
                continue;
            }
            form.files.push(UploadedFile { field: name, content_type, bytes });
        } else {
            let text = field.text().await.map_err(|e| AppError::validation(e.body_text()))?;
            form.fields.insert(name, text);
        }
    }
    Ok(form)
}

pub async fn read_json<T: DeserializeOwned, S: Send + Sync>(req: Request, state: &S) -> AppResult<T> {
    let Json(body) = Json::<T>::from_request(req, state)
        .await
        .map_err(|e| AppError::validation(e.body_text()))?;
    Ok(body)
}
