//! API handlers
//!
//! Author: hephaex@gmail.com

pub mod accounts;
pub mod health;
pub mod page_views;
pub mod search;

use crate::error::AppError;
use axum::{
    body::Bytes,
    http::{header, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;

/// Decode a JSON body that may be omitted entirely.
///
/// An empty body yields `T::default()`. Anything else must carry a JSON
/// content type and decode cleanly.
pub(crate) fn optional_json<T>(headers: &HeaderMap, body: &Bytes) -> Result<T, AppError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    if !has_json_content_type(headers) {
        return Err(AppError::BadRequest(
            "Expected request with `Content-Type: application/json`".to_string(),
        ));
    }

    let Json(value) = Json::<T>::from_bytes(body)?;
    Ok(value)
}

fn has_json_content_type(headers: &HeaderMap) -> bool {
    let Some(mime) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
    else {
        return false;
    };

    let mime = mime.trim().to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}
