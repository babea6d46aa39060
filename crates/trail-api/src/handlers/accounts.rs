//! User and device registration handlers
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::handlers::optional_json;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Registration request; a GUID is generated when omitted
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub user_guid: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    pub device_guid: Option<String>,
}

/// Registered vertex
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisteredResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Devices owned by a user
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeviceListResponse {
    pub devices: Vec<String>,
}

/// Register a user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "accounts",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "User created", body = RegisteredResponse),
        (status = 400, description = "Blank or duplicate GUID", body = crate::error::ApiError)
    )
)]
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<RegisteredResponse>), AppError> {
    state.increment_requests();
    let request: RegisterUserRequest = optional_json(&headers, &body)?;

    let user = state
        .accounts
        .register_user(request.user_guid.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisteredResponse {
            kind: user.kind().to_string(),
            id: user.id,
        }),
    ))
}

/// Register a device owned by a user
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/devices",
    tag = "accounts",
    params(("id" = String, Path, description = "Owning user GUID")),
    request_body = RegisterDeviceRequest,
    responses(
        (status = 201, description = "Device created", body = RegisteredResponse),
        (status = 400, description = "Unknown user or invalid GUID", body = crate::error::ApiError)
    )
)]
pub async fn register_device(
    State(state): State<Arc<AppState>>,
    Path(user_guid): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<RegisteredResponse>), AppError> {
    state.increment_requests();
    let request: RegisterDeviceRequest = optional_json(&headers, &body)?;

    let device = state
        .accounts
        .register_device(&user_guid, request.device_guid.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisteredResponse {
            kind: device.kind().to_string(),
            id: device.id,
        }),
    ))
}

/// List a user's devices
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/devices",
    tag = "accounts",
    params(("id" = String, Path, description = "User GUID")),
    responses(
        (status = 200, description = "Owned devices", body = DeviceListResponse),
        (status = 404, description = "Unknown user", body = crate::error::ApiError)
    )
)]
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
    Path(user_guid): Path<String>,
) -> Result<Json<DeviceListResponse>, AppError> {
    state.increment_requests();

    let devices = state
        .accounts
        .devices(&user_guid)
        .await
        .map_err(AppError::not_found_on_fetch)?;

    Ok(Json(DeviceListResponse {
        devices: devices.into_iter().map(|d| d.id).collect(),
    }))
}
