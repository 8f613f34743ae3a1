//! Profile endpoints. Callers reach only their own profile; admins reach
//! any.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use reservo_core::validation::{normalize_email, sanitize_text};
use serde::Deserialize;
use serde_json::{Value, json};
use validator::Validate;

use super::{ApiError, ApiJson};
use crate::auth::Identity;
use crate::server::AppState;

pub(super) async fn get_profile(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    identity.require_owner(&id)?;

    let user = state
        .storage
        .users()
        .find_by_id(&id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(json!({ "user": user.to_public() })))
}

#[derive(Debug, Deserialize, Validate)]
pub(super) struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    name: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    email: Option<String>,
}

pub(super) async fn update_profile(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateProfileRequest>,
) -> Result<Json<Value>, ApiError> {
    identity.require_owner(&id)?;
    body.validate()?;

    let users = state.storage.users();
    let mut user = users
        .find_by_id(&id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    if let Some(name) = body.name.as_deref() {
        let name = sanitize_text(name);
        if name.is_empty() {
            return Err(ApiError::Validation("name: must not be blank".to_string()));
        }
        user.name = name;
    }

    if let Some(email) = body.email.as_deref().map(normalize_email) {
        if email != user.email {
            if users
                .find_by_email(&email)
                .await?
                .is_some_and(|other| other.id != user.id)
            {
                return Err(ApiError::UserExists);
            }
            user.email = email;
        }
    }

    user.updated_at = Utc::now();
    users.update(&user).await?;
    tracing::info!(user_id = %user.id, by = %identity.id, "Profile updated");

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": user.to_public(),
    })))
}
