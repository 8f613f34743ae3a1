//! Administration endpoints: all reservations and user management.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use reservo_core::{
    ReservationFilter, ReservationStatus, ReservationUpdate, SortOrder, StoreError, User,
    UserRepository, UserRole,
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ApiError, ApiJson};
use crate::auth::{Identity, Permission};
use crate::server::AppState;

fn require_admin(identity: &Identity, permission: Permission) -> Result<(), ApiError> {
    identity
        .require_role(&[UserRole::Admin])?
        .require_permissions(&[permission])?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub(super) struct ReservationQuery {
    status: Option<String>,
}

pub(super) async fn list_reservations(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<ReservationQuery>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&identity, Permission::ViewReservations)?;

    let filter = ReservationFilter {
        status: query
            .status
            .as_deref()
            .map(str::parse::<ReservationStatus>)
            .transpose()?,
        ..ReservationFilter::default()
    };

    let reservations = state
        .storage
        .reservations()
        .find(&filter, SortOrder::newest_first(), true)
        .await?;

    Ok(Json(json!({
        "count": reservations.len(),
        "reservations": reservations,
    })))
}

pub(super) async fn get_reservation(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&identity, Permission::ViewReservations)?;

    let reservation = state
        .storage
        .reservations()
        .find_by_id(&id, true)
        .await?
        .ok_or(ApiError::NotFound("Reservation"))?;

    Ok(Json(json!({ "reservation": reservation })))
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusRequest {
    #[serde(default)]
    status: Option<String>,
}

pub(super) async fn update_reservation(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&identity, Permission::ManageReservations)?;

    let status: ReservationStatus = body
        .status
        .ok_or_else(|| ApiError::Validation("status is required".to_string()))?
        .parse()?;

    let update = ReservationUpdate {
        status: Some(status),
        ..ReservationUpdate::default()
    };
    let reservation = state
        .storage
        .reservations()
        .update_by_id(&id, &update)
        .await?
        .ok_or(ApiError::NotFound("Reservation"))?;

    tracing::info!(
        reservation_id = %id,
        status = %status,
        by = %identity.id,
        "Reservation status changed"
    );
    Ok(Json(json!({
        "message": "Reservation updated successfully",
        "reservation": reservation,
    })))
}

pub(super) async fn delete_reservation(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&identity, Permission::ManageReservations)?;

    if !state.storage.reservations().delete_by_id(&id).await? {
        return Err(ApiError::NotFound("Reservation"));
    }

    tracing::info!(reservation_id = %id, by = %identity.id, "Reservation deleted");
    Ok(Json(json!({ "message": "Reservation deleted successfully" })))
}

pub(super) async fn list_users(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Value>, ApiError> {
    require_admin(&identity, Permission::ViewUsers)?;

    let users: Vec<_> = state
        .storage
        .users()
        .list()
        .await?
        .iter()
        .map(User::to_public)
        .collect();

    Ok(Json(json!({
        "count": users.len(),
        "users": users,
    })))
}

/// Active admins other than `except`.
async fn other_active_admins(
    users: &dyn UserRepository,
    except: &str,
) -> Result<usize, StoreError> {
    Ok(users
        .list()
        .await?
        .iter()
        .filter(|u| u.role.is_admin() && u.active && u.id != except)
        .count())
}

#[derive(Debug, Deserialize)]
pub(super) struct RoleRequest {
    #[serde(default)]
    role: Option<String>,
}

pub(super) async fn update_role(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<RoleRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&identity, Permission::UpdateUsers)?;

    let role: UserRole = body
        .role
        .ok_or_else(|| ApiError::Validation("role is required".to_string()))?
        .parse()?;

    if id == identity.id {
        return Err(ApiError::InvalidOperation(
            "You cannot change your own role".to_string(),
        ));
    }

    let users = state.storage.users();
    let mut user = users
        .find_by_id(&id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    if user.role.is_admin() || role.is_admin() {
        identity.require_permissions(&[Permission::ManageAdmins])?;
    }
    let demotes_admin = user.role.is_admin() && !role.is_admin() && user.active;
    if demotes_admin && other_active_admins(users, &user.id).await? == 0 {
        return Err(ApiError::InvalidOperation(
            "Cannot demote the last active admin".to_string(),
        ));
    }

    let previous = user.role;
    user.role = role;
    user.updated_at = Utc::now();
    users.update(&user).await?;

    tracing::info!(
        user_id = %user.id,
        from = %previous,
        to = %role,
        by = %identity.id,
        "User role changed"
    );
    Ok(Json(json!({
        "message": "User role updated successfully",
        "user": user.to_public(),
    })))
}

pub(super) async fn delete_user(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&identity, Permission::DeleteUsers)?;

    if id == identity.id {
        return Err(ApiError::InvalidOperation(
            "You cannot delete your own account".to_string(),
        ));
    }

    let users = state.storage.users();
    let user = users
        .find_by_id(&id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    if user.role.is_admin() && user.active && other_active_admins(users, &user.id).await? == 0 {
        return Err(ApiError::InvalidOperation(
            "Cannot delete the last active admin".to_string(),
        ));
    }

    if !users.delete(&id).await? {
        return Err(ApiError::NotFound("User"));
    }

    tracing::info!(user_id = %id, by = %identity.id, "User deleted");
    Ok(Json(json!({ "message": "User deleted successfully" })))
}
