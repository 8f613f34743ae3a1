//! HTTP API: routes, handlers and error mapping.

mod admin;
mod auth;
pub mod error;
mod reservations;
mod users;

pub use error::{ApiError, ApiJson};

use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};

use crate::audit;
use crate::auth::authenticate;
use crate::middleware::{TrustedProxy, rate_limit};
use crate::server::AppState;

/// Build the application router.
///
/// Everything under `/api` sits behind the API rate limiter, keyed by the
/// socket peer or, with `trust_proxy`, the forwarded address. Routes that
/// need a caller are wrapped in [`authenticate`]; sensitive ones also carry
/// an audit layer inside it so the record sees the resolved identity.
pub fn router(state: AppState) -> Router {
    let recorder = &state.audit;

    let public = Router::new()
        .route(
            "/api/auth/register",
            post(auth::register).layer(from_fn_with_state(
                recorder.action("auth.register", "user"),
                audit::record,
            )),
        )
        .route(
            "/api/auth/login",
            post(auth::login).layer(from_fn_with_state(
                recorder.action("auth.login", "session"),
                audit::record,
            )),
        )
        .route("/api/auth/refresh-token", post(auth::refresh_token));

    let protected = Router::new()
        .route(
            "/api/auth/logout",
            post(auth::logout).layer(from_fn_with_state(
                recorder.action("auth.logout", "session"),
                audit::record,
            )),
        )
        .route("/api/auth/me", get(auth::me))
        .route(
            "/api/reservations",
            post(reservations::create).layer(from_fn_with_state(
                recorder.action("reservation.create", "reservation"),
                audit::record,
            )),
        )
        .route("/api/reservations/my-bookings", get(reservations::my_bookings))
        .route("/api/admin/reservations", get(admin::list_reservations))
        .route(
            "/api/admin/reservations/{id}",
            get(admin::get_reservation)
                .merge(put(admin::update_reservation).layer(from_fn_with_state(
                    recorder.action("reservation.update", "reservation"),
                    audit::record,
                )))
                .merge(delete(admin::delete_reservation).layer(from_fn_with_state(
                    recorder.action("reservation.delete", "reservation"),
                    audit::record,
                ))),
        )
        .route("/api/admin/users", get(admin::list_users))
        .route(
            "/api/admin/users/{id}/role",
            put(admin::update_role).layer(from_fn_with_state(
                recorder.action("user.role_change", "user"),
                audit::record,
            )),
        )
        .route(
            "/api/admin/users/{id}",
            delete(admin::delete_user).layer(from_fn_with_state(
                recorder.action("user.delete", "user"),
                audit::record,
            )),
        )
        .route(
            "/api/users/{id}",
            get(users::get_profile).merge(put(users::update_profile).layer(
                from_fn_with_state(recorder.action("user.update", "user"), audit::record),
            )),
        )
        .route_layer(from_fn_with_state(state.auth.clone(), authenticate));

    let api = public
        .merge(protected)
        .layer(from_fn_with_state(state.rate_limiter.clone(), rate_limit));

    let app = Router::new().route("/health", get(health)).merge(api);
    let app = if state.trust_proxy {
        app.layer(Extension(TrustedProxy))
    } else {
        app
    };
    app.with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "backend": state.storage.kind(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
