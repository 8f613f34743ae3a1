//! Reservation endpoints for signed-in users.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{NaiveDate, Utc};
use reservo_core::validation::{
    normalize_email, sanitize_optional, sanitize_text, validate_booking_date, validate_time,
};
use reservo_core::{NewReservation, ReservationFilter, SortOrder};
use serde::Deserialize;
use serde_json::{Value, json};
use validator::Validate;

use super::{ApiError, ApiJson};
use crate::auth::{Identity, Permission};
use crate::mail;
use crate::server::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateReservationRequest {
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    name: String,
    #[validate(email(message = "must be a valid email address"))]
    email: String,
    #[validate(length(min = 1, max = 30, message = "phone is required"))]
    phone: String,
    date: NaiveDate,
    time: String,
    #[validate(range(min = 1, max = 20, message = "guests must be between 1 and 20"))]
    guests: u32,
    #[validate(length(max = 500))]
    special_requests: Option<String>,
    #[validate(length(max = 100))]
    venue_name: Option<String>,
    #[validate(length(max = 200))]
    venue_location: Option<String>,
}

impl CreateReservationRequest {
    fn into_new(self, user_id: String) -> Result<NewReservation, ApiError> {
        self.validate()?;
        validate_time(&self.time)?;
        validate_booking_date(self.date, Utc::now().date_naive())?;

        let name = sanitize_text(&self.name);
        let phone = sanitize_text(&self.phone);
        if name.is_empty() || phone.is_empty() {
            return Err(ApiError::Validation(
                "name and phone must not be blank".to_string(),
            ));
        }

        Ok(NewReservation {
            user_id,
            name,
            email: normalize_email(&self.email),
            phone,
            date: self.date,
            time: self.time,
            guests: self.guests,
            special_requests: sanitize_optional(self.special_requests.as_deref()),
            venue_name: sanitize_optional(self.venue_name.as_deref()),
            venue_location: sanitize_optional(self.venue_location.as_deref()),
        })
    }
}

pub(super) async fn create(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<CreateReservationRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    identity.require_permissions(&[Permission::CreateReservations])?;

    let new = body.into_new(identity.id.clone())?;
    let reservation = state.storage.reservations().create(new).await?;

    if let Err(e) = state.backup.append(&reservation).await {
        tracing::warn!(
            reservation_id = %reservation.id,
            error = %e,
            "Failed to append reservation backup"
        );
    }

    mail::send_in_background(
        state.mailer.clone(),
        mail::reservation_confirmation(&state.mail_from, &reservation),
    );

    tracing::info!(
        reservation_id = %reservation.id,
        user_id = %identity.id,
        date = %reservation.date,
        guests = reservation.guests,
        "Reservation created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Reservation created successfully",
            "reservation": reservation,
        })),
    ))
}

pub(super) async fn my_bookings(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Value>, ApiError> {
    let reservations = state
        .storage
        .reservations()
        .find(
            &ReservationFilter::owned_by(identity.id),
            SortOrder::newest_first(),
            false,
        )
        .await?;

    Ok(Json(json!({
        "count": reservations.len(),
        "reservations": reservations,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn request(date: NaiveDate) -> CreateReservationRequest {
        CreateReservationRequest {
            name: "  Grace\u{0007} Hopper ".to_string(),
            email: "Grace@Example.com".to_string(),
            phone: "555-0199".to_string(),
            date,
            time: "18:30".to_string(),
            guests: 4,
            special_requests: Some("   ".to_string()),
            venue_name: Some("Main Hall".to_string()),
            venue_location: None,
        }
    }

    fn tomorrow() -> NaiveDate {
        Utc::now().date_naive() + Days::new(1)
    }

    #[test]
    fn test_into_new_sanitizes() {
        let new = request(tomorrow()).into_new("u1".to_string()).unwrap();
        assert_eq!(new.name, "Grace Hopper");
        assert_eq!(new.email, "grace@example.com");
        assert_eq!(new.special_requests, None);
        assert_eq!(new.venue_name.as_deref(), Some("Main Hall"));
        assert_eq!(new.user_id, "u1");
    }

    #[test]
    fn test_into_new_rejects_bad_input() {
        let mut too_many = request(tomorrow());
        too_many.guests = 21;
        assert!(matches!(
            too_many.into_new("u1".to_string()),
            Err(ApiError::Validation(_))
        ));

        let mut bad_time = request(tomorrow());
        bad_time.time = "7pm".to_string();
        assert!(matches!(
            bad_time.into_new("u1".to_string()),
            Err(ApiError::Validation(_))
        ));

        let past = request(Utc::now().date_naive() - Days::new(1));
        assert!(matches!(
            past.into_new("u1".to_string()),
            Err(ApiError::Validation(_))
        ));
    }
}
