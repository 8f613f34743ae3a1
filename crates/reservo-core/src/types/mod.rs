//! Domain types: users, roles, reservations and query shapes.
//!
//! The JSON shape of these types is the external contract. It is camelCase
//! and identical no matter which storage backend produced the value.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// Generate a new opaque identifier.
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// User role for access control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular customer.
    #[default]
    User,
    /// Full administrative access.
    Admin,
    /// Can view users and manage reservations.
    Manager,
}

impl UserRole {
    /// All roles, in privilege order.
    pub const ALL: [Self; 3] = [Self::User, Self::Manager, Self::Admin];

    /// Check if this role has admin privileges.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Manager => "manager",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            _ => Err(ValidationError::InvalidRole(s.to_string())),
        }
    }
}

/// User account as stored by either backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Lowercase, unique email address.
    pub email: String,
    /// Password hash in PHC string format.
    pub password_hash: String,
    /// User role.
    pub role: UserRole,
    /// Whether the account is active.
    #[serde(rename = "isActive")]
    pub active: bool,
    /// When the user last logged in.
    pub last_login: Option<DateTime<Utc>>,
    /// Consecutive failed logins.
    #[serde(default)]
    pub login_attempts: u32,
    /// Locked until this instant, if set.
    #[serde(default)]
    pub lock_until: Option<DateTime<Utc>>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last modified.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active user from an already-computed password hash.
    ///
    /// The email is stored lowercase.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: &str,
        password_hash: impl Into<String>,
        role: UserRole,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            email: crate::validation::normalize_email(email),
            password_hash: password_hash.into(),
            role,
            active: true,
            last_login: None,
            login_attempts: 0,
            lock_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the account is locked at `now`.
    #[must_use]
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until > now)
    }

    /// Create a safe version of user for API responses.
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            active: self.active,
            last_login: self.last_login,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Public user representation. Never carries credentials or lockout state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    /// Unique user ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// User role.
    pub role: UserRole,
    /// Whether active.
    #[serde(rename = "isActive")]
    pub active: bool,
    /// Last login time.
    pub last_login: Option<DateTime<Utc>>,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// When last modified.
    pub updated_at: DateTime<Utc>,
}

/// Reservation lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Booked and expected.
    #[default]
    Confirmed,
    /// Cancelled by staff.
    Cancelled,
    /// The visit took place.
    Completed,
}

impl ReservationStatus {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            _ => Err(ValidationError::InvalidStatus(s.to_string())),
        }
    }
}

/// Owner summary used when a reservation is read with owner population.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    /// Owner user ID.
    pub id: String,
    /// Owner name.
    pub name: String,
    /// Owner email.
    pub email: String,
}

/// Reference to the owning user: a bare ID, or the populated summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Owner {
    /// Owner summary.
    Populated(OwnerSummary),
    /// Opaque user ID.
    Id(String),
}

impl Owner {
    /// The owning user's ID.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Populated(summary) => &summary.id,
            Self::Id(id) => id,
        }
    }
}

/// A booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    /// Unique reservation ID.
    pub id: String,
    /// Owning user.
    pub user: Owner,
    /// Contact name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Contact phone.
    pub phone: String,
    /// Booking date.
    pub date: NaiveDate,
    /// Booking time, `HH:MM`.
    pub time: String,
    /// Number of guests.
    pub guests: u32,
    /// Free-text requests.
    pub special_requests: Option<String>,
    /// Venue name.
    pub venue_name: Option<String>,
    /// Venue location.
    pub venue_location: Option<String>,
    /// Lifecycle status.
    pub status: ReservationStatus,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// When last modified.
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Build a confirmed reservation from creation input.
    #[must_use]
    pub fn from_new(new: NewReservation, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            user: Owner::Id(new.user_id),
            name: new.name,
            email: new.email,
            phone: new.phone,
            date: new.date,
            time: new.time,
            guests: new.guests,
            special_requests: new.special_requests,
            venue_name: new.venue_name,
            venue_location: new.venue_location,
            status: ReservationStatus::Confirmed,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update and stamp `updated_at`.
    pub fn apply(&mut self, update: &ReservationUpdate, now: DateTime<Utc>) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(date) = update.date {
            self.date = date;
        }
        if let Some(time) = &update.time {
            self.time.clone_from(time);
        }
        if let Some(guests) = update.guests {
            self.guests = guests;
        }
        self.updated_at = now;
    }
}

/// Input for creating a reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    /// Owning user ID.
    pub user_id: String,
    /// Contact name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Contact phone.
    pub phone: String,
    /// Booking date.
    pub date: NaiveDate,
    /// Booking time, `HH:MM`.
    pub time: String,
    /// Number of guests.
    pub guests: u32,
    /// Free-text requests.
    pub special_requests: Option<String>,
    /// Venue name.
    pub venue_name: Option<String>,
    /// Venue location.
    pub venue_location: Option<String>,
}

/// Partial update of a reservation. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationUpdate {
    /// New status.
    pub status: Option<ReservationStatus>,
    /// New date.
    pub date: Option<NaiveDate>,
    /// New time.
    pub time: Option<String>,
    /// New guest count.
    pub guests: Option<u32>,
}

impl ReservationUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none() && self.date.is_none() && self.time.is_none() && self.guests.is_none()
    }
}

/// Reservation query filter. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationFilter {
    /// Only reservations owned by this user.
    pub user_id: Option<String>,
    /// Only reservations in this status.
    pub status: Option<ReservationStatus>,
    /// Only reservations on this date.
    pub date: Option<NaiveDate>,
}

impl ReservationFilter {
    /// Filter by owner.
    #[must_use]
    pub fn owned_by(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Check a reservation against the filter.
    #[must_use]
    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.user_id
            .as_deref()
            .is_none_or(|id| reservation.user.id() == id)
            && self.status.is_none_or(|s| reservation.status == s)
            && self.date.is_none_or(|d| reservation.date == d)
    }
}

/// Field to sort reservations by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    /// Creation time.
    #[default]
    CreatedAt,
    /// Booking date, then time.
    Date,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    #[default]
    Descending,
}

/// Sort order for reservation queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortOrder {
    /// Sort key.
    pub field: SortField,
    /// Direction.
    pub direction: SortDirection,
}

impl SortOrder {
    /// Newest first.
    #[must_use]
    pub const fn newest_first() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Descending,
        }
    }

    /// Earliest booking first.
    #[must_use]
    pub const fn upcoming_first() -> Self {
        Self {
            field: SortField::Date,
            direction: SortDirection::Ascending,
        }
    }

    /// Compare two reservations under this order.
    #[must_use]
    pub fn compare(&self, a: &Reservation, b: &Reservation) -> Ordering {
        let ordering = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Date => a.date.cmp(&b.date).then_with(|| a.time.cmp(&b.time)),
        };
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}
