//! # Reservo Core
//!
//! Core types, configuration, and storage for Reservo.
//!
//! This crate provides:
//! - Configuration loading (JSON5 file plus environment overrides)
//! - User and reservation domain types
//! - Input validation and sanitization
//! - Storage behind `UserRepository` / `ReservationRepository`, backed by
//!   either a sled document store or PostgreSQL, chosen once at start-up
//! - The append-only JSON backup of created reservations

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backup;
pub mod config;
pub mod store;
pub mod types;
pub mod validation;

pub use backup::{BackupError, ReservationBackup};
pub use config::{Config, ConfigError, Environment};
pub use store::{BackendKind, ReservationRepository, Storage, StoreError, UserRepository};
pub use types::{
    NewReservation, Owner, OwnerSummary, PublicUser, Reservation, ReservationFilter,
    ReservationStatus, ReservationUpdate, SortDirection, SortField, SortOrder, User, UserRole,
};
pub use validation::ValidationError;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::store::{ReservationRepository, Storage, UserRepository};
    pub use crate::types::*;
    pub use crate::validation::{normalize_email, sanitize_text};
}
