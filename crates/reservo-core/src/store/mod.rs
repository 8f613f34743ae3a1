//! Storage for users and reservations.
//!
//! Two implementations sit behind [`UserRepository`] and
//! [`ReservationRepository`]: a sled document store and a PostgreSQL store.
//! [`Storage::connect`] picks one once, before the server starts, and the
//! choice holds for the life of the process.

mod document;
mod relational;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::types::{
    NewReservation, Reservation, ReservationFilter, ReservationUpdate, SortOrder, User,
};

pub use document::DocumentStore;
pub use relational::PgStore;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique key is already taken.
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Record not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend failure.
    #[error("Storage error: {0}")]
    Backend(String),

    /// Stored data could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data violates the domain model.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// The backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Which backend won the start-up probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Embedded sled document store.
    Document,
    /// PostgreSQL.
    Relational,
}

impl BackendKind {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Relational => "relational",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with `Duplicate` if the email is taken.
    async fn create(&self, user: &User) -> Result<(), StoreError>;

    /// Look up by ID.
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Look up by email (case-insensitive).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// All users, oldest first.
    async fn list(&self) -> Result<Vec<User>, StoreError>;

    /// Replace a stored user. Fails with `NotFound` or, on an email clash,
    /// `Duplicate`.
    async fn update(&self, user: &User) -> Result<(), StoreError>;

    /// Delete by ID. Returns whether a user was removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Number of users.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Reservation persistence.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Insert a new reservation with status `confirmed`.
    async fn create(&self, new: NewReservation) -> Result<Reservation, StoreError>;

    /// Query reservations, optionally replacing the owner ID with
    /// `{id, name, email}`.
    async fn find(
        &self,
        filter: &ReservationFilter,
        sort: SortOrder,
        populate_owner: bool,
    ) -> Result<Vec<Reservation>, StoreError>;

    /// Look up by ID.
    async fn find_by_id(
        &self,
        id: &str,
        populate_owner: bool,
    ) -> Result<Option<Reservation>, StoreError>;

    /// Apply a partial update. Returns the updated reservation, or `None`
    /// if it does not exist.
    async fn update_by_id(
        &self,
        id: &str,
        update: &ReservationUpdate,
    ) -> Result<Option<Reservation>, StoreError>;

    /// Delete by ID. Returns whether a reservation was removed.
    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError>;
}

/// The storage handle chosen at start-up.
#[derive(Clone)]
pub struct Storage {
    kind: BackendKind,
    users: Arc<dyn UserRepository>,
    reservations: Arc<dyn ReservationRepository>,
}

impl Storage {
    /// Probe PostgreSQL (when configured) and fall back to the document
    /// store at the configured data directory.
    ///
    /// # Errors
    ///
    /// Returns error only if the fallback document store cannot be opened.
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        if let Some(url) = &config.database.url {
            match PgStore::connect(
                url,
                config.database.probe_timeout(),
                config.database.max_connections,
            )
            .await
            {
                Ok(store) => {
                    tracing::info!(backend = %BackendKind::Relational, "Connected to PostgreSQL");
                    let store = Arc::new(store);
                    return Ok(Self::from_parts(
                        BackendKind::Relational,
                        store.clone(),
                        store,
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "PostgreSQL unavailable, using document store");
                }
            }
        } else {
            tracing::debug!("No database URL configured");
        }

        let storage = Self::open_document(&config.data_dir())?;
        tracing::info!(backend = %BackendKind::Document, path = %config.data_dir().display(), "Opened document store");
        Ok(storage)
    }

    /// Open the sled document store at `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened.
    pub fn open_document(path: &Path) -> Result<Self, StoreError> {
        let store = Arc::new(DocumentStore::open(path)?);
        Ok(Self::from_parts(BackendKind::Document, store.clone(), store))
    }

    /// Assemble a handle from explicit repositories.
    #[must_use]
    pub fn from_parts(
        kind: BackendKind,
        users: Arc<dyn UserRepository>,
        reservations: Arc<dyn ReservationRepository>,
    ) -> Self {
        Self {
            kind,
            users,
            reservations,
        }
    }

    /// Active backend.
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        self.kind
    }

    /// User repository.
    #[must_use]
    pub fn users(&self) -> &dyn UserRepository {
        self.users.as_ref()
    }

    /// Reservation repository.
    #[must_use]
    pub fn reservations(&self) -> &dyn ReservationRepository {
        self.reservations.as_ref()
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").field("kind", &self.kind).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connect_without_url_uses_document_store() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = Some(dir.path().to_path_buf());

        let storage = Storage::connect(&config).await.unwrap();
        assert_eq!(storage.kind(), BackendKind::Document);
        assert_eq!(storage.users().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_database_falls_back() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = Some(dir.path().to_path_buf());
        config.database.url = Some(SecretString::from(
            "postgres://nobody@127.0.0.1:1/none".to_string(),
        ));
        config.database.probe_timeout_secs = 1;

        let storage = Storage::connect(&config).await.unwrap();
        assert_eq!(storage.kind(), BackendKind::Document);
    }

    #[test]
    fn test_backend_kind_names() {
        assert_eq!(BackendKind::Document.to_string(), "document");
        assert_eq!(
            serde_json::to_value(BackendKind::Relational).unwrap(),
            "relational"
        );
    }
}
