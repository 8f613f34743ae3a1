//! Append-only JSON backup of created reservations.
//!
//! The file holds one flat JSON array. Each append reads the whole file,
//! pushes the new record and rewrites it through a temporary file. There is
//! no rotation.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::types::Reservation;

/// Backup errors.
#[derive(Error, Debug)]
pub enum BackupError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The existing file is not a JSON array of reservations.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialized writer for the backup file.
#[derive(Debug)]
pub struct ReservationBackup {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ReservationBackup {
    /// Create a writer for `path`. The file is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backup file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one reservation.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or written.
    pub async fn append(&self, reservation: &Reservation) -> Result<(), BackupError> {
        let _guard = self.lock.lock().await;

        let mut records = self.read_records().await?;
        records.push(serde_json::to_value(reservation)?);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&records)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), count = records.len(), "Reservation backed up");
        Ok(())
    }

    /// Read every backed-up record.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub async fn load(&self) -> Result<Vec<Reservation>, BackupError> {
        let _guard = self.lock.lock().await;
        let records = self.read_records().await?;
        Ok(records
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()?)
    }

    async fn read_records(&self) -> Result<Vec<serde_json::Value>, BackupError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}
