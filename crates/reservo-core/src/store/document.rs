//! sled-backed document store.
//!
//! Users and reservations are JSON documents in two trees. The `users` tree
//! also holds an `idx:email:<email>` → id index that enforces email
//! uniqueness.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;

use super::{ReservationRepository, StoreError, UserRepository};
use crate::types::{
    NewReservation, Owner, OwnerSummary, Reservation, ReservationFilter, ReservationUpdate,
    SortOrder, User,
};

const INDEX_PREFIX: &[u8] = b"idx:";

fn email_key(email: &str) -> String {
    format!("idx:email:{email}")
}

/// Document store backed by sled.
pub struct DocumentStore {
    db: sled::Db,
    users: sled::Tree,
    reservations: sled::Tree,
}

impl DocumentStore {
    /// Open or create a store at the given directory.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::with_db(db)
    }

    /// Create a store over an existing sled database.
    ///
    /// # Errors
    ///
    /// Returns error if the trees cannot be opened.
    pub fn with_db(db: sled::Db) -> Result<Self, StoreError> {
        let users = db.open_tree("users")?;
        let reservations = db.open_tree("reservations")?;
        Ok(Self {
            db,
            users,
            reservations,
        })
    }

    /// Flush all pending writes.
    ///
    /// # Errors
    ///
    /// Returns error if the flush fails.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        match self.users.get(id.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn get_reservation(&self, id: &str) -> Result<Option<Reservation>, StoreError> {
        match self.reservations.get(id.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn put_reservation(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let value = serde_json::to_vec(reservation)?;
        self.reservations.insert(reservation.id.as_bytes(), value)?;
        self.reservations.flush()?;
        Ok(())
    }

    /// Claim the email index entry for `id`.
    fn claim_email(&self, email: &str, id: &str) -> Result<(), StoreError> {
        let claimed = self.users.compare_and_swap(
            email_key(email).as_bytes(),
            None as Option<&[u8]>,
            Some(id.as_bytes()),
        )?;
        claimed.map_err(|_| StoreError::Duplicate(format!("email {email}")))
    }

    fn populate(&self, mut reservation: Reservation) -> Result<Reservation, StoreError> {
        if let Owner::Id(owner_id) = &reservation.user {
            if let Some(owner) = self.get_user(owner_id)? {
                reservation.user = Owner::Populated(OwnerSummary {
                    id: owner.id,
                    name: owner.name,
                    email: owner.email,
                });
            }
        }
        Ok(reservation)
    }
}

#[async_trait]
impl UserRepository for DocumentStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        self.claim_email(&user.email, &user.id)?;

        let value = serde_json::to_vec(user)?;
        self.users.insert(user.id.as_bytes(), value)?;
        self.users.flush()?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.get_user(id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = crate::validation::normalize_email(email);
        match self.users.get(email_key(&email).as_bytes())? {
            Some(id) => self.get_user(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let mut users = Vec::new();
        for result in self.users.iter() {
            let (key, value) = result?;
            // Skip index entries
            if key.starts_with(INDEX_PREFIX) {
                continue;
            }
            users.push(serde_json::from_slice::<User>(&value)?);
        }
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let existing = self
            .get_user(&user.id)?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user.id)))?;

        if existing.email != user.email {
            self.claim_email(&user.email, &user.id)?;
            self.users.remove(email_key(&existing.email).as_bytes())?;
        }

        let value = serde_json::to_vec(user)?;
        self.users.insert(user.id.as_bytes(), value)?;
        self.users.flush()?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        if let Some(user) = self.get_user(id)? {
            self.users.remove(email_key(&user.email).as_bytes())?;
        }
        let removed = self.users.remove(id.as_bytes())?.is_some();
        self.users.flush()?;
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let mut count = 0;
        for result in self.users.iter().keys() {
            if !result?.starts_with(INDEX_PREFIX) {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl ReservationRepository for DocumentStore {
    async fn create(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        let reservation = Reservation::from_new(new, Utc::now());
        self.put_reservation(&reservation)?;
        Ok(reservation)
    }

    async fn find(
        &self,
        filter: &ReservationFilter,
        sort: SortOrder,
        populate_owner: bool,
    ) -> Result<Vec<Reservation>, StoreError> {
        let mut found = Vec::new();
        for result in self.reservations.iter() {
            let (_, value) = result?;
            let reservation: Reservation = serde_json::from_slice(&value)?;
            if filter.matches(&reservation) {
                found.push(reservation);
            }
        }
        found.sort_by(|a, b| sort.compare(a, b));

        if populate_owner {
            found = found
                .into_iter()
                .map(|r| self.populate(r))
                .collect::<Result<_, _>>()?;
        }
        Ok(found)
    }

    async fn find_by_id(
        &self,
        id: &str,
        populate_owner: bool,
    ) -> Result<Option<Reservation>, StoreError> {
        match self.get_reservation(id)? {
            Some(r) if populate_owner => Ok(Some(self.populate(r)?)),
            other => Ok(other),
        }
    }

    async fn update_by_id(
        &self,
        id: &str,
        update: &ReservationUpdate,
    ) -> Result<Option<Reservation>, StoreError> {
        let Some(mut reservation) = self.get_reservation(id)? else {
            return Ok(None);
        };
        reservation.apply(update, Utc::now());
        self.put_reservation(&reservation)?;
        Ok(Some(reservation))
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let removed = self.reservations.remove(id.as_bytes())?.is_some();
        self.reservations.flush()?;
        Ok(removed)
    }
}
