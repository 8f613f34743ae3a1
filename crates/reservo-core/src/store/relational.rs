//! PostgreSQL store.
//!
//! Columns are snake_case; rows are mapped back into the same camelCase
//! domain types the document store produces. Every mutation stamps
//! `updated_at = NOW()`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};

use super::{ReservationRepository, StoreError, UserRepository};
use crate::types::{
    NewReservation, Owner, OwnerSummary, Reservation, ReservationFilter, ReservationUpdate,
    SortDirection, SortField, SortOrder, User,
};

const SCHEMA: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin', 'manager')),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        last_login TIMESTAMPTZ,
        login_attempts INTEGER NOT NULL DEFAULT 0,
        lock_until TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    r#"CREATE TABLE IF NOT EXISTS reservations (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT NOT NULL,
        "date" DATE NOT NULL,
        "time" TEXT NOT NULL,
        guests INTEGER NOT NULL CHECK (guests > 0),
        special_requests TEXT,
        venue_name TEXT,
        venue_location TEXT,
        status TEXT NOT NULL DEFAULT 'confirmed'
            CHECK (status IN ('confirmed', 'cancelled', 'completed')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    "CREATE INDEX IF NOT EXISTS reservations_user_id_idx ON reservations (user_id)",
];

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect, probe with `SELECT 1` and create the schema.
    ///
    /// The whole probe is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the server cannot be reached in time, or a
    /// backend error if the schema cannot be created.
    pub async fn connect(
        url: &SecretString,
        timeout: Duration,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        let probe = async {
            let pool = PgPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(timeout)
                .connect(url.expose_secret())
                .await?;
            sqlx::query("SELECT 1").execute(&pool).await?;
            Ok::<_, sqlx::Error>(pool)
        };

        let pool = tokio::time::timeout(timeout, probe)
            .await
            .map_err(|_| StoreError::Unavailable(format!("no answer within {timeout:?}")))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Wrap an existing pool without probing.
    #[must_use]
    pub const fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if missing.
    ///
    /// # Errors
    ///
    /// Returns error if a statement fails.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx(e, "schema"))?;
        }
        tracing::debug!("PostgreSQL schema ready");
        Ok(())
    }
}

fn map_sqlx(err: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Duplicate(what.to_string());
        }
    }
    StoreError::Backend(err.to_string())
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    is_active: bool,
    last_login: Option<DateTime<Utc>>,
    login_attempts: i32,
    lock_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role: row
                .role
                .parse()
                .map_err(|e| StoreError::InvalidData(format!("user {}: {e}", row.id)))?,
            login_attempts: u32::try_from(row.login_attempts).unwrap_or(0),
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            active: row.is_active,
            last_login: row.last_login,
            lock_until: row.lock_until,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReservationRow {
    id: String,
    user_id: String,
    name: String,
    email: String,
    phone: String,
    date: NaiveDate,
    time: String,
    guests: i32,
    special_requests: Option<String>,
    venue_name: Option<String>,
    venue_location: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[sqlx(default)]
    owner_name: Option<String>,
    #[sqlx(default)]
    owner_email: Option<String>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = StoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let invalid = |e: String| StoreError::InvalidData(format!("reservation {}: {e}", row.id));
        let status = row.status.parse().map_err(|e| invalid(format!("{e}")))?;
        let guests = u32::try_from(row.guests).map_err(|e| invalid(e.to_string()))?;

        let user = match (row.owner_name, row.owner_email) {
            (Some(name), Some(email)) => Owner::Populated(OwnerSummary {
                id: row.user_id,
                name,
                email,
            }),
            _ => Owner::Id(row.user_id),
        };

        Ok(Self {
            id: row.id,
            user,
            name: row.name,
            email: row.email,
            phone: row.phone,
            date: row.date,
            time: row.time,
            guests,
            special_requests: row.special_requests,
            venue_name: row.venue_name,
            venue_location: row.venue_location,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn select_reservations(populate_owner: bool) -> QueryBuilder<'static, Postgres> {
    if populate_owner {
        QueryBuilder::new(
            "SELECT r.*, u.name AS owner_name, u.email AS owner_email \
             FROM reservations r LEFT JOIN users u ON u.id = r.user_id",
        )
    } else {
        QueryBuilder::new("SELECT r.* FROM reservations r")
    }
}

fn find_query(
    filter: &ReservationFilter,
    sort: SortOrder,
    populate_owner: bool,
) -> QueryBuilder<'static, Postgres> {
    let mut query = select_reservations(populate_owner);

    let mut separator = " WHERE ";
    if let Some(user_id) = &filter.user_id {
        query.push(separator).push("r.user_id = ").push_bind(user_id.clone());
        separator = " AND ";
    }
    if let Some(status) = filter.status {
        query.push(separator).push("r.status = ").push_bind(status.as_str());
        separator = " AND ";
    }
    if let Some(date) = filter.date {
        query.push(separator).push("r.\"date\" = ").push_bind(date);
    }

    let direction = match sort.direction {
        SortDirection::Ascending => "ASC",
        SortDirection::Descending => "DESC",
    };
    match sort.field {
        SortField::CreatedAt => {
            query.push(format_args!(" ORDER BY r.created_at {direction}"));
        }
        SortField::Date => {
            query.push(format_args!(
                " ORDER BY r.\"date\" {direction}, r.\"time\" {direction}"
            ));
        }
    }
    query
}

fn update_query(id: &str, update: &ReservationUpdate) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new("UPDATE reservations SET updated_at = NOW()");
    if let Some(status) = update.status {
        query.push(", status = ").push_bind(status.as_str());
    }
    if let Some(date) = update.date {
        query.push(", \"date\" = ").push_bind(date);
    }
    if let Some(time) = &update.time {
        query.push(", \"time\" = ").push_bind(time.clone());
    }
    if let Some(guests) = update.guests {
        query.push(", guests = ").push_bind(to_i32(guests));
    }
    query.push(" WHERE id = ").push_bind(id.to_string());
    query.push(" RETURNING *");
    query
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, is_active, last_login, \
             login_attempts, lock_until, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.active)
        .bind(user.last_login)
        .bind(to_i32(user.login_attempts))
        .bind(user.lock_until)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx(e, &format!("email {}", user.email)))?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "user"))?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(crate::validation::normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "user"))?
            .map(User::try_from)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "users"))?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET name = $1, email = $2, password_hash = $3, role = $4, \
             is_active = $5, last_login = $6, login_attempts = $7, lock_until = $8, \
             updated_at = NOW() WHERE id = $9",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.active)
        .bind(user.last_login)
        .bind(to_i32(user.login_attempts))
        .bind(user.lock_until)
        .bind(&user.id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx(e, &format!("email {}", user.email)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "user"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "users"))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

/// Current time at `TIMESTAMPTZ` precision, so returned values match what a
/// later read gives back.
fn db_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[async_trait]
impl ReservationRepository for PgStore {
    async fn create(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        let reservation = Reservation::from_new(new, db_now());
        sqlx::query(
            "INSERT INTO reservations (id, user_id, name, email, phone, \"date\", \"time\", \
             guests, special_requests, venue_name, venue_location, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(&reservation.id)
        .bind(reservation.user.id())
        .bind(&reservation.name)
        .bind(&reservation.email)
        .bind(&reservation.phone)
        .bind(reservation.date)
        .bind(&reservation.time)
        .bind(to_i32(reservation.guests))
        .bind(&reservation.special_requests)
        .bind(&reservation.venue_name)
        .bind(&reservation.venue_location)
        .bind(reservation.status.as_str())
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx(e, "reservation"))?;
        Ok(reservation)
    }

    async fn find(
        &self,
        filter: &ReservationFilter,
        sort: SortOrder,
        populate_owner: bool,
    ) -> Result<Vec<Reservation>, StoreError> {
        find_query(filter, sort, populate_owner)
            .build_query_as::<ReservationRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "reservations"))?
            .into_iter()
            .map(Reservation::try_from)
            .collect()
    }

    async fn find_by_id(
        &self,
        id: &str,
        populate_owner: bool,
    ) -> Result<Option<Reservation>, StoreError> {
        let mut query = select_reservations(populate_owner);
        query.push(" WHERE r.id = ").push_bind(id.to_string());
        query
            .build_query_as::<ReservationRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "reservation"))?
            .map(Reservation::try_from)
            .transpose()
    }

    async fn update_by_id(
        &self,
        id: &str,
        update: &ReservationUpdate,
    ) -> Result<Option<Reservation>, StoreError> {
        update_query(id, update)
            .build_query_as::<ReservationRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "reservation"))?
            .map(Reservation::try_from)
            .transpose()
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx(e, "reservation"))?;
        Ok(result.rows_affected() > 0)
    }
}
