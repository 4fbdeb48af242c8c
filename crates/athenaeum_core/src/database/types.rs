//! Row types and input events.
//!
//! Records mirror table rows one to one and decode straight out of queries.
//! The `New*` structs carry caller input into the engine; views are the
//! shapes handed back to shells, which is why views serialize and
//! [`UserRecord`] (holding the password hash) does not.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::access::Role;

/// Full `users` row. Internal; shells receive [`UserView`] instead.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub barcode: String,
    pub created_at: DateTime<Utc>,
}

/// What the desk sees when looking a user up.
#[derive(Serialize, Debug, Deserialize, Clone, sqlx::FromRow)]
pub struct UserView {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub barcode: String,
}

/// One `books` row.
#[derive(Serialize, Debug, Deserialize, Clone, sqlx::FromRow)]
pub struct BookRecord {
    pub id: i64,
    pub barcode: String,
    pub title: String,
    pub author: String,
    pub subject_category: String,
    pub publication_date: NaiveDate,
}

/// Catalog listing entry: the book plus its live availability counts.
#[derive(Serialize, Debug, Deserialize, Clone, sqlx::FromRow)]
pub struct BookView {
    pub barcode: String,
    pub title: String,
    pub author: String,
    pub subject_category: String,
    pub publication_date: NaiveDate,
    pub total_copies: i64,
    pub available_copies: i64,
}

/// One physical copy of a book.
#[derive(Serialize, Debug, Deserialize, Clone, sqlx::FromRow)]
pub struct CopyRecord {
    pub id: i64,
    pub book_id: i64,
    pub rack_location: String,
    pub is_available: bool,
}

/// One `loans` row. `return_date` is NULL while the loan is open.
#[derive(Serialize, Debug, Deserialize, Clone, sqlx::FromRow)]
pub struct LoanRecord {
    pub id: i64,
    pub user_id: i64,
    pub book_copy_id: i64,
    pub checkout_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub fine_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum ReservationStatus {
    Pending,
    Fulfilled,
    Cancelled,
}

impl ReservationStatus {
    /// Lower-case label used in desk-facing messages.
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One `reservations` row.
#[derive(Serialize, Debug, Deserialize, Clone, sqlx::FromRow)]
pub struct ReservationRecord {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub reservation_date: DateTime<Utc>,
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum FineStatus {
    Unpaid,
    Paid,
}

/// Ledger entry written when a loan comes back late. `loan_id` goes NULL if
/// the loan row is later purged; the debt record survives.
#[derive(Serialize, Debug, Deserialize, Clone, sqlx::FromRow)]
pub struct FineRecord {
    pub id: i64,
    pub user_id: i64,
    pub loan_id: Option<i64>,
    pub amount: f64,
    pub status: FineStatus,
}

/// One inbox entry. Append-only; nothing ever updates or removes these.
#[derive(Serialize, Debug, Deserialize, Clone, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: i64,
    pub user_id: i64,
    pub subject: String,
    pub body: String,
    pub book_title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Registration input for [`crate::membership`].
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl NewUser {
    #[inline]
    #[must_use]
    pub const fn new(name: String, email: String, password: String, role: Role) -> Self {
        Self {
            name,
            email,
            password,
            role,
        }
    }
}

/// Catalog input for [`crate::catalog`].
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub subject_category: String,
    pub publication_date: NaiveDate,
}

impl NewBook {
    #[inline]
    #[must_use]
    pub const fn new(
        title: String,
        author: String,
        subject_category: String,
        publication_date: NaiveDate,
    ) -> Self {
        Self {
            title,
            author,
            subject_category,
            publication_date,
        }
    }
}

/// Partial book edit; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject_category: Option<String>,
    pub publication_date: Option<NaiveDate>,
}

/// Partial copy edit; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct CopyUpdate {
    pub rack_location: Option<String>,
    pub is_available: Option<bool>,
}
