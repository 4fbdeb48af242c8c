//! Per-member reporting: borrowing history, open loans and the fine ledger.
//!
//! All three follow the same access rule as the inbox: members query
//! themselves, librarians query anyone.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::access::{Actor, Role};
use crate::database::Db;
use crate::database::types::FineRecord;
use crate::errors::{LibraryError, LibraryResult};

/// One loan, open or closed, in a member's history.
#[derive(Serialize, Debug, Clone, sqlx::FromRow)]
pub struct HistoryEntry {
    pub loan_id: i64,
    pub book_title: String,
    pub checkout_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub fine_amount: f64,
}

/// One book a member currently has out.
#[derive(Serialize, Debug, Clone, sqlx::FromRow)]
pub struct CheckedOutEntry {
    pub loan_id: i64,
    pub book_title: String,
    pub checkout_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

impl Db {
    /// Every loan the user ever took, oldest first.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per report"
    )]
    pub async fn borrowing_history(
        &self,
        actor: Actor,
        user_id: i64,
    ) -> LibraryResult<Vec<HistoryEntry>> {
        self.check_report_access(actor, user_id).await?;
        Ok(sqlx::query_as::<_, HistoryEntry>(
            "SELECT l.id AS loan_id, b.title AS book_title, l.checkout_date AS checkout_date,
                    l.due_date AS due_date, l.return_date AS return_date,
                    l.fine_amount AS fine_amount
             FROM loans l
             JOIN book_copies c ON c.id = l.book_copy_id
             JOIN books b ON b.id = c.book_id
             WHERE l.user_id = ? ORDER BY l.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// The user's open loans.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per report"
    )]
    pub async fn checked_out_books(
        &self,
        actor: Actor,
        user_id: i64,
    ) -> LibraryResult<Vec<CheckedOutEntry>> {
        self.check_report_access(actor, user_id).await?;
        Ok(sqlx::query_as::<_, CheckedOutEntry>(
            "SELECT l.id AS loan_id, b.title AS book_title, l.checkout_date AS checkout_date,
                    l.due_date AS due_date
             FROM loans l
             JOIN book_copies c ON c.id = l.book_copy_id
             JOIN books b ON b.id = c.book_id
             WHERE l.user_id = ? AND l.return_date IS NULL ORDER BY l.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// The user's fine ledger, oldest first.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called rarely"
    )]
    pub async fn fines_for(&self, actor: Actor, user_id: i64) -> LibraryResult<Vec<FineRecord>> {
        self.check_report_access(actor, user_id).await?;
        Ok(sqlx::query_as::<_, FineRecord>(
            "SELECT id, user_id, loan_id, amount, status FROM fines WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn check_report_access(&self, actor: Actor, user_id: i64) -> LibraryResult<()> {
        if !actor.may_view(user_id) {
            return Err(LibraryError::Forbidden(Role::Librarian));
        }
        if self.user_by_id(user_id).await?.is_none() {
            return Err(LibraryError::NotFound("user"));
        }
        Ok(())
    }
}
