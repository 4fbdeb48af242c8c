//! The borrowing lifecycle: issue, self-checkout, return, renew and the
//! overdue scan.
//!
//! Mutations run inside one transaction per operation. Availability flips
//! and the loan cap are enforced by guarded statements whose row counts are
//! checked, so two desks racing over the last copy cannot both win; the
//! loser's transaction rolls back on drop.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::access::{Action, Actor};
use crate::database::Db;
use crate::database::types::{LoanRecord, UserRecord};
use crate::errors::{LibraryError, LibraryResult};
use crate::notifications;

/// Days a loan (or a renewal) runs before it is due.
pub const LOAN_PERIOD_DAYS: i64 = 10;
/// Open loans a single user may hold.
pub const MAX_OPEN_LOANS: i64 = 5;
/// Fine accrued per full day overdue, in dollars.
pub const DAILY_FINE: f64 = 0.50;

/// Whole days `at` lies past `due`, clamped at zero. Partial days do not
/// count.
#[inline]
#[must_use]
pub fn days_overdue(due: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    (at - due).num_days().max(0)
}

/// Fine owed on a loan due at `due` and returned at `returned`.
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss, reason = "Day counts stay far below 2^52")]
pub fn fine_for(due: DateTime<Utc>, returned: DateTime<Utc>) -> f64 {
    days_overdue(due, returned) as f64 * DAILY_FINE
}

/// Outcome of a successful issue or self-checkout.
#[derive(Serialize, Debug, Clone)]
pub struct IssueReceipt {
    pub loan_id: i64,
    pub book_title: String,
    pub due_date: DateTime<Utc>,
}

/// Outcome of a successful return.
#[derive(Serialize, Debug, Clone)]
pub struct ReturnReceipt {
    pub loan_id: i64,
    pub fine_amount: f64,
}

/// Outcome of a successful renewal.
#[derive(Serialize, Debug, Clone)]
pub struct RenewReceipt {
    pub loan_id: i64,
    pub new_due_date: DateTime<Utc>,
}

/// One open overdue loan as reported by the scan.
#[derive(Serialize, Debug, Clone)]
pub struct OverdueEntry {
    pub loan_id: i64,
    pub user_name: String,
    pub user_email: String,
    pub book_title: String,
    pub days_overdue: i64,
    pub fine_amount: f64,
    pub due_date: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OverdueRow {
    loan_id: i64,
    user_id: i64,
    user_name: String,
    user_email: String,
    book_title: String,
    due_date: DateTime<Utc>,
}

impl Db {
    /// Issues a book to the member with `user_barcode`. Desk operation.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per checkout at the desk"
    )]
    pub async fn issue(
        &self,
        actor: Actor,
        user_barcode: &str,
        book_barcode: &str,
    ) -> LibraryResult<IssueReceipt> {
        actor.require(Action::IssueLoan)?;
        let user = self
            .user_by_barcode(user_barcode)
            .await?
            .ok_or(LibraryError::NotFound("user"))?;
        self.issue_loan(&user, book_barcode).await
    }

    /// A member checks a book out to themselves at the self-service kiosk.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per kiosk checkout"
    )]
    pub async fn checkout(&self, actor: Actor, book_barcode: &str) -> LibraryResult<IssueReceipt> {
        actor.require(Action::SelfCheckout)?;
        let user = self
            .user_by_id(actor.user_id)
            .await?
            .ok_or(LibraryError::NotFound("user"))?;
        self.issue_loan(&user, book_barcode).await
    }

    async fn issue_loan(
        &self,
        user: &UserRecord,
        book_barcode: &str,
    ) -> LibraryResult<IssueReceipt> {
        if self.open_loan_count(user.id).await? >= MAX_OPEN_LOANS {
            return Err(LibraryError::LoanLimitReached);
        }
        let book = self
            .book_by_barcode(book_barcode)
            .await?
            .ok_or(LibraryError::NotFound("book"))?;

        let now = Utc::now();
        let due = now + Duration::days(LOAN_PERIOD_DAYS);
        let mut tx = self.pool.begin().await?;

        let copy_id = first_available_copy(&mut tx, book.id)
            .await?
            .ok_or(LibraryError::NoAvailableCopy)?;

        // CAS on the shelf flag; a desk that lost the race sees zero rows.
        let claimed =
            sqlx::query("UPDATE book_copies SET is_available = 0 WHERE id = ? AND is_available = 1")
                .bind(copy_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        if claimed == 0 {
            return Err(LibraryError::NoAvailableCopy);
        }

        // The cap is re-checked by the guard, so two racing issues for the
        // same user cannot overshoot it.
        let loan_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO loans (user_id, book_copy_id, checkout_date, due_date, return_date, fine_amount)
             SELECT ?, ?, ?, ?, NULL, 0.0
             WHERE (SELECT COUNT(*) FROM loans WHERE user_id = ? AND return_date IS NULL) < ?
             RETURNING id",
        )
        .bind(user.id)
        .bind(copy_id)
        .bind(now)
        .bind(due)
        .bind(user.id)
        .bind(MAX_OPEN_LOANS)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LibraryError::LoanLimitReached)?;

        // A checkout satisfies the member's own pending reservation, if any.
        sqlx::query(
            "UPDATE reservations SET status = 'Fulfilled'
             WHERE user_id = ? AND book_id = ? AND status = 'Pending'",
        )
        .bind(user.id)
        .bind(book.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(loan_id, user = %user.barcode, book = %book.barcode, "loan issued");
        Ok(IssueReceipt {
            loan_id,
            book_title: book.title,
            due_date: due,
        })
    }

    /// Closes a loan, restores the copy to the shelf and records any fine.
    /// Everyone still waiting on a reservation for the title is notified.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Large function, called once per return"
    )]
    pub async fn return_book(&self, actor: Actor, loan_id: i64) -> LibraryResult<ReturnReceipt> {
        actor.require(Action::ReturnLoan)?;
        let loan = self
            .loan_by_id(loan_id)
            .await?
            .ok_or(LibraryError::NotFound("loan"))?;
        if loan.return_date.is_some() {
            return Err(LibraryError::AlreadyReturned);
        }

        let now = Utc::now();
        let fine = fine_for(loan.due_date, now);
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query(
            "UPDATE loans SET return_date = ?, fine_amount = ? WHERE id = ? AND return_date IS NULL",
        )
        .bind(now)
        .bind(fine)
        .bind(loan_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if closed == 0 {
            return Err(LibraryError::AlreadyReturned);
        }

        sqlx::query("UPDATE book_copies SET is_available = 1 WHERE id = ?")
            .bind(loan.book_copy_id)
            .execute(&mut *tx)
            .await?;

        if fine > 0.0 {
            sqlx::query(
                "INSERT INTO fines (user_id, loan_id, amount, status) VALUES (?, ?, ?, 'Unpaid')",
            )
            .bind(loan.user_id)
            .bind(loan_id)
            .bind(fine)
            .execute(&mut *tx)
            .await?;
        }

        let book_id = sqlx::query_scalar::<_, i64>("SELECT book_id FROM book_copies WHERE id = ?")
            .bind(loan.book_copy_id)
            .fetch_one(&mut *tx)
            .await?;
        let notified = notifications::notify_pending_reservers(&mut tx, book_id, now).await?;

        tx.commit().await?;
        tracing::info!(loan_id, fine, notified, "book returned");
        Ok(ReturnReceipt {
            loan_id,
            fine_amount: fine,
        })
    }

    /// Extends an open, not-yet-due loan by a full loan period counted from
    /// its current due date.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called rarely"
    )]
    pub async fn renew(&self, actor: Actor, loan_id: i64) -> LibraryResult<RenewReceipt> {
        actor.require(Action::RenewLoan)?;
        // Compare-and-swap on the due date: a renewal that loses a race
        // with another desk re-reads and stacks on the fresh due date.
        loop {
            let loan = self
                .loan_by_id(loan_id)
                .await?
                .ok_or(LibraryError::NotFound("loan"))?;
            if loan.return_date.is_some() {
                return Err(LibraryError::AlreadyReturned);
            }
            if Utc::now() > loan.due_date {
                return Err(LibraryError::Overdue);
            }

            let new_due = loan.due_date + Duration::days(LOAN_PERIOD_DAYS);
            let renewed = sqlx::query(
                "UPDATE loans SET due_date = ?
                 WHERE id = ? AND return_date IS NULL AND due_date = ?",
            )
            .bind(new_due)
            .bind(loan_id)
            .bind(loan.due_date)
            .execute(&self.pool)
            .await?
            .rows_affected();
            if renewed == 1 {
                tracing::info!(loan_id, %new_due, "loan renewed");
                return Ok(RenewReceipt {
                    loan_id,
                    new_due_date: new_due,
                });
            }
        }
    }

    /// Walks every open overdue loan, reports it and notifies the borrower.
    /// A loan is notified at most once per calendar day, so the scan can run
    /// as often as the desk likes.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Large function, called by the overdue sweep"
    )]
    pub async fn scan_overdue(&self, actor: Actor) -> LibraryResult<Vec<OverdueEntry>> {
        actor.require(Action::ScanOverdue)?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, OverdueRow>(
            "SELECT l.id AS loan_id, l.user_id AS user_id, u.name AS user_name,
                    u.email AS user_email, b.title AS book_title, l.due_date AS due_date
             FROM loans l
             JOIN users u ON u.id = l.user_id
             JOIN book_copies c ON c.id = l.book_copy_id
             JOIN books b ON b.id = c.book_id
             WHERE l.return_date IS NULL AND l.due_date < ?
             ORDER BY l.due_date",
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let days = days_overdue(row.due_date, now);
            let fresh = sqlx::query(
                "INSERT OR IGNORE INTO overdue_notices (loan_id, notice_date) VALUES (?, ?)",
            )
            .bind(row.loan_id)
            .bind(now.date_naive())
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if fresh > 0 {
                let body = notifications::overdue_body(&row.user_name, &row.book_title, days);
                notifications::append(
                    &mut tx,
                    row.user_id,
                    notifications::OVERDUE_SUBJECT,
                    &body,
                    Some(&row.book_title),
                    now,
                )
                .await?;
            }
            entries.push(OverdueEntry {
                loan_id: row.loan_id,
                user_name: row.user_name,
                user_email: row.user_email,
                book_title: row.book_title,
                days_overdue: days,
                fine_amount: fine_for(row.due_date, now),
                due_date: row.due_date,
            });
        }

        tx.commit().await?;
        tracing::info!(overdue = entries.len(), "overdue scan complete");
        Ok(entries)
    }

    pub(crate) async fn open_loan_count(&self, user_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM loans WHERE user_id = ? AND return_date IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    pub(crate) async fn loan_by_id(&self, id: i64) -> Result<Option<LoanRecord>, sqlx::Error> {
        sqlx::query_as::<_, LoanRecord>(
            "SELECT id, user_id, book_copy_id, checkout_date, due_date, return_date, fine_amount
             FROM loans WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}

async fn first_available_copy(
    conn: &mut SqliteConnection,
    book_id: i64,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT id FROM book_copies WHERE book_id = ? AND is_available = 1 ORDER BY id LIMIT 1",
    )
    .bind(book_id)
    .fetch_optional(conn)
    .await
}
