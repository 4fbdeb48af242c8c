//! Member notification inbox.
//!
//! The inbox is an append-only log. Rows are written inside the transaction
//! of whatever operation caused them, so a notification exists exactly when
//! its cause committed. Message wording is fixed here and nowhere else.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::access::{Actor, Role};
use crate::database::Db;
use crate::database::types::NotificationRecord;
use crate::errors::{LibraryError, LibraryResult};

pub(crate) const RESERVATION_SUBJECT: &str = "Book Reservation Available";
pub(crate) const OVERDUE_SUBJECT: &str = "Overdue Book Notification";

pub(crate) fn reservation_available_body(user_name: &str, book_title: &str) -> String {
    format!(
        "Dear {user_name},\n\nThe book '{book_title}' you reserved is now available. \
         Please check it out soon.\n\nThank you!"
    )
}

pub(crate) fn overdue_body(user_name: &str, book_title: &str, days_overdue: i64) -> String {
    format!(
        "Dear {user_name},\n\nThe book '{book_title}' is overdue by {days_overdue} days. \
         Please return it as soon as possible to avoid further fines.\n\nThank you!"
    )
}

/// Appends one inbox row inside the caller's transaction.
pub(crate) async fn append(
    conn: &mut SqliteConnection,
    user_id: i64,
    subject: &str,
    body: &str,
    book_title: Option<&str>,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO notifications (user_id, subject, body, book_title, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(subject)
    .bind(body)
    .bind(book_title)
    .bind(at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct PendingReserver {
    user_id: i64,
    user_name: String,
    book_title: String,
}

/// Tells everyone holding a pending reservation on `book_id` that a copy is
/// available again. Reservations stay pending; only an actual checkout
/// fulfills them. Returns how many inbox rows were written.
pub(crate) async fn notify_pending_reservers(
    conn: &mut SqliteConnection,
    book_id: i64,
    at: DateTime<Utc>,
) -> Result<usize, sqlx::Error> {
    let reservers = sqlx::query_as::<_, PendingReserver>(
        "SELECT r.user_id AS user_id, u.name AS user_name, b.title AS book_title
         FROM reservations r
         JOIN users u ON u.id = r.user_id
         JOIN books b ON b.id = r.book_id
         WHERE r.book_id = ? AND r.status = 'Pending'
         ORDER BY r.id",
    )
    .bind(book_id)
    .fetch_all(&mut *conn)
    .await?;

    for reserver in &reservers {
        let body = reservation_available_body(&reserver.user_name, &reserver.book_title);
        append(
            &mut *conn,
            reserver.user_id,
            RESERVATION_SUBJECT,
            &body,
            Some(&reserver.book_title),
            at,
        )
        .await?;
    }
    Ok(reservers.len())
}

impl Db {
    /// The inbox of `user_id`, oldest first. Members read only their own.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per inbox view"
    )]
    pub async fn notifications(
        &self,
        actor: Actor,
        user_id: i64,
    ) -> LibraryResult<Vec<NotificationRecord>> {
        if !actor.may_view(user_id) {
            return Err(LibraryError::Forbidden(Role::Librarian));
        }
        if self.user_by_id(user_id).await?.is_none() {
            return Err(LibraryError::NotFound("user"));
        }
        Ok(sqlx::query_as::<_, NotificationRecord>(
            "SELECT id, user_id, subject, body, book_title, created_at
             FROM notifications WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{overdue_body, reservation_available_body};

    #[test]
    fn reservation_message_names_the_member_and_the_book() {
        assert_eq!(
            reservation_available_body("Ada", "Dune"),
            "Dear Ada,\n\nThe book 'Dune' you reserved is now available. \
             Please check it out soon.\n\nThank you!"
        );
    }

    #[test]
    fn overdue_message_carries_the_day_count() {
        let body = overdue_body("Ada", "Dune", 3);
        assert!(body.contains("overdue by 3 days"));
        assert!(body.starts_with("Dear Ada,"));
    }
}
