//! Reservations: the queue for titles with every copy checked out.
//!
//! A reservation is per book, not per copy. It stays `Pending` until the
//! member actually checks the book out (fulfilled) or cancels it; a copy
//! coming back only triggers a notification.

use chrono::Utc;
use serde::Serialize;

use crate::access::{Action, Actor};
use crate::database::types::{ReservationRecord, ReservationStatus};
use crate::database::{Db, is_unique_violation};
use crate::errors::{LibraryError, LibraryResult};

/// Outcome of a successful reservation.
#[derive(Serialize, Debug, Clone)]
pub struct ReservationReceipt {
    pub reservation_id: i64,
    pub book_title: String,
}

impl Db {
    /// Places a hold on a fully checked-out book. Refused while any copy is
    /// on the shelf, and a user holds at most one pending reservation per
    /// title.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per hold request"
    )]
    pub async fn reserve(
        &self,
        actor: Actor,
        user_barcode: &str,
        book_barcode: &str,
    ) -> LibraryResult<ReservationReceipt> {
        actor.require(Action::Reserve)?;
        let user = self
            .user_by_barcode(user_barcode)
            .await?
            .ok_or(LibraryError::NotFound("user"))?;
        let book = self
            .book_by_barcode(book_barcode)
            .await?
            .ok_or(LibraryError::NotFound("book"))?;

        if self.available_copy_count(book.id).await? > 0 {
            return Err(LibraryError::BookAvailable);
        }

        let inserted = sqlx::query_scalar::<_, i64>(
            "INSERT INTO reservations (user_id, book_id, reservation_date, status)
             VALUES (?, ?, ?, 'Pending') RETURNING id",
        )
        .bind(user.id)
        .bind(book.id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;
        let reservation_id = match inserted {
            Ok(id) => id,
            // The partial unique index turns a double-reserve into this.
            Err(error) if is_unique_violation(&error) => {
                return Err(LibraryError::DuplicateReservation);
            }
            Err(error) => return Err(error.into()),
        };

        tracing::info!(reservation_id, user = %user.barcode, book = %book.barcode, "reservation placed");
        Ok(ReservationReceipt {
            reservation_id,
            book_title: book.title,
        })
    }

    /// Cancels a pending reservation. Fulfilled and cancelled ones are
    /// terminal and refuse with their current status.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called rarely"
    )]
    pub async fn cancel_reservation(
        &self,
        actor: Actor,
        reservation_id: i64,
    ) -> LibraryResult<()> {
        actor.require(Action::CancelReservation)?;
        let reservation = self
            .reservation_by_id(reservation_id)
            .await?
            .ok_or(LibraryError::NotFound("reservation"))?;
        if reservation.status != ReservationStatus::Pending {
            return Err(LibraryError::ReservationClosed(reservation.status));
        }

        let cancelled = sqlx::query(
            "UPDATE reservations SET status = 'Cancelled' WHERE id = ? AND status = 'Pending'",
        )
        .bind(reservation_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if cancelled == 0 {
            // Raced with a checkout that fulfilled it.
            let fresh = self
                .reservation_by_id(reservation_id)
                .await?
                .ok_or(LibraryError::NotFound("reservation"))?;
            return Err(LibraryError::ReservationClosed(fresh.status));
        }

        tracing::info!(reservation_id, "reservation cancelled");
        Ok(())
    }

    pub(crate) async fn reservation_by_id(
        &self,
        id: i64,
    ) -> Result<Option<ReservationRecord>, sqlx::Error> {
        sqlx::query_as::<_, ReservationRecord>(
            "SELECT id, user_id, book_id, reservation_date, status
             FROM reservations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}
