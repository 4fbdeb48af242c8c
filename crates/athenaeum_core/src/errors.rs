//! Error types shared by every engine operation.

use crate::access::Role;
use crate::database::types::ReservationStatus;

/// Result alias used throughout the engine.
pub type LibraryResult<T> = Result<T, LibraryError>;

/// Everything a circulation operation can refuse or fail with. Callers match
/// on the variant; `Display` carries the message shown at the desk.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// A referenced entity does not exist. The payload names the entity kind.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The borrower already holds the maximum number of open loans.
    #[error("user has reached the maximum number of books allowed (5)")]
    LoanLimitReached,

    /// Every copy of the requested book is checked out.
    #[error("no copies of this book are currently available")]
    NoAvailableCopy,

    /// The loan was already closed by an earlier return.
    #[error("this book has already been returned")]
    AlreadyReturned,

    /// Renewal was requested after the due date had passed.
    #[error("overdue books cannot be renewed")]
    Overdue,

    /// Reservation refused because a copy is sitting on the shelf.
    #[error("this book is currently available and does not need a reservation")]
    BookAvailable,

    /// The user already holds a pending reservation for this book.
    #[error("you already have a pending reservation for this book")]
    DuplicateReservation,

    /// Only pending reservations can be cancelled.
    #[error("this reservation is already {}", .0.label())]
    ReservationClosed(ReservationStatus),

    /// A copy cannot be deleted while it is out on loan.
    #[error("this copy is currently checked out and cannot be deleted")]
    CopyOnLoan,

    /// The caller's role does not permit the operation.
    #[error("unauthorized: {0} role required")]
    Forbidden(Role),

    /// Input rejected before touching the database.
    #[error("{0}")]
    Validation(String),

    #[error("password hashing failed")]
    Password(#[from] bcrypt::BcryptError),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}
