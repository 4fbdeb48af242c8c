//! Barcode generation.
//!
//! Barcodes are the external identifiers handed out when a user or book is
//! registered. They never change and are never recycled; uniqueness is
//! backstopped by UNIQUE constraints on the `users` and `books` tables.

use uuid::Uuid;

const USER_PREFIX: &str = "U-";
const BOOK_PREFIX: &str = "B-";

/// New user barcode: `U-` followed by 32 hex characters.
#[inline]
#[must_use]
pub fn user_barcode() -> String {
    format!("{USER_PREFIX}{}", Uuid::new_v4().simple())
}

/// New book barcode: `B-` followed by 32 hex characters.
#[inline]
#[must_use]
pub fn book_barcode() -> String {
    format!("{BOOK_PREFIX}{}", Uuid::new_v4().simple())
}
