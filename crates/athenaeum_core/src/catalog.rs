//! Catalog management: books and their physical copies.
//!
//! Books describe titles; copies are the barcoded spines on the racks.
//! Availability lives on the copy (`is_available`) and every count shown to
//! the desk is derived from it on read, never cached.

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::access::{Action, Actor};
use crate::database::types::{BookRecord, BookUpdate, BookView, CopyRecord, CopyUpdate, NewBook};
use crate::database::{Db, is_unique_violation};
use crate::errors::{LibraryError, LibraryResult};
use crate::{barcode, notifications};

const DUPLICATE_TITLE: &str = "this title is already in the catalog";

const BOOK_COLUMNS: &str = "id, barcode, title, author, subject_category, publication_date";

const BOOK_VIEW_QUERY: &str = "SELECT b.barcode, b.title, b.author, b.subject_category, \
     b.publication_date, COUNT(c.id) AS total_copies, \
     COALESCE(SUM(c.is_available), 0) AS available_copies \
     FROM books b LEFT JOIN book_copies c ON c.book_id = b.id";

impl Db {
    /// Adds a title to the catalog and assigns it a barcode. A title by the
    /// same author with the same publication date is considered a duplicate.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called rarely"
    )]
    pub async fn add_book(&self, actor: Actor, book: NewBook) -> LibraryResult<BookRecord> {
        actor.require(Action::ManageCatalog)?;

        let duplicate = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM books WHERE title = ? AND author = ? AND publication_date = ?",
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.publication_date)
        .fetch_optional(&self.pool)
        .await?;
        if duplicate.is_some() {
            return Err(LibraryError::Validation(DUPLICATE_TITLE.to_owned()));
        }

        let barcode = barcode::book_barcode();
        let inserted = sqlx::query_scalar::<_, i64>(
            "INSERT INTO books (barcode, title, author, subject_category, publication_date)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&barcode)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.subject_category)
        .bind(book.publication_date)
        .fetch_one(&self.pool)
        .await;
        let id = match inserted {
            Ok(id) => id,
            // Backstop for two desks cataloguing the same title at once.
            Err(error) if is_unique_violation(&error) => {
                return Err(LibraryError::Validation(DUPLICATE_TITLE.to_owned()));
            }
            Err(error) => return Err(error.into()),
        };

        tracing::info!(%barcode, title = %book.title, "book added");
        Ok(BookRecord {
            id,
            barcode,
            title: book.title,
            author: book.author,
            subject_category: book.subject_category,
            publication_date: book.publication_date,
        })
    }

    /// Edits a book in place; `None` fields are left untouched.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called rarely"
    )]
    pub async fn update_book(
        &self,
        actor: Actor,
        barcode: &str,
        update: BookUpdate,
    ) -> LibraryResult<BookRecord> {
        actor.require(Action::ManageCatalog)?;
        let current = self
            .book_by_barcode(barcode)
            .await?
            .ok_or(LibraryError::NotFound("book"))?;

        let title = update.title.unwrap_or(current.title);
        let author = update.author.unwrap_or(current.author);
        let subject_category = update.subject_category.unwrap_or(current.subject_category);
        let publication_date = update.publication_date.unwrap_or(current.publication_date);

        sqlx::query(
            "UPDATE books SET title = ?, author = ?, subject_category = ?, publication_date = ?
             WHERE id = ?",
        )
        .bind(&title)
        .bind(&author)
        .bind(&subject_category)
        .bind(publication_date)
        .bind(current.id)
        .execute(&self.pool)
        .await?;

        Ok(BookRecord {
            id: current.id,
            barcode: current.barcode,
            title,
            author,
            subject_category,
            publication_date,
        })
    }

    /// Removes a book and, through FK cascades, its copies, loans and
    /// reservations.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called rarely"
    )]
    pub async fn delete_book(&self, actor: Actor, barcode: &str) -> LibraryResult<()> {
        actor.require(Action::ManageCatalog)?;
        let book = self
            .book_by_barcode(barcode)
            .await?
            .ok_or(LibraryError::NotFound("book"))?;
        sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(book.id)
            .execute(&self.pool)
            .await?;
        tracing::info!(%barcode, title = %book.title, "book deleted");
        Ok(())
    }

    /// One catalog entry with live availability counts.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per desk lookup"
    )]
    pub async fn find_book(&self, actor: Actor, barcode: &str) -> LibraryResult<BookView> {
        actor.require(Action::BrowseCatalog)?;
        let query = format!("{BOOK_VIEW_QUERY} WHERE b.barcode = ? GROUP BY b.id");
        sqlx::query_as::<_, BookView>(&query)
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LibraryError::NotFound("book"))
    }

    /// The whole catalog with availability counts.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Large query, called per catalog listing"
    )]
    pub async fn list_books(&self, actor: Actor) -> LibraryResult<Vec<BookView>> {
        actor.require(Action::BrowseCatalog)?;
        let query = format!("{BOOK_VIEW_QUERY} GROUP BY b.id ORDER BY b.title");
        Ok(sqlx::query_as::<_, BookView>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Adds a copy of an existing book, immediately available. Anyone still
    /// waiting on a reservation for the book is notified.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called rarely"
    )]
    pub async fn add_copy(
        &self,
        actor: Actor,
        book_barcode: &str,
        rack_location: &str,
    ) -> LibraryResult<CopyRecord> {
        actor.require(Action::ManageCatalog)?;
        let book = self
            .book_by_barcode(book_barcode)
            .await?
            .ok_or(LibraryError::NotFound("book"))?;

        let mut tx = self.pool.begin().await?;
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO book_copies (book_id, rack_location, is_available)
             VALUES (?, ?, 1) RETURNING id",
        )
        .bind(book.id)
        .bind(rack_location)
        .fetch_one(&mut *tx)
        .await?;
        let notified = notifications::notify_pending_reservers(&mut tx, book.id, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(copy_id = id, book = %book.barcode, notified, "copy added");
        Ok(CopyRecord {
            id,
            book_id: book.id,
            rack_location: rack_location.to_owned(),
            is_available: true,
        })
    }

    /// All copies of a book, rack order.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called rarely"
    )]
    pub async fn copies_of(&self, actor: Actor, book_barcode: &str) -> LibraryResult<Vec<CopyRecord>> {
        actor.require(Action::BrowseCatalog)?;
        let book = self
            .book_by_barcode(book_barcode)
            .await?
            .ok_or(LibraryError::NotFound("book"))?;
        Ok(sqlx::query_as::<_, CopyRecord>(
            "SELECT id, book_id, rack_location, is_available
             FROM book_copies WHERE book_id = ? ORDER BY id",
        )
        .bind(book.id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Edits a copy. Flipping `is_available` back on by hand counts as the
    /// copy reappearing, so pending reservers are notified then too.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called rarely"
    )]
    pub async fn update_copy(
        &self,
        actor: Actor,
        book_barcode: &str,
        copy_id: i64,
        update: CopyUpdate,
    ) -> LibraryResult<CopyRecord> {
        actor.require(Action::ManageCatalog)?;
        let book = self
            .book_by_barcode(book_barcode)
            .await?
            .ok_or(LibraryError::NotFound("book"))?;

        let mut tx = self.pool.begin().await?;
        let current = copy_in_tx(&mut tx, book.id, copy_id)
            .await?
            .ok_or(LibraryError::NotFound("book copy"))?;

        let rack_location = update.rack_location.unwrap_or(current.rack_location);
        let is_available = update.is_available.unwrap_or(current.is_available);
        sqlx::query("UPDATE book_copies SET rack_location = ?, is_available = ? WHERE id = ?")
            .bind(&rack_location)
            .bind(is_available)
            .bind(copy_id)
            .execute(&mut *tx)
            .await?;

        if is_available && !current.is_available {
            notifications::notify_pending_reservers(&mut tx, book.id, Utc::now()).await?;
        }
        tx.commit().await?;

        Ok(CopyRecord {
            id: copy_id,
            book_id: book.id,
            rack_location,
            is_available,
        })
    }

    /// Removes a copy from the racks. Refused while the copy is out on loan.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called rarely"
    )]
    pub async fn delete_copy(
        &self,
        actor: Actor,
        book_barcode: &str,
        copy_id: i64,
    ) -> LibraryResult<()> {
        actor.require(Action::ManageCatalog)?;
        let book = self
            .book_by_barcode(book_barcode)
            .await?
            .ok_or(LibraryError::NotFound("book"))?;

        // The shelf check rides on the DELETE itself, so a checkout landing
        // after any earlier read cannot have its copy erased under the loan.
        let deleted = sqlx::query(
            "DELETE FROM book_copies WHERE id = ? AND book_id = ? AND is_available = 1",
        )
        .bind(copy_id)
        .bind(book.id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if deleted == 0 {
            let held = sqlx::query_scalar::<_, i64>(
                "SELECT id FROM book_copies WHERE id = ? AND book_id = ?",
            )
            .bind(copy_id)
            .bind(book.id)
            .fetch_optional(&self.pool)
            .await?;
            return Err(match held {
                Some(_) => LibraryError::CopyOnLoan,
                None => LibraryError::NotFound("book copy"),
            });
        }
        tracing::info!(copy_id, book = %book.barcode, "copy deleted");
        Ok(())
    }

    pub(crate) async fn book_by_barcode(
        &self,
        barcode: &str,
    ) -> Result<Option<BookRecord>, sqlx::Error> {
        let query = format!("SELECT {BOOK_COLUMNS} FROM books WHERE barcode = ?");
        sqlx::query_as::<_, BookRecord>(&query)
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await
    }

    /// Copies of `book_id` currently on the shelf.
    pub(crate) async fn available_copy_count(&self, book_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM book_copies WHERE book_id = ? AND is_available = 1",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await
    }
}

async fn copy_in_tx(
    conn: &mut SqliteConnection,
    book_id: i64,
    copy_id: i64,
) -> Result<Option<CopyRecord>, sqlx::Error> {
    sqlx::query_as::<_, CopyRecord>(
        "SELECT id, book_id, rack_location, is_available
         FROM book_copies WHERE id = ? AND book_id = ?",
    )
    .bind(copy_id)
    .bind(book_id)
    .fetch_optional(conn)
    .await
}
