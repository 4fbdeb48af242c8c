//! User registration and member administration.

use chrono::Utc;

use crate::access::{Action, Actor, Role};
use crate::barcode;
use crate::database::types::{NewUser, UserRecord, UserView};
use crate::database::{Db, is_unique_violation};
use crate::errors::{LibraryError, LibraryResult};

/// Librarian accounts must register with an address in this domain.
pub const LIBRARIAN_EMAIL_DOMAIN: &str = "@library.com";

const DUPLICATE_EMAIL: &str = "a user with this email already exists";

impl Db {
    /// Registers a user and hands back their view, barcode included.
    /// Registration is open; no actor is required.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per registration"
    )]
    pub async fn register_user(&self, user: NewUser) -> LibraryResult<UserView> {
        if matches!(user.role, Role::Librarian) && !user.email.ends_with(LIBRARIAN_EMAIL_DOMAIN) {
            return Err(LibraryError::Validation(format!(
                "librarian email must end with {LIBRARIAN_EMAIL_DOMAIN}"
            )));
        }

        let taken = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = ?")
            .bind(&user.email)
            .fetch_optional(&self.pool)
            .await?;
        if taken.is_some() {
            return Err(LibraryError::Validation(DUPLICATE_EMAIL.to_owned()));
        }

        let password_hash = bcrypt::hash(&user.password, bcrypt::DEFAULT_COST)?;
        let barcode = barcode::user_barcode();

        let inserted = sqlx::query(
            "INSERT INTO users (name, email, password_hash, role, barcode, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&password_hash)
        .bind(user.role)
        .bind(&barcode)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;
        if let Err(error) = inserted {
            // Backstop for registrations racing on the same address.
            if is_unique_violation(&error) {
                return Err(LibraryError::Validation(DUPLICATE_EMAIL.to_owned()));
            }
            return Err(error.into());
        }

        tracing::info!(%barcode, role = %user.role, "user registered");
        Ok(UserView {
            name: user.name,
            email: user.email,
            role: user.role,
            barcode,
        })
    }

    /// Resolves a barcode to the [`Actor`] shells pass into every gated
    /// operation.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per desk command"
    )]
    pub async fn actor_from_barcode(&self, barcode: &str) -> LibraryResult<Actor> {
        let user = self
            .user_by_barcode(barcode)
            .await?
            .ok_or(LibraryError::NotFound("user"))?;
        Ok(Actor::new(user.id, user.role))
    }

    /// Looks a user up by barcode.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called rarely"
    )]
    pub async fn find_user(&self, actor: Actor, barcode: &str) -> LibraryResult<UserView> {
        actor.require(Action::ManageMembers)?;
        sqlx::query_as::<_, UserView>("SELECT name, email, role, barcode FROM users WHERE barcode = ?")
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LibraryError::NotFound("user"))
    }

    /// Every registered user, oldest account first.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called rarely"
    )]
    pub async fn list_users(&self, actor: Actor) -> LibraryResult<Vec<UserView>> {
        actor.require(Action::ManageMembers)?;
        Ok(
            sqlx::query_as::<_, UserView>("SELECT name, email, role, barcode FROM users ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    /// Removes a member account. Librarian accounts and members with open
    /// loans are refused; everything else about the member cascades away.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called rarely"
    )]
    pub async fn delete_user(&self, actor: Actor, barcode: &str) -> LibraryResult<()> {
        actor.require(Action::ManageMembers)?;
        let user = self
            .user_by_barcode(barcode)
            .await?
            .ok_or(LibraryError::NotFound("user"))?;
        if matches!(user.role, Role::Librarian) {
            return Err(LibraryError::Validation(
                "a Librarian account cannot be deleted".to_owned(),
            ));
        }

        // The open-loan check rides on the DELETE, so a loan issued after
        // the lookup keeps the account and the copy it holds.
        let deleted = sqlx::query(
            "DELETE FROM users WHERE id = ? AND NOT EXISTS
                 (SELECT 1 FROM loans
                  WHERE loans.user_id = users.id AND loans.return_date IS NULL)",
        )
        .bind(user.id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if deleted == 0 {
            let open = self.open_loan_count(user.id).await?;
            if open > 0 {
                return Err(LibraryError::Validation(format!(
                    "user still has {open} books checked out"
                )));
            }
            return Err(LibraryError::NotFound("user"));
        }
        tracing::info!(%barcode, "user deleted");
        Ok(())
    }

    pub(crate) async fn user_by_barcode(
        &self,
        barcode: &str,
    ) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, password_hash, role, barcode, created_at
             FROM users WHERE barcode = ?",
        )
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await
    }

    pub(crate) async fn user_by_id(&self, id: i64) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, password_hash, role, barcode, created_at
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}
