//! Role-based access rules.
//!
//! Every engine entry point names the [`Action`] it performs and checks the
//! caller exactly once at the boundary. The capability table lives in
//! [`Role::allows`] so the rules stay in one place.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{LibraryError, LibraryResult};

/// Membership role, stored as TEXT in the `users` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Role {
    Member,
    Librarian,
}

impl Role {
    /// Whether this role may perform `action`.
    #[inline]
    #[must_use]
    pub const fn allows(self, action: Action) -> bool {
        match action {
            Action::IssueLoan
            | Action::ReturnLoan
            | Action::RenewLoan
            | Action::ScanOverdue
            | Action::ManageCatalog
            | Action::ManageMembers => matches!(self, Self::Librarian),
            Action::SelfCheckout => matches!(self, Self::Member),
            Action::Reserve | Action::CancelReservation | Action::BrowseCatalog => true,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Member => f.write_str("Member"),
            Self::Librarian => f.write_str("Librarian"),
        }
    }
}

/// Operations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    IssueLoan,
    SelfCheckout,
    ReturnLoan,
    RenewLoan,
    ScanOverdue,
    Reserve,
    CancelReservation,
    BrowseCatalog,
    ManageCatalog,
    ManageMembers,
}

impl Action {
    /// The role named in the refusal when a check fails.
    const fn required_role(self) -> Role {
        match self {
            Self::SelfCheckout => Role::Member,
            _ => Role::Librarian,
        }
    }
}

/// The authenticated caller, resolved by the shell before it invokes the
/// engine.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    #[inline]
    #[must_use]
    pub const fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Refuses with [`LibraryError::Forbidden`] unless the actor's role
    /// permits `action`.
    #[inline]
    pub fn require(self, action: Action) -> LibraryResult<()> {
        if self.role.allows(action) {
            Ok(())
        } else {
            Err(LibraryError::Forbidden(action.required_role()))
        }
    }

    /// Whether the actor may read records belonging to `user_id`. Members see
    /// only their own records; librarians see everyone's.
    #[inline]
    #[must_use]
    pub const fn may_view(self, user_id: i64) -> bool {
        self.user_id == user_id || matches!(self.role, Role::Librarian)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Action, Actor, Role};
    use crate::errors::LibraryError;

    #[test]
    fn librarians_run_the_desk_and_members_do_not() {
        for action in [
            Action::IssueLoan,
            Action::ReturnLoan,
            Action::RenewLoan,
            Action::ScanOverdue,
            Action::ManageCatalog,
            Action::ManageMembers,
        ] {
            assert!(Role::Librarian.allows(action));
            assert!(!Role::Member.allows(action));
        }
    }

    #[test]
    fn self_checkout_is_member_only() {
        assert!(Role::Member.allows(Action::SelfCheckout));
        assert!(!Role::Librarian.allows(Action::SelfCheckout));
    }

    #[test]
    fn reservations_and_browsing_are_open_to_both_roles() {
        for action in [
            Action::Reserve,
            Action::CancelReservation,
            Action::BrowseCatalog,
        ] {
            assert!(Role::Member.allows(action));
            assert!(Role::Librarian.allows(action));
        }
    }

    #[test]
    fn refusal_names_the_missing_role() {
        let member = Actor::new(1, Role::Member);
        let refused = member.require(Action::IssueLoan).unwrap_err();
        assert_eq!(
            refused.to_string(),
            LibraryError::Forbidden(Role::Librarian).to_string()
        );
    }

    #[test]
    fn members_view_only_their_own_records() {
        let member = Actor::new(7, Role::Member);
        assert!(member.may_view(7));
        assert!(!member.may_view(8));

        let librarian = Actor::new(1, Role::Librarian);
        assert!(librarian.may_view(7));
    }
}
