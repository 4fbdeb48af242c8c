//! Shared fixtures for the engine tests.

#![allow(
    dead_code,
    reason = "Each test binary uses a different slice of these fixtures"
)]

use athenaeum_core::Db;
use athenaeum_core::access::{Actor, Role};
use athenaeum_core::database::types::{NewBook, NewUser};
use chrono::{Duration, NaiveDate, Utc};

/// A registered user plus the barcode the desk would scan for them.
pub struct Account {
    pub actor: Actor,
    pub barcode: String,
}

pub async fn setup() -> Db {
    Db::init_in_memory().await.expect("in-memory database")
}

pub async fn librarian(db: &Db) -> Account {
    register(db, "Robin Page", "robin.page@library.com", Role::Librarian).await
}

pub async fn member(db: &Db, name: &str) -> Account {
    let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
    register(db, name, &email, Role::Member).await
}

async fn register(db: &Db, name: &str, email: &str, role: Role) -> Account {
    let view = db
        .register_user(NewUser::new(
            name.to_owned(),
            email.to_owned(),
            "correct horse battery staple".to_owned(),
            role,
        ))
        .await
        .expect("registration");
    let actor = db.actor_from_barcode(&view.barcode).await.expect("actor");
    Account {
        actor,
        barcode: view.barcode,
    }
}

/// Adds a book with `copies` copies and returns its barcode.
pub async fn book_with_copies(db: &Db, staff: &Account, title: &str, copies: u32) -> String {
    let book = db
        .add_book(
            staff.actor,
            NewBook::new(
                title.to_owned(),
                "N. K. Jemisin".to_owned(),
                "Fiction".to_owned(),
                NaiveDate::from_ymd_opt(2015, 8, 4).expect("date"),
            ),
        )
        .await
        .expect("add book");
    for rack in 1..=copies {
        db.add_copy(staff.actor, &book.barcode, &format!("Rack {rack}"))
            .await
            .expect("add copy");
    }
    book.barcode
}

/// Rewrites a loan's due date to `days` days ago.
pub async fn backdate_due(db: &Db, loan_id: i64, days: i64) {
    sqlx::query("UPDATE loans SET due_date = ? WHERE id = ?")
        .bind(Utc::now() - Duration::days(days))
        .bind(loan_id)
        .execute(db.pool())
        .await
        .expect("backdate");
}
