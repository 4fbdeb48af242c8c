//! Subcommand execution: engine calls in, JSON on stdout.

#![allow(clippy::print_stdout, reason = "Command output belongs on stdout")]

use anyhow::{Result, bail};
use athenaeum_core::Db;
use athenaeum_core::access::Actor;
use athenaeum_core::database::types::{BookUpdate, CopyUpdate, NewBook, NewUser};
use serde::Serialize;
use serde_json::json;

use crate::{Cli, Commands};

pub(crate) async fn execute(cli: Cli) -> Result<()> {
    let db = Db::init(&cli.database).await?;
    let outcome = dispatch(&db, cli.acting_user.as_deref(), cli.command).await;
    db.close().await;
    outcome
}

async fn dispatch(db: &Db, acting: Option<&str>, command: Commands) -> Result<()> {
    match command {
        Commands::Register {
            name,
            email,
            password,
            role,
        } => {
            let account = db
                .register_user(NewUser::new(name, email, password, role.into()))
                .await?;
            print_json(&account)
        }
        Commands::FindUser { barcode } => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.find_user(actor, &barcode).await?)
        }
        Commands::ListUsers => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.list_users(actor).await?)
        }
        Commands::DeleteUser { barcode } => {
            let actor = resolve_actor(db, acting).await?;
            db.delete_user(actor, &barcode).await?;
            print_json(&json!({ "message": "user deleted" }))
        }
        Commands::AddBook {
            title,
            author,
            category,
            published,
        } => {
            let actor = resolve_actor(db, acting).await?;
            let book = db
                .add_book(actor, NewBook::new(title, author, category, published))
                .await?;
            print_json(&book)
        }
        Commands::UpdateBook {
            barcode,
            title,
            author,
            category,
            published,
        } => {
            let actor = resolve_actor(db, acting).await?;
            let update = BookUpdate {
                title,
                author,
                subject_category: category,
                publication_date: published,
            };
            print_json(&db.update_book(actor, &barcode, update).await?)
        }
        Commands::DeleteBook { barcode } => {
            let actor = resolve_actor(db, acting).await?;
            db.delete_book(actor, &barcode).await?;
            print_json(&json!({ "message": "book deleted" }))
        }
        Commands::FindBook { barcode } => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.find_book(actor, &barcode).await?)
        }
        Commands::ListBooks => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.list_books(actor).await?)
        }
        Commands::AddCopy { book, rack } => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.add_copy(actor, &book, &rack).await?)
        }
        Commands::Copies { book } => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.copies_of(actor, &book).await?)
        }
        Commands::UpdateCopy {
            book,
            copy_id,
            rack,
            available,
        } => {
            let actor = resolve_actor(db, acting).await?;
            let update = CopyUpdate {
                rack_location: rack,
                is_available: available,
            };
            print_json(&db.update_copy(actor, &book, copy_id, update).await?)
        }
        Commands::DeleteCopy { book, copy_id } => {
            let actor = resolve_actor(db, acting).await?;
            db.delete_copy(actor, &book, copy_id).await?;
            print_json(&json!({ "message": "book copy deleted" }))
        }
        Commands::Issue { user, book } => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.issue(actor, &user, &book).await?)
        }
        Commands::Checkout { book } => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.checkout(actor, &book).await?)
        }
        Commands::Return { loan_id } => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.return_book(actor, loan_id).await?)
        }
        Commands::Renew { loan_id } => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.renew(actor, loan_id).await?)
        }
        Commands::ScanOverdue => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.scan_overdue(actor).await?)
        }
        Commands::Reserve { user, book } => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.reserve(actor, &user, &book).await?)
        }
        Commands::CancelReservation { reservation_id } => {
            let actor = resolve_actor(db, acting).await?;
            db.cancel_reservation(actor, reservation_id).await?;
            print_json(&json!({ "message": "reservation cancelled" }))
        }
        Commands::History { user_id } => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.borrowing_history(actor, user_id).await?)
        }
        Commands::CheckedOut { user_id } => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.checked_out_books(actor, user_id).await?)
        }
        Commands::Fines { user_id } => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.fines_for(actor, user_id).await?)
        }
        Commands::Notifications { user_id } => {
            let actor = resolve_actor(db, acting).await?;
            print_json(&db.notifications(actor, user_id).await?)
        }
    }
}

async fn resolve_actor(db: &Db, acting: Option<&str>) -> Result<Actor> {
    let Some(barcode) = acting else {
        bail!("this command acts on behalf of a user; pass --as <USER_BARCODE> or set ATHENAEUM_USER");
    };
    Ok(db.actor_from_barcode(barcode).await?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
