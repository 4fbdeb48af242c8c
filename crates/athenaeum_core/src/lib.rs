//! `athenaeum_core`
//!
//! Core library holding the platform independent logic of Athenaeum. Used
//! both by the bundled CLI and by server front ends, it owns the SQLite
//! store and the rules of the circulation desk, from issuing a loan through
//! overdue fines and reservation queues.

pub mod access;
pub mod barcode;
pub mod catalog;
pub mod circulation;
pub mod database;
pub mod errors;
pub mod membership;
pub mod notifications;
pub mod reports;
pub mod reservations;

pub use database::Db;
pub use errors::{LibraryError, LibraryResult};
