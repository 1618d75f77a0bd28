//! Database module: account records and their SQLite storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database
//! - `store.rs`: the `AccountStore` trait the account service depends on
//! - `sqlite.rs`: `AccountsStorage`, the sqlx-backed `AccountStore`

pub mod models;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use models::{Account, NewAccount};
pub use schema::SQLITE_INIT;
pub use sqlite::{AccountsStorage, SqlitePool};
pub use store::{AccountStore, DynAccountStore};
