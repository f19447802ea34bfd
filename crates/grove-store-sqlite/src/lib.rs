//! SQLite backend for Grove: one database holding both the group table and
//! the policy tuples.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. [`SqliteStore`] implements both
//! [`GroupStore`](grove_core::store::GroupStore) and
//! [`PolicyStore`](grove_core::store::PolicyStore); the two are still driven
//! as independent stores by the service.

mod encode;
mod groups;
mod policies;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
