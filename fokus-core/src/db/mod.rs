//! Database layer: SQLite schema and the session store

pub mod schema;
pub mod store;

pub use store::Database;
