// Storefront database access (SQLite file shared with the shop)

pub mod sqlite;

pub use sqlite::*;
