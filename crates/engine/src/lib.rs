//! Reference document store engine for docshell
//!
//! This crate implements [`docshell_core::DocumentStore`]:
//! - Database: store rooted at a home directory, `docshell.toml` config
//! - Containers: in-memory state persisted as one JSON file per named container
//! - Transactions: snapshot-and-swap over the loaded containers
//! - Query: a small expression language with plans and lazy/eager results
//! - Keys: index key extraction for lookups and statistics

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod container;
pub mod database;
pub mod keys;
pub mod query;
mod state;

pub use container::ContainerData;
pub use database::{Database, OpenOptions, StoreConfig, CONFIG_FILE_NAME};
pub use query::{render_plan, PreparedQuery};
