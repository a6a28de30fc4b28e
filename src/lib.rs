//! docshell - interactive command shell for a hierarchical document store
//!
//! The shell itself lives in the `docshell` binary (crate `docshell-cli`).
//! This crate re-exports the pieces a library user needs to drive a store
//! directly:
//!
//! ```ignore
//! use docshell::{ContainerConfig, Database, Document, DocumentStore, OpenOptions};
//!
//! let db = Database::open("/tmp/home", OpenOptions::default())?;
//! let books = db.create_container(None, "books.dbxml", &ContainerConfig::default())?;
//! db.put_document(None, &books, Document::new("dune", "<book/>"), false)?;
//! ```
//!
//! # Architecture
//!
//! - `docshell-core`: errors, values, the index descriptor grammar and the
//!   `DocumentStore` trait
//! - `docshell-engine`: the reference `DocumentStore`

pub use docshell_core::*;
pub use docshell_engine::{render_plan, Database, OpenOptions, StoreConfig, CONFIG_FILE_NAME};
