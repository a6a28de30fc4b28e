//! Core types and traits for docshell
//!
//! This crate defines the vocabulary shared by the shell and any document
//! store engine:
//! - Error: engine error type with categories and stable codes
//! - Value, Document, Item: stored data and result items
//! - IndexDescriptor: the index descriptor grammar
//! - Types: container handles and config, query context, lookup operators
//! - Traits: DocumentStore, ResultStream, Expression

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod index;
pub mod traits;
pub mod types;
pub mod value;

pub use error::{Error, ErrorCategory, Result};
pub use index::{IndexDescriptor, KeyType, NodeType, PathType, SyntaxType, Uniqueness};
pub use traits::{BufferedResults, DocumentStore, Expression, ResultStream};
pub use types::{
    Capabilities, ContainerConfig, ContainerHandle, ContainerInfo, ContainerKind, EvaluationMode,
    IndexEntry, IndexLookup, KeyStatistics, LookupOperation, QueryContext, ReindexMode, TxnId,
};
pub use value::{Document, Item, MetadataKey, Value, NAME_METADATA_NODE, NAME_METADATA_URI};
