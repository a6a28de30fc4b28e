//! Error types for document store operations
//!
//! Every failure reported by a [`DocumentStore`](crate::traits::DocumentStore)
//! is an [`Error`]. Each variant belongs to an [`ErrorCategory`] and carries a
//! stable numeric code so the shell can render `[category] error code: message`.
//!
//! | Category | Variants |
//! |----------|----------|
//! | NotFound | `ContainerNotFound`, `DocumentNotFound`, `IndexNotFound`, `AliasNotFound` |
//! | Conflict | `ContainerExists`, `ContainerOpen`, `DocumentExists`, `UniqueConstraint` |
//! | Validation | `InvalidIndex`, `InvalidName`, `InvalidInput` |
//! | Query | `QuerySyntax`, `QueryEvaluation`, `QueryTimeout` |
//! | Transaction | `TransactionNotActive`, `TransactionsUnsupported` |
//! | Io | `Io`, `Serialization` |
//! | Internal | `Internal` |

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type alias for document store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A named entity does not exist
    NotFound,
    /// The operation collides with existing state
    Conflict,
    /// The request itself is malformed
    Validation,
    /// Query parsing or evaluation failed
    Query,
    /// Transaction lifecycle violation
    Transaction,
    /// File system or encoding failure
    Io,
    /// Bug or invariant violation inside the engine
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::NotFound => "NotFound",
            ErrorCategory::Conflict => "Conflict",
            ErrorCategory::Validation => "Validation",
            ErrorCategory::Query => "Query",
            ErrorCategory::Transaction => "Transaction",
            ErrorCategory::Io => "Io",
            ErrorCategory::Internal => "Internal",
        };
        f.write_str(name)
    }
}

/// Errors raised by a document store engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    // ==================== Not Found ====================
    /// Container does not exist (neither open nor on disk)
    #[error("container not found: {name}")]
    ContainerNotFound {
        /// Container name or alias
        name: String,
    },

    /// Document does not exist in the container
    #[error("document '{name}' not found in container '{container}'")]
    DocumentNotFound {
        /// Container name
        container: String,
        /// Document name
        name: String,
    },

    /// No index with this descriptor is defined for the node
    #[error("index {descriptor} is not defined for node ({uri}):{node}")]
    IndexNotFound {
        /// Index descriptor text
        descriptor: String,
        /// Namespace URI of the node
        uri: String,
        /// Node name
        node: String,
    },

    /// Alias is not attached to the container
    #[error("alias not found: {alias}")]
    AliasNotFound {
        /// Alias text
        alias: String,
    },

    // ==================== Conflict ====================
    /// Container already exists
    #[error("container already exists: {name}")]
    ContainerExists {
        /// Container name
        name: String,
    },

    /// Container is open and cannot be removed or rewritten
    #[error("container is open: {name}")]
    ContainerOpen {
        /// Container name
        name: String,
    },

    /// Document name already taken
    #[error("document '{name}' already exists in container '{container}'")]
    DocumentExists {
        /// Container name
        container: String,
        /// Document name
        name: String,
    },

    /// A unique index already holds this key
    #[error("unique index {descriptor} already contains key '{key}'")]
    UniqueConstraint {
        /// Index descriptor text
        descriptor: String,
        /// Duplicated key
        key: String,
    },

    // ==================== Validation ====================
    /// Index descriptor does not follow the grammar
    #[error("invalid index: {descriptor}")]
    InvalidIndex {
        /// Offending descriptor
        descriptor: String,
    },

    /// Invalid container or document name
    #[error("invalid name: {reason}")]
    InvalidName {
        /// Why the name was rejected
        reason: String,
    },

    /// Other malformed input
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Why the input was rejected
        reason: String,
    },

    // ==================== Query ====================
    /// Expression failed to parse
    #[error("query syntax error at offset {offset}: {reason}")]
    QuerySyntax {
        /// Byte offset of the failure
        offset: usize,
        /// Parser message
        reason: String,
    },

    /// Expression parsed but could not be evaluated
    #[error("query evaluation failed: {reason}")]
    QueryEvaluation {
        /// Evaluator message
        reason: String,
    },

    /// Evaluation exceeded the configured timeout
    #[error("query exceeded timeout of {seconds} seconds")]
    QueryTimeout {
        /// Configured timeout
        seconds: u32,
    },

    // ==================== Transaction ====================
    /// The transaction handle is unknown or already finished
    #[error("no active transaction")]
    TransactionNotActive,

    /// The store was opened without transaction support
    #[error("transactions are not enabled for this store")]
    TransactionsUnsupported,

    // ==================== Io ====================
    /// File system error
    #[error("I/O error: {reason}")]
    Io {
        /// Underlying error text
        reason: String,
    },

    /// Container file could not be encoded or decoded
    #[error("serialization error: {reason}")]
    Serialization {
        /// Underlying error text
        reason: String,
    },

    // ==================== Internal ====================
    /// Bug or invariant violation
    #[error("internal error: {reason}")]
    Internal {
        /// Description
        reason: String,
    },
}

impl Error {
    /// Category this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ContainerNotFound { .. }
            | Error::DocumentNotFound { .. }
            | Error::IndexNotFound { .. }
            | Error::AliasNotFound { .. } => ErrorCategory::NotFound,
            Error::ContainerExists { .. }
            | Error::ContainerOpen { .. }
            | Error::DocumentExists { .. }
            | Error::UniqueConstraint { .. } => ErrorCategory::Conflict,
            Error::InvalidIndex { .. } | Error::InvalidName { .. } | Error::InvalidInput { .. } => {
                ErrorCategory::Validation
            }
            Error::QuerySyntax { .. } | Error::QueryEvaluation { .. } | Error::QueryTimeout { .. } => {
                ErrorCategory::Query
            }
            Error::TransactionNotActive | Error::TransactionsUnsupported => {
                ErrorCategory::Transaction
            }
            Error::Io { .. } | Error::Serialization { .. } => ErrorCategory::Io,
            Error::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Stable numeric code, unique per variant
    pub fn code(&self) -> u32 {
        match self {
            Error::ContainerNotFound { .. } => 100,
            Error::DocumentNotFound { .. } => 101,
            Error::IndexNotFound { .. } => 102,
            Error::AliasNotFound { .. } => 103,
            Error::ContainerExists { .. } => 200,
            Error::ContainerOpen { .. } => 201,
            Error::DocumentExists { .. } => 202,
            Error::UniqueConstraint { .. } => 203,
            Error::InvalidIndex { .. } => 300,
            Error::InvalidName { .. } => 301,
            Error::InvalidInput { .. } => 302,
            Error::QuerySyntax { .. } => 400,
            Error::QueryEvaluation { .. } => 401,
            Error::QueryTimeout { .. } => 402,
            Error::TransactionNotActive => 500,
            Error::TransactionsUnsupported => 501,
            Error::Io { .. } => 600,
            Error::Serialization { .. } => 601,
            Error::Internal { .. } => 900,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_container_not_found() {
        let err = Error::ContainerNotFound {
            name: "books.dbxml".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("container not found"));
        assert!(msg.contains("books.dbxml"));
    }

    #[test]
    fn test_error_display_query_syntax() {
        let err = Error::QuerySyntax {
            offset: 7,
            reason: "unexpected ')'".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("offset 7"));
        assert!(msg.contains("unexpected ')'"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.category(), ErrorCategory::Io);
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            Error::TransactionNotActive.category(),
            ErrorCategory::Transaction
        );
        assert_eq!(
            Error::InvalidIndex {
                descriptor: "x".into()
            }
            .category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Error::UniqueConstraint {
                descriptor: "unique-node-metadata-equality-string".into(),
                key: "a".into()
            }
            .category(),
            ErrorCategory::Conflict
        );
    }

    #[test]
    fn test_codes_are_unique() {
        let errors = vec![
            Error::ContainerNotFound { name: String::new() },
            Error::DocumentNotFound {
                container: String::new(),
                name: String::new(),
            },
            Error::IndexNotFound {
                descriptor: String::new(),
                uri: String::new(),
                node: String::new(),
            },
            Error::AliasNotFound { alias: String::new() },
            Error::ContainerExists { name: String::new() },
            Error::ContainerOpen { name: String::new() },
            Error::DocumentExists {
                container: String::new(),
                name: String::new(),
            },
            Error::UniqueConstraint {
                descriptor: String::new(),
                key: String::new(),
            },
            Error::InvalidIndex { descriptor: String::new() },
            Error::InvalidName { reason: String::new() },
            Error::InvalidInput { reason: String::new() },
            Error::QuerySyntax {
                offset: 0,
                reason: String::new(),
            },
            Error::QueryEvaluation { reason: String::new() },
            Error::QueryTimeout { seconds: 1 },
            Error::TransactionNotActive,
            Error::TransactionsUnsupported,
            Error::Io { reason: String::new() },
            Error::Serialization { reason: String::new() },
            Error::Internal { reason: String::new() },
        ];
        let mut codes: Vec<u32> = errors.iter().map(Error::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
