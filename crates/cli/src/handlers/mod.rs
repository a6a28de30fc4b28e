//! Command handlers, grouped by what they operate on.
//!
//! Each submodule declares its [`CommandSpec`]s next to the handler
//! functions and registers them in [`register_all`].

pub mod containers;
pub mod documents;
pub mod indexes;
pub mod meta;
pub mod query;
pub mod settings;
pub mod transaction;

use crate::commands::{CommandSpec, Registry};

/// Register every built-in command
pub fn register_all(registry: &mut Registry) {
    containers::register(registry);
    documents::register(registry);
    indexes::register(registry);
    meta::register(registry);
    query::register(registry);
    settings::register(registry);
    transaction::register(registry);
}

/// `1 result`, `2 results`
pub(crate) fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

/// Spec for a command taking a fixed range of arguments
pub(crate) const fn spec(
    name: &'static str,
    usage: &'static str,
    summary: &'static str,
    detail: &'static str,
    min_args: usize,
    max_args: usize,
) -> CommandSpec {
    CommandSpec {
        name,
        usage,
        summary,
        detail,
        min_args,
        max_args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural() {
        assert_eq!(plural(1, "document", "documents"), "1 document");
        assert_eq!(plural(0, "document", "documents"), "0 documents");
    }

    #[test]
    fn test_every_command_registered_once() {
        let registry = Registry::with_builtins();
        let mut names = registry.names();
        assert_eq!(names.len(), 47);
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 47);
    }
}
