//! Index key extraction and comparison
//!
//! The reference engine keeps no index structures. Lookups and statistics
//! re-derive keys from document text on demand:
//!
//! | Node type | Key source |
//! |-----------|-----------|
//! | metadata | the document's metadata entry `(uri, node)` |
//! | element | text of every `<node>text</node>` occurrence |
//! | attribute | value of every `node="value"` occurrence |
//!
//! Presence indexes record the node name once per occurrence.

use std::cmp::Ordering;

use regex::Regex;

use docshell_core::{Document, IndexDescriptor, KeyType, LookupOperation, NodeType, PathType, Value};

/// Optional XML prefix in front of a local name
const PREFIX: &str = r"(?:[A-Za-z_][\w.-]*:)?";

/// Keys `doc` contributes to the index `(descriptor, uri, node)`
///
/// For edge indexes `parent` names the parent element; a document that lacks
/// it contributes nothing.
pub fn extract(
    doc: &Document,
    descriptor: &IndexDescriptor,
    uri: &str,
    node: &str,
    parent: Option<(&str, &str)>,
) -> Vec<String> {
    if descriptor.path == PathType::Edge {
        if let Some((_, parent_node)) = parent {
            if !has_element(&doc.content, parent_node) {
                return Vec::new();
            }
        }
    }

    let values = match descriptor.node {
        NodeType::Metadata => doc
            .metadata_value(uri, node)
            .map(|v| vec![v.to_string()])
            .unwrap_or_default(),
        NodeType::Element => element_values(&doc.content, node),
        NodeType::Attribute => attribute_values(&doc.content, node),
    };

    match descriptor.key {
        KeyType::Presence => values.iter().map(|_| node.to_string()).collect(),
        KeyType::Equality | KeyType::Substring => values,
    }
}

/// Whether `key` satisfies `op operand` under the index's syntax
pub fn satisfies(
    key: &str,
    op: LookupOperation,
    operand: &Value,
    descriptor: &IndexDescriptor,
) -> bool {
    let operand_text = operand.to_string();

    if descriptor.key == KeyType::Substring && op == LookupOperation::Equal {
        return key.contains(operand_text.as_str());
    }

    let ordering = if descriptor.syntax.is_numeric() {
        match (key.trim().parse::<f64>(), operand.as_f64()) {
            (Ok(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        }
    } else {
        Some(key.cmp(operand_text.as_str()))
    };

    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        LookupOperation::Equal => ordering == Ordering::Equal,
        LookupOperation::LessThan => ordering == Ordering::Less,
        LookupOperation::LessThanOrEqual => ordering != Ordering::Greater,
        LookupOperation::GreaterThan => ordering == Ordering::Greater,
        LookupOperation::GreaterThanOrEqual => ordering != Ordering::Less,
    }
}

fn element_values(content: &str, node: &str) -> Vec<String> {
    if node.is_empty() {
        return Vec::new();
    }
    let name = regex::escape(node);
    let pattern = format!(
        r"<{PREFIX}{name}(?:\s[^>]*)?>([^<]*)</{PREFIX}{name}\s*>"
    );
    match Regex::new(&pattern) {
        Ok(re) => re
            .captures_iter(content)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn attribute_values(content: &str, node: &str) -> Vec<String> {
    if node.is_empty() {
        return Vec::new();
    }
    let name = regex::escape(node);
    let pattern = format!(r#"\s{PREFIX}{name}\s*=\s*(?:"([^"]*)"|'([^']*)')"#);
    match Regex::new(&pattern) {
        Ok(re) => re
            .captures_iter(content)
            .filter_map(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn has_element(content: &str, node: &str) -> bool {
    let pattern = format!(r"<{PREFIX}{}[\s/>]", regex::escape(node));
    Regex::new(&pattern)
        .map(|re| re.is_match(content))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshell_core::MetadataKey;

    const BOOK: &str = r#"<library><book id="b1" lang='en'><title>Dune</title><price>9.50</price></book><book id="b2"><title>Emma</title><price>12</price></book></library>"#;

    fn desc(s: &str) -> IndexDescriptor {
        s.parse().unwrap()
    }

    #[test]
    fn test_element_values() {
        let doc = Document::new("d", BOOK);
        let keys = extract(&doc, &desc("node-element-equality-string"), "", "title", None);
        assert_eq!(keys, vec!["Dune", "Emma"]);
    }

    #[test]
    fn test_element_with_prefix_and_attributes() {
        let doc = Document::new("d", r#"<x:title lang="en">Ulysses</x:title>"#);
        let keys = extract(&doc, &desc("node-element-equality-string"), "", "title", None);
        assert_eq!(keys, vec!["Ulysses"]);
    }

    #[test]
    fn test_attribute_values_both_quote_styles() {
        let doc = Document::new("d", BOOK);
        let ids = extract(&doc, &desc("node-attribute-equality-string"), "", "id", None);
        assert_eq!(ids, vec!["b1", "b2"]);
        let lang = extract(&doc, &desc("node-attribute-equality-string"), "", "lang", None);
        assert_eq!(lang, vec!["en"]);
    }

    #[test]
    fn test_metadata_value() {
        let mut doc = Document::new("d", "<a/>");
        doc.metadata
            .insert(MetadataKey::new("urn:m", "author"), Value::from("ann"));
        let keys = extract(&doc, &desc("node-metadata-equality-string"), "urn:m", "author", None);
        assert_eq!(keys, vec!["ann"]);
        let none = extract(&doc, &desc("node-metadata-equality-string"), "", "author", None);
        assert!(none.is_empty());
    }

    #[test]
    fn test_presence_keys_are_node_names() {
        let doc = Document::new("d", BOOK);
        let keys = extract(&doc, &desc("node-element-presence-none"), "", "price", None);
        assert_eq!(keys, vec!["price", "price"]);
    }

    #[test]
    fn test_edge_requires_parent() {
        let doc = Document::new("d", BOOK);
        let d = desc("edge-element-equality-string");
        assert_eq!(extract(&doc, &d, "", "title", Some(("", "book"))).len(), 2);
        assert!(extract(&doc, &d, "", "title", Some(("", "magazine"))).is_empty());
    }

    #[test]
    fn test_numeric_comparison() {
        let d = desc("node-element-equality-decimal");
        assert!(satisfies("9.50", LookupOperation::LessThan, &Value::Int(10), &d));
        assert!(satisfies("12", LookupOperation::GreaterThanOrEqual, &Value::from("12.0"), &d));
        assert!(!satisfies("abc", LookupOperation::Equal, &Value::Int(1), &d));
    }

    #[test]
    fn test_lexical_comparison() {
        let d = desc("node-element-equality-string");
        // "9.50" sorts after "12" as text
        assert!(satisfies("9.50", LookupOperation::GreaterThan, &Value::from("12"), &d));
        assert!(satisfies("Dune", LookupOperation::Equal, &Value::from("Dune"), &d));
        assert!(satisfies("Dune", LookupOperation::LessThanOrEqual, &Value::from("Emma"), &d));
    }

    #[test]
    fn test_substring_equality_matches_contained_text() {
        let d = desc("node-element-substring-string");
        assert!(satisfies("Dune Messiah", LookupOperation::Equal, &Value::from("Mess"), &d));
        assert!(!satisfies("Dune", LookupOperation::Equal, &Value::from("Mess"), &d));
    }
}
