//! Result cursor behavior over lazy and eager engine results.

use docshell_core::{BufferedResults, Document, Item, Value};
use proptest::prelude::*;

use crate::cursor::{PrintMode, ResultCursor};

fn mixed(docs: usize, values: usize) -> Vec<Item> {
    let mut items: Vec<Item> = (0..docs)
        .map(|i| Item::Document(Document::new(format!("doc{}", i), format!("<n>{}</n>", i))))
        .collect();
    items.extend((0..values).map(|i| Item::Value(Value::Int(i as i64))));
    items
}

#[test]
fn test_names_stop_at_first_value() {
    let mut cursor = ResultCursor::new(Box::new(BufferedResults::eager(mixed(2, 2))));
    let rendered = cursor.render(0, PrintMode::Names).unwrap();
    assert_eq!(rendered.lines, vec!["doc0", "doc1"]);
    assert!(rendered.values_without_names);
}

#[test]
fn test_content_prints_values_as_text() {
    let mut cursor = ResultCursor::new(Box::new(BufferedResults::lazy(mixed(1, 2))));
    let rendered = cursor.render(-1, PrintMode::Content).unwrap();
    assert_eq!(rendered.lines, vec!["<n>0</n>", "0", "1"]);
    assert!(!rendered.values_without_names);
}

proptest! {
    #[test]
    fn prop_lazy_count_then_iterate(n in 0usize..40) {
        let mut cursor = ResultCursor::new(Box::new(BufferedResults::lazy(mixed(n, 0))));
        let counted = cursor.count().unwrap();
        let mut seen = 0;
        while cursor.next_item().unwrap().is_some() {
            seen += 1;
        }
        prop_assert_eq!(counted, n);
        prop_assert_eq!(seen, counted);
    }

    #[test]
    fn prop_print_zero_prints_count(n in 0usize..40, lazy in any::<bool>()) {
        let items = mixed(n, 0);
        let stream = if lazy {
            BufferedResults::lazy(items)
        } else {
            BufferedResults::eager(items)
        };
        let mut cursor = ResultCursor::new(Box::new(stream));
        let all = cursor.render(0, PrintMode::Content).unwrap();
        prop_assert_eq!(all.lines.len(), cursor.count().unwrap());

        let unbounded = cursor.render(-1, PrintMode::Names).unwrap();
        prop_assert_eq!(unbounded.lines.len(), n);

        // each pass leaves the cursor rewound
        let again = cursor.render(0, PrintMode::Content).unwrap();
        prop_assert_eq!(again, all);
    }

    #[test]
    fn prop_positive_limit_caps_output(n in 0usize..20, limit in 1i64..30) {
        let mut cursor = ResultCursor::new(Box::new(BufferedResults::eager(mixed(n, 0))));
        let rendered = cursor.render(limit, PrintMode::Content).unwrap();
        prop_assert_eq!(rendered.lines.len(), n.min(limit as usize));
    }
}
