//! The live result set of the last query or lookup.
//!
//! A cursor wraps the engine's [`ResultStream`]. Eager streams know their
//! size; lazy ones only learn it by scanning, after which the count is cached
//! and the stream rewound. Every full pass (count or print) leaves the
//! cursor at its first item.

use docshell_core::{Item, Result, ResultStream};

/// What `print` renders for each item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintMode {
    /// Document content or the value's string form
    Content,
    /// Document names
    Names,
}

/// Lines rendered by [`ResultCursor::render`]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Rendered {
    /// One entry per printed item
    pub lines: Vec<String>,
    /// Names were requested but the results hold values
    pub values_without_names: bool,
}

/// Result set held by the session
pub struct ResultCursor {
    stream: Box<dyn ResultStream>,
    scanned: Option<usize>,
}

impl ResultCursor {
    /// Wrap an engine stream
    pub fn new(stream: Box<dyn ResultStream>) -> Self {
        Self {
            stream,
            scanned: None,
        }
    }

    /// Count known without scanning
    pub fn known_count(&self) -> Option<usize> {
        self.stream.size().or(self.scanned)
    }

    /// Number of items, scanning a lazy stream once if needed
    pub fn count(&mut self) -> Result<usize> {
        if let Some(n) = self.known_count() {
            return Ok(n);
        }
        self.stream.reset();
        let mut n = 0;
        while self.stream.next_item()?.is_some() {
            n += 1;
        }
        self.stream.reset();
        self.scanned = Some(n);
        Ok(n)
    }

    /// Next item from the current position
    pub fn next_item(&mut self) -> Result<Option<Item>> {
        self.stream.next_item()
    }

    /// Rewind to the first item
    pub fn reset(&mut self) {
        self.stream.reset();
    }

    /// Render up to `limit` items from the start, then rewind
    ///
    /// `0` renders [`count`](Self::count) items, a negative limit renders
    /// until the stream is exhausted.
    pub fn render(&mut self, limit: i64, mode: PrintMode) -> Result<Rendered> {
        let max = match limit {
            0 => Some(self.count()?),
            n if n < 0 => None,
            n => Some(usize::try_from(n).unwrap_or(usize::MAX)),
        };

        self.stream.reset();
        let mut out = Rendered::default();
        while max.map_or(true, |m| out.lines.len() < m) {
            let Some(item) = self.stream.next_item()? else {
                break;
            };
            match (mode, item) {
                (PrintMode::Content, item) => out.lines.push(item.string_value()),
                (PrintMode::Names, Item::Document(doc)) => out.lines.push(doc.name),
                (PrintMode::Names, Item::Value(_)) => {
                    out.values_without_names = true;
                    break;
                }
            }
        }
        self.stream.reset();
        Ok(out)
    }
}

impl std::fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCursor")
            .field("size", &self.stream.size())
            .field("scanned", &self.scanned)
            .finish()
    }
}
