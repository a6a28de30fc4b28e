//! Argument tokenizing and validation helpers.
//!
//! Command lines are split POSIX-style with `shlex`: whitespace separates
//! arguments, quotes group text, and `""` yields an empty argument that keeps
//! its position. A leading `#` is ordinary text inside a line. Handlers then check arity and literal options through the
//! helpers here so every failure carries the command's usage line.

use std::borrow::Cow;

use docshell_core::IndexDescriptor;
use regex::Regex;

use crate::commands::CommandSpec;
use crate::error::{Result, ShellError};

/// Split a raw argument string; `None` on unbalanced quotes
///
/// A word may start with `#`; only whole lines are comments.
pub fn tokenize(raw: &str) -> Option<Vec<String>> {
    shlex::split(&escape_word_hashes(raw))
}

/// Backslash-escape every `#` that starts a word outside quotes
///
/// `shlex` would otherwise drop the rest of the line as a comment.
fn escape_word_hashes(raw: &str) -> Cow<'_, str> {
    if !raw.contains('#') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len() + 4);
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut word_start = true;
    for ch in raw.chars() {
        if escaped {
            escaped = false;
            out.push(ch);
            continue;
        }
        match quote {
            Some('\'') => {
                if ch == '\'' {
                    quote = None;
                }
            }
            Some(_) => match ch {
                '\\' => escaped = true,
                '"' => quote = None,
                _ => {}
            },
            None => match ch {
                '\\' => escaped = true,
                '\'' | '"' => quote = Some(ch),
                '#' if word_start => out.push('\\'),
                _ => {}
            },
        }
        word_start = quote.is_none() && !escaped && ch.is_whitespace();
        out.push(ch);
    }
    Cow::Owned(out)
}

/// Split the first word off a command line
pub fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], line[pos..].trim_start()),
        None => (line, ""),
    }
}

/// Build a validation failure for `spec`
pub fn validation(spec: &CommandSpec, message: impl Into<String>) -> ShellError {
    ShellError::Validation {
        message: message.into(),
        usage: spec.usage.to_string(),
    }
}

fn malformed(spec: &CommandSpec, message: &str) -> ShellError {
    ShellError::MalformedArgs {
        message: message.to_string(),
        usage: spec.usage.to_string(),
    }
}

/// Tokenize `raw` and check it against the command's arity
pub fn split_args(spec: &CommandSpec, raw: &str) -> Result<Vec<String>> {
    if raw.trim().is_empty() && spec.min_args > 0 {
        return Err(malformed(spec, "missing parameters"));
    }
    let args = tokenize(raw).ok_or_else(|| malformed(spec, "unbalanced quotes in arguments"))?;
    if args.len() < spec.min_args || args.len() > spec.max_args {
        return Err(validation(spec, "invalid number of arguments."));
    }
    Ok(args)
}

/// Case-insensitive match of `token` against one of `allowed`
///
/// Returns the allowed spelling that matched.
pub fn expect_literal(
    spec: &CommandSpec,
    token: &str,
    allowed: &[&'static str],
) -> Result<&'static str> {
    allowed
        .iter()
        .copied()
        .find(|a| a.eq_ignore_ascii_case(token))
        .ok_or_else(|| {
            validation(
                spec,
                format!("invalid argument '{}'; expected one of: {}", token, allowed.join(", ")),
            )
        })
}

/// Parse an `on`/`off` switch
pub fn parse_switch(spec: &CommandSpec, token: &str) -> Result<bool> {
    Ok(expect_literal(spec, token, &["on", "off"])? == "on")
}

/// Parse a switch that also accepts `true`/`false`
pub fn parse_bool_switch(spec: &CommandSpec, token: &str) -> Result<bool> {
    let lit = expect_literal(spec, token, &["on", "off", "true", "false"])?;
    Ok(lit == "on" || lit == "true")
}

/// Parse an index descriptor, failing with `Invalid index: <text>`
pub fn parse_descriptor(spec: &CommandSpec, token: &str) -> Result<IndexDescriptor> {
    IndexDescriptor::parse(token).ok_or_else(|| validation(spec, format!("Invalid index: {}", token)))
}

/// True when `token` starts with a URI scheme followed by at least one character
pub fn looks_like_uri(token: &str) -> bool {
    let Some(colon) = token.find(':') else {
        return false;
    };
    let scheme = &token[..colon];
    let mut chars = scheme.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    starts_alpha
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
        && token.len() > colon + 1
}

/// Convert a shell glob (`*`, `?`) into an anchored regex
pub fn glob_to_regex(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
}

// =========================================================================
// Continuation lines
// =========================================================================

/// Joins lines ending in `\` with the lines that follow them
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: String,
    continued: bool,
}

impl LineAssembler {
    /// New assembler with nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one physical line; returns a complete logical line when ready
    ///
    /// A trailing ` \` (whitespace, then backslash) is stripped and the text
    /// before the backslash is kept verbatim, so `foo a b \` then `c d`
    /// yields `foo a b c d`. A backslash glued to a word, as in `C:\dir\`,
    /// is ordinary text.
    pub fn push(&mut self, line: &str) -> Option<String> {
        let line = line.trim_end_matches(['\r', '\n']);
        let marker = line
            .strip_suffix('\\')
            .filter(|head| head.ends_with(char::is_whitespace));
        match marker {
            Some(head) => {
                self.pending.push_str(head);
                self.continued = true;
                None
            }
            None => {
                self.pending.push_str(line);
                self.continued = false;
                Some(std::mem::take(&mut self.pending))
            }
        }
    }

    /// True while a continued line is waiting for more input
    pub fn is_continued(&self) -> bool {
        self.continued
    }

    /// Flush whatever is pending at end of input
    pub fn finish(&mut self) -> Option<String> {
        self.continued = false;
        let rest = std::mem::take(&mut self.pending);
        (!rest.trim().is_empty()).then_some(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: CommandSpec = CommandSpec {
        name: "demo",
        usage: "demo <a> [b]",
        summary: "",
        detail: "",
        min_args: 1,
        max_args: 2,
    };

    #[test]
    fn test_tokenize_quotes_and_empty_args() {
        assert_eq!(
            tokenize(r#"a "b c" '' d"#).unwrap(),
            vec!["a", "b c", "", "d"]
        );
        assert!(tokenize(r#"a "b"#).is_none());
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("  query   'x y' f "), ("query", "'x y' f"));
        assert_eq!(split_command("sync"), ("sync", ""));
    }

    #[test]
    fn test_split_args_arity() {
        assert!(matches!(
            split_args(&SPEC, "   "),
            Err(ShellError::MalformedArgs { .. })
        ));
        assert!(matches!(
            split_args(&SPEC, "a b c"),
            Err(ShellError::Validation { .. })
        ));
        assert!(matches!(
            split_args(&SPEC, "'a"),
            Err(ShellError::MalformedArgs { .. })
        ));
        assert_eq!(split_args(&SPEC, "a \"\"").unwrap(), vec!["a", ""]);
    }

    #[test]
    fn test_switches() {
        assert!(parse_switch(&SPEC, "ON").unwrap());
        assert!(!parse_switch(&SPEC, "off").unwrap());
        assert!(parse_switch(&SPEC, "true").is_err());
        assert!(parse_bool_switch(&SPEC, "True").unwrap());
        assert!(!parse_bool_switch(&SPEC, "false").unwrap());
    }

    #[test]
    fn test_descriptor_validation_message() {
        let err = parse_descriptor(&SPEC, "node-element-presence-string").unwrap_err();
        assert_eq!(err.to_string(), "Invalid index: node-element-presence-string");
        assert!(parse_descriptor(&SPEC, "edge-attribute-equality-integer").is_ok());
    }

    #[test]
    fn test_uri_detection() {
        assert!(looks_like_uri("http://example.com"));
        assert!(looks_like_uri("urn:x"));
        assert!(!looks_like_uri("urn:"));
        assert!(!looks_like_uri("1abc:x"));
        assert!(!looks_like_uri("title"));
        assert!(!looks_like_uri(":x"));
    }

    #[test]
    fn test_glob_to_regex() {
        let re = glob_to_regex("*.xml").unwrap();
        assert!(re.is_match("a.xml"));
        assert!(!re.is_match("a.xmlx"));
        assert!(!re.is_match("axml"));
        let re = glob_to_regex("b?.txt").unwrap();
        assert!(re.is_match("b1.txt"));
        assert!(!re.is_match("b12.txt"));
    }

    #[test]
    fn test_tokenize_keeps_word_leading_hash() {
        assert_eq!(tokenize("a #b c").unwrap(), vec!["a", "#b", "c"]);
        assert_eq!(tokenize("tag #blue").unwrap(), vec!["tag", "#blue"]);
        assert_eq!(tokenize("#first").unwrap(), vec!["#first"]);
        assert_eq!(tokenize("a#b").unwrap(), vec!["a#b"]);
        assert_eq!(tokenize("'#x' \"#y z\"").unwrap(), vec!["#x", "#y z"]);
        assert_eq!(tokenize("\\#lit").unwrap(), vec!["#lit"]);
    }

    #[test]
    fn test_backslash_without_space_is_not_continuation() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.push("echo C:\\dir\\").as_deref(), Some("echo C:\\dir\\"));
        assert!(!asm.is_continued());
        assert_eq!(asm.push("\\").as_deref(), Some("\\"));
    }

    #[test]
    fn test_continuation_joins_verbatim() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.push("foo a b \\"), None);
        assert!(asm.is_continued());
        let joined = asm.push("c d").unwrap();
        assert_eq!(joined, "foo a b c d");
        assert_eq!(tokenize(&joined), tokenize("foo a b c d"));
        assert!(!asm.is_continued());
    }

    #[test]
    fn test_continuation_flush_at_end() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.push("sync \\"), None);
        assert_eq!(asm.finish().as_deref(), Some("sync "));
        assert_eq!(asm.finish(), None);
    }
}
