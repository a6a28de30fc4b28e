//! Tokenizer and recursive-descent parser for the expression language
//!
//! ```text
//! expr     := item ("," item)*
//! item     := literal | "." | "$" name | call | "(" [expr] ")"
//! call     := name "(" [expr] ")"
//! literal  := string | integer
//! ```

use docshell_core::{Error, Result, Value};

/// Functions the evaluator understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// `collection()` or `collection('name')`
    Collection,
    /// `doc('name')` or `doc('container/name')`
    Doc,
    /// `count(e)`
    Count,
    /// `name(e)`
    Name,
    /// `string(e)`
    String,
    /// `contains(e, 'text')`
    Contains,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        // Accept the conventional fn: prefix
        let local = name.strip_prefix("fn:").unwrap_or(name);
        match local {
            "collection" => Some(Function::Collection),
            "doc" => Some(Function::Doc),
            "count" => Some(Function::Count),
            "name" => Some(Function::Name),
            "string" => Some(Function::String),
            "contains" => Some(Function::Contains),
            _ => None,
        }
    }

    /// Accepted argument counts, inclusive
    fn arity(&self) -> (usize, usize) {
        match self {
            Function::Collection => (0, 1),
            Function::Doc | Function::Count | Function::Name | Function::String => (1, 1),
            Function::Contains => (2, 2),
        }
    }

    /// Function name as written
    pub fn as_str(&self) -> &'static str {
        match self {
            Function::Collection => "collection",
            Function::Doc => "doc",
            Function::Count => "count",
            Function::Name => "name",
            Function::String => "string",
            Function::Contains => "contains",
        }
    }
}

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// String or integer literal
    Literal(Value),
    /// Comma-separated sequence
    Sequence(Vec<Expr>),
    /// `.`
    ContextItem,
    /// `$name`
    Variable(String),
    /// Function call
    Call {
        /// Called function
        function: Function,
        /// Arguments in order
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Comma,
    Dot,
    Variable(String),
    Name(String),
    Str(String),
    Int(i64),
}

/// Parse expression text into a tree
pub fn parse(text: &str) -> Result<Expr> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(syntax(0, "empty expression"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: text.len(),
    };
    let expr = parser.sequence()?;
    if let Some((offset, token)) = parser.tokens.get(parser.pos) {
        return Err(syntax(*offset, &format!("unexpected {:?}", token)));
    }
    Ok(expr)
}

fn syntax(offset: usize, reason: &str) -> Error {
    Error::QuerySyntax {
        offset,
        reason: reason.to_string(),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push((offset, Token::LParen));
            }
            ')' => {
                chars.next();
                tokens.push((offset, Token::RParen));
            }
            ',' => {
                chars.next();
                tokens.push((offset, Token::Comma));
            }
            '.' => {
                chars.next();
                tokens.push((offset, Token::Dot));
            }
            '$' => {
                chars.next();
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !is_name_char(c) {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                if name.is_empty() {
                    return Err(syntax(offset, "expected variable name after '$'"));
                }
                tokens.push((offset, Token::Variable(name)));
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    if c == quote {
                        // A doubled quote stands for itself
                        if chars.peek().map(|&(_, n)| n) == Some(quote) {
                            chars.next();
                            value.push(quote);
                            continue;
                        }
                        closed = true;
                        break;
                    }
                    value.push(c);
                }
                if !closed {
                    return Err(syntax(offset, "unterminated string literal"));
                }
                tokens.push((offset, Token::Str(value)));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut digits = String::new();
                digits.push(c);
                chars.next();
                while let Some(&(_, c)) = chars.peek() {
                    if !c.is_ascii_digit() {
                        break;
                    }
                    digits.push(c);
                    chars.next();
                }
                let value = digits
                    .parse::<i64>()
                    .map_err(|_| syntax(offset, &format!("invalid integer '{}'", digits)))?;
                tokens.push((offset, Token::Int(value)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !is_name_char(c) {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                tokens.push((offset, Token::Name(name)));
            }
            other => return Err(syntax(offset, &format!("unexpected character '{}'", other))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(o, _)| *o).unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_rparen(&mut self) -> Result<()> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::RParen) => Ok(()),
            Some(other) => Err(syntax(offset, &format!("expected ')', found {:?}", other))),
            None => Err(syntax(offset, "expected ')', found end of expression")),
        }
    }

    fn sequence(&mut self) -> Result<Expr> {
        let first = self.item()?;
        if self.peek() != Some(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.peek() == Some(&Token::Comma) {
            self.advance();
            items.push(self.item()?);
        }
        Ok(Expr::Sequence(items))
    }

    /// Contents of a parenthesised list, after the opening paren
    fn list(&mut self) -> Result<Vec<Expr>> {
        if self.peek() == Some(&Token::RParen) {
            self.advance();
            return Ok(Vec::new());
        }
        let items = match self.sequence()? {
            Expr::Sequence(items) => items,
            single => vec![single],
        };
        self.expect_rparen()?;
        Ok(items)
    }

    fn item(&mut self) -> Result<Expr> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Token::Dot) => Ok(Expr::ContextItem),
            Some(Token::Variable(name)) => Ok(Expr::Variable(name)),
            Some(Token::LParen) => {
                let items = self.list()?;
                Ok(if items.len() == 1 {
                    items.into_iter().next().unwrap_or(Expr::Sequence(Vec::new()))
                } else {
                    Expr::Sequence(items)
                })
            }
            Some(Token::Name(name)) => {
                let function = Function::lookup(&name)
                    .ok_or_else(|| syntax(offset, &format!("unknown function '{}'", name)))?;
                let paren_offset = self.offset();
                if self.advance() != Some(Token::LParen) {
                    return Err(syntax(paren_offset, &format!("expected '(' after '{}'", name)));
                }
                let args = self.list()?;
                let (min, max) = function.arity();
                if args.len() < min || args.len() > max {
                    return Err(syntax(
                        offset,
                        &format!(
                            "{}() takes {} argument(s), got {}",
                            function.as_str(),
                            if min == max {
                                min.to_string()
                            } else {
                                format!("{}-{}", min, max)
                            },
                            args.len()
                        ),
                    ));
                }
                Ok(Expr::Call { function, args })
            }
            Some(other) => Err(syntax(offset, &format!("unexpected {:?}", other))),
            None => Err(syntax(offset, "unexpected end of expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collection() {
        assert_eq!(
            parse("collection()").unwrap(),
            Expr::Call {
                function: Function::Collection,
                args: vec![]
            }
        );
        assert_eq!(
            parse("fn:collection('books')").unwrap(),
            Expr::Call {
                function: Function::Collection,
                args: vec![Expr::Literal(Value::from("books"))]
            }
        );
    }

    #[test]
    fn test_parse_sequence_and_nesting() {
        let expr = parse("count((1, 2, 'x'))").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                function: Function::Count,
                args: vec![Expr::Sequence(vec![
                    Expr::Literal(Value::Int(1)),
                    Expr::Literal(Value::Int(2)),
                    Expr::Literal(Value::from("x")),
                ])]
            }
        );
    }

    #[test]
    fn test_top_level_sequence() {
        assert!(matches!(parse("1, 2").unwrap(), Expr::Sequence(v) if v.len() == 2));
    }

    #[test]
    fn test_variables_and_context() {
        assert_eq!(parse("$title").unwrap(), Expr::Variable("title".into()));
        assert_eq!(parse(" . ").unwrap(), Expr::ContextItem);
    }

    #[test]
    fn test_doubled_quote_escape() {
        assert_eq!(parse("'it''s'").unwrap(), Expr::Literal(Value::from("it's")));
    }

    #[test]
    fn test_negative_integer() {
        assert_eq!(parse("-5").unwrap(), Expr::Literal(Value::Int(-5)));
    }

    #[test]
    fn test_syntax_errors_carry_offsets() {
        match parse("count(1").unwrap_err() {
            Error::QuerySyntax { offset, .. } => assert_eq!(offset, 7),
            other => panic!("unexpected error {:?}", other),
        }
        match parse("frobnicate()").unwrap_err() {
            Error::QuerySyntax { offset, reason } => {
                assert_eq!(offset, 0);
                assert!(reason.contains("frobnicate"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(parse("").is_err());
        assert!(parse("'open").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("contains('a')").is_err());
    }
}
