//! The reference engine's expression language
//!
//! A deliberately small language for exercising the shell end-to-end:
//!
//! | Form | Result |
//! |------|--------|
//! | `collection()` | every document in the default container |
//! | `collection('name')` | every document in the container with that name or alias |
//! | `doc('name')`, `doc('container/name')` | one document |
//! | `'text'`, `42` | a literal value |
//! | `(a, b, ...)` | the concatenated results |
//! | `.` | the context item |
//! | `$var` | an external variable |
//! | `count(e)`, `name(e)`, `string(e)` | count, document names, string values |
//! | `contains(e, 'text')` | items of `e` whose string value contains the text |

mod eval;
mod parser;

pub use parser::{parse, Expr, Function};

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::debug;

use docshell_core::{
    BufferedResults, Error, EvaluationMode, Expression, Item, QueryContext, Result, ResultStream,
    TxnId,
};

use crate::state::StoreState;
use eval::Evaluator;

/// Evaluate a parsed expression against the state visible to `txn`
pub(crate) fn evaluate(
    state: &StoreState,
    txn: Option<TxnId>,
    expr: &Expr,
    context: Option<&Item>,
    query: &QueryContext,
) -> Result<Box<dyn ResultStream>> {
    let started = Instant::now();
    let evaluator = Evaluator {
        containers: state.view(txn)?,
        handles: state.handles(),
        query,
        context,
    };
    let items = evaluator.eval(expr)?;

    let elapsed = started.elapsed();
    if query.timeout_secs > 0 && elapsed.as_secs_f64() > f64::from(query.timeout_secs) {
        return Err(Error::QueryTimeout {
            seconds: query.timeout_secs,
        });
    }
    debug!(target: "docshell::query", items = items.len(), elapsed_us = elapsed.as_micros() as u64, "Expression evaluated");

    Ok(match query.mode {
        EvaluationMode::Eager => Box::new(BufferedResults::eager(items)),
        EvaluationMode::Lazy => Box::new(BufferedResults::lazy(items)),
    })
}

/// Render the evaluation plan of a parsed expression as XML
pub fn render_plan(expr: &Expr) -> String {
    let mut out = String::from("<QueryPlan>\n");
    render_node(expr, 1, &mut out);
    out.push_str("</QueryPlan>");
    out
}

fn render_node(expr: &Expr, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match expr {
        Expr::Literal(value) => {
            out.push_str(&format!(
                "{}<Literal type=\"{}\">{}</Literal>\n",
                indent,
                value.type_name(),
                escape(&value.to_string())
            ));
        }
        Expr::ContextItem => out.push_str(&format!("{}<ContextItem/>\n", indent)),
        Expr::Variable(name) => {
            out.push_str(&format!("{}<Variable name=\"{}\"/>\n", indent, escape(name)));
        }
        Expr::Sequence(items) => {
            out.push_str(&format!("{}<Sequence>\n", indent));
            for item in items {
                render_node(item, depth + 1, out);
            }
            out.push_str(&format!("{}</Sequence>\n", indent));
        }
        Expr::Call { function, args } => {
            if args.is_empty() {
                out.push_str(&format!("{}<Function name=\"{}\"/>\n", indent, function.as_str()));
                return;
            }
            out.push_str(&format!("{}<Function name=\"{}\">\n", indent, function.as_str()));
            for arg in args {
                render_node(arg, depth + 1, out);
            }
            out.push_str(&format!("{}</Function>\n", indent));
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A parsed expression bound to the store it was prepared against
pub struct PreparedQuery {
    text: String,
    expr: Expr,
    state: Arc<RwLock<StoreState>>,
}

impl PreparedQuery {
    pub(crate) fn new(text: &str, state: Arc<RwLock<StoreState>>) -> Result<Self> {
        Ok(Self {
            text: text.to_string(),
            expr: parse(text)?,
            state,
        })
    }
}

impl Expression for PreparedQuery {
    fn text(&self) -> &str {
        &self.text
    }

    fn plan(&self) -> String {
        render_plan(&self.expr)
    }

    fn is_update(&self) -> bool {
        // The language has no updating forms
        false
    }

    fn execute(
        &self,
        txn: Option<TxnId>,
        context: Option<&Item>,
        query: &QueryContext,
    ) -> Result<Box<dyn ResultStream>> {
        let state = self.state.read();
        evaluate(&state, txn, &self.expr, context, query)
    }
}
