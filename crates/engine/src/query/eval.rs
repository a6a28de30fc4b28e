//! Expression evaluation against a container view

use std::collections::HashMap;

use docshell_core::{ContainerHandle, Error, Item, QueryContext, Result, Value};

use crate::container::{ContainerData, ContainerKey};
use crate::query::parser::{Expr, Function};
use crate::state::Containers;

pub(crate) struct Evaluator<'a> {
    pub containers: &'a Containers,
    pub handles: &'a HashMap<u64, ContainerKey>,
    pub query: &'a QueryContext,
    pub context: Option<&'a Item>,
}

fn evaluation(reason: impl Into<String>) -> Error {
    Error::QueryEvaluation {
        reason: reason.into(),
    }
}

impl<'a> Evaluator<'a> {
    pub fn eval(&self, expr: &Expr) -> Result<Vec<Item>> {
        match expr {
            Expr::Literal(value) => Ok(vec![Item::Value(value.clone())]),
            Expr::Sequence(items) => {
                let mut out = Vec::new();
                for item in items {
                    out.extend(self.eval(item)?);
                }
                Ok(out)
            }
            Expr::ContextItem => self
                .context
                .cloned()
                .map(|item| vec![item])
                .ok_or_else(|| evaluation("context item is undefined")),
            Expr::Variable(name) => self
                .query
                .variables
                .get(name)
                .cloned()
                .map(|v| vec![Item::Value(v)])
                .ok_or_else(|| evaluation(format!("undefined variable ${}", name))),
            Expr::Call { function, args } => self.call(*function, args),
        }
    }

    fn call(&self, function: Function, args: &[Expr]) -> Result<Vec<Item>> {
        match function {
            Function::Collection => {
                let container = match args.first() {
                    Some(arg) => {
                        let name = self.single_string(arg, "collection")?;
                        self.named_container(&name)?
                    }
                    None => self.default_container()?,
                };
                Ok(container
                    .documents
                    .values()
                    .cloned()
                    .map(Item::Document)
                    .collect())
            }
            Function::Doc => {
                let path = self.single_string(&args[0], "doc")?;
                let (container, name) = match path.rsplit_once('/') {
                    Some((c, n)) => (self.named_container(c)?, n.to_string()),
                    None => (self.default_container()?, path),
                };
                container
                    .documents
                    .get(&name)
                    .cloned()
                    .map(|d| vec![Item::Document(d)])
                    .ok_or_else(|| Error::DocumentNotFound {
                        container: container.name.clone(),
                        name,
                    })
            }
            Function::Count => {
                let n = self.eval(&args[0])?.len();
                Ok(vec![Item::Value(Value::Int(n as i64))])
            }
            Function::Name => self
                .eval(&args[0])?
                .into_iter()
                .map(|item| match item {
                    Item::Document(doc) => Ok(Item::Value(Value::String(doc.name))),
                    Item::Value(v) => Err(evaluation(format!(
                        "name() requires documents, got {} value",
                        v.type_name()
                    ))),
                })
                .collect(),
            Function::String => Ok(self
                .eval(&args[0])?
                .into_iter()
                .map(|item| Item::Value(Value::String(item.string_value())))
                .collect()),
            Function::Contains => {
                let needle = self.single_string(&args[1], "contains")?;
                Ok(self
                    .eval(&args[0])?
                    .into_iter()
                    .filter(|item| item.string_value().contains(needle.as_str()))
                    .collect())
            }
        }
    }

    /// Evaluate `expr` to exactly one item and take its string value
    fn single_string(&self, expr: &Expr, function: &str) -> Result<String> {
        let mut items = self.eval(expr)?;
        if items.len() != 1 {
            return Err(evaluation(format!(
                "{}() expects a single string argument, got {} items",
                function,
                items.len()
            )));
        }
        Ok(items.remove(0).string_value())
    }

    fn named_container(&self, name: &str) -> Result<&'a ContainerData> {
        self.containers
            .values()
            .find(|c| c.answers_to(name))
            .ok_or_else(|| Error::ContainerNotFound {
                name: name.to_string(),
            })
    }

    fn default_container(&self) -> Result<&'a ContainerData> {
        let handle: &ContainerHandle = self
            .query
            .default_collection
            .as_ref()
            .ok_or_else(|| evaluation("no default collection; open a container first"))?;
        self.handles
            .get(&handle.id)
            .and_then(|key| self.containers.get(key))
            .ok_or_else(|| Error::ContainerNotFound {
                name: handle.display_name().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;
    use docshell_core::{ContainerConfig, Document};

    struct Fixture {
        containers: Containers,
        handles: HashMap<u64, ContainerKey>,
        query: QueryContext,
    }

    fn fixture() -> Fixture {
        let mut books = ContainerData::new("books.dbxml", &ContainerConfig::default());
        books.aliases.push("books".to_string());
        for (name, content) in [
            ("dune", "<book><title>Dune</title></book>"),
            ("emma", "<book><title>Emma</title></book>"),
        ] {
            books
                .documents
                .insert(name.to_string(), Document::new(name, content));
        }
        let mut containers = Containers::new();
        let key = ContainerKey::Named("books.dbxml".to_string());
        containers.insert(key.clone(), books);
        let mut handles = HashMap::new();
        handles.insert(1, key);
        let query = QueryContext {
            default_collection: Some(ContainerHandle {
                id: 1,
                name: "books.dbxml".to_string(),
            }),
            ..QueryContext::default()
        };
        Fixture {
            containers,
            handles,
            query,
        }
    }

    fn run(f: &Fixture, text: &str) -> Result<Vec<Item>> {
        run_with(f, text, None)
    }

    fn run_with(f: &Fixture, text: &str, context: Option<&Item>) -> Result<Vec<Item>> {
        let expr = parse(text)?;
        Evaluator {
            containers: &f.containers,
            handles: &f.handles,
            query: &f.query,
            context,
        }
        .eval(&expr)
    }

    #[test]
    fn test_collection_default_and_alias() {
        let f = fixture();
        assert_eq!(run(&f, "collection()").unwrap().len(), 2);
        assert_eq!(run(&f, "collection('books')").unwrap().len(), 2);
        assert!(matches!(
            run(&f, "collection('nope')"),
            Err(Error::ContainerNotFound { .. })
        ));
    }

    #[test]
    fn test_doc_forms() {
        let f = fixture();
        let items = run(&f, "doc('books/emma')").unwrap();
        assert_eq!(items[0].as_document().unwrap().name, "emma");
        assert_eq!(run(&f, "doc('dune')").unwrap().len(), 1);
        assert!(matches!(
            run(&f, "doc('missing')"),
            Err(Error::DocumentNotFound { .. })
        ));
    }

    #[test]
    fn test_count_name_string_contains() {
        let f = fixture();
        assert_eq!(
            run(&f, "count(collection())").unwrap(),
            vec![Item::Value(Value::Int(2))]
        );
        assert_eq!(
            run(&f, "name(contains(collection(), 'Emma'))").unwrap(),
            vec![Item::Value(Value::from("emma"))]
        );
        assert_eq!(
            run(&f, "string(42)").unwrap(),
            vec![Item::Value(Value::from("42"))]
        );
        assert!(run(&f, "name('x')").is_err());
    }

    #[test]
    fn test_variables() {
        let mut f = fixture();
        f.query.variables.insert("t".to_string(), Value::from("Dune"));
        assert_eq!(
            run(&f, "count(contains(collection(), $t))").unwrap(),
            vec![Item::Value(Value::Int(1))]
        );
        assert!(run(&f, "$undefined").is_err());
    }

    #[test]
    fn test_context_item() {
        let f = fixture();
        let ctx = Item::Value(Value::from("abc"));
        assert_eq!(run_with(&f, ".", Some(&ctx)).unwrap(), vec![ctx.clone()]);
        assert!(run(&f, ".").is_err());
    }

    #[test]
    fn test_missing_default_collection() {
        let mut f = fixture();
        f.query.default_collection = None;
        assert!(matches!(
            run(&f, "collection()"),
            Err(Error::QueryEvaluation { .. })
        ));
    }
}
