//! `xpath.star`: XPath 1.0 queries over an XML document,
//! `xpath.loads(xml).query("/feed/title")`.

use std::sync::Arc;
use sxd_document::parser;
use sxd_xpath::{evaluate_xpath, Value as XPathValue};
use tessera_core::{Bindings, EvalError, Function, ModuleBuilder, Object, Value};

/// A well-formed XML document. The source is reparsed per query since the
/// parsed package is not `Sync`.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    source: Arc<str>,
}

impl XmlDocument {
    pub fn load(source: &str) -> Result<Self, EvalError> {
        parser::parse(source).map_err(|e| EvalError::msg(format!("xpath.loads: {e:?}")))?;
        Ok(XmlDocument {
            source: Arc::from(source),
        })
    }

    /// String value of every result, nodes in document order.
    pub fn query_all(&self, path: &str) -> Result<Vec<String>, EvalError> {
        let package = parser::parse(&self.source)
            .map_err(|e| EvalError::msg(format!("xpath.query: {e:?}")))?;
        let document = package.as_document();
        let value = evaluate_xpath(&document, path)
            .map_err(|e| EvalError::msg(format!("xpath.query: {path}: {e}")))?;
        Ok(match value {
            XPathValue::Nodeset(nodes) => nodes
                .document_order()
                .into_iter()
                .map(|node| node.string_value())
                .collect(),
            XPathValue::String(s) => vec![s],
            XPathValue::Number(n) => vec![n.to_string()],
            XPathValue::Boolean(b) => vec![b.to_string()],
        })
    }

    pub fn query(&self, path: &str) -> Result<Option<String>, EvalError> {
        Ok(self.query_all(path)?.into_iter().next())
    }
}

impl Object for XmlDocument {
    fn type_name(&self) -> &str {
        "xpath.Document"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        let doc = self.clone();
        match name {
            "query" => Some(Value::Function(Function::native(
                "xpath.query",
                move |_thread, args| {
                    let mut p = args.parser("xpath.query");
                    let path: String = p.required("path")?;
                    p.finish()?;
                    Ok(doc.query(&path)?.map(Value::String).unwrap_or_default())
                },
            ))),
            "query_all" => Some(Value::Function(Function::native(
                "xpath.query_all",
                move |_thread, args| {
                    let mut p = args.parser("xpath.query_all");
                    let path: String = p.required("path")?;
                    p.finish()?;
                    Ok(Value::List(
                        doc.query_all(&path)?.into_iter().map(Value::String).collect(),
                    ))
                },
            ))),
            _ => None,
        }
    }

    fn attr_names(&self) -> Vec<String> {
        vec!["query".into(), "query_all".into()]
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn load_module() -> Bindings {
    ModuleBuilder::new("xpath")
        .function("loads", |_thread, args| {
            let mut p = args.parser("xpath.loads");
            let doc = crate::text_arg(&mut p, "xpath.loads", "doc")?;
            p.finish()?;
            XmlDocument::load(&doc).map(Value::object)
        })
        .build()
}
