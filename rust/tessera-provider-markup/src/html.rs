//! `html.star`: CSS-selector queries over an HTML document.
//!
//! A parsed tree is not `Send`, so a [`Selection`] keeps the document
//! source and the position of each selected element as a path of child
//! indexes from the tree root. Every query reparses the source and walks
//! those paths; parsing is deterministic, so the paths stay valid.

use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tessera_core::{ArgParser, Bindings, EvalError, Function, Object, Value};

type Path = Vec<usize>;

#[derive(Debug, Clone)]
pub struct Selection {
    source: Arc<str>,
    paths: Arc<Vec<Path>>,
}

fn resolve<'a>(doc: &'a Html, path: &[usize]) -> Option<ElementRef<'a>> {
    let mut node = doc.tree.root();
    for &index in path {
        node = node.children().nth(index)?;
    }
    ElementRef::wrap(node)
}

fn path_of(element: ElementRef<'_>) -> Path {
    let mut path = Vec::new();
    let mut node = *element;
    while let Some(parent) = node.parent() {
        path.push(node.prev_siblings().count());
        node = parent;
    }
    path.reverse();
    path
}

fn selector(function: &str, source: &str) -> Result<Selector, EvalError> {
    Selector::parse(source)
        .map_err(|_| EvalError::msg(format!("{function}: invalid selector {source:?}")))
}

impl Selection {
    /// The whole document, rooted at its `<html>` element.
    pub fn parse(source: &str) -> Self {
        let doc = Html::parse_document(source);
        let root = path_of(doc.root_element());
        Selection {
            source: Arc::from(source),
            paths: Arc::new(vec![root]),
        }
    }

    fn with_paths(&self, paths: Vec<Path>) -> Self {
        Selection {
            source: Arc::clone(&self.source),
            paths: Arc::new(paths),
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Reparse and map every selected element to new elements. Results
    /// keep document order of discovery and drop duplicates.
    fn flat_map<F>(&self, mut f: F) -> Self
    where
        F: for<'a> FnMut(ElementRef<'a>) -> Vec<ElementRef<'a>>,
    {
        let doc = Html::parse_document(&self.source);
        let mut out: Vec<Path> = Vec::new();
        for element in self.paths.iter().filter_map(|p| resolve(&doc, p)) {
            for found in f(element) {
                let path = path_of(found);
                if !out.contains(&path) {
                    out.push(path);
                }
            }
        }
        self.with_paths(out)
    }

    pub fn find(&self, selector: &Selector) -> Self {
        self.flat_map(|element| {
            element
                .descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .filter(|e| selector.matches(e))
                .collect()
        })
    }

    pub fn filter(&self, selector: &Selector) -> Self {
        self.flat_map(|element| {
            if selector.matches(&element) {
                vec![element]
            } else {
                Vec::new()
            }
        })
    }

    pub fn children(&self) -> Self {
        self.flat_map(|element| element.children().filter_map(ElementRef::wrap).collect())
    }

    pub fn parent(&self) -> Self {
        self.flat_map(|element| element.parent().and_then(ElementRef::wrap).into_iter().collect())
    }

    /// The `index`th element; negative counts from the end.
    pub fn at(&self, index: i64) -> Self {
        let len = self.paths.len() as i64;
        let index = if index < 0 { len + index } else { index };
        let picked = usize::try_from(index)
            .ok()
            .and_then(|i| self.paths.get(i))
            .cloned();
        self.with_paths(picked.into_iter().collect())
    }

    /// Combined text of every selected element.
    pub fn text(&self) -> String {
        let doc = Html::parse_document(&self.source);
        self.paths
            .iter()
            .filter_map(|p| resolve(&doc, p))
            .flat_map(|element| element.text())
            .collect()
    }

    /// Attribute of the first selected element.
    pub fn attribute(&self, name: &str) -> Option<String> {
        let doc = Html::parse_document(&self.source);
        let first = resolve(&doc, self.paths.first()?)?;
        first.value().attr(name).map(str::to_string)
    }

    /// Inner HTML of the first selected element.
    pub fn inner_html(&self) -> Option<String> {
        let doc = Html::parse_document(&self.source);
        resolve(&doc, self.paths.first()?).map(|element| element.inner_html())
    }
}

fn method<F>(name: &str, body: F) -> Option<Value>
where
    F: Fn(ArgParser) -> Result<Value, EvalError> + Send + Sync + 'static,
{
    let function = format!("html.Selection.{name}");
    Some(Value::Function(Function::native(
        function.clone(),
        move |_thread, args| body(args.parser(&function)),
    )))
}

fn optional_string(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or_default()
}

impl Object for Selection {
    fn type_name(&self) -> &str {
        "html.Selection"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        let sel = self.clone();
        match name {
            "find" | "filter" => {
                let filter = name == "filter";
                method(name, move |mut p| {
                    let function = if filter { "html.filter" } else { "html.find" };
                    let source: String = p.required("selector")?;
                    p.finish()?;
                    let selector = selector(function, &source)?;
                    let out = if filter {
                        sel.filter(&selector)
                    } else {
                        sel.find(&selector)
                    };
                    Ok(Value::object(out))
                })
            }
            "children" => method(name, move |p| {
                p.finish()?;
                Ok(Value::object(sel.children()))
            }),
            "parent" => method(name, move |p| {
                p.finish()?;
                Ok(Value::object(sel.parent()))
            }),
            "first" => method(name, move |p| {
                p.finish()?;
                Ok(Value::object(sel.at(0)))
            }),
            "last" => method(name, move |p| {
                p.finish()?;
                Ok(Value::object(sel.at(-1)))
            }),
            "eq" => method(name, move |mut p| {
                let index: i64 = p.required("index")?;
                p.finish()?;
                Ok(Value::object(sel.at(index)))
            }),
            "len" => method(name, move |p| {
                p.finish()?;
                Ok(Value::Int(sel.len() as i64))
            }),
            "text" => method(name, move |p| {
                p.finish()?;
                Ok(Value::String(sel.text()))
            }),
            "attr" => method(name, move |mut p| {
                let attr: String = p.required("name")?;
                p.finish()?;
                Ok(optional_string(sel.attribute(&attr)))
            }),
            "html" => method(name, move |p| {
                p.finish()?;
                Ok(optional_string(sel.inner_html()))
            }),
            _ => None,
        }
    }

    fn attr_names(&self) -> Vec<String> {
        [
            "attr", "children", "eq", "filter", "find", "first", "html", "last", "len", "parent",
            "text",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn truth(&self) -> bool {
        !self.is_empty()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// The module binds `html` to the parsing function itself.
pub fn load_module() -> Bindings {
    let mut bindings = Bindings::new();
    bindings.insert(
        "html".to_string(),
        Value::Function(Function::native("html", |_thread, args| {
            let mut p = args.parser("html");
            let body = crate::text_arg(&mut p, "html", "body")?;
            p.finish()?;
            Ok(Value::object(Selection::parse(&body)))
        })),
    );
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <table id="scores">
          <tr><td class="team">Cats</td><td>3</td></tr>
          <tr><td class="team">Dogs</td><td>1</td></tr>
        </table>
        <a href="/next">more</a>
    </body></html>"#;

    fn css(source: &str) -> Selector {
        Selector::parse(source).unwrap()
    }

    #[test]
    fn find_walks_descendants() {
        let doc = Selection::parse(PAGE);
        let cells = doc.find(&css("td"));
        assert_eq!(cells.len(), 4);
        assert_eq!(cells.filter(&css(".team")).text(), "CatsDogs");
    }

    #[test]
    fn eq_counts_from_either_end() {
        let teams = Selection::parse(PAGE).find(&css("td.team"));
        assert_eq!(teams.at(0).text(), "Cats");
        assert_eq!(teams.at(-1).text(), "Dogs");
        assert!(teams.at(5).is_empty());
    }

    #[test]
    fn children_and_parent_navigate() {
        let doc = Selection::parse(PAGE);
        let rows = doc.find(&css("tr"));
        assert_eq!(rows.children().len(), 4);
        assert_eq!(rows.at(1).children().parent().len(), 1);
        assert_eq!(doc.find(&css("td")).parent().len(), 2);
    }

    #[test]
    fn attr_reads_first_element() {
        let doc = Selection::parse(PAGE);
        assert_eq!(doc.find(&css("a")).attribute("href").as_deref(), Some("/next"));
        assert_eq!(doc.find(&css("a")).attribute("title"), None);
        assert_eq!(doc.find(&css("#scores")).attribute("id").as_deref(), Some("scores"));
    }

    #[test]
    fn bad_selector_names_function() {
        let err = selector("html.find", "td[").unwrap_err();
        assert!(err.to_string().starts_with("html.find: invalid selector"));
    }
}
