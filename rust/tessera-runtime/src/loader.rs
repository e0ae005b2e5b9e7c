//! Module graph loader.
//!
//! Walks the root of a [`FileSet`], evaluating every script file exactly
//! once. `load` statements naming another file of the set are resolved
//! recursively through the same procedure; every other name goes to the
//! [`ModuleRegistry`]. The chain of files currently being evaluated is kept
//! on the call stack as a [`LoadChain`], so a cycle of any length is
//! reported with its full path and nothing is left behind for sibling loads.
//!
//! While evaluating, the loader records the applet's `main` entry point and
//! schema constructor. The schema constructor is called as soon as its file
//! has been evaluated and its result parsed and serialized.

use crate::cancel::CancelScope;
use crate::engine::ExecutionEngine;
use crate::error::LoadError;
use crate::panic_boundary::catch_panic;
use crate::registry::ModuleRegistry;
use crate::schema::{Schema, SCHEMA_FUNCTION_NAME};
use crate::vfs::{is_script, normalize, FileSet};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use tessera_core::{
    Arguments, Bindings, EvalError, Function, Interpreter, ModuleLoader, Struct, Thread, Value,
};

/// Name of the applet entry point.
pub const MAIN_FUNCTION_NAME: &str = "main";

// ---------------------------------------------------------------------------
// LoadChain
// ---------------------------------------------------------------------------

/// The files being evaluated, innermost last. Each link lives in the stack
/// frame of the load that pushed it.
#[derive(Debug, Clone, Copy)]
pub struct LoadChain<'a> {
    path: &'a str,
    parent: Option<&'a LoadChain<'a>>,
}

impl<'a> LoadChain<'a> {
    pub fn root(path: &'a str) -> Self {
        Self { path, parent: None }
    }

    pub fn push(&'a self, path: &'a str) -> LoadChain<'a> {
        LoadChain {
            path,
            parent: Some(self),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths().any(|p| p == path)
    }

    /// Innermost first.
    fn paths(&self) -> impl Iterator<Item = &'a str> + '_ {
        std::iter::successors(Some(self), |link| link.parent).map(|link| link.path)
    }

    /// `a.star -> b.star -> ... -> next`, outermost first.
    pub fn describe(&self, next: &str) -> String {
        let mut paths: Vec<&str> = self.paths().collect();
        paths.reverse();
        paths.push(next);
        paths.join(" -> ")
    }
}

// ---------------------------------------------------------------------------
// GraphLoader
// ---------------------------------------------------------------------------

/// Result of a successful load.
#[derive(Debug)]
pub struct LoadedApplet {
    pub units: BTreeMap<String, Bindings>,
    pub main_file: String,
    pub main: Function,
    pub schema: Option<LoadedSchema>,
}

#[derive(Debug)]
pub struct LoadedSchema {
    pub file: String,
    pub schema: Schema,
    pub json: String,
}

pub struct GraphLoader<'a> {
    fs: &'a dyn FileSet,
    registry: &'a ModuleRegistry,
    interpreter: &'a dyn Interpreter,
    engine: &'a ExecutionEngine,
    units: BTreeMap<String, Bindings>,
    main: Option<(String, Function)>,
    schema: Option<LoadedSchema>,
    /// The typed error behind the most recent failed `load`, with the
    /// message handed to the interpreter in its place. Errors cross the
    /// interpreter as `EvalError`; this keeps the original.
    failure: Option<(String, LoadError)>,
}

impl<'a> GraphLoader<'a> {
    pub fn new(
        fs: &'a dyn FileSet,
        registry: &'a ModuleRegistry,
        interpreter: &'a dyn Interpreter,
        engine: &'a ExecutionEngine,
    ) -> Self {
        Self {
            fs,
            registry,
            interpreter,
            engine,
            units: BTreeMap::new(),
            main: None,
            schema: None,
            failure: None,
        }
    }

    /// Evaluate every script at the root of the file set.
    pub fn load(mut self) -> Result<LoadedApplet, LoadError> {
        let entries = self.fs.root_entries().map_err(LoadError::Walk)?;
        for path in entries.iter().filter(|p| is_script(p)) {
            self.ensure_loaded(path, None)?;
        }
        let Some((main_file, main)) = self.main else {
            return Err(LoadError::MissingMain {
                id: self.engine.id().to_string(),
            });
        };
        Ok(LoadedApplet {
            units: self.units,
            main_file,
            main,
            schema: self.schema,
        })
    }

    fn ensure_loaded(&mut self, path: &str, chain: Option<&LoadChain<'_>>) -> Result<(), LoadError> {
        let path = normalize(path);
        if self.units.contains_key(&path) {
            return Ok(());
        }
        if let Some(chain) = chain {
            if chain.contains(&path) {
                return Err(LoadError::CircularDependency {
                    chain: chain.describe(&path),
                });
            }
        }
        let link = match chain {
            Some(parent) => parent.push(&path),
            None => LoadChain::root(&path),
        };

        let src = self.fs.read(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;

        let mut thread = self.engine.new_thread();
        let predeclared = predeclared();
        self.failure = None;
        let interpreter = self.interpreter;
        let outcome = {
            let mut resolver = UnitResolver {
                loader: &mut *self,
                chain: &link,
            };
            catch_panic(AssertUnwindSafe(|| {
                interpreter.exec_file(&mut thread, &mut resolver, &path, &src, &predeclared)
            }))
        };
        let exports = match outcome {
            Ok(Ok(exports)) => exports,
            Ok(Err(source)) => {
                return Err(match self.failure.take() {
                    Some((message, failure)) if message == source.message() => failure,
                    _ => LoadError::Exec {
                        path: path.clone(),
                        source,
                    },
                })
            }
            Err(panic) => {
                return Err(LoadError::Panic {
                    id: self.engine.id().to_string(),
                    source: panic,
                })
            }
        };
        // A failure the unit recovered from is not ours to report.
        self.failure = None;
        tracing::debug!(applet = self.engine.id(), path = %path, exports = exports.len(), "loaded source unit");

        self.units.insert(path.clone(), exports.clone());
        self.record_main(&path, &exports)?;
        self.record_schema(&path, &exports)?;
        Ok(())
    }

    /// Remember `err` and return the `EvalError` that stands in for it.
    fn fail(&mut self, err: LoadError) -> EvalError {
        let message = err.to_string();
        self.failure = Some((message.clone(), err));
        EvalError::msg(message)
    }

    fn record_main(&mut self, path: &str, exports: &Bindings) -> Result<(), LoadError> {
        let Some(main) = exports.get(MAIN_FUNCTION_NAME).and_then(Value::as_function) else {
            return Ok(());
        };
        if let Some((previous, _)) = &self.main {
            return Err(LoadError::DuplicateMain {
                path: path.to_string(),
                previous: previous.clone(),
            });
        }
        tracing::debug!(applet = self.engine.id(), path, "found main()");
        self.main = Some((path.to_string(), main.clone()));
        Ok(())
    }

    fn record_schema(&mut self, path: &str, exports: &Bindings) -> Result<(), LoadError> {
        let Some(constructor) = exports.get(SCHEMA_FUNCTION_NAME).and_then(Value::as_function)
        else {
            return Ok(());
        };
        if let Some(existing) = &self.schema {
            return Err(LoadError::DuplicateSchema {
                function: SCHEMA_FUNCTION_NAME,
                path: path.to_string(),
                previous: existing.file.clone(),
            });
        }
        let id = self.engine.id().to_string();
        let value = self
            .engine
            .call(&CancelScope::new(), constructor, Arguments::none())
            .map_err(|source| LoadError::SchemaCall {
                id: id.clone(),
                source: Box::new(source),
            })?;
        let schema = Schema::from_value(&value, exports).map_err(|source| LoadError::SchemaParse {
            id: id.clone(),
            source,
        })?;
        let json = schema
            .to_json()
            .map_err(|source| LoadError::SchemaParse { id, source })?;
        tracing::debug!(
            applet = self.engine.id(),
            path,
            handlers = schema.handlers.len(),
            "evaluated schema"
        );
        self.schema = Some(LoadedSchema {
            file: path.to_string(),
            schema,
            json,
        });
        Ok(())
    }
}

/// Routes one unit's `load` statements back into the graph loader.
struct UnitResolver<'l, 'a, 'c> {
    loader: &'l mut GraphLoader<'a>,
    chain: &'c LoadChain<'c>,
}

impl ModuleLoader for UnitResolver<'_, '_, '_> {
    fn load(&mut self, thread: &mut Thread, module: &str) -> Result<Bindings, EvalError> {
        let path = normalize(module);
        if self.loader.fs.is_file(&path) {
            if let Err(err) = self.loader.ensure_loaded(&path, Some(self.chain)) {
                return Err(self.loader.fail(err));
            }
            return self
                .loader
                .units
                .get(&path)
                .cloned()
                .ok_or_else(|| EvalError::msg(format!("module {path} not loaded")));
        }
        match self.loader.registry.load(thread, module) {
            Ok(bindings) => Ok(bindings),
            Err(err) => Err(self.loader.fail(LoadError::Module(err))),
        }
    }
}

/// Names available to every unit without a `load`.
fn predeclared() -> Bindings {
    let mut bindings = Bindings::new();
    bindings.insert(
        "struct".to_string(),
        Value::Function(Function::native("struct", |_thread, args| {
            if !args.positional.is_empty() {
                return Err(EvalError::msg("struct: unexpected positional arguments"));
            }
            let fields: BTreeMap<String, Value> = args.named.into_iter().collect();
            Ok(Value::Struct(Struct::new(fields)))
        })),
    );
    bindings
}
