//! An interpreter whose source units are native Rust programs.
//!
//! Each source unit filename is mapped to a closure that plays the role of the
//! unit's top-level statements: it loads modules, defines functions at
//! source positions, and exports bindings. Embedders use it to ship applets
//! written in Rust; the test suites use it to drive the host without a
//! script language.
//!
//! ```
//! use tessera_core::{NativeInterpreter, Value};
//!
//! let interpreter = NativeInterpreter::new().program("hello.star", |unit| {
//!     unit.def("main", 1, 0, |_thread, _args| Ok(Value::None));
//!     Ok(())
//! });
//! assert!(interpreter.has_program("hello.star"));
//! ```

use crate::error::{EvalError, Position};
use crate::function::{Arguments, Function, NativeFunction};
use crate::interpreter::{Interpreter, ModuleLoader};
use crate::thread::Thread;
use crate::value::{Bindings, Value};
use std::collections::HashMap;
use std::sync::Arc;

type Program = Arc<dyn Fn(&mut UnitContext<'_>) -> Result<(), EvalError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct NativeInterpreter {
    programs: HashMap<String, Program>,
}

impl NativeInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the program run for the unit at `filename`.
    pub fn program<F>(mut self, filename: impl Into<String>, program: F) -> Self
    where
        F: Fn(&mut UnitContext<'_>) -> Result<(), EvalError> + Send + Sync + 'static,
    {
        self.programs.insert(filename.into(), Arc::new(program));
        self
    }

    pub fn has_program(&self, filename: &str) -> bool {
        self.programs.contains_key(filename)
    }
}

impl Interpreter for NativeInterpreter {
    fn exec_file(
        &self,
        thread: &mut Thread,
        loader: &mut dyn ModuleLoader,
        filename: &str,
        src: &[u8],
        predeclared: &Bindings,
    ) -> Result<Bindings, EvalError> {
        let program = self.programs.get(filename).cloned().ok_or_else(|| EvalError::Syntax {
            position: Position::new(filename, 1, 1),
            message: "no native program registered for this unit".to_string(),
        })?;
        let mut unit = UnitContext {
            thread,
            loader,
            filename,
            source: src,
            predeclared,
            exports: Bindings::new(),
        };
        program(&mut unit)?;
        Ok(unit.exports)
    }
}

// ---------------------------------------------------------------------------
// UnitContext
// ---------------------------------------------------------------------------

/// What a native program sees while its unit executes.
pub struct UnitContext<'a> {
    thread: &'a mut Thread,
    loader: &'a mut dyn ModuleLoader,
    filename: &'a str,
    source: &'a [u8],
    predeclared: &'a Bindings,
    exports: Bindings,
}

impl<'a> UnitContext<'a> {
    pub fn filename(&self) -> &str {
        self.filename
    }

    pub fn source(&self) -> &[u8] {
        self.source
    }

    pub fn thread(&mut self) -> &mut Thread {
        self.thread
    }

    pub fn predeclared(&self, name: &str) -> Option<&Value> {
        self.predeclared.get(name)
    }

    /// `load(module, names...)`: returns the requested bindings in order.
    pub fn load(&mut self, module: &str, names: &[&str]) -> Result<Vec<Value>, EvalError> {
        let bindings = self.loader.load(self.thread, module)?;
        names
            .iter()
            .map(|name| {
                if name.starts_with('_') {
                    return Err(EvalError::msg(format!(
                        "load: names with leading underscores are not exported: {name}"
                    )));
                }
                bindings.get(*name).cloned().ok_or_else(|| {
                    EvalError::msg(format!("load: name {name} not found in module {module}"))
                })
            })
            .collect()
    }

    pub fn load_one(&mut self, module: &str, name: &str) -> Result<Value, EvalError> {
        let mut values = self.load(module, &[name])?;
        Ok(values.remove(0))
    }

    pub fn export(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.exports.insert(name.into(), value.into());
    }

    pub fn exported(&self, name: &str) -> Option<&Value> {
        self.exports.get(name)
    }

    /// Define and export a function whose definition sits at `line`.
    pub fn def<F>(&mut self, name: &str, line: u32, num_params: usize, body: F) -> Function
    where
        F: Fn(&mut Thread, Arguments) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let function = Function::new(
            NativeFunction::new(name, body)
                .at(Position::new(self.filename, line, 1))
                .with_params(num_params),
        );
        self.exports
            .insert(name.to_string(), Value::Function(function.clone()));
        function
    }

    /// Call a function as a top-level statement of the unit.
    pub fn call(&mut self, function: &Value, args: Arguments) -> Result<Value, EvalError> {
        function.call(self.thread, args)
    }

    /// A syntax error located in this unit.
    pub fn syntax_error(&self, line: u32, message: impl Into<String>) -> EvalError {
        EvalError::Syntax {
            position: Position::new(self.filename, line, 1),
            message: message.into(),
        }
    }
}
