//! Contracts between the host and the embedded interpreter.

use crate::error::EvalError;
use crate::thread::Thread;
use crate::value::Bindings;

/// Resolves `load` statements encountered while a source unit executes.
pub trait ModuleLoader {
    fn load(&mut self, thread: &mut Thread, module: &str) -> Result<Bindings, EvalError>;
}

/// An embedded script interpreter.
///
/// The host treats the interpreter as a black box: it hands over the bytes of
/// one source unit together with a predeclared environment and gets back the
/// unit's exported bindings. Function values inside those bindings are
/// invoked later through [`Function::call`](crate::Function::call).
pub trait Interpreter: Send + Sync {
    /// Execute the top-level statements of `src`.
    ///
    /// `filename` is the normalized path of the unit and is used for
    /// positions and diagnostics. Every `load` is routed to `loader`.
    fn exec_file(
        &self,
        thread: &mut Thread,
        loader: &mut dyn ModuleLoader,
        filename: &str,
        src: &[u8],
        predeclared: &Bindings,
    ) -> Result<Bindings, EvalError>;
}
