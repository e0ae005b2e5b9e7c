//! Tessera Core
//!
//! Shared value model and the contracts between the applet host and the
//! embedded script interpreter: function values, the execution context,
//! evaluation errors, the render tree, and the `Interpreter` / `ModuleLoader`
//! traits.

pub mod error;
pub mod function;
pub mod interpreter;
pub mod module;
pub mod native;
pub mod object;
pub mod render;
pub mod thread;
pub mod value;

pub use error::{EvalError, Frame, Position, Traced};
pub use function::{ArgParser, Arguments, Callable, FromValue, Function, NativeFunction};
pub use interpreter::{Interpreter, ModuleLoader};
pub use module::ModuleBuilder;
pub use native::{NativeInterpreter, UnitContext};
pub use object::Object;
pub use render::{Root, Rootable, Widget};
pub use thread::{CancelHandle, PrintFn, Thread};
pub use value::{module_bindings, Bindings, Dict, Struct, Value};
