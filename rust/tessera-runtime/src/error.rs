//! Error taxonomy of the applet host.
//!
//! Errors are layered the way failures flow: [`LoadError`] is fatal to applet
//! construction, [`CallError`] classifies one invocation, [`SchemaError`]
//! covers schema parsing and handler dispatch, [`ModuleError`] comes out of
//! the module registry, and [`ConfigError`] out of host configuration.

use crate::panic_boundary::PanicError;
use tessera_core::{EvalError, Position};
use thiserror::Error;

// ---------------------------------------------------------------------------
// LoadError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("walking applet files: {0}")]
    Walk(#[source] std::io::Error),

    /// Syntax or evaluation failure while executing a unit's top level.
    #[error("executing {path}: {source}")]
    Exec {
        path: String,
        #[source]
        source: EvalError,
    },

    #[error("panic while executing {id}: {source}")]
    Panic {
        id: String,
        #[source]
        source: PanicError,
    },

    /// `chain` is the full import chain, e.g. `a.star -> b.star -> a.star`.
    #[error("circular dependency detected: {chain}")]
    CircularDependency { chain: String },

    #[error("multiple files with a main() function:\n- {path}\n- {previous}")]
    DuplicateMain { path: String, previous: String },

    #[error("multiple files with a {function}() function:\n- {path}\n- {previous}")]
    DuplicateSchema {
        function: &'static str,
        path: String,
        previous: String,
    },

    #[error("no main() function found in {id}")]
    MissingMain { id: String },

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error("calling schema function for {id}: {source}")]
    SchemaCall {
        id: String,
        #[source]
        source: Box<CallError>,
    },

    #[error("parsing schema for {id}: {source}")]
    SchemaParse {
        id: String,
        #[source]
        source: SchemaError,
    },
}

impl LoadError {
    pub fn is_circular(&self) -> bool {
        matches!(self, LoadError::CircularDependency { .. })
    }
}

// ---------------------------------------------------------------------------
// CallError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CallError {
    #[error("panic while running {id}: {source}")]
    Panic {
        id: String,
        #[source]
        source: PanicError,
    },

    /// An evaluation error that escaped script frames, rendered as a
    /// traceback.
    #[error("{backtrace}")]
    Eval { backtrace: String },

    /// An evaluation error with no script frame to trace through.
    #[error("in {function} at {position}: {message}")]
    Function {
        function: String,
        position: Position,
        message: String,
    },

    /// The caller's scope was cancelled while the call was running.
    #[error("{id}: {function} cancelled: {cause}")]
    Cancelled {
        id: String,
        function: String,
        cause: String,
    },

    #[error("expected app implementation to return Root(s) but found: {found}")]
    UnexpectedReturn { found: String },

    #[error("expected app implementation to return Root(s) but found: {found} (at index {index})")]
    UnexpectedElement { found: String, index: usize },
}

impl CallError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CallError::Cancelled { .. })
    }

    /// The upstream cancellation cause, if the call was cancelled.
    pub fn cancel_cause(&self) -> Option<&str> {
        match self {
            CallError::Cancelled { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SchemaError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("no exported handler named '{0}'")]
    UnknownHandler(String),

    #[error("calling schema handler {handler}: {source}")]
    HandlerCall {
        handler: String,
        #[source]
        source: CallError,
    },

    #[error("expected {handler} to return a string or string-like value, found {found}")]
    NotAString { handler: String, found: String },

    #[error("encoding options: {0}")]
    Options(String),

    #[error("invalid schema: {0}")]
    Invalid(String),

    #[error("serializing schema to JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// ModuleError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModuleError {
    #[error("invalid module: {0}")]
    Invalid(String),

    #[error("loading {module}: {message}")]
    Failed { module: String, message: String },
}

impl From<ModuleError> for EvalError {
    fn from(err: ModuleError) -> Self {
        EvalError::msg(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid toml in '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_message_lists_chain() {
        let err = LoadError::CircularDependency {
            chain: "a.star -> b.star -> a.star".into(),
        };
        assert_eq!(
            err.to_string(),
            "circular dependency detected: a.star -> b.star -> a.star"
        );
        assert!(err.is_circular());
    }

    #[test]
    fn unexpected_element_names_index() {
        let err = CallError::UnexpectedElement {
            found: "string".into(),
            index: 1,
        };
        assert_eq!(
            err.to_string(),
            "expected app implementation to return Root(s) but found: string (at index 1)"
        );
    }

    #[test]
    fn module_error_crosses_as_eval_error() {
        let err: EvalError = ModuleError::Invalid("nope.star".into()).into();
        assert_eq!(err.to_string(), "invalid module: nope.star");
    }
}
