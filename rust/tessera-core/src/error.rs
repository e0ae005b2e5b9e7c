//! Evaluation errors raised inside the interpreter boundary.
//!
//! A failure starts life as a plain [`EvalError::Message`]. When it unwinds
//! through a script function frame, [`Function::call`](crate::Function::call)
//! upgrades it to [`EvalError::Traced`], which carries the call stack that was
//! active at the point of failure and renders as a traceback.

use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Source position of a function definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Position used for functions implemented by the host.
    pub fn builtin() -> Self {
        Self {
            file: String::new(),
            line: 0,
            column: 0,
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.file.is_empty()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_builtin() {
            write!(f, "<builtin>")
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

// ---------------------------------------------------------------------------
// Frame / Traced
// ---------------------------------------------------------------------------

/// One entry of the call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub function: String,
    pub position: Position,
}

impl Frame {
    pub fn new(function: impl Into<String>, position: Position) -> Self {
        Self {
            function: function.into(),
            position,
        }
    }
}

/// A failure together with the call stack it escaped from, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traced {
    pub message: String,
    pub stack: Vec<Frame>,
}

impl Traced {
    /// Render the failure as a traceback, most recent call last.
    pub fn backtrace(&self) -> String {
        let mut out = String::from("Traceback (most recent call last):\n");
        for frame in &self.stack {
            out.push_str(&format!("  {}: in {}\n", frame.position, frame.function));
        }
        match self.stack.last() {
            Some(innermost) => out.push_str(&format!(
                "Error in {}: {}",
                innermost.function, self.message
            )),
            None => out.push_str(&format!("Error: {}", self.message)),
        }
        out
    }
}

impl fmt::Display for Traced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.backtrace())
    }
}

// ---------------------------------------------------------------------------
// EvalError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A plain failure raised by script or native code.
    #[error("{0}")]
    Message(String),

    /// A failure that escaped one or more script frames.
    #[error("{0}")]
    Traced(Traced),

    /// The source unit could not be parsed.
    #[error("{position}: syntax error: {message}")]
    Syntax { position: Position, message: String },

    /// The execution context was cancelled at a checkpoint.
    #[error("computation cancelled: {reason}")]
    Cancelled { reason: String },
}

impl EvalError {
    pub fn msg(message: impl Into<String>) -> Self {
        EvalError::Message(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EvalError::Cancelled { .. })
    }

    /// The failure text without any traceback decoration.
    pub fn message(&self) -> String {
        match self {
            EvalError::Message(msg) => msg.clone(),
            EvalError::Traced(traced) => traced.message.clone(),
            EvalError::Syntax { message, .. } => message.clone(),
            EvalError::Cancelled { reason } => format!("computation cancelled: {reason}"),
        }
    }

    /// Attach `stack` to a plain message if a script frame is on it.
    ///
    /// Host-only stacks (every frame is a builtin) leave the error untouched so
    /// callers can fall back to naming the function and its position.
    pub fn traced(self, stack: &[Frame]) -> Self {
        match self {
            EvalError::Message(message)
                if stack.iter().any(|frame| !frame.position.is_builtin()) =>
            {
                EvalError::Traced(Traced {
                    message,
                    stack: stack.to_vec(),
                })
            }
            other => other,
        }
    }
}
