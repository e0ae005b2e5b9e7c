//! Panic-vs-result boundary around interpreter evaluation.
//!
//! Panics raised inside an interpreter or a native builtin must never unwind
//! into the host. Every source-unit evaluation and every applet call runs
//! inside [`catch_panic`], which turns an unwinding panic into a
//! [`PanicError`] that the caller reports as a classified error.
//!
//! Panics compiled with `panic = "abort"` and native stack overflows cannot
//! be caught; the call-depth limit on [`tessera_core::Thread`] keeps script
//! recursion from reaching the latter.

use std::any::Any;
use std::fmt;
use std::panic::{self, UnwindSafe};

/// A caught panic, carrying the payload message where one could be extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicError {
    message: String,
}

impl PanicError {
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

impl std::error::Error for PanicError {}

/// Run `f`, converting an unwinding panic into `Err(PanicError)`.
pub fn catch_panic<T>(f: impl FnOnce() -> T + UnwindSafe) -> Result<T, PanicError> {
    panic::catch_unwind(f).map_err(|payload| {
        let err = PanicError::from_payload(payload);
        tracing::error!(message = err.message(), "recovered panic at interpreter boundary");
        err
    })
}
