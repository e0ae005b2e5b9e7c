//! The per-invocation execution context.
//!
//! A [`Thread`] is created for one evaluation (one source unit, or one call
//! into an applet) and dropped afterwards. It is never shared between calls.
//! The only part that may be touched from another OS thread is the
//! [`CancelHandle`], which a cancellation watcher uses to stop the evaluation
//! at its next checkpoint.

use crate::error::{EvalError, Frame};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Upper bound on nested calls. Deep recursion fails with an evaluation
/// error instead of exhausting the native stack.
pub const MAX_CALL_DEPTH: usize = 512;

/// Receives `print` output from scripts: `(thread, message)`.
pub type PrintFn = Arc<dyn Fn(&Thread, &str) + Send + Sync>;

// ---------------------------------------------------------------------------
// CancelHandle
// ---------------------------------------------------------------------------

/// Shared cancellation flag of one execution context. The first reason wins.
#[derive(Clone, Default)]
pub struct CancelHandle(Arc<OnceLock<String>>);

impl CancelHandle {
    pub fn cancel(&self, reason: impl Into<String>) {
        let _ = self.0.set(reason.into());
    }

    pub fn reason(&self) -> Option<&str> {
        self.0.get().map(String::as_str)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get().is_some()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CancelHandle").field(&self.reason()).finish()
    }
}

// ---------------------------------------------------------------------------
// Thread
// ---------------------------------------------------------------------------

pub struct Thread {
    name: String,
    cancel: CancelHandle,
    print: Option<PrintFn>,
    locals: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    frames: Vec<Frame>,
}

impl Thread {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cancel: CancelHandle::default(),
            print: None,
            locals: HashMap::new(),
            frames: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle that cancels this context from anywhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cooperative cancellation checkpoint.
    pub fn checkpoint(&self) -> Result<(), EvalError> {
        match self.cancel.reason() {
            Some(reason) => Err(EvalError::Cancelled {
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn set_print(&mut self, print: PrintFn) {
        self.print = Some(print);
    }

    /// Deliver script output to the configured sink. Without one, output is
    /// written to stdout prefixed with the thread name.
    pub fn print(&self, msg: &str) {
        match &self.print {
            Some(print) => print(self, msg),
            None => println!("[{}] {}", self.name, msg),
        }
    }

    /// Attach an auxiliary capability, replacing any previous one of the
    /// same type.
    pub fn set_local<T: Any + Send + Sync>(&mut self, value: T) {
        self.locals.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn local<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.locals
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn local_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.locals
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// The active call stack, outermost first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn push_frame(&mut self, frame: Frame) -> Result<(), EvalError> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(EvalError::msg(format!(
                "call stack depth exceeds {MAX_CALL_DEPTH} calling {}",
                frame.function
            ))
            .traced(&self.frames));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.name)
            .field("cancel", &self.cancel)
            .field("depth", &self.frames.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Position;
    use std::sync::Mutex;

    #[test]
    fn first_cancel_reason_wins() {
        let thread = Thread::new("t");
        let handle = thread.cancel_handle();
        handle.cancel("first");
        handle.cancel("second");
        assert_eq!(
            thread.checkpoint(),
            Err(EvalError::Cancelled {
                reason: "first".into()
            })
        );
    }

    #[test]
    fn cancel_from_other_os_thread() {
        let thread = Thread::new("t");
        let handle = thread.cancel_handle();
        std::thread::spawn(move || handle.cancel("remote"))
            .join()
            .unwrap();
        assert!(thread.checkpoint().is_err());
    }

    #[test]
    fn locals_are_typed() {
        #[derive(Debug, PartialEq)]
        struct Seed(u64);
        let mut thread = Thread::new("t");
        assert!(thread.local::<Seed>().is_none());
        thread.set_local(Seed(7));
        assert_eq!(thread.local::<Seed>(), Some(&Seed(7)));
        thread.local_mut::<Seed>().unwrap().0 = 8;
        assert_eq!(thread.local::<Seed>(), Some(&Seed(8)));
    }

    #[test]
    fn print_goes_to_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut thread = Thread::new("clock");
        thread.set_print(Arc::new(move |t: &Thread, msg: &str| {
            sink.lock().unwrap().push(format!("{}: {}", t.name(), msg));
        }));
        thread.print("tick");
        assert_eq!(*seen.lock().unwrap(), vec!["clock: tick".to_string()]);
    }

    #[test]
    fn depth_limit() {
        let mut thread = Thread::new("t");
        for _ in 0..MAX_CALL_DEPTH {
            thread
                .push_frame(Frame::new("f", Position::new("a.star", 1, 1)))
                .unwrap();
        }
        let err = thread
            .push_frame(Frame::new("f", Position::new("a.star", 1, 1)))
            .unwrap_err();
        assert!(err.message().contains("call stack depth exceeds"));
    }
}
