//! Tessera Runtime
//!
//! Loads applets (a set of script files with a `main` entry point and an
//! optional configuration schema) and executes them on behalf of a host.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera_runtime::{Applet, CancelScope, DirFs};
//!
//! # fn interpreter() -> Arc<dyn tessera_core::Interpreter> { unimplemented!() }
//! let applet = Applet::builder("clock", interpreter())
//!     .load(&DirFs::new("apps/clock"))
//!     .unwrap();
//! let roots = applet.run(&CancelScope::new()).unwrap();
//! println!("{} frames, schema {}", roots.len(), applet.schema_json());
//! ```

pub mod applet;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod modules;
pub mod panic_boundary;
pub mod registry;
pub mod schema;
pub mod vfs;

pub use applet::{Applet, AppletBuilder, AppletConfig, TestOutcome};
pub use cancel::{CancelScope, WatchGuard, DEADLINE_EXCEEDED};
pub use config::{HostConfig, PrintMode};
pub use engine::{ExecutionEngine, ReturnedRoots};
pub use error::{CallError, ConfigError, LoadError, ModuleError, SchemaError};
pub use modules::cache::{Cache, InMemoryCache};
pub use modules::secret::SecretDecrypter;
pub use panic_boundary::PanicError;
pub use registry::{ModuleRegistry, OverrideLoader};
pub use schema::{Field, FieldKind, ReturnKind, Schema};
pub use vfs::{DirFs, FileSet, MemoryFs};
