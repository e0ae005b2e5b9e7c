//! Capability modules implemented by the host itself.
//!
//! Modules that need per-invocation state (cache namespace, secret
//! decrypter, random source, test reporter) read it from typed locals that
//! the execution engine attaches to every new [`tessera_core::Thread`].

pub mod animation;
pub mod assert;
pub mod cache;
pub mod math;
pub mod random;
pub mod render;
pub mod secret;
