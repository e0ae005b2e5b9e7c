//! Resolution of capability module names to their bindings.
//!
//! The registry is an immutable table built once and shared by reference
//! between applets. An optional override loader supplied by the embedder is
//! consulted first. The override is advisory: when it fails for any reason
//! the name falls through to the built-in table, and only a name unknown to
//! both fails with [`ModuleError::Invalid`].

use crate::error::ModuleError;
use crate::modules;
use crate::schema;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tessera_core::{Bindings, EvalError, Thread};

/// Embedder-supplied loader consulted before the built-in table.
pub type OverrideLoader =
    Arc<dyn Fn(&mut Thread, &str) -> Result<Bindings, EvalError> + Send + Sync>;

type BuiltinLoader = fn() -> Bindings;

static SHARED: Lazy<Arc<ModuleRegistry>> = Lazy::new(|| Arc::new(ModuleRegistry::builtin()));

#[derive(Clone)]
pub struct ModuleRegistry {
    override_loader: Option<OverrideLoader>,
    builtins: BTreeMap<&'static str, BuiltinLoader>,
}

impl ModuleRegistry {
    /// The built-in capability modules, without an override.
    pub fn builtin() -> Self {
        let mut builtins: BTreeMap<&'static str, BuiltinLoader> = BTreeMap::new();
        builtins.insert("render.star", modules::render::load_module);
        builtins.insert("animation.star", modules::animation::load_module);
        builtins.insert("schema.star", schema::module::load_module);
        builtins.insert("cache.star", modules::cache::load_module);
        builtins.insert("secret.star", modules::secret::load_module);
        builtins.insert("math.star", modules::math::load_module);
        builtins.insert("random.star", modules::random::load_module);
        builtins.insert("assert.star", modules::assert::load_module);
        builtins.insert("hash.star", tessera_provider_crypto::hash::load_module);
        builtins.insert("hmac.star", tessera_provider_crypto::hmac::load_module);
        builtins.insert("encoding/json.star", tessera_provider_encoding::json::load_module);
        builtins.insert("encoding/base64.star", tessera_provider_encoding::base64::load_module);
        builtins.insert("encoding/csv.star", tessera_provider_encoding::csv::load_module);
        builtins.insert("compress/gzip.star", tessera_provider_encoding::gzip::load_module);
        builtins.insert("compress/zipfile.star", tessera_provider_encoding::zipfile::load_module);
        builtins.insert("http.star", tessera_provider_http::load_module);
        builtins.insert("re.star", tessera_provider_regex::load_module);
        builtins.insert("html.star", tessera_provider_markup::html::load_module);
        builtins.insert("xpath.star", tessera_provider_markup::xpath::load_module);
        builtins.insert("qrcode.star", tessera_provider_qrcode::load_module);
        builtins.insert("time.star", tessera_provider_time::time::load_module);
        builtins.insert("sunrise.star", tessera_provider_time::sunrise::load_module);
        builtins.insert("humanize.star", tessera_provider_time::humanize::load_module);
        Self {
            override_loader: None,
            builtins,
        }
    }

    /// The process-wide built-in registry.
    pub fn shared() -> Arc<ModuleRegistry> {
        Arc::clone(&SHARED)
    }

    pub fn with_override<F>(mut self, loader: F) -> Self
    where
        F: Fn(&mut Thread, &str) -> Result<Bindings, EvalError> + Send + Sync + 'static,
    {
        self.override_loader = Some(Arc::new(loader));
        self
    }

    pub fn has_override(&self) -> bool {
        self.override_loader.is_some()
    }

    /// Names served by the built-in table, sorted.
    pub fn builtin_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.builtins.keys().copied()
    }

    pub fn load(&self, thread: &mut Thread, module: &str) -> Result<Bindings, ModuleError> {
        if let Some(loader) = &self.override_loader {
            match loader(thread, module) {
                Ok(bindings) => return Ok(bindings),
                Err(err) => {
                    tracing::debug!(module, error = %err, "override loader failed, using built-in table");
                }
            }
        }
        match self.builtins.get(module) {
            Some(load) => Ok(load()),
            None => Err(ModuleError::Invalid(module.to_string())),
        }
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("override", &self.override_loader.is_some())
            .field("builtins", &self.builtins.keys().collect::<Vec<_>>())
            .finish()
    }
}
