//! `cache.star`: a small TTL key-value cache shared across invocations.
//!
//! Keys are namespaced by applet id so applets sharing one cache cannot see
//! each other's entries. Without a configured cache `get` returns `None` and
//! `set` is a no-op, so applets behave the same with caching disabled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tessera_core::{Bindings, EvalError, ModuleBuilder, Thread, Value};

/// Default entry lifetime for `cache.set` without `ttl_seconds`.
pub const DEFAULT_TTL_SECONDS: i64 = 60;

/// Longest lifetime [`InMemoryCache`] gives an entry.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Storage behind `cache.star`.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);
}

/// Cache attached to an execution context, with the applet's namespace.
#[derive(Clone)]
pub struct CacheBinding {
    pub cache: Arc<dyn Cache>,
    pub namespace: String,
}

impl CacheBinding {
    fn key(&self, key: &str) -> String {
        format!("{}/{}", self.namespace, key)
    }
}

// ---------------------------------------------------------------------------
// InMemoryCache
// ---------------------------------------------------------------------------

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// Process-local cache with per-entry expiry and a bound on the number of
/// live entries. When full, expired entries are purged first, then the entry
/// closest to expiry is evicted.
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    max_entries: usize,
}

impl InMemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Cache for InMemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.lock();
        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= self.max_entries {
                let victim = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(victim) = victim {
                    entries.remove(&victim);
                }
            }
        }
        let expires_at = now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now);
        entries.insert(key.to_string(), Entry { value, expires_at });
    }
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

pub fn load_module() -> Bindings {
    ModuleBuilder::new("cache")
        .function("get", cache_get)
        .function("set", cache_set)
        .build()
}

fn cache_get(thread: &mut Thread, args: tessera_core::Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("cache.get");
    let key: String = p.required("key")?;
    p.finish()?;
    let Some(binding) = thread.local::<CacheBinding>() else {
        return Ok(Value::None);
    };
    Ok(binding
        .cache
        .get(&binding.key(&key))
        .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        .unwrap_or(Value::None))
}

fn cache_set(thread: &mut Thread, args: tessera_core::Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("cache.set");
    let key: String = p.required("key")?;
    let value: String = p.required("value")?;
    let ttl: i64 = p.or_default("ttl_seconds", DEFAULT_TTL_SECONDS)?;
    p.finish()?;
    if ttl < 0 {
        return Err(EvalError::msg(format!(
            "cache.set: ttl_seconds must be non-negative, got {ttl}"
        )));
    }
    let ttl = Duration::from_secs(ttl.unsigned_abs());
    if Instant::now().checked_add(ttl).is_none() {
        return Err(EvalError::msg(format!(
            "cache.set: ttl_seconds {} is out of range",
            ttl.as_secs()
        )));
    }
    if let Some(binding) = thread.local::<CacheBinding>() {
        binding
            .cache
            .set(&binding.key(&key), value.into_bytes(), ttl);
    }
    Ok(Value::None)
}
