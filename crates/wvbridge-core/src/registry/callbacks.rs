use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use crate::protocol::CALLBACK_ID_PREFIX;

/// Pending reply continuations: `correlation id -> one-shot continuation`.
///
/// Ids are `cb_<n>` from a per-instance counter, so they are unique within
/// one registry. The two sides never compare ids they did not generate, so
/// sharing the prefix across sides cannot collide.
///
/// Continuations only need to be `Send` for the registry to be `Sync`.
pub struct CallbackRegistry<C> {
    pending: Mutex<HashMap<String, C>>,
    seq: AtomicU64,
}

impl<C> Default for CallbackRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CallbackRegistry<C> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// Fresh correlation id.
    pub fn next_id(&self) -> String {
        let n = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{CALLBACK_ID_PREFIX}{n}")
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, C>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, id: impl Into<String>, continuation: C) {
        self.pending().insert(id.into(), continuation);
    }

    /// Register under a fresh id and return the id.
    pub fn allocate(&self, continuation: C) -> String {
        let id = self.next_id();
        self.register(id.clone(), continuation);
        id
    }

    /// Remove and return the entry. Removal happens under the lock, so of
    /// several concurrent takers for one id only the first gets the
    /// continuation.
    pub fn take(&self, id: &str) -> Option<C> {
        self.pending().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pending().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending().is_empty()
    }

    pub fn clear(&self) {
        // Drop continuations outside the lock; their captures may run code.
        let drained = std::mem::take(&mut *self.pending());
        drop(drained);
    }
}

impl<C: FnOnce(Value)> CallbackRegistry<C> {
    /// Invoke and remove the continuation for `id`.
    /// Returns false if no entry existed (late or unknown response).
    pub fn resolve(&self, id: &str, payload: Value) -> bool {
        // `take` releases the lock before the continuation runs.
        match self.take(id) {
            Some(continuation) => {
                continuation(payload);
                true
            }
            None => false,
        }
    }
}
