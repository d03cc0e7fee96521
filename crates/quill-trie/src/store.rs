//! A concurrent store over trie versions.

use std::any::Any;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::trie::Trie;

/// Mutable "current version" cell over immutable [`Trie`] values.
///
/// Readers clone the current trie under a short read lock and then walk it
/// with no synchronization at all; a reader is never blocked by a writer's
/// trie construction. Writers serialize among themselves: each one builds
/// its new version from the latest root, then swaps it in.
#[derive(Default)]
pub struct TrieStore {
    /// The current version.
    root: RwLock<Trie>,
    /// Taken for the whole put/remove, so writers build on the latest root.
    write_lock: Mutex<()>,
}

impl TrieStore {
    /// Creates a store holding the empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current version as an independent trie value.
    pub fn snapshot(&self) -> Trie {
        self.root.read().clone()
    }

    /// Looks up `key` in the current version.
    ///
    /// The returned handle keeps the value alive even after later `put`s
    /// and `remove`s replace the current version.
    pub fn get<T: Any + Send + Sync>(&self, key: &[u8]) -> Option<Arc<T>> {
        let snapshot = self.root.read().clone();
        snapshot.value_handle(key)?.downcast::<T>().ok()
    }

    /// Stores `value` under `key` in a new version.
    pub fn put<T: Any + Send + Sync>(&self, key: &[u8], value: T) {
        let _writer = self.write_lock.lock();
        let next = self.root.read().put(key, value);
        *self.root.write() = next;
    }

    /// Removes `key` in a new version.
    pub fn remove(&self, key: &[u8]) {
        let _writer = self.write_lock.lock();
        let next = self.root.read().remove(key);
        *self.root.write() = next;
    }
}

impl std::fmt::Debug for TrieStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrieStore")
            .field("empty", &self.root.read().is_empty())
            .finish()
    }
}
