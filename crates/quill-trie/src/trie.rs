//! The persistent trie.

use std::any::Any;
use std::sync::Arc;

use crate::node::{TrieNode, ValueHandle};

/// An immutable map from byte strings to typed values.
///
/// `put` and `remove` return a new trie; the receiver is never modified.
/// The new trie shares every subtree off the touched path with its
/// predecessor, so versions are cheap and safe to read concurrently.
///
/// Values are heterogeneous: each key may store a different type. `get`
/// names the expected type and quietly returns `None` on a mismatch.
#[derive(Clone, Default)]
pub struct Trie {
    /// Absent for the empty trie, non-null otherwise.
    root: Option<Arc<TrieNode>>,
}

impl Trie {
    /// Creates an empty trie.
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Returns true if the trie holds no keys.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Looks up `key` and borrows its value as a `T`.
    ///
    /// Returns `None` if any edge along `key` is missing, if the terminal
    /// node carries no value, or if the stored value is not a `T`. The
    /// borrow is valid for as long as this trie value is held.
    pub fn get<T: Any + Send + Sync>(&self, key: &[u8]) -> Option<&T> {
        let mut node = self.root.as_ref()?;
        for b in key {
            node = node.children.get(b)?;
        }
        node.value.as_deref()?.downcast_ref::<T>()
    }

    /// Returns a new trie with `value` stored under `key`.
    ///
    /// Existing children of the terminal node are preserved; an existing
    /// value is overwritten. The empty key stores the value at the root.
    pub fn put<T: Any + Send + Sync>(&self, key: &[u8], value: T) -> Trie {
        let value: ValueHandle = Arc::new(value);
        let new_root = Self::put_node(self.root.as_ref(), key, value);
        Trie {
            root: Some(Arc::new(new_root)),
        }
    }

    /// Returns a new trie without `key`.
    ///
    /// If `key` is absent (or its terminal carries no value) the result is
    /// structurally equal to `self` and shares its root. Otherwise the
    /// value is dropped and every node on the path that became both
    /// childless and valueless is pruned; pruning may empty the trie.
    pub fn remove(&self, key: &[u8]) -> Trie {
        let Some(root) = self.root.as_ref() else {
            return self.clone();
        };
        match Self::remove_node(root, key) {
            // Key not present: nothing to change.
            None => self.clone(),
            Some(new_root) => Trie { root: new_root },
        }
    }

    /// Clones the spine along `key` and installs `value` at its end.
    ///
    /// Nodes off the spine are shared with the previous version by handle.
    fn put_node(node: Option<&Arc<TrieNode>>, key: &[u8], value: ValueHandle) -> TrieNode {
        let mut children = node.map(|n| n.children.clone()).unwrap_or_default();
        match key.split_first() {
            None => TrieNode::with_value(children, value),
            Some((byte, rest)) => {
                let child = children.get(byte).cloned();
                let new_child = Self::put_node(child.as_ref(), rest, value);
                children.insert(*byte, Arc::new(new_child));
                TrieNode {
                    children,
                    value: node.and_then(|n| n.value.clone()),
                }
            }
        }
    }

    /// Removes `key` below `node`.
    ///
    /// Returns `None` when the key is not present (the caller keeps the
    /// original), `Some(None)` when this node itself collapsed away, and
    /// `Some(Some(n))` when it was replaced by `n`.
    fn remove_node(node: &Arc<TrieNode>, key: &[u8]) -> Option<Option<Arc<TrieNode>>> {
        match key.split_first() {
            None => {
                if !node.is_value_node() {
                    return None;
                }
                if node.children.is_empty() {
                    return Some(None);
                }
                Some(Some(Arc::new(TrieNode::interior(node.children.clone()))))
            }
            Some((byte, rest)) => {
                let child = node.children.get(byte)?;
                let replacement = Self::remove_node(child, rest)?;

                let mut children = node.children.clone();
                match replacement {
                    Some(new_child) => {
                        children.insert(*byte, new_child);
                    }
                    None => {
                        children.remove(byte);
                    }
                }

                if children.is_empty() && !node.is_value_node() {
                    Some(None)
                } else {
                    Some(Some(Arc::new(TrieNode {
                        children,
                        value: node.value.clone(),
                    })))
                }
            }
        }
    }

    /// Returns a shared handle to the value under `key`, regardless of type.
    pub(crate) fn value_handle(&self, key: &[u8]) -> Option<ValueHandle> {
        let mut node = self.root.as_ref()?;
        for b in key {
            node = node.children.get(b)?;
        }
        node.value.clone()
    }
}

impl std::fmt::Debug for Trie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trie")
            .field("empty", &self.is_empty())
            .finish()
    }
}
