//! # corten-trie
//!
//! A persistent, immutable trie keyed by byte strings.
//!
//! Updates never modify an existing trie: `put` and `remove` return a new
//! [`Trie`] that shares every untouched subtree with the original, cloning
//! only the nodes along the updated path. Values are type-erased per node,
//! so one trie can map different keys to values of different types; a
//! lookup only succeeds when the requested type matches exactly.
//!
//! ## Example
//!
//! ```rust
//! use corten_trie::Trie;
//!
//! let t1 = Trie::new().put("ab", 1u32);
//! let t2 = t1.put("ac", 2u32);
//!
//! // t1 is unchanged by the second put.
//! assert_eq!(t1.get::<u32>("ac"), None);
//! assert_eq!(t2.get::<u32>("ab"), Some(&1));
//! assert_eq!(t2.get::<u32>("ac"), Some(&2));
//!
//! // Lookups with the wrong type yield nothing.
//! assert_eq!(t2.get::<u64>("ab"), None);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod node;

use std::sync::Arc;

use node::{TrieNode, ValueSlot};

/// Outcome of removing a key from a subtree.
enum Removal {
    /// The key is absent; the original trie is equivalent.
    NotFound,
    /// The rewritten subtree.
    Node(TrieNode),
    /// The subtree became empty and should be pruned.
    Pruned,
}

/// A persistent map from byte strings to values of per-key types.
///
/// `Trie` is cheap to clone (one reference-count bump) and safe to share
/// across threads; all mutating operations return a new trie.
#[derive(Clone, Default)]
pub struct Trie {
    root: Option<Arc<TrieNode>>,
}

impl Trie {
    /// Creates an empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the trie holds no values.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Looks up `key` and returns its value if it has exactly type `T`.
    ///
    /// A key bound to a value of a different type yields `None`; the
    /// lookup itself is legal. The empty key addresses the root.
    pub fn get<T: 'static>(&self, key: impl AsRef<[u8]>) -> Option<&T> {
        let mut node = self.root.as_ref()?;
        for byte in key.as_ref() {
            node = node.children.get(byte)?;
        }
        node.value.as_ref()?.downcast_ref::<T>()
    }

    /// Returns a new trie with `key` bound to `value`.
    ///
    /// Only the nodes on the path from the root to `key` are copied; all
    /// other subtrees are shared with `self`. An existing value at `key`
    /// is replaced, and its children are preserved. `T` may be move-only.
    pub fn put<T: Send + Sync + 'static>(&self, key: impl AsRef<[u8]>, value: T) -> Trie {
        let value: ValueSlot = Arc::new(value);
        let root = Self::put_path(self.root.as_deref(), key.as_ref(), value);
        Trie {
            root: Some(Arc::new(root)),
        }
    }

    /// Returns a new trie with the value at `key` removed.
    ///
    /// Interior nodes left without a value or children are pruned.
    /// Removing an absent key returns an equivalent trie.
    pub fn remove(&self, key: impl AsRef<[u8]>) -> Trie {
        let Some(root) = self.root.as_deref() else {
            return self.clone();
        };
        match Self::remove_path(root, key.as_ref()) {
            Removal::NotFound => self.clone(),
            Removal::Node(node) => Trie {
                root: Some(Arc::new(node)),
            },
            Removal::Pruned => Trie { root: None },
        }
    }

    /// Copies the path down to `key`, installing `value` at its end.
    fn put_path(node: Option<&TrieNode>, key: &[u8], value: ValueSlot) -> TrieNode {
        let mut copy = node.cloned().unwrap_or_default();
        match key.split_first() {
            None => {
                copy.value = Some(value);
                copy
            }
            Some((byte, rest)) => {
                let child = copy.children.get(byte).map(|c| &**c);
                let new_child = Self::put_path(child, rest, value);
                copy.children.insert(*byte, Arc::new(new_child));
                copy
            }
        }
    }

    /// Copies the path down to `key`, stripping the value at its end.
    fn remove_path(node: &TrieNode, key: &[u8]) -> Removal {
        match key.split_first() {
            None => {
                if node.value.is_none() {
                    return Removal::NotFound;
                }
                let mut copy = node.clone();
                copy.value = None;
                if copy.is_empty() {
                    Removal::Pruned
                } else {
                    Removal::Node(copy)
                }
            }
            Some((byte, rest)) => {
                let Some(child) = node.children.get(byte) else {
                    return Removal::NotFound;
                };
                match Self::remove_path(child, rest) {
                    Removal::NotFound => Removal::NotFound,
                    Removal::Node(new_child) => {
                        let mut copy = node.clone();
                        copy.children.insert(*byte, Arc::new(new_child));
                        Removal::Node(copy)
                    }
                    Removal::Pruned => {
                        let mut copy = node.clone();
                        copy.children.remove(byte);
                        if copy.is_empty() {
                            Removal::Pruned
                        } else {
                            Removal::Node(copy)
                        }
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Trie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trie")
            .field("empty", &self.is_empty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walks to the node for `key`, if present.
    fn node_at(trie: &Trie, key: &[u8]) -> Option<Arc<TrieNode>> {
        let mut node = trie.root.clone()?;
        for byte in key {
            let next = node.children.get(byte)?.clone();
            node = next;
        }
        Some(node)
    }

    #[test]
    fn test_empty_trie() {
        let trie = Trie::new();
        assert!(trie.is_empty());
        assert_eq!(trie.get::<u32>("a"), None);
        assert_eq!(trie.get::<u32>(""), None);
    }

    #[test]
    fn test_put_then_get() {
        let trie = Trie::new().put("hello", 7u32);
        assert_eq!(trie.get::<u32>("hello"), Some(&7));
        assert_eq!(trie.get::<u32>("hell"), None);
        assert_eq!(trie.get::<u32>("hello!"), None);
    }

    #[test]
    fn test_put_is_persistent() {
        let t1 = Trie::new().put("ab", 1u32);
        let t2 = t1.put("ac", 2u32);

        assert_eq!(t1.get::<u32>("ab"), Some(&1));
        assert_eq!(t1.get::<u32>("ac"), None);
        assert_eq!(t2.get::<u32>("ab"), Some(&1));
        assert_eq!(t2.get::<u32>("ac"), Some(&2));
    }

    #[test]
    fn test_type_mismatch_yields_none() {
        let trie = Trie::new().put("ab", 1u32);
        assert_eq!(trie.get::<u64>("ab"), None);
        assert_eq!(trie.get::<String>("ab"), None);
        assert_eq!(trie.get::<u32>("ab"), Some(&1));
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let trie = Trie::new().put("k", 1u32).put("k", 2u32);
        assert_eq!(trie.get::<u32>("k"), Some(&2));
    }

    #[test]
    fn test_overwrite_with_new_type() {
        let trie = Trie::new().put("k", 1u32).put("k", "two".to_string());
        assert_eq!(trie.get::<u32>("k"), None);
        assert_eq!(trie.get::<String>("k"), Some(&"two".to_string()));
    }

    #[test]
    fn test_overwrite_preserves_children() {
        let trie = Trie::new().put("ab", 1u32).put("abc", 2u32).put("ab", 3u32);
        assert_eq!(trie.get::<u32>("ab"), Some(&3));
        assert_eq!(trie.get::<u32>("abc"), Some(&2));
    }

    #[test]
    fn test_heterogeneous_values() {
        let trie = Trie::new()
            .put("int", 1u32)
            .put("wide", 2u64)
            .put("text", "three".to_string());
        assert_eq!(trie.get::<u32>("int"), Some(&1));
        assert_eq!(trie.get::<u64>("wide"), Some(&2));
        assert_eq!(trie.get::<String>("text"), Some(&"three".to_string()));
    }

    #[test]
    fn test_empty_key_addresses_root() {
        let trie = Trie::new().put("", 42u32);
        assert_eq!(trie.get::<u32>(""), Some(&42));

        let trie = trie.put("a", 1u32);
        assert_eq!(trie.get::<u32>(""), Some(&42));
        assert_eq!(trie.get::<u32>("a"), Some(&1));

        let trie = trie.remove("");
        assert_eq!(trie.get::<u32>(""), None);
        assert_eq!(trie.get::<u32>("a"), Some(&1));
    }

    #[test]
    fn test_remove() {
        let t1 = Trie::new().put("ab", 1u32).put("ac", 2u32);
        let t2 = t1.remove("ab");

        assert_eq!(t2.get::<u32>("ab"), None);
        assert_eq!(t2.get::<u32>("ac"), Some(&2));
        // The original version still sees the value.
        assert_eq!(t1.get::<u32>("ab"), Some(&1));
    }

    #[test]
    fn test_remove_prunes_empty_nodes() {
        let trie = Trie::new().put("abc", 1u32);
        let removed = trie.remove("abc");
        // Stripping the only value leaves nothing behind.
        assert!(removed.is_empty());
    }

    #[test]
    fn test_remove_keeps_prefix_values() {
        let trie = Trie::new().put("ab", 1u32).put("abcd", 2u32);
        let removed = trie.remove("abcd");
        assert_eq!(removed.get::<u32>("ab"), Some(&1));
        assert_eq!(removed.get::<u32>("abcd"), None);
        // The dangling "c"/"d" nodes are pruned.
        assert!(node_at(&removed, b"abc").is_none());
    }

    #[test]
    fn test_remove_missing_key() {
        let trie = Trie::new().put("ab", 1u32);
        let same = trie.remove("zz");
        assert_eq!(same.get::<u32>("ab"), Some(&1));

        let same = trie.remove("a"); // prefix node exists but has no value
        assert_eq!(same.get::<u32>("ab"), Some(&1));

        assert!(Trie::new().remove("x").is_empty());
    }

    #[test]
    fn test_structural_sharing_on_put() {
        let t1 = Trie::new().put("ab", 1u32).put("cd", 2u32);
        let t2 = t1.put("ax", 3u32);

        // The "c" subtree is untouched by the put and shared by pointer.
        let c1 = node_at(&t1, b"c").unwrap();
        let c2 = node_at(&t2, b"c").unwrap();
        assert!(Arc::ptr_eq(&c1, &c2));

        // The "a" subtree lies on the copied path and must differ.
        let a1 = node_at(&t1, b"a").unwrap();
        let a2 = node_at(&t2, b"a").unwrap();
        assert!(!Arc::ptr_eq(&a1, &a2));

        // "ab" hangs off the copied "a" node but was not rewritten itself.
        let ab1 = node_at(&t1, b"ab").unwrap();
        let ab2 = node_at(&t2, b"ab").unwrap();
        assert!(Arc::ptr_eq(&ab1, &ab2));
    }

    #[test]
    fn test_structural_sharing_on_remove() {
        let t1 = Trie::new().put("ab", 1u32).put("cd", 2u32);
        let t2 = t1.remove("ab");

        let c1 = node_at(&t1, b"c").unwrap();
        let c2 = node_at(&t2, b"c").unwrap();
        assert!(Arc::ptr_eq(&c1, &c2));
    }

    #[test]
    fn test_move_only_values() {
        // No Clone or Copy on this type.
        struct Token(u32);

        let trie = Trie::new().put("t", Token(9));
        assert_eq!(trie.get::<Token>("t").map(|t| t.0), Some(9));
        assert!(trie.get::<u32>("t").is_none());
    }

    #[test]
    fn test_byte_keys() {
        let trie = Trie::new().put([0u8, 255, 7], 1u32);
        assert_eq!(trie.get::<u32>([0u8, 255, 7]), Some(&1));
        assert_eq!(trie.get::<u32>([0u8, 255]), None);
    }

    #[test]
    fn test_shared_across_threads() {
        let trie = Trie::new().put("k", 5u32);
        let clone = trie.clone();
        let handle = std::thread::spawn(move || *clone.get::<u32>("k").unwrap());
        assert_eq!(handle.join().unwrap(), 5);
        assert_eq!(trie.get::<u32>("k"), Some(&5));
    }
}
