//! # In-memory ordered key-value map backed by a B-tree
//!
//! The tree is parameterized by a *degree* `t >= 2` chosen at construction
//! time: every node holds at most `2t - 1` items, every non-root node at
//! least `t - 1`, and all leaves sit at the same depth. Lookups, upsert
//! insertion and deletion all run in `O(log N)`.
//!
//! [`BTree`] is the core structure; [`BTreeMap`] wraps it in a conventional
//! map surface.
//!
//! ```
//! use vec_btree::BTreeMap;
//!
//! let mut map = BTreeMap::new(4);
//! map.put(1, "one");
//! map.put(2, "two");
//! assert_eq!(map.get(&1), Some(&"one"));
//! assert!(map.remove(&1));
//! assert_eq!(map.get(&1), None);
//! ```

pub mod btree_base;
pub mod btree_map;

pub use btree_base::{BTree, TreeStats};
pub use btree_map::BTreeMap;
