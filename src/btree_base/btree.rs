use std::fmt::{self, Debug};

use super::{
    insertion::{InsertResult, Promotion},
    node::Node,
    slots::Item,
    tree_stats::TreeStats,
};

/// An ordered key-value map backed by a B-tree of the given degree.
///
/// For degree `t`, every node holds at most `2t - 1` items, every non-root
/// node at least `t - 1`, and all leaves sit at the same depth. The tree
/// owns its root and every node owns its children, so the structure drops
/// cleanly as a plain value.
pub struct BTree<K, V> {
    degree: usize,
    root: Option<Box<Node<K, V>>>,
    stats: TreeStats,
}

/// Construction and the occupancy bounds derived from the degree.
impl<K, V> BTree<K, V> {
    /// Creates an empty tree. Panics when `degree < 2`: a smaller degree
    /// cannot satisfy the node occupancy bounds.
    pub fn new(degree: usize) -> Self {
        assert!(degree >= 2, "invalid degree {degree}, must be at least 2");
        Self {
            degree,
            root: None,
            stats: TreeStats::new(),
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    #[inline]
    fn min_items(&self) -> usize {
        self.degree - 1
    }

    #[inline]
    fn max_items(&self) -> usize {
        self.degree * 2 - 1
    }

    #[inline]
    fn max_children(&self) -> usize {
        self.degree * 2
    }
}

/// Node allocation and accounting. Splits, root growth and the first leaf
/// allocate; merges and root collapse free.
impl<K, V> BTree<K, V> {
    fn new_leaf(&mut self) -> Box<Node<K, V>> {
        self.stats.leaves += 1;
        Node::with_capacity(self.max_items(), self.max_children())
    }

    fn new_inner(&mut self) -> Box<Node<K, V>> {
        self.stats.inner_nodes += 1;
        Node::with_capacity(self.max_items(), self.max_children())
    }

    // a merged-away sibling is already drained when it drops, so the caller
    // samples its kind beforehand
    fn node_freed(&mut self, was_leaf: bool) {
        if was_leaf {
            self.stats.leaves -= 1;
        } else {
            self.stats.inner_nodes -= 1;
        }
    }
}

/// Access functions to the item count.
impl<K, V> BTree<K, V> {
    pub fn size(&self) -> usize {
        self.stats.size
    }

    pub fn empty(&self) -> bool {
        self.size() == 0
    }

    pub fn get_stats(&self) -> &TreeStats {
        &self.stats
    }

    /// Drops every node and returns the tree to its freshly built state.
    pub fn clear(&mut self) {
        self.root = None;
        self.stats = TreeStats::new();
    }
}

/// Lookup by descending from the root.
impl<K: Ord, V> BTree<K, V> {
    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &K) -> Option<&V> {
        let mut n = self.root.as_deref()?;
        loop {
            let (slot, found) = n.items.find(key);
            if found {
                return Some(&n.items.get(slot).value);
            }
            if n.is_leaf() {
                return None;
            }
            n = n.children.get(slot);
        }
    }

    /// Whether `key` is present.
    pub fn exists(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Number of levels between the root and the leaves, both inclusive;
    /// 0 for an empty tree.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut n = self.root.as_deref();
        while let Some(node) = n {
            height += 1;
            n = if node.is_leaf() {
                None
            } else {
                Some(node.children.get(0))
            };
        }
        height
    }
}

/// Insertion.
impl<K: Ord + Debug, V> BTree<K, V> {
    /// Inserts `key`/`value`. An existing key has its value replaced in
    /// place and the tree shape is untouched; a new key lands in a leaf,
    /// splitting full nodes on the way back up. Height only ever grows
    /// here, by a new root over the two halves of the old one.
    pub fn insert(&mut self, key: K, value: V) {
        let Some(mut root) = self.root.take() else {
            log::debug!("BTree::insert({:?}) creating the root leaf", key);
            let mut leaf = self.new_leaf();
            leaf.items.insert_at(Item::new(key, value), 0);
            self.root = Some(leaf);
            self.stats.size += 1;
            return;
        };

        let result = self.insert_descend(&mut root, key, value);
        if let Some(promotion) = result.promotion {
            log::debug!(
                "BTree::insert growing the tree around separator {:?}",
                promotion.separator.key
            );
            let mut new_root = self.new_inner();
            new_root.items.insert_at(promotion.separator, 0);
            new_root.children.insert_at(root, 0);
            new_root.children.insert_at(promotion.right, 1);
            root = new_root;
        }
        if result.inserted {
            self.stats.size += 1;
        }
        self.root = Some(root);
    }

    /// Inserts into the subtree rooted at `n`, reporting any split separator
    /// for the caller to adopt.
    fn insert_descend(&mut self, n: &mut Node<K, V>, key: K, value: V) -> InsertResult<K, V> {
        let (slot, found) = n.items.find(&key);
        if found {
            n.items.get_mut(slot).value = value;
            return InsertResult::done(false);
        }

        if n.is_leaf() {
            n.items.insert_at(Item::new(key, value), slot);
            if n.items.len() < self.max_items() {
                return InsertResult::done(true);
            }
            return InsertResult::promoted(true, self.split(n));
        }

        let result = self.insert_descend(n.children.get_mut(slot), key, value);
        let inserted = result.inserted;
        let Some(promotion) = result.promotion else {
            return InsertResult::done(inserted);
        };

        // the child split; adopt the separator and the new right node
        n.items.insert_at(promotion.separator, slot);
        n.children.insert_at(promotion.right, slot + 1);
        if n.items.len() < self.max_items() {
            return InsertResult::done(inserted);
        }
        InsertResult::promoted(inserted, self.split(n))
    }

    /// Splits a full node around its median. The median becomes the returned
    /// separator; the upper half moves into a fresh right sibling. Both
    /// halves end at exactly `min_items` items.
    fn split(&mut self, n: &mut Node<K, V>) -> Promotion<K, V> {
        debug_assert_eq!(n.items.len(), self.max_items());

        let median = n.items.len() / 2;
        let mut right = if n.is_leaf() {
            self.new_leaf()
        } else {
            self.new_inner()
        };

        let mut upper = n.items.split_off(median + 1);
        right.items.append(&mut upper);
        let separator = n.items.delete_at(median);
        if !n.is_leaf() {
            let mut upper_children = n.children.split_off(median + 1);
            right.children.append(&mut upper_children);
        }

        log::debug!(
            "BTree::split promoting {:?}, {} items per half",
            separator.key,
            n.items.len()
        );
        Promotion { separator, right }
    }
}

/// Erase.
impl<K: Ord + Debug, V> BTree<K, V> {
    /// Removes `key`, reporting whether it was present. An absent key leaves
    /// the tree untouched.
    pub fn erase_one(&mut self, key: &K) -> bool {
        log::debug!("BTree::erase_one({:?}) on tree size {}", key, self.size());

        // the deleting descent rebalances before it can know whether the key
        // exists below, so absence is resolved with a read-only pass first
        if !self.exists(key) {
            return false;
        }

        let mut root = self.root.take().expect("presence implies a root");
        let found = self.erase_descend(&mut root, key);
        debug_assert!(found);
        self.stats.size -= 1;

        if root.items.is_empty() {
            if root.is_leaf() {
                log::debug!("BTree::erase_one dropping the last leaf");
                self.node_freed(true);
            } else {
                // the root kept a single child through the final merge; that
                // child takes over. the only place height shrinks
                log::debug!("BTree::erase_one collapsing the root");
                let child = root.children.delete_at(0);
                debug_assert!(root.children.is_empty());
                self.node_freed(false);
                self.root = Some(child);
            }
        } else {
            self.root = Some(root);
        }

        found
    }

    /// Removes `key` from the subtree rooted at `n`. Every step down enters
    /// a child holding more than `min_items` items, so the leaf deletion at
    /// the bottom can never underfill a node.
    fn erase_descend(&mut self, n: &mut Node<K, V>, key: &K) -> bool {
        let (slot, found) = n.items.find(key);

        if found {
            if n.is_leaf() {
                n.items.delete_at(slot);
                return true;
            }

            // an internal hit trades the separator for a neighbor from a
            // leaf: the predecessor when the left child can spare an item,
            // the successor when the right one can. with neither, the two
            // children merge around the separator and the deletion descends
            // into the merged node.
            if n.children.get(slot).items.len() > self.min_items() {
                let predecessor = self.pop_max(n.children.get_mut(slot));
                n.items.replace_at(slot, predecessor);
            } else if n.children.get(slot + 1).items.len() > self.min_items() {
                let successor = self.pop_min(n.children.get_mut(slot + 1));
                n.items.replace_at(slot, successor);
            } else {
                log::debug!("BTree::erase_descend merging around {:?}", key);
                let was_leaf = n.children.get(slot).is_leaf();
                n.merge(slot);
                self.node_freed(was_leaf);
                let merged = self.erase_descend(n.children.get_mut(slot), key);
                debug_assert!(merged);
            }
            return true;
        }

        if n.is_leaf() {
            return false;
        }

        // top up the descent target before stepping down
        let slot = if n.children.get(slot).items.len() > self.min_items() {
            slot
        } else {
            self.rebalance(n, slot)
        };
        self.erase_descend(n.children.get_mut(slot), key)
    }

    /// Tops up `children[slot]`, which sits at exactly `min_items`, and
    /// returns the slot to descend into, which moves one to the left when
    /// the target was absorbed into its left sibling. Preference: steal left,
    /// steal right, merge right, merge left.
    fn rebalance(&mut self, n: &mut Node<K, V>, slot: usize) -> usize {
        debug_assert_eq!(n.children.get(slot).items.len(), self.min_items());

        let has_left = slot > 0;
        let has_right = slot + 1 < n.children.len();

        if has_left && n.children.get(slot - 1).items.len() > self.min_items() {
            log::debug!("BTree::rebalance stealing from the left sibling of slot {slot}");
            n.steal_from_left_sibling(slot);
            slot
        } else if has_right && n.children.get(slot + 1).items.len() > self.min_items() {
            log::debug!("BTree::rebalance stealing from the right sibling of slot {slot}");
            n.steal_from_right_sibling(slot);
            slot
        } else if has_right {
            log::debug!("BTree::rebalance merging slot {slot} with its right sibling");
            let was_leaf = n.children.get(slot).is_leaf();
            n.merge(slot);
            self.node_freed(was_leaf);
            slot
        } else {
            log::debug!("BTree::rebalance merging slot {slot} into its left sibling");
            let was_leaf = n.children.get(slot).is_leaf();
            n.merge(slot - 1);
            self.node_freed(was_leaf);
            slot - 1
        }
    }

    /// Removes and returns the largest item of the subtree rooted at `n`,
    /// rebalancing along the rightmost spine so every step down keeps slack.
    fn pop_max(&mut self, n: &mut Node<K, V>) -> Item<K, V> {
        if n.is_leaf() {
            let last = n.items.len() - 1;
            return n.items.delete_at(last);
        }

        let slot = n.children.len() - 1;
        let slot = if n.children.get(slot).items.len() > self.min_items() {
            slot
        } else {
            self.rebalance(n, slot)
        };
        self.pop_max(n.children.get_mut(slot))
    }

    /// `pop_max`'s mirror along the leftmost spine.
    fn pop_min(&mut self, n: &mut Node<K, V>) -> Item<K, V> {
        if n.is_leaf() {
            return n.items.delete_at(0);
        }

        let slot = if n.children.get(0).items.len() > self.min_items() {
            0
        } else {
            self.rebalance(n, 0)
        };
        self.pop_min(n.children.get_mut(slot))
    }
}

/// Structural verification, driven by tests; no part of normal operation
/// calls into this.
impl<K: Ord + Debug, V> BTree<K, V> {
    /// Walks the whole tree and panics on any violated structural invariant:
    /// per-node key order, separator bounds, key/child ratio, occupancy,
    /// uniform leaf depth, and counter consistency.
    pub fn check_all_invariants(&self) {
        let mut counted = TreeStats::new();
        let mut leaf_depth = None;
        if let Some(root) = self.root.as_deref() {
            assert!(!root.items.is_empty(), "root holds no items");
            self.check_subtree(root, None, None, 0, &mut leaf_depth, &mut counted, true);
        }
        assert_eq!(counted, self.stats, "tracked stats diverge from the tree");
    }

    fn check_subtree(
        &self,
        n: &Node<K, V>,
        lower: Option<&K>,
        upper: Option<&K>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        counted: &mut TreeStats,
        is_root: bool,
    ) {
        assert!(
            n.items.len() <= self.max_items(),
            "node holds {} items, more than the {} allowed",
            n.items.len(),
            self.max_items()
        );
        if !is_root {
            assert!(
                n.items.len() >= self.min_items(),
                "non-root node underfilled at {} items",
                n.items.len()
            );
        }
        assert!(
            n.children.len() <= self.max_children(),
            "node has too many children"
        );
        if !n.is_leaf() {
            assert!(
                n.has_valid_key_child_ratio(),
                "node pairs {} items with {} children",
                n.items.len(),
                n.children.len()
            );
        }

        for (slot, item) in n.items.iter().enumerate() {
            if slot + 1 < n.items.len() {
                assert!(
                    item.key < n.items.get(slot + 1).key,
                    "items out of order at {:?}",
                    item.key
                );
            }
            if let Some(lo) = lower {
                assert!(*lo < item.key, "key {:?} at or below bound {:?}", item.key, lo);
            }
            if let Some(hi) = upper {
                assert!(item.key < *hi, "key {:?} at or above bound {:?}", item.key, hi);
            }
        }

        counted.size += n.items.len();
        if n.is_leaf() {
            counted.leaves += 1;
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(expected) => assert_eq!(depth, expected, "leaves at differing depths"),
            }
            return;
        }
        counted.inner_nodes += 1;

        for slot in 0..n.children.len() {
            let lo = if slot == 0 {
                lower
            } else {
                Some(&n.items.get(slot - 1).key)
            };
            let hi = if slot == n.items.len() {
                upper
            } else {
                Some(&n.items.get(slot).key)
            };
            self.check_subtree(
                n.children.get(slot),
                lo,
                hi,
                depth + 1,
                leaf_depth,
                counted,
                false,
            );
        }
    }
}

/// Debug rendering: one node per line, indented by depth, keys only.
impl<K: Debug, V> BTree<K, V> {
    fn print_node(f: &mut fmt::Formatter<'_>, node: &Node<K, V>, depth: usize) -> fmt::Result {
        for _ in 0..depth {
            write!(f, "  ")?;
        }
        write!(f, "node [")?;
        for (slot, item) in node.items.iter().enumerate() {
            if slot > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:?}", item.key)?;
        }
        writeln!(f, "]")?;

        for child in node.children.iter() {
            Self::print_node(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl<K: Debug, V> fmt::Debug for BTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.root.as_deref() {
            Some(root) => Self::print_node(f, root, 0),
            None => writeln!(f, "empty tree"),
        }
    }
}
