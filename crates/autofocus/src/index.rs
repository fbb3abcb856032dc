//! A height-balanced (AVL) search tree from order key to value.
//!
//! Nodes live in a `slotmap` arena and link to each other by handle. Ordering
//! is decided by a runtime [`Comparator`], so two keys that compare `Equal`
//! occupy the same slot even if their raw values differ.

use std::{cmp::Ordering, fmt, mem, rc::Rc};

use slotmap::{SlotMap, new_key_type};

use crate::order::OrderKey;

new_key_type! {
    /// Arena handle for a tree node.
    struct Slot;
}

/// Ordering used to arrange keys in an [`OrderedIndex`].
pub type Comparator = Rc<dyn Fn(OrderKey, OrderKey) -> Ordering>;

/// Numeric ascending order.
pub fn ascending() -> Comparator {
    Rc::new(|a: OrderKey, b: OrderKey| a.cmp(&b))
}

/// A single tree node.
struct Node<V> {
    /// Key this node is sorted by.
    key: OrderKey,
    /// Stored value.
    value: V,
    /// Subtree of smaller keys.
    left: Option<Slot>,
    /// Subtree of larger keys.
    right: Option<Slot>,
    /// Height of the subtree rooted here; leaves have height 1.
    height: u32,
}

/// Ordered mapping from [`OrderKey`] to `V` with logarithmic insert, delete,
/// lookup and neighbour queries.
pub struct OrderedIndex<V> {
    /// Node arena.
    nodes: SlotMap<Slot, Node<V>>,
    /// Tree root.
    root: Option<Slot>,
    /// Key ordering.
    cmp: Comparator,
}

impl<V> Default for OrderedIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for OrderedIndex<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<V> OrderedIndex<V> {
    /// An empty index in numeric ascending order.
    pub fn new() -> Self {
        Self::with_comparator(ascending())
    }

    /// An empty index ordered by `cmp`.
    pub fn with_comparator(cmp: Comparator) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
            cmp,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Is the index empty?
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Height of the tree. An empty tree has height 0.
    pub fn height(&self) -> u32 {
        self.height_of(self.root)
    }

    /// Value stored at `key`.
    pub fn get(&self, key: OrderKey) -> Option<&V> {
        self.find(key).map(|s| &self.nodes[s].value)
    }

    /// Insert `value` at `key`, returning the value it replaced.
    pub fn insert(&mut self, key: OrderKey, value: V) -> Option<V> {
        let mut replaced = None;
        let root = self.insert_at(self.root, key, value, &mut replaced);
        self.root = Some(root);
        replaced
    }

    /// Remove the entry at `key`, returning its value.
    pub fn remove(&mut self, key: OrderKey) -> Option<V> {
        let mut removed = None;
        self.root = self.remove_at(self.root, key, &mut removed);
        removed
    }

    /// The entry with the smallest key.
    pub fn min(&self) -> Option<(OrderKey, &V)> {
        let mut cur = self.root?;
        while let Some(left) = self.nodes[cur].left {
            cur = left;
        }
        Some(self.entry(cur))
    }

    /// The entry with the largest key.
    pub fn max(&self) -> Option<(OrderKey, &V)> {
        let mut cur = self.root?;
        while let Some(right) = self.nodes[cur].right {
            cur = right;
        }
        Some(self.entry(cur))
    }

    /// The entry with the smallest key strictly after `key`. `key` itself
    /// need not be present.
    pub fn successor(&self, key: OrderKey) -> Option<(OrderKey, &V)> {
        let mut cur = self.root;
        let mut best = None;
        while let Some(slot) = cur {
            let node = &self.nodes[slot];
            if self.compare(key, node.key) == Ordering::Less {
                best = Some(slot);
                cur = node.left;
            } else {
                cur = node.right;
            }
        }
        best.map(|s| self.entry(s))
    }

    /// The entry with the largest key strictly before `key`. `key` itself
    /// need not be present.
    pub fn predecessor(&self, key: OrderKey) -> Option<(OrderKey, &V)> {
        let mut cur = self.root;
        let mut best = None;
        while let Some(slot) = cur {
            let node = &self.nodes[slot];
            if self.compare(key, node.key) == Ordering::Greater {
                best = Some(slot);
                cur = node.right;
            } else {
                cur = node.left;
            }
        }
        best.map(|s| self.entry(s))
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> Iter<'_, V> {
        let mut iter = Iter {
            index: self,
            stack: Vec::new(),
        };
        iter.push_left(self.root);
        iter
    }

    /// Compare two keys with the configured ordering.
    fn compare(&self, a: OrderKey, b: OrderKey) -> Ordering {
        (self.cmp)(a, b)
    }

    /// Key and value stored at `slot`.
    fn entry(&self, slot: Slot) -> (OrderKey, &V) {
        let node = &self.nodes[slot];
        (node.key, &node.value)
    }

    /// Locate the node holding `key`.
    fn find(&self, key: OrderKey) -> Option<Slot> {
        let mut cur = self.root;
        while let Some(slot) = cur {
            let node = &self.nodes[slot];
            match self.compare(key, node.key) {
                Ordering::Less => cur = node.left,
                Ordering::Greater => cur = node.right,
                Ordering::Equal => return Some(slot),
            }
        }
        None
    }

    /// Insert into the subtree at `slot` and return the new subtree root.
    fn insert_at(
        &mut self,
        slot: Option<Slot>,
        key: OrderKey,
        value: V,
        replaced: &mut Option<V>,
    ) -> Slot {
        let Some(slot) = slot else {
            return self.nodes.insert(Node {
                key,
                value,
                left: None,
                right: None,
                height: 1,
            });
        };
        match self.compare(key, self.nodes[slot].key) {
            Ordering::Less => {
                let left = self.nodes[slot].left;
                let child = self.insert_at(left, key, value, replaced);
                self.nodes[slot].left = Some(child);
            }
            Ordering::Greater => {
                let right = self.nodes[slot].right;
                let child = self.insert_at(right, key, value, replaced);
                self.nodes[slot].right = Some(child);
            }
            Ordering::Equal => {
                *replaced = Some(mem::replace(&mut self.nodes[slot].value, value));
                return slot;
            }
        }
        self.rebalance(slot)
    }

    /// Remove `key` from the subtree at `slot` and return the new subtree root.
    fn remove_at(
        &mut self,
        slot: Option<Slot>,
        key: OrderKey,
        removed: &mut Option<V>,
    ) -> Option<Slot> {
        let slot = slot?;
        match self.compare(key, self.nodes[slot].key) {
            Ordering::Less => {
                let left = self.nodes[slot].left;
                self.nodes[slot].left = self.remove_at(left, key, removed);
            }
            Ordering::Greater => {
                let right = self.nodes[slot].right;
                self.nodes[slot].right = self.remove_at(right, key, removed);
            }
            Ordering::Equal => return self.unlink(slot, removed),
        }
        Some(self.rebalance(slot))
    }

    /// Drop `slot` from the arena and return the subtree that takes its place.
    fn unlink(&mut self, slot: Slot, removed: &mut Option<V>) -> Option<Slot> {
        let (left, right) = (self.nodes[slot].left, self.nodes[slot].right);
        let replacement = match (left, right) {
            (None, None) => None,
            (Some(child), None) | (None, Some(child)) => Some(child),
            (Some(left), Some(right)) => {
                let (rest, heir) = self.detach_min(right);
                self.nodes[heir].left = Some(left);
                self.nodes[heir].right = rest;
                Some(self.rebalance(heir))
            }
        };
        *removed = self.nodes.remove(slot).map(|n| n.value);
        replacement
    }

    /// Detach the leftmost node under `slot`. Returns the remaining subtree and
    /// the detached node.
    fn detach_min(&mut self, slot: Slot) -> (Option<Slot>, Slot) {
        match self.nodes[slot].left {
            None => (self.nodes[slot].right, slot),
            Some(left) => {
                let (rest, min) = self.detach_min(left);
                self.nodes[slot].left = rest;
                (Some(self.rebalance(slot)), min)
            }
        }
    }

    /// Height of an optional subtree.
    fn height_of(&self, slot: Option<Slot>) -> u32 {
        slot.map_or(0, |s| self.nodes[s].height)
    }

    /// Recompute the cached height of `slot` from its children.
    fn update_height(&mut self, slot: Slot) {
        let node = &self.nodes[slot];
        let height = 1 + self.height_of(node.left).max(self.height_of(node.right));
        self.nodes[slot].height = height;
    }

    /// Left height minus right height.
    fn balance(&self, slot: Slot) -> i64 {
        let node = &self.nodes[slot];
        i64::from(self.height_of(node.left)) - i64::from(self.height_of(node.right))
    }

    /// Restore the AVL property at `slot` and return the new subtree root.
    fn rebalance(&mut self, slot: Slot) -> Slot {
        self.update_height(slot);
        let balance = self.balance(slot);
        if balance > 1 {
            if let Some(left) = self.nodes[slot].left
                && self.balance(left) < 0
            {
                let rotated = self.rotate_left(left);
                self.nodes[slot].left = Some(rotated);
            }
            return self.rotate_right(slot);
        }
        if balance < -1 {
            if let Some(right) = self.nodes[slot].right
                && self.balance(right) > 0
            {
                let rotated = self.rotate_right(right);
                self.nodes[slot].right = Some(rotated);
            }
            return self.rotate_left(slot);
        }
        slot
    }

    /// Rotate the subtree at `slot` to the right.
    fn rotate_right(&mut self, slot: Slot) -> Slot {
        let Some(pivot) = self.nodes[slot].left else {
            return slot;
        };
        self.nodes[slot].left = self.nodes[pivot].right;
        self.nodes[pivot].right = Some(slot);
        self.update_height(slot);
        self.update_height(pivot);
        pivot
    }

    /// Rotate the subtree at `slot` to the left.
    fn rotate_left(&mut self, slot: Slot) -> Slot {
        let Some(pivot) = self.nodes[slot].right else {
            return slot;
        };
        self.nodes[slot].right = self.nodes[pivot].left;
        self.nodes[pivot].left = Some(slot);
        self.update_height(slot);
        self.update_height(pivot);
        pivot
    }
}

/// In-order iterator over an [`OrderedIndex`].
pub struct Iter<'a, V> {
    /// The index being walked.
    index: &'a OrderedIndex<V>,
    /// Nodes whose left subtree has been pushed but which are not yet yielded.
    stack: Vec<Slot>,
}

impl<V> Iter<'_, V> {
    /// Push `slot` and its chain of left children.
    fn push_left(&mut self, mut cur: Option<Slot>) {
        while let Some(slot) = cur {
            self.stack.push(slot);
            cur = self.index.nodes[slot].left;
        }
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (OrderKey, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.stack.pop()?;
        let index = self.index;
        let node = &index.nodes[slot];
        self.push_left(node.right);
        Some((node.key, &node.value))
    }
}

impl<'a, V> IntoIterator for &'a OrderedIndex<V> {
    type Item = (OrderKey, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use super::*;

    /// Check ordering, cached heights and balance; return the subtree height.
    fn check<V>(index: &OrderedIndex<V>, slot: Option<Slot>) -> u32 {
        let Some(slot) = slot else {
            return 0;
        };
        let node = &index.nodes[slot];
        if let Some(left) = node.left {
            assert_eq!(
                index.compare(index.nodes[left].key, node.key),
                Ordering::Less
            );
        }
        if let Some(right) = node.right {
            assert_eq!(
                index.compare(index.nodes[right].key, node.key),
                Ordering::Greater
            );
        }
        let lh = check(index, node.left);
        let rh = check(index, node.right);
        assert!(lh.abs_diff(rh) <= 1, "unbalanced at {}", node.key);
        assert_eq!(node.height, 1 + lh.max(rh));
        node.height
    }

    fn keys<V>(index: &OrderedIndex<V>) -> Vec<i64> {
        index.iter().map(|(k, _)| k.get()).collect()
    }

    #[test]
    fn empty_queries() {
        let index: OrderedIndex<u32> = OrderedIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.height(), 0);
        assert!(index.min().is_none());
        assert!(index.max().is_none());
        assert!(index.successor(OrderKey(0)).is_none());
        assert!(index.predecessor(OrderKey(0)).is_none());
    }

    #[test]
    fn neighbours() {
        let mut index = OrderedIndex::new();
        for k in [10, 30, 20, 50, 40] {
            index.insert(OrderKey(k), k * 2);
        }
        assert_eq!(keys(&index), vec![10, 20, 30, 40, 50]);
        assert_eq!(index.min(), Some((OrderKey(10), &20)));
        assert_eq!(index.max(), Some((OrderKey(50), &100)));
        assert_eq!(index.successor(OrderKey(20)), Some((OrderKey(30), &60)));
        assert_eq!(index.successor(OrderKey(25)), Some((OrderKey(30), &60)));
        assert_eq!(index.predecessor(OrderKey(30)), Some((OrderKey(20), &40)));
        assert!(index.successor(OrderKey(50)).is_none());
        assert!(index.predecessor(OrderKey(10)).is_none());
    }

    #[test]
    fn insert_replaces_and_remove_returns_value() {
        let mut index = OrderedIndex::new();
        assert_eq!(index.insert(OrderKey(1), "a"), None);
        assert_eq!(index.insert(OrderKey(1), "b"), Some("a"));
        assert_eq!(index.len(), 1);
        assert_eq!(index.remove(OrderKey(1)), Some("b"));
        assert_eq!(index.remove(OrderKey(1)), None);
        assert!(index.is_empty());
    }

    #[test]
    fn sequential_inserts_stay_balanced() {
        let mut index = OrderedIndex::new();
        for k in 0..1024 {
            index.insert(OrderKey(k), ());
        }
        check(&index, index.root);
        assert!(index.height() <= 11);
        for k in (0..1024).step_by(2) {
            index.remove(OrderKey(k));
        }
        check(&index, index.root);
        assert_eq!(index.len(), 512);
        assert_eq!(index.min().map(|(k, _)| k), Some(OrderKey(1)));
    }

    #[test]
    fn custom_comparator_reverses_order() {
        let mut index = OrderedIndex::with_comparator(Rc::new(|a: OrderKey, b: OrderKey| b.cmp(&a)));
        for k in [1, 3, 2] {
            index.insert(OrderKey(k), ());
        }
        assert_eq!(keys(&index), vec![3, 2, 1]);
        assert_eq!(index.min().map(|(k, _)| k), Some(OrderKey(3)));
        assert_eq!(index.successor(OrderKey(3)).map(|(k, _)| k), Some(OrderKey(2)));
    }

    proptest! {
        #[test]
        fn matches_btreemap(ops in prop::collection::vec((any::<bool>(), -64i64..64), 0..200)) {
            let mut index = OrderedIndex::new();
            let mut model = BTreeMap::new();
            for (insert, k) in ops {
                if insert {
                    prop_assert_eq!(index.insert(OrderKey(k), k), model.insert(k, k));
                } else {
                    prop_assert_eq!(index.remove(OrderKey(k)), model.remove(&k));
                }
            }
            check(&index, index.root);
            prop_assert_eq!(index.len(), model.len());
            prop_assert_eq!(keys(&index), model.keys().copied().collect::<Vec<_>>());
            for probe in -65i64..65 {
                let succ = index.successor(OrderKey(probe)).map(|(k, _)| k.get());
                let want = model.range(probe + 1..).next().map(|(k, _)| *k);
                prop_assert_eq!(succ, want);
                let pred = index.predecessor(OrderKey(probe)).map(|(k, _)| k.get());
                let want = model.range(..probe).next_back().map(|(k, _)| *k);
                prop_assert_eq!(pred, want);
            }
        }
    }
}
