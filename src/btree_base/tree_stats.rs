/// Bookkeeping counters for a tree: items stored plus live node counts,
/// maintained at every allocation and free.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub size: usize,
    pub leaves: usize,
    pub inner_nodes: usize,
}

impl TreeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> usize {
        self.inner_nodes + self.leaves
    }

    pub fn avgfill_leaves(&self, leaf_slots: usize) -> f64 {
        self.size as f64 / (self.leaves * leaf_slots) as f64
    }
}
