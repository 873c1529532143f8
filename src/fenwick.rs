//! Prefix sums over the recombination masses of lineages.

// Updates between full rebuilds never exceed this many,
// which bounds the accumulated rounding error.
const MIN_REBUILD_INTERVAL: usize = 1024;

/// A Fenwick (binary indexed) tree of non-negative values.
///
/// Grows on demand.  Setting a value and finding the
/// entry that contains a given cumulative mass are both
/// `O(log n)`.
#[derive(Debug, Clone)]
pub(crate) struct FenwickTree {
    values: Vec<f64>,
    // 1-based; the capacity is a power of two (or zero)
    tree: Vec<f64>,
    num_positive: usize,
    updates: usize,
}

impl Default for FenwickTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FenwickTree {
    pub(crate) fn new() -> Self {
        Self {
            values: vec![],
            tree: vec![0.0],
            num_positive: 0,
            updates: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.tree.len() - 1
    }

    pub(crate) fn get(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    /// Set the value at `index`, growing the tree if needed.
    pub(crate) fn set(&mut self, index: usize, value: f64) {
        if index >= self.values.len() {
            self.values.resize(index + 1, 0.0);
        }
        let delta = value - self.values[index];
        match (self.values[index] > 0.0, value > 0.0) {
            (false, true) => self.num_positive += 1,
            (true, false) => self.num_positive -= 1,
            _ => (),
        }
        self.values[index] = value;
        self.updates += 1;
        if self.values.len() > self.capacity()
            || self.updates > self.capacity().max(MIN_REBUILD_INTERVAL)
        {
            self.rebuild();
            return;
        }
        let mut j = index + 1;
        while j <= self.capacity() {
            self.tree[j] += delta;
            j += j & j.wrapping_neg();
        }
    }

    /// Sum of all values.
    ///
    /// Exactly zero when every value is zero.
    pub(crate) fn total(&self) -> f64 {
        match self.num_positive {
            0 => 0.0,
            _ => self.tree[self.capacity()].max(0.0),
        }
    }

    /// The first index whose cumulative sum exceeds `mass`.
    ///
    /// Entries with value zero are never returned.  `None`
    /// if every value is zero.
    pub(crate) fn find(&self, mass: f64) -> Option<usize> {
        if self.num_positive == 0 {
            return None;
        }
        let capacity = self.capacity();
        let mut position = 0;
        let mut remaining = mass;
        let mut step = capacity;
        while step > 0 {
            let next = position + step;
            if next <= capacity && self.tree[next] <= remaining {
                position = next;
                remaining -= self.tree[next];
            }
            step >>= 1;
        }
        if self.get(position) > 0.0 {
            Some(position)
        } else {
            // rounding put `mass` past the last positive entry
            self.values.iter().rposition(|v| *v > 0.0)
        }
    }

    fn rebuild(&mut self) {
        let capacity = self.values.len().next_power_of_two();
        let mut tree = vec![0.0; capacity + 1];
        tree[1..=self.values.len()].copy_from_slice(&self.values);
        for j in 1..=capacity {
            let parent = j + (j & j.wrapping_neg());
            if parent <= capacity {
                tree[parent] += tree[j];
            }
        }
        self.tree = tree;
        self.updates = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_empty() {
        let tree = FenwickTree::new();
        assert_eq!(tree.total(), 0.0);
        assert_eq!(tree.find(0.0), None);
    }

    #[test]
    fn test_find_skips_zeros() {
        let mut tree = FenwickTree::new();
        for (i, v) in [0.0, 2.0, 0.0, 0.0, 1.0, 0.0].iter().enumerate() {
            tree.set(i, *v);
        }
        assert_eq!(tree.total(), 3.0);
        assert_eq!(tree.find(0.0), Some(1));
        assert_eq!(tree.find(1.999), Some(1));
        assert_eq!(tree.find(2.0), Some(4));
        assert_eq!(tree.find(2.5), Some(4));
        assert_eq!(tree.find(10.0), Some(4));
        tree.set(4, 0.0);
        assert_eq!(tree.find(2.5), Some(1));
        tree.set(1, 0.0);
        assert_eq!(tree.find(0.5), None);
        assert_eq!(tree.total(), 0.0);
    }

    #[test]
    fn test_total_is_exactly_zero_after_clearing() {
        let mut tree = FenwickTree::new();
        let values = [0.1, 0.7, 1e-3, 0.3, 2.9];
        for (i, v) in values.iter().enumerate() {
            tree.set(i, *v);
        }
        for i in [3, 0, 4, 1, 2] {
            tree.set(i, 0.0);
        }
        assert_eq!(tree.total(), 0.0);
        assert_eq!(tree.find(0.0), None);
    }

    #[test]
    fn test_matches_linear_scan() {
        let mut rng = StdRng::seed_from_u64(101);
        let mut tree = FenwickTree::new();
        let mut values = vec![0.0; 300];
        for _ in 0..5000 {
            let i = rng.gen_range(0..values.len());
            let v = if rng.gen_bool(0.3) { 0.0 } else { rng.gen::<f64>() };
            values[i] = v;
            tree.set(i, v);
        }
        let total: f64 = values.iter().sum();
        assert!((tree.total() - total).abs() < 1e-9);
        for _ in 0..1000 {
            let mass = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let expected = values.iter().position(|v| {
                cumulative += v;
                cumulative > mass
            });
            let found = tree.find(mass).unwrap();
            assert!(values[found] > 0.0);
            // equal up to rounding at a boundary
            if Some(found) != expected {
                let before: f64 = values[..found].iter().sum();
                assert!((before - mass).abs() < 1e-9 || (before + values[found] - mass).abs() < 1e-9);
            }
        }
    }
}
