//! Compact bitset representation for leaf sets in tree bipartitions.
//!
//! Each bit position corresponds to a leaf index in the (alphabetically
//! sorted) shared leaf set of the two trees being compared. For leaves
//! [A, B, C, D] mapped to [0, 1, 2, 3], the split {A, C} is `0b0101`.

/// A compact bitset over leaf indices, stored as `Vec<u64>` words so trees
/// of any size are supported (one word per 64 leaves).
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bitset(pub Vec<u64>);

impl Bitset {
    /// Creates a bitset of `words` u64 words, all bits cleared.
    ///
    /// # Example
    /// ```
    /// # use lingtree_eval::bitset::Bitset;
    /// // A tree with 100 leaves needs 2 words (128 bits).
    /// let bs = Bitset::zeros(2);
    /// assert_eq!(bs.0.len(), 2);
    /// ```
    pub fn zeros(words: usize) -> Self {
        Bitset(vec![0u64; words])
    }

    /// Marks leaf `idx` as present in this side of the split.
    #[inline]
    pub fn set(&mut self, idx: usize) {
        let word = idx >> 6;
        let bit = idx & 63;
        self.0[word] |= 1u64 << bit;
    }

    /// Whether leaf `idx` is present.
    #[inline]
    pub fn contains(&self, idx: usize) -> bool {
        let word = idx >> 6;
        let bit = idx & 63;
        (self.0[word] >> bit) & 1 != 0
    }

    /// Union in place: `self` becomes `self ∪ other`.
    #[inline]
    pub fn or_assign(&mut self, other: &Bitset) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a |= *b;
        }
    }

    /// Number of leaves in this side of the split.
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// The other side of the split: all bits below `num_leaves` flipped,
    /// bits at and above `num_leaves` left clear.
    ///
    /// # Example
    /// ```
    /// # use lingtree_eval::bitset::Bitset;
    /// let mut bs = Bitset::zeros(1);
    /// bs.set(0);
    /// bs.set(1);
    /// assert_eq!(bs.complement(4).0[0], 0b1100);
    /// ```
    pub fn complement(&self, num_leaves: usize) -> Bitset {
        let mut out = Bitset::zeros(self.0.len());
        for i in 0..num_leaves {
            if !self.contains(i) {
                out.set(i);
            }
        }
        out
    }
}
