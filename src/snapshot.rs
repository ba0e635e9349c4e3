//! Bipartition snapshots of phylogenetic trees, restricted to a shared leaf set.
//!
//! A [`TreeSnapshot`] captures the non-trivial bipartitions (splits) a tree
//! induces on a given leaf set. The reference tree and an inferred tree
//! rarely carry identical taxa, so both snapshots are built over the
//! intersection of their leaf names and the Robinson-Foulds distance is
//! computed on that common set, the way ete3's unrooted comparison does.
//!
//! # Why taxon NAMES, not node ids
//! Node ids are assigned during parsing and differ across files; taxon names
//! are the stable identity. The shared leaf set is sorted alphabetically so
//! a given taxon always maps to the same bit position in both snapshots.
//!
//! # Canonicalization
//! Every split can be written from either side: {A,B}|{C,D} or {C,D}|{A,B}.
//! We always store the side that does NOT contain leaf 0, so identical
//! splits from the two trees compare equal bit-for-bit.

use crate::bitset::Bitset;
use phylotree::tree::{Tree as PhyloTree, TreeError};
use std::collections::{HashMap, HashSet};

/// Immutable set of canonical non-trivial splits a tree induces on a shared
/// leaf set. Stored in a `HashSet` so RF intersection is O(n).
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    /// Canonical splits (side without leaf 0), trivial splits excluded.
    pub parts: HashSet<Bitset>,
    /// Size of the shared leaf set the snapshot was restricted to.
    pub num_leaves: usize,
}

/// Collect a tree's leaf names (unnamed leaves are skipped).
pub fn leaf_names(tree: &PhyloTree) -> HashSet<String> {
    tree.get_leaves()
        .iter()
        .filter_map(|leaf_id| tree.get(leaf_id).ok().and_then(|n| n.name.clone()))
        .collect()
}

/// Map the leaf names two trees have in common to bit indices, assigned in
/// alphabetical order so both snapshots agree on positions.
pub fn shared_leaf_index(a: &PhyloTree, b: &PhyloTree) -> HashMap<String, usize> {
    let names_a = leaf_names(a);
    let names_b = leaf_names(b);
    let mut shared: Vec<&String> = names_a.intersection(&names_b).collect();
    shared.sort();
    shared
        .into_iter()
        .enumerate()
        .map(|(idx, name)| (name.clone(), idx))
        .collect()
}

impl TreeSnapshot {
    /// Extract the splits `tree` induces on the leaves named in `leaf_index`.
    ///
    /// Leaves absent from `leaf_index` simply contribute nothing, which is
    /// equivalent to pruning them before comparison. Splits that become
    /// trivial after restriction (fewer than two leaves on either side) are
    /// dropped; restricted splits that coincide collapse into one entry.
    ///
    /// # Errors
    /// Returns `TreeError` if the tree has no root or a dangling node id.
    pub fn from_tree(
        tree: &PhyloTree,
        leaf_index: &HashMap<String, usize>,
    ) -> Result<Self, TreeError> {
        let num_leaves = leaf_index.len();
        let words = num_leaves.div_ceil(64).max(1);

        let root_id = tree.get_root()?;
        let mut cache: HashMap<usize, Bitset> = HashMap::new();
        Self::compute_bitsets(root_id, tree, leaf_index, words, &mut cache)?;

        let mut parts = HashSet::new();
        for (&node_id, bitset) in cache.iter() {
            if node_id == root_id {
                continue;
            }
            let ones = bitset.count_ones();
            // Trivial after restriction to the shared leaf set.
            if ones < 2 || ones + 2 > num_leaves {
                continue;
            }
            let canonical = if bitset.contains(0) {
                bitset.complement(num_leaves)
            } else {
                bitset.clone()
            };
            parts.insert(canonical);
        }

        Ok(TreeSnapshot { parts, num_leaves })
    }

    /// DFS from `node_id`, building each node's restricted leaf set bottom-up:
    /// a leaf maps to its single bit (or an empty set when not shared), an
    /// internal node is the union of its children.
    fn compute_bitsets(
        node_id: usize,
        tree: &PhyloTree,
        leaf_index: &HashMap<String, usize>,
        words: usize,
        cache: &mut HashMap<usize, Bitset>,
    ) -> Result<Bitset, TreeError> {
        if let Some(bitset) = cache.get(&node_id) {
            return Ok(bitset.clone());
        }

        let node = tree.get(&node_id)?;

        let mut bitset = Bitset::zeros(words);
        if node.children.is_empty() {
            if let Some(idx) = node.name.as_ref().and_then(|n| leaf_index.get(n)) {
                bitset.set(*idx);
            }
        } else {
            for &child_id in &node.children {
                let child = Self::compute_bitsets(child_id, tree, leaf_index, words, cache)?;
                bitset.or_assign(&child);
            }
        }

        cache.insert(node_id, bitset.clone());
        Ok(bitset)
    }
}
