//! State commitment tree.
//!
//! An append-only Merkle tree over note commitments. Node layers are kept up
//! to date on append, touching one node per level, so roots and paths are
//! read rather than recomputed. Snapshots are cheap
//! (`Arc` clones of an immutable value) and every authentication path is
//! computed against the root of the snapshot it came from, so a witness can
//! always be checked for staleness by comparing anchors.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::bytes::{hash_with_domain, hex_newtype};
use crate::error::StoreError;

/// Default depth of the state commitment tree.
pub const DEFAULT_TREE_DEPTH: u8 = 24;

/// Maximum supported depth (positions are `u64`, leaf counts must fit).
pub const MAX_TREE_DEPTH: u8 = 32;

const LEAF_DOMAIN: &[u8] = b"shielded_view_sct_leaf_v1";
const NODE_DOMAIN: &[u8] = b"shielded_view_sct_node_v1";
const EMPTY_DOMAIN: &[u8] = b"shielded_view_sct_empty_v1";

hex_newtype!(
    /// Root of the state commitment tree at a point in time.
    Anchor,
    32
);

hex_newtype!(
    /// Binding commitment to a spendable note, as recorded in the tree.
    NoteCommitment,
    32
);

/// Leaf index in the tree.
pub type Position = u64;

/// Authentication path from a leaf to the root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPath {
    /// Position of the leaf.
    pub position: Position,
    /// Sibling hashes from the leaf level upwards.
    pub siblings: Vec<[u8; 32]>,
}

impl AuthPath {
    /// Recompute the root implied by this path for `commitment`.
    pub fn root_for(&self, commitment: &NoteCommitment) -> Anchor {
        let mut current = hash_leaf(commitment);
        let mut index = self.position;
        for sibling in &self.siblings {
            current = if index & 1 == 0 {
                hash_node(&current, sibling)
            } else {
                hash_node(sibling, &current)
            };
            index >>= 1;
        }
        Anchor(current)
    }

    /// Whether this path proves membership of `commitment` under `anchor`.
    pub fn verify(&self, commitment: &NoteCommitment, anchor: &Anchor) -> bool {
        self.root_for(commitment) == *anchor
    }
}

/// Append-only note commitment tree.
#[derive(Clone, Debug)]
pub struct StateCommitmentTree {
    depth: u8,
    positions: HashMap<NoteCommitment, Position>,
    /// Populated nodes per level, leaf hashes first. A node whose right
    /// child is missing is hashed with the empty-subtree value.
    layers: Vec<Vec<[u8; 32]>>,
    /// `empty[l]` is the root of an empty subtree of height `l`.
    empty: Vec<[u8; 32]>,
}

impl Default for StateCommitmentTree {
    fn default() -> Self {
        Self::new(DEFAULT_TREE_DEPTH)
    }
}

impl StateCommitmentTree {
    /// Create an empty tree. Depth is clamped to `1..=MAX_TREE_DEPTH`.
    pub fn new(depth: u8) -> Self {
        let depth = depth.clamp(1, MAX_TREE_DEPTH);
        let mut empty = Vec::with_capacity(depth as usize + 1);
        empty.push(hash_with_domain(EMPTY_DOMAIN, &[]));
        for level in 0..depth as usize {
            let below = empty[level];
            empty.push(hash_node(&below, &below));
        }
        Self {
            depth,
            positions: HashMap::new(),
            layers: vec![Vec::new(); depth as usize + 1],
            empty,
        }
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Number of leaves appended so far.
    pub fn size(&self) -> u64 {
        self.layers[0].len() as u64
    }

    fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    /// Append a note commitment, returning its position.
    ///
    /// Re-appending a commitment already in the tree returns its existing
    /// position without growing the tree.
    pub fn append(&mut self, commitment: NoteCommitment) -> Result<Position, StoreError> {
        if let Some(position) = self.positions.get(&commitment) {
            return Ok(*position);
        }
        if self.size() >= self.capacity() {
            return Err(StoreError::TreeFull);
        }
        let position = self.size();
        self.layers[0].push(hash_leaf(&commitment));
        self.positions.insert(commitment, position);

        let mut index = position as usize;
        for level in 0..self.depth as usize {
            let left = index & !1;
            let layer = &self.layers[level];
            let parent = hash_node(
                &layer[left],
                layer.get(left + 1).unwrap_or(&self.empty[level]),
            );
            index >>= 1;
            let above = &mut self.layers[level + 1];
            match above.get_mut(index) {
                Some(node) => *node = parent,
                None => above.push(parent),
            }
        }
        debug!(position, "appended note commitment");
        Ok(position)
    }

    pub fn position_of(&self, commitment: &NoteCommitment) -> Option<Position> {
        self.positions.get(commitment).copied()
    }

    /// Current root.
    pub fn root(&self) -> Anchor {
        let depth = self.depth as usize;
        Anchor(
            self.layers[depth]
                .first()
                .copied()
                .unwrap_or(self.empty[depth]),
        )
    }

    /// Authentication path for `commitment`, or `None` if it is not in the tree.
    pub fn witness(&self, commitment: &NoteCommitment) -> Option<AuthPath> {
        let position = self.position_of(commitment)?;
        Some(self.witness_at(position))
    }

    /// Authentication paths for several commitments.
    pub fn witness_many<'a, I>(&self, commitments: I) -> Vec<(NoteCommitment, Option<AuthPath>)>
    where
        I: IntoIterator<Item = &'a NoteCommitment>,
    {
        commitments
            .into_iter()
            .map(|c| (*c, self.position_of(c).map(|p| self.witness_at(p))))
            .collect()
    }

    fn witness_at(&self, position: Position) -> AuthPath {
        let mut siblings = Vec::with_capacity(self.depth as usize);
        let mut index = position as usize;
        for level in 0..self.depth as usize {
            let sibling = self.layers[level]
                .get(index ^ 1)
                .copied()
                .unwrap_or(self.empty[level]);
            siblings.push(sibling);
            index >>= 1;
        }
        AuthPath { position, siblings }
    }
}

fn hash_leaf(commitment: &NoteCommitment) -> [u8; 32] {
    hash_with_domain(LEAF_DOMAIN, &[commitment.as_bytes()])
}

fn hash_node(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    hash_with_domain(NODE_DOMAIN, &[left, right])
}
