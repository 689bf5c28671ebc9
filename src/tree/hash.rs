// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! The hash index over the full names of all nodes.
//!
//! Nodes are chained into buckets through their `hash_next` links, so
//! the index holds no storage of its own beyond the bucket heads. When
//! the index becomes overcommitted, a bigger table is allocated and the
//! old one is drained into it incrementally: every later insertion or
//! removal moves one populated bucket. While that happens, lookups
//! probe both tables.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};
use std::iter;
use std::mem;

use log::debug;

use super::node::{Arena, NodeId};
use crate::name::Label;

/// The smallest (and default) number of bits in a table index.
pub const MIN_BITS: u8 = 4;

/// The largest number of bits in a table index.
pub const MAX_BITS: u8 = 32;

/// The table grows once it holds this many nodes per bucket.
const OVERCOMMIT: u64 = 3;

const GOLDEN_RATIO_32: u32 = 0x61C8_8647;

/// Maps a hash value to a bucket of a table with `2^bits` buckets
/// using the top bits of a multiplicative hash.
fn bucket_index(hash: u32, bits: u8) -> usize {
    (hash.wrapping_mul(GOLDEN_RATIO_32) >> (32 - u32::from(bits))) as usize
}

////////////////////////////////////////////////////////////////////////
// TABLES                                                             //
////////////////////////////////////////////////////////////////////////

struct Table {
    bits: u8,
    buckets: Box<[Option<NodeId>]>,
}

impl Table {
    fn new(bits: u8) -> Self {
        Self {
            bits,
            buckets: vec![None; 1 << bits].into_boxed_slice(),
        }
    }

    /// A table with no buckets, used only as a stand-in while the
    /// state is being replaced.
    fn placeholder() -> Self {
        Self {
            bits: 0,
            buckets: Box::new([]),
        }
    }

    fn capacity(&self) -> u64 {
        1 << self.bits
    }

    fn link<T>(&mut self, nodes: &mut Arena<T>, id: NodeId) {
        let bucket = bucket_index(nodes[id].hash_val, self.bits);
        nodes[id].hash_next = self.buckets[bucket];
        self.buckets[bucket] = Some(id);
    }

    /// Removes `id` from its chain. Returns whether it was found.
    fn unlink<T>(&mut self, nodes: &mut Arena<T>, id: NodeId) -> bool {
        let bucket = bucket_index(nodes[id].hash_val, self.bits);
        let mut previous: Option<NodeId> = None;
        let mut current = self.buckets[bucket];
        while let Some(c) = current {
            if c == id {
                let next = nodes[c].hash_next.take();
                match previous {
                    Some(p) => nodes[p].hash_next = next,
                    None => self.buckets[bucket] = next,
                }
                return true;
            }
            previous = current;
            current = nodes[c].hash_next;
        }
        false
    }

    fn bucket_chain<'a, T>(&self, nodes: &'a Arena<T>, hash: u32) -> impl Iterator<Item = NodeId> + 'a {
        let head = self.buckets[bucket_index(hash, self.bits)];
        iter::successors(head, move |&id| nodes[id].hash_next)
    }
}

////////////////////////////////////////////////////////////////////////
// THE INDEX                                                          //
////////////////////////////////////////////////////////////////////////

enum Tables {
    Stable(Table),
    Rehashing {
        old: Table,
        new: Table,
        next_bucket: usize,
    },
}

pub(super) struct HashIndex {
    tables: Tables,
    hasher: RandomState,
}

impl HashIndex {
    /// Creates an index whose first table has `2^bits` buckets. `bits`
    /// is clamped to `[MIN_BITS, MAX_BITS)`.
    pub fn new(bits: u8) -> Self {
        Self {
            tables: Tables::Stable(Table::new(bits.clamp(MIN_BITS, MAX_BITS - 1))),
            hasher: RandomState::new(),
        }
    }

    /// Computes the hash value of a sequence of labels. The same
    /// labels always hash the same within one index, regardless of
    /// ASCII case.
    pub fn hash_labels<'a, I>(&self, labels: I) -> u32
    where
        I: IntoIterator<Item = &'a Label>,
    {
        let mut hasher = self.hasher.build_hasher();
        for label in labels {
            label.hash(&mut hasher);
        }
        let hash = hasher.finish();
        (hash ^ (hash >> 32)) as u32
    }

    /// Adds `id` (whose full name hashes to `hash`) to the index.
    /// `node_count` is the number of nodes in the tree, including `id`.
    pub fn insert<T>(&mut self, nodes: &mut Arena<T>, id: NodeId, hash: u32, node_count: usize) {
        nodes[id].hash_val = hash;
        if self.is_rehashing() {
            self.rehash_step(nodes);
        } else {
            self.maybe_grow(nodes, node_count);
        }
        self.active_mut().link(nodes, id);
    }

    /// Removes `id` from whichever table holds it.
    pub fn remove<T>(&mut self, nodes: &mut Arena<T>, id: NodeId) {
        let found = match &mut self.tables {
            Tables::Stable(table) => table.unlink(nodes, id),
            Tables::Rehashing { old, new, .. } => new.unlink(nodes, id) || old.unlink(nodes, id),
        };
        debug_assert!(found, "node {:?} was not hashed", id);
        self.rehash_step(nodes);
    }

    /// Returns the nodes whose hash value may be `hash`: the chain of
    /// the active table, followed by that of the old table while a
    /// rehash is in progress.
    pub fn candidates<'a, T>(&'a self, nodes: &'a Arena<T>, hash: u32) -> impl Iterator<Item = NodeId> + 'a {
        let (active, old) = match &self.tables {
            Tables::Stable(table) => (table, None),
            Tables::Rehashing { old, new, .. } => (new, Some(old)),
        };
        active
            .bucket_chain(nodes, hash)
            .chain(old.into_iter().flat_map(move |old| old.bucket_chain(nodes, hash)))
            .filter(move |&id| nodes[id].hash_val == hash)
    }

    /// Returns whether `id` is linked into the bucket its hash value
    /// selects, in either table.
    pub fn is_linked<T>(&self, nodes: &Arena<T>, id: NodeId) -> bool {
        self.candidates(nodes, nodes[id].hash_val).any(|c| c == id)
    }

    /// Returns the number of nodes linked into the index.
    pub fn linked_count<T>(&self, nodes: &Arena<T>) -> usize {
        let count = |table: &Table| {
            table
                .buckets
                .iter()
                .map(|&head| iter::successors(head, |&id| nodes[id].hash_next).count())
                .sum::<usize>()
        };
        match &self.tables {
            Tables::Stable(table) => count(table),
            Tables::Rehashing { old, new, .. } => count(old) + count(new),
        }
    }

    pub fn is_rehashing(&self) -> bool {
        matches!(self.tables, Tables::Rehashing { .. })
    }

    /// Returns the number of buckets of the larger live table.
    pub fn size(&self) -> usize {
        match &self.tables {
            Tables::Stable(table) => table.buckets.len(),
            Tables::Rehashing { old, new, .. } => old.buckets.len().max(new.buckets.len()),
        }
    }

    fn active_mut(&mut self) -> &mut Table {
        match &mut self.tables {
            Tables::Stable(table) => table,
            Tables::Rehashing { new, .. } => new,
        }
    }

    /// Starts a rehash if the table is overcommitted for `node_count`
    /// nodes.
    fn maybe_grow<T>(&mut self, nodes: &mut Arena<T>, node_count: usize) {
        let Tables::Stable(table) = &self.tables else {
            return;
        };
        let node_count = node_count as u64;
        if node_count < table.capacity() * OVERCOMMIT {
            return;
        }

        let mut bits = table.bits;
        while bits < MAX_BITS && node_count >= 1 << bits {
            bits += 1;
        }
        if bits == table.bits {
            return;
        }

        debug!(
            "growing hash index from {} to {} buckets for {} nodes",
            table.capacity(),
            1u64 << bits,
            node_count
        );
        let old = match mem::replace(&mut self.tables, Tables::Stable(Table::placeholder())) {
            Tables::Stable(old) => old,
            Tables::Rehashing { .. } => unreachable!(),
        };
        self.tables = Tables::Rehashing {
            old,
            new: Table::new(bits),
            next_bucket: 0,
        };
        self.rehash_step(nodes);
    }

    /// Moves the next populated bucket of the old table into the new
    /// table, or retires the old table once it is empty.
    fn rehash_step<T>(&mut self, nodes: &mut Arena<T>) {
        let Tables::Rehashing {
            old,
            new,
            next_bucket,
        } = &mut self.tables
        else {
            return;
        };

        while *next_bucket < old.buckets.len() && old.buckets[*next_bucket].is_none() {
            *next_bucket += 1;
        }

        if *next_bucket < old.buckets.len() {
            let mut current = old.buckets[*next_bucket].take();
            while let Some(id) = current {
                current = nodes[id].hash_next;
                new.link(nodes, id);
            }
            *next_bucket += 1;
        } else {
            if let Tables::Rehashing { new, .. } =
                mem::replace(&mut self.tables, Tables::Stable(Table::placeholder()))
            {
                self.tables = Tables::Stable(new);
            }
            debug!("hash index rehash complete ({} buckets)", self.size());
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
