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

//! Tree nodes and the arena that owns them.

use std::fmt;
use std::ops::{Index, IndexMut};

use slab::Slab;

use crate::name::LabelSeq;

////////////////////////////////////////////////////////////////////////
// NODE HANDLES                                                       //
////////////////////////////////////////////////////////////////////////

/// A handle to a node of a [`NameTree`](super::NameTree).
///
/// Handles stay valid until the node they refer to is deleted; in
/// particular, rebalancing and node splits never move a name to another
/// handle. A handle to a deleted node may later be reused for a new
/// node, so callers must not keep handles across deletions.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(pub(super) usize);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

////////////////////////////////////////////////////////////////////////
// NODES                                                              //
////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum Color {
    Red,
    Black,
}

/// A node of the tree of trees.
///
/// `left`, `right` and `parent` link the node into the red-black tree
/// of its level. The root of a level has `is_root` set and no parent;
/// `upper` names the node whose `down` link leads to the level (it is
/// `None` on the top level) and is the same for every node of a level.
pub(super) struct Node<T> {
    pub name: LabelSeq,
    pub color: Color,
    pub is_root: bool,
    pub parent: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub down: Option<NodeId>,
    pub upper: Option<NodeId>,
    pub hash_next: Option<NodeId>,
    pub hash_val: u32,
    pub find_callback: bool,
    pub data: Option<T>,
}

impl<T> Node<T> {
    pub fn new(name: LabelSeq) -> Self {
        Self {
            name,
            color: Color::Black,
            is_root: false,
            parent: None,
            left: None,
            right: None,
            down: None,
            upper: None,
            hash_next: None,
            hash_val: 0,
            find_callback: false,
            data: None,
        }
    }

    pub fn is_red(&self) -> bool {
        self.color == Color::Red
    }
}

////////////////////////////////////////////////////////////////////////
// ARENA                                                              //
////////////////////////////////////////////////////////////////////////

/// The storage for every node of a tree. Indexing with a [`NodeId`]
/// that does not refer to a live node panics.
pub(super) struct Arena<T> {
    slab: Slab<Node<T>>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { slab: Slab::new() }
    }

    pub fn insert(&mut self, node: Node<T>) -> NodeId {
        NodeId(self.slab.insert(node))
    }

    pub fn remove(&mut self, id: NodeId) -> Node<T> {
        self.slab.remove(id.0)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slab.contains(id.0)
    }

    pub fn len(&self) -> usize {
        self.slab.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slab.iter().map(|(key, _)| NodeId(key))
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Node<T>> + '_ {
        self.slab.drain()
    }

    /// Returns whether the given (possibly absent) node is red. Absent
    /// nodes count as black.
    pub fn is_red(&self, id: Option<NodeId>) -> bool {
        id.map_or(false, |id| self[id].is_red())
    }

    pub fn is_black(&self, id: Option<NodeId>) -> bool {
        !self.is_red(id)
    }

    /// Returns the left-most node of the subtree rooted at `id`.
    pub fn leftmost(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self[id].left {
            id = left;
        }
        id
    }

    /// Returns the right-most node of the subtree rooted at `id`.
    pub fn rightmost(&self, mut id: NodeId) -> NodeId {
        while let Some(right) = self[id].right {
            id = right;
        }
        id
    }
}

impl<T> Index<NodeId> for Arena<T> {
    type Output = Node<T>;

    fn index(&self, id: NodeId) -> &Self::Output {
        &self.slab[id.0]
    }
}

impl<T> IndexMut<NodeId> for Arena<T> {
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        &mut self.slab[id.0]
    }
}
