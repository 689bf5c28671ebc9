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

//! Ordered traversal of a [`NameTree`].

use arrayvec::ArrayVec;

use super::node::NodeId;
use super::{name_from_fragments, NameTree, MAX_DEPTH};
use crate::name::Name;

////////////////////////////////////////////////////////////////////////
// CHAINS                                                             //
////////////////////////////////////////////////////////////////////////

/// A cursor over the nodes of a [`NameTree`] in DNSSEC canonical order.
///
/// A `Chain` remembers the current node together with the node of
/// every level above it (the *levels*), which is what it takes to walk
/// across levels: the full name of the current node is its own label
/// sequence followed by those of the levels, innermost first. The
/// concatenated names of the levels are the chain's *origin*.
///
/// A chain is filled in by [`NameTree::find_node`] or positioned with
/// [`Chain::first`] and [`Chain::last`], and then moved with
/// [`Chain::next`] and [`Chain::prev`]. It holds only node handles, so
/// it must not be used after the tree has been modified.
///
/// ```
/// use nametree::name::Name;
/// use nametree::tree::{Chain, NameTree};
///
/// let mut tree = NameTree::new();
/// for name in ["b.example.", "a.example.", "example."] {
///     tree.add_name(&name.parse().unwrap(), ()).unwrap();
/// }
/// let mut chain = Chain::new();
/// let mut names = Vec::new();
/// let mut step = chain.first(&tree);
/// while step.is_some() {
///     names.push(chain.name(&tree).unwrap().to_string());
///     step = chain.next(&tree);
/// }
/// assert_eq!(names, ["example.", "a.example.", "b.example."]);
/// ```
#[derive(Clone, Debug)]
pub struct Chain {
    pub(super) end: Option<NodeId>,
    pub(super) levels: ArrayVec<NodeId, MAX_DEPTH>,
    pub(super) level_matches: usize,
}

/// The outcome of a successful chain movement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    /// The chain moved within the same origin.
    Moved,

    /// The chain moved and its origin changed, so a caller that caches
    /// the origin must fetch it again.
    NewOrigin,
}

impl Step {
    fn from_new_origin(new_origin: bool) -> Self {
        if new_origin {
            Self::NewOrigin
        } else {
            Self::Moved
        }
    }
}

impl Chain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self {
            end: None,
            levels: ArrayVec::new(),
            level_matches: 0,
        }
    }

    /// Empties the chain.
    pub fn reset(&mut self) {
        self.end = None;
        self.levels.clear();
        self.level_matches = 0;
    }

    /// Returns the node the chain is positioned at.
    pub fn current(&self) -> Option<NodeId> {
        self.end
    }

    /// Returns the nodes of the levels above the current node,
    /// outermost first.
    pub fn levels(&self) -> &[NodeId] {
        &self.levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// After a lookup, returns how many of the levels matched the name
    /// that was searched for: all of them for an exact match, or the
    /// index of the closest ancestor for a partial match.
    pub fn level_matches(&self) -> usize {
        self.level_matches
    }

    pub(super) fn push_level(&mut self, id: NodeId) {
        // NOTE: a name has at most MAX_N_LABELS labels and every level
        // consumes at least one, so this cannot overflow.
        self.levels.push(id);
    }

    /// Returns the full name of the current node.
    pub fn name<T>(&self, tree: &NameTree<T>) -> Option<Name> {
        let end = self.end?;
        Some(name_from_fragments(
            std::iter::once(end)
                .chain(self.levels.iter().rev().copied())
                .map(|id| &tree.nodes[id].name),
        ))
    }

    /// Returns the full name of the current node given the chain's
    /// origin, as previously returned by [`Chain::origin`].
    pub fn name_with_origin<T>(&self, tree: &NameTree<T>, origin: &Name) -> Option<Name> {
        let end = self.end?;
        let fragment = &tree.nodes[end].name;
        if self.levels.is_empty() {
            Some(name_from_fragments([fragment]))
        } else {
            Some(name_from_fragments([fragment, origin.as_label_seq()]))
        }
    }

    /// Returns the name formed by the levels, innermost first, or the
    /// root name if there are none.
    pub fn origin<T>(&self, tree: &NameTree<T>) -> Name {
        if self.levels.is_empty() {
            Name::root()
        } else {
            name_from_fragments(self.levels.iter().rev().map(|&id| &tree.nodes[id].name))
        }
    }

    /// Positions the chain at the first node of the tree. Returns
    /// `None` if the tree is empty.
    pub fn first<T>(&mut self, tree: &NameTree<T>) -> Option<Step> {
        self.reset();
        let root = tree.root?;
        self.end = Some(tree.nodes.leftmost(root));
        Some(Step::NewOrigin)
    }

    /// Positions the chain at the last node of the tree: the right-most
    /// node of the deepest right-most level. Returns `None` if the tree
    /// is empty.
    pub fn last<T>(&mut self, tree: &NameTree<T>) -> Option<Step> {
        self.reset();
        let root = tree.root?;
        self.move_to_last(tree, root);
        Some(Step::NewOrigin)
    }

    /// Moves to the last node at or below the level rooted at `start`,
    /// pushing every level passed through.
    pub(super) fn move_to_last<T>(&mut self, tree: &NameTree<T>, start: NodeId) {
        let mut current = start;
        loop {
            current = tree.nodes.rightmost(current);
            match tree.nodes[current].down {
                Some(down) => {
                    self.push_level(current);
                    current = down;
                }
                None => break,
            }
        }
        self.end = Some(current);
    }

    /// Moves to the next node in canonical order. Returns `None`,
    /// leaving the chain in place, if there is no next node.
    pub fn next<T>(&mut self, tree: &NameTree<T>) -> Option<Step> {
        let nodes = &tree.nodes;
        let mut current = self.end?;
        let mut new_origin = false;

        // The subdomains of the current node come first.
        if let Some(down) = nodes[current].down {
            if !self.levels.is_empty() || nodes[current].name.len() > 1 {
                new_origin = true;
            }
            self.push_level(current);
            self.end = Some(nodes.leftmost(down));
            return Some(Step::from_new_origin(new_origin));
        }

        let mut levels_popped = 0;
        let successor = loop {
            if let Some(right) = nodes[current].right {
                break nodes.leftmost(right);
            }

            // Climb to the first ancestor reached from its left.
            let mut found = None;
            while let Some(parent) = nodes[current].parent {
                let previous = current;
                current = parent;
                if nodes[current].left == Some(previous) {
                    found = Some(current);
                    break;
                }
            }
            if let Some(found) = found {
                break found;
            }

            // The level is exhausted; continue after the node that owns
            // it.
            match self.levels.pop() {
                Some(up) => {
                    levels_popped += 1;
                    new_origin = true;
                    current = up;
                }
                None => {
                    // NOTE: this was the last node; restore the levels.
                    self.restore_popped(tree, levels_popped);
                    return None;
                }
            }
        };

        self.end = Some(successor);
        Some(Step::from_new_origin(new_origin))
    }

    /// Undoes the level pops of an unsuccessful [`Chain::next`] by
    /// following `upper` links from the unchanged current node.
    fn restore_popped<T>(&mut self, tree: &NameTree<T>, popped: usize) {
        if popped == 0 {
            return;
        }
        let mut uppers: ArrayVec<NodeId, MAX_DEPTH> = ArrayVec::new();
        let mut owner = self.end.and_then(|end| tree.nodes[end].upper);
        while let Some(id) = owner {
            uppers.push(id);
            owner = tree.nodes[id].upper;
        }
        self.levels.clear();
        self.levels.extend(uppers.into_iter().rev());
    }

    /// Moves to the previous node in canonical order. Returns `None`,
    /// leaving the chain in place, if there is no previous node.
    pub fn prev<T>(&mut self, tree: &NameTree<T>) -> Option<Step> {
        let nodes = &tree.nodes;
        let mut current = self.end?;
        let mut predecessor = None;

        if let Some(left) = nodes[current].left {
            predecessor = Some(nodes.rightmost(left));
        } else {
            while let Some(parent) = nodes[current].parent {
                let previous = current;
                current = parent;
                if nodes[current].right == Some(previous) {
                    predecessor = Some(current);
                    break;
                }
            }
        }

        let new_origin;
        match predecessor {
            Some(found) => {
                // The predecessor's subdomains sort after it, so the
                // answer is the last node beneath it, if any.
                if let Some(down) = nodes[found].down {
                    self.push_level(found);
                    self.move_to_last(tree, down);
                    return Some(Step::NewOrigin);
                }
                new_origin = false;
                self.end = Some(found);
            }
            None => {
                // The first node of a level follows the node owning the
                // level.
                let up = self.levels.pop()?;
                new_origin = !self.levels.is_empty() || nodes[up].name.len() > 1;
                self.end = Some(up);
            }
        }
        Some(Step::from_new_origin(new_origin))
    }

    /// Moves to the first node of the level below the current node.
    /// Returns `None`, leaving the chain in place, if there is none.
    pub fn down<T>(&mut self, tree: &NameTree<T>) -> Option<Step> {
        let nodes = &tree.nodes;
        let current = self.end?;
        let down = nodes[current].down?;
        let new_origin = !self.levels.is_empty() || nodes[current].name.len() > 1;
        self.push_level(current);
        self.end = Some(nodes.leftmost(down));
        Some(Step::from_new_origin(new_origin))
    }

    /// Moves to the next node of the current level, ignoring every
    /// other level. Returns `None`, leaving the chain in place, at the
    /// end of the level.
    pub fn next_flat<T>(&mut self, tree: &NameTree<T>) -> Option<Step> {
        let nodes = &tree.nodes;
        let mut current = self.end?;

        if let Some(right) = nodes[current].right {
            self.end = Some(nodes.leftmost(right));
            return Some(Step::Moved);
        }
        while let Some(parent) = nodes[current].parent {
            let previous = current;
            current = parent;
            if nodes[current].left == Some(previous) {
                self.end = Some(current);
                return Some(Step::Moved);
            }
        }
        None
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////
// ITERATORS                                                          //
////////////////////////////////////////////////////////////////////////

/// One end of an [`Iter`].
struct Cursor {
    chain: Chain,
    started: bool,
    origin: Option<Name>,
}

impl Cursor {
    fn new() -> Self {
        Self {
            chain: Chain::new(),
            started: false,
            origin: None,
        }
    }
}

/// An iterator over the names and data of a [`NameTree`], in canonical
/// order. Nodes without data are skipped.
///
/// Constructed with [`NameTree::iter`].
pub struct Iter<'a, T> {
    tree: &'a NameTree<T>,
    front: Cursor,
    back: Cursor,
    finished: bool,
}

impl<'a, T> Iter<'a, T> {
    pub(super) fn new(tree: &'a NameTree<T>) -> Self {
        Self {
            tree,
            front: Cursor::new(),
            back: Cursor::new(),
            finished: false,
        }
    }

    /// Advances one end by one node. Returns the node, or `None` (and
    /// finishes the iteration) when the ends have met.
    fn advance(&mut self, forward: bool) -> Option<(NodeId, Option<&'a T>)> {
        if self.finished {
            return None;
        }
        let tree = self.tree;
        let (cursor, other) = if forward {
            (&mut self.front, &self.back)
        } else {
            (&mut self.back, &self.front)
        };

        let step = match (cursor.started, forward) {
            (false, true) => cursor.chain.first(tree),
            (false, false) => cursor.chain.last(tree),
            (true, true) => cursor.chain.next(tree),
            (true, false) => cursor.chain.prev(tree),
        };
        cursor.started = true;

        let (step, id) = match (step, cursor.chain.current()) {
            (Some(step), Some(id)) if other.chain.current() != Some(id) => (step, id),
            _ => {
                self.finished = true;
                return None;
            }
        };
        if step == Step::NewOrigin || cursor.origin.is_none() {
            cursor.origin = Some(cursor.chain.origin(tree));
        }
        Some((id, tree.nodes[id].data.as_ref()))
    }

    fn name_at(&self, forward: bool) -> Name {
        let cursor = if forward { &self.front } else { &self.back };
        // NOTE: the unwraps are okay, since advance() just positioned
        // the chain and set the origin.
        let origin = cursor.origin.as_ref().unwrap();
        cursor.chain.name_with_origin(self.tree, origin).unwrap()
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (Name, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (_, data) = self.advance(true)?;
            if let Some(data) = data {
                return Some((self.name_at(true), data));
            }
        }
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            let (_, data) = self.advance(false)?;
            if let Some(data) = data {
                return Some((self.name_at(false), data));
            }
        }
    }
}

/// An iterator over every node handle of a [`NameTree`], placeholders
/// included, in canonical order.
///
/// Constructed with [`NameTree::iter_nodes`].
pub struct NodeIds<'a, T> {
    tree: &'a NameTree<T>,
    chain: Chain,
    started: bool,
}

impl<'a, T> NodeIds<'a, T> {
    pub(super) fn new(tree: &'a NameTree<T>) -> Self {
        Self {
            tree,
            chain: Chain::new(),
            started: false,
        }
    }
}

impl<T> Iterator for NodeIds<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let step = if self.started {
            self.chain.next(self.tree)
        } else {
            self.started = true;
            self.chain.first(self.tree)
        };
        step.and(self.chain.current())
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
