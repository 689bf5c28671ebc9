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

//! The [`NameTree`] type: an ordered index of domain names.
//!
//! # Structure
//!
//! A `NameTree` is a *tree of trees*. Each *level* is a red-black tree
//! whose nodes hold label sequences; a node may own a level of its own
//! through its *down* link, which holds the subdomains of the node's
//! name with the node's labels stripped. The full name of a node is
//! therefore its own label sequence followed by those of the nodes
//! owning the levels above it. For example, after inserting
//! `a.example.`, `b.example.` and `other.`, the tree looks like this:
//!
//! ```text
//! .
//! └─down→ example ── other
//!         └─down→ a ── b
//! ```
//!
//! (The `.` node holds the root label.) Nodes that are
//! created to hold a shared suffix, like `.` above, carry no data and
//! are not visible to lookups by default; they are sometimes called
//! *placeholders*. Deletion never merges levels back together, so
//! placeholders stay in the tree until they are removed explicitly.
//!
//! Besides the levels, every node is indexed by a hash of its full
//! name, which lets a lookup jump straight to the right node of a
//! level without comparing its way through the level. The hash index
//! grows incrementally, so no single mutation has to rehash the whole
//! tree.
//!
//! Ordered traversal is provided by [`Chain`], a cursor that keeps
//! track of the levels above its current node, and by the iterators
//! built on it.

use std::cmp::Ordering;
use std::fmt;
use std::mem;

use log::{trace, warn};

use crate::name::{LabelSeq, Name, NameRelation, MAX_N_LABELS};
use hash::HashIndex;
use node::{Arena, Node};

mod chain;
mod check;
mod dump;
mod error;
mod hash;
mod level;
mod node;
mod teardown;

#[cfg(test)]
mod proptests;

pub use chain::{Chain, Iter, NodeIds, Step};
pub use check::{Violation, ViolationKind};
pub use dump::{DotDump, TextDump};
pub use error::Error;
pub use node::NodeId;
pub use teardown::Teardown;

/// The greatest number of levels a name can pass through. Each level
/// consumes at least one label, so this is never a limit for names of
/// valid length.
pub const MAX_DEPTH: usize = MAX_N_LABELS;

////////////////////////////////////////////////////////////////////////
// OPTIONS AND RESULTS                                                //
////////////////////////////////////////////////////////////////////////

/// Construction options for a [`NameTree`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TreeOptions {
    /// The initial hash table size, as a power of two. Values outside
    /// of `[4, 32)` are clamped.
    pub hash_bits: u8,

    /// The greatest number of levels an insertion may pass through
    /// before failing with [`Error::NoSpace`]. Values are clamped to
    /// `[1, MAX_DEPTH]`, so a tree can always hold a name below a
    /// top-level node.
    pub max_depth: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            hash_bits: hash::MIN_BITS,
            max_depth: MAX_DEPTH,
        }
    }
}

/// Options for [`NameTree::find_node`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FindOptions {
    /// Allow nodes without data to be returned, as exact or partial
    /// matches.
    pub empty_data: bool,

    /// Report an exact match as a partial match on the closest
    /// ancestor of the name.
    pub no_exact: bool,

    /// Do not position the chain at the predecessor of the name when
    /// there is no exact match. This may not be combined with
    /// `no_exact`.
    pub no_predecessor: bool,
}

/// The result of a lookup.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FindResult {
    /// The name is in the tree.
    Found(NodeId),

    /// The name is not in the tree, but this node, the closest of its
    /// ancestors, is.
    PartialMatch(NodeId),

    /// Neither the name nor any ancestor is in the tree.
    NotFound,
}

impl FindResult {
    /// Returns the exactly or partially matching node, if any.
    pub fn node(self) -> Option<NodeId> {
        match self {
            Self::Found(id) | Self::PartialMatch(id) => Some(id),
            Self::NotFound => None,
        }
    }
}

/// The result of a successful [`NameTree::add_node`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Added {
    /// A node was created for the name.
    Created(NodeId),

    /// The name already had a node, with or without data.
    Existing(NodeId),
}

impl Added {
    pub fn node(self) -> NodeId {
        match self {
            Self::Created(id) | Self::Existing(id) => id,
        }
    }
}

/// What a find callback wants the lookup to do next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallbackAction {
    /// Keep descending.
    Continue,

    /// Stop at this node, as if it had nothing below it.
    Stop,
}

/// A callback invoked by [`NameTree::find_node_with`] for every node
/// passed on the way down whose find-callback flag is set. It receives
/// the node, its full name, and its data.
pub type FindCallback<'a, T> = dyn FnMut(NodeId, &Name, Option<&T>) -> CallbackAction + 'a;

type Deleter<T> = Box<dyn FnMut(T)>;

/// Where the root of a level is stored.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LevelSlot {
    Top,
    Down(NodeId),
}

impl LevelSlot {
    fn upper(self) -> Option<NodeId> {
        match self {
            Self::Top => None,
            Self::Down(owner) => Some(owner),
        }
    }

    fn of<T>(node: &Node<T>) -> Self {
        node.upper.map_or(Self::Top, Self::Down)
    }
}

////////////////////////////////////////////////////////////////////////
// THE TREE                                                           //
////////////////////////////////////////////////////////////////////////

/// An ordered index mapping domain names to data of type `T`.
///
/// See the [module documentation](self) for how the tree is organized.
/// Mutating methods take `&mut self`. A [`NodeId`] stays valid until
/// its node is deleted, but a [`Chain`] must not be used once the tree
/// is modified.
///
/// ```
/// use nametree::name::Name;
/// use nametree::tree::{FindOptions, FindResult, NameTree};
///
/// let mut tree = NameTree::new();
/// let apex: Name = "example.".parse().unwrap();
/// let www: Name = "www.example.".parse().unwrap();
/// tree.add_name(&apex, "apex").unwrap();
/// tree.add_name(&www, "www").unwrap();
///
/// assert_eq!(tree.get(&www), Some(&"www"));
/// let mail: Name = "mail.example.".parse().unwrap();
/// let found = tree.find_node(&mail, FindOptions::default(), None);
/// assert!(matches!(found, FindResult::PartialMatch(_)));
/// assert_eq!(tree.data(found.node().unwrap()), Some(&"apex"));
/// ```
pub struct NameTree<T> {
    nodes: Arena<T>,
    root: Option<NodeId>,
    hash: HashIndex,
    max_depth: usize,
    deleter: Option<Deleter<T>>,
}

impl<T> NameTree<T> {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::with_options(TreeOptions::default())
    }

    /// Creates an empty tree with the given options.
    pub fn with_options(options: TreeOptions) -> Self {
        Self {
            nodes: Arena::new(),
            root: None,
            hash: HashIndex::new(options.hash_bits),
            max_depth: options.max_depth.clamp(1, MAX_DEPTH),
            deleter: None,
        }
    }

    /// Creates an empty tree that passes data to `deleter` whenever the
    /// tree itself disposes of it: when a node is deleted, and when the
    /// tree is dropped or torn down. Data returned to the caller (by
    /// [`NameTree::set_data`] or [`NameTree::take_data`]) is not passed
    /// to the deleter.
    pub fn with_deleter<F>(options: TreeOptions, deleter: F) -> Self
    where
        F: FnMut(T) + 'static,
    {
        let mut tree = Self::with_options(options);
        tree.deleter = Some(Box::new(deleter));
        tree
    }

    ////////////////////////////////////////////////////////////////////
    // INSERTION                                                      //
    ////////////////////////////////////////////////////////////////////

    /// Finds or creates the node for `name`.
    ///
    /// On failure with [`Error::NoSpace`], nodes split on the way down
    /// stay split; the tree is still valid.
    pub fn add_node(&mut self, name: &Name) -> Result<Added, Error> {
        let root = match self.root {
            Some(root) => root,
            None => {
                let hash = self.hash.hash_labels(name.labels());
                let id = self.create_node(name.as_label_seq().clone(), None, hash);
                level::add_on_level(&mut self.nodes, id, id, Ordering::Equal, &mut self.root);
                return Ok(Added::Created(id));
            }
        };

        let mut add_name = name.as_label_seq().clone();
        let mut slot = LevelSlot::Top;
        let mut hlabels = 0;
        let mut level_count = 0;
        let mut current = root;
        let mut child = Some(root);
        let mut order = Ordering::Equal;

        while let Some(node) = child {
            current = node;
            let comparison = add_name.full_compare(&self.nodes[current].name);
            order = comparison.order;

            match comparison.relation {
                NameRelation::Equal => return Ok(Added::Existing(current)),

                NameRelation::Unrelated => {
                    child = if order == Ordering::Less {
                        self.nodes[current].left
                    } else {
                        self.nodes[current].right
                    };
                }

                NameRelation::Subdomain => {
                    self.check_depth(name, level_count)?;
                    let common = comparison.common_labels;
                    add_name = add_name.prefix(add_name.len() - common);
                    hlabels += common;
                    level_count += 1;
                    slot = LevelSlot::Down(current);
                    child = self.nodes[current].down;
                }

                NameRelation::Superdomain | NameRelation::CommonAncestor => {
                    self.check_depth(name, level_count)?;
                    let common = comparison.common_labels;
                    hlabels += common;
                    let suffix = self.split(current, common, slot, name, hlabels);
                    if common == add_name.len() {
                        return Ok(Added::Created(suffix));
                    }

                    // The rest of the name goes next to the demoted
                    // node; their order is that of the full names.
                    add_name = add_name.prefix(add_name.len() - common);
                    slot = LevelSlot::Down(suffix);
                    break;
                }
            }
        }

        let hash = self.hash.hash_labels(name.labels());
        let id = self.create_node(add_name, slot.upper(), hash);
        self.with_level(slot, |nodes, root| {
            level::add_on_level(nodes, id, current, order, root);
        });
        Ok(Added::Created(id))
    }

    /// Adds `name` with `data`. Fails with [`Error::Exists`] (dropping
    /// `data`) if the name already has data; a placeholder node for the
    /// name is given the data.
    pub fn add_name(&mut self, name: &Name, data: T) -> Result<NodeId, Error> {
        let id = self.add_node(name)?.node();
        let node = &mut self.nodes[id];
        if node.data.is_some() {
            Err(Error::Exists)
        } else {
            node.data = Some(data);
            Ok(id)
        }
    }

    fn check_depth(&self, name: &Name, level_count: usize) -> Result<(), Error> {
        if level_count >= self.max_depth {
            warn!(
                "cannot add {}: more than {} levels deep",
                name, self.max_depth
            );
            Err(Error::NoSpace)
        } else {
            Ok(())
        }
    }

    /// Allocates a detached node and hashes it.
    fn create_node(&mut self, name: LabelSeq, upper: Option<NodeId>, hash: u32) -> NodeId {
        let mut node = Node::new(name);
        node.upper = upper;
        let id = self.nodes.insert(node);
        let node_count = self.nodes.len();
        self.hash.insert(&mut self.nodes, id, hash, node_count);
        id
    }

    /// Splits `current`, which shares its last `common` labels with the
    /// name being inserted. A new node holding those labels takes over
    /// `current`'s position in its level (stored at `slot`), and
    /// `current` keeps the remaining labels as the only node of the new
    /// node's down level. `hlabels` is the length of the new node's
    /// full name, which is a suffix of `name`.
    fn split(
        &mut self,
        current: NodeId,
        common: usize,
        slot: LevelSlot,
        name: &Name,
        hlabels: usize,
    ) -> NodeId {
        let (prefix, suffix) = self.nodes[current].name.split(common);
        trace!("splitting {} from {} while adding {}", suffix, prefix, name);

        let old = &self.nodes[current];
        let mut node = Node::new(suffix);
        node.is_root = old.is_root;
        node.parent = old.parent;
        node.left = old.left;
        node.right = old.right;
        node.color = old.color;
        node.upper = old.upper;
        node.down = Some(current);
        let was_root = old.is_root;
        let id = self.nodes.insert(node);

        // Point everything that referred to current's position at the
        // new node.
        if let Some(parent) = self.nodes[id].parent {
            if self.nodes[parent].left == Some(current) {
                self.nodes[parent].left = Some(id);
            } else {
                self.nodes[parent].right = Some(id);
            }
        }
        if let Some(left) = self.nodes[id].left {
            self.nodes[left].parent = Some(id);
        }
        if let Some(right) = self.nodes[id].right {
            self.nodes[right].parent = Some(id);
        }
        if was_root {
            self.with_level(slot, |_, root| *root = Some(id));
        }

        let demoted = &mut self.nodes[current];
        demoted.name = prefix;
        demoted.is_root = true;
        demoted.parent = None;
        demoted.left = None;
        demoted.right = None;
        demoted.color = node::Color::Black;
        demoted.upper = Some(id);

        let hash = self
            .hash
            .hash_labels(name.labels().skip(name.len() - hlabels));
        let node_count = self.nodes.len();
        self.hash.insert(&mut self.nodes, id, hash, node_count);
        id
    }

    /// Runs `f` on the arena and the root of the level stored at
    /// `slot`, then stores the (possibly changed) root back.
    fn with_level<F, R>(&mut self, slot: LevelSlot, f: F) -> R
    where
        F: FnOnce(&mut Arena<T>, &mut Option<NodeId>) -> R,
    {
        let mut root = match slot {
            LevelSlot::Top => self.root,
            LevelSlot::Down(owner) => self.nodes[owner].down,
        };
        let result = f(&mut self.nodes, &mut root);
        match slot {
            LevelSlot::Top => self.root = root,
            LevelSlot::Down(owner) => self.nodes[owner].down = root,
        }
        result
    }

    ////////////////////////////////////////////////////////////////////
    // LOOKUP                                                         //
    ////////////////////////////////////////////////////////////////////

    /// Looks up `name`.
    ///
    /// If `chain` is provided, it is reset and then filled in: on an
    /// exact match it is positioned at the node; otherwise it is
    /// positioned at the node that precedes `name` in canonical order
    /// (unless [`FindOptions::no_predecessor`] is set), or left empty if
    /// nothing precedes it. In all cases [`Chain::level_matches`]
    /// reports how many levels matched.
    pub fn find_node(
        &self,
        name: &Name,
        options: FindOptions,
        chain: Option<&mut Chain>,
    ) -> FindResult {
        self.find_inner(name, options, chain, None)
    }

    /// Looks up `name` like [`NameTree::find_node`], invoking `callback`
    /// for each node passed on the way down whose find-callback flag is
    /// set (see [`NameTree::set_find_callback`]). If the callback
    /// returns [`CallbackAction::Stop`], the lookup ends there, with the
    /// node as the best partial match.
    pub fn find_node_with<F>(
        &self,
        name: &Name,
        options: FindOptions,
        chain: Option<&mut Chain>,
        mut callback: F,
    ) -> FindResult
    where
        F: FnMut(NodeId, &Name, Option<&T>) -> CallbackAction,
    {
        let callback: &mut FindCallback<T> = &mut callback;
        self.find_inner(name, options, chain, Some(callback))
    }

    fn find_inner(
        &self,
        name: &Name,
        mut options: FindOptions,
        chain: Option<&mut Chain>,
        mut callback: Option<&mut FindCallback<T>>,
    ) -> FindResult {
        assert!(
            !(options.no_exact && options.no_predecessor),
            "no_exact and no_predecessor are mutually exclusive"
        );

        let mut local_chain = Chain::new();
        let chain = match chain {
            Some(chain) => chain,
            None => {
                options.no_predecessor = true;
                &mut local_chain
            }
        };
        chain.reset();

        let root = match self.root {
            Some(root) => root,
            None => return FindResult::NotFound,
        };

        let nodes = &self.nodes;
        let wanted = |id: NodeId| options.empty_data || nodes[id].data.is_some();
        let mut search = name.as_label_seq().clone();
        let mut hlabels = 0;
        let mut current = Some(root);
        let mut last_compared = root;
        let mut comparison = search.full_compare(&nodes[root].name);
        let mut found = None;

        while let Some(node) = current {
            comparison = search.full_compare(&nodes[node].name);
            last_compared = node;

            let owner = match comparison.relation {
                NameRelation::Equal => break,

                NameRelation::Unrelated => {
                    // Only a level root is ever compared against
                    // directly; the rest of the level is reached
                    // through the hash index.
                    match self.probe_level(name, &search, hlabels, node) {
                        Some((hit, tlabels)) if tlabels == search.len() => {
                            comparison.relation = NameRelation::Equal;
                            current = Some(hit);
                            break;
                        }
                        Some((hit, tlabels)) => {
                            comparison.relation = NameRelation::Subdomain;
                            comparison.order = Ordering::Greater;
                            comparison.common_labels = tlabels;
                            hit
                        }
                        None => {
                            current = None;
                            continue;
                        }
                    }
                }

                NameRelation::Subdomain => node,

                NameRelation::Superdomain | NameRelation::CommonAncestor => {
                    current = None;
                    continue;
                }
            };

            search = search.prefix(search.len() - comparison.common_labels);
            hlabels += comparison.common_labels;
            if wanted(owner) {
                found = Some(owner);
            }
            chain.push_level(owner);

            if nodes[owner].find_callback {
                if let Some(callback) = callback.as_deref_mut() {
                    let owner_name = chain.origin(self);
                    let action = callback(owner, &owner_name, nodes[owner].data.as_ref());
                    if action == CallbackAction::Stop {
                        current = None;
                        break;
                    }
                }
            }
            current = nodes[owner].down;
        }

        if let Some(node) = current {
            if !options.no_exact && wanted(node) {
                chain.end = Some(node);
                chain.level_matches = chain.levels.len();
                return FindResult::Found(node);
            }
        }

        let result = match found {
            Some(found) => {
                chain.level_matches = chain
                    .levels
                    .iter()
                    .rposition(|&id| id == found)
                    .unwrap_or_default();
                FindResult::PartialMatch(found)
            }
            None => FindResult::NotFound,
        };

        if current.is_some() {
            // An exact match that was not wanted.
            chain.end = current;
        } else if options.no_predecessor {
            chain.end = None;
        } else if comparison.relation == NameRelation::Subdomain {
            // The name is below a node with nothing (or nothing
            // searchable) beneath it, which is thus the predecessor.
            chain.end = chain.levels.pop();
        } else {
            self.position_at_predecessor(
                chain,
                &search,
                last_compared,
                comparison.relation,
                comparison.order,
            );
        }
        result
    }

    /// Looks for the node of the level rooted at `level_root` that
    /// equals or is a superdomain of `search`, the part of `name` below
    /// the level, by probing the hash index with increasingly long
    /// suffixes of `search`. Returns the node and the number of labels
    /// it matched.
    fn probe_level(
        &self,
        name: &Name,
        search: &LabelSeq,
        hlabels: usize,
        level_root: NodeId,
    ) -> Option<(NodeId, usize)> {
        let upper = self.nodes[level_root].upper;
        (1..=search.len()).find_map(|tlabels| {
            let skip = name.len() - hlabels - tlabels;
            let hash = self.hash.hash_labels(name.labels().skip(skip));
            self.hash
                .candidates(&self.nodes, hash)
                .find(|&id| {
                    let node = &self.nodes[id];
                    node.upper == upper && search.suffix_eq(tlabels, &node.name)
                })
                .map(|id| (id, tlabels))
        })
    }

    /// Positions `chain` at the predecessor of a name that was not
    /// found. The search stopped at `last_compared`; if it stopped at a
    /// level root without finding the level's matching node, the
    /// level is searched in order to find where the name would go.
    fn position_at_predecessor(
        &self,
        chain: &mut Chain,
        search: &LabelSeq,
        last_compared: NodeId,
        relation: NameRelation,
        mut order: Ordering,
    ) {
        let nodes = &self.nodes;
        let mut stop = last_compared;
        if relation == NameRelation::Unrelated {
            let mut next = Some(last_compared);
            while let Some(node) = next {
                order = search.full_compare(&nodes[node].name).order;
                stop = node;
                next = if order == Ordering::Less {
                    nodes[node].left
                } else {
                    nodes[node].right
                };
            }
        }

        if order == Ordering::Greater {
            // The stop node precedes the name, but so does everything
            // beneath it.
            match nodes[stop].down {
                Some(down) => {
                    chain.push_level(stop);
                    chain.move_to_last(self, down);
                }
                None => chain.end = Some(stop),
            }
        } else {
            // The stop node follows the name.
            chain.end = Some(stop);
            if chain.prev(self).is_none() {
                chain.reset();
            }
        }
    }

    /// Looks up `name` and returns the matching node (exact, or partial
    /// if there is no exact match) together with its data.
    pub fn find_name(&self, name: &Name, options: FindOptions) -> Option<(FindResult, &T)> {
        let result = self.find_node(name, options, None);
        let data = self.nodes[result.node()?].data.as_ref()?;
        Some((result, data))
    }

    /// Returns the data for exactly `name`, if any.
    pub fn get(&self, name: &Name) -> Option<&T> {
        match self.find_node(name, FindOptions::default(), None) {
            FindResult::Found(id) => self.nodes[id].data.as_ref(),
            _ => None,
        }
    }

    /// Returns the data for exactly `name` for modification, if any.
    pub fn get_mut(&mut self, name: &Name) -> Option<&mut T> {
        match self.find_node(name, FindOptions::default(), None) {
            FindResult::Found(id) => self.nodes[id].data.as_mut(),
            _ => None,
        }
    }

    /// Returns whether `name` is present with data.
    pub fn contains(&self, name: &Name) -> bool {
        self.get(name).is_some()
    }

    ////////////////////////////////////////////////////////////////////
    // DELETION                                                       //
    ////////////////////////////////////////////////////////////////////

    /// Deletes a node.
    ///
    /// If the node owns a down level and `recurse` is false, only the
    /// node's data is deleted; the node stays as a placeholder for the
    /// names below it. Otherwise the node and everything below it are
    /// deleted. Levels are never merged back together, so deleting a
    /// name may leave a data-less node (such as the shared suffix of
    /// its former siblings) in the tree.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a node of this tree.
    pub fn delete_node(&mut self, id: NodeId, recurse: bool) {
        assert!(self.nodes.contains(id), "no such node {:?}", id);

        let deleter = &mut self.deleter;
        let mut release = |data: T| {
            if let Some(deleter) = deleter.as_mut() {
                deleter(data);
            }
        };

        if let Some(down) = self.nodes[id].down {
            if !recurse {
                if let Some(data) = self.nodes[id].data.take() {
                    release(data);
                }
                return;
            }
            self.nodes[id].down = None;
            self.nodes[down].parent = None;
            teardown::dismantle(
                &mut self.nodes,
                Some(&mut self.hash),
                Some(down),
                Some(id),
                0,
                &mut release,
            );
        }

        let slot = LevelSlot::of(&self.nodes[id]);
        let mut root = match slot {
            LevelSlot::Top => self.root,
            LevelSlot::Down(owner) => self.nodes[owner].down,
        };
        level::delete_from_level(&mut self.nodes, id, &mut root);
        match slot {
            LevelSlot::Top => self.root = root,
            LevelSlot::Down(owner) => self.nodes[owner].down = root,
        }

        self.hash.remove(&mut self.nodes, id);
        if let Some(data) = self.nodes.remove(id).data {
            release(data);
        }
    }

    /// Deletes `name`, which must be present with data (a placeholder
    /// node does not count). See [`NameTree::delete_node`].
    pub fn delete_name(&mut self, name: &Name, recurse: bool) -> Result<(), Error> {
        match self.find_node(name, FindOptions::default(), None) {
            FindResult::Found(id) => {
                self.delete_node(id, recurse);
                Ok(())
            }
            _ => Err(Error::NotFound),
        }
    }

    /// Consumes the tree, returning a [`Teardown`] that frees its nodes
    /// a bounded number at a time.
    pub fn teardown(mut self) -> Teardown<T> {
        let nodes = mem::replace(&mut self.nodes, Arena::new());
        Teardown::new(nodes, self.root.take(), self.deleter.take())
    }

    ////////////////////////////////////////////////////////////////////
    // NODE ACCESS                                                    //
    ////////////////////////////////////////////////////////////////////

    /// Returns the data of a node.
    ///
    /// # Panics
    ///
    /// This and the other methods taking a [`NodeId`] panic if the
    /// handle does not refer to a node of this tree.
    pub fn data(&self, id: NodeId) -> Option<&T> {
        self.nodes[id].data.as_ref()
    }

    /// Returns the data of a node for modification.
    pub fn data_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes[id].data.as_mut()
    }

    /// Sets the data of a node, returning the previous data.
    pub fn set_data(&mut self, id: NodeId, data: T) -> Option<T> {
        self.nodes[id].data.replace(data)
    }

    /// Removes and returns the data of a node, leaving the node in the
    /// tree.
    pub fn take_data(&mut self, id: NodeId) -> Option<T> {
        self.nodes[id].data.take()
    }

    /// Returns the label sequence stored at a node, which is its name
    /// relative to the node owning its level.
    pub fn label_seq(&self, id: NodeId) -> &LabelSeq {
        &self.nodes[id].name
    }

    /// Returns the full name of a node.
    pub fn full_name(&self, id: NodeId) -> Name {
        let nodes = &self.nodes;
        let path = std::iter::successors(Some(id), |&id| nodes[id].upper);
        name_from_fragments(path.map(|id| &nodes[id].name))
    }

    /// Sets whether [`NameTree::find_node_with`] invokes its callback
    /// when passing through a node.
    pub fn set_find_callback(&mut self, id: NodeId, enabled: bool) {
        self.nodes[id].find_callback = enabled;
    }

    pub fn find_callback(&self, id: NodeId) -> bool {
        self.nodes[id].find_callback
    }

    ////////////////////////////////////////////////////////////////////
    // STATISTICS AND TRAVERSAL                                       //
    ////////////////////////////////////////////////////////////////////

    /// Returns the number of nodes, placeholders included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of buckets of the hash index (of the larger
    /// table while the index is growing).
    pub fn hash_size(&self) -> usize {
        self.hash.size()
    }

    /// Returns the depth of the deepest node within its own level,
    /// over all levels.
    pub fn height(&self) -> usize {
        let mut stack: Vec<(NodeId, usize)> =
            self.root.map(|root| (root, 1)).into_iter().collect();
        let mut height = 0;
        while let Some((id, depth)) = stack.pop() {
            height = height.max(depth);
            let node = &self.nodes[id];
            stack.extend(node.left.map(|left| (left, depth + 1)));
            stack.extend(node.right.map(|right| (right, depth + 1)));
            stack.extend(node.down.map(|down| (down, 1)));
        }
        height
    }

    /// Returns an iterator over the names with data and their data, in
    /// canonical order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns an iterator over all nodes, in canonical order.
    pub fn iter_nodes(&self) -> NodeIds<'_, T> {
        NodeIds::new(self)
    }

    /// Returns a [`Display`](fmt::Display)able indented dump of the
    /// levels.
    pub fn text_dump(&self) -> TextDump<'_, T> {
        TextDump::new(self)
    }

    /// Returns a [`Display`](fmt::Display)able Graphviz digraph of the
    /// levels.
    pub fn dot_dump(&self, show_pointers: bool) -> DotDump<'_, T> {
        DotDump::new(self, show_pointers)
    }
}

impl<T> Default for NameTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for NameTree<T> {
    fn drop(&mut self) {
        if let Some(deleter) = self.deleter.as_mut() {
            for node in self.nodes.drain() {
                if let Some(data) = node.data {
                    deleter(data);
                }
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for NameTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Concatenates the label sequences along a path from a node up to the
/// top level.
fn name_from_fragments<'a, I>(fragments: I) -> Name
where
    I: IntoIterator<Item = &'a LabelSeq>,
{
    // NOTE: the fragments along such a path always form the valid,
    // absolute name that was inserted to create the bottom node.
    let seq = LabelSeq::concat_all(fragments).expect("node path is not a valid name");
    Name::try_from(seq).expect("node path is not an absolute name")
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use lazy_static::lazy_static;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    use super::*;

    lazy_static! {
        static ref EXAMPLE: Name = "example.com.".parse().unwrap();
        static ref A_EXAMPLE: Name = "a.example.com.".parse().unwrap();
        static ref B_EXAMPLE: Name = "b.example.com.".parse().unwrap();
        static ref C_EXAMPLE: Name = "c.example.com.".parse().unwrap();
    }

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    fn forward_names<T>(tree: &NameTree<T>) -> Vec<String> {
        tree.iter_nodes()
            .map(|id| tree.full_name(id).to_string())
            .collect()
    }

    fn assert_valid<T: fmt::Debug>(tree: &NameTree<T>) {
        if let Err(violation) = tree.check_invariants() {
            panic!("{}\n{}", violation, tree.text_dump());
        }
    }

    #[test]
    fn suffix_is_shared_after_split() {
        let mut tree = NameTree::new();
        tree.add_name(&A_EXAMPLE, 1).unwrap();
        tree.add_name(&B_EXAMPLE, 2).unwrap();
        tree.add_name(&EXAMPLE, 3).unwrap();
        assert_valid(&tree);

        assert_eq!(tree.get(&A_EXAMPLE), Some(&1));
        assert_eq!(tree.get(&B_EXAMPLE), Some(&2));
        assert_eq!(tree.get(&EXAMPLE), Some(&3));
        // The split made a single example.com. node, which the last
        // insertion found rather than duplicated.
        assert_eq!(tree.node_count(), 3);

        match tree.find_node(&C_EXAMPLE, FindOptions::default(), None) {
            FindResult::PartialMatch(id) => assert_eq!(tree.full_name(id), *EXAMPLE),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            forward_names(&tree),
            ["example.com.", "a.example.com.", "b.example.com."]
        );
    }

    #[test]
    fn add_node_reports_existing_nodes() {
        let mut tree: NameTree<()> = NameTree::new();
        let a = tree.add_node(&A_EXAMPLE).unwrap();
        assert!(matches!(a, Added::Created(_)));
        assert_eq!(tree.add_node(&A_EXAMPLE), Ok(Added::Existing(a.node())));

        // Adding example.com. splits a.example.com.; the node that
        // ends up holding "a" keeps its handle.
        let apex = tree.add_node(&EXAMPLE).unwrap();
        assert!(matches!(apex, Added::Created(_)));
        assert_eq!(tree.label_seq(a.node()).to_string(), "a");
        assert_eq!(tree.label_seq(apex.node()).to_string(), "example.com.");
        assert_eq!(tree.full_name(a.node()), *A_EXAMPLE);
        assert_eq!(tree.add_node(&EXAMPLE), Ok(Added::Existing(apex.node())));
        assert_valid(&tree);
    }

    #[test]
    fn add_name_fills_placeholders_but_not_data() {
        let mut tree = NameTree::new();
        tree.add_name(&A_EXAMPLE, "a").unwrap();
        tree.add_name(&B_EXAMPLE, "b").unwrap();
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.get(&EXAMPLE), None);

        let apex = tree.add_name(&EXAMPLE, "apex").unwrap();
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.data(apex), Some(&"apex"));
        assert_eq!(tree.add_name(&EXAMPLE, "again"), Err(Error::Exists));
        assert_eq!(tree.get(&EXAMPLE), Some(&"apex"));
    }

    #[test]
    fn unrelated_top_level_names_share_the_root() {
        let mut tree = NameTree::new();
        tree.add_name(&name("example.com."), 1).unwrap();
        tree.add_name(&name("example.net."), 2).unwrap();
        tree.add_name(&name("example.org."), 3).unwrap();
        assert_valid(&tree);
        // The only shared suffix is the root.
        assert_eq!(tree.node_count(), 4);
        assert_eq!(
            forward_names(&tree),
            [".", "example.com.", "example.net.", "example.org."]
        );
        assert_eq!(tree.get(&Name::root()), None);
        let options = FindOptions {
            empty_data: true,
            ..FindOptions::default()
        };
        assert!(matches!(
            tree.find_node(&Name::root(), options, None),
            FindResult::Found(_)
        ));
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let mut tree = NameTree::new();
        tree.add_name(&name("WWW.Example.COM."), 1).unwrap();
        tree.add_name(&name("mail.example.com."), 2).unwrap();
        assert_eq!(tree.get(&name("www.example.com.")), Some(&1));
        assert_eq!(tree.get(&name("MAIL.EXAMPLE.COM.")), Some(&2));
        assert_eq!(
            tree.add_name(&name("www.EXAMPLE.com."), 3),
            Err(Error::Exists)
        );
    }

    #[test]
    fn find_options_control_matches() {
        let mut tree = NameTree::new();
        tree.add_name(&EXAMPLE, "apex").unwrap();
        tree.add_name(&name("x.y.a.example.com."), "deep").unwrap();
        tree.add_name(&name("z.a.example.com."), "z").unwrap();

        // a.example.com. is a placeholder.
        let placeholder = name("a.example.com.");
        let plain = FindOptions::default();
        let empty = FindOptions {
            empty_data: true,
            ..plain
        };
        let no_exact = FindOptions {
            no_exact: true,
            ..plain
        };

        match tree.find_node(&placeholder, plain, None) {
            FindResult::PartialMatch(id) => assert_eq!(tree.full_name(id), *EXAMPLE),
            other => panic!("unexpected {:?}", other),
        }
        match tree.find_node(&placeholder, empty, None) {
            FindResult::Found(id) => assert_eq!(tree.full_name(id), placeholder),
            other => panic!("unexpected {:?}", other),
        }
        match tree.find_node(&name("q.x.y.a.example.com."), empty, None) {
            FindResult::PartialMatch(id) => {
                assert_eq!(tree.full_name(id).to_string(), "x.y.a.example.com.")
            }
            other => panic!("unexpected {:?}", other),
        }
        match tree.find_node(&name("z.a.example.com."), no_exact, None) {
            FindResult::PartialMatch(id) => assert_eq!(tree.full_name(id), *EXAMPLE),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            tree.find_node(&name("example.net."), plain, None),
            FindResult::NotFound
        );
        assert_eq!(
            tree.find_name(&name("q.z.a.example.com."), plain).map(|(_, d)| *d),
            Some("z")
        );
    }

    #[test]
    fn chain_reports_level_matches() {
        let mut tree = NameTree::new();
        tree.add_name(&EXAMPLE, ()).unwrap();
        tree.add_name(&name("b.a.example.com."), ()).unwrap();
        tree.add_name(&name("c.a.example.com."), ()).unwrap();

        let mut chain = Chain::new();
        let found = tree.find_node(
            &name("c.a.example.com."),
            FindOptions::default(),
            Some(&mut chain),
        );
        assert!(matches!(found, FindResult::Found(_)));
        assert_eq!(chain.current(), found.node());
        assert_eq!(chain.level_matches(), chain.level_count());
        assert_eq!(chain.name(&tree).unwrap().to_string(), "c.a.example.com.");

        let partial = tree.find_node(
            &name("d.a.example.com."),
            FindOptions::default(),
            Some(&mut chain),
        );
        assert!(matches!(partial, FindResult::PartialMatch(_)));
        // example.com. is the first level of the chain.
        assert_eq!(chain.level_matches(), 0);
        assert_eq!(chain.levels()[0], partial.node().unwrap());
    }

    #[test]
    fn chain_is_positioned_at_predecessor() {
        let mut tree = NameTree::new();
        for s in [
            "example.",
            "b.example.",
            "d.example.",
            "x.d.example.",
            "f.example.",
            "a.f.example.",
        ] {
            tree.add_name(&name(s), s).unwrap();
        }

        let cases = [
            // Name below a leaf: the leaf precedes it.
            ("q.b.example.", Some("b.example.")),
            // Stop node less than the name.
            ("c.example.", Some("b.example.")),
            // Stop node owns a level: its last node precedes the name.
            ("e.example.", Some("x.d.example.")),
            // Stop node greater than the name.
            ("a.example.", Some("example.")),
            ("g.example.", Some("a.f.example.")),
            // Nothing precedes the name.
            ("com.", None),
            ("zz.", Some("a.f.example.")),
        ];
        for (search, expected) in cases {
            let mut chain = Chain::new();
            let result = tree.find_node(&name(search), FindOptions::default(), Some(&mut chain));
            assert!(!matches!(result, FindResult::Found(_)), "{}", search);
            assert_eq!(
                chain.name(&tree).map(|n| n.to_string()).as_deref(),
                expected,
                "predecessor of {}",
                search
            );
        }

        let mut chain = Chain::new();
        let no_predecessor = FindOptions {
            no_predecessor: true,
            ..FindOptions::default()
        };
        tree.find_node(&name("c.example."), no_predecessor, Some(&mut chain));
        assert_eq!(chain.current(), None);
    }

    #[test]
    fn callback_can_stop_descent() {
        let mut tree = NameTree::new();
        tree.add_name(&EXAMPLE, "apex").unwrap();
        let cut = tree.add_name(&name("sub.example.com."), "cut").unwrap();
        tree.add_name(&name("www.sub.example.com."), "www").unwrap();
        tree.set_find_callback(cut, true);
        assert!(tree.find_callback(cut));

        let mut seen = Vec::new();
        let result = tree.find_node_with(
            &name("www.sub.example.com."),
            FindOptions::default(),
            None,
            |id, name, data| {
                seen.push((id, name.to_string(), data.copied()));
                CallbackAction::Stop
            },
        );
        assert_eq!(result, FindResult::PartialMatch(cut));
        assert_eq!(seen, [(cut, "sub.example.com.".to_string(), Some("cut"))]);

        let result = tree.find_node_with(
            &name("www.sub.example.com."),
            FindOptions::default(),
            None,
            |_, _, _| CallbackAction::Continue,
        );
        assert!(matches!(result, FindResult::Found(_)));
    }

    #[test]
    fn no_space_beyond_max_depth() {
        let options = TreeOptions {
            max_depth: 2,
            ..TreeOptions::default()
        };
        let mut tree = NameTree::with_options(options);
        tree.add_name(&name("c."), ()).unwrap();
        tree.add_name(&name("b.c."), ()).unwrap();
        tree.add_name(&name("a.b.c."), ()).unwrap();
        assert_eq!(tree.add_name(&name("x.a.b.c."), ()), Err(Error::NoSpace));
        assert_eq!(tree.add_node(&name("x.a.b.c.")), Err(Error::NoSpace));
        // Two levels deep is still fine.
        tree.add_name(&name("y.b.c."), ()).unwrap();
        assert_valid(&tree);
    }

    #[test]
    fn zero_max_depth_allows_one_level() {
        let options = TreeOptions {
            max_depth: 0,
            ..TreeOptions::default()
        };
        let mut tree = NameTree::with_options(options);
        tree.add_name(&name("a.example."), ()).unwrap();
        tree.add_name(&name("b.a.example."), ()).unwrap();
        assert_eq!(
            tree.add_name(&name("c.b.a.example."), ()),
            Err(Error::NoSpace)
        );
        assert_valid(&tree);
    }

    #[test]
    fn data_can_be_modified_in_place() {
        let mut tree = NameTree::new();
        let a = tree.add_name(&A_EXAMPLE, 1).unwrap();
        tree.add_name(&B_EXAMPLE, 2).unwrap();

        *tree.get_mut(&A_EXAMPLE).unwrap() += 10;
        assert_eq!(tree.get(&A_EXAMPLE), Some(&11));
        *tree.data_mut(a).unwrap() += 100;
        assert_eq!(tree.data(a), Some(&111));

        // Placeholders and missing names have nothing to modify.
        assert_eq!(tree.get_mut(&EXAMPLE), None);
        assert_eq!(tree.get_mut(&C_EXAMPLE), None);
        let options = FindOptions {
            empty_data: true,
            ..FindOptions::default()
        };
        let apex = tree.find_node(&EXAMPLE, options, None).node().unwrap();
        assert_eq!(tree.data_mut(apex), None);
        assert_eq!(tree.get(&B_EXAMPLE), Some(&2));
    }

    #[test]
    fn placeholders_are_retained() {
        let mut tree = NameTree::new();
        tree.add_name(&A_EXAMPLE, 1).unwrap();
        tree.add_name(&B_EXAMPLE, 2).unwrap();
        assert_eq!(tree.node_count(), 3);

        // Deleting names does not rejoin levels or prune the suffix.
        tree.delete_name(&A_EXAMPLE, false).unwrap();
        tree.delete_name(&B_EXAMPLE, false).unwrap();
        assert_eq!(tree.node_count(), 1);
        assert_valid(&tree);
        let options = FindOptions {
            empty_data: true,
            ..FindOptions::default()
        };
        assert!(matches!(
            tree.find_node(&EXAMPLE, options, None),
            FindResult::Found(_)
        ));
        // The placeholder is not a name.
        assert_eq!(tree.delete_name(&EXAMPLE, false), Err(Error::NotFound));

        // Deleting the data of a node with a level below keeps the node.
        let mut tree = NameTree::new();
        tree.add_name(&EXAMPLE, 0).unwrap();
        tree.add_name(&A_EXAMPLE, 1).unwrap();
        tree.delete_name(&EXAMPLE, false).unwrap();
        assert_eq!(tree.node_count(), 2);
        assert_eq!(tree.get(&EXAMPLE), None);
        assert_eq!(tree.get(&A_EXAMPLE), Some(&1));
        assert_eq!(tree.delete_name(&EXAMPLE, false), Err(Error::NotFound));
        assert_valid(&tree);
    }

    #[test]
    fn recursive_delete_removes_subtree() {
        let mut tree = NameTree::new();
        for s in [
            "example.com.",
            "a.example.com.",
            "x.a.example.com.",
            "y.x.a.example.com.",
            "b.example.com.",
            "other.com.",
        ] {
            tree.add_name(&name(s), ()).unwrap();
        }
        let before = tree.node_count();
        tree.delete_name(&A_EXAMPLE, true).unwrap();
        assert_valid(&tree);
        assert_eq!(tree.node_count(), before - 3);
        assert!(!tree.contains(&name("x.a.example.com.")));
        assert!(!tree.contains(&name("y.x.a.example.com.")));
        assert!(tree.contains(&B_EXAMPLE));
        assert!(tree.contains(&name("other.com.")));
        assert_eq!(
            tree.iter().map(|(n, _)| n.to_string()).collect::<Vec<_>>(),
            ["example.com.", "b.example.com.", "other.com."]
        );
    }

    #[test]
    fn deleter_sees_each_datum_once() {
        let released = Rc::new(RefCell::new(Vec::new()));
        let sink = released.clone();
        let mut tree = NameTree::with_deleter(TreeOptions::default(), move |d: u32| {
            sink.borrow_mut().push(d)
        });
        tree.add_name(&EXAMPLE, 0).unwrap();
        tree.add_name(&A_EXAMPLE, 1).unwrap();
        tree.add_name(&name("x.a.example.com."), 2).unwrap();
        tree.add_name(&B_EXAMPLE, 3).unwrap();
        tree.add_name(&C_EXAMPLE, 4).unwrap();

        // Data handed back to the caller bypasses the deleter.
        let c = tree.find_node(&C_EXAMPLE, FindOptions::default(), None);
        assert_eq!(tree.set_data(c.node().unwrap(), 40), Some(4));
        assert!(released.borrow().is_empty());

        tree.delete_name(&EXAMPLE, false).unwrap();
        assert_eq!(*released.borrow(), [0]);
        tree.delete_name(&A_EXAMPLE, true).unwrap();
        released.borrow_mut().sort_unstable();
        assert_eq!(*released.borrow(), [0, 1, 2]);

        drop(tree);
        released.borrow_mut().sort_unstable();
        assert_eq!(*released.borrow(), [0, 1, 2, 3, 40]);
    }

    #[test]
    fn delete_then_reinsert_restores_content() {
        let names = ["a.example.", "b.example.", "c.b.example.", "example."];
        let mut tree = NameTree::new();
        for (i, s) in names.iter().enumerate() {
            tree.add_name(&name(s), i).unwrap();
        }
        let before: Vec<(Name, usize)> = tree.iter().map(|(n, d)| (n, *d)).collect();
        tree.delete_name(&name("b.example."), false).unwrap();
        tree.add_name(&name("b.example."), 1).unwrap();
        let after: Vec<(Name, usize)> = tree.iter().map(|(n, d)| (n, *d)).collect();
        assert_eq!(before, after);
        assert_valid(&tree);
    }

    #[test]
    fn height_counts_levels_separately() {
        let mut tree = NameTree::new();
        assert_eq!(tree.height(), 0);
        tree.add_name(&EXAMPLE, ()).unwrap();
        assert_eq!(tree.height(), 1);
        for i in 0..7 {
            tree.add_name(&name(&format!("{}.example.com.", i)), ()).unwrap();
        }
        // Seven nodes in a red-black tree are at most 3 or 4 deep.
        assert!((3..=4).contains(&tree.height()));
    }

    #[test]
    fn random_operations_keep_invariants() {
        let mut rng = StdRng::seed_from_u64(0x6e61_6d65);
        let labels = ["a", "b", "c", "www", "mail", "x1", "Z"];
        let mut names = Vec::new();
        for _ in 0..400 {
            let depth = rng.gen_range(1..=4);
            let mut s = String::new();
            for _ in 0..depth {
                s.push_str(labels.choose(&mut rng).unwrap());
                s.push('.');
            }
            names.push(name(&s));
        }

        let mut tree = NameTree::new();
        let mut present = std::collections::BTreeSet::new();
        for (i, n) in names.iter().enumerate() {
            if rng.gen_bool(0.3) {
                let result = tree.delete_name(n, rng.gen_bool(0.2));
                assert_eq!(result.is_ok(), present.contains(n));
                if result.is_ok() {
                    // A recursive delete may take other names along.
                    present.retain(|p: &Name| tree.contains(p));
                }
            } else {
                let result = tree.add_name(n, i);
                assert_eq!(result.is_ok(), present.insert(n.clone()));
            }
            assert_valid(&tree);
        }

        let listed: Vec<Name> = tree.iter().map(|(n, _)| n).collect();
        let expected: Vec<Name> = present.iter().cloned().collect();
        assert_eq!(listed, expected);
        let mut backward: Vec<Name> = tree.iter().rev().map(|(n, _)| n).collect();
        backward.reverse();
        assert_eq!(backward, expected);
    }

    #[test]
    fn hash_index_grows_and_drains() {
        let mut tree = NameTree::new();
        assert_eq!(tree.hash_size(), 16);
        for i in 0..200 {
            tree.add_name(&name(&format!("host{}.example.", i)), i).unwrap();
        }
        assert!(tree.hash_size() >= 64);
        assert_valid(&tree);
        for i in 0..200 {
            assert_eq!(tree.get(&name(&format!("host{}.example.", i))), Some(&i));
        }
    }
}
