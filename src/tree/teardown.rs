// Copyright 2021 Matthew Ingwersen.
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

//! Incremental destruction of levels.

use std::fmt;

use log::trace;

use super::hash::HashIndex;
use super::node::{Arena, NodeId};
use super::Deleter;

/// Frees the nodes of the level rooted at `position` and of every level
/// below it, without recursion: the walk cuts the link it follows at
/// each step, so a node is freed once it has no links left to follow.
///
/// The walk ends on reaching `stop` (the owner of the level, which is
/// not freed) or the top of the tree. If `quantum` is non-zero, at most
/// that many nodes are freed; the return value is where to resume, or
/// `None` once everything is gone. Freed nodes are removed from `hash`
/// if one is given, and their data is passed to `release`.
pub(super) fn dismantle<T>(
    nodes: &mut Arena<T>,
    mut hash: Option<&mut HashIndex>,
    mut position: Option<NodeId>,
    stop: Option<NodeId>,
    quantum: usize,
    release: &mut dyn FnMut(T),
) -> Option<NodeId> {
    let mut freed = 0;
    while let Some(id) = position {
        let node = &mut nodes[id];
        if let Some(left) = node.left.take() {
            position = Some(left);
        } else if let Some(right) = node.right.take() {
            position = Some(right);
        } else if let Some(down) = node.down.take() {
            position = Some(down);
        } else {
            position = node.parent.or(node.upper).filter(|&up| Some(up) != stop);
            if let Some(hash) = hash.as_deref_mut() {
                hash.remove(nodes, id);
            }
            if let Some(data) = nodes.remove(id).data {
                release(data);
            }
            freed += 1;
            if freed == quantum {
                break;
            }
        }
    }
    position
}

/// A tree being destroyed a bounded number of nodes at a time.
///
/// Constructed with [`NameTree::teardown`](super::NameTree::teardown).
/// Any nodes left when a `Teardown` is dropped are freed at once. Data
/// goes to the tree's deleter, if it has one, as it would on drop.
pub struct Teardown<T> {
    nodes: Arena<T>,
    position: Option<NodeId>,
    deleter: Option<Deleter<T>>,
}

impl<T> Teardown<T> {
    pub(super) fn new(nodes: Arena<T>, root: Option<NodeId>, deleter: Option<Deleter<T>>) -> Self {
        Self {
            nodes,
            position: root,
            deleter,
        }
    }

    /// Frees up to `quantum` nodes, or all of them if `quantum` is
    /// zero. Returns whether the teardown is complete.
    pub fn step(&mut self, quantum: usize) -> bool {
        let deleter = &mut self.deleter;
        let mut release = |data: T| {
            if let Some(deleter) = deleter.as_mut() {
                deleter(data);
            }
        };
        self.position = dismantle(
            &mut self.nodes,
            None,
            self.position,
            None,
            quantum,
            &mut release,
        );
        trace!("teardown step: {} nodes remaining", self.nodes.len());
        self.is_done()
    }

    pub fn is_done(&self) -> bool {
        self.position.is_none()
    }

    /// Returns the number of nodes not yet freed.
    pub fn remaining(&self) -> usize {
        self.nodes.len()
    }
}

impl<T> Drop for Teardown<T> {
    fn drop(&mut self) {
        self.step(0);
    }
}

impl<T> fmt::Debug for Teardown<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Teardown")
            .field("remaining", &self.remaining())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
