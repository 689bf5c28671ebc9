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

//! The red-black tree of a single level.
//!
//! These functions know nothing about names or about the other levels.
//! Each works on the [`Arena`] and a *root slot*: a local copy of the
//! level's root handle that the caller reads from the top-level root or
//! from the owning node's `down` link and writes back afterwards. The
//! root of a level is marked with `is_root` and has no parent.

use std::cmp::Ordering;

use super::node::{Arena, Color, NodeId};

////////////////////////////////////////////////////////////////////////
// ROTATIONS                                                          //
////////////////////////////////////////////////////////////////////////

/// Rotates `node` down to the left, making its right child the root of
/// the subtree.
pub(super) fn rotate_left<T>(nodes: &mut Arena<T>, node: NodeId, root: &mut Option<NodeId>) {
    // NOTE: the algorithms below only rotate nodes that have the
    // relevant child.
    let child = nodes[node].right.expect("rotate_left without a right child");

    nodes[node].right = nodes[child].left;
    if let Some(grandchild) = nodes[child].left {
        nodes[grandchild].parent = Some(node);
    }
    nodes[child].left = Some(node);
    nodes[child].parent = nodes[node].parent;

    if nodes[node].is_root {
        *root = Some(child);
        nodes[child].is_root = true;
        nodes[node].is_root = false;
    } else {
        replace_child(nodes, node, Some(child));
    }
    nodes[node].parent = Some(child);
}

/// Rotates `node` down to the right, making its left child the root of
/// the subtree.
pub(super) fn rotate_right<T>(nodes: &mut Arena<T>, node: NodeId, root: &mut Option<NodeId>) {
    let child = nodes[node].left.expect("rotate_right without a left child");

    nodes[node].left = nodes[child].right;
    if let Some(grandchild) = nodes[child].right {
        nodes[grandchild].parent = Some(node);
    }
    nodes[child].right = Some(node);
    nodes[child].parent = nodes[node].parent;

    if nodes[node].is_root {
        *root = Some(child);
        nodes[child].is_root = true;
        nodes[node].is_root = false;
    } else {
        replace_child(nodes, node, Some(child));
    }
    nodes[node].parent = Some(child);
}

/// Points the parent of `old` (which must not be a level root) at
/// `new` instead.
fn replace_child<T>(nodes: &mut Arena<T>, old: NodeId, new: Option<NodeId>) {
    let parent = nodes[old].parent.expect("non-root node without a parent");
    if nodes[parent].left == Some(old) {
        nodes[parent].left = new;
    } else {
        nodes[parent].right = new;
    }
}

////////////////////////////////////////////////////////////////////////
// INSERTION                                                          //
////////////////////////////////////////////////////////////////////////

/// Links the detached node `node` into a level.
///
/// If the level is empty, `node` becomes its black root. Otherwise it
/// becomes a red leaf under `current`, on the side given by `order`
/// (the order of `node` relative to `current`), and the level is
/// rebalanced.
pub(super) fn add_on_level<T>(
    nodes: &mut Arena<T>,
    node: NodeId,
    current: NodeId,
    order: Ordering,
    root: &mut Option<NodeId>,
) {
    nodes[node].left = None;
    nodes[node].right = None;

    if root.is_none() {
        nodes[node].color = Color::Black;
        nodes[node].is_root = true;
        nodes[node].parent = None;
        *root = Some(node);
        return;
    }

    if order == Ordering::Less {
        debug_assert!(nodes[current].left.is_none());
        nodes[current].left = Some(node);
    } else {
        debug_assert!(nodes[current].right.is_none());
        nodes[current].right = Some(node);
    }
    nodes[node].is_root = false;
    nodes[node].parent = Some(current);
    nodes[node].color = Color::Red;

    let mut node = node;
    while Some(node) != *root && nodes.is_red(nodes[node].parent) {
        // A red node is never a level root, so the grandparent exists.
        let parent = nodes[node].parent.expect("red node without a parent");
        let grandparent = nodes[parent]
            .parent
            .expect("red parent without a parent");

        if nodes[grandparent].left == Some(parent) {
            let uncle = nodes[grandparent].right;
            if nodes.is_red(uncle) {
                nodes[parent].color = Color::Black;
                set_color(nodes, uncle, Color::Black);
                nodes[grandparent].color = Color::Red;
                node = grandparent;
            } else {
                let mut parent = parent;
                if nodes[parent].right == Some(node) {
                    rotate_left(nodes, parent, root);
                    node = parent;
                    parent = nodes[node].parent.expect("rotated node without a parent");
                }
                nodes[parent].color = Color::Black;
                nodes[grandparent].color = Color::Red;
                rotate_right(nodes, grandparent, root);
            }
        } else {
            let uncle = nodes[grandparent].left;
            if nodes.is_red(uncle) {
                nodes[parent].color = Color::Black;
                set_color(nodes, uncle, Color::Black);
                nodes[grandparent].color = Color::Red;
                node = grandparent;
            } else {
                let mut parent = parent;
                if nodes[parent].left == Some(node) {
                    rotate_right(nodes, parent, root);
                    node = parent;
                    parent = nodes[node].parent.expect("rotated node without a parent");
                }
                nodes[parent].color = Color::Black;
                nodes[grandparent].color = Color::Red;
                rotate_left(nodes, grandparent, root);
            }
        }
    }

    if let Some(root) = *root {
        nodes[root].color = Color::Black;
    }
}

fn set_color<T>(nodes: &mut Arena<T>, id: Option<NodeId>, color: Color) {
    if let Some(id) = id {
        nodes[id].color = color;
    }
}

////////////////////////////////////////////////////////////////////////
// DELETION                                                           //
////////////////////////////////////////////////////////////////////////

/// Unlinks `item` from its level and rebalances the level. The node
/// itself stays in the arena; its level links are left stale.
///
/// When `item` has two children, it first trades places with its
/// in-order successor. Whole nodes are swapped rather than their
/// contents, so every other handle keeps referring to the same name.
pub(super) fn delete_from_level<T>(nodes: &mut Arena<T>, item: NodeId, root: &mut Option<NodeId>) {
    let child = match (nodes[item].left, nodes[item].right) {
        (None, None) => {
            if nodes[item].is_root {
                debug_assert_eq!(*root, Some(item));
                *root = None;
                return;
            }
            None
        }
        (Some(left), None) => Some(left),
        (None, Some(right)) => Some(right),
        (Some(_), Some(right)) => {
            let successor = nodes.leftmost(right);
            swap_with_successor(nodes, item, successor, root);
            nodes[item].right
        }
    };

    // Now item has at most one child; splice it out.
    if nodes[item].is_root {
        // NOTE: a root with no children returned above.
        let child = child.expect("childless root reached the splice");
        *root = Some(child);
        nodes[child].is_root = true;
        nodes[child].parent = None;
    } else {
        replace_child(nodes, item, child);
        if let Some(child) = child {
            nodes[child].parent = nodes[item].parent;
        }
    }

    if nodes[item].color == Color::Black {
        let parent = nodes[item].parent;
        fix_after_delete(nodes, child, parent, root);
    }
}

/// Exchanges the tree positions and colors of `item` and its in-order
/// `successor` (the left-most node of `item`'s right subtree).
fn swap_with_successor<T>(
    nodes: &mut Arena<T>,
    item: NodeId,
    successor: NodeId,
    root: &mut Option<NodeId>,
) {
    let saved_parent = nodes[successor]
        .parent
        .expect("successor without a parent");
    let saved_right = nodes[successor].right;
    let saved_color = nodes[successor].color;

    if nodes[item].is_root {
        *root = Some(successor);
        nodes[successor].is_root = true;
        nodes[item].is_root = false;
    } else {
        replace_child(nodes, item, Some(successor));
    }

    nodes[successor].parent = nodes[item].parent;
    nodes[successor].left = nodes[item].left;
    nodes[successor].right = nodes[item].right;
    nodes[successor].color = nodes[item].color;

    if let Some(left) = nodes[successor].left {
        nodes[left].parent = Some(successor);
    }
    if let Some(right) = nodes[successor].right {
        if right != successor {
            nodes[right].parent = Some(successor);
        }
    }

    if saved_parent == item {
        // The successor was item's right child.
        nodes[successor].right = Some(item);
        nodes[item].parent = Some(successor);
    } else {
        nodes[saved_parent].left = Some(item);
        nodes[item].parent = Some(saved_parent);
    }

    nodes[item].left = None;
    nodes[item].right = saved_right;
    nodes[item].color = saved_color;
}

/// Restores the red-black properties after a black node was spliced
/// out above `child` (which may be absent) under `parent`.
fn fix_after_delete<T>(
    nodes: &mut Arena<T>,
    mut child: Option<NodeId>,
    mut parent: Option<NodeId>,
    root: &mut Option<NodeId>,
) {
    while child != *root && nodes.is_black(child) {
        // A black child other than the root always has a parent and,
        // by the black height rule, a sibling.
        let p = parent.expect("non-root child without a parent");

        if nodes[p].left == child {
            let mut sibling = nodes[p].right.expect("black child without a sibling");
            if nodes[sibling].is_red() {
                nodes[sibling].color = Color::Black;
                nodes[p].color = Color::Red;
                rotate_left(nodes, p, root);
                sibling = nodes[p].right.expect("black child without a sibling");
            }

            if nodes.is_black(nodes[sibling].left) && nodes.is_black(nodes[sibling].right) {
                nodes[sibling].color = Color::Red;
                child = Some(p);
            } else {
                if nodes.is_black(nodes[sibling].right) {
                    let nephew = nodes[sibling].left;
                    set_color(nodes, nephew, Color::Black);
                    nodes[sibling].color = Color::Red;
                    rotate_right(nodes, sibling, root);
                    sibling = nodes[p].right.expect("black child without a sibling");
                }
                nodes[sibling].color = nodes[p].color;
                nodes[p].color = Color::Black;
                let nephew = nodes[sibling].right;
                set_color(nodes, nephew, Color::Black);
                rotate_left(nodes, p, root);
                child = *root;
            }
        } else {
            let mut sibling = nodes[p].left.expect("black child without a sibling");
            if nodes[sibling].is_red() {
                nodes[sibling].color = Color::Black;
                nodes[p].color = Color::Red;
                rotate_right(nodes, p, root);
                sibling = nodes[p].left.expect("black child without a sibling");
            }

            if nodes.is_black(nodes[sibling].left) && nodes.is_black(nodes[sibling].right) {
                nodes[sibling].color = Color::Red;
                child = Some(p);
            } else {
                if nodes.is_black(nodes[sibling].left) {
                    let nephew = nodes[sibling].right;
                    set_color(nodes, nephew, Color::Black);
                    nodes[sibling].color = Color::Red;
                    rotate_left(nodes, sibling, root);
                    sibling = nodes[p].left.expect("black child without a sibling");
                }
                nodes[sibling].color = nodes[p].color;
                nodes[p].color = Color::Black;
                let nephew = nodes[sibling].left;
                set_color(nodes, nephew, Color::Black);
                rotate_right(nodes, p, root);
                child = *root;
            }
        }

        // child is now present: either p or the level root.
        parent = child.and_then(|c| nodes[c].parent);
    }

    set_color(nodes, child, Color::Black);
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
