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

//! Structural validation of a [`NameTree`], for tests and diagnostics.

use std::cmp::Ordering;
use std::fmt;

use super::node::NodeId;
use super::NameTree;
use crate::name::NameRelation;

/// A broken invariant found by [`NameTree::check_invariants`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Violation {
    /// The offending node, if the violation concerns a single node.
    pub node: Option<NodeId>,
    pub kind: ViolationKind,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ViolationKind {
    /// A level root lacks its root flag, or another node has it.
    RootFlag,

    /// A parent and child link disagree, or a level root has a parent.
    ParentLink,

    /// A node's upper link does not name the owner of its level.
    UpperLink,

    /// A level root is red.
    RedRoot,

    /// A red node has a red child.
    RedRed,

    /// Two paths from a level root to a missing child pass through
    /// different numbers of black nodes.
    BlackHeight,

    /// A level is not in increasing canonical order.
    Order,

    /// Two nodes of a level end in the same label.
    SharedSuffix,

    /// A node's cached hash value is not the hash of its full name.
    HashValue,

    /// A node is not linked into the hash index where its hash value
    /// says it should be.
    NotHashed,

    /// The hash index holds a different number of nodes than the tree.
    HashCount,

    /// Not every node is reachable from the top level exactly once.
    NodeCount,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::RootFlag => "root flag is wrong",
            Self::ParentLink => "parent link is inconsistent",
            Self::UpperLink => "upper link is inconsistent",
            Self::RedRoot => "level root is red",
            Self::RedRed => "red node has a red child",
            Self::BlackHeight => "black height differs",
            Self::Order => "level is out of order",
            Self::SharedSuffix => "level nodes share a suffix",
            Self::HashValue => "cached hash value is wrong",
            Self::NotHashed => "node is missing from the hash index",
            Self::HashCount => "hash index count differs from node count",
            Self::NodeCount => "reachable node count differs from node count",
        })
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.node {
            Some(node) => write!(f, "{} at node {}", self.kind, node),
            None => fmt::Display::fmt(&self.kind, f),
        }
    }
}

impl std::error::Error for Violation {}

fn violation(node: NodeId, kind: ViolationKind) -> Violation {
    Violation {
        node: Some(node),
        kind,
    }
}

impl<T> NameTree<T> {
    /// Validates the structure of the tree: the red-black properties
    /// and ordering of every level, the links between levels, and the
    /// consistency of the hash index with the nodes. Returns the first
    /// violation found.
    ///
    /// This visits every node and rehashes every name, so it is meant
    /// for tests and diagnostics.
    pub fn check_invariants(&self) -> Result<(), Violation> {
        let mut levels: Vec<(NodeId, Option<NodeId>)> = Vec::new();
        levels.extend(self.root.map(|root| (root, None)));

        let mut visited = 0;
        while let Some((root, upper)) = levels.pop() {
            visited += self.check_level(root, upper, &mut levels)?;
        }

        if visited != self.nodes.len() {
            return Err(Violation {
                node: None,
                kind: ViolationKind::NodeCount,
            });
        }

        for id in self.nodes.ids() {
            let full_name = self.full_name(id);
            if self.nodes[id].hash_val != self.hash.hash_labels(full_name.labels()) {
                return Err(violation(id, ViolationKind::HashValue));
            }
            if !self.hash.is_linked(&self.nodes, id) {
                return Err(violation(id, ViolationKind::NotHashed));
            }
        }
        if self.hash.linked_count(&self.nodes) != self.nodes.len() {
            return Err(Violation {
                node: None,
                kind: ViolationKind::HashCount,
            });
        }
        Ok(())
    }

    /// Checks the level rooted at `root`, owned by `upper`, pushing the
    /// levels below it onto `levels`. Returns the number of nodes in
    /// the level.
    fn check_level(
        &self,
        root: NodeId,
        upper: Option<NodeId>,
        levels: &mut Vec<(NodeId, Option<NodeId>)>,
    ) -> Result<usize, Violation> {
        let nodes = &self.nodes;
        if !nodes[root].is_root {
            return Err(violation(root, ViolationKind::RootFlag));
        }
        if nodes[root].parent.is_some() {
            return Err(violation(root, ViolationKind::ParentLink));
        }
        if nodes[root].is_red() {
            return Err(violation(root, ViolationKind::RedRoot));
        }

        let blackness = |id: NodeId| usize::from(!nodes[id].is_red());
        let mut stack: Vec<(NodeId, usize)> = Vec::new();
        let mut cursor = Some((root, blackness(root)));
        let mut previous: Option<NodeId> = None;
        let mut black_height = None;
        let mut count = 0;

        // In-order walk, tracking the black nodes on the path.
        loop {
            while let Some((id, blacks)) = cursor {
                stack.push((id, blacks));
                cursor = nodes[id].left.map(|left| (left, blacks + blackness(left)));
            }
            let (id, blacks) = match stack.pop() {
                Some(entry) => entry,
                None => break,
            };
            count += 1;
            self.check_node(id, root, upper)?;

            let node = &nodes[id];
            if node.left.is_none() || node.right.is_none() {
                match black_height {
                    None => black_height = Some(blacks),
                    Some(height) if height != blacks => {
                        return Err(violation(id, ViolationKind::BlackHeight));
                    }
                    Some(_) => (),
                }
            }

            if let Some(previous) = previous {
                let comparison = nodes[previous].name.full_compare(&node.name);
                if comparison.relation != NameRelation::Unrelated {
                    return Err(violation(id, ViolationKind::SharedSuffix));
                }
                if comparison.order != Ordering::Less {
                    return Err(violation(id, ViolationKind::Order));
                }
            }
            previous = Some(id);

            if let Some(down) = node.down {
                levels.push((down, Some(id)));
            }
            cursor = node.right.map(|right| (right, blacks + blackness(right)));
        }

        Ok(count)
    }

    /// Checks the links and color of a single node of the level rooted
    /// at `root`.
    fn check_node(&self, id: NodeId, root: NodeId, upper: Option<NodeId>) -> Result<(), Violation> {
        let nodes = &self.nodes;
        let node = &nodes[id];

        if id != root {
            if node.is_root {
                return Err(violation(id, ViolationKind::RootFlag));
            }
            let linked = node.parent.map_or(false, |parent| {
                nodes[parent].left == Some(id) || nodes[parent].right == Some(id)
            });
            if !linked {
                return Err(violation(id, ViolationKind::ParentLink));
            }
        }
        if node.upper != upper {
            return Err(violation(id, ViolationKind::UpperLink));
        }

        for child in [node.left, node.right].into_iter().flatten() {
            if nodes[child].parent != Some(id) {
                return Err(violation(child, ViolationKind::ParentLink));
            }
            if node.is_red() && nodes[child].is_red() {
                return Err(violation(child, ViolationKind::RedRed));
            }
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;
    use crate::tree::node::Color;
    use crate::tree::FindOptions;

    fn sample() -> NameTree<()> {
        let mut tree = NameTree::new();
        for s in [
            "example.",
            "a.example.",
            "b.example.",
            "c.example.",
            "d.example.",
            "x.b.example.",
            "other.",
        ] {
            tree.add_name(&s.parse().unwrap(), ()).unwrap();
        }
        tree
    }

    fn node_of(tree: &NameTree<()>, s: &str) -> NodeId {
        let name: Name = s.parse().unwrap();
        let options = FindOptions {
            empty_data: true,
            ..FindOptions::default()
        };
        tree.find_node(&name, options, None).node().unwrap()
    }

    fn kind_of(tree: &NameTree<()>) -> ViolationKind {
        tree.check_invariants().unwrap_err().kind
    }

    #[test]
    fn valid_tree_passes() {
        assert_eq!(sample().check_invariants(), Ok(()));
        assert_eq!(NameTree::<()>::new().check_invariants(), Ok(()));
    }

    #[test]
    fn detects_red_root() {
        let mut tree = sample();
        let root = tree.root.unwrap();
        tree.nodes[root].color = Color::Red;
        assert_eq!(
            tree.check_invariants(),
            Err(Violation {
                node: Some(root),
                kind: ViolationKind::RedRoot
            })
        );
    }

    #[test]
    fn detects_black_height_mismatch() {
        let mut tree = sample();
        // The level of a, b, c, d has a red node somewhere; blacken
        // every node of it to unbalance the paths.
        for s in ["a.example.", "b.example.", "c.example.", "d.example."] {
            let id = node_of(&tree, s);
            tree.nodes[id].color = Color::Black;
        }
        assert_eq!(kind_of(&tree), ViolationKind::BlackHeight);
    }

    #[test]
    fn detects_bad_upper_link() {
        let mut tree = sample();
        let x = node_of(&tree, "x.b.example.");
        tree.nodes[x].upper = None;
        assert_eq!(kind_of(&tree), ViolationKind::UpperLink);
    }

    #[test]
    fn detects_out_of_order_names() {
        let mut tree = sample();
        let a = node_of(&tree, "a.example.");
        let d = node_of(&tree, "d.example.");
        let a_name = tree.nodes[a].name.clone();
        tree.nodes[a].name = tree.nodes[d].name.clone();
        tree.nodes[d].name = a_name;
        assert_eq!(kind_of(&tree), ViolationKind::Order);
    }

    #[test]
    fn detects_hash_problems() {
        let mut tree = sample();
        let c = node_of(&tree, "c.example.");
        tree.nodes[c].hash_val ^= 1;
        assert_eq!(kind_of(&tree), ViolationKind::HashValue);

        let mut tree = sample();
        let c = node_of(&tree, "c.example.");
        tree.hash.remove(&mut tree.nodes, c);
        assert_eq!(kind_of(&tree), ViolationKind::NotHashed);
    }

    #[test]
    fn detects_unreachable_nodes() {
        let mut tree = sample();
        let b = node_of(&tree, "b.example.");
        let x = tree.nodes[b].down.take().unwrap();
        assert_eq!(
            tree.check_invariants(),
            Err(Violation {
                node: None,
                kind: ViolationKind::NodeCount
            })
        );
        // Put it back so that the tree drops cleanly.
        tree.nodes[b].down = Some(x);
        assert_eq!(tree.check_invariants(), Ok(()));
    }
}
