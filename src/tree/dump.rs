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

//! Human-readable dumps of a [`NameTree`]'s structure.

use std::fmt::{self, Write};

use super::node::NodeId;
use super::NameTree;

////////////////////////////////////////////////////////////////////////
// TEXT DUMPS                                                         //
////////////////////////////////////////////////////////////////////////

/// An indented dump of every level of a tree, one node per line, with
/// each node's position and color. Missing children are shown as
/// `NULL`, red nodes with red children are flagged, and data is shown
/// with its [`Debug`](fmt::Debug) representation.
///
/// Constructed with [`NameTree::text_dump`].
pub struct TextDump<'a, T> {
    tree: &'a NameTree<T>,
}

impl<'a, T> TextDump<'a, T> {
    pub(super) fn new(tree: &'a NameTree<T>) -> Self {
        Self { tree }
    }
}

enum TextItem {
    Node {
        id: Option<NodeId>,
        parent: Option<NodeId>,
        depth: usize,
        direction: &'static str,
    },
    RedRed(&'static str),
}

impl<T: fmt::Debug> fmt::Display for TextDump<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let nodes = &self.tree.nodes;
        let mut stack = vec![TextItem::Node {
            id: self.tree.root,
            parent: None,
            depth: 0,
            direction: "root",
        }];

        while let Some(item) = stack.pop() {
            let (id, parent, depth, direction) = match item {
                TextItem::Node {
                    id,
                    parent,
                    depth,
                    direction,
                } => (id, parent, depth, direction),
                TextItem::RedRed(side) => {
                    writeln!(f, "** Red/Red color violation on {}", side)?;
                    continue;
                }
            };

            write!(f, "{:4} ", depth)?;
            for _ in 0..depth {
                f.write_str("- ")?;
            }
            let id = match id {
                Some(id) => id,
                None => {
                    writeln!(f, "NULL ({})", direction)?;
                    continue;
                }
            };

            let node = &nodes[id];
            write!(
                f,
                "{:?} ({}, {}",
                node.name,
                direction,
                if node.is_red() { "RED" } else { "BLACK" }
            )?;
            let bad_parent = if node.is_root {
                depth > 0 && node.upper.map_or(true, |upper| nodes[upper].down != Some(id))
            } else {
                node.parent != parent
            };
            if bad_parent {
                f.write_str(" (BAD parent pointer! -> ")?;
                match node.parent.or(node.upper) {
                    Some(up) => write!(f, "{:?}", nodes[up].name)?,
                    None => f.write_str("NULL")?,
                }
                f.write_char(')')?;
            }
            f.write_char(')')?;
            if let Some(ref data) = node.data {
                write!(f, " data: {:?}", data)?;
            }
            f.write_char('\n')?;

            // Pushed in reverse, so that the left side comes out first.
            let depth = depth + 1;
            stack.push(TextItem::Node {
                id: node.down,
                parent: None,
                depth,
                direction: "down",
            });
            stack.push(TextItem::Node {
                id: node.right,
                parent: Some(id),
                depth,
                direction: "right",
            });
            if node.is_red() && nodes.is_red(node.right) {
                stack.push(TextItem::RedRed("right"));
            }
            stack.push(TextItem::Node {
                id: node.left,
                parent: Some(id),
                depth,
                direction: "left",
            });
            if node.is_red() && nodes.is_red(node.left) {
                stack.push(TextItem::RedRed("left"));
            }
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////
// GRAPHVIZ DUMPS                                                     //
////////////////////////////////////////////////////////////////////////

/// A [Graphviz](https://graphviz.org/) digraph of a tree. Each node is
/// a record whose left and right fields lead to its children in the
/// level and whose middle field leads to its down level (drawn with a
/// heavy line). Level roots have heavy borders, red nodes are red, and
/// nodes without data are filled grey.
///
/// Constructed with [`NameTree::dot_dump`].
pub struct DotDump<'a, T> {
    tree: &'a NameTree<T>,
    show_pointers: bool,
}

impl<'a, T> DotDump<'a, T> {
    pub(super) fn new(tree: &'a NameTree<T>, show_pointers: bool) -> Self {
        Self {
            tree,
            show_pointers,
        }
    }
}

impl<T> fmt::Display for DotDump<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let nodes = &self.tree.nodes;
        f.write_str("digraph g {\n")?;
        f.write_str("node [shape = record,height=.1];\n")?;

        let mut stack: Vec<NodeId> = self.tree.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let node = &nodes[id];
            write!(f, "node{}[label = \"<f0> |<f1> ", id.0)?;
            write_record_text(f, &node.name.to_string())?;
            f.write_str("|<f2>")?;
            if self.show_pointers {
                write!(f, "|<f3> n={}|<f4> p=", id)?;
                match node.parent.or(node.upper) {
                    Some(up) => write!(f, "{}", up)?,
                    None => f.write_str("none")?,
                }
            }
            f.write_str("\"] [")?;
            f.write_str(if node.is_red() {
                "color=red"
            } else {
                "color=black"
            })?;
            if node.is_root {
                f.write_str(",penwidth=3")?;
            }
            if node.data.is_none() {
                f.write_str(",style=filled,fillcolor=lightgrey")?;
            }
            f.write_str("];\n")?;

            if let Some(left) = node.left {
                writeln!(f, "\"node{}\":f0 -> \"node{}\":f1;", id.0, left.0)?;
            }
            if let Some(down) = node.down {
                writeln!(
                    f,
                    "\"node{}\":f1 -> \"node{}\":f1 [penwidth=5];",
                    id.0, down.0
                )?;
            }
            if let Some(right) = node.right {
                writeln!(f, "\"node{}\":f2 -> \"node{}\":f1;", id.0, right.0)?;
            }
            stack.extend([node.right, node.down, node.left].into_iter().flatten());
        }

        f.write_str("}\n")
    }
}

/// Writes text into a record label, escaping the characters that
/// Graphviz gives meaning to there.
fn write_record_text(f: &mut fmt::Formatter, text: &str) -> fmt::Result {
    for c in text.chars() {
        if matches!(c, '"' | '\\' | '{' | '}' | '|' | '<' | '>') {
            f.write_char('\\')?;
        }
        f.write_char(c)?;
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
