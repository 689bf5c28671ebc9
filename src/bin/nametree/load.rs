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

//! Implements loading name files into a tree.

use std::fs::File;
use std::io::{BufRead, BufReader};

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};

use nametree::name::Name;
use nametree::tree::{Error as TreeError, NameTree};

use crate::config::Config;

/// The tree type the tool works with. Each name carries the free text
/// that followed it in its input file (possibly empty).
pub type Tree = NameTree<String>;

/// Builds the tree described by `config`: every name of every input
/// file is added, and then the configured names are deleted.
pub fn load(config: &Config) -> Result<Tree> {
    let mut tree = Tree::with_options(config.tree_options());

    for path in &config.names {
        debug!("Loading names from {}.", path.display());
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let added = load_lines(&mut tree, BufReader::new(file))
            .with_context(|| format!("failed to load {}", path.display()))?;
        debug!("Loaded {} names from {}.", added, path.display());
    }

    for name in &config.delete {
        match tree.delete_name(&name.0, false) {
            Ok(()) => debug!("Deleted {}.", name.0),
            Err(e) => warn!("Failed to delete {}: {}.", name.0, e),
        }
    }

    info!(
        "The tree holds {} names in {} nodes.",
        tree.iter().count(),
        tree.node_count(),
    );
    Ok(tree)
}

/// Adds every name read from `reader` to `tree`, returning the number
/// of names added. Names that are already present keep their first
/// datum.
fn load_lines(tree: &mut Tree, reader: impl BufRead) -> Result<usize> {
    let mut added = 0;
    for (i, line) in reader.lines().enumerate() {
        let number = i + 1;
        let line = line.context("failed to read")?;
        let (name, datum) = match parse_line(&line)
            .with_context(|| format!("invalid name on line {}", number))?
        {
            Some(entry) => entry,
            None => continue,
        };
        match tree.add_name(&name, datum.to_owned()) {
            Ok(_) => added += 1,
            Err(TreeError::Exists) => warn!("Line {}: {} is a duplicate; skipping.", number, name),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to add {} from line {}", name, number))
            }
        }
    }
    Ok(added)
}

/// Parses a line of an input file into a name and its datum. Blank
/// lines and comments yield `None`.
fn parse_line(line: &str) -> Result<Option<(Name, &str)>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
        return Ok(None);
    }
    let (name, datum) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let name = name.parse::<Name>().map_err(|e| anyhow!("{}: {}", name, e))?;
    Ok(Some((name, datum.trim_start())))
}
