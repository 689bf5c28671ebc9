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

//! Implements the commands.

use std::fmt::Write as _;
use std::io::{self, BufWriter, Write};
use std::process;

use anyhow::{anyhow, Context, Result};
use env_logger::Env;
use log::{error, info};

use nametree::name::Name;
use nametree::tree::{Chain, FindOptions, FindResult};

use crate::args::{Args, Command};
use crate::config;
use crate::load::{self, Tree};

/// Runs the command selected on the command line.
pub fn run(args: Args) {
    env_logger::init_from_env(Env::new().default_filter_or("warn"));

    if let Err(e) = try_running(args.command) {
        let mut message = String::from("Failed to run:");
        for (i, cause) in e.chain().enumerate() {
            write!(message, "\n[{}] {}", i + 1, cause).unwrap();
        }
        message.push_str("\nExiting with failure.");
        error!("{}", message);
        process::exit(1);
    }
}

fn try_running(command: Command) -> Result<()> {
    info!(
        "nametree v{}.{}.{} starting.",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR"),
        env!("CARGO_PKG_VERSION_PATCH"),
    );

    let config = config::load(command.input()).context("failed to load the configuration")?;
    let tree = load::load(&config).context("failed to load names")?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match command {
        Command::Dump(_) => write!(out, "{}", tree.text_dump())?,
        Command::Dot { pointers, .. } => write!(out, "{}", tree.dot_dump(pointers))?,
        Command::Walk { reverse, .. } => walk(&tree, reverse, &mut out)?,
        Command::Find { ref names, .. } => {
            for name in names {
                find(&tree, name, &mut out)?;
            }
        }
        Command::Check(_) => check(&tree, &mut out)?,
    }
    out.flush().context("failed to write the output")
}

/// Prints every name with data, in canonical order or its reverse.
fn walk(tree: &Tree, reverse: bool, out: &mut impl Write) -> Result<()> {
    if reverse {
        write_entries(tree.iter().rev(), out)
    } else {
        write_entries(tree.iter(), out)
    }
}

fn write_entries<'a>(
    entries: impl Iterator<Item = (Name, &'a String)>,
    out: &mut impl Write,
) -> Result<()> {
    for (name, datum) in entries {
        if datum.is_empty() {
            writeln!(out, "{}", name)?;
        } else {
            writeln!(out, "{}\t{}", name, datum)?;
        }
    }
    Ok(())
}

/// Looks up `name` and prints the outcome together with the name that
/// precedes it in the tree.
fn find(tree: &Tree, name: &Name, out: &mut impl Write) -> Result<()> {
    let mut chain = Chain::new();
    let result = tree.find_node(name, FindOptions::default(), Some(&mut chain));
    let level_matches = chain.level_matches();

    let outcome = match result {
        FindResult::Found(id) => {
            let outcome = format!("found {}", tree.full_name(id));
            // The chain is at the name itself; step back for the
            // predecessor.
            if chain.prev(tree).is_none() {
                chain.reset();
            }
            outcome
        }
        FindResult::PartialMatch(id) => format!("partial match {}", tree.full_name(id)),
        FindResult::NotFound => String::from("not found"),
    };
    let predecessor = match chain.name(tree) {
        Some(predecessor) => predecessor.to_string(),
        None => String::from("none"),
    };
    writeln!(
        out,
        "{}: {} (predecessor: {}, levels matched: {})",
        name,
        outcome,
        predecessor,
        level_matches,
    )?;
    Ok(())
}

/// Checks the tree's invariants and prints its statistics.
fn check(tree: &Tree, out: &mut impl Write) -> Result<()> {
    tree.check_invariants()
        .map_err(|violation| anyhow!("the tree is invalid: {}", violation))?;
    writeln!(out, "nodes: {}", tree.node_count())?;
    writeln!(out, "hash size: {}", tree.hash_size())?;
    writeln!(out, "height: {}", tree.height())?;
    Ok(())
}
