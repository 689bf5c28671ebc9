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

//! Implements command-line argument parsing.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

use nametree::name::Name;

/// Parses the command line arguments.
pub fn parse() -> Args {
    Args::parse()
}

/// Load domain names into a name tree and inspect it
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the levels of the tree as indented text
    Dump(InputArgs),

    /// Print the tree as a Graphviz digraph
    Dot {
        /// Label each node with its handle and its parent's handle
        #[clap(long)]
        pointers: bool,

        #[clap(flatten)]
        input: InputArgs,
    },

    /// Print every name that has data, in canonical order
    Walk {
        /// Walk from the last name to the first
        #[clap(long)]
        reverse: bool,

        #[clap(flatten)]
        input: InputArgs,
    },

    /// Look names up and report the closest match and predecessor
    Find {
        /// The names to look up
        #[clap(long = "name", short = 'n', required = true, value_name = "NAME")]
        names: Vec<Name>,

        #[clap(flatten)]
        input: InputArgs,
    },

    /// Check the structural invariants of the tree
    Check(InputArgs),
}

impl Command {
    /// Returns the input arguments common to every command.
    pub fn input(&self) -> &InputArgs {
        match self {
            Self::Dump(input) | Self::Check(input) => input,
            Self::Dot { input, .. } | Self::Walk { input, .. } | Self::Find { input, .. } => input,
        }
    }
}

/// The sources of the names to load.
#[derive(Debug, clap::Args)]
#[clap(group(ArgGroup::new("input").required(true).args(&["config", "files"])))]
pub struct InputArgs {
    /// Set the configuration file to use
    #[clap(long, conflicts_with = "files", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Load names from these files
    #[clap(value_name = "FILE")]
    pub files: Vec<PathBuf>,
}
