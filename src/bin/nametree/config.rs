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

//! Implements the configuration file.

use std::fmt::{self, Write};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::Level::Debug;
use log::{debug, log_enabled};
use paste::paste;
use serde::{de, Deserialize};

use nametree::name::Name;
use nametree::tree::{TreeOptions, MAX_DEPTH};

use crate::args::InputArgs;

////////////////////////////////////////////////////////////////////////
// CONFIGURATION LOADING                                              //
////////////////////////////////////////////////////////////////////////

/// Loads the configuration selected by the command line: either the
/// configuration file, or a default configuration naming the input
/// files given on the command line.
pub fn load(input: &InputArgs) -> Result<Config> {
    if let Some(ref path) = input.config {
        load_from_path(path)
    } else {
        Ok(load_from_files(&input.files))
    }
}

/// Loads the configuration from the file given by `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let dir = match path.as_ref().parent() {
        Some(p) => p,
        None => return Err(anyhow!("the configuration file path has no parent")),
    };
    let raw_config =
        fs::read_to_string(path.as_ref()).context("failed to read the configuration file")?;
    let mut config = parse(&raw_config)?;

    // Input file paths are interpreted relative to the configuration
    // file's directory.
    for name_path in &mut config.names {
        if name_path.is_relative() {
            *name_path = dir.join(&*name_path);
        }
    }

    log_config_summary(&config);
    Ok(config)
}

/// Parses the text of a configuration file.
fn parse(raw_config: &str) -> Result<Config> {
    let config: Config =
        toml::from_str(raw_config).context("failed to parse the configuration file")?;
    if config.max_depth == 0 || config.max_depth > MAX_DEPTH {
        return Err(anyhow!("max_depth must be between 1 and {}", MAX_DEPTH));
    }
    Ok(config)
}

/// Builds a default configuration that loads the given files.
pub fn load_from_files(files: &[PathBuf]) -> Config {
    let defaults = TreeOptions::default();
    let config = Config {
        hash_bits: defaults.hash_bits,
        max_depth: defaults.max_depth,
        names: files.to_vec(),
        delete: Vec::new(),
    };
    log_config_summary(&config);
    config
}

/// Summarizes the configuration in the log, if the debug log level is
/// enabled.
fn log_config_summary(config: &Config) {
    if !log_enabled!(Debug) {
        return;
    }

    let mut message = format!(
        "Configuration loaded:\n\
         Hash bits: {}\n\
         Max depth: {}\n\
         Files:     ",
        config.hash_bits, config.max_depth,
    );
    if config.names.is_empty() {
        message.push_str("none to load");
    } else {
        write!(message, "{} to load", config.names.len()).unwrap();
        for path in &config.names {
            write!(message, "\n  {}", path.display()).unwrap();
        }
    }
    if !config.delete.is_empty() {
        write!(message, "\nDeleting:  {}", config.delete.len()).unwrap();
        for name in &config.delete {
            write!(message, "\n  {}", name.0).unwrap();
        }
    }
    debug!("{}", message);
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION FILE STRUCTURE                                       //
////////////////////////////////////////////////////////////////////////

/// The complete configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_hash_bits")]
    pub hash_bits: u8,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    pub names: Vec<PathBuf>,
    #[serde(default)]
    pub delete: Vec<ConfigName>,
}

impl Config {
    /// Returns the tree options this configuration selects.
    pub fn tree_options(&self) -> TreeOptions {
        TreeOptions {
            hash_bits: self.hash_bits,
            max_depth: self.max_depth,
        }
    }
}

fn default_hash_bits() -> u8 {
    TreeOptions::default().hash_bits
}

fn default_max_depth() -> usize {
    TreeOptions::default().max_depth
}

////////////////////////////////////////////////////////////////////////
// WRAPPERS OVER NAMETREE TYPES FOR SERDE                             //
////////////////////////////////////////////////////////////////////////

/// Generates a deserializable `ConfigX` structure wrapping an `X` type
/// from [`nametree`], using its [`FromStr`](std::str::FromStr)
/// implementation.
macro_rules! make_serde_wrapper {
    ($wrapper:ident, $over:ty, $description:literal) => {
        /// A macro-generated deserializable wrapper over a [`nametree`]
        /// type.
        #[derive(Clone, Debug)]
        pub struct $wrapper(pub $over);

        impl<'de> Deserialize<'de> for $wrapper {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: de::Deserializer<'de>,
            {
                deserializer.deserialize_str(paste! { [<$wrapper Visitor>] })
            }
        }

        paste! {
            /// A macro-generated [`Visitor`](de::Visitor).
            #[derive(Debug)]
            struct [<$wrapper Visitor>];
        }

        impl<'de> de::Visitor<'de> for paste! { [<$wrapper Visitor>] } {
            type Value = $wrapper;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str($description)
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value
                    .parse()
                    .map($wrapper)
                    .map_err(|e| E::custom(format!("invalid {}: {}", $description, e)))
            }
        }
    };
}

make_serde_wrapper!(ConfigName, Name, "domain name");

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
