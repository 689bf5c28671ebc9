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

//! Implementation of the [`Error`] type for tree operations.

use std::fmt;

/// An error type used to report failed [`NameTree`](super::NameTree)
/// mutations. Lookups report their outcome as a
/// [`FindResult`](super::FindResult) instead.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// The name is already present with data.
    Exists,

    /// Inserting the name would take the tree past its maximum number
    /// of levels.
    NoSpace,

    /// The name is not present with data.
    NotFound,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Exists => f.write_str("name already exists"),
            Self::NoSpace => f.write_str("maximum tree depth exceeded"),
            Self::NotFound => f.write_str("name not found"),
        }
    }
}

impl std::error::Error for Error {}
