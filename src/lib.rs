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

//! An ordered, case-insensitive index of domain names.
//!
//! The [`name`] module provides the domain name types the index is
//! keyed by, and the [`tree`] module provides the index itself,
//! [`NameTree`](tree::NameTree).

pub mod name;
pub mod tree;
