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

//! Implementation of the [`NameBuilder`] structure.

use std::convert::TryInto;

use arrayvec::ArrayVec;

use super::{Error, LabelSeq, Name, MAX_LABEL_LEN, MAX_N_LABELS, MAX_WIRE_LEN};

/// A facility to efficiently build [`LabelSeq`]s and [`Name`]s.
///
/// The `NameBuilder` constructs the on-the-wire representation and
/// label offset array using fixed-size internal buffers that are long
/// enough to accomodate any valid name, so that building requires only
/// the final allocations when the sequence is finished.
///
/// A new `NameBuilder` starts with a single null label. Single octets
/// can be added to the current label using [`NameBuilder::try_push`],
/// several at a time using [`NameBuilder::try_push_slice`], and a new
/// label is started using [`NameBuilder::next_label`]. If any call to
/// these methods would result in an invalid sequence, an error is
/// returned.
///
/// When the current label is null at the time the build is finished,
/// the result is absolute; otherwise, it is relative:
///
/// ```
/// use nametree::name::NameBuilder;
/// let mut builder = NameBuilder::new();
/// builder.try_push_slice(b"example").unwrap();
/// builder.next_label().unwrap();
/// builder.try_push_slice(b"test").unwrap();
/// assert!(!builder.is_fully_qualified());
/// assert_eq!(builder.finish().to_string(), "example.test");
/// ```
pub struct NameBuilder {
    wire_repr: ArrayVec<u8, MAX_WIRE_LEN>,
    label_offsets: ArrayVec<u8, MAX_N_LABELS>,
    label_start: usize,
    label_len: u8,
}

impl NameBuilder {
    /// Constructs a new `NameBuilder`, which initially contains a
    /// single null label.
    pub fn new() -> Self {
        Self {
            wire_repr: [0][..].try_into().unwrap(),
            label_offsets: [0][..].try_into().unwrap(),
            label_start: 0,
            label_len: 0,
        }
    }

    /// Determines whether the sequence currently stored in the
    /// `NameBuilder` is absolute, that is, whether it ends with the
    /// null label.
    pub fn is_fully_qualified(&self) -> bool {
        self.label_len == 0
    }

    /// Tries to add the given octet to the current label. In the error
    /// case, the `NameBuilder`'s state remains unchanged.
    pub fn try_push(&mut self, octet: u8) -> Result<(), Error> {
        if self.label_len >= (MAX_LABEL_LEN as u8) {
            Err(Error::LabelTooLong)
        } else if self.wire_repr.try_push(octet).is_ok() {
            self.label_len += 1;
            Ok(())
        } else {
            Err(Error::NameTooLong)
        }
    }

    /// Tries to add the given slice to the current label. In the error
    /// case, the `NameBuilder`'s state remains unchanged.
    pub fn try_push_slice(&mut self, octets: &[u8]) -> Result<(), Error> {
        if (self.label_len as usize) + octets.len() > MAX_LABEL_LEN {
            Err(Error::LabelTooLong)
        } else if self.wire_repr.try_extend_from_slice(octets).is_ok() {
            self.label_len += octets.len() as u8;
            Ok(())
        } else {
            Err(Error::NameTooLong)
        }
    }

    /// Writes out the length of the current label in the on-the-wire
    /// representation.
    fn update_label_len(&mut self) {
        self.wire_repr[self.label_start] = self.label_len;
    }

    /// Finishes the current label and starts a new one. This fails if
    /// the current label is null (only the last label may be null) or
    /// if the sequence would become too long. In the error case, the
    /// `NameBuilder`'s state remains unchanged.
    pub fn next_label(&mut self) -> Result<(), Error> {
        if self.is_fully_qualified() {
            Err(Error::NullNonTerminal)
        } else if self.wire_repr.is_full() {
            Err(Error::NameTooLong)
        } else {
            self.update_label_len();
            self.label_start = self.wire_repr.len();
            self.label_len = 0;

            // Neither push fails: wire_repr is not full, and since every
            // previous label is non-null (two octets or more), at most
            // MAX_N_LABELS offsets fit in MAX_WIRE_LEN octets.
            self.wire_repr.push(0);
            self.label_offsets.push(self.label_start as u8);
            Ok(())
        }
    }

    /// Finishes the construction, returning the final [`LabelSeq`] and
    /// consuming the `NameBuilder`. This implicitly finishes the
    /// current label.
    pub fn finish(mut self) -> LabelSeq {
        self.update_label_len();
        LabelSeq::from_parts(&self.wire_repr, &self.label_offsets)
    }

    /// Like [`NameBuilder::finish`], but fails with
    /// [`Error::NonNullTerminal`] unless the sequence is absolute.
    pub fn finish_name(self) -> Result<Name, Error> {
        if self.is_fully_qualified() {
            Ok(Name(self.finish()))
        } else {
            Err(Error::NonNullTerminal)
        }
    }
}

impl Default for NameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
