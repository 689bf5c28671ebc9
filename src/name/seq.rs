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

//! Implementation of the [`LabelSeq`] type and the comparison of label
//! sequences.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FusedIterator;
use std::ops::Index;
use std::str::FromStr;

use arrayvec::ArrayVec;

use super::{parse_escape, Error, Label, NameBuilder, MAX_N_LABELS, MAX_WIRE_LEN};

////////////////////////////////////////////////////////////////////////
// LABEL SEQUENCES                                                    //
////////////////////////////////////////////////////////////////////////

/// A non-empty sequence of labels.
///
/// A `LabelSeq` is *absolute* when its last label is the null label
/// (it is then a full domain name, see [`Name`](super::Name)) and
/// *relative* otherwise. Relative sequences are the fragments of a
/// domain name that are stored in a single node of a
/// [`NameTree`](crate::tree::NameTree).
///
/// Internally, a `LabelSeq` keeps the uncompressed on-the-wire
/// representation of its labels (as defined in [RFC 1035 § 3.1]; a
/// relative sequence simply lacks the final null label) together with
/// the offset of each label in that representation.
///
/// [RFC 1035 § 3.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.1
#[derive(Clone)]
pub struct LabelSeq {
    wire: Box<[u8]>,
    offsets: Box<[u8]>,
}

#[allow(clippy::len_without_is_empty)] // A label sequence is never empty!
impl LabelSeq {
    /// Constructs a `LabelSeq` from a valid wire representation and its
    /// label offsets.
    pub(super) fn from_parts(wire: &[u8], offsets: &[u8]) -> Self {
        debug_assert!(!offsets.is_empty());
        Self {
            wire: wire.into(),
            offsets: offsets.into(),
        }
    }

    /// Concatenates several sequences, in order. Every part but the
    /// last must be relative.
    pub fn concat_all<'a, I>(parts: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = &'a LabelSeq>,
    {
        let mut wire: ArrayVec<u8, MAX_WIRE_LEN> = ArrayVec::new();
        let mut offsets: ArrayVec<u8, MAX_N_LABELS> = ArrayVec::new();
        let mut absolute = false;
        for part in parts {
            if absolute {
                return Err(Error::NullNonTerminal);
            }
            let base = wire.len();
            wire.try_extend_from_slice(&part.wire)
                .map_err(|_| Error::NameTooLong)?;
            for offset in part.offsets.iter() {
                offsets
                    .try_push(*offset + base as u8)
                    .map_err(|_| Error::NameTooLong)?;
            }
            absolute = part.is_absolute();
        }
        if offsets.is_empty() {
            Err(Error::NoLabelsProvided)
        } else {
            Ok(Self::from_parts(&wire, &offsets))
        }
    }

    /// Appends `suffix` to this sequence, which must be relative.
    pub fn concat(&self, suffix: &LabelSeq) -> Result<Self, Error> {
        Self::concat_all([self, suffix])
    }

    /// Returns whether this sequence is equal to or a subdomain of
    /// `other`, that is, whether `other` is a suffix of this sequence.
    pub fn eq_or_subdomain_of(&self, other: &LabelSeq) -> bool {
        self.len() >= other.len()
            && self
                .labels()
                .rev()
                .zip(other.labels().rev())
                .all(|(a, b)| a == b)
    }

    /// Compares this sequence with `other`, label by label from the
    /// right. See [`Comparison`].
    pub fn full_compare(&self, other: &LabelSeq) -> Comparison {
        let mut common_labels = 0;
        for (a, b) in self.labels().rev().zip(other.labels().rev()) {
            let order = a.cmp(b);
            if order.is_ne() {
                let relation = if common_labels > 0 {
                    NameRelation::CommonAncestor
                } else {
                    NameRelation::Unrelated
                };
                return Comparison {
                    relation,
                    order,
                    common_labels,
                };
            }
            common_labels += 1;
        }

        let order = self.len().cmp(&other.len());
        let relation = match order {
            Ordering::Less => NameRelation::Superdomain,
            Ordering::Equal => NameRelation::Equal,
            Ordering::Greater => NameRelation::Subdomain,
        };
        Comparison {
            relation,
            order,
            common_labels,
        }
    }

    /// Returns whether the last label is the null label.
    pub fn is_absolute(&self) -> bool {
        self[self.len() - 1].is_null()
    }

    /// Returns whether the sequence is the DNS root `.`.
    pub fn is_root(&self) -> bool {
        self.len() == 1 && self.is_absolute()
    }

    /// Returns an iterator over the labels of the sequence.
    pub fn labels(&self) -> Labels<'_> {
        Labels {
            seq: self,
            front: 0,
            back: self.len(),
        }
    }

    /// Returns the number of labels in the sequence.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns the first `n` labels. Panics unless `1 <= n <= len`.
    pub fn prefix(&self, n: usize) -> Self {
        assert!(n >= 1 && n <= self.len());
        let end = if n == self.len() {
            self.wire.len()
        } else {
            self.offsets[n] as usize
        };
        Self::from_parts(&self.wire[..end], &self.offsets[..n])
    }

    /// Splits the sequence into its first `len - suffix_len` labels and
    /// its last `suffix_len` labels. Panics unless
    /// `1 <= suffix_len < len`.
    pub fn split(&self, suffix_len: usize) -> (Self, Self) {
        assert!(suffix_len < self.len());
        (
            self.prefix(self.len() - suffix_len),
            self.suffix(suffix_len),
        )
    }

    /// Returns the last `n` labels. Panics unless `1 <= n <= len`.
    pub fn suffix(&self, n: usize) -> Self {
        assert!(n >= 1 && n <= self.len());
        let first = self.len() - n;
        let start = self.offsets[first];
        let offsets: ArrayVec<u8, MAX_N_LABELS> =
            self.offsets[first..].iter().map(|o| o - start).collect();
        Self::from_parts(&self.wire[start as usize..], &offsets)
    }

    /// Returns whether the last `n` labels of this sequence equal
    /// `other`, without building the suffix.
    pub fn suffix_eq(&self, n: usize, other: &LabelSeq) -> bool {
        n <= self.len()
            && n == other.len()
            && self.labels().skip(self.len() - n).eq(other.labels())
    }

    /// Returns the on-the-wire representation of the sequence.
    pub fn wire_repr(&self) -> &[u8] {
        &self.wire
    }
}

impl Index<usize> for LabelSeq {
    type Output = Label;

    fn index(&self, index: usize) -> &Self::Output {
        let offset = self.offsets[index] as usize;
        let len = self.wire[offset] as usize;
        Label::from_unchecked(&self.wire[offset + 1..offset + 1 + len])
    }
}

impl fmt::Display for LabelSeq {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            f.write_str(".")
        } else {
            let mut labels = self.labels();
            // NOTE: the unwrap() is okay, since sequences are never
            // empty.
            fmt::Display::fmt(labels.next().unwrap(), f)?;
            for label in labels {
                write!(f, ".{}", label)?;
            }
            Ok(())
        }
    }
}

impl fmt::Debug for LabelSeq {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl PartialEq for LabelSeq {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.labels().eq(other.labels())
    }
}

impl Eq for LabelSeq {}

impl PartialOrd for LabelSeq {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Label sequences are ordered as in DNSSEC's canonical ordering of
/// domain names ([RFC 4034 § 6.1]): as strings of labels read from
/// right to left.
///
/// [RFC 4034 § 6.1]: https://datatracker.ietf.org/doc/html/rfc4034#section-6.1
impl Ord for LabelSeq {
    fn cmp(&self, other: &Self) -> Ordering {
        self.full_compare(other).order
    }
}

impl Hash for LabelSeq {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for label in self.labels() {
            label.hash(state);
        }
    }
}

/// Parses a possibly relative sequence; a trailing period makes it
/// absolute. [RFC 4343 § 2.1] escapes are supported.
///
/// [RFC 4343 § 2.1]: https://datatracker.ietf.org/doc/html/rfc4343#section-2.1
impl FromStr for LabelSeq {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_into_builder(s).map(NameBuilder::finish)
    }
}

/// Runs the text of a name through a [`NameBuilder`].
pub(super) fn parse_into_builder(s: &str) -> Result<NameBuilder, Error> {
    let mut builder = NameBuilder::new();
    if s.is_empty() {
        return Err(Error::StrEmpty);
    } else if s == "." {
        return Ok(builder);
    }

    let mut remaining_octets: &[u8] = s.as_ref();

    // NOTE: to check that the string is ASCII, it suffices to check
    // that each octet is ASCII as we go. This is because all
    // multi-byte characters start with an octet that is not ASCII.
    while let Some(&octet) = remaining_octets.first() {
        if octet == b'\\' {
            let (value, consumed) = parse_escape(&remaining_octets[1..])?;
            builder.try_push(value)?;
            remaining_octets = &remaining_octets[consumed + 1..];
        } else if octet == b'.' {
            builder.next_label()?;
            remaining_octets = &remaining_octets[1..];
        } else if !octet.is_ascii() {
            return Err(Error::StrNotAscii);
        } else {
            builder.try_push(octet)?;
            remaining_octets = &remaining_octets[1..];
        }
    }
    Ok(builder)
}

////////////////////////////////////////////////////////////////////////
// COMPARISON                                                         //
////////////////////////////////////////////////////////////////////////

/// The hierarchical relationship between two label sequences, as
/// determined by [`LabelSeq::full_compare`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NameRelation {
    /// The sequences are equal (ignoring ASCII case).
    Equal,

    /// The first sequence is a strict subdomain of the second.
    Subdomain,

    /// The second sequence is a strict subdomain of the first.
    Superdomain,

    /// The sequences share a non-empty common suffix, but neither is a
    /// suffix of the other.
    CommonAncestor,

    /// The sequences share no trailing label.
    Unrelated,
}

/// The full result of comparing two label sequences.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Comparison {
    /// How the sequences are related.
    pub relation: NameRelation,

    /// The canonical order of the sequences: the order of the first
    /// differing label from the right, or of the label counts if one
    /// sequence is a suffix of the other.
    pub order: Ordering,

    /// The number of trailing labels the sequences have in common.
    pub common_labels: usize,
}

////////////////////////////////////////////////////////////////////////
// ITERATION OVER A SEQUENCE'S LABELS                                 //
////////////////////////////////////////////////////////////////////////

/// An iterator over the [`Label`]s in a [`LabelSeq`].
#[derive(Clone, Debug)]
pub struct Labels<'a> {
    seq: &'a LabelSeq,
    front: usize,
    back: usize,
}

impl<'a> Iterator for Labels<'a> {
    type Item = &'a Label;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front < self.back {
            let this_one = self.front;
            self.front += 1;
            Some(&self.seq[this_one])
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl DoubleEndedIterator for Labels<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.back > self.front {
            self.back -= 1;
            Some(&self.seq[self.back])
        } else {
            None
        }
    }
}

impl ExactSizeIterator for Labels<'_> {}

impl FusedIterator for Labels<'_> {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(s: &str) -> LabelSeq {
        s.parse().unwrap()
    }

    #[test]
    fn relative_and_absolute_parse() {
        assert!(seq("a.b.").is_absolute());
        assert!(!seq("a.b").is_absolute());
        assert_eq!(seq("a.b").len(), 2);
        assert_eq!(seq("a.b.").len(), 3);
        assert!(seq(".").is_root());
    }

    #[test]
    fn display_round_trips_text() {
        for text in [".", "a", "a.b", "a.b.", "\\000.x."] {
            assert_eq!(seq(text).to_string(), text);
        }
    }

    #[test]
    fn split_and_concat_work() {
        let name = seq("www.example.com.");
        let (prefix, suffix) = name.split(2);
        assert_eq!(prefix, seq("www.example"));
        assert_eq!(suffix, seq("com."));
        assert_eq!(prefix.concat(&suffix).unwrap(), name);
        assert_eq!(name.prefix(1), seq("www"));
        assert_eq!(name.suffix(4), name);
        assert_eq!(name.suffix(1), seq("."));
    }

    #[test]
    fn concat_rejects_absolute_prefix() {
        assert_eq!(
            seq("a.").concat(&seq("b.")),
            Err(Error::NullNonTerminal)
        );
        assert_eq!(
            LabelSeq::concat_all(std::iter::empty()),
            Err(Error::NoLabelsProvided)
        );
    }

    #[test]
    fn concat_rejects_long_result() {
        let long = seq(&["x"; 100].join("."));
        assert_eq!(long.concat(&long), Err(Error::NameTooLong));
    }

    #[test]
    fn suffix_eq_works() {
        let name = seq("a.b.c");
        assert!(name.suffix_eq(2, &seq("B.c")));
        assert!(name.suffix_eq(3, &name));
        assert!(!name.suffix_eq(2, &seq("a.b")));
        assert!(!name.suffix_eq(4, &seq("x.a.b.c")));
    }

    #[test]
    fn full_compare_works() {
        let cmp = seq("a.example.com.").full_compare(&seq("example.com."));
        assert_eq!(cmp.relation, NameRelation::Subdomain);
        assert_eq!(cmp.order, Ordering::Greater);
        assert_eq!(cmp.common_labels, 3);

        let cmp = seq("example.com.").full_compare(&seq("a.example.com."));
        assert_eq!(cmp.relation, NameRelation::Superdomain);
        assert_eq!(cmp.order, Ordering::Less);

        let cmp = seq("a.example.com.").full_compare(&seq("b.example.com."));
        assert_eq!(cmp.relation, NameRelation::CommonAncestor);
        assert_eq!(cmp.order, Ordering::Less);
        assert_eq!(cmp.common_labels, 3);

        let cmp = seq("a.b").full_compare(&seq("c"));
        assert_eq!(cmp.relation, NameRelation::Unrelated);
        assert_eq!(cmp.order, Ordering::Less);
        assert_eq!(cmp.common_labels, 0);

        let cmp = seq("EXAMPLE").full_compare(&seq("example"));
        assert_eq!(cmp.relation, NameRelation::Equal);
        assert_eq!(cmp.common_labels, 1);
    }

    #[test]
    fn absolute_names_always_share_the_root() {
        let cmp = seq("example.com.").full_compare(&seq("example.org."));
        assert_eq!(cmp.relation, NameRelation::CommonAncestor);
        assert_eq!(cmp.common_labels, 1);
    }

    #[test]
    fn eq_or_subdomain_of_works() {
        assert!(seq("a.b.").eq_or_subdomain_of(&seq("b.")));
        assert!(seq("a.b.").eq_or_subdomain_of(&seq("A.B.")));
        assert!(seq("a.b.").eq_or_subdomain_of(&seq(".")));
        assert!(!seq("b.").eq_or_subdomain_of(&seq("a.b.")));
        assert!(!seq("a.b.").eq_or_subdomain_of(&seq("c.b.")));
    }

    #[test]
    fn labels_iterator_works() {
        let name = seq("a.b.");
        let labels: Vec<_> = name.labels().map(|l| l.octets().to_vec()).collect();
        assert_eq!(labels, vec![b"a".to_vec(), b"b".to_vec(), vec![]]);
        assert_eq!(name.labels().rev().count(), 3);
    }

    #[test]
    fn wire_repr_works() {
        assert_eq!(seq("a.bb.").wire_repr(), b"\x01a\x02bb\x00");
        assert_eq!(seq("a.bb").wire_repr(), b"\x01a\x02bb");
        assert_eq!(seq("a.bb.").suffix(2).wire_repr(), b"\x02bb\x00");
    }
}
