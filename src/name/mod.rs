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

//! Implementation of data structures related to domain names.
//!
//! A [`LabelSeq`] is any non-empty sequence of labels, absolute or
//! relative. A [`Name`] is an absolute `LabelSeq`, i.e. a fully
//! qualified domain name. Both compare, order and hash
//! case-insensitively, following RFC 4343 and the canonical ordering of
//! RFC 4034 § 6.1.

use std::convert::TryFrom;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

mod builder;
mod error;
mod label;
mod seq;
pub use builder::NameBuilder;
pub use error::Error;
pub use label::Label;
pub use seq::{Comparison, LabelSeq, Labels, NameRelation};

/// The maximum number of labels in a domain name.
pub const MAX_N_LABELS: usize = 128;

/// The maximum length of the uncompressed on-the-wire representation of
/// a domain name.
const MAX_WIRE_LEN: usize = 255;

/// The maximum length of a label in a domain name (not including the
/// octet that provides the length).
const MAX_LABEL_LEN: usize = 63;

////////////////////////////////////////////////////////////////////////
// NAMES                                                              //
////////////////////////////////////////////////////////////////////////

/// A fully qualified domain name: a [`LabelSeq`] whose last label is
/// the null label.
///
/// `Name` dereferences to [`LabelSeq`], so all of the sequence
/// operations (comparison, splitting, label access) are available.
///
/// ```
/// use nametree::name::Name;
/// let name: Name = "www.example.test.".parse().unwrap();
/// assert_eq!(name.len(), 4);
/// assert!("www.example.test".parse::<Name>().is_err());
/// ```
#[derive(Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Name(LabelSeq);

impl Name {
    /// Returns the name of the DNS root, `.`.
    pub fn root() -> Self {
        Self(LabelSeq::from_parts(&[0], &[0]))
    }

    /// Returns the superdomain obtained by skipping the first `skip`
    /// labels of the `Name`, or `None` if there aren't enough labels.
    pub fn superdomain(&self, skip: usize) -> Option<Name> {
        if skip < self.len() {
            Some(Self(self.0.suffix(self.len() - skip)))
        } else {
            None
        }
    }

    /// Returns the underlying [`LabelSeq`].
    pub fn as_label_seq(&self) -> &LabelSeq {
        &self.0
    }

    /// Unwraps the underlying [`LabelSeq`].
    pub fn into_label_seq(self) -> LabelSeq {
        self.0
    }
}

impl Deref for Name {
    type Target = LabelSeq;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<LabelSeq> for Name {
    type Error = Error;

    fn try_from(seq: LabelSeq) -> Result<Self, Self::Error> {
        if seq.is_absolute() {
            Ok(Self(seq))
        } else {
            Err(Error::NonNullTerminal)
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

////////////////////////////////////////////////////////////////////////
// PARSING OF NAMES FROM RUST STRINGS                                 //
////////////////////////////////////////////////////////////////////////

/// Allows for conversion of a Rust [`str`] into a [`Name`]. The passed
/// string must be strictly ASCII and end with a period (the root alone
/// is `.`). Escape sequences as defined by [RFC 4343 § 2.1] are
/// supported.
///
/// [RFC 4343 § 2.1]: https://datatracker.ietf.org/doc/html/rfc4343#section-2.1
impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        seq::parse_into_builder(s)?.finish_name()
    }
}

/// Parses an escape sequence. We expect `remaining_octets` to start
/// with the octet immediately *after* the backslash that introduces the
/// escape sequence.
fn parse_escape(remaining_octets: &[u8]) -> Result<(u8, usize), Error> {
    match remaining_octets {
        [] => Err(Error::InvalidEscape),
        [first, ..] if first.is_ascii_digit() => {
            let digits = remaining_octets
                .get(0..3)
                .filter(|d| d.iter().all(u8::is_ascii_digit))
                .ok_or(Error::InvalidEscape)?;
            let value = digits
                .iter()
                .fold(0usize, |acc, d| 10 * acc + (d - b'0') as usize);
            u8::try_from(value)
                .map(|value| (value, 3))
                .map_err(|_| Error::InvalidEscape)
        }
        [first, ..] => Ok((*first, 1)),
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_expected_characteristics() {
        let root = Name::root();
        assert!(root.is_root());
        assert_eq!(root.len(), 1);
        assert_eq!(root.wire_repr(), &[0]);
        assert_eq!(root.to_string(), ".");
    }

    #[test]
    fn superdomain_works() {
        let subdomain: Name = "subdomain.example.test.".parse().unwrap();
        let domain: Name = "example.test.".parse().unwrap();
        let tld: Name = "test.".parse().unwrap();
        assert_eq!(subdomain.superdomain(0).as_ref(), Some(&subdomain));
        assert_eq!(subdomain.superdomain(1), Some(domain));
        assert_eq!(subdomain.superdomain(2), Some(tld));
        assert_eq!(subdomain.superdomain(3), Some(Name::root()));
        assert_eq!(subdomain.superdomain(4), None);
    }

    #[test]
    fn ord_works() {
        // This ordered list is from RFC 4034 § 6.1, which defines the
        // canonical ordering of domain names.
        let names: Vec<Name> = [
            "example.",
            "a.example.",
            "yljkjljk.a.example.",
            "Z.a.example.",
            "zABC.a.EXAMPLE.",
            "z.example.",
            "\\001.z.example.",
            "*.z.example.",
            "\\200.z.example.",
        ]
        .into_iter()
        .map(|n| n.parse().unwrap())
        .collect();

        for (i, ni) in names.iter().enumerate() {
            for (j, nj) in names.iter().enumerate() {
                assert_eq!(i.cmp(&j), ni.cmp(nj));
            }
        }
    }

    #[test]
    fn fromstr_works() {
        let name: Name = "example.test.".parse().unwrap();
        assert_eq!(name.wire_repr(), b"\x07example\x04test\x00");
    }

    #[test]
    fn fromstr_works_for_root() {
        let name: Name = ".".parse().unwrap();
        assert_eq!(name, Name::root());
    }

    #[test]
    fn fromstr_rejects_empty() {
        assert_eq!("".parse::<Name>(), Err(Error::StrEmpty));
    }

    #[test]
    fn fromstr_rejects_non_ascii() {
        assert_eq!("✈.aero.".parse::<Name>(), Err(Error::StrNotAscii));
    }

    #[test]
    fn fromstr_rejects_non_fqdn() {
        assert_eq!("non.fqdn".parse::<Name>(), Err(Error::NonNullTerminal));
    }

    #[test]
    fn fromstr_rejects_long_label() {
        assert_eq!(
            "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx."
                .parse::<Name>(),
            Err(Error::LabelTooLong)
        );
    }

    #[test]
    fn fromstr_rejects_long_name() {
        assert_eq!(
            "x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.\
             x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.\
             x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.\
             x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x.x."
                .parse::<Name>(),
            Err(Error::NameTooLong)
        );
    }

    #[test]
    fn fromstr_rejects_null_non_terminal() {
        assert_eq!("a.b..c.".parse::<Name>(), Err(Error::NullNonTerminal));
    }

    #[test]
    fn fromstr_escaping_works() {
        let escaped: Name = "\\000.\\\\\\..".parse().unwrap();
        assert_eq!(escaped.wire_repr(), b"\x01\x00\x02\\.\x00");
    }

    #[test]
    fn fromstr_rejects_invalid_escapes() {
        assert_eq!("\\00".parse::<Name>(), Err(Error::InvalidEscape));
        assert_eq!("\\00x.".parse::<Name>(), Err(Error::InvalidEscape));
        assert_eq!("\\256.".parse::<Name>(), Err(Error::InvalidEscape));
    }

    #[test]
    fn try_from_label_seq_requires_absolute() {
        let relative: LabelSeq = "a.b".parse().unwrap();
        assert_eq!(Name::try_from(relative), Err(Error::NonNullTerminal));
        let absolute: LabelSeq = "a.b.".parse().unwrap();
        assert!(Name::try_from(absolute).is_ok());
    }

    #[test]
    fn into_label_seq_round_trips() {
        let name: Name = "www.Example.".parse().unwrap();
        let seq = name.clone().into_label_seq();
        assert!(seq.is_absolute());
        assert_eq!(seq.len(), 3);
        let (prefix, suffix) = seq.split(2);
        assert_eq!(prefix.to_string(), "www");
        assert_eq!(suffix.to_string(), "Example.");
        assert_eq!(Name::try_from(seq), Ok(name));
    }
}
