//! Pattern language: parsing, enumeration, sampling and line matching
//!
//! A pattern is a small regular-expression dialect describing a finite space
//! of candidate strings once a repetition [`Limit`] is applied.

pub mod enumerator;
pub mod matcher;
mod parser;
pub mod sampler;

pub use enumerator::{BoundedPattern, OrderedCandidates};
pub use matcher::{MatchResult, Matcher};

use crate::error::Result;
use crate::types::Limit;
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// Printable ASCII, the universe for `.` and negated classes
pub(crate) fn printable_ascii() -> impl Iterator<Item = char> {
    (0x20u8..=0x7e).map(char::from)
}

/// A sorted, duplicate-free alphabet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharClass(Vec<char>);

impl CharClass {
    pub fn from_chars(chars: impl IntoIterator<Item = char>) -> Self {
        let mut chars: Vec<char> = chars.into_iter().collect();
        chars.sort_unstable();
        chars.dedup();
        Self(chars)
    }

    /// Printable ASCII characters not in `excluded`
    pub fn complement_of(excluded: &[char]) -> Self {
        Self::from_chars(printable_ascii().filter(|c| !excluded.contains(c)))
    }

    pub fn chars(&self) -> &[char] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, c: char) -> bool {
        self.0.binary_search(&c).is_ok()
    }
}

/// One element of a parsed pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    Literal(char),
    Class(CharClass),
    /// Alternatives repeated between `min` and `max` times (`None` = unbounded).
    ///
    /// `quantified` is false for a bare `(...)` or top-level alternation, which
    /// always occurs exactly once whatever the repetition limit.
    Group {
        alternatives: Vec<Vec<Atom>>,
        min: u32,
        max: Option<u32>,
        quantified: bool,
    },
}

/// Immutable parsed pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    atoms: Vec<Atom>,
}

impl Pattern {
    /// Parse a pattern, failing with a pattern syntax error on malformed input
    pub fn parse(source: &str) -> Result<Self> {
        let atoms = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            atoms,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Apply a repetition limit, producing the finite form used for generation
    pub fn bounded(&self, limit: Limit) -> Result<BoundedPattern> {
        BoundedPattern::new(self, limit)
    }

    /// Size of the ordered search space under `limit`
    pub fn count(&self, limit: Limit) -> Result<u128> {
        Ok(self.bounded(limit)?.count())
    }

    /// Ordered enumeration, last atom varying fastest
    pub fn enumerate(&self, limit: Limit) -> Result<OrderedCandidates> {
        Ok(self.bounded(limit)?.into_ordered())
    }

    /// Draw one independent random instantiation
    pub fn sample_one<R: Rng + ?Sized>(&self, limit: Limit, rng: &mut R) -> Result<String> {
        Ok(self.bounded(limit)?.sample(rng))
    }
}

impl FromStr for Pattern {
    type Err = crate::error::UrlForgeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
