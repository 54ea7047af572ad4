//! Counting and ordered enumeration of a bounded pattern
//!
//! The atom sequence behaves as a mixed-radix counter: the last atom varies
//! fastest. Inside a repeated group fewer repetitions come first, then the
//! alternatives in the order they were written. All arithmetic saturates at
//! `u128::MAX`; spaces that large are never walked to the end anyway.

use super::{Atom, Pattern};
use crate::error::{Result, UrlForgeError};
use crate::types::Limit;
use std::sync::Arc;

/// A pattern whose every repetition range is finite
#[derive(Debug, Clone)]
pub struct BoundedPattern {
    root: Sequence,
    limit: Limit,
}

#[derive(Debug, Clone)]
pub(super) struct Sequence {
    pub(super) nodes: Vec<Node>,
    pub(super) size: u128,
}

#[derive(Debug, Clone)]
pub(super) enum Node {
    Literal(char),
    Class(Vec<char>),
    Repeat(Repeat),
}

#[derive(Debug, Clone)]
pub(super) struct Repeat {
    pub(super) alternatives: Vec<Sequence>,
    pub(super) min: u32,
    pub(super) max: u32,
    /// Sum of alternative sizes: the radix of one repetition
    pub(super) unit: u128,
    pub(super) size: u128,
}

impl BoundedPattern {
    pub(super) fn new(pattern: &Pattern, limit: Limit) -> Result<Self> {
        let root = bound_sequence(pattern.atoms(), limit)?;
        Ok(Self { root, limit })
    }

    pub(super) fn root(&self) -> &Sequence {
        &self.root
    }

    pub fn limit(&self) -> Limit {
        self.limit
    }

    /// Product over atoms of their representable values
    pub fn count(&self) -> u128 {
        self.root.size
    }

    /// Number of strings an ordered enumeration yields
    pub fn ordered_len(&self) -> u128 {
        self.limit.cap_len(self.count())
    }

    /// The `index`-th string in enumeration order
    pub fn nth(&self, index: u128) -> Option<String> {
        if index >= self.count() {
            return None;
        }
        let mut out = String::new();
        self.root.write_nth(index, &mut out);
        Some(out)
    }

    pub fn into_ordered(self) -> OrderedCandidates {
        OrderedCandidates::new(Arc::new(self))
    }
}

fn bound_sequence(atoms: &[Atom], limit: Limit) -> Result<Sequence> {
    let nodes = atoms
        .iter()
        .map(|atom| bound_atom(atom, limit))
        .collect::<Result<Vec<_>>>()?;
    let size = nodes
        .iter()
        .fold(1u128, |acc, node| acc.saturating_mul(node.size()));
    Ok(Sequence { nodes, size })
}

fn bound_atom(atom: &Atom, limit: Limit) -> Result<Node> {
    match atom {
        Atom::Literal(c) => Ok(Node::Literal(*c)),
        Atom::Class(class) => Ok(Node::Class(class.chars().to_vec())),
        Atom::Group {
            alternatives,
            min,
            max,
            quantified,
        } => {
            // An unquantified group is not a repetition
            let bounds = if *quantified {
                limit.bound_repeat(*min, *max)
            } else {
                Some((1, 1))
            };
            let (min, max) = bounds.ok_or_else(|| {
                UrlForgeError::pattern_syntax(
                    format!(
                        "limit {} leaves no allowed count for a group repeated at least {} times",
                        limit, min
                    ),
                    None,
                )
            })?;

            let alternatives = alternatives
                .iter()
                .map(|alt| bound_sequence(alt, limit))
                .collect::<Result<Vec<_>>>()?;
            let unit = alternatives
                .iter()
                .fold(0u128, |acc, alt| acc.saturating_add(alt.size));
            let size = (min..=max).fold(0u128, |acc, k| acc.saturating_add(unit.saturating_pow(k)));

            Ok(Node::Repeat(Repeat {
                alternatives,
                min,
                max,
                unit,
                size,
            }))
        }
    }
}

impl Node {
    fn size(&self) -> u128 {
        match self {
            Node::Literal(_) => 1,
            Node::Class(chars) => chars.len() as u128,
            Node::Repeat(repeat) => repeat.size,
        }
    }

    fn write_nth(&self, index: u128, out: &mut String) {
        match self {
            Node::Literal(c) => out.push(*c),
            Node::Class(chars) => out.push(chars[index as usize]),
            Node::Repeat(repeat) => repeat.write_nth(index, out),
        }
    }
}

impl Sequence {
    fn write_nth(&self, mut index: u128, out: &mut String) {
        let mut digits = vec![0u128; self.nodes.len()];
        for (digit, node) in digits.iter_mut().zip(&self.nodes).rev() {
            let radix = node.size();
            *digit = index % radix;
            index /= radix;
        }
        for (node, digit) in self.nodes.iter().zip(digits) {
            node.write_nth(digit, out);
        }
    }
}

impl Repeat {
    fn write_nth(&self, mut index: u128, out: &mut String) {
        for k in self.min..=self.max {
            let block = self.unit.saturating_pow(k);
            if index >= block {
                index -= block;
                continue;
            }

            let mut digits = vec![0u128; k as usize];
            for digit in digits.iter_mut().rev() {
                *digit = index % self.unit;
                index /= self.unit;
            }
            for digit in digits {
                self.write_unit(digit, out);
            }
            return;
        }
    }

    /// Write one repetition: pick the alternative owning `index`
    fn write_unit(&self, mut index: u128, out: &mut String) {
        for alt in &self.alternatives {
            if index < alt.size {
                alt.write_nth(index, out);
                return;
            }
            index -= alt.size;
        }
    }
}

/// Lazy, restartable, ordered sequence of pattern instantiations
#[derive(Debug, Clone)]
pub struct OrderedCandidates {
    pattern: Arc<BoundedPattern>,
    current_index: u128,
    total: u128,
}

impl OrderedCandidates {
    pub fn new(pattern: Arc<BoundedPattern>) -> Self {
        let total = pattern.ordered_len();
        Self {
            pattern,
            current_index: 0,
            total,
        }
    }

    /// Number of strings this sequence yields in total
    pub fn total(&self) -> u128 {
        self.total
    }

    pub fn current_index(&self) -> u128 {
        self.current_index
    }

    /// Set current index (for resume)
    pub fn set_index(&mut self, index: u128) {
        self.current_index = index.min(self.total);
    }

    /// Start over from the first string
    pub fn restart(&mut self) {
        self.current_index = 0;
    }

    /// String at a specific position, within the capped length
    pub fn value_at(&self, index: u128) -> Option<String> {
        if index >= self.total {
            return None;
        }
        self.pattern.nth(index)
    }

    pub fn next_batch(&mut self, count: usize) -> Vec<String> {
        self.by_ref().take(count).collect()
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.total
    }

    pub fn remaining(&self) -> u128 {
        self.total.saturating_sub(self.current_index)
    }
}

impl Iterator for OrderedCandidates {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.value_at(self.current_index)?;
        self.current_index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining()) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enumerate(source: &str, limit: Limit) -> Vec<String> {
        Pattern::parse(source).unwrap().enumerate(limit).unwrap().collect()
    }

    #[test]
    fn test_two_digit_suffix_in_order() {
        let values = enumerate("a[0-9]{2}", Limit::UNBOUNDED);
        assert_eq!(values.len(), 100);
        assert_eq!(values[0], "a00");
        assert_eq!(values[1], "a01");
        assert_eq!(values[10], "a10");
        assert_eq!(values[99], "a99");
        let expected: Vec<String> = (0..100).map(|n| format!("a{:02}", n)).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_last_atom_varies_fastest() {
        assert_eq!(enumerate("[ab][xy]", Limit::UNBOUNDED), vec!["ax", "ay", "bx", "by"]);
    }

    #[test]
    fn test_repeat_counts_ascend_then_alternatives() {
        assert_eq!(
            enumerate("(x|yz){1,2}", Limit::UNBOUNDED),
            vec!["x", "yz", "xx", "xyz", "yzx", "yzyz"]
        );
        assert_eq!(enumerate("ab?", Limit::UNBOUNDED), vec!["a", "ab"]);
    }

    #[test]
    fn test_count_matches_enumeration_length() {
        for source in ["a[0-9]{2}", "(ab|c){0,3}d", r"\d{1,2}-[xyz]", "x(y|z)?"] {
            let pattern = Pattern::parse(source).unwrap();
            let count = pattern.count(Limit::UNBOUNDED).unwrap();
            let produced = pattern.enumerate(Limit::UNBOUNDED).unwrap().count() as u128;
            assert_eq!(count, produced, "pattern {}", source);
        }
    }

    #[test]
    fn test_limit_narrows_repeat_span() {
        let pattern = Pattern::parse(r"\d+").unwrap();
        assert_eq!(pattern.count(Limit::new(2)).unwrap(), 10 + 100);
        assert_eq!(pattern.count(Limit::UNBOUNDED).unwrap(), (1..=20).map(|k| 10u128.pow(k)).sum::<u128>());
    }

    #[test]
    fn test_limit_caps_ordered_length() {
        let pattern = Pattern::parse("a[0-9]{2}").unwrap();
        let ordered = pattern.enumerate(Limit::new(5)).unwrap();
        assert_eq!(ordered.total(), 5);
        assert_eq!(ordered.collect::<Vec<_>>(), vec!["a00", "a01", "a02", "a03", "a04"]);
        assert_eq!(pattern.count(Limit::new(5)).unwrap(), 100);
    }

    #[test]
    fn test_strictly_increasing_without_duplicates() {
        let values = enumerate("[a-c]{1,2}", Limit::UNBOUNDED);
        let mut seen = std::collections::HashSet::new();
        assert!(values.iter().all(|v| seen.insert(v.clone())));
        assert_eq!(values.len(), 3 + 9);
    }

    #[test]
    fn test_zero_limit() {
        let pattern = Pattern::parse("a[0-9]{2}").unwrap();
        assert!(matches!(
            pattern.count(Limit::new(0)),
            Err(UrlForgeError::PatternSyntax { .. })
        ));

        let optional = Pattern::parse("ab*").unwrap();
        assert_eq!(optional.count(Limit::new(0)).unwrap(), 1);

        let grouped = Pattern::parse("(?:ab|cd)").unwrap();
        assert_eq!(grouped.count(Limit::new(0)).unwrap(), 2);

        for explicit in ["a{1}", "(?:ab|cd){1}", "x{1,3}"] {
            assert!(
                matches!(
                    Pattern::parse(explicit).unwrap().count(Limit::new(0)),
                    Err(UrlForgeError::PatternSyntax { .. })
                ),
                "{}",
                explicit
            );
        }
        assert_eq!(Pattern::parse("a{1}").unwrap().count(Limit::new(1)).unwrap(), 1);
    }

    #[test]
    fn test_restart_and_resume() {
        let mut ordered = Pattern::parse("[0-9]").unwrap().enumerate(Limit::UNBOUNDED).unwrap();
        assert_eq!(ordered.next_batch(3), vec!["0", "1", "2"]);
        ordered.set_index(8);
        assert_eq!(ordered.remaining(), 2);
        assert_eq!(ordered.next(), Some("8".to_string()));
        ordered.restart();
        assert_eq!(ordered.next(), Some("0".to_string()));
        ordered.set_index(100);
        assert!(ordered.is_exhausted());
    }

    #[test]
    fn test_huge_space_saturates() {
        let pattern = Pattern::parse(r"\w{40}").unwrap();
        assert_eq!(pattern.count(Limit::UNBOUNDED).unwrap(), u128::MAX);
        let first = pattern.bounded(Limit::UNBOUNDED).unwrap().nth(0).unwrap();
        assert_eq!(first, "0".repeat(40));
    }
}
