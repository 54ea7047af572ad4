//! Independent random instantiation of a bounded pattern

use super::enumerator::{BoundedPattern, Node, Repeat, Sequence};
use rand::Rng;

impl BoundedPattern {
    /// Draw one string uniformly per atom.
    ///
    /// Classes pick a uniform member; repeated groups pick a uniform repeat
    /// count, then a uniform alternative for each repetition. Calls share no
    /// state, so repeated values are possible.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let mut out = String::new();
        self.root().write_sample(rng, &mut out);
        out
    }
}

impl Sequence {
    fn write_sample<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut String) {
        for node in &self.nodes {
            match node {
                Node::Literal(c) => out.push(*c),
                Node::Class(chars) => out.push(chars[rng.gen_range(0..chars.len())]),
                Node::Repeat(repeat) => repeat.write_sample(rng, out),
            }
        }
    }
}

impl Repeat {
    fn write_sample<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut String) {
        let times = rng.gen_range(self.min..=self.max);
        for _ in 0..times {
            let alt = &self.alternatives[rng.gen_range(0..self.alternatives.len())];
            alt.write_sample(rng, out);
        }
    }
}
