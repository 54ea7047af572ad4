//! Recursive-descent parser for the pattern dialect

use super::{Atom, CharClass};
use crate::error::Result;
use crate::pattern_error;

const WORD: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";
const DIGITS: &str = "0123456789";
const WHITESPACE: &str = " \t\n\r\x0b\x0c";

/// Parse a pattern source into its atom sequence
pub(super) fn parse(source: &str) -> Result<Vec<Atom>> {
    let mut parser = Parser {
        chars: source.chars().collect(),
        pos: 0,
    };

    let mut alternatives = parser.parse_alternation()?;
    if let Some(c) = parser.peek() {
        // Only a stray ')' can stop the top-level alternation early
        return Err(pattern_error!(parser.pos, "unbalanced group: unexpected '{}'", c));
    }

    let atoms = if alternatives.len() == 1 {
        alternatives.remove(0)
    } else {
        vec![Atom::Group {
            alternatives,
            min: 1,
            max: Some(1),
            quantified: false,
        }]
    };

    if atoms.is_empty() {
        return Err(pattern_error!(0, "pattern has an empty match space"));
    }

    Ok(atoms)
}

/// A parsed escape sequence
enum Escape {
    Char(char),
    Class(CharClass),
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn parse_alternation(&mut self) -> Result<Vec<Vec<Atom>>> {
        let mut alternatives = vec![self.parse_sequence()?];
        while self.peek() == Some('|') {
            self.pos += 1;
            alternatives.push(self.parse_sequence()?);
        }
        Ok(alternatives)
    }

    fn parse_sequence(&mut self) -> Result<Vec<Atom>> {
        let mut atoms = Vec::new();
        loop {
            match self.peek() {
                None | Some('|') | Some(')') => break,
                // Anchors are zero-width
                Some('^') | Some('$') => self.pos += 1,
                Some(_) => {
                    let atom = self.parse_atom()?;
                    atoms.push(self.parse_quantifier(atom)?);
                }
            }
        }
        Ok(atoms)
    }

    fn parse_atom(&mut self) -> Result<Atom> {
        let start = self.pos;
        match self.peek() {
            Some('(') => self.parse_group(),
            Some('[') => self.parse_class(),
            Some('.') => {
                self.pos += 1;
                Ok(Atom::Class(CharClass::complement_of(&[])))
            }
            Some('\\') => match self.parse_escape()? {
                Escape::Char(c) => Ok(Atom::Literal(c)),
                Escape::Class(class) => Ok(Atom::Class(class)),
            },
            Some('*') | Some('+') | Some('?') => Err(pattern_error!(start, "nothing to repeat")),
            Some('{') if self.brace_quantifier().is_some() => {
                Err(pattern_error!(start, "nothing to repeat"))
            }
            Some(c) => {
                self.pos += 1;
                Ok(Atom::Literal(c))
            }
            None => Err(pattern_error!(start, "unexpected end of pattern")),
        }
    }

    fn parse_group(&mut self) -> Result<Atom> {
        let open = self.pos;
        self.pos += 1;

        if self.peek() == Some('?') {
            if self.peek_at(1) == Some(':') {
                self.pos += 2;
            } else {
                return Err(pattern_error!(
                    open,
                    "lookaround and named groups are not supported"
                ));
            }
        }

        let alternatives = self.parse_alternation()?;
        if self.bump() != Some(')') {
            return Err(pattern_error!(open, "unbalanced group: missing ')'"));
        }

        Ok(Atom::Group {
            alternatives,
            min: 1,
            max: Some(1),
            quantified: false,
        })
    }

    fn parse_class(&mut self) -> Result<Atom> {
        let open = self.pos;
        self.pos += 1;

        let negated = self.peek() == Some('^');
        if negated {
            self.pos += 1;
        }

        let mut members = Vec::new();
        let mut first = true;
        loop {
            let item_pos = self.pos;
            let start = match self.peek() {
                None => return Err(pattern_error!(open, "unterminated character class")),
                Some(']') if !first => {
                    self.pos += 1;
                    break;
                }
                Some('\\') => match self.parse_escape()? {
                    Escape::Char(c) => c,
                    Escape::Class(class) => {
                        members.extend_from_slice(class.chars());
                        first = false;
                        continue;
                    }
                },
                Some(c) => {
                    self.pos += 1;
                    c
                }
            };
            first = false;

            let is_range = self.peek() == Some('-') && !matches!(self.peek_at(1), None | Some(']'));
            if !is_range {
                members.push(start);
                continue;
            }

            self.pos += 1;
            let end = match self.peek() {
                Some('\\') => match self.parse_escape()? {
                    Escape::Char(c) => c,
                    Escape::Class(_) => {
                        return Err(pattern_error!(item_pos, "bad character range"));
                    }
                },
                Some(c) => {
                    self.pos += 1;
                    c
                }
                None => return Err(pattern_error!(open, "unterminated character class")),
            };

            if end < start {
                return Err(pattern_error!(item_pos, "bad character range {}-{}", start, end));
            }
            members.extend(start..=end);
        }

        let class = if negated {
            CharClass::complement_of(&members)
        } else {
            CharClass::from_chars(members)
        };

        if class.is_empty() {
            return Err(pattern_error!(open, "character class has an empty alphabet"));
        }
        Ok(Atom::Class(class))
    }

    fn parse_escape(&mut self) -> Result<Escape> {
        let start = self.pos;
        self.pos += 1;
        let c = self
            .bump()
            .ok_or_else(|| pattern_error!(start, "trailing backslash"))?;

        let escape = match c {
            'd' => Escape::Class(CharClass::from_chars(DIGITS.chars())),
            'D' => Escape::Class(complement(DIGITS)),
            'w' => Escape::Class(CharClass::from_chars(WORD.chars())),
            'W' => Escape::Class(complement(WORD)),
            's' => Escape::Class(CharClass::from_chars(WHITESPACE.chars())),
            'S' => Escape::Class(complement(WHITESPACE)),
            'n' => Escape::Char('\n'),
            't' => Escape::Char('\t'),
            'r' => Escape::Char('\r'),
            'f' => Escape::Char('\x0c'),
            'v' => Escape::Char('\x0b'),
            'x' => Escape::Char(self.parse_hex_escape(start)?),
            'b' | 'B' | 'A' | 'z' | 'Z' => {
                return Err(pattern_error!(start, "assertion \\{} is not supported", c));
            }
            '1'..='9' => {
                return Err(pattern_error!(start, "backreferences are not supported"));
            }
            c if c.is_ascii_alphanumeric() => {
                return Err(pattern_error!(start, "unknown escape \\{}", c));
            }
            c => Escape::Char(c),
        };
        Ok(escape)
    }

    fn parse_hex_escape(&mut self, start: usize) -> Result<char> {
        let digits: String = (0..2).filter_map(|i| self.peek_at(i)).collect();
        let value = u32::from_str_radix(&digits, 16)
            .ok()
            .filter(|_| digits.len() == 2)
            .ok_or_else(|| pattern_error!(start, "incomplete escape \\x{}", digits))?;
        self.pos += 2;
        char::from_u32(value).ok_or_else(|| pattern_error!(start, "invalid escape \\x{}", digits))
    }

    fn parse_quantifier(&mut self, atom: Atom) -> Result<Atom> {
        let start = self.pos;
        let (min, max) = match self.peek() {
            Some('*') => {
                self.pos += 1;
                (0, None)
            }
            Some('+') => {
                self.pos += 1;
                (1, None)
            }
            Some('?') => {
                self.pos += 1;
                (0, Some(1))
            }
            Some('{') => match self.brace_quantifier() {
                Some((min, max, len)) => {
                    self.pos += len;
                    (min, max)
                }
                None => return Ok(atom),
            },
            _ => return Ok(atom),
        };

        // Lazy suffix does not change the generated space
        if self.peek() == Some('?') {
            self.pos += 1;
        }

        let stacked = match self.peek() {
            Some('*') | Some('+') => true,
            Some('{') => self.brace_quantifier().is_some(),
            _ => false,
        };
        if stacked {
            return Err(pattern_error!(self.pos, "multiple repeat"));
        }

        if let Some(max) = max {
            if max < min {
                return Err(pattern_error!(start, "min repeat greater than max repeat"));
            }
        }

        Ok(match atom {
            Atom::Group {
                alternatives,
                quantified: false,
                ..
            } => Atom::Group {
                alternatives,
                min,
                max,
                quantified: true,
            },
            other => Atom::Group {
                alternatives: vec![vec![other]],
                min,
                max,
                quantified: true,
            },
        })
    }

    /// Recognise `{n}`, `{n,}`, `{,m}` or `{n,m}` at the cursor without consuming it.
    ///
    /// Returns `(min, max, consumed_len)`; anything else is a literal brace.
    fn brace_quantifier(&self) -> Option<(u32, Option<u32>, usize)> {
        let rest = &self.chars[self.pos..];
        let close = rest.iter().position(|&c| c == '}')?;
        let body: String = rest[1..close].iter().collect();

        let (min, max) = match body.split_once(',') {
            None => {
                let n = parse_count(&body)?;
                (n, Some(n))
            }
            Some(("", "")) => return None,
            Some((lo, "")) => (parse_count(lo)?, None),
            Some(("", hi)) => (0, Some(parse_count(hi)?)),
            Some((lo, hi)) => (parse_count(lo)?, Some(parse_count(hi)?)),
        };
        Some((min, max, close + 1))
    }
}

fn parse_count(text: &str) -> Option<u32> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn complement(chars: &str) -> CharClass {
    let excluded: Vec<char> = chars.chars().collect();
    CharClass::complement_of(&excluded)
}
