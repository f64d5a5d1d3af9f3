// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Static safety check for externally authored expressions
//
// Parses the expression into a coarse syntax tree and flags shapes that are
// known to blow up backtracking engines:
// - an unbounded repetition wrapping another unbounded repetition whose body
//   can match the empty string, or can end with something it can also start
//   with, e.g. `(a+)+`, `(\d+-?)*`
// - an alternation with branches that can start with the same character
//   inside an unbounded repetition, e.g. `(a|ab)+`
//
// The character sets are over-approximations, so the check errs on the side
// of rejecting. Anything the parser does not understand is left to the regex
// compiler.

use std::fmt;

/// Shape that makes an expression unsafe to accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hazard {
    NestedQuantifierOverEmpty,
    NestedQuantifierSelfOverlap,
    OverlappingAlternation,
}

impl fmt::Display for Hazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hazard::NestedQuantifierOverEmpty => {
                f.write_str("nested unbounded quantifier over a sub-expression that can match empty")
            }
            Hazard::NestedQuantifierSelfOverlap => {
                f.write_str("nested unbounded quantifier over a self-overlapping sub-expression")
            }
            Hazard::OverlappingAlternation => {
                f.write_str("alternation with overlapping branches inside unbounded repetition")
            }
        }
    }
}

/// Result of analysing one expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Analysis {
    /// The whole expression can match a zero-length span
    pub nullable: bool,
    pub hazard: Option<Hazard>,
    /// Verbose mode is still on at the end of the expression, set by a
    /// top-level `(?x)`
    pub verbose_tail: bool,
}

/// Analyse `source`. Returns `None` when the expression uses syntax the
/// parser does not model.
pub fn analyze(source: &str, verbose: bool) -> Option<Analysis> {
    let mut parser = Parser {
        chars: source.chars().collect(),
        pos: 0,
        verbose,
    };
    let root = parser.parse_alt()?;
    if parser.pos != parser.chars.len() {
        return None;
    }

    Some(Analysis {
        nullable: root.nullable(),
        hazard: find_hazard(&root),
        verbose_tail: parser.verbose,
    })
}

fn find_hazard(node: &Node) -> Option<Hazard> {
    match node {
        Node::Repeat { body, max: None, .. } => {
            if body.has_unbounded_repeat() {
                if body.nullable() {
                    return Some(Hazard::NestedQuantifierOverEmpty);
                }
                if body.first().intersects(&body.last()) {
                    return Some(Hazard::NestedQuantifierSelfOverlap);
                }
            }
            if body.has_overlapping_alternation() {
                return Some(Hazard::OverlappingAlternation);
            }
            find_hazard(body)
        }
        Node::Repeat { body, .. } => find_hazard(body),
        Node::Concat(nodes) | Node::Alt(nodes) => nodes.iter().find_map(find_hazard),
        Node::Empty | Node::Assertion | Node::Atom(_) => None,
    }
}

/// Over-approximated set of characters
#[derive(Debug, Clone, PartialEq, Eq)]
enum CharSet {
    Any,
    Ranges(Vec<(char, char)>),
}

impl CharSet {
    fn empty() -> Self {
        CharSet::Ranges(Vec::new())
    }

    fn ranges(ranges: &[(char, char)]) -> Self {
        let mut set = CharSet::empty();
        for &(lo, hi) in ranges {
            set.add_range(lo, hi);
        }
        set
    }

    fn literal(c: char) -> Self {
        CharSet::ranges(&[(c, c)])
    }

    /// Adds the range plus its ASCII case counterpart
    fn add_range(&mut self, lo: char, hi: char) {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        if let CharSet::Ranges(ranges) = self {
            ranges.push((lo, hi));
            for (from, to, shift_up) in [('a', 'z', false), ('A', 'Z', true)] {
                let start = lo.max(from);
                let end = hi.min(to);
                if start <= end {
                    let shift = |c: char| {
                        if shift_up {
                            c.to_ascii_lowercase()
                        } else {
                            c.to_ascii_uppercase()
                        }
                    };
                    ranges.push((shift(start), shift(end)));
                }
            }
        }
    }

    fn union(&mut self, other: &CharSet) {
        match (&mut *self, other) {
            (CharSet::Any, _) => {}
            (_, CharSet::Any) => *self = CharSet::Any,
            (CharSet::Ranges(mine), CharSet::Ranges(theirs)) => mine.extend_from_slice(theirs),
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, CharSet::Ranges(r) if r.is_empty())
    }

    fn intersects(&self, other: &CharSet) -> bool {
        match (self, other) {
            (CharSet::Any, o) | (o, CharSet::Any) => !o.is_empty(),
            (CharSet::Ranges(a), CharSet::Ranges(b)) => a
                .iter()
                .any(|&(alo, ahi)| b.iter().any(|&(blo, bhi)| alo <= bhi && blo <= ahi)),
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Empty,
    Assertion,
    Atom(CharSet),
    Concat(Vec<Node>),
    Alt(Vec<Node>),
    Repeat {
        body: Box<Node>,
        min: u32,
        max: Option<u32>,
    },
}

impl Node {
    fn nullable(&self) -> bool {
        match self {
            Node::Empty | Node::Assertion => true,
            Node::Atom(_) => false,
            Node::Concat(nodes) => nodes.iter().all(Node::nullable),
            Node::Alt(nodes) => nodes.iter().any(Node::nullable),
            Node::Repeat { body, min, .. } => *min == 0 || body.nullable(),
        }
    }

    /// Characters a non-empty match can start with
    fn first(&self) -> CharSet {
        self.edge(false)
    }

    /// Characters a non-empty match can end with
    fn last(&self) -> CharSet {
        self.edge(true)
    }

    fn edge(&self, from_end: bool) -> CharSet {
        match self {
            Node::Empty | Node::Assertion => CharSet::empty(),
            Node::Atom(set) => set.clone(),
            Node::Concat(nodes) => {
                let mut set = CharSet::empty();
                let mut visit = |node: &Node| {
                    set.union(&node.edge(from_end));
                    node.nullable()
                };
                if from_end {
                    for node in nodes.iter().rev() {
                        if !visit(node) {
                            break;
                        }
                    }
                } else {
                    for node in nodes {
                        if !visit(node) {
                            break;
                        }
                    }
                }
                set
            }
            Node::Alt(nodes) => {
                let mut set = CharSet::empty();
                for node in nodes {
                    set.union(&node.edge(from_end));
                }
                set
            }
            Node::Repeat { max: Some(0), .. } => CharSet::empty(),
            Node::Repeat { body, .. } => body.edge(from_end),
        }
    }

    fn has_unbounded_repeat(&self) -> bool {
        match self {
            Node::Repeat { max: None, .. } => true,
            Node::Repeat { body, .. } => body.has_unbounded_repeat(),
            Node::Concat(nodes) | Node::Alt(nodes) => nodes.iter().any(Node::has_unbounded_repeat),
            Node::Empty | Node::Assertion | Node::Atom(_) => false,
        }
    }

    fn has_overlapping_alternation(&self) -> bool {
        match self {
            Node::Alt(nodes) => {
                let firsts: Vec<CharSet> = nodes.iter().map(Node::first).collect();
                let overlapping = firsts.iter().enumerate().any(|(i, a)| {
                    firsts[i + 1..].iter().any(|b| a.intersects(b))
                });
                overlapping || nodes.iter().any(Node::has_overlapping_alternation)
            }
            Node::Concat(nodes) => nodes.iter().any(Node::has_overlapping_alternation),
            Node::Repeat { body, .. } => body.has_overlapping_alternation(),
            Node::Empty | Node::Assertion | Node::Atom(_) => false,
        }
    }
}

fn digit() -> CharSet {
    CharSet::ranges(&[('0', '9')])
}

fn word() -> CharSet {
    CharSet::ranges(&[('0', '9'), ('A', 'Z'), ('_', '_'), ('a', 'z'), ('\u{aa}', char::MAX)])
}

fn space() -> CharSet {
    CharSet::ranges(&[('\t', '\r'), (' ', ' ')])
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    verbose: bool,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_verbose_trivia(&mut self) {
        if !self.verbose {
            return;
        }
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn parse_alt(&mut self) -> Option<Node> {
        let mut branches = vec![self.parse_concat()?];
        while self.eat('|') {
            branches.push(self.parse_concat()?);
        }
        Some(if branches.len() == 1 {
            branches.pop()?
        } else {
            Node::Alt(branches)
        })
    }

    fn parse_concat(&mut self) -> Option<Node> {
        let mut items = Vec::new();
        loop {
            self.skip_verbose_trivia();
            match self.peek() {
                None | Some('|') | Some(')') => break,
                _ => items.push(self.parse_quantified()?),
            }
        }
        Some(match items.len() {
            0 => Node::Empty,
            1 => items.pop()?,
            _ => Node::Concat(items),
        })
    }

    fn parse_quantified(&mut self) -> Option<Node> {
        let mut node = self.parse_atom()?;
        loop {
            self.skip_verbose_trivia();
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
                Some('{') => match self.parse_counted() {
                    Some(bounds) => bounds,
                    None => break,
                },
                _ => break,
            };
            // lazy suffix does not change the language
            self.eat('?');
            node = Node::Repeat {
                body: Box::new(node),
                min,
                max,
            };
        }
        Some(node)
    }

    fn parse_counted(&mut self) -> Option<(u32, Option<u32>)> {
        let start = self.pos;
        self.pos += 1;
        let min = self.parse_number();
        let result = if self.eat('}') {
            min.map(|n| (n, Some(n)))
        } else if self.eat(',') {
            let max = self.parse_number();
            if self.eat('}') {
                min.map(|n| (n, max))
            } else {
                None
            }
        } else {
            None
        };
        if result.is_none() {
            self.pos = start;
        }
        result
    }

    fn parse_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == ' ') {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| !c.is_whitespace())
            .collect();
        digits.parse().ok()
    }

    fn parse_atom(&mut self) -> Option<Node> {
        match self.bump()? {
            '(' => self.parse_group(),
            '[' => Some(Node::Atom(self.parse_class()?)),
            '\\' => self.parse_escape(),
            '.' => Some(Node::Atom(CharSet::Any)),
            '^' | '$' => Some(Node::Assertion),
            c => Some(Node::Atom(CharSet::literal(c))),
        }
    }

    fn parse_group(&mut self) -> Option<Node> {
        // flags set inside a group end with it
        let outer_verbose = self.verbose;
        if self.eat('?') {
            match self.peek()? {
                'P' | '<' => {
                    self.eat('P');
                    if !self.eat('<') {
                        return None;
                    }
                    while self.bump()? != '>' {}
                }
                _ => {
                    // inline flags: `(?flags)` or `(?flags:...)`
                    let mut enable = true;
                    loop {
                        match self.bump()? {
                            ':' => break,
                            // bare `(?flags)` applies to the rest of the enclosing group
                            ')' => return Some(Node::Empty),
                            '-' => enable = false,
                            'x' => self.verbose = enable,
                            'i' | 'm' | 's' | 'U' | 'u' | 'R' => {}
                            _ => return None,
                        }
                    }
                }
            }
        }
        let inner = self.parse_alt()?;
        if !self.eat(')') {
            return None;
        }
        self.verbose = outer_verbose;
        Some(inner)
    }

    fn parse_escape(&mut self) -> Option<Node> {
        let set = match self.bump()? {
            'b' | 'B' | 'A' | 'z' | '<' | '>' => return Some(Node::Assertion),
            'd' => digit(),
            'w' => word(),
            's' => space(),
            'D' | 'W' | 'S' => CharSet::Any,
            'p' | 'P' => {
                self.skip_unicode_class()?;
                CharSet::Any
            }
            other => CharSet::literal(self.escaped_char(other)?),
        };
        Some(Node::Atom(set))
    }

    fn skip_unicode_class(&mut self) -> Option<()> {
        if self.eat('{') {
            while self.bump()? != '}' {}
        } else {
            self.bump()?;
        }
        Some(())
    }

    /// Resolves a single-character escape (after the backslash)
    fn escaped_char(&mut self, c: char) -> Option<char> {
        Some(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'f' => '\x0C',
            'v' => '\x0B',
            'a' => '\x07',
            'x' | 'u' | 'U' => {
                let digits: String = if self.eat('{') {
                    let mut s = String::new();
                    loop {
                        match self.bump()? {
                            '}' => break,
                            d => s.push(d),
                        }
                    }
                    s
                } else {
                    let width = match c {
                        'x' => 2,
                        'u' => 4,
                        _ => 8,
                    };
                    let end = (self.pos + width).min(self.chars.len());
                    let s = self.chars[self.pos..end].iter().collect();
                    self.pos = end;
                    s
                };
                char::from_u32(u32::from_str_radix(&digits, 16).ok()?)?
            }
            other => other,
        })
    }

    fn parse_class(&mut self) -> Option<CharSet> {
        let negated = self.eat('^');
        let mut set = CharSet::empty();
        let mut first = true;
        loop {
            let c = self.bump()?;
            match c {
                ']' if !first => break,
                '[' if self.peek() == Some(':') => {
                    while self.bump()? != ']' {}
                    set = CharSet::Any;
                }
                '[' => {
                    let nested = self.parse_class()?;
                    set.union(&nested);
                }
                '&' | '-' | '~' if self.peek() == Some(c) => {
                    // set operations; give up on precision
                    self.pos += 1;
                    set = CharSet::Any;
                }
                _ => {
                    let lo = if c == '\\' {
                        match self.class_escape()? {
                            ClassItem::Char(lo) => lo,
                            ClassItem::Set(s) => {
                                set.union(&s);
                                first = false;
                                continue;
                            }
                        }
                    } else {
                        c
                    };
                    if self.peek() == Some('-') && self.chars.get(self.pos + 1) != Some(&']') {
                        self.pos += 1;
                        let hi = match self.bump()? {
                            '\\' => match self.class_escape()? {
                                ClassItem::Char(hi) => hi,
                                ClassItem::Set(_) => return None,
                            },
                            hi => hi,
                        };
                        set.add_range(lo, hi);
                    } else {
                        set.add_range(lo, lo);
                    }
                }
            }
            first = false;
        }
        Some(if negated { CharSet::Any } else { set })
    }

    fn class_escape(&mut self) -> Option<ClassItem> {
        Some(match self.bump()? {
            'd' => ClassItem::Set(digit()),
            'w' => ClassItem::Set(word()),
            's' => ClassItem::Set(space()),
            'D' | 'W' | 'S' => ClassItem::Set(CharSet::Any),
            'p' | 'P' => {
                self.skip_unicode_class()?;
                ClassItem::Set(CharSet::Any)
            }
            other => ClassItem::Char(self.escaped_char(other)?),
        })
    }
}

enum ClassItem {
    Char(char),
    Set(CharSet),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hazard(source: &str) -> Option<Hazard> {
        analyze(source, false).expect("parse").hazard
    }

    #[test]
    fn test_nested_quantifier_self_overlap() {
        assert_eq!(hazard(r"(a+)+"), Some(Hazard::NestedQuantifierSelfOverlap));
        assert_eq!(hazard(r"^(\d+-?)*$"), Some(Hazard::NestedQuantifierSelfOverlap));
        assert_eq!(hazard(r"(?:[A-Z]+)*x"), Some(Hazard::NestedQuantifierSelfOverlap));
    }

    #[test]
    fn test_nested_quantifier_over_empty() {
        assert_eq!(hazard(r"(a*)*b"), Some(Hazard::NestedQuantifierOverEmpty));
        assert_eq!(hazard(r"x(?:\s*)+y"), Some(Hazard::NestedQuantifierOverEmpty));
    }

    #[test]
    fn test_overlapping_alternation() {
        assert_eq!(hazard(r"(a|ab)+c"), Some(Hazard::OverlappingAlternation));
        assert_eq!(hazard(r"(?:\d|[0-5]x)*"), Some(Hazard::OverlappingAlternation));
        assert_eq!(hazard(r"(?i)(?:A|a)+"), Some(Hazard::OverlappingAlternation));
    }

    #[test]
    fn test_safe_shapes() {
        assert_eq!(hazard(r"01[016-9]-?\d{3,4}-?\d{4}"), None);
        assert_eq!(hazard(r"(?:[a-z0-9-]+\.)+[a-z]{2,}"), None);
        assert_eq!(hazard(r"(?:\d{4}[-\s]?){3}\d{4}"), None);
        assert_eq!(hazard(r"(?:a|b)+"), None);
        assert_eq!(hazard(r"(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}\d+"), None);
        assert_eq!(hazard(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}"), None);
    }

    #[test]
    fn test_nullable() {
        assert!(analyze(r"a*", false).unwrap().nullable);
        assert!(analyze(r"\b", false).unwrap().nullable);
        assert!(analyze(r"(?:x|)", false).unwrap().nullable);
        assert!(!analyze(r"\d{3}", false).unwrap().nullable);
        assert!(!analyze(r"^\w+$", false).unwrap().nullable);
    }

    #[test]
    fn test_class_parsing() {
        // `]` first in a class is literal, escapes and ranges are understood
        assert!(analyze(r"[]a-c\d\-]+x", false).is_some());
        assert!(analyze(r"[[:alpha:]]{2}", false).is_some());
        assert!(analyze(r"\x{41}B\p{Greek}+", false).is_some());
        assert!(analyze(r"(?P<name>\d+)-(?<other>\w)", false).is_some());
    }

    #[test]
    fn test_verbose_mode_ignores_whitespace() {
        let analysis = analyze("\\d{3} # area code\n - \\d{4}", true).unwrap();
        assert!(!analysis.nullable);
        assert_eq!(analysis.hazard, None);
    }

    #[test]
    fn test_scoped_verbose_flag_ends_with_group() {
        // `#` after the group is a literal, so the nested quantifier stays visible
        let analysis = analyze(r"(?x:a)#(b+)+c", false).unwrap();
        assert_eq!(analysis.hazard, Some(Hazard::NestedQuantifierSelfOverlap));
        assert!(!analysis.verbose_tail);

        let analysis = analyze(r"(?:(?x) a )#(b+)+c", false).unwrap();
        assert_eq!(analysis.hazard, Some(Hazard::NestedQuantifierSelfOverlap));
    }

    #[test]
    fn test_top_level_verbose_flag_persists() {
        let analysis = analyze("(?x)\\d{3} - \\d{4} # local number", false).unwrap();
        assert!(analysis.verbose_tail);
        assert!(!analysis.nullable);

        let analysis = analyze("(?x)a(?-x)b", false).unwrap();
        assert!(!analysis.verbose_tail);
        assert!(analyze("a", true).unwrap().verbose_tail);
    }
}
