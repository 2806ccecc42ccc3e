//! A subset of the JSONPath dialect understood by `kubectl get -o jsonpath`.
//!
//! Supported are an optional `{...}` wrapping, a leading `$` or `.`, field access (`.field` and
//! `['field']`), list indices (negative ones count from the end), wildcards (`[*]` and `.*`)
//! and filters comparing a relative path with a literal (`[?(@.type=="Available")]`, `!=`).
//!
//! Query results are rendered the way kubectl prints them: strings unquoted, everything else as
//! JSON and multiple results separated by a space.

use std::str::FromStr;

use serde_json::Value;
use snafu::{OptionExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("unexpected end of expression, expected {expected}"))]
    UnexpectedEnd { expected: &'static str },

    #[snafu(display("unexpected character {character:?} at position {position}, expected {expected}"))]
    UnexpectedCharacter {
        character: char,
        position: usize,
        expected: &'static str,
    },

    #[snafu(display("recursive descent at position {position} is not supported"))]
    RecursiveDescent { position: usize },

    #[snafu(display("invalid index {index:?}"))]
    InvalidIndex { index: String },

    #[snafu(display("invalid filter literal {literal:?}"))]
    InvalidLiteral { literal: String },
}

#[derive(Clone, Debug)]
enum Segment {
    Field(String),
    Index(i64),
    Wildcard,
    Filter(Filter),
}

#[derive(Clone, Copy, Debug)]
enum Comparison {
    Equal,
    NotEqual,
}

#[derive(Clone, Debug)]
struct Filter {
    path: Vec<Segment>,
    condition: Option<(Comparison, Value)>,
}

/// A parsed JSONPath expression.
#[derive(Clone, Debug)]
pub struct JsonPath {
    expression: String,
    segments: Vec<Segment>,
}

impl FromStr for JsonPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let expression = trimmed
            .strip_prefix('{')
            .and_then(|inner| inner.strip_suffix('}'))
            .unwrap_or(trimmed)
            .trim();

        let mut parser = Parser::new(expression);
        parser.eat('$');
        let segments = parser.segments(false)?;

        if let Some(character) = parser.peek() {
            return UnexpectedCharacterSnafu {
                character,
                position: parser.position,
                expected: "'.' or '['",
            }
            .fail();
        }

        Ok(Self {
            expression: s.to_owned(),
            segments,
        })
    }
}

impl std::fmt::Display for JsonPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expression)
    }
}

impl JsonPath {
    /// Returns all values matched by the expression.
    pub fn query<'a>(&self, value: &'a Value) -> Vec<&'a Value> {
        evaluate(&self.segments, vec![value])
    }

    /// Renders the matched values like kubectl does.
    pub fn render(&self, value: &Value) -> String {
        self.query(value)
            .into_iter()
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn evaluate<'a>(segments: &[Segment], roots: Vec<&'a Value>) -> Vec<&'a Value> {
    segments.iter().fold(roots, |current, segment| {
        current
            .into_iter()
            .flat_map(|value| step(segment, value))
            .collect()
    })
}

fn step<'a>(segment: &Segment, value: &'a Value) -> Vec<&'a Value> {
    match (segment, value) {
        (Segment::Field(name), Value::Object(object)) => object.get(name).into_iter().collect(),
        (Segment::Index(index), Value::Array(items)) => {
            let index = if *index < 0 {
                i64::try_from(items.len()).ok().map(|len| len + index)
            } else {
                Some(*index)
            };
            index
                .and_then(|index| usize::try_from(index).ok())
                .and_then(|index| items.get(index))
                .into_iter()
                .collect()
        }
        (Segment::Wildcard, Value::Array(items)) => items.iter().collect(),
        (Segment::Wildcard, Value::Object(object)) => object.values().collect(),
        (Segment::Filter(filter), Value::Array(items)) => {
            items.iter().filter(|item| filter.matches(item)).collect()
        }
        _ => Vec::new(),
    }
}

impl Filter {
    fn matches(&self, item: &Value) -> bool {
        let found = evaluate(&self.path, vec![item]);
        match &self.condition {
            None => !found.is_empty(),
            Some((Comparison::Equal, literal)) => found.iter().any(|value| *value == literal),
            // Items without the field never match
            Some((Comparison::NotEqual, literal)) => {
                !found.is_empty() && found.iter().all(|value| *value != literal)
            }
        }
    }
}

struct Parser {
    chars: Vec<char>,
    position: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            position: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += 1;
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char, description: &'static str) -> Result<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.position += 1;
                Ok(())
            }
            Some(character) => UnexpectedCharacterSnafu {
                character,
                position: self.position,
                expected: description,
            }
            .fail(),
            None => UnexpectedEndSnafu {
                expected: description,
            }
            .fail(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.position += 1;
        }
    }

    fn take_while(&mut self, f: impl Fn(char) -> bool) -> String {
        let mut taken = String::new();
        while let Some(c) = self.peek().filter(|c| f(*c)) {
            taken.push(c);
            self.position += 1;
        }
        taken
    }

    /// Parses segments until the input ends or, inside filters, a character which cannot
    /// continue a path is found.
    fn segments(&mut self, in_filter: bool) -> Result<Vec<Segment>> {
        let mut segments = Vec::new();

        loop {
            match self.peek() {
                None => break,
                Some('.') => {
                    self.position += 1;
                    match self.peek() {
                        Some('.') => {
                            return RecursiveDescentSnafu {
                                position: self.position - 1,
                            }
                            .fail();
                        }
                        Some('*') => {
                            self.position += 1;
                            segments.push(Segment::Wildcard);
                        }
                        // A lone `.` selects the root
                        None if segments.is_empty() && !in_filter => break,
                        _ => segments.push(Segment::Field(self.field_name()?)),
                    }
                }
                Some('[') => {
                    self.position += 1;
                    segments.push(self.bracket()?);
                }
                Some(c) if !in_filter && segments.is_empty() && is_name_char(c) => {
                    segments.push(Segment::Field(self.field_name()?));
                }
                Some(_) => break,
            }
        }

        Ok(segments)
    }

    fn field_name(&mut self) -> Result<String> {
        let name = self.take_while(is_name_char);
        if !name.is_empty() {
            return Ok(name);
        }

        match self.peek() {
            Some(character) => UnexpectedCharacterSnafu {
                character,
                position: self.position,
                expected: "a field name",
            }
            .fail(),
            None => UnexpectedEndSnafu {
                expected: "a field name",
            }
            .fail(),
        }
    }

    fn quoted(&mut self) -> Result<String> {
        let quote = self.advance().context(UnexpectedEndSnafu {
            expected: "a quoted string",
        })?;
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('\\') => {
                    let escaped = self.advance().context(UnexpectedEndSnafu {
                        expected: "an escaped character",
                    })?;
                    value.push(escaped);
                }
                Some(c) if c == quote => return Ok(value),
                Some(c) => value.push(c),
                None => {
                    return UnexpectedEndSnafu {
                        expected: "a closing quote",
                    }
                    .fail();
                }
            }
        }
    }

    /// Parses the content of a `[...]` segment, the opening bracket is already consumed.
    fn bracket(&mut self) -> Result<Segment> {
        self.skip_whitespace();
        let segment = match self.peek() {
            Some('\'' | '"') => Segment::Field(self.quoted()?),
            Some('*') => {
                self.position += 1;
                Segment::Wildcard
            }
            Some('?') => {
                self.position += 1;
                Segment::Filter(self.filter()?)
            }
            Some(c) if c == '-' || c.is_ascii_digit() => {
                let index = self.take_while(|c| c == '-' || c.is_ascii_digit());
                Segment::Index(index.parse().ok().context(InvalidIndexSnafu { index })?)
            }
            Some(character) => {
                return UnexpectedCharacterSnafu {
                    character,
                    position: self.position,
                    expected: "a quoted field, index, '*' or filter",
                }
                .fail();
            }
            None => {
                return UnexpectedEndSnafu {
                    expected: "a quoted field, index, '*' or filter",
                }
                .fail();
            }
        };
        self.skip_whitespace();
        self.expect(']', "']'")?;
        Ok(segment)
    }

    /// Parses `(@.path)` or `(@.path == literal)`, the `?` is already consumed.
    fn filter(&mut self) -> Result<Filter> {
        self.expect('(', "'('")?;
        self.skip_whitespace();
        self.expect('@', "'@'")?;
        let path = self.segments(true)?;
        self.skip_whitespace();

        let comparison = match self.peek() {
            Some('=') => {
                self.position += 1;
                self.expect('=', "'=='")?;
                Some(Comparison::Equal)
            }
            Some('!') => {
                self.position += 1;
                self.expect('=', "'!='")?;
                Some(Comparison::NotEqual)
            }
            _ => None,
        };

        let condition = match comparison {
            Some(comparison) => {
                self.skip_whitespace();
                Some((comparison, self.literal()?))
            }
            None => None,
        };

        self.skip_whitespace();
        self.expect(')', "')'")?;
        Ok(Filter { path, condition })
    }

    fn literal(&mut self) -> Result<Value> {
        if matches!(self.peek(), Some('\'' | '"')) {
            return Ok(Value::String(self.quoted()?));
        }

        let literal = self.take_while(|c| c != ')' && !c.is_whitespace());
        serde_json::from_str(&literal)
            .ok()
            .context(InvalidLiteralSnafu { literal })
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}
