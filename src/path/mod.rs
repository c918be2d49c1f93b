//! Path and type grammar.
//!
//! Paths address entities in the documentation tree. A path is a sequence of
//! delimited segments: `.` steps into a static property, `#` into an instance
//! member, `~` into an auxiliary (spare) doc, `(` into an argument and `)`
//! into a return value. Names may be backtick-quoted (with `` \` `` and `\\`
//! escapes) or bracketed symbolic sub-paths whose flattened form becomes the
//! segment's display name.
//!
//! Type expressions are pipe-delimited unions of value types, each with
//! optional generics (`<...>` or `[...]`), a trailing `*` pointer marker, or a
//! trailing `[]` bare-array marker.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{Result, TagError};

/// Containment step between two path segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    /// `.` - static property / module step
    Property,
    /// `#` - instance member step
    Member,
    /// `~` - auxiliary / spare-doc step
    Spare,
    /// `(` - argument step
    Argument,
    /// `)` - return step
    Return,
}

impl Delimiter {
    pub const COUNT: usize = 5;

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(Delimiter::Property),
            '#' => Some(Delimiter::Member),
            '~' => Some(Delimiter::Spare),
            '(' => Some(Delimiter::Argument),
            ')' => Some(Delimiter::Return),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Delimiter::Property => '.',
            Delimiter::Member => '#',
            Delimiter::Spare => '~',
            Delimiter::Argument => '(',
            Delimiter::Return => ')',
        }
    }

    /// Stable index for per-delimiter child tables.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn all() -> [Delimiter; Self::COUNT] {
        [
            Delimiter::Property,
            Delimiter::Member,
            Delimiter::Spare,
            Delimiter::Argument,
            Delimiter::Return,
        ]
    }
}

/// One step of a [`DocPath`].
///
/// `delim` is `None` only on a first segment whose delimiter was defaulted
/// from context and could not be determined; such a segment compares as
/// wildcard-compatible with any delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub delim: Option<Delimiter>,
    pub name: String,
    /// Original bracketed sub-path for symbolic keys; `name` holds its
    /// flattened string form.
    pub symbol: Option<DocPath>,
}

impl Segment {
    pub fn new(delim: Option<Delimiter>, name: impl Into<String>) -> Self {
        Segment {
            delim,
            name: name.into(),
            symbol: None,
        }
    }

    /// Terminal placeholder awaiting contextual naming.
    pub fn placeholder(delim: Option<Delimiter>) -> Self {
        Segment::new(delim, "")
    }

    pub fn is_placeholder(&self) -> bool {
        self.name.is_empty()
    }

    /// Segment-wise equality for prefix computation: names must match, and
    /// delimiters must match unless one side is missing (wildcard). When
    /// `exact_delim` is set a present-vs-present mismatch is checked strictly
    /// and a missing delimiter on either side still passes.
    pub fn compatible(&self, other: &Segment, exact_delim: bool) -> bool {
        if self.name != other.name {
            return false;
        }
        match (self.delim, other.delim) {
            (Some(a), Some(b)) => a == b,
            // Wildcard: a missing delimiter matches anything, but a strict
            // first-segment comparison requires both sides to agree when set.
            _ => !exact_delim || self.delim.is_none() || other.delim.is_none(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(d) = self.delim {
            write!(f, "{}", d.as_char())?;
        }
        write!(f, "{}", quote_name(&self.name))
    }
}

/// Hierarchical address of an entity.
///
/// Parsed paths always have at least one segment; the zero-length form is
/// reserved for the tree root / empty file scope and is only constructed via
/// [`DocPath::root`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocPath {
    segments: Vec<Segment>,
}

impl DocPath {
    /// The empty path: tree root, or a file scope before any `@module`.
    pub fn root() -> Self {
        DocPath::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        DocPath { segments }
    }

    pub fn single(delim: Option<Delimiter>, name: impl Into<String>) -> Self {
        DocPath {
            segments: vec![Segment::new(delim, name)],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn first(&self) -> Option<&Segment> {
        self.segments.first()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// Drop the last segment. The root path is left unchanged.
    pub fn pop(&mut self) -> Option<Segment> {
        self.segments.pop()
    }

    pub fn parent(&self) -> DocPath {
        let mut p = self.clone();
        p.pop();
        p
    }

    /// Concatenate `other` onto `self`. A lone placeholder in `other` is kept
    /// as a terminal placeholder on the joined path.
    pub fn join(&self, other: &DocPath) -> DocPath {
        let mut joined = self.clone();
        joined.segments.extend(other.segments.iter().cloned());
        joined
    }

    pub fn truncate(&mut self, len: usize) {
        self.segments.truncate(len);
    }

    /// Human-readable form: raw segment names joined by their delimiters,
    /// without the backtick quoting the canonical [`fmt::Display`] applies.
    pub fn flatten(&self) -> String {
        let mut out = String::new();
        for (i, seg) in self.segments.iter().enumerate() {
            match seg.delim {
                Some(d) if !(i == 0 && d == Delimiter::Property) => out.push(d.as_char()),
                _ => {}
            }
            out.push_str(&seg.name);
        }
        out
    }

    /// Length of the longest common prefix with `other`, using wildcard
    /// delimiter compatibility except on the very first segment.
    pub fn common_prefix(&self, other: &DocPath) -> usize {
        self.segments
            .iter()
            .zip(other.segments.iter())
            .enumerate()
            .take_while(|(i, (a, b))| a.compatible(b, *i == 0))
            .count()
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i == 0 && seg.delim == Some(Delimiter::Property) {
                // Leading property step is implicit in canonical form.
                write!(f, "{}", quote_name(&seg.name))?;
            } else {
                write!(f, "{}", seg)?;
            }
        }
        Ok(())
    }
}

impl Serialize for DocPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Characters that force a name into backtick-quoted form when re-serialized.
const NAME_SPECIALS: &[char] = &['.', '#', '~', '(', ')', '`', '[', ']', '|', '<', '>', ' ', '\t'];

fn quote_name(name: &str) -> String {
    if !name.contains(NAME_SPECIALS) {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len() + 2);
    out.push('`');
    for c in name.chars() {
        match c {
            '`' => out.push_str("\\`"),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('`');
    out
}

/// One arm of a pipe-delimited union type expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Valtype {
    /// Flattened display name of the referenced type.
    pub name: String,
    /// Structured reference for cross-linking.
    pub path: DocPath,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_pointer: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_array: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generics: Vec<Generic>,
}

/// One generic argument of a [`Valtype`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generic {
    pub name: String,
    pub path: DocPath,
}

/// Parse a path string against the current file scope.
///
/// `default_delim` is applied to the first segment when it carries no leading
/// delimiter (the caller derives it from the declaration kind). A lone `.`
/// resolves to the file scope itself; an empty string yields a single
/// placeholder segment, never an empty path.
pub fn parse_path(
    input: &str,
    file_scope: &DocPath,
    default_delim: Option<Delimiter>,
) -> Result<DocPath> {
    let s = input.trim();
    if s.is_empty() {
        return Ok(DocPath::from_segments(vec![Segment::placeholder(
            default_delim,
        )]));
    }
    if s == "." {
        if file_scope.is_root() {
            return Ok(DocPath::from_segments(vec![Segment::placeholder(
                default_delim,
            )]));
        }
        return Ok(file_scope.clone());
    }

    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    let mut segments: Vec<Segment> = Vec::new();
    let mut first_defaulted = false;

    while i < chars.len() {
        let first = segments.is_empty();
        let delim = match Delimiter::from_char(chars[i]) {
            Some(d) => {
                i += 1;
                Some(d)
            }
            None if first => {
                first_defaulted = true;
                default_delim
            }
            None => {
                // Unreachable through normal scanning: every later segment
                // starts right after a consumed delimiter.
                return Err(TagError::parse(format!("malformed path `{}`", s)));
            }
        };

        let mut symbol = None;
        let name = if i < chars.len() && chars[i] == '`' {
            i += 1;
            read_quoted(&chars, &mut i, s)?
        } else if i < chars.len() && chars[i] == '[' {
            let inner = read_bracketed(&chars, &mut i, s)?;
            let inner_path = parse_path(&inner, file_scope, None)?;
            let flat = inner_path.flatten();
            symbol = Some(inner_path);
            flat
        } else {
            let start = i;
            while i < chars.len() && Delimiter::from_char(chars[i]).is_none() {
                i += 1;
            }
            chars[start..i].iter().collect()
        };

        if name.is_empty() && i < chars.len() {
            return Err(TagError::parse(format!(
                "empty segment before end of path `{}`",
                s
            )));
        }

        segments.push(Segment {
            delim,
            name,
            symbol,
        });
    }

    // The contextual default addresses a lone relative name. A qualified
    // path like `Foo#bar` leaves its first segment's delimiter open so that
    // lookup stays wildcard-compatible with however `Foo` was declared.
    if first_defaulted && segments.len() > 1 {
        segments[0].delim = None;
    }

    Ok(DocPath::from_segments(segments))
}

/// Read a backtick-quoted name; `i` sits just past the opening backtick.
fn read_quoted(chars: &[char], i: &mut usize, whole: &str) -> Result<String> {
    let mut name = String::new();
    while *i < chars.len() {
        match chars[*i] {
            '\\' if *i + 1 < chars.len() => {
                match chars[*i + 1] {
                    '`' => name.push('`'),
                    '\\' => name.push('\\'),
                    other => {
                        name.push('\\');
                        name.push(other);
                    }
                }
                *i += 2;
            }
            '`' => {
                *i += 1;
                return Ok(name);
            }
            c => {
                name.push(c);
                *i += 1;
            }
        }
    }
    Err(TagError::parse(format!(
        "unterminated backtick quote in path `{}`",
        whole
    )))
}

/// Read a balanced `[...]` group; `i` sits on the opening bracket. Returns the
/// interior text.
fn read_bracketed(chars: &[char], i: &mut usize, whole: &str) -> Result<String> {
    debug_assert_eq!(chars[*i], '[');
    let mut depth = 0usize;
    let start = *i + 1;
    while *i < chars.len() {
        match chars[*i] {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    let inner: String = chars[start..*i].iter().collect();
                    *i += 1;
                    return Ok(inner);
                }
            }
            _ => {}
        }
        *i += 1;
    }
    Err(TagError::parse(format!(
        "unbalanced bracket in path `{}`",
        whole
    )))
}

/// Parse a pipe-delimited union type expression.
pub fn parse_type(input: &str, file_scope: &DocPath) -> Result<Vec<Valtype>> {
    let mut arms = Vec::new();
    for arm in split_union(input.trim()) {
        let arm = arm.trim();
        if arm.is_empty() {
            continue;
        }
        arms.push(parse_arm(arm, file_scope)?);
    }
    if arms.is_empty() {
        return Err(TagError::parse(format!("empty type expression `{}`", input)));
    }
    Ok(arms)
}

/// Split on `|` at bracket depth zero, respecting backtick quoting.
fn split_union(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quoted = false;
    let mut current = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if quoted => {
                current.push(c);
                if let Some(n) = chars.next() {
                    current.push(n);
                }
                continue;
            }
            '`' => quoted = !quoted,
            '<' | '[' if !quoted => depth += 1,
            '>' | ']' if !quoted => depth -= 1,
            '|' if !quoted && depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

fn parse_arm(arm: &str, file_scope: &DocPath) -> Result<Valtype> {
    let mut rest = arm;
    let mut is_pointer = false;
    let mut is_array = false;
    let mut generics = Vec::new();

    if let Some(stripped) = rest.strip_suffix('*') {
        is_pointer = true;
        rest = stripped.trim_end();
    }

    if let Some(stripped) = rest.strip_suffix("[]") {
        is_array = true;
        rest = stripped.trim_end();
    } else if rest.ends_with('>') || rest.ends_with(']') {
        let (open, close) = if rest.ends_with('>') {
            ('<', '>')
        } else {
            ('[', ']')
        };
        if let Some(start) = find_generic_open(rest, open, close) {
            let inner = &rest[start + 1..rest.len() - 1];
            generics = parse_generic_args(inner, file_scope)?;
            rest = rest[..start].trim_end();
        }
    }

    let path = parse_path(rest, file_scope, None)?;
    Ok(Valtype {
        name: path.flatten(),
        path,
        is_pointer,
        is_array,
        generics,
    })
}

/// Byte offset of the opening bracket of a trailing generic list, if the
/// final character closes one.
fn find_generic_open(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0i32;
    for (idx, c) in s.char_indices().rev() {
        if c == close {
            depth += 1;
        } else if c == open {
            depth -= 1;
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

fn parse_generic_args(inner: &str, file_scope: &DocPath) -> Result<Vec<Generic>> {
    let mut args = Vec::new();
    for raw in inner.split(|c: char| c == ',' || c.is_whitespace()) {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let path = parse_path(raw, file_scope, None)?;
        args.push(Generic {
            name: path.flatten(),
            path,
        });
    }
    Ok(args)
}
