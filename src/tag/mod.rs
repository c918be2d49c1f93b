//! Tag grammar.
//!
//! Regex-driven scanner for declaration blocks inside source text. An outer
//! tag is a comment opener (`/**` or `###*`) followed by a
//! `@ctype[/valtype] path` header line; its body runs to the matching closer
//! (`*/` / `###`). Inside a body, line-leading `@kind [path]` lines start
//! nested declarations, and `@modifier [rest]` lines are consumed greedily
//! from the front of each fragment before the remainder becomes prose.
//!
//! An unrecognized kind token is direct-to-type shorthand: the token becomes
//! the value type and the declaration is reclassified as a property, or a
//! member when the path's last segment uses the `#` delimiter. Shorthand
//! detection happens before delimiter defaulting, so the undefaulted path is
//! what gets inspected.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, TagError};
use crate::path::{parse_path, Delimiter, DocPath};

/// Declaration kinds recognized by the scanner. Outer blocks accept only the
/// first five; bodies accept the whole vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Property,
    Member,
    Spare,
    Module,
    Class,
    // Inner-only kinds
    Submodule,
    Constructor,
    Argument,
    Returns,
    Callback,
    Event,
    Throws,
    Args,
    Kwargs,
    Kwarg,
    Signature,
}

impl DeclKind {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "property" => Some(DeclKind::Property),
            "member" => Some(DeclKind::Member),
            "spare" => Some(DeclKind::Spare),
            "module" => Some(DeclKind::Module),
            "class" => Some(DeclKind::Class),
            "submodule" => Some(DeclKind::Submodule),
            "constructor" => Some(DeclKind::Constructor),
            "argument" => Some(DeclKind::Argument),
            "returns" => Some(DeclKind::Returns),
            "callback" => Some(DeclKind::Callback),
            "event" => Some(DeclKind::Event),
            "throws" => Some(DeclKind::Throws),
            "args" => Some(DeclKind::Args),
            "kwargs" => Some(DeclKind::Kwargs),
            "kwarg" => Some(DeclKind::Kwarg),
            "signature" => Some(DeclKind::Signature),
            _ => None,
        }
    }

    /// Kinds that scope against the running argument context instead of the
    /// file scope.
    pub fn is_argument_family(self) -> bool {
        matches!(
            self,
            DeclKind::Argument
                | DeclKind::Returns
                | DeclKind::Callback
                | DeclKind::Args
                | DeclKind::Kwargs
                | DeclKind::Kwarg
                | DeclKind::Throws
        )
    }
}

/// Modifier kinds, recognized by the line-leading `@kind [rest]` grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModifierKind {
    /// `@super` - inheritance
    Super,
    /// `@implements` - interface implementation
    Implements,
    /// `@api` - public-api flag, propagated to ancestors
    Api,
    Private,
    Internal,
    Abstract,
    Chainable,
    /// `@alias` - non-owning redirect to another entity
    Alias,
    /// `@patches` - content duplication onto target entities
    Patches,
    /// `@remote` - redirect links to an external address
    Remote,
    /// `@requires` - schedule another file for processing
    Requires,
    /// `@load` - same as `@requires`
    Load,
    /// `@root` - reset the file scope
    Root,
    /// `@default` - default value for a property/argument
    DefaultValue,
}

impl ModifierKind {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "super" => Some(ModifierKind::Super),
            "implements" => Some(ModifierKind::Implements),
            "api" => Some(ModifierKind::Api),
            "private" => Some(ModifierKind::Private),
            "internal" => Some(ModifierKind::Internal),
            "abstract" => Some(ModifierKind::Abstract),
            "chainable" => Some(ModifierKind::Chainable),
            "alias" => Some(ModifierKind::Alias),
            "patches" => Some(ModifierKind::Patches),
            "remote" => Some(ModifierKind::Remote),
            "requires" => Some(ModifierKind::Requires),
            "load" => Some(ModifierKind::Load),
            "root" => Some(ModifierKind::Root),
            "default" => Some(ModifierKind::DefaultValue),
            _ => None,
        }
    }

    /// Whether the trailing text of the modifier line is a path (as opposed
    /// to a free-form value or nothing).
    pub fn takes_path(self) -> bool {
        matches!(
            self,
            ModifierKind::Super
                | ModifierKind::Implements
                | ModifierKind::Alias
                | ModifierKind::Patches
                | ModifierKind::Root
        )
    }
}

/// Parsed `@ctype[/valtype] path` header.
#[derive(Debug, Clone)]
pub struct TagHeader {
    pub kind: DeclKind,
    /// Raw value-type expression from the `/valtype` header slot, or the
    /// reinterpreted token when direct-to-type shorthand applied.
    pub valtype: Option<String>,
    pub path: Option<String>,
}

/// An outer declaration block located in source text.
#[derive(Debug)]
pub struct OuterTag<'a> {
    pub header: TagHeader,
    pub body: &'a str,
    /// Byte offset just past the closing marker; scanning resumes here.
    pub resume: usize,
}

/// A nested declaration line located inside a body.
#[derive(Debug)]
pub struct InnerTag {
    pub header: TagHeader,
    /// Byte offset of the header line within the scanned body.
    pub start: usize,
    /// Byte offset just past the header line's terminating newline.
    pub body_start: usize,
}

/// A leading `@modifier [rest]` line.
#[derive(Debug, Clone)]
pub struct ModifierLine {
    pub kind: ModifierKind,
    pub rest: Option<String>,
}

// Opener, then the header line. The path token is mandatory for outer tags.
static OUTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(/\*\*|###\*)[ \t]*\r?\n?[ \t]*@([A-Za-z_$][\w$.-]*)(?:/(\S+))?[ \t]+(\S+)[ \t]*\r?\n").unwrap()
});

// Any line-leading tag inside a body. The payload is the rest of the line.
static INNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*@([A-Za-z_$][\w$.-]*)(?:/(\S+))?(?:[ \t]+([^\r\n]*?))?[ \t]*\r?$").unwrap()
});

// Signature tags carry a parenthesized inline argument list which may contain
// whitespace, so they get their own pattern.
static SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*@signature[ \t]*(\([^\r\n]*\))[ \t]*\r?$").unwrap()
});

/// Locate the next outer declaration block at or after `from`.
pub fn next_outer(source: &str, from: usize) -> Result<Option<OuterTag<'_>>> {
    let caps = match OUTER.captures_at(source, from) {
        Some(c) => c,
        None => return Ok(None),
    };
    let opener = caps.get(1).unwrap().as_str();
    let token = caps.get(2).unwrap().as_str();
    let valtype = caps.get(3).map(|m| m.as_str().to_string());
    let path = caps.get(4).unwrap().as_str().to_string();
    let body_start = caps.get(0).unwrap().end();

    let closer = if opener == "/**" { "*/" } else { "###" };
    let close_at = source[body_start..]
        .find(closer)
        .ok_or_else(|| TagError::parse(format!("unterminated `{}` block for @{}", opener, token)))?;
    let body = &source[body_start..body_start + close_at];
    let resume = body_start + close_at + closer.len();

    let header = classify(token, valtype, Some(path))?;
    Ok(Some(OuterTag {
        header,
        body,
        resume,
    }))
}

/// Locate the next nested declaration line inside `body` at or after `from`.
///
/// Pending declaration and signature matches at the same scan position are
/// tie-broken by start offset, preferring the declaration match on an exact
/// tie.
pub fn next_inner(body: &str, from: usize) -> Result<Option<InnerTag>> {
    let sig = SIGNATURE.captures_at(body, from);
    let decl = next_decl_line(body, from)?;

    match (decl, sig) {
        (Some(d), Some(s)) if s.get(0).unwrap().start() < d.start => Ok(Some(signature_tag(&s))),
        (Some(d), _) => Ok(Some(d)),
        (None, Some(s)) => Ok(Some(signature_tag(&s))),
        (None, None) => Ok(None),
    }
}

fn signature_tag(caps: &regex::Captures<'_>) -> InnerTag {
    let whole = caps.get(0).unwrap();
    InnerTag {
        header: TagHeader {
            kind: DeclKind::Signature,
            valtype: None,
            path: Some(caps.get(1).unwrap().as_str().to_string()),
        },
        start: whole.start(),
        body_start: whole.end(),
    }
}

/// Scan forward for the next `@token` line that classifies as a declaration.
/// Modifier-vocabulary tokens and unknown tokens without a payload are prose.
fn next_decl_line(body: &str, mut from: usize) -> Result<Option<InnerTag>> {
    while let Some(caps) = INNER.captures_at(body, from) {
        let whole = caps.get(0).unwrap();
        let token = caps.get(1).unwrap().as_str();
        let valtype = caps.get(2).map(|m| m.as_str().to_string());
        let payload = caps
            .get(3)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty());

        let known_decl = DeclKind::from_token(token).is_some();
        let is_modifier = ModifierKind::from_token(token).is_some();
        // The signature pattern claims its own lines.
        if token != "signature" && (known_decl || (!is_modifier && payload.is_some())) {
            let header = classify(token, valtype, payload)?;
            return Ok(Some(InnerTag {
                header,
                start: whole.start(),
                body_start: body_end_of_line(body, whole.end()),
            }));
        }
        from = body_end_of_line(body, whole.end());
        if from >= body.len() {
            break;
        }
    }
    Ok(None)
}

fn body_end_of_line(body: &str, line_end: usize) -> usize {
    // The (?m)$ anchor stops before the newline; step past it.
    match body[line_end..].find('\n') {
        Some(0) => line_end + 1,
        _ => line_end,
    }
}

/// Resolve a kind token, applying direct-to-type shorthand for tokens outside
/// the fixed vocabulary.
fn classify(token: &str, valtype: Option<String>, path: Option<String>) -> Result<TagHeader> {
    if let Some(kind) = DeclKind::from_token(token) {
        return Ok(TagHeader {
            kind,
            valtype,
            path,
        });
    }

    // Shorthand: the token itself is the value type. Inspect the raw path
    // before any delimiter defaulting to pick property vs member.
    let uses_member_delim = path
        .as_deref()
        .and_then(|p| parse_path(p, &DocPath::root(), None).ok())
        .and_then(|p| p.last().map(|s| s.delim == Some(Delimiter::Member)))
        .unwrap_or(false);
    let kind = if uses_member_delim {
        DeclKind::Member
    } else {
        DeclKind::Property
    };
    Ok(TagHeader {
        kind,
        valtype: Some(token.to_string()),
        path,
    })
}

/// Consume leading modifier lines from the front of a body. Returns the
/// modifiers in order and the remaining text.
pub fn consume_modifiers(body: &str) -> (Vec<ModifierLine>, &str) {
    let mut modifiers = Vec::new();
    let mut rest = body;

    loop {
        let line_end = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
        let line = rest[..line_end].trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            if line_end == rest.len() {
                rest = &rest[line_end..];
                break;
            }
            rest = &rest[line_end..];
            continue;
        }
        match parse_modifier_line(line) {
            Some(m) => {
                modifiers.push(m);
                rest = &rest[line_end..];
            }
            None => break,
        }
    }
    (modifiers, rest)
}

fn parse_modifier_line(line: &str) -> Option<ModifierLine> {
    let trimmed = line.trim();
    let token = trimmed.strip_prefix('@')?;
    let (word, tail) = match token.find(char::is_whitespace) {
        Some(i) => (&token[..i], token[i..].trim()),
        None => (token, ""),
    };
    let kind = ModifierKind::from_token(word)?;
    let rest = if tail.is_empty() {
        None
    } else {
        Some(tail.to_string())
    };
    Some(ModifierLine { kind, rest })
}
