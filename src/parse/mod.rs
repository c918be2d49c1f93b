//! Declaration parser.
//!
//! Walks one file's source text, locating outer tag blocks and splitting
//! their bodies at nested inner tags. Each fragment becomes one
//! [`Submission`] addressed by a [`DocPath`]. The parser owns the running
//! `fileScope` (replaced by module declarations and `@root`) and, inside a
//! body, the `argScope` that argument-family declarations attach to.
//!
//! File-inclusion modifiers never become submissions; they are collected on
//! a side channel together with the scope that was active when they were
//! seen, so the driver can process included files under the right scope.

use crate::entity::{Ctype, DocFragment, Modifier, SigArg, Submission};
use crate::error::Result;
use crate::path::{parse_path, parse_type, Delimiter, DocPath, Segment};
use crate::tag::{self, DeclKind, ModifierKind, TagHeader};

/// A file requested via `@requires`/`@load`, with the scope active at the
/// request site.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeRequest {
    pub raw: String,
    pub scope: DocPath,
}

/// Everything one file contributed: ordered submissions, include requests,
/// and the file scope left behind for the caller.
#[derive(Debug)]
pub struct ParseOutcome {
    pub submissions: Vec<(DocPath, Submission)>,
    pub includes: Vec<IncludeRequest>,
    pub file_scope: DocPath,
}

/// Parse one file's text under `initial_scope`. A parse error aborts this
/// file's whole contribution; the caller decides whether the run continues.
pub fn parse_file(source: &str, initial_scope: &DocPath) -> Result<ParseOutcome> {
    let mut parser = Parser {
        file_scope: initial_scope.clone(),
        submissions: Vec::new(),
        includes: Vec::new(),
    };
    let mut at = 0;
    while let Some(outer) = tag::next_outer(source, at)? {
        at = outer.resume;
        parser.declaration_block(outer.header, outer.body)?;
    }
    Ok(ParseOutcome {
        submissions: parser.submissions,
        includes: parser.includes,
        file_scope: parser.file_scope,
    })
}

/// The addressed remainder of a declaration header, waiting for its body
/// fragment.
struct PendingDecl {
    path: DocPath,
    ctype: Ctype,
    valtype_raw: Option<String>,
    sig_args: Option<Vec<SigArg>>,
}

/// Scope state while splitting one outer body.
struct BodyCtx {
    /// Path of the outer declaration that owns the body.
    decl_path: DocPath,
    /// Where argument-family declarations attach; callbacks advance it.
    arg_scope: DocPath,
    /// Whether a plain inner `@module` extends the file scope further.
    scope_extending: bool,
}

struct Parser {
    file_scope: DocPath,
    submissions: Vec<(DocPath, Submission)>,
    includes: Vec<IncludeRequest>,
}

impl Parser {
    fn declaration_block(&mut self, header: TagHeader, body: &str) -> Result<()> {
        let mut ctx = BodyCtx {
            decl_path: self.file_scope.clone(),
            arg_scope: self.file_scope.clone(),
            scope_extending: false,
        };
        let is_module = header.kind == DeclKind::Module;
        let mut pending = self.address(header, &mut ctx, true)?;
        ctx.decl_path = pending.path.clone();
        ctx.arg_scope = pending.path.clone();
        ctx.scope_extending = is_module;

        let mut cursor = 0;
        loop {
            let inner = tag::next_inner(body, cursor)?;
            let fragment_end = inner.as_ref().map(|t| t.start).unwrap_or(body.len());
            self.submit_fragment(pending, &body[cursor..fragment_end])?;
            match inner {
                None => return Ok(()),
                Some(t) => {
                    cursor = t.body_start;
                    let kind = t.header.kind;
                    pending = self.address(t.header, &mut ctx, false)?;
                    // A nested plain declaration becomes the current
                    // declaration: later argument-family tags attach to it.
                    if !kind.is_argument_family() && kind != DeclKind::Signature {
                        ctx.decl_path = pending.path.clone();
                        ctx.arg_scope = pending.path.clone();
                    }
                }
            }
        }
    }

    /// Turn a tag header into an addressed pending declaration, applying the
    /// per-kind scope rules.
    fn address(
        &mut self,
        header: TagHeader,
        ctx: &mut BodyCtx,
        is_outer: bool,
    ) -> Result<PendingDecl> {
        let raw = header.path.as_deref().unwrap_or("");
        let pending = match header.kind {
            DeclKind::Property => PendingDecl {
                path: self.scoped(&self.file_scope.clone(), raw, Delimiter::Property)?,
                ctype: Ctype::Property,
                valtype_raw: header.valtype,
                sig_args: None,
            },
            DeclKind::Member => PendingDecl {
                path: self.scoped(&self.file_scope.clone(), raw, Delimiter::Member)?,
                ctype: Ctype::Member,
                valtype_raw: header.valtype,
                sig_args: None,
            },
            DeclKind::Spare => PendingDecl {
                path: self.scoped(&self.file_scope.clone(), raw, Delimiter::Spare)?,
                ctype: Ctype::Spare,
                valtype_raw: header.valtype,
                sig_args: None,
            },
            DeclKind::Class => PendingDecl {
                path: self.scoped(&self.file_scope.clone(), raw, Delimiter::Property)?,
                ctype: Ctype::Class,
                valtype_raw: header.valtype,
                sig_args: None,
            },
            DeclKind::Module => {
                let path = self.scoped(&self.file_scope.clone(), raw, Delimiter::Property)?;
                // An outer module replaces the file scope; an inner one only
                // extends it while the body is already extending scope.
                if is_outer || ctx.scope_extending {
                    self.file_scope = path.clone();
                }
                PendingDecl {
                    path,
                    ctype: Ctype::Module,
                    valtype_raw: header.valtype,
                    sig_args: None,
                }
            }
            // Normalized to module without the scope side effect.
            DeclKind::Submodule => PendingDecl {
                path: self.scoped(&self.file_scope.clone(), raw, Delimiter::Property)?,
                ctype: Ctype::Module,
                valtype_raw: header.valtype,
                sig_args: None,
            },
            DeclKind::Constructor => {
                let mut path = ctx.decl_path.clone();
                path.push(Segment::new(Some(Delimiter::Spare), "constructor"));
                PendingDecl {
                    path,
                    ctype: Ctype::Spare,
                    valtype_raw: header.valtype,
                    sig_args: None,
                }
            }
            DeclKind::Argument => PendingDecl {
                path: self.scoped(&ctx.arg_scope.clone(), raw, Delimiter::Argument)?,
                ctype: Ctype::Argument,
                valtype_raw: header.valtype,
                sig_args: None,
            },
            DeclKind::Args | DeclKind::Kwargs | DeclKind::Kwarg => PendingDecl {
                path: self.scoped(&ctx.arg_scope.clone(), raw, Delimiter::Argument)?,
                ctype: match header.kind {
                    DeclKind::Args => Ctype::Args,
                    DeclKind::Kwargs => Ctype::Kwargs,
                    _ => Ctype::Kwarg,
                },
                valtype_raw: header.valtype,
                sig_args: None,
            },
            DeclKind::Returns => {
                let path = self.scoped(&ctx.arg_scope.clone(), raw, Delimiter::Return)?;
                // A bare @returns closes the current argument context, but
                // only when there is context beneath the declaration to
                // close.
                if raw.trim().is_empty() && ctx.arg_scope.len() > ctx.decl_path.len() {
                    ctx.arg_scope.pop();
                }
                PendingDecl {
                    path,
                    ctype: Ctype::Return,
                    valtype_raw: header.valtype,
                    sig_args: None,
                }
            }
            DeclKind::Callback => {
                // Callbacks rebase from the declaration itself, then claim
                // the argument scope for everything that follows.
                let path = self.scoped(&ctx.decl_path.clone(), raw, Delimiter::Argument)?;
                ctx.arg_scope = path.clone();
                PendingDecl {
                    path,
                    ctype: Ctype::Callback,
                    valtype_raw: header.valtype,
                    sig_args: None,
                }
            }
            // Events belong to the declaration being documented, so a bare
            // `@event done` inside a class body lands under that class.
            DeclKind::Event => PendingDecl {
                path: self.scoped(&ctx.decl_path.clone(), raw, Delimiter::Member)?,
                ctype: Ctype::Event,
                valtype_raw: header.valtype,
                sig_args: None,
            },
            DeclKind::Throws => PendingDecl {
                path: self.scoped(&ctx.arg_scope.clone(), raw, Delimiter::Spare)?,
                ctype: Ctype::Throws,
                valtype_raw: header.valtype,
                sig_args: None,
            },
            DeclKind::Signature => PendingDecl {
                path: ctx.decl_path.clone(),
                ctype: Ctype::Property,
                valtype_raw: None,
                sig_args: Some(self.signature_args(raw)?),
            },
        };
        Ok(pending)
    }

    /// Resolve a raw path token against `base`. A lone `.` is already
    /// absolute (it names the file scope) and must not be joined again.
    fn scoped(&self, base: &DocPath, raw: &str, delim: Delimiter) -> Result<DocPath> {
        let parsed = parse_path(raw, &self.file_scope, Some(delim))?;
        if raw.trim() == "." {
            return Ok(parsed);
        }
        Ok(base.join(&parsed))
    }

    /// Parse a `(Type name, Type name)` inline signature payload.
    fn signature_args(&self, payload: &str) -> Result<Vec<SigArg>> {
        let inner = payload
            .trim()
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(payload)
            .trim();
        let mut args = Vec::new();
        if inner.is_empty() {
            return Ok(args);
        }
        for entry in inner.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (valtype, name) = match entry.rfind(char::is_whitespace) {
                Some(i) => {
                    let ty = entry[..i].trim();
                    let vt = parse_type(ty, &self.file_scope)?.into_iter().next();
                    (vt, entry[i..].trim())
                }
                None => (None, entry),
            };
            args.push(SigArg {
                name: name.to_string(),
                valtype,
            });
        }
        Ok(args)
    }

    /// Build and record the submission for one addressed fragment.
    fn submit_fragment(&mut self, pending: PendingDecl, fragment: &str) -> Result<()> {
        let (modifier_lines, prose) = tag::consume_modifiers(fragment);

        let mut sub = Submission::new(pending.ctype);
        for line in modifier_lines {
            self.apply_modifier(line.kind, line.rest.as_deref(), &mut sub)?;
        }
        if let Some(raw) = &pending.valtype_raw {
            sub.valtypes = parse_type(raw, &self.file_scope)?;
        }
        sub.sig_args = pending.sig_args;

        let text = prose.trim();
        if !text.is_empty() {
            sub.docs.push(DocFragment {
                text: text.to_string(),
                link_context: self.file_scope.clone(),
            });
        }
        self.submissions.push((pending.path, sub));
        Ok(())
    }

    fn apply_modifier(
        &mut self,
        kind: ModifierKind,
        rest: Option<&str>,
        sub: &mut Submission,
    ) -> Result<()> {
        match kind {
            ModifierKind::Requires | ModifierKind::Load => {
                if let Some(raw) = rest {
                    self.includes.push(IncludeRequest {
                        raw: raw.to_string(),
                        scope: self.file_scope.clone(),
                    });
                }
                Ok(())
            }
            ModifierKind::Root => {
                // Scope reset: the given path is absolute, empty clears it.
                self.file_scope = match rest {
                    Some(raw) => {
                        let parsed =
                            parse_path(raw, &DocPath::root(), Some(Delimiter::Property))?;
                        if parsed.len() == 1 && parsed.first().is_some_and(Segment::is_placeholder)
                        {
                            DocPath::root()
                        } else {
                            parsed
                        }
                    }
                    None => DocPath::root(),
                };
                Ok(())
            }
            kind if kind.takes_path() => {
                let path = match rest {
                    Some(raw) => {
                        Some(self.scoped(&self.file_scope.clone(), raw, Delimiter::Property)?)
                    }
                    None => None,
                };
                sub.modifiers.push(Modifier {
                    kind,
                    path,
                    value: None,
                });
                Ok(())
            }
            kind => {
                sub.modifiers.push(Modifier {
                    kind,
                    path: None,
                    value: rest.map(str::to_string),
                });
                Ok(())
            }
        }
    }
}
