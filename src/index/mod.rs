//! Run driver: file discovery, sequential parsing, include handling.
//!
//! Files are processed in a deterministic (sorted) order, and the file
//! scope left behind by file N is the initial scope of file N+1. Included
//! files are processed immediately after their includer, each under the
//! scope that was active at the request site. A cache of resolved absolute
//! paths guarantees every file contributes at most once per run.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::Result;
use crate::parse::{parse_file, IncludeRequest};
use crate::path::DocPath;
use crate::report::Diagnostics;
use crate::tree::Tree;

pub struct Indexer {
    config: Config,
    tree: Tree,
    diagnostics: Diagnostics,
    /// Absolute paths already contributed, primary and included alike.
    processed: HashSet<PathBuf>,
}

impl Indexer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            tree: Tree::new(),
            diagnostics: Diagnostics::new(),
            processed: HashSet::new(),
        }
    }

    /// Parse every matching file under the configured root, then finalize
    /// the tree. Structural errors accumulate in the diagnostics instead of
    /// aborting the run.
    pub fn run(&mut self) -> Result<()> {
        let files = self.find_files()?;
        info!(count = files.len(), "processing source files");

        let mut scope = DocPath::root();
        for file in &files {
            scope = self.process_file(file, &scope);
        }

        let display = self.config.display.clone();
        let mut diag = std::mem::take(&mut self.diagnostics);
        self.tree.finalize(&display, &mut diag)?;
        self.diagnostics = diag;
        Ok(())
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Parse one file and submit its contribution. Returns the file scope to
    /// carry into the next file; a failed file leaves the scope unchanged.
    fn process_file(&mut self, path: &Path, scope: &DocPath) -> DocPath {
        let canonical = match path.canonicalize() {
            Ok(p) => p,
            Err(_) => path.to_path_buf(),
        };
        if !self.processed.insert(canonical) {
            debug!(file = %path.display(), "already processed, skipping");
            return scope.clone();
        }

        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(err) => {
                self.diagnostics
                    .error_in(path, format!("cannot read source file: {err}"));
                return scope.clone();
            }
        };

        debug!(file = %path.display(), "parsing");
        let outcome = match parse_file(&source, scope) {
            Ok(o) => o,
            Err(err) => {
                self.diagnostics
                    .error_in(path, err.to_string());
                return scope.clone();
            }
        };

        for (target, submission) in outcome.submissions {
            if let Err(err) = self.tree.submit(&target, submission, &mut self.diagnostics) {
                self.diagnostics.error_in(path, err.to_string());
            }
        }

        for include in outcome.includes {
            self.process_include(path, &include);
        }

        outcome.file_scope
    }

    /// An include resolves relative to the including file's directory. A
    /// missing include is a warning, not an error.
    fn process_include(&mut self, from: &Path, request: &IncludeRequest) {
        let base = from.parent().unwrap_or_else(|| Path::new("."));
        let target = base.join(&request.raw);
        if !target.is_file() {
            warn!(file = %target.display(), "included file not found");
            self.diagnostics
                .warning_in(from, format!("included file not found: {}", request.raw));
            return;
        }
        self.process_file(&target, &request.scope);
    }

    /// Deterministic file discovery: walk the root, match include/exclude
    /// globs against root-relative paths, sort the survivors.
    fn find_files(&self) -> Result<Vec<PathBuf>> {
        let root = &self.config.root;
        let include: Vec<Pattern> = self
            .config
            .include
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();
        let exclude: Vec<Pattern> = self
            .config
            .exclude
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();

        let match_opts = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };

        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let relative = e
                    .path()
                    .strip_prefix(root)
                    .unwrap_or(e.path())
                    .to_string_lossy()
                    .to_string();
                let included = include.is_empty()
                    || include.iter().any(|p| p.matches_with(&relative, match_opts));
                let excluded = exclude.iter().any(|p| p.matches_with(&relative, match_opts));
                if included && !excluded {
                    Some(e.path().to_path_buf())
                } else {
                    None
                }
            })
            .collect();
        files.sort();
        Ok(files)
    }
}
