//! Error taxonomy for the tagtree pipeline.
//!
//! `InvalidPath` and `NotFound` come out of tree lookups; `RedefinitionConflict`
//! out of entity merging; `Parse` aborts the current file only. Filesystem
//! errors during output are fatal to the whole run.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the parser, entity tree, and output driver.
#[derive(Debug, Error)]
pub enum TagError {
    /// An empty or malformed path was handed to a tree lookup.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A strict resolve failed because some segment is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A merge tried to overwrite an already-set scalar with an incompatible value.
    #[error("redefinition conflict at {path}: {field} is already `{existing}`, rejected `{incoming}`")]
    RedefinitionConflict {
        path: String,
        field: &'static str,
        existing: String,
        incoming: String,
    },

    /// Malformed tag, path, or type syntax inside one declaration.
    #[error("parse error{}: {message}", file_suffix(.file))]
    Parse {
        file: Option<PathBuf>,
        message: String,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TagError {
    pub fn parse(message: impl Into<String>) -> Self {
        TagError::Parse {
            file: None,
            message: message.into(),
        }
    }

    /// Attach a file path to a parse error that bubbled up without one.
    pub fn in_file(self, file: impl Into<PathBuf>) -> Self {
        match self {
            TagError::Parse { file: None, message } => TagError::Parse {
                file: Some(file.into()),
                message,
            },
            other => other,
        }
    }
}

fn file_suffix(file: &Option<PathBuf>) -> String {
    match file {
        Some(p) => format!(" in {}", p.display()),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, TagError>;
