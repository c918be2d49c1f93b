//! Run-level diagnostics.
//!
//! Structural errors block output; warnings do not. Both are aggregated here
//! so the driver can report them once at the end of the run instead of
//! scattering them through the log.

use std::path::PathBuf;

use serde::Serialize;

/// One collected error or warning.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Aggregated diagnostics for one run. Threaded explicitly through parsing,
/// merging, and finalize instead of living in ambient state.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.errors.push(Diagnostic {
            message,
            file: None,
        });
    }

    pub fn error_in(&mut self, file: impl Into<PathBuf>, message: impl Into<String>) {
        let message = message.into();
        let file = file.into();
        tracing::error!(file = %file.display(), "{}", message);
        self.errors.push(Diagnostic {
            message,
            file: Some(file),
        });
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(Diagnostic {
            message,
            file: None,
        });
    }

    pub fn warning_in(&mut self, file: impl Into<PathBuf>, message: impl Into<String>) {
        let message = message.into();
        let file = file.into();
        tracing::warn!(file = %file.display(), "{}", message);
        self.warnings.push(Diagnostic {
            message,
            file: Some(file),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }
}
