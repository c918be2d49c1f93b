#![forbid(unsafe_code)]

//! # tagtree
//!
//! Tag-comment documentation extraction: parses `@tag` declaration blocks
//! out of source files, merges them into a single entity tree, resolves
//! inheritance and relative cross-links, and emits a hierarchical JSON
//! document.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tagtree::{Config, Indexer};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let mut indexer = Indexer::new(config.clone());
//!     indexer.run()?;
//!
//!     if !indexer.diagnostics().has_errors() {
//!         tagtree::output::write_document(indexer.tree(), &config.output)?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod index;
pub mod output;
pub mod parse;
pub mod path;
pub mod report;
pub mod tag;
pub mod tree;

pub use config::Config;
pub use entity::{DisplayOptions, Entity, FinalView, Submission};
pub use error::{Result, TagError};
pub use index::Indexer;
pub use parse::{parse_file, ParseOutcome};
pub use path::{parse_path, parse_type, Delimiter, DocPath, Segment, Valtype};
pub use report::Diagnostics;
pub use tree::{Tree, DEAD_LINK};

/// Library version, shared with the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
