//! Run configuration: which files to read, where output goes, and which
//! visibility switches apply at finalize time.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::entity::DisplayOptions;

fn default_include() -> Vec<String> {
    vec!["**/*.coffee".to_string(), "**/*.js".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/.git/**".to_string(),
    ]
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn is_default_root(p: &std::path::Path) -> bool {
    p == std::path::Path::new(".")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// File patterns to include (glob syntax, relative to root)
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// File patterns to exclude (glob syntax)
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Project root directory
    #[serde(default = "default_root", skip_serializing_if = "is_default_root")]
    pub root: PathBuf,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Visibility switches applied when finalizing the tree
    #[serde(default)]
    pub display: DisplayOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: default_exclude(),
            root: default_root(),
            output: OutputConfig::default(),
            display: DisplayOptions::default(),
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from("doc.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination for the aggregated JSON document
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Pretty-print the JSON output
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_pretty() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            pretty: default_pretty(),
        }
    }
}

impl Config {
    /// Load config from a JSON file.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save config to a file.
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
