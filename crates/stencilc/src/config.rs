//! `stencil.toml` loading.
//!
//! ```toml
//! [analysis]
//! max-passes = 20
//!
//! [files]
//! extensions = ["tmpl", "html"]
//! ```
//!
//! Every section and key is optional.

use std::path::Path;

use serde::Deserialize;
use stencil_typeck::AnalysisConfig;

/// Name of the configuration file looked up in a checked directory.
pub const CONFIG_FILE: &str = "stencil.toml";

/// Extensions treated as templates when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["tmpl", "gotmpl", "html", "tpl"];

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub files: FilesConfig,
}

/// The `[files]` section.
#[derive(Debug, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        FilesConfig {
            extensions: default_extensions(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

impl Config {
    /// Read and parse a configuration file.
    pub fn from_file(path: &Path) -> Result<Config, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_str(&content)
            .map_err(|e| format!("{}: {}", path.display(), e))
    }

    /// Parse configuration from a string.
    pub fn from_str(content: &str) -> Result<Config, String> {
        let config: Config =
            toml::from_str(content).map_err(|e| format!("Failed to parse config: {}", e))?;
        if config.files.extensions.is_empty() {
            return Err("[files] extensions must not be empty".to_string());
        }
        Ok(config)
    }

    /// Load `path` if given, else `stencil.toml` in `dir` if present, else
    /// the defaults.
    pub fn load(path: Option<&Path>, dir: Option<&Path>) -> Result<Config, String> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match dir.map(|dir| dir.join(CONFIG_FILE)) {
            Some(candidate) if candidate.is_file() => Self::from_file(&candidate),
            _ => Ok(Config::default()),
        }
    }
}
