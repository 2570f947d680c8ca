//! Local-disk backend settings

use serde::{Deserialize, Serialize};

fn default_expand_environment_variables() -> bool {
    true
}

/// Local-disk configuration (YAML format)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalConfig {
    /// Every path is resolved below this directory
    pub base_directory: String,
    /// Permit `..` to leave the base directory (default: false)
    #[serde(default)]
    pub allow_base_directory_escape: bool,
    /// Expand `$VAR` / `${VAR}` in the base directory and in paths (default: true)
    #[serde(default = "default_expand_environment_variables")]
    pub expand_environment_variables: bool,
}

impl LocalConfig {
    pub fn new(base_directory: impl Into<String>) -> Self {
        Self {
            base_directory: base_directory.into(),
            allow_base_directory_escape: false,
            expand_environment_variables: true,
        }
    }
}
