// Game Domain Model
// Owned by the version/installation collaborators; the core only references them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An installed game build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameVersion {
    /// Version label (e.g. "1.19.8")
    pub version: String,
    /// Directory holding the game executable
    pub path: PathBuf,
}

impl GameVersion {
    pub fn new(version: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            version: version.into(),
            path: path.into(),
        }
    }
}

/// A game profile: data directory plus launch parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    pub id: String,
    /// Data directory passed to the game as `--dataPath`
    pub path: PathBuf,
    /// Extra launch parameters
    #[serde(default)]
    pub start_params: String,
}

impl Installation {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            start_params: String::new(),
        }
    }

    pub fn with_start_params(mut self, params: impl Into<String>) -> Self {
        self.start_params = params.into();
        self
    }
}

/// Single-flight key: one active launch per (version, installation) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LaunchKey {
    pub version: String,
    pub installation_id: String,
}

impl LaunchKey {
    pub fn new(version: &GameVersion, installation: &Installation) -> Self {
        Self {
            version: version.version.clone(),
            installation_id: installation.id.clone(),
        }
    }
}

impl std::fmt::Display for LaunchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.version, self.installation_id)
    }
}
