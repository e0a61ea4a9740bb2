//! Parsing of the per-source `tools.toml` manifest.
//!
//! The manifest is the authoritative enumeration of tools a source exposes —
//! there is no filesystem discovery. A source with no manifest, or a manifest
//! missing `index.tools`, is invalid.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::IndexError;

pub const MANIFEST_FILENAME: &str = "tools.toml";

#[derive(Debug, Deserialize)]
struct RawManifest {
    index: RawIndexSection,
}

#[derive(Debug, Deserialize)]
struct RawIndexSection {
    tools: Vec<String>,
}

/// A parsed `tools.toml`: an ordered list of dotted `<module>.<symbol>` paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub tools: Vec<String>,
}

impl Manifest {
    /// Load and parse the manifest at `<source_root>/tools.toml`.
    pub fn load(source_root: &Path) -> Result<Self, IndexError> {
        let path = source_root.join(MANIFEST_FILENAME);
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            IndexError::manifest(path.display(), format!("could not read manifest: {e}"))
        })?;
        Self::parse(&contents, &path)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, IndexError> {
        let raw: RawManifest = toml::from_str(contents)
            .map_err(|e| IndexError::manifest(path.display(), format!("invalid toml: {e}")))?;
        if raw.index.tools.is_empty() {
            return Err(IndexError::manifest(
                path.display(),
                "index.tools must declare at least one tool",
            ));
        }
        Ok(Manifest {
            tools: raw.index.tools,
        })
    }

    /// Path to the dependency-install hash file this manifest's source uses (§6).
    pub fn hash_file_path(source_root: &Path) -> PathBuf {
        source_root.join(".deps_hash")
    }
}
