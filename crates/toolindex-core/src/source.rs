//! Tool-source resolver (§4.1): classifies each entry of the user's `tools`
//! list into one of {in-process callable, local folder, remote repo reference}.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::IndexError;
use crate::inline::ErasedInlineTool;

/// Grammar for a remote source id: `<owner>/<name>[:<rev>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteId {
    pub owner: String,
    pub name: String,
    pub revision: Option<String>,
}

impl RemoteId {
    /// `<owner>/<name>`, without the revision suffix — this is the `source_id`
    /// used for cache-directory naming and as the key into the per-source env
    /// var map.
    pub fn id(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn default_clone_url(&self) -> String {
        format!("https://github.com/{}/{}.git", self.owner, self.name)
    }

    /// Parse `owner/name[:rev]`. Returns `None` if the string doesn't contain
    /// exactly one `/` before an optional `:rev` suffix.
    pub fn parse(raw: &str) -> Option<RemoteId> {
        let (path, revision) = match raw.split_once(':') {
            Some((p, r)) => (p, Some(r.to_string())),
            None => (raw, None),
        };
        let mut parts = path.splitn(2, '/');
        let owner = parts.next()?;
        let name = parts.next()?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(RemoteId {
            owner: owner.to_string(),
            name: name.to_string(),
            revision,
        })
    }
}

/// Per-source environment variables, keyed by source id (`owner/name` for
/// remote sources, the source path for local sources).
pub type EnvVarMap = HashMap<String, HashMap<String, String>>;

/// One entry of the user-declared `tools` list, already classified.
pub enum ToolSource {
    Inline(Arc<dyn ErasedInlineTool>),
    Local {
        path: PathBuf,
        create_env: bool,
        env_vars: HashMap<String, String>,
    },
    Remote {
        id: RemoteId,
        env_vars: HashMap<String, String>,
    },
}

impl ToolSource {
    /// Classify a local-folder or remote-id string entry.
    ///
    /// Callers that already hold an in-process callable should construct
    /// [`ToolSource::Inline`] directly rather than going through this path.
    pub fn classify_path_or_id(
        entry: &str,
        env_var: &EnvVarMap,
    ) -> Result<ToolSource, IndexError> {
        let path = Path::new(entry);
        if path.is_dir() {
            let env_vars = env_var.get(entry).cloned().unwrap_or_default();
            return Ok(ToolSource::Local {
                path: path.to_path_buf(),
                create_env: true,
                env_vars,
            });
        }

        let remote_id = RemoteId::parse(entry)
            .ok_or_else(|| IndexError::resolution(entry, "not a local directory and not a valid `owner/name[:rev]` remote id"))?;
        let env_vars = env_var.get(&remote_id.id()).cloned().unwrap_or_default();
        Ok(ToolSource::Remote {
            id: remote_id,
            env_vars,
        })
    }

    pub fn source_id(&self) -> String {
        match self {
            ToolSource::Inline(tool) => tool.name().to_string(),
            ToolSource::Local { path, .. } => path.display().to_string(),
            ToolSource::Remote { id, .. } => id.id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_name() {
        let id = RemoteId::parse("acme/mock-tools").unwrap();
        assert_eq!(id.owner, "acme");
        assert_eq!(id.name, "mock-tools");
        assert_eq!(id.revision, None);
        assert_eq!(id.id(), "acme/mock-tools");
    }

    #[test]
    fn parses_owner_name_with_revision() {
        let id = RemoteId::parse("acme/mock-tools:v2").unwrap();
        assert_eq!(id.revision.as_deref(), Some("v2"));
        assert_eq!(id.id(), "acme/mock-tools");
    }

    #[test]
    fn default_clone_url_is_github() {
        let id = RemoteId::parse("acme/mock-tools").unwrap();
        assert_eq!(
            id.default_clone_url(),
            "https://github.com/acme/mock-tools.git"
        );
    }

    #[test]
    fn rejects_entry_without_slash() {
        assert!(RemoteId::parse("not-a-remote-id").is_none());
    }

    #[test]
    fn rejects_entry_with_trailing_slash() {
        assert!(RemoteId::parse("acme/").is_none());
    }

    #[test]
    fn classify_nonexistent_path_falls_through_to_remote() {
        let result = ToolSource::classify_path_or_id("acme/mock-tools", &EnvVarMap::new());
        assert!(matches!(result, Ok(ToolSource::Remote { .. })));
    }

    #[test]
    fn classify_unresolvable_entry_is_a_resolution_error() {
        let result = ToolSource::classify_path_or_id("definitely not valid", &EnvVarMap::new());
        assert!(matches!(result, Err(IndexError::Resolution { .. })));
    }

    #[test]
    fn classify_existing_directory_is_local() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().to_str().unwrap();
        let result = ToolSource::classify_path_or_id(entry, &EnvVarMap::new()).unwrap();
        assert!(matches!(result, ToolSource::Local { .. }));
    }
}
