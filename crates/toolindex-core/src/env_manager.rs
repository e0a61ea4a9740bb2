//! Per-source environment preparation (§4.2): materializing a remote source on
//! disk and making sure its dependencies are installed before extraction ever
//! touches it.
//!
//! Grounded on this family's content-addressed environment-cache pattern (a
//! write guard keyed by a hash of the dependency manifest, short-circuiting
//! reinstall when nothing changed) and on `agentic-tools-utils`'s HTTP status
//! classifier, whose shape [`classify_non_success`] below follows when
//! interpreting the remote-metadata oracle's response.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::IndexError;
use crate::manifest::Manifest;
use crate::source::RemoteId;

/// A source tree ready for extraction: dependencies installed, on disk, with
/// its manifest already loaded.
#[derive(Debug, Clone)]
pub struct PreparedSource {
    pub root: PathBuf,
    pub manifest: Manifest,
    /// This source's declared env vars (§4.2): the *only* variables any
    /// subprocess spawned against this source — dependency install,
    /// extraction, invocation — sees. Host variables never leak in.
    pub env_vars: HashMap<String, String>,
}

/// Priority-ordered recognition of a source's dependency declaration.
/// `pyproject.toml` wins over `setup.py`, which wins over `requirements.txt` —
/// mirroring the original implementation's `venv_utils.dependency_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DependencyConfig {
    PyProject(PathBuf),
    SetupPy(PathBuf),
    Requirements(PathBuf),
}

impl DependencyConfig {
    fn path(&self) -> &Path {
        match self {
            DependencyConfig::PyProject(p) => p,
            DependencyConfig::SetupPy(p) => p,
            DependencyConfig::Requirements(p) => p,
        }
    }

    fn install_args(&self) -> Vec<String> {
        match self {
            DependencyConfig::PyProject(_) | DependencyConfig::SetupPy(_) => {
                vec!["install".into(), "-e".into(), ".".into()]
            }
            DependencyConfig::Requirements(p) => {
                vec!["install".into(), "-r".into(), p.display().to_string()]
            }
        }
    }
}

fn detect_dependency_config(root: &Path) -> Option<DependencyConfig> {
    let pyproject = root.join("pyproject.toml");
    if pyproject.is_file() {
        return Some(DependencyConfig::PyProject(pyproject));
    }
    let setup_py = root.join("setup.py");
    if setup_py.is_file() {
        return Some(DependencyConfig::SetupPy(setup_py));
    }
    let requirements = root.join("requirements.txt");
    if requirements.is_file() {
        return Some(DependencyConfig::Requirements(requirements));
    }
    None
}

/// Resolves a [`RemoteId`] to a clone URL. The default implementation always
/// defers to [`RemoteId::default_clone_url`]; callers with an internal index
/// of known remotes can supply their own.
pub trait RemoteMetadataOracle: Send + Sync {
    fn clone_url(&self, id: &RemoteId) -> Option<String> {
        let _ = id;
        None
    }
}

struct DefaultOracle;
impl RemoteMetadataOracle for DefaultOracle {}

/// Looks a remote id up against an internal registry before falling back to
/// GitHub, for deployments that mirror or rehost tool sources elsewhere.
/// Expects `GET {registry_url}/{owner}/{name}` to return `{"clone_url": "..."}`
/// on success; any non-success status, or a request that fails outright, is
/// treated as "the registry doesn't know this one" rather than a hard error —
/// the caller still has the GitHub default to fall back to.
pub struct HttpMetadataOracle {
    client: reqwest::blocking::Client,
    registry_url: String,
}

impl HttpMetadataOracle {
    pub fn new(registry_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            registry_url: registry_url.into(),
        }
    }
}

impl RemoteMetadataOracle for HttpMetadataOracle {
    fn clone_url(&self, id: &RemoteId) -> Option<String> {
        let url = format!("{}/{}/{}", self.registry_url, id.owner, id.name);
        let response = match self.client.get(&url).send() {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(source = %id.id(), error = %e, "metadata oracle request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(
                source = %id.id(),
                status = %response.status(),
                reason = classify_non_success(response.status()),
                "metadata oracle has no entry for this source"
            );
            return None;
        }

        #[derive(serde::Deserialize)]
        struct Entry {
            clone_url: String,
        }
        response.json::<Entry>().ok().map(|e| e.clone_url)
    }
}

fn classify_non_success(status: reqwest::StatusCode) -> &'static str {
    match status {
        s if s == reqwest::StatusCode::NOT_FOUND => "not found",
        s if s.is_client_error() => "client error",
        s if s.is_server_error() => "server error",
        _ => "unexpected status",
    }
}

pub struct EnvManager {
    cache_root: PathBuf,
    oracle: Arc<dyn RemoteMetadataOracle>,
}

impl EnvManager {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            oracle: Arc::new(DefaultOracle),
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn RemoteMetadataOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Directory a remote source is cloned into, stable across runs so a
    /// previously prepared clone can be reused.
    fn remote_cache_dir(&self, id: &RemoteId) -> PathBuf {
        let mut slug = format!("{}__{}", id.owner, id.name);
        if let Some(rev) = &id.revision {
            slug.push_str("__");
            slug.push_str(rev);
        }
        self.cache_root.join(slug)
    }

    /// Clone (or reuse an existing clone of) a remote source, then ensure its
    /// dependencies are installed.
    #[tracing::instrument(skip(self, reset_cache, env_vars), fields(source = %id.id()))]
    pub fn prepare_remote(
        &self,
        id: &RemoteId,
        reset_cache: bool,
        env_vars: HashMap<String, String>,
    ) -> Result<PreparedSource, IndexError> {
        let dest = self.remote_cache_dir(id);
        if reset_cache && dest.exists() {
            std::fs::remove_dir_all(&dest).map_err(|e| {
                IndexError::environment(id.id(), "rm -rf <cache>", format!("could not clear cache: {e}"))
            })?;
        }

        if !dest.exists() {
            let url = self
                .oracle
                .clone_url(id)
                .unwrap_or_else(|| id.default_clone_url());
            self.clone_repo(id, &url, &dest)?;
        }

        self.ensure_dependencies(&id.id(), &dest, &env_vars)?;
        let manifest = Manifest::load(&dest)?;
        Ok(PreparedSource {
            root: dest,
            manifest,
            env_vars,
        })
    }

    /// A local folder source: create (or reuse) its environment if requested,
    /// otherwise use it exactly as it sits on disk.
    #[tracing::instrument(skip(self, env_vars), fields(path = %path.display()))]
    pub fn prepare_local(
        &self,
        path: &Path,
        create_env: bool,
        env_vars: HashMap<String, String>,
    ) -> Result<PreparedSource, IndexError> {
        if create_env {
            self.ensure_dependencies(&path.display().to_string(), path, &env_vars)?;
        }
        let manifest = Manifest::load(path)?;
        Ok(PreparedSource {
            root: path.to_path_buf(),
            manifest,
            env_vars,
        })
    }

    fn clone_repo(&self, id: &RemoteId, url: &str, dest: &Path) -> Result<(), IndexError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                IndexError::environment(id.id(), "mkdir", format!("could not create cache root: {e}"))
            })?;
        }

        let repo = git2::Repository::clone(url, dest)
            .map_err(|e| IndexError::environment(id.id(), format!("git clone {url}"), e.to_string()))?;

        if let Some(rev) = &id.revision {
            let object = repo
                .revparse_single(rev)
                .map_err(|e| IndexError::environment(id.id(), format!("git checkout {rev}"), e.to_string()))?;
            repo.checkout_tree(&object, None)
                .map_err(|e| IndexError::environment(id.id(), format!("git checkout {rev}"), e.to_string()))?;
            repo.set_head_detached(object.id())
                .map_err(|e| IndexError::environment(id.id(), format!("git checkout {rev}"), e.to_string()))?;
        }

        Ok(())
    }

    /// Install dependencies for `root` if its dependency file has changed
    /// since the last recorded hash (§6: content-addressed, no in-memory
    /// "already checked" shortcut — this reads the hash file fresh every
    /// call).
    fn ensure_dependencies(
        &self,
        source_id: &str,
        root: &Path,
        env_vars: &HashMap<String, String>,
    ) -> Result<(), IndexError> {
        let Some(config) = detect_dependency_config(root) else {
            // No recognized dependency file: nothing to install.
            return Ok(());
        };

        let hash_path = Manifest::hash_file_path(root);
        let current_hash = hash_file(config.path())
            .map_err(|e| IndexError::environment(source_id, "hash dependency file", e.to_string()))?;
        let stored_hash = std::fs::read_to_string(&hash_path).ok();

        if stored_hash.as_deref() == Some(current_hash.as_str()) {
            return Ok(());
        }

        let args = config.install_args();
        let status = Command::new("pip")
            .args(&args)
            .current_dir(root)
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .envs(env_vars)
            .status()
            .map_err(|e| {
                IndexError::environment(source_id, format!("pip {}", args.join(" ")), e.to_string())
            })?;

        if !status.success() {
            return Err(IndexError::environment(
                source_id,
                format!("pip {}", args.join(" ")),
                format!("exited with {status}"),
            ));
        }

        std::fs::write(&hash_path, &current_hash).map_err(|e| {
            IndexError::environment(source_id, "write dependency hash", e.to_string())
        })?;
        Ok(())
    }
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
