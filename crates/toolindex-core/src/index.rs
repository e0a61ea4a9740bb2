//! The public façade (§4.8): builds an [`Index`] from a declared `tools` list
//! and dispatches calls by name, unique suffix, or parsed prose.
//!
//! Grounded on this family's `ToolRegistry`/`ToolRegistryBuilder`: a builder
//! that accumulates entries and fails fast on a duplicate name, a registry
//! that owns a name -> tool map and offers both exact and best-effort lookup.
//! The difference is what gets registered — there, a statically typed `Tool`
//! impl; here, whatever [`ErasedInlineTool`] the resolver, wrapper, and (for
//! local/remote sources) extractor/reconstructor pipeline produced.

use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::context::CallContext;
use crate::descriptor::ToolDescriptor;
use crate::env_manager::{EnvManager, RemoteMetadataOracle};
use crate::error::{IndexError, NameError};
use crate::extractor::Extractor;
use crate::inline::{CallOutput, ErasedInlineTool, InlineTool};
use crate::invoker::Invoker;
use crate::parse::PromptParser;
use crate::reconstructor::ReconstructedTool;
use crate::schema::{render, render_all, Dialect};
use crate::source::{EnvVarMap, ToolSource};
use crate::wrapper::WrappedInlineTool;

/// Configuration shared by every source an [`IndexBuilder`] resolves.
#[derive(Clone)]
pub struct IndexConfig {
    pub cache_root: PathBuf,
    pub env_vars: EnvVarMap,
    pub reset_cache: bool,
    pub python_bin: String,
    /// Directory for the JSONL call log. `None` disables logging outright,
    /// independent of `TOOLINDEX_LOGGING_DISABLED`.
    pub log_dir: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            cache_root: std::env::temp_dir().join("toolindex-cache"),
            env_vars: EnvVarMap::new(),
            reset_cache: false,
            python_bin: "python3".to_string(),
            log_dir: None,
        }
    }
}

impl IndexConfig {
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    pub fn with_env_vars(mut self, env_vars: EnvVarMap) -> Self {
        self.env_vars = env_vars;
        self
    }

    pub fn with_reset_cache(mut self, reset_cache: bool) -> Self {
        self.reset_cache = reset_cache;
        self
    }

    pub fn with_python_bin(mut self, python_bin: impl Into<String>) -> Self {
        self.python_bin = python_bin.into();
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(log_dir.into());
        self
    }
}

enum BuilderEntry {
    Inline(Arc<dyn ErasedInlineTool>),
    PathOrId(String),
}

/// Accumulates `tools` list entries and resolves them into an [`Index`].
pub struct IndexBuilder {
    config: IndexConfig,
    entries: Vec<BuilderEntry>,
    oracle: Option<Arc<dyn RemoteMetadataOracle>>,
}

impl IndexBuilder {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
            oracle: None,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn RemoteMetadataOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Register a native `InlineTool` implementation.
    pub fn with_tool<T: InlineTool>(mut self, tool: T) -> Self {
        self.entries.push(BuilderEntry::Inline(crate::inline::erase(tool)));
        self
    }

    /// Register an already-erased in-process tool.
    pub fn with_inline(mut self, tool: Arc<dyn ErasedInlineTool>) -> Self {
        self.entries.push(BuilderEntry::Inline(tool));
        self
    }

    /// Register a local folder path or a `owner/name[:rev]` remote id.
    pub fn with_source(mut self, entry: impl Into<String>) -> Self {
        self.entries.push(BuilderEntry::PathOrId(entry.into()));
        self
    }

    /// Resolve every registered entry and build the index.
    ///
    /// Fails on the first unresolvable source, the first extraction failure,
    /// or a duplicate tool name — an index is all-or-nothing, never partially
    /// built.
    pub fn build(self) -> Result<Index, IndexError> {
        let mut env_manager = EnvManager::new(self.config.cache_root.clone());
        if let Some(oracle) = self.oracle {
            env_manager = env_manager.with_oracle(oracle);
        }
        let extractor = Extractor::new().with_python_bin(self.config.python_bin.clone());

        let mut tools: IndexMap<String, Arc<dyn ErasedInlineTool>> = IndexMap::new();

        for entry in self.entries {
            match entry {
                BuilderEntry::Inline(tool) => {
                    let wrapped: Arc<dyn ErasedInlineTool> = Arc::new(WrappedInlineTool::new(tool));
                    insert_unique(&mut tools, wrapped)?;
                }
                BuilderEntry::PathOrId(raw) => {
                    let source = ToolSource::classify_path_or_id(&raw, &self.config.env_vars)?;
                    let prepared = match source {
                        ToolSource::Inline(_) => unreachable!(
                            "classify_path_or_id only ever returns Local or Remote"
                        ),
                        ToolSource::Local { path, create_env, env_vars } => {
                            env_manager.prepare_local(&path, create_env, env_vars)?
                        }
                        ToolSource::Remote { id, env_vars } => {
                            env_manager.prepare_remote(&id, self.config.reset_cache, env_vars)?
                        }
                    };

                    let invoker = Arc::new(
                        Invoker::new(prepared.root.clone())
                            .with_python_bin(self.config.python_bin.clone())
                            .with_env_vars(prepared.env_vars.clone()),
                    );

                    for tool_id in &prepared.manifest.tools {
                        let descriptor =
                            extractor.extract(&prepared.root, tool_id, &prepared.env_vars)?;
                        let reconstructed: Arc<dyn ErasedInlineTool> =
                            Arc::new(ReconstructedTool::new(descriptor, invoker.clone()));
                        insert_unique(&mut tools, reconstructed)?;
                    }
                }
            }
        }

        let log_writer = self.config.log_dir.map(toolindex_logging::LogWriter::new);

        Ok(Index { tools, log_writer })
    }
}

fn insert_unique(
    tools: &mut IndexMap<String, Arc<dyn ErasedInlineTool>>,
    tool: Arc<dyn ErasedInlineTool>,
) -> Result<(), IndexError> {
    let name = tool.name().to_string();
    if tools.contains_key(&name) {
        return Err(IndexError::Name(NameError::Duplicate { name }));
    }
    tools.insert(name, tool);
    Ok(())
}

/// A built, queryable collection of tools.
pub struct Index {
    tools: IndexMap<String, Arc<dyn ErasedInlineTool>>,
    log_writer: Option<toolindex_logging::LogWriter>,
}

impl Index {
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Enumerate registered tool names in insertion order — the order
    /// sources and inline tools were added to the builder, and manifest
    /// order within each source (§3).
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn descriptor(&self, name: &str) -> Option<ToolDescriptor> {
        self.tools.get(name).map(|t| ToolDescriptor {
            id: t.name().to_string(),
            params: t.params(),
            return_type: t.return_type(),
            doc: Some(t.description().to_string()),
            shape: t.shape(),
        })
    }

    pub fn schema(&self, query: &str, dialect: Dialect) -> Result<Value, IndexError> {
        let descriptor = self.resolve_descriptor(query)?;
        render(&descriptor, dialect)
    }

    pub fn schemas(&self, query: &str, dialects: &[Dialect]) -> Result<Vec<(Dialect, Value)>, IndexError> {
        let descriptor = self.resolve_descriptor(query)?;
        render_all(&descriptor, dialects)
    }

    fn resolve_descriptor(&self, query: &str) -> Result<ToolDescriptor, IndexError> {
        let name = self.resolve_name(query)?;
        self.descriptor(&name)
            .ok_or_else(|| IndexError::Name(NameError::NotFound { query: query.to_string() }))
    }

    /// Resolve a query to exactly one tool name: an exact match wins
    /// immediately; otherwise a query matching exactly one tool name's
    /// dotted-suffix (e.g. `"alpha"` for `"mock.alpha"`) matches; more than
    /// one suffix match is ambiguous.
    fn resolve_name(&self, query: &str) -> Result<String, IndexError> {
        if self.tools.contains_key(query) {
            return Ok(query.to_string());
        }

        let suffix = format!(".{query}");
        let candidates: Vec<&str> = self
            .tools
            .keys()
            .map(String::as_str)
            .filter(|name| *name == query || name.ends_with(&suffix))
            .collect();

        match candidates.as_slice() {
            [] => Err(IndexError::Name(NameError::NotFound {
                query: query.to_string(),
            })),
            [single] => Ok(single.to_string()),
            many => {
                let mut candidates: Vec<String> = many.iter().map(|s| s.to_string()).collect();
                candidates.sort();
                Err(IndexError::Name(NameError::Ambiguous {
                    query: query.to_string(),
                    candidates,
                }))
            }
        }
    }

    /// Call a tool by exact name or unique suffix with a single-value result.
    pub async fn execute(&self, query: &str, args: Value) -> Result<Value, IndexError> {
        self.execute_with_context(query, args, &CallContext::new()).await
    }

    #[tracing::instrument(skip(self, args, ctx), fields(query))]
    pub async fn execute_with_context(
        &self,
        query: &str,
        args: Value,
        ctx: &CallContext,
    ) -> Result<Value, IndexError> {
        let name = self.resolve_name(query)?;
        let tool = self.tools.get(&name).expect("just resolved");
        let timer = toolindex_logging::CallTimer::start();
        let request = args.clone();

        let result = match tool.call_with_context(args, ctx).await {
            Ok(CallOutput::Single(v)) => Ok(v),
            // A generator-shaped tool called through the non-streaming façade
            // is drained to its last value (§8 scenario 4) rather than
            // rejected — callers that want every value use `stream_execute`.
            Ok(CallOutput::Stream(mut stream)) => {
                use futures::StreamExt;
                let mut last = None;
                let mut drained = Ok(());
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(v) => last = Some(v),
                        Err(e) => {
                            drained = Err(e);
                            break;
                        }
                    }
                }
                drained.and_then(|()| {
                    last.ok_or_else(|| {
                        IndexError::invocation(&name, "generator produced no values")
                    })
                })
            }
            Err(e) => Err(e),
        };

        self.log_call(&name, request, &timer, &result);
        result
    }

    /// Append one call record to the configured JSONL log, if any. Logging
    /// failures are reported via `tracing` rather than surfaced to the
    /// caller — a misbehaving log sink must never fail a tool call.
    fn log_call(
        &self,
        tool_id: &str,
        request: Value,
        timer: &toolindex_logging::CallTimer,
        result: &Result<Value, IndexError>,
    ) {
        let Some(writer) = &self.log_writer else {
            return;
        };
        let (completed_at, duration_ms) = timer.finish();
        let record = toolindex_logging::ToolCallRecord {
            call_id: timer.call_id.clone(),
            tool_id: tool_id.to_string(),
            started_at: timer.started_at,
            completed_at,
            duration_ms,
            request,
            success: result.is_ok(),
            error: result
                .as_ref()
                .err()
                .map(|e| toolindex_logging::ToolCallRecord::truncate_error(&e.to_string())),
        };
        if let Err(e) = writer.append_jsonl(&record) {
            tracing::warn!(error = %e, tool_id, "failed to write call log");
        }
    }

    /// Call a generator-shaped tool, returning its stream of values.
    pub async fn stream_execute(
        &self,
        query: &str,
        args: Value,
    ) -> Result<crate::inline::ValueStream, IndexError> {
        let name = self.resolve_name(query)?;
        let tool = self.tools.get(&name).expect("just resolved");
        match tool.call(args).await? {
            CallOutput::Stream(s) => Ok(s),
            CallOutput::Single(v) => {
                Ok(Box::pin(futures::stream::once(async move { Ok(v) })))
            }
        }
    }

    /// Recover a call from free-form model output via `parser`, then execute it.
    pub async fn parse_and_execute(
        &self,
        parser: &dyn PromptParser,
        text: &str,
    ) -> Result<Value, IndexError> {
        let call = parser.parse(text)?;
        self.execute(&call.tool_query, call.args).await
    }
}
