//! Unified error taxonomy for the tool index runtime.
//!
//! One variant family per category named in the error handling design: a source
//! cannot be classified or materialized, an environment fails to build, a
//! signature cannot be extracted, a name is missing or ambiguous, a remote call
//! raises, or a tool's types are insufficient for a requested schema dialect.

use thiserror::Error;

/// Error type returned by tool-index operations.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A `tools` list entry could not be classified or materialized.
    #[error("could not resolve tool source \"{entry}\": {reason}")]
    Resolution { entry: String, reason: String },

    /// Environment creation or dependency installation failed.
    #[error("environment setup failed for source \"{source_id}\" running `{command}`: {reason}")]
    Environment {
        source_id: String,
        command: String,
        reason: String,
    },

    /// Signature extraction failed inside the source interpreter.
    #[error("failed to introspect tool \"{tool_id}\": {reason}")]
    Introspection { tool_id: String, reason: String },

    /// Tool-name errors: duplicates at construction, ambiguity or absence at call time.
    #[error(transparent)]
    Name(#[from] NameError),

    /// The child process raised while executing a tool.
    #[error("tool \"{tool_id}\" raised: {message}")]
    Invocation { tool_id: String, message: String },

    /// A tool's reconstructed types are insufficient for the requested dialect.
    #[error("cannot emit {dialect} schema for \"{tool_id}\": {reason}")]
    Schema {
        tool_id: String,
        dialect: String,
        reason: String,
    },

    /// The manifest file was missing or malformed.
    #[error("invalid manifest at {path}: {reason}")]
    Manifest { path: String, reason: String },

    /// A remote call was cancelled by the host; not surfaced as a user-facing failure,
    /// but distinguished from [`IndexError::Invocation`] so callers can choose not to retry.
    #[error("tool \"{tool_id}\" call was cancelled")]
    Cancelled { tool_id: String },
}

/// Errors specific to tool-name resolution within an index.
#[derive(Error, Debug)]
pub enum NameError {
    #[error("duplicate tool name \"{name}\"")]
    Duplicate { name: String },

    #[error("\"{query}\" matches multiple tools: {}", candidates.join(", "))]
    Ambiguous {
        query: String,
        candidates: Vec<String>,
    },

    #[error("no tool matches \"{query}\"")]
    NotFound { query: String },
}

impl IndexError {
    pub fn resolution<S: ToString, R: ToString>(entry: S, reason: R) -> Self {
        IndexError::Resolution {
            entry: entry.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn environment<S: ToString, C: ToString, R: ToString>(
        source_id: S,
        command: C,
        reason: R,
    ) -> Self {
        IndexError::Environment {
            source_id: source_id.to_string(),
            command: command.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn introspection<S: ToString, R: ToString>(tool_id: S, reason: R) -> Self {
        IndexError::Introspection {
            tool_id: tool_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invocation<S: ToString, R: ToString>(tool_id: S, message: R) -> Self {
        IndexError::Invocation {
            tool_id: tool_id.to_string(),
            message: message.to_string(),
        }
    }

    pub fn schema<S: ToString, D: ToString, R: ToString>(tool_id: S, dialect: D, reason: R) -> Self {
        IndexError::Schema {
            tool_id: tool_id.to_string(),
            dialect: dialect.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn manifest<P: ToString, R: ToString>(path: P, reason: R) -> Self {
        IndexError::Manifest {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_lists_candidates_in_message() {
        let e = NameError::Ambiguous {
            query: "foo".into(),
            candidates: vec!["a.foo".into(), "b.foo".into()],
        };
        let msg = e.to_string();
        assert!(msg.contains("a.foo"));
        assert!(msg.contains("b.foo"));
    }

    #[test]
    fn duplicate_names_offending_name() {
        let e = IndexError::Name(NameError::Duplicate {
            name: "mock.alpha".into(),
        });
        assert!(e.to_string().contains("mock.alpha"));
    }

    #[test]
    fn invocation_error_names_tool() {
        let e = IndexError::invocation("mock.beta", "boom");
        assert!(e.to_string().contains("mock.beta"));
        assert!(e.to_string().contains("boom"));
    }
}
