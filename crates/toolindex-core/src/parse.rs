//! Seam for the out-of-scope "extract a JSON call from an LLM's prose"
//! collaborator (§1 non-goals; §4.8's `parse_and_execute`).
//!
//! The original implementation leans on `dirtyjson` and fuzzy symbol matching
//! to recover a best-effort call out of free text. None of that belongs in
//! this crate: this module only defines the seam an index calls through, so a
//! caller can plug in whatever prose-to-JSON strategy fits their model without
//! this crate needing an opinion about it.

use serde_json::Value;

use crate::error::IndexError;

/// One recovered call: which tool, and the JSON arguments object to bind.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCall {
    pub tool_query: String,
    pub args: Value,
}

/// Recovers a [`ParsedCall`] from free-form model output.
///
/// Implement this against whichever prose-parsing strategy your application
/// already uses; [`crate::index::Index::parse_and_execute`] only needs the
/// result.
pub trait PromptParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<ParsedCall, IndexError>;
}

/// A [`PromptParser`] for callers that already emit strict JSON and have no
/// need for fuzzy recovery: `{"tool": "...", "args": {...}}`.
pub struct StrictJsonParser;

impl PromptParser for StrictJsonParser {
    fn parse(&self, text: &str) -> Result<ParsedCall, IndexError> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            tool: String,
            #[serde(default)]
            args: Value,
        }

        let envelope: Envelope = serde_json::from_str(text.trim())
            .map_err(|e| IndexError::invocation("<parse>", format!("not a strict-JSON call: {e}")))?;
        Ok(ParsedCall {
            tool_query: envelope.tool,
            args: envelope.args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json_parser_recovers_tool_and_args() {
        let parser = StrictJsonParser;
        let call = parser
            .parse(r#"{"tool": "mock.alpha", "args": {"name": "Ada"}}"#)
            .unwrap();
        assert_eq!(call.tool_query, "mock.alpha");
        assert_eq!(call.args, serde_json::json!({"name": "Ada"}));
    }

    #[test]
    fn strict_json_parser_defaults_missing_args_to_null() {
        let parser = StrictJsonParser;
        let call = parser.parse(r#"{"tool": "mock.alpha"}"#).unwrap();
        assert_eq!(call.args, Value::Null);
    }

    #[test]
    fn strict_json_parser_rejects_prose() {
        let parser = StrictJsonParser;
        assert!(parser.parse("call mock.alpha with Ada").is_err());
    }
}
