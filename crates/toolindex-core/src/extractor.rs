//! Cross-process signature extraction (§4.3): asking a source's interpreter
//! for one symbol's signature without importing it into the host process.
//!
//! Deviates from the original implementation in one respect, recorded in
//! `DESIGN.md`: the original shipped the extracted signature back as a
//! pickled payload over a loopback socket. `TypeTag` already round-trips
//! through JSON by construction (see [`crate::descriptor`]), so the Rust
//! extractor standardizes on JSON over the child's stdout instead — one less
//! serialization format to maintain, and no socket/port to bind or leak.

use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Stdio};

use serde::Deserialize;

use crate::descriptor::{Default as ParamDefault, ParamDescriptor, ParamKind, Shape, ToolDescriptor, TypeTag};
use crate::error::IndexError;

/// Wire form of an extracted signature, matching what [`BOOTSTRAP_SCRIPT`]
/// prints: close to [`ToolDescriptor`] but without the `id`, which the host
/// fills in from the manifest entry being extracted.
#[derive(Debug, Deserialize)]
struct ExtractedSignature {
    params: Vec<ExtractedParam>,
    return_type: TypeTag,
    doc: Option<String>,
    shape: Shape,
}

#[derive(Debug, Deserialize)]
struct ExtractedParam {
    name: String,
    kind: ParamKind,
    default: ParamDefault,
    #[serde(rename = "type")]
    type_tag: TypeTag,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ExtractionFrame {
    Ok {
        #[serde(flatten)]
        signature: ExtractedSignature,
    },
    Error {
        message: String,
    },
}

pub struct Extractor {
    python_bin: String,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            python_bin: "python3".to_string(),
        }
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_python_bin(mut self, python_bin: impl Into<String>) -> Self {
        self.python_bin = python_bin.into();
        self
    }

    /// Extract the signature of `tool_id` (a `"<module>.<symbol>"` manifest
    /// entry) from the source rooted at `source_root`, without ever importing
    /// it into the host process. `env_vars` is the source's declared mapping
    /// (§4.2) — the only variables besides `PATH` visible to the child.
    #[tracing::instrument(skip(self, env_vars), fields(root = %source_root.display()))]
    pub fn extract(
        &self,
        source_root: &Path,
        tool_id: &str,
        env_vars: &HashMap<String, String>,
    ) -> Result<ToolDescriptor, IndexError> {
        let output = Command::new(&self.python_bin)
            .arg("-c")
            .arg(BOOTSTRAP_SCRIPT)
            .arg(tool_id)
            .current_dir(source_root)
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .envs(env_vars)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| IndexError::introspection(tool_id, format!("could not spawn extractor: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IndexError::introspection(
                tool_id,
                format!("extractor exited with {}: {stderr}", output.status),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let last_line = stdout
            .lines()
            .last()
            .ok_or_else(|| IndexError::introspection(tool_id, "extractor produced no output"))?;

        let frame: ExtractionFrame = serde_json::from_str(last_line)
            .map_err(|e| IndexError::introspection(tool_id, format!("could not decode signature: {e}")))?;

        match frame {
            ExtractionFrame::Error { message } => Err(IndexError::introspection(tool_id, message)),
            ExtractionFrame::Ok { signature } => Ok(ToolDescriptor {
                id: tool_id.to_string(),
                params: signature
                    .params
                    .into_iter()
                    .map(|p| ParamDescriptor {
                        name: p.name,
                        kind: p.kind,
                        default: p.default,
                        type_tag: p.type_tag,
                    })
                    .collect(),
                return_type: signature.return_type,
                doc: signature.doc,
                shape: signature.shape,
            }),
        }
    }
}

/// Bootstrap run inside the source's interpreter: import the module named by
/// the leading components of the dotted id, introspect the trailing symbol's
/// signature with `inspect.signature`, and print one JSON frame describing
/// it. Recognizes the annotation shapes the original implementation's
/// signature walker does — primitives, `list`/`dict`/`tuple`/`set`,
/// `Optional`/`Union`, `Literal`, and `enum.Enum` subclasses. An untyped
/// container (bare `dict`/`list`/`tuple`/`set`, with no declared item types)
/// still extracts, into the same untyped `object`/`array`/`tuple` transport
/// form the schema formatter later rejects (§4.7) — extraction itself only
/// refuses annotations it has no transport form for at all, i.e. custom
/// nominal types with behavior (§4.3).
const BOOTSTRAP_SCRIPT: &str = r#"
import sys, json, importlib, inspect, enum, typing

def _tag(annotation):
    if annotation is inspect.Signature.empty or annotation is None:
        return {"kind": "object"}
    if annotation is str:
        return {"kind": "string"}
    if annotation is int:
        return {"kind": "integer"}
    if annotation is float:
        return {"kind": "number"}
    if annotation is bool:
        return {"kind": "boolean"}
    if annotation is type(None):
        return {"kind": "null"}
    if annotation is dict:
        return {"kind": "object"}
    if annotation is list:
        return {"kind": "array"}
    if annotation is tuple:
        return {"kind": "tuple", "items": []}
    if annotation in (set, frozenset):
        return {"kind": "array"}

    origin = typing.get_origin(annotation)
    args = typing.get_args(annotation)

    if origin in (list,):
        item = _tag(args[0]) if args else {"kind": "object"}
        return {"kind": "list", "item": item}
    if origin in (dict,):
        key = _tag(args[0]) if args else {"kind": "string"}
        value = _tag(args[1]) if len(args) > 1 else {"kind": "object"}
        return {"kind": "dict", "key": key, "value": value}
    if origin in (tuple,):
        return {"kind": "tuple", "items": [_tag(a) for a in args]}
    if origin in (set, frozenset):
        return {"kind": "array"}
    if origin is typing.Union:
        return {"kind": "union", "options": [_tag(a) for a in args]}
    if origin is typing.Literal:
        return {"kind": "literal", "values": list(args)}

    if isinstance(annotation, type) and issubclass(annotation, enum.Enum):
        return {
            "kind": "enum",
            "name": annotation.__name__,
            "members": {m.name: m.value for m in annotation},
        }

    raise TypeError(
        f"cannot extract a transport type for {annotation!r}: "
        "custom nominal types cannot be reconstructed outside the source interpreter"
    )

def _default(param):
    if param.default is inspect.Signature.empty:
        return {"tag": "none"}
    return {"tag": "value", "value": param.default}

def _kind(param):
    return {
        inspect.Parameter.POSITIONAL_OR_KEYWORD: "positional-or-keyword",
        inspect.Parameter.POSITIONAL_ONLY: "positional-only",
        inspect.Parameter.KEYWORD_ONLY: "keyword-only",
        inspect.Parameter.VAR_POSITIONAL: "var-positional",
        inspect.Parameter.VAR_KEYWORD: "var-keyword",
    }[param.kind]

def _shape(fn):
    if inspect.isasyncgenfunction(fn):
        return "async-gen"
    if inspect.iscoroutinefunction(fn):
        return "coroutine"
    if inspect.isgeneratorfunction(fn):
        return "sync-gen"
    return "plain"

def _extract(symbol):
    module_name, _, attr = symbol.rpartition(".")
    module = importlib.import_module(module_name)
    fn = getattr(module, attr)
    sig = inspect.signature(fn)
    params = []
    for p in sig.parameters.values():
        default = _default(p)
        params.append({
            "name": p.name,
            "kind": _kind(p),
            # `Default` is untagged-by-variant in Rust's serde form
            # (`{"none"}` or `{"value": ...}`) -- emit matching shape.
            "default": "none" if default["tag"] == "none" else {"value": default["value"]},
            "type": _tag(p.annotation),
        })
    return {
        "status": "ok",
        "params": params,
        "return_type": _tag(sig.return_annotation),
        "doc": inspect.getdoc(fn),
        "shape": _shape(fn),
    }

try:
    print(json.dumps(_extract(sys.argv[1])))
except Exception as exc:
    print(json.dumps({"status": "error", "message": str(exc)}))
"#;
