//! The uniform tool wrapper (§4.6), applied to every tool before it enters an
//! index — in-process or remote.
//!
//! Ported from `wrap_tool` in the original implementation: rewrite defaults
//! into a nullable-and-reinject form, re-encode non-string restricted values as
//! strings, and coerce weakly typed incoming arguments back to the declared
//! shape. Every concern here operates purely on [`ToolDescriptor`] /
//! [`serde_json::Value`] so it applies identically whether the underlying tool
//! is an [`crate::inline::ErasedInlineTool`] or a remote proxy.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};

use crate::descriptor::{Default as ParamDefault, ParamDescriptor, Shape, ToolDescriptor, TypeTag};
use crate::error::IndexError;
use crate::inline::{CallOutput, ErasedInlineTool};

/// Reverse map from a restricted value's string form back to its original,
/// possibly non-string, JSON value. Keyed by the string form so call-time
/// lookup is a single hash lookup.
pub type LiteralReencoding = BTreeMap<String, Value>;

/// The result of wrapping one tool's descriptor: the apparent signature a
/// caller sees, plus the hidden tables needed to undo the adaptation at call
/// time.
#[derive(Debug, Clone)]
pub struct WrappedDescriptor {
    /// The rewritten descriptor: every defaulted parameter is nullable with an
    /// apparent default of `null`; every non-string restricted-value parameter
    /// is a restricted set of strings.
    pub apparent: ToolDescriptor,
    /// Original declared type per parameter, pre-rewrite — used at call time
    /// to coerce incoming arguments and to invert literal re-encoding.
    original_types: BTreeMap<String, TypeTag>,
    /// Original default value per parameter that had one.
    original_defaults: BTreeMap<String, Value>,
    /// Reverse literal-value map per re-encoded parameter.
    literal_reencodings: BTreeMap<String, LiteralReencoding>,
}

/// Apply the wrapper to a raw, unwrapped descriptor (§4.6 a-d).
pub fn wrap_descriptor(raw: &ToolDescriptor) -> WrappedDescriptor {
    let mut original_types = BTreeMap::new();
    let mut original_defaults = BTreeMap::new();
    let mut literal_reencodings = BTreeMap::new();
    let mut apparent_params = Vec::with_capacity(raw.params.len());

    for param in &raw.params {
        original_types.insert(param.name.clone(), param.type_tag.clone());

        let (encoded_type, reencoding) = reencode_restricted_values(&param.type_tag);
        if let Some(map) = reencoding {
            literal_reencodings.insert(param.name.clone(), map);
        }

        let mut apparent = ParamDescriptor {
            name: param.name.clone(),
            kind: param.kind,
            default: param.default.clone(),
            type_tag: encoded_type,
        };

        if let Some(default_value) = param.default.as_value() {
            // (a) Defaults rewrite: advertise nullable, reinject at call time.
            original_defaults.insert(param.name.clone(), default_value.clone());
            apparent.type_tag = apparent.type_tag.into_nullable();
            apparent.default = ParamDefault::Value(Value::Null);
        } else if apparent.type_tag.is_nullable() {
            // (b) Optional-without-default normalization: still required.
            apparent.type_tag = denullify(&apparent.type_tag);
        }

        apparent_params.push(apparent);
    }

    WrappedDescriptor {
        apparent: ToolDescriptor {
            id: raw.id.clone(),
            params: apparent_params,
            return_type: raw.return_type.clone(),
            doc: raw.doc.clone(),
            shape: raw.shape,
        },
        original_types,
        original_defaults,
        literal_reencodings,
    }
}

/// (f) Idempotence: wrapping an already-wrapped descriptor is a no-op — there
/// is simply nothing left for `wrap_descriptor` to find, since the hidden
/// tables already capture everything the original rewrite discovered.
impl WrappedDescriptor {
    pub fn rewrap(self) -> WrappedDescriptor {
        self
    }

    /// (a), (c), (d): reconstitute the arguments a remote/inline backend
    /// expects from the arguments an agent framework actually sent.
    pub fn bind_call(&self, mut incoming: Map<String, Value>) -> Result<Map<String, Value>, IndexError> {
        let mut bound = Map::new();

        for param in &self.apparent.params {
            let name = &param.name;
            let raw_value = incoming.remove(name);

            let value = match raw_value {
                None => {
                    // Omitted argument with a default: inject it.
                    if let Some(default) = self.original_defaults.get(name) {
                        default.clone()
                    } else {
                        continue;
                    }
                }
                Some(Value::Null) => {
                    // Explicit null where a default exists: substitute it.
                    match self.original_defaults.get(name) {
                        Some(default) => default.clone(),
                        None => Value::Null,
                    }
                }
                Some(other) => other,
            };

            let decoded = match self.literal_reencodings.get(name) {
                Some(map) => undo_literal_encoding(&value, map),
                None => value,
            };

            let original_type = self.original_types.get(name);
            let coerced = match original_type {
                Some(t) => coerce(&decoded, t, name),
                None => decoded,
            };

            bound.insert(name.clone(), coerced);
        }

        Ok(bound)
    }
}

/// Strip `Null` from a union, collapsing a two-option union back to its other
/// branch. Leaves non-union nullable types (bare `Null`) alone.
fn denullify(tag: &TypeTag) -> TypeTag {
    match tag {
        TypeTag::Union { options } => {
            let remaining: Vec<TypeTag> = options
                .iter()
                .filter(|o| !matches!(o, TypeTag::Null))
                .cloned()
                .collect();
            match remaining.len() {
                0 => TypeTag::Null,
                1 => remaining.into_iter().next().unwrap(),
                _ => TypeTag::Union { options: remaining },
            }
        }
        other => other.clone(),
    }
}

/// (c) Replace non-string restricted values with their string forms,
/// recursively inside lists and unions, returning the reverse map if any
/// re-encoding happened.
fn reencode_restricted_values(tag: &TypeTag) -> (TypeTag, Option<LiteralReencoding>) {
    match tag {
        TypeTag::Literal { values } if values.iter().any(|v| !v.is_string()) => {
            let mut map = LiteralReencoding::new();
            let strings: Vec<Value> = values
                .iter()
                .map(|v| {
                    let s = literal_to_string(v);
                    map.insert(s.clone(), v.clone());
                    Value::String(s)
                })
                .collect();
            (TypeTag::Literal { values: strings }, Some(map))
        }
        TypeTag::List { item } => {
            let (inner, inner_map) = reencode_restricted_values(item);
            (
                TypeTag::List {
                    item: Box::new(inner),
                },
                inner_map,
            )
        }
        TypeTag::Union { options } => {
            let mut merged = LiteralReencoding::new();
            let mut any = false;
            let rewritten = options
                .iter()
                .map(|o| {
                    let (t, m) = reencode_restricted_values(o);
                    if let Some(m) = m {
                        any = true;
                        merged.extend(m);
                    }
                    t
                })
                .collect();
            let result = if any { Some(merged) } else { None };
            (TypeTag::Union { options: rewritten }, result)
        }
        other => (other.clone(), None),
    }
}

fn literal_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Map an incoming string back to its original typed value using a
/// re-encoding table, recursing into arrays so list-of-enum parameters work.
fn undo_literal_encoding(value: &Value, map: &LiteralReencoding) -> Value {
    match value {
        Value::String(s) => map.get(s).cloned().unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| undo_literal_encoding(item, map))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// (d) Best-effort coercion of a weakly typed value toward `declared`.
/// Coercion that would lose information leaves the value unchanged and logs
/// a warning naming `param_name` — the caller still gets a result, but one
/// that didn't match the declared type.
fn coerce(value: &Value, declared: &TypeTag, param_name: &str) -> Value {
    match declared {
        TypeTag::Integer => match value {
            Value::Number(n) if n.is_f64() => n
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| Value::Number((f as i64).into()))
                .unwrap_or_else(|| {
                    tracing::warn!(
                        param = param_name,
                        value = %value,
                        "skipped coercion: non-integral float cannot become an integer without loss"
                    );
                    value.clone()
                }),
            Value::String(s) => s.parse::<i64>().map(|i| Value::Number(i.into())).unwrap_or_else(|_| {
                tracing::warn!(param = param_name, value = %value, "skipped coercion: string is not a valid integer");
                value.clone()
            }),
            other => other.clone(),
        },
        TypeTag::Number => match value {
            Value::String(s) => s
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| {
                    tracing::warn!(param = param_name, value = %value, "skipped coercion: string is not a valid number");
                    value.clone()
                }),
            other => other.clone(),
        },
        TypeTag::Boolean => match value {
            Value::String(s) => match s.as_str() {
                "false" | "False" | "0" => Value::Bool(false),
                "true" | "True" | "1" => Value::Bool(true),
                _ => {
                    tracing::warn!(
                        param = param_name,
                        value = %value,
                        "skipped coercion: string is not a recognized boolean spelling"
                    );
                    value.clone()
                }
            },
            other => other.clone(),
        },
        TypeTag::List { item } => match value {
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| coerce(v, item, param_name)).collect())
            }
            other => other.clone(),
        },
        TypeTag::Tuple { items: item_types } => match value {
            Value::Array(items) if items.len() == item_types.len() => Value::Array(
                items
                    .iter()
                    .zip(item_types)
                    .map(|(v, t)| coerce(v, t, param_name))
                    .collect(),
            ),
            other => other.clone(),
        },
        TypeTag::Record { fields, .. } => match value {
            Value::Object(obj) => {
                let mut out = Map::new();
                for (k, v) in obj {
                    match fields.get(k) {
                        Some(field_type) => out.insert(k.clone(), coerce(v, field_type, param_name)),
                        None => out.insert(k.clone(), v.clone()),
                    };
                }
                Value::Object(out)
            }
            other => other.clone(),
        },
        TypeTag::Union { options } => {
            if matches!(value, Value::Null) && options.iter().any(|o| matches!(o, TypeTag::Null))
            {
                return Value::Null;
            }
            let non_null: Vec<&TypeTag> = options
                .iter()
                .filter(|o| !matches!(o, TypeTag::Null))
                .collect();
            match non_null.as_slice() {
                [single] => coerce(value, single, param_name),
                _ => value.clone(),
            }
        }
        _ => value.clone(),
    }
}

/// An in-process tool with the wrapper applied, sitting in an index beside
/// [`crate::reconstructor::ReconstructedTool`] — both are plain
/// [`ErasedInlineTool`]s from there on, so the index never special-cases
/// where a tool came from.
pub struct WrappedInlineTool {
    wrapped: WrappedDescriptor,
    inner: Arc<dyn ErasedInlineTool>,
}

impl WrappedInlineTool {
    pub fn new(inner: Arc<dyn ErasedInlineTool>) -> Self {
        let raw = ToolDescriptor {
            id: inner.name().to_string(),
            params: inner.params(),
            return_type: inner.return_type(),
            doc: Some(inner.description().to_string()),
            shape: inner.shape(),
        };
        Self {
            wrapped: wrap_descriptor(&raw),
            inner,
        }
    }
}

impl ErasedInlineTool for WrappedInlineTool {
    fn name(&self) -> &str {
        &self.wrapped.apparent.id
    }

    fn description(&self) -> &str {
        self.wrapped.apparent.doc.as_deref().unwrap_or_default()
    }

    fn params(&self) -> Vec<ParamDescriptor> {
        self.wrapped.apparent.params.clone()
    }

    fn return_type(&self) -> TypeTag {
        self.wrapped.apparent.return_type.clone()
    }

    fn shape(&self) -> Shape {
        self.wrapped.apparent.shape
    }

    fn call(&self, args: Value) -> BoxFuture<'static, Result<CallOutput, IndexError>> {
        let kwargs = match args {
            Value::Object(map) => map,
            other => {
                let id = self.wrapped.apparent.id.clone();
                return async move {
                    Err(IndexError::invocation(
                        &id,
                        format!("expected an object of keyword arguments, got {other}"),
                    ))
                }
                .boxed();
            }
        };
        let bound = self.wrapped.bind_call(kwargs);
        let inner = self.inner.clone();
        async move { inner.call(Value::Object(bound?)).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ParamKind, Shape};

    fn descriptor_with(params: Vec<ParamDescriptor>) -> ToolDescriptor {
        ToolDescriptor {
            id: "mock.tool".into(),
            params,
            return_type: TypeTag::String,
            doc: None,
            shape: Shape::Plain,
        }
    }

    #[test]
    fn defaulted_param_becomes_nullable_with_null_default() {
        let raw = descriptor_with(vec![ParamDescriptor {
            name: "excited".into(),
            kind: ParamKind::PositionalOrKeyword,
            default: ParamDefault::Value(Value::Bool(false)),
            type_tag: TypeTag::Boolean,
        }]);
        let wrapped = wrap_descriptor(&raw);
        let p = &wrapped.apparent.params[0];
        assert!(p.type_tag.is_nullable());
        assert_eq!(p.default, ParamDefault::Value(Value::Null));
    }

    #[test]
    fn optional_without_default_becomes_required() {
        let raw = descriptor_with(vec![ParamDescriptor {
            name: "nickname".into(),
            kind: ParamKind::PositionalOrKeyword,
            default: ParamDefault::None,
            type_tag: TypeTag::Union {
                options: vec![TypeTag::String, TypeTag::Null],
            },
        }]);
        let wrapped = wrap_descriptor(&raw);
        assert_eq!(wrapped.apparent.params[0].type_tag, TypeTag::String);
    }

    #[test]
    fn non_string_literal_is_reencoded_as_strings() {
        let raw = descriptor_with(vec![ParamDescriptor {
            name: "bar".into(),
            kind: ParamKind::PositionalOrKeyword,
            default: ParamDefault::None,
            type_tag: TypeTag::Literal {
                values: vec![Value::from(1), Value::from(2), Value::from(3)],
            },
        }]);
        let wrapped = wrap_descriptor(&raw);
        match &wrapped.apparent.params[0].type_tag {
            TypeTag::Literal { values } => {
                assert_eq!(
                    values,
                    &vec![
                        Value::String("1".into()),
                        Value::String("2".into()),
                        Value::String("3".into())
                    ]
                );
            }
            other => panic!("expected literal, got {other:?}"),
        }
    }

    #[test]
    fn call_with_integer_literal_param_decodes_to_original_type() {
        let raw = descriptor_with(vec![ParamDescriptor {
            name: "bar".into(),
            kind: ParamKind::PositionalOrKeyword,
            default: ParamDefault::None,
            type_tag: TypeTag::Literal {
                values: vec![Value::from(1), Value::from(2), Value::from(3)],
            },
        }]);
        let wrapped = wrap_descriptor(&raw);
        let mut kwargs = Map::new();
        kwargs.insert("bar".into(), Value::String("2".into()));
        let bound = wrapped.bind_call(kwargs).unwrap();
        assert_eq!(bound.get("bar"), Some(&Value::from(2)));
    }

    #[test]
    fn omitted_defaulted_arg_is_injected() {
        let raw = descriptor_with(vec![
            ParamDescriptor {
                name: "name".into(),
                kind: ParamKind::PositionalOrKeyword,
                default: ParamDefault::None,
                type_tag: TypeTag::String,
            },
            ParamDescriptor {
                name: "excited".into(),
                kind: ParamKind::PositionalOrKeyword,
                default: ParamDefault::Value(Value::Bool(false)),
                type_tag: TypeTag::Boolean,
            },
        ]);
        let wrapped = wrap_descriptor(&raw);
        let mut kwargs = Map::new();
        kwargs.insert("name".into(), Value::String("Ada".into()));
        let bound = wrapped.bind_call(kwargs).unwrap();
        assert_eq!(bound.get("excited"), Some(&Value::Bool(false)));
    }

    #[test]
    fn explicit_null_reinjects_default() {
        let raw = descriptor_with(vec![ParamDescriptor {
            name: "excited".into(),
            kind: ParamKind::PositionalOrKeyword,
            default: ParamDefault::Value(Value::Bool(false)),
            type_tag: TypeTag::Boolean,
        }]);
        let wrapped = wrap_descriptor(&raw);
        let mut kwargs = Map::new();
        kwargs.insert("excited".into(), Value::Null);
        let bound = wrapped.bind_call(kwargs).unwrap();
        assert_eq!(bound.get("excited"), Some(&Value::Bool(false)));
    }

    #[test]
    fn string_bool_coercion_recognizes_false_variants() {
        let raw = descriptor_with(vec![ParamDescriptor {
            name: "flag".into(),
            kind: ParamKind::PositionalOrKeyword,
            default: ParamDefault::None,
            type_tag: TypeTag::Boolean,
        }]);
        let wrapped = wrap_descriptor(&raw);
        for (input, expected) in [("false", false), ("False", false), ("true", true)] {
            let mut kwargs = Map::new();
            kwargs.insert("flag".into(), Value::String(input.into()));
            let bound = wrapped.bind_call(kwargs).unwrap();
            assert_eq!(bound.get("flag"), Some(&Value::Bool(expected)));
        }
    }

    #[test]
    fn numeric_narrowing_drops_trailing_zero_fraction() {
        let raw = descriptor_with(vec![ParamDescriptor {
            name: "count".into(),
            kind: ParamKind::PositionalOrKeyword,
            default: ParamDefault::None,
            type_tag: TypeTag::Integer,
        }]);
        let wrapped = wrap_descriptor(&raw);
        let mut kwargs = Map::new();
        kwargs.insert("count".into(), serde_json::json!(3.0));
        let bound = wrapped.bind_call(kwargs).unwrap();
        assert_eq!(bound.get("count"), Some(&Value::from(3)));
    }

    #[test]
    fn lossy_numeric_coercion_is_skipped() {
        let raw = descriptor_with(vec![ParamDescriptor {
            name: "count".into(),
            kind: ParamKind::PositionalOrKeyword,
            default: ParamDefault::None,
            type_tag: TypeTag::Integer,
        }]);
        let wrapped = wrap_descriptor(&raw);
        let mut kwargs = Map::new();
        kwargs.insert("count".into(), serde_json::json!(3.5));
        let bound = wrapped.bind_call(kwargs).unwrap();
        assert_eq!(bound.get("count"), Some(&serde_json::json!(3.5)));
    }

    #[test]
    fn wrapping_is_idempotent() {
        let raw = descriptor_with(vec![ParamDescriptor {
            name: "excited".into(),
            kind: ParamKind::PositionalOrKeyword,
            default: ParamDefault::Value(Value::Bool(false)),
            type_tag: TypeTag::Boolean,
        }]);
        let once = wrap_descriptor(&raw);
        let once_apparent = once.apparent.clone();
        let twice = once.rewrap();
        assert_eq!(twice.apparent.params, once_apparent.params);
    }

    #[test]
    fn single_option_union_unwraps() {
        let raw = descriptor_with(vec![ParamDescriptor {
            name: "thing".into(),
            kind: ParamKind::PositionalOrKeyword,
            default: ParamDefault::None,
            type_tag: TypeTag::Union {
                options: vec![TypeTag::Integer],
            },
        }]);
        let wrapped = wrap_descriptor(&raw);
        let mut kwargs = Map::new();
        kwargs.insert("thing".into(), Value::String("7".into()));
        let bound = wrapped.bind_call(kwargs).unwrap();
        assert_eq!(bound.get("thing"), Some(&Value::from(7)));
    }

    struct CountTool;

    impl ErasedInlineTool for CountTool {
        fn name(&self) -> &str {
            "mock.count"
        }

        fn description(&self) -> &str {
            "Counts."
        }

        fn params(&self) -> Vec<ParamDescriptor> {
            vec![ParamDescriptor {
                name: "mode".into(),
                kind: ParamKind::PositionalOrKeyword,
                default: ParamDefault::None,
                type_tag: TypeTag::Literal {
                    values: vec![Value::from(1), Value::from(2)],
                },
            }]
        }

        fn return_type(&self) -> TypeTag {
            TypeTag::Integer
        }

        fn shape(&self) -> Shape {
            Shape::Plain
        }

        fn call(&self, args: Value) -> BoxFuture<'static, Result<CallOutput, IndexError>> {
            async move {
                let mode = args.get("mode").and_then(Value::as_i64).unwrap_or(0);
                Ok(CallOutput::Single(Value::from(mode * 10)))
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn wrapped_inline_tool_reencodes_and_calls_through() {
        let wrapped = WrappedInlineTool::new(Arc::new(CountTool));
        match &wrapped.params()[0].type_tag {
            TypeTag::Literal { values } => {
                assert_eq!(values, &vec![Value::String("1".into()), Value::String("2".into())])
            }
            other => panic!("expected literal, got {other:?}"),
        }

        let out = wrapped
            .call(serde_json::json!({"mode": "2"}))
            .await
            .unwrap();
        match out {
            CallOutput::Single(v) => assert_eq!(v, Value::from(20)),
            CallOutput::Stream(_) => panic!("expected single value"),
        }
    }
}
