//! Structural, language-neutral description of a tool's parameters and shape.
//!
//! Everything here is transport form: it is produced inside a source's isolated
//! interpreter, serialized across a process boundary, and rehydrated on the host
//! side unchanged. No type in this module carries an opaque handle back into the
//! source interpreter — that is the whole point of extraction (see
//! [`crate::extractor`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A recursively defined, structural type tag.
///
/// This is the sum type the design notes call for: a tagged variant over a small
/// closed set, never an opaque object. Every variant round-trips through JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeTag {
    String,
    Integer,
    Number,
    Boolean,
    Null,
    /// Untyped array (no item type could be determined).
    Array,
    /// Untyped object (no field types could be determined).
    Object,
    /// A restricted set of literal values. Values may be non-string (see §4.6c).
    Literal { values: Vec<Value> },
    /// A named enumeration with member name -> underlying value.
    Enum {
        name: String,
        members: BTreeMap<String, Value>,
    },
    /// A named record (struct-like mapping) with declared field types.
    Record {
        name: String,
        fields: BTreeMap<String, TypeTag>,
    },
    /// A homogeneous sequence.
    List { item: Box<TypeTag> },
    /// A keyed mapping.
    Dict {
        key: Box<TypeTag>,
        value: Box<TypeTag>,
    },
    /// A fixed-arity tuple.
    Tuple { items: Vec<TypeTag> },
    /// A union of alternative types. `None`/`Null` as one option is preserved
    /// rather than collapsed, so nullability survives reconstruction.
    Union { options: Vec<TypeTag> },
}

impl TypeTag {
    /// True if `Null` appears as a direct option of a union, or the tag itself is `Null`.
    pub fn is_nullable(&self) -> bool {
        match self {
            TypeTag::Null => true,
            TypeTag::Union { options } => options.iter().any(TypeTag::is_nullable),
            _ => false,
        }
    }

    /// Wrap `self` in a union with `Null` unless it is already nullable.
    pub fn into_nullable(self) -> TypeTag {
        if self.is_nullable() {
            return self;
        }
        match self {
            TypeTag::Union { mut options } => {
                options.push(TypeTag::Null);
                TypeTag::Union { options }
            }
            other => TypeTag::Union {
                options: vec![other, TypeTag::Null],
            },
        }
    }

    /// The first non-null branch of a union, or `self` if not a union.
    /// Used by the Gemini dialect, which has no first-class union support.
    pub fn first_non_null(&self) -> &TypeTag {
        match self {
            TypeTag::Union { options } => options
                .iter()
                .find(|o| !matches!(o, TypeTag::Null))
                .unwrap_or(self),
            other => other,
        }
    }
}

/// How a parameter binds at the call site, mirroring the source interpreter's
/// own classification so reconstruction can preserve calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamKind {
    PositionalOrKeyword,
    PositionalOnly,
    KeywordOnly,
    VarPositional,
    VarKeyword,
}

/// Sentinel distinguishing "no default" from a default of JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Default {
    None,
    Value(Value),
}

impl Default {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Default::None => None,
            Default::Value(v) => Some(v),
        }
    }
}

/// Transport-form description of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    pub kind: ParamKind,
    pub default: Default,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
}

impl ParamDescriptor {
    pub fn has_default(&self) -> bool {
        !matches!(self.default, Default::None)
    }
}

/// How a tool produces its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Shape {
    Plain,
    Coroutine,
    SyncGen,
    AsyncGen,
}

impl Shape {
    pub fn is_generator(self) -> bool {
        matches!(self, Shape::SyncGen | Shape::AsyncGen)
    }

    pub fn is_async(self) -> bool {
        matches!(self, Shape::Coroutine | Shape::AsyncGen)
    }
}

/// The transport-form descriptor for a whole tool, as produced by the extractor
/// and consumed by the reconstructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// `"<module>.<symbol>"`, relative to the source root.
    pub id: String,
    pub params: Vec<ParamDescriptor>,
    pub return_type: TypeTag,
    pub doc: Option<String>,
    pub shape: Shape,
}

impl ToolDescriptor {
    /// The tool id with dots rewritten to hyphens, for dialects that forbid dots.
    pub fn dialect_name(&self) -> String {
        self.id.replace('.', "-")
    }
}
