//! Dialect-specific schema rendering (§4.7).
//!
//! Every dialect starts from the same [`TypeTag`] tree — the wrapper (§4.6) has
//! already normalized defaults and restricted values by the time a descriptor
//! reaches here — and differs only in envelope shape, name-rewrite rule, and how
//! it spells "nullable". None of this depends on `schemars`: there is no static
//! Rust type standing behind a remote tool's parameters, so the tree is walked
//! by hand the way this family's `providers` module composes per-provider
//! payloads around a pre-built schema value.

use serde_json::{json, Map, Value};

use crate::descriptor::{ToolDescriptor, TypeTag};
use crate::error::IndexError;

/// The four schema dialects a tool descriptor can be rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    OpenAiChatCompletions,
    OpenAiResponses,
    Anthropic,
    GoogleGemini,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Dialect::OpenAiChatCompletions => "openai-chat-completions",
            Dialect::OpenAiResponses => "openai-responses",
            Dialect::Anthropic => "anthropic",
            Dialect::GoogleGemini => "google-gemini",
        }
    }

    /// Both OpenAI dialects and Anthropic reject dots in a function name and
    /// rewrite them to hyphens; Gemini imposes no such restriction and keeps
    /// the dotted id as-is.
    fn tool_name(self, descriptor: &ToolDescriptor) -> String {
        match self {
            Dialect::GoogleGemini => descriptor.id.clone(),
            _ => descriptor.dialect_name(),
        }
    }

    fn supports_union(self) -> bool {
        !matches!(self, Dialect::GoogleGemini)
    }

    fn strict_object_schema(self) -> bool {
        matches!(self, Dialect::OpenAiChatCompletions | Dialect::OpenAiResponses)
    }
}

/// Render one tool's descriptor as a dialect-specific tool definition.
pub fn render(descriptor: &ToolDescriptor, dialect: Dialect) -> Result<Value, IndexError> {
    let mut parameters = object_schema(descriptor, dialect)?;
    let name = dialect.tool_name(descriptor);
    let description = descriptor.doc.clone().unwrap_or_default();

    Ok(match dialect {
        Dialect::OpenAiChatCompletions => json!({
            "type": "function",
            "function": {
                "name": name,
                "description": description,
                "strict": true,
                "parameters": parameters,
            }
        }),
        Dialect::OpenAiResponses => json!({
            "type": "function",
            "name": name,
            "description": description,
            "strict": true,
            "parameters": parameters,
        }),
        Dialect::Anthropic => json!({
            "name": name,
            "description": description,
            "input_schema": parameters,
        }),
        // Gemini's tool object has no top-level `description` field; it
        // belongs inside `parameters` alongside `type`/`properties`/`required`.
        Dialect::GoogleGemini => {
            if let Value::Object(map) = &mut parameters {
                map.insert("description".into(), json!(description));
            }
            json!({
                "name": name,
                "parameters": parameters,
            })
        }
    })
}

/// Render every requested dialect for a descriptor in one pass, as
/// `format_tools` in the original implementation does for a list of
/// frameworks.
pub fn render_all(
    descriptor: &ToolDescriptor,
    dialects: &[Dialect],
) -> Result<Vec<(Dialect, Value)>, IndexError> {
    dialects
        .iter()
        .map(|d| render(descriptor, *d).map(|v| (*d, v)))
        .collect()
}

fn object_schema(descriptor: &ToolDescriptor, dialect: Dialect) -> Result<Value, IndexError> {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in &descriptor.params {
        let field = type_schema(&param.type_tag, dialect, descriptor, &param.name)?;
        properties.insert(param.name.clone(), field);
        // §4.6's wrapper already made every parameter apparent-required: a
        // defaulted param is nullable with an apparent default of `null`, an
        // optional-without-default param was de-nullified. Strict dialects
        // require the full property set in `required` regardless.
        required.push(Value::String(param.name.clone()));
    }

    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    schema.insert("required".into(), Value::Array(required));
    if dialect.strict_object_schema() {
        schema.insert("additionalProperties".into(), json!(false));
    }
    Ok(Value::Object(schema))
}

fn type_schema(
    tag: &TypeTag,
    dialect: Dialect,
    descriptor: &ToolDescriptor,
    param_name: &str,
) -> Result<Value, IndexError> {
    if tag.is_nullable() && !matches!(tag, TypeTag::Null) {
        return nullable_schema(tag, dialect, descriptor, param_name);
    }

    // Untyped mappings, sets (both transported as an untyped `Array`/`Object`
    // with no item/field information), and empty tuples have a valid
    // transport form but nothing a schema can be derived from (§4.7).
    if matches!(tag, TypeTag::Object | TypeTag::Array)
        || matches!(tag, TypeTag::Tuple { items } if items.is_empty())
    {
        return Err(IndexError::schema(
            &descriptor.id,
            dialect.name(),
            format!("parameter \"{param_name}\" has insufficient type information to render a schema"),
        ));
    }

    Ok(match tag {
        TypeTag::String => json!({"type": "string"}),
        TypeTag::Integer => json!({"type": "integer"}),
        TypeTag::Number => json!({"type": "number"}),
        TypeTag::Boolean => json!({"type": "boolean"}),
        TypeTag::Null => json!({"type": "null"}),
        TypeTag::Array | TypeTag::Object => unreachable!("handled above"),
        TypeTag::Literal { values } => literal_schema(values),
        TypeTag::Enum { members, .. } => {
            json!({"type": "string", "enum": members.keys().cloned().collect::<Vec<_>>()})
        }
        TypeTag::Record { fields, .. } => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for (name, field_tag) in fields {
                properties.insert(
                    name.clone(),
                    type_schema(field_tag, dialect, descriptor, param_name)?,
                );
                if !field_tag.is_nullable() {
                    required.push(Value::String(name.clone()));
                }
            }
            json!({"type": "object", "properties": properties, "required": required})
        }
        TypeTag::List { item } => json!({
            "type": "array",
            "items": type_schema(item, dialect, descriptor, param_name)?,
        }),
        TypeTag::Dict { value, .. } => json!({
            "type": "object",
            "additionalProperties": type_schema(value, dialect, descriptor, param_name)?,
        }),
        TypeTag::Tuple { items } => {
            let rendered: Result<Vec<Value>, IndexError> = items
                .iter()
                .map(|t| type_schema(t, dialect, descriptor, param_name))
                .collect();
            json!({
                "type": "array",
                "prefixItems": rendered?,
                "minItems": items.len(),
                "maxItems": items.len(),
            })
        }
        TypeTag::Union { options } => union_schema(options, dialect, descriptor, param_name)?,
    })
}

fn literal_schema(values: &[Value]) -> Value {
    let homogeneous_string = values.iter().all(Value::is_string);
    if homogeneous_string {
        json!({"type": "string", "enum": values})
    } else {
        json!({"enum": values})
    }
}

fn nullable_schema(
    tag: &TypeTag,
    dialect: Dialect,
    descriptor: &ToolDescriptor,
    param_name: &str,
) -> Result<Value, IndexError> {
    match dialect {
        // Gemini's schema format has no union support: fall back to the first
        // non-null branch and mark nullability with its own boolean field.
        Dialect::GoogleGemini => {
            let inner = tag.first_non_null();
            let mut rendered = type_schema(inner, dialect, descriptor, param_name)?;
            if let Value::Object(map) = &mut rendered {
                map.insert("nullable".into(), json!(true));
            }
            Ok(rendered)
        }
        // OpenAI strict mode spells a nullable scalar as a two-element `type`
        // array; anything structurally richer falls back to anyOf.
        Dialect::OpenAiChatCompletions | Dialect::OpenAiResponses => {
            let non_null = non_null_options(tag);
            if let [single] = non_null.as_slice() {
                if let Some(scalar) = scalar_type_name(single) {
                    return Ok(json!({"type": [scalar, "null"]}));
                }
            }
            union_schema(&all_options(tag), dialect, descriptor, param_name)
        }
        Dialect::Anthropic => union_schema(&all_options(tag), dialect, descriptor, param_name),
    }
}

fn union_schema(
    options: &[TypeTag],
    dialect: Dialect,
    descriptor: &ToolDescriptor,
    param_name: &str,
) -> Result<Value, IndexError> {
    if !dialect.supports_union() {
        return Err(IndexError::schema(
            &descriptor.id,
            dialect.name(),
            format!("parameter \"{param_name}\" is a union type, which {} cannot express", dialect.name()),
        ));
    }
    let rendered: Result<Vec<Value>, IndexError> = options
        .iter()
        .map(|t| type_schema(t, dialect, descriptor, param_name))
        .collect();
    Ok(json!({"anyOf": rendered?}))
}

fn all_options(tag: &TypeTag) -> Vec<TypeTag> {
    match tag {
        TypeTag::Union { options } => options.clone(),
        other => vec![other.clone()],
    }
}

fn non_null_options(tag: &TypeTag) -> Vec<TypeTag> {
    all_options(tag)
        .into_iter()
        .filter(|t| !matches!(t, TypeTag::Null))
        .collect()
}

fn scalar_type_name(tag: &TypeTag) -> Option<&'static str> {
    match tag {
        TypeTag::String => Some("string"),
        TypeTag::Integer => Some("integer"),
        TypeTag::Number => Some("number"),
        TypeTag::Boolean => Some("boolean"),
        _ => None,
    }
}
