//! Bridges `schemars`-derived JSON Schema into the index's own [`TypeTag`] model.
//!
//! Native Rust tools (see [`crate::inline`] and the `toolindex-macros` `#[tool]`
//! attribute) describe their parameters as regular typed structs. Remote and
//! local sources describe theirs by runtime introspection (see
//! [`crate::extractor`]). Both end up producing the same [`TypeTag`] tree so
//! [`crate::wrapper`] and [`crate::schema`] never need to know which side a
//! tool came from.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde_json::Value;

use crate::descriptor::{Default as ParamDefault, ParamDescriptor, ParamKind, TypeTag};

/// The [`TypeTag`] schemars would derive for `T`.
pub fn type_tag_of<T: JsonSchema>() -> TypeTag {
    value_to_type_tag(&schema_value::<T>())
}

/// Flatten `T`'s top-level object schema into one [`ParamDescriptor`] per field.
///
/// `T` must derive an object schema (a struct, not a scalar or enum) — the
/// `#[tool]` macro's input type always does, since it is always a struct.
pub fn params_from_schema<T: JsonSchema>() -> Vec<ParamDescriptor> {
    object_schema_to_params(&schema_value::<T>())
}

fn schema_value<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema).unwrap_or(Value::Null)
}

fn object_schema_to_params(value: &Value) -> Vec<ParamDescriptor> {
    let Some(obj) = value.as_object() else {
        return Vec::new();
    };
    let Some(properties) = obj.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };

    properties
        .iter()
        .map(|(name, field_schema)| {
            let type_tag = value_to_type_tag(field_schema);
            let default = match field_schema.get("default") {
                Some(v) => ParamDefault::Value(v.clone()),
                None => ParamDefault::None,
            };
            ParamDescriptor {
                name: name.clone(),
                kind: ParamKind::PositionalOrKeyword,
                default,
                type_tag,
            }
        })
        .collect()
}

/// Best-effort conversion of one JSON Schema fragment into a [`TypeTag`].
///
/// Mirrors [`crate::extractor`]'s embedded `_tag()`: unions (`anyOf`/`oneOf`),
/// enums, and objects-with-properties are recognized; anything richer than
/// this falls back to [`TypeTag::Object`].
fn value_to_type_tag(schema: &Value) -> TypeTag {
    let Some(obj) = schema.as_object() else {
        return TypeTag::Object;
    };

    if let Some(variants) = obj.get("enum").and_then(Value::as_array) {
        return TypeTag::Literal {
            values: variants.clone(),
        };
    }

    if let Some(branches) = obj
        .get("anyOf")
        .or_else(|| obj.get("oneOf"))
        .and_then(Value::as_array)
    {
        let options = branches.iter().map(value_to_type_tag).collect();
        return TypeTag::Union { options };
    }

    let Some(ty) = obj.get("type") else {
        return TypeTag::Object;
    };

    if let Some(types) = ty.as_array() {
        let options = types
            .iter()
            .filter_map(Value::as_str)
            .map(scalar_type_tag)
            .collect();
        return TypeTag::Union { options };
    }

    let Some(name) = ty.as_str() else {
        return TypeTag::Object;
    };

    match name {
        "array" => {
            let item = obj
                .get("items")
                .map_or(TypeTag::Object, value_to_type_tag);
            TypeTag::List {
                item: Box::new(item),
            }
        }
        "object" => object_type_tag(obj),
        other => scalar_type_tag(other),
    }
}

fn object_type_tag(obj: &serde_json::Map<String, Value>) -> TypeTag {
    if let Some(props) = obj.get("properties").and_then(Value::as_object) {
        let fields = props
            .iter()
            .map(|(k, v)| (k.clone(), value_to_type_tag(v)))
            .collect::<BTreeMap<_, _>>();
        let name = obj
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("object")
            .to_string();
        return TypeTag::Record { name, fields };
    }
    if let Some(value_schema) = obj.get("additionalProperties") {
        let value = value_to_type_tag(value_schema);
        return TypeTag::Dict {
            key: Box::new(TypeTag::String),
            value: Box::new(value),
        };
    }
    TypeTag::Object
}

fn scalar_type_tag(name: &str) -> TypeTag {
    match name {
        "string" => TypeTag::String,
        "integer" => TypeTag::Integer,
        "number" => TypeTag::Number,
        "boolean" => TypeTag::Boolean,
        "null" => TypeTag::Null,
        "array" => TypeTag::Array,
        _ => TypeTag::Object,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(JsonSchema)]
    struct GreetInput {
        name: String,
        #[schemars(default)]
        excited: Option<bool>,
    }

    #[test]
    fn scalar_type_tag_maps_known_names() {
        assert_eq!(type_tag_of::<String>(), TypeTag::String);
        assert_eq!(type_tag_of::<i64>(), TypeTag::Integer);
        assert_eq!(type_tag_of::<bool>(), TypeTag::Boolean);
    }

    #[test]
    fn vec_maps_to_list() {
        assert_eq!(
            type_tag_of::<Vec<String>>(),
            TypeTag::List {
                item: Box::new(TypeTag::String)
            }
        );
    }

    #[test]
    fn struct_fields_become_params() {
        let params = params_from_schema::<GreetInput>();
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"name"));
        assert!(names.contains(&"excited"));

        let name_param = params.iter().find(|p| p.name == "name").unwrap();
        assert_eq!(name_param.type_tag, TypeTag::String);
    }

    #[test]
    fn optional_field_is_nullable() {
        let params = params_from_schema::<GreetInput>();
        let excited = params.iter().find(|p| p.name == "excited").unwrap();
        assert!(excited.type_tag.is_nullable());
    }

    #[test]
    fn unknown_fragment_falls_back_to_object() {
        assert_eq!(value_to_type_tag(&serde_json::json!({})), TypeTag::Object);
    }
}
