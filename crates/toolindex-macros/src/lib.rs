//! The `#[tool]` attribute macro for declaring inline tools.

mod tool;

use proc_macro::TokenStream;

/// Attribute macro to define an inline tool from an async function.
///
/// # Usage
///
/// ```ignore
/// use toolindex_macros::tool;
/// use toolindex_core::IndexError;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct GreetInput {
///     name: String,
///     #[schemars(default)]
///     excited: Option<bool>,
/// }
///
/// #[tool(name = "greet", description = "Greet someone by name")]
/// async fn greet(input: GreetInput) -> Result<String, IndexError> {
///     // implementation
/// # Ok(String::new())
/// }
/// ```
///
/// This generates a `GreetTool` unit struct implementing
/// [`toolindex_core::InlineTool`]: its `params()` and `return_type()` are
/// derived from the input and output types' `schemars::JsonSchema` impls, and
/// `call()` deserializes the incoming JSON, awaits the annotated function, and
/// serializes its result.
///
/// # Attributes
///
/// - `name`: the tool's unique id (defaults to the function name)
/// - `description`: human-readable description of what the tool does
#[proc_macro_attribute]
pub fn tool(attr: TokenStream, item: TokenStream) -> TokenStream {
    tool::expand(attr.into(), item.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
