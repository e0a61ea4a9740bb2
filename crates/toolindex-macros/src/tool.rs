//! Implementation of the #[tool] proc macro.

use darling::FromMeta;
use darling::ast::NestedMeta;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{FnArg, ItemFn, ReturnType, Type, parse2};

/// Parsed #[tool(...)] attributes.
#[derive(Debug, Default, FromMeta)]
#[darling(default)]
struct ToolAttr {
    /// Override the tool id (defaults to the function name).
    name: Option<String>,
    /// Description of what the tool does.
    description: Option<String>,
}

/// Expand the #[tool] attribute macro.
pub fn expand(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let func: ItemFn = parse2(item)?;

    if func.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            func.sig.fn_token,
            "#[tool] function must be async",
        ));
    }

    let tool_attr = if attr.is_empty() {
        ToolAttr::default()
    } else {
        let nested = NestedMeta::parse_meta_list(attr.clone())
            .map_err(|e| syn::Error::new_spanned(&attr, e))?;
        ToolAttr::from_list(&nested).map_err(|e| syn::Error::new_spanned(&attr, e))?
    };

    let fn_ident = &func.sig.ident;
    let tool_name = tool_attr.name.unwrap_or_else(|| fn_ident.to_string());
    let tool_description = tool_attr.description.unwrap_or_default();

    let struct_name = to_pascal_case(&fn_ident.to_string());
    let tool_struct = format_ident!("{}Tool", struct_name);

    let inputs = &func.sig.inputs;

    if inputs.iter().any(|arg| matches!(arg, FnArg::Receiver(_))) {
        return Err(syn::Error::new_spanned(
            inputs,
            "#[tool] must be applied to a free function, not a method with a receiver (`self`).",
        ));
    }

    let typed_params: Vec<&syn::PatType> = inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(pat_type) => Some(pat_type),
            _ => None,
        })
        .collect();

    // Inline tools have no access to a CallContext (see crate::inline::InlineTool),
    // so unlike the family's other #[tool] macro there is no second `ctx` parameter
    // to recognize here — just the one input type.
    let input_type: Type = match typed_params.as_slice() {
        [input] => (*input.ty).clone(),
        _ => {
            return Err(syn::Error::new_spanned(
                inputs,
                "#[tool] functions must take exactly one argument: a single input struct \
                 deriving serde::Deserialize and schemars::JsonSchema. \
                 Wrap multiple parameters in that struct instead.",
            ));
        }
    };

    let output_type: Type = match &func.sig.output {
        ReturnType::Type(_, ty) => extract_result_ok_type(ty).ok_or_else(|| {
            syn::Error::new_spanned(
                ty,
                "#[tool] function must return Result<T, toolindex_core::IndexError>",
            )
        })?,
        ReturnType::Default => {
            return Err(syn::Error::new_spanned(
                &func.sig,
                "#[tool] function must have a return type",
            ));
        }
    };

    let doc_comment = format!("Auto-generated inline tool for [`{fn_ident}`].");

    let expanded = quote! {
        #func

        #[doc = #doc_comment]
        #[derive(Debug, Clone, Copy, Default)]
        pub struct #tool_struct;

        impl toolindex_core::InlineTool for #tool_struct {
            const NAME: &'static str = #tool_name;
            const DESCRIPTION: &'static str = #tool_description;

            fn params() -> Vec<toolindex_core::ParamDescriptor> {
                toolindex_core::params_from_schema::<#input_type>()
            }

            fn return_type() -> toolindex_core::TypeTag {
                toolindex_core::type_tag_of::<#output_type>()
            }

            fn call(
                &self,
                args: serde_json::Value,
            ) -> futures::future::BoxFuture<'static, Result<toolindex_core::CallOutput, toolindex_core::IndexError>>
            {
                Box::pin(async move {
                    let input: #input_type = serde_json::from_value(args)
                        .map_err(|e| toolindex_core::IndexError::invocation(#tool_name, e.to_string()))?;
                    let output = #fn_ident(input).await?;
                    let value = serde_json::to_value(output)
                        .map_err(|e| toolindex_core::IndexError::invocation(#tool_name, e.to_string()))?;
                    Ok(toolindex_core::CallOutput::Single(value))
                })
            }
        }
    };

    Ok(expanded)
}

/// Convert snake_case to PascalCase.
fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Try to extract the Ok type from a Result<T, E> type.
fn extract_result_ok_type(ty: &Type) -> Option<Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let last_segment = type_path.path.segments.last()?;
    if last_segment.ident == "Result"
        && let syn::PathArguments::AngleBracketed(args) = &last_segment.arguments
        && let Some(syn::GenericArgument::Type(ok_type)) = args.args.first()
    {
        return Some(ok_type.clone());
    }
    None
}
