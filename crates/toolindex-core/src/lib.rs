//! Runtime for declaring a set of callable tools — in-process, on a local
//! disk folder, or in a separately versioned git repository — and presenting
//! them uniformly to an LLM-calling application: one signature model, one
//! wrapping pass, one set of schema dialects, one call path.
//!
//! Start at [`index::IndexBuilder`].

pub mod context;
pub mod descriptor;
pub mod env_manager;
pub mod error;
pub mod extractor;
pub mod index;
pub mod inline;
pub mod invoker;
pub mod manifest;
pub mod parse;
pub mod reconstructor;
pub mod reflect;
pub mod schema;
pub mod source;
pub mod wrapper;

pub use context::CallContext;
pub use descriptor::{Default, ParamDescriptor, ParamKind, Shape, ToolDescriptor, TypeTag};
pub use error::{IndexError, NameError};
pub use index::{Index, IndexBuilder, IndexConfig};
pub use inline::{erase, CallOutput, ErasedInlineTool, InlineTool, ValueStream};
pub use parse::{ParsedCall, PromptParser, StrictJsonParser};
pub use reflect::{params_from_schema, type_tag_of};
pub use schema::Dialect;
pub use source::{EnvVarMap, RemoteId, ToolSource};
