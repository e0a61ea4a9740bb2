//! Host-side reconstruction (§4.4): turning an extracted, wrapped descriptor
//! plus an [`Invoker`] into a callable that sits beside in-process tools in an
//! index, indistinguishable at the [`ErasedInlineTool`] boundary.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use crate::context::CallContext;
use crate::descriptor::{ParamDescriptor, Shape, ToolDescriptor, TypeTag};
use crate::error::IndexError;
use crate::inline::{CallOutput, ErasedInlineTool};
use crate::invoker::Invoker;
use crate::wrapper::{wrap_descriptor, WrappedDescriptor};

/// A local or remote tool, reconstructed on the host as a callable proxy.
///
/// Holds the wrapped descriptor (the apparent signature callers see, plus the
/// hidden tables [`WrappedDescriptor::bind_call`] uses to undo §4.6's
/// adaptation) and an [`Invoker`] bound to the prepared source that produced
/// it.
pub struct ReconstructedTool {
    wrapped: WrappedDescriptor,
    invoker: Arc<Invoker>,
}

impl ReconstructedTool {
    pub fn new(descriptor: ToolDescriptor, invoker: Arc<Invoker>) -> Self {
        Self {
            wrapped: wrap_descriptor(&descriptor),
            invoker,
        }
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.wrapped.apparent
    }

    /// Call with a host-provided [`CallContext`], e.g. one carrying a caller's
    /// own cancellation scope. [`ErasedInlineTool::call`] below uses a fresh
    /// default context for callers that don't need cancellation control.
    pub async fn call_with_context(
        &self,
        args: Value,
        ctx: &CallContext,
    ) -> Result<CallOutput, IndexError> {
        let kwargs = match args {
            Value::Object(map) => map,
            other => {
                return Err(IndexError::invocation(
                    &self.wrapped.apparent.id,
                    format!("expected an object of keyword arguments, got {other}"),
                ))
            }
        };
        let bound = self.wrapped.bind_call(kwargs)?;
        self.invoker
            .call(
                &self.wrapped.apparent.id,
                Value::Object(bound),
                self.wrapped.apparent.shape,
                ctx,
            )
            .await
    }
}

impl ErasedInlineTool for ReconstructedTool {
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
        // `ReconstructedTool` is always held behind an `Arc` by the index
        // (mirroring every other `ErasedInlineTool`), so cloning the pieces
        // needed for the 'static future is cheap and keeps this trait method
        // borrow-free like its siblings.
        let wrapped_id = self.wrapped.apparent.id.clone();
        let kwargs = match args {
            Value::Object(map) => Ok(map),
            other => Err(IndexError::invocation(
                &wrapped_id,
                format!("expected an object of keyword arguments, got {other}"),
            )),
        };
        let invoker = self.invoker.clone();
        let shape = self.wrapped.apparent.shape;
        let bound = kwargs.and_then(|kw| self.wrapped.bind_call(kw));

        async move {
            let bound = bound?;
            invoker
                .call(&wrapped_id, Value::Object(bound), shape, &CallContext::new())
                .await
        }
        .boxed()
    }

    fn call_with_context(
        &self,
        args: Value,
        ctx: &CallContext,
    ) -> BoxFuture<'static, Result<CallOutput, IndexError>> {
        let wrapped_id = self.wrapped.apparent.id.clone();
        let kwargs = match args {
            Value::Object(map) => Ok(map),
            other => Err(IndexError::invocation(
                &wrapped_id,
                format!("expected an object of keyword arguments, got {other}"),
            )),
        };
        let invoker = self.invoker.clone();
        let shape = self.wrapped.apparent.shape;
        let bound = kwargs.and_then(|kw| self.wrapped.bind_call(kw));
        let ctx = ctx.clone();

        async move {
            let bound = bound?;
            invoker
                .call(&wrapped_id, Value::Object(bound), shape, &ctx)
                .await
        }
        .boxed()
    }
}
