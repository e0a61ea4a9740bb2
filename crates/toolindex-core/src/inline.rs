//! In-process tool definitions (the `Inline{fn}` source variant).
//!
//! Remote and local-source tools only ever reach the host as JSON-in/JSON-out
//! proxies (they cross a process boundary). For consistency an inline tool is
//! erased to the same shape here, so [`crate::wrapper`] and [`crate::schema`]
//! never need to special-case where a tool came from.

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::context::CallContext;
use crate::descriptor::{ParamDescriptor, Shape, TypeTag};
use crate::error::IndexError;

/// One produced value of a generator-shaped call.
pub type ValueStream = BoxStream<'static, Result<Value, IndexError>>;

/// The result of calling any tool, in-process or remote, uniformly.
pub enum CallOutput {
    Single(Value),
    Stream(ValueStream),
}

/// Native-first trait for defining an in-process tool.
///
/// Modeled on this family's existing `Tool` trait: no serde bounds on the
/// trait itself, a `'static` name/description pair, and an async `call`. The
/// schema/JSON boundary lives in [`ErasedInlineTool`], which every `InlineTool`
/// gets for free via the blanket impl below — mirroring the family's
/// `ToolCodec` split between native calls and the wire format.
pub trait InlineTool: Send + Sync + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    /// Parameter descriptors, in declaration order, as a caller of
    /// [`ErasedInlineTool::descriptor`] would see them before wrapping.
    fn params() -> Vec<ParamDescriptor>;
    fn return_type() -> TypeTag;
    fn shape() -> Shape {
        Shape::Plain
    }

    fn call(&self, args: Value) -> BoxFuture<'static, Result<CallOutput, IndexError>>;
}

/// Type-erased form of [`InlineTool`], analogous to this family's `ErasedTool`.
///
/// Also implemented by [`crate::reconstructor::ReconstructedTool`] for local
/// and remote sources, whose name/description are extracted at runtime rather
/// than known at compile time — hence borrowed `&str` here rather than the
/// `&'static str` convenience `InlineTool` itself gets.
pub trait ErasedInlineTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn params(&self) -> Vec<ParamDescriptor>;
    fn return_type(&self) -> TypeTag;
    fn shape(&self) -> Shape;
    fn call(&self, args: Value) -> BoxFuture<'static, Result<CallOutput, IndexError>>;

    /// Like [`Self::call`], but honoring `ctx`'s cancellation.
    ///
    /// In-process tools have no way to act on cancellation mid-call (there is
    /// no child process to kill), so the default implementation just ignores
    /// `ctx` and delegates to [`Self::call`]. [`crate::reconstructor::ReconstructedTool`]
    /// overrides this to forward `ctx` to its [`crate::invoker::Invoker`].
    fn call_with_context(
        &self,
        args: Value,
        _ctx: &CallContext,
    ) -> BoxFuture<'static, Result<CallOutput, IndexError>> {
        self.call(args)
    }
}

struct Erased<T: InlineTool> {
    tool: T,
}

impl<T: InlineTool> ErasedInlineTool for Erased<T> {
    fn name(&self) -> &str {
        T::NAME
    }

    fn description(&self) -> &str {
        T::DESCRIPTION
    }

    fn params(&self) -> Vec<ParamDescriptor> {
        T::params()
    }

    fn return_type(&self) -> TypeTag {
        T::return_type()
    }

    fn shape(&self) -> Shape {
        T::shape()
    }

    fn call(&self, args: Value) -> BoxFuture<'static, Result<CallOutput, IndexError>> {
        self.tool.call(args)
    }
}

/// Erase a concrete [`InlineTool`] so it can sit beside remote proxies in an index.
pub fn erase<T: InlineTool>(tool: T) -> std::sync::Arc<dyn ErasedInlineTool> {
    std::sync::Arc::new(Erased { tool })
}
