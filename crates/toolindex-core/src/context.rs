//! Call context threaded through every tool invocation.

use tokio_util::sync::CancellationToken;

/// Context passed to tool executions.
///
/// Extensible for future needs; today it carries only the cancellation token a
/// remote call watches to decide whether to terminate its child process (see
/// [`crate::invoker`]).
#[derive(Clone, Default, Debug)]
pub struct CallContext {
    cancellation: CancellationToken,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that is already linked to the given token, e.g. a child token
    /// derived from a caller's own cancellation scope.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self { cancellation }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_not_cancelled() {
        let ctx = CallContext::new();
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn cancelling_token_reflects_in_context() {
        let token = CancellationToken::new();
        let ctx = CallContext::with_cancellation(token.clone());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
