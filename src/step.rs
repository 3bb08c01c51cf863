use crate::error::BoxError;
use crate::outcome::Outcome;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity of the builder a [`StepId`] was issued by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ChainToken(u64);

impl ChainToken {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to a step appended to a [`ChainBuilder`](crate::ChainBuilder).
///
/// Handles are only issued by appending a step, so every failure policy is
/// attached to a step that exists. A handle is bound to the builder that
/// issued it.
///
/// # Examples
///
/// ```
/// use kusari::{ChainBuilder, Outcome};
///
/// let mut chain = ChainBuilder::new();
/// let first = chain.continue_with(Outcome::ok);
/// let second = chain.continue_with(Outcome::ok);
///
/// assert_eq!(first.index(), 0);
/// assert_eq!(second.to_string(), "step#1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId {
    chain: ChainToken,
    index: usize,
}

impl StepId {
    pub(crate) fn new(chain: ChainToken, index: usize) -> Self {
        Self { chain, index }
    }

    pub(crate) fn chain(&self) -> ChainToken {
        self.chain
    }

    /// Position of the step in the builder's arena (append order, not chain
    /// order).
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step#{}", self.index)
    }
}

/// A synchronous step operation.
///
/// Implemented for every `Fn() -> Outcome` closure. Implement it directly to
/// define a step as a type.
///
/// ```
/// use kusari::{ChainBuilder, Operation, Outcome};
///
/// struct Ping;
///
/// impl Operation for Ping {
///     fn run(&self) -> Outcome {
///         Outcome::ok()
///     }
/// }
///
/// let mut chain = ChainBuilder::new();
/// chain.continue_with(Ping);
/// assert!(chain.execute().unwrap().is_ok());
/// ```
pub trait Operation: Send + Sync {
    fn run(&self) -> Outcome;
}

impl<F> Operation for F
where
    F: Fn() -> Outcome + Send + Sync,
{
    fn run(&self) -> Outcome {
        (self)()
    }
}

/// An asynchronous step operation.
///
/// Implemented for every closure returning a `Send + 'static` future that
/// resolves to an [`Outcome`].
///
/// ```
/// use kusari::{AsyncOperation, Outcome};
/// use async_trait::async_trait;
///
/// struct FetchProfile;
///
/// #[async_trait]
/// impl AsyncOperation for FetchProfile {
///     async fn run(&self) -> Outcome {
///         Outcome::ok_with("profile".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncOperation: Send + Sync {
    async fn run(&self) -> Outcome;
}

#[async_trait]
impl<F, Fut> AsyncOperation for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    async fn run(&self) -> Outcome {
        (self)().await
    }
}

pub(crate) enum StepOperation {
    Sync(Arc<dyn Operation>),
    Async {
        operation: Arc<dyn AsyncOperation>,
        resume_on_captured_context: bool,
    },
}

pub(crate) enum FailureHandler {
    /// Called with the failure message, the chain still aborts.
    Notify(Arc<dyn Fn(&str) + Send + Sync>),
    /// Builds the error the chain escalates with.
    Escalate(Arc<dyn Fn() -> BoxError + Send + Sync>),
}

/// One node of a chain: an operation plus its failure policy.
pub struct Step {
    pub(crate) operation: StepOperation,
    pub(crate) next: Option<usize>,
    pub(crate) continue_on_failure: bool,
    pub(crate) failure_handler: Option<FailureHandler>,
}

impl Step {
    pub(crate) fn new(operation: StepOperation) -> Self {
        Self {
            operation,
            next: None,
            continue_on_failure: false,
            failure_handler: None,
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self.operation, StepOperation::Async { .. })
    }

    /// `Some(flag)` for asynchronous steps.
    pub fn resume_on_captured_context(&self) -> Option<bool> {
        match self.operation {
            StepOperation::Sync(_) => None,
            StepOperation::Async {
                resume_on_captured_context,
                ..
            } => Some(resume_on_captured_context),
        }
    }

    pub fn continue_on_failure(&self) -> bool {
        self.continue_on_failure
    }

    pub fn has_failure_handler(&self) -> bool {
        self.failure_handler.is_some()
    }

    /// Returns `true` if a failure of this step escalates.
    pub fn escalates(&self) -> bool {
        matches!(self.failure_handler, Some(FailureHandler::Escalate(_)))
    }

    pub(crate) fn has_policy(&self) -> bool {
        self.continue_on_failure || self.failure_handler.is_some()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handler = match self.failure_handler {
            None => None,
            Some(FailureHandler::Notify(_)) => Some("notify"),
            Some(FailureHandler::Escalate(_)) => Some("escalate"),
        };
        f.debug_struct("Step")
            .field("async", &self.is_async())
            .field("next", &self.next)
            .field("continue_on_failure", &self.continue_on_failure)
            .field("failure_handler", &handler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Validate;

    impl Operation for Validate {
        fn run(&self) -> Outcome {
            Outcome::failed("invalid")
        }
    }

    #[test]
    fn test_step_id_display() {
        let id = StepId::new(ChainToken::next(), 4);
        assert_eq!(id.to_string(), "step#4");
        assert_eq!(id.index(), 4);
    }

    #[test]
    fn test_chain_tokens_are_unique() {
        assert_ne!(ChainToken::next(), ChainToken::next());
    }

    #[test]
    fn test_closure_and_type_operations() {
        let closure = || Outcome::ok_with(1u8);
        assert_eq!(Operation::run(&closure).payload::<u8>(), Some(&1));
        assert_eq!(Validate.run().message(), "invalid");
    }

    #[test]
    fn test_async_closure_operation() {
        let fetch = || async { Outcome::failed("timeout") };
        let outcome = tokio_test::block_on(AsyncOperation::run(&fetch));
        assert_eq!(outcome.message(), "timeout");
    }

    #[test]
    fn test_new_step_has_no_policy() {
        let step = Step::new(StepOperation::Sync(Arc::new(Validate)));
        assert!(!step.is_async());
        assert!(!step.has_policy());
        assert_eq!(step.resume_on_captured_context(), None);
        assert_eq!(
            format!("{:?}", step),
            "Step { async: false, next: None, continue_on_failure: false, failure_handler: None }"
        );
    }
}
