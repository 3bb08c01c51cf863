use crate::cancel::CancellationToken;
use crate::config::ChainConfig;
use crate::error::{BoxError, ChainError};
use crate::execution::{self, Execution, Executor};
use crate::outcome::{Outcome, TypedOutcome};
use crate::step::{
    AsyncOperation, ChainToken, FailureHandler, Operation, Step, StepId, StepOperation,
};
use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Builder for a linear chain of steps.
///
/// Steps run in the order they are appended. Appending returns a [`StepId`]
/// through which a failure policy can be attached to that step:
///
/// - [`continue_on_failed`](Self::continue_on_failed) splices a fallback step
///   right after it and swallows its failure
/// - [`on_failed`](Self::on_failed) notifies a callback, the chain still aborts
/// - [`throw_on_failed`](Self::throw_on_failed) escalates the failure to an error
///
/// A step carries at most one policy.
///
/// # Examples
///
/// ```
/// use kusari::{ChainBuilder, Outcome};
///
/// let mut chain = ChainBuilder::new();
/// chain.continue_with(|| Outcome::ok());
/// let fetch = chain.continue_with(|| Outcome::failed("stale token"));
/// chain
///     .continue_on_failed(fetch, || Outcome::ok_with("refreshed".to_string()))
///     .unwrap();
///
/// let profile = chain.execute_typed::<String>().unwrap();
/// assert!(profile.is_ok());
/// assert_eq!(profile.value(), "refreshed");
/// ```
pub struct ChainBuilder {
    token: ChainToken,
    steps: Vec<Step>,
    head: Option<usize>,
    tail: Option<usize>,
    config: ChainConfig,
}

impl fmt::Debug for ChainBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainBuilder")
            .field("steps", &self.steps)
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for ChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            token: ChainToken::next(),
            steps: Vec::new(),
            head: None,
            tail: None,
            config: ChainConfig::default(),
        }
    }

    /// Replaces the run configuration.
    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Appends a synchronous step.
    pub fn continue_with<O: Operation + 'static>(&mut self, operation: O) -> StepId {
        self.append(StepOperation::Sync(Arc::new(operation)))
    }

    /// Appends an asynchronous step.
    ///
    /// With `resume_on_captured_context` the step's future is polled on the
    /// caller's task. Otherwise it is spawned on the ambient tokio runtime and
    /// the chain resumes once it completes.
    pub fn continue_with_async<O: AsyncOperation + 'static>(
        &mut self,
        operation: O,
        resume_on_captured_context: bool,
    ) -> StepId {
        self.append(StepOperation::Async {
            operation: Arc::new(operation),
            resume_on_captured_context,
        })
    }

    /// Swallows a failure of `step` and runs `fallback` in its place.
    ///
    /// The fallback is spliced in as the step directly after `step`, so it also
    /// runs when `step` succeeds. Returns the fallback's handle, which can take
    /// a policy of its own.
    ///
    /// # Errors
    ///
    /// - [`ChainError::InvalidArgument`] if `step` was issued by another builder
    /// - [`ChainError::IllegalState`] if `step` already has a failure policy
    pub fn continue_on_failed<O: Operation + 'static>(
        &mut self,
        step: StepId,
        fallback: O,
    ) -> Result<StepId, ChainError> {
        self.splice_fallback(step, StepOperation::Sync(Arc::new(fallback)))
    }

    /// Asynchronous flavour of [`continue_on_failed`](Self::continue_on_failed).
    pub fn continue_on_failed_async<O: AsyncOperation + 'static>(
        &mut self,
        step: StepId,
        fallback: O,
        resume_on_captured_context: bool,
    ) -> Result<StepId, ChainError> {
        self.splice_fallback(
            step,
            StepOperation::Async {
                operation: Arc::new(fallback),
                resume_on_captured_context,
            },
        )
    }

    /// Calls `side_effect` with the failure message when `step` fails.
    ///
    /// The handler is for notification only: the chain still aborts with the
    /// failed outcome.
    ///
    /// # Errors
    ///
    /// Same as [`continue_on_failed`](Self::continue_on_failed).
    pub fn on_failed<F>(&mut self, step: StepId, side_effect: F) -> Result<&mut Self, ChainError>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let index = self.policy_slot(step)?;
        self.steps[index].failure_handler = Some(FailureHandler::Notify(Arc::new(side_effect)));
        Ok(self)
    }

    /// Escalates a failure of `step` by raising `E::default()`.
    ///
    /// The run ends with [`Execution::Escalated`], which the `execute*` entry
    /// points return as [`ChainError::Escalated`].
    ///
    /// # Errors
    ///
    /// Same as [`continue_on_failed`](Self::continue_on_failed).
    pub fn throw_on_failed<E>(&mut self, step: StepId) -> Result<&mut Self, ChainError>
    where
        E: StdError + Default + Send + Sync + 'static,
    {
        let index = self.policy_slot(step)?;
        let raise = || -> BoxError { Box::new(E::default()) };
        self.steps[index].failure_handler = Some(FailureHandler::Escalate(Arc::new(raise)));
        Ok(self)
    }

    /// Number of steps, fallbacks included.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The first step of the chain.
    pub fn head(&self) -> Option<StepId> {
        self.head.map(|index| StepId::new(self.token, index))
    }

    /// The step the next append is linked after.
    pub fn tail(&self) -> Option<StepId> {
        self.tail.map(|index| StepId::new(self.token, index))
    }

    /// Returns the step for a handle issued by this builder.
    pub fn step(&self, id: StepId) -> Option<&Step> {
        if id.chain() != self.token {
            return None;
        }
        self.steps.get(id.index())
    }

    /// Iterates over the steps in execution order.
    pub fn steps(&self) -> Steps<'_> {
        Steps::new(self.token, &self.steps, self.head)
    }

    /// Freezes the builder into a reusable [`Chain`].
    pub fn build(self) -> Chain {
        Chain {
            token: self.token,
            steps: Arc::from(self.steps),
            head: self.head,
            config: Arc::new(self.config),
        }
    }

    /// Runs the chain synchronously. See [`Chain::run`].
    pub fn run(&self) -> Result<Execution, ChainError> {
        self.executor().run()
    }

    /// Runs the chain synchronously. See [`Chain::execute`].
    pub fn execute(&self) -> Result<Outcome, ChainError> {
        self.run()?.into_result()
    }

    /// See [`Chain::execute_typed`].
    pub fn execute_typed<T: Any + Default>(&self) -> Result<TypedOutcome<T>, ChainError> {
        execution::narrow(self.execute()?)
    }

    /// See [`Chain::run_async`].
    pub async fn run_async(&self, cancel: &CancellationToken) -> Execution {
        self.executor().run_async(cancel).await
    }

    /// See [`Chain::execute_async`].
    pub async fn execute_async(&self, cancel: &CancellationToken) -> Result<Outcome, ChainError> {
        self.run_async(cancel).await.into_result()
    }

    /// See [`Chain::execute_async_typed`].
    pub async fn execute_async_typed<T: Any + Default>(
        &self,
        cancel: &CancellationToken,
    ) -> Result<TypedOutcome<T>, ChainError> {
        execution::narrow(self.execute_async(cancel).await?)
    }

    fn executor(&self) -> Executor<'_> {
        Executor {
            token: self.token,
            steps: &self.steps,
            head: self.head,
            config: &self.config,
        }
    }

    fn append(&mut self, operation: StepOperation) -> StepId {
        let index = self.steps.len();
        self.steps.push(Step::new(operation));

        match self.tail {
            Some(tail) => self.steps[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);

        StepId::new(self.token, index)
    }

    fn splice_fallback(
        &mut self,
        step: StepId,
        operation: StepOperation,
    ) -> Result<StepId, ChainError> {
        let index = self.policy_slot(step)?;
        let fallback_index = self.steps.len();

        let mut fallback = Step::new(operation);
        fallback.next = self.steps[index].next;
        self.steps.push(fallback);

        let target = &mut self.steps[index];
        target.continue_on_failure = true;
        target.next = Some(fallback_index);

        if self.tail == Some(index) {
            self.tail = Some(fallback_index);
        }

        Ok(StepId::new(self.token, fallback_index))
    }

    /// Validates that `step` belongs to this builder and has no policy yet.
    fn policy_slot(&self, step: StepId) -> Result<usize, ChainError> {
        if step.chain() != self.token || step.index() >= self.steps.len() {
            return Err(ChainError::InvalidArgument(format!(
                "{} was not issued by this builder",
                step
            )));
        }
        if self.steps[step.index()].has_policy() {
            return Err(ChainError::IllegalState(format!(
                "{} already has a failure policy",
                step
            )));
        }
        Ok(step.index())
    }
}

/// An immutable, reusable chain.
///
/// Cloning is cheap and clones share the same steps. A chain can be run any
/// number of times, from any number of tasks: running never mutates it.
///
/// # Examples
///
/// ```
/// use kusari::{CancellationToken, ChainBuilder, Outcome};
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut builder = ChainBuilder::new();
/// builder.continue_with(|| Outcome::ok());
/// builder.continue_with_async(|| async { Outcome::ok_with(7u32) }, false);
/// let chain = builder.build();
///
/// let cancel = CancellationToken::new();
/// let outcome = chain.execute_async_typed::<u32>(&cancel).await.unwrap();
/// assert_eq!(*outcome.value(), 7);
/// # }
/// ```
#[derive(Clone)]
pub struct Chain {
    token: ChainToken,
    steps: Arc<[Step]>,
    head: Option<usize>,
    config: Arc<ChainConfig>,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("steps", &self.steps.len())
            .field("head", &self.head)
            .field("config", &self.config)
            .finish()
    }
}

impl Chain {
    /// Creates a new chain builder.
    pub fn builder() -> ChainBuilder {
        ChainBuilder::new()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Iterates over the steps in execution order.
    pub fn steps(&self) -> Steps<'_> {
        Steps::new(self.token, &self.steps, self.head)
    }

    /// Runs the chain synchronously and reports how it ended.
    ///
    /// An empty chain ends as [`Execution::Failed`] with an empty message.
    ///
    /// # Errors
    ///
    /// [`ChainError::IllegalState`] when an asynchronous step is reached. Steps
    /// before it have already run.
    pub fn run(&self) -> Result<Execution, ChainError> {
        self.executor().run()
    }

    /// Runs the chain synchronously and returns its final outcome.
    ///
    /// Failed outcomes are returned as `Ok`.
    ///
    /// # Errors
    ///
    /// - [`ChainError::Escalated`] when a `throw_on_failed` step fails
    /// - [`ChainError::IllegalState`] when an asynchronous step is reached
    pub fn execute(&self) -> Result<Outcome, ChainError> {
        self.run()?.into_result()
    }

    /// Runs the chain and narrows its final outcome to `T`.
    ///
    /// A failed chain yields a failed `TypedOutcome<T>` holding `T::default()`
    /// and the original message.
    ///
    /// # Errors
    ///
    /// As [`execute`](Self::execute), plus [`ChainError::IllegalState`] when the
    /// chain succeeds without a `T` payload.
    pub fn execute_typed<T: Any + Default>(&self) -> Result<TypedOutcome<T>, ChainError> {
        execution::narrow(self.execute()?)
    }

    /// Runs the chain, awaiting asynchronous steps one at a time.
    pub async fn run_async(&self, cancel: &CancellationToken) -> Execution {
        self.executor().run_async(cancel).await
    }

    /// Asynchronous flavour of [`execute`](Self::execute).
    ///
    /// # Errors
    ///
    /// - [`ChainError::Escalated`] when a `throw_on_failed` step fails
    /// - [`ChainError::Cancelled`] when `cancel` fires between steps
    pub async fn execute_async(&self, cancel: &CancellationToken) -> Result<Outcome, ChainError> {
        self.run_async(cancel).await.into_result()
    }

    /// Asynchronous flavour of [`execute_typed`](Self::execute_typed).
    pub async fn execute_async_typed<T: Any + Default>(
        &self,
        cancel: &CancellationToken,
    ) -> Result<TypedOutcome<T>, ChainError> {
        execution::narrow(self.execute_async(cancel).await?)
    }

    fn executor(&self) -> Executor<'_> {
        Executor {
            token: self.token,
            steps: &self.steps,
            head: self.head,
            config: &self.config,
        }
    }
}

/// Iterator over a chain's steps in execution order.
pub struct Steps<'a> {
    token: ChainToken,
    steps: &'a [Step],
    current: Option<usize>,
}

impl<'a> Steps<'a> {
    fn new(token: ChainToken, steps: &'a [Step], head: Option<usize>) -> Self {
        Self {
            token,
            steps,
            current: head,
        }
    }
}

impl<'a> Iterator for Steps<'a> {
    type Item = (StepId, &'a Step);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.current?;
        let step = self.steps.get(index)?;
        self.current = step.next;
        Some((StepId::new(self.token, index), step))
    }
}
