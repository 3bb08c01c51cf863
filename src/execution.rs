//! The failure-routing executor shared by [`ChainBuilder`](crate::ChainBuilder)
//! and [`Chain`](crate::Chain).

use crate::cancel::CancellationToken;
use crate::config::{CancellationPolicy, ChainConfig};
use crate::error::{ChainError, Escalation};
use crate::outcome::{Outcome, TypedOutcome};
use crate::step::{AsyncOperation, ChainToken, FailureHandler, Step, StepId, StepOperation};
use std::any::{self, Any};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How a run ended.
///
/// Failed outcomes are ordinary results. Escalation and cancellation are kept
/// apart so callers can treat them as hard stops.
#[derive(Debug)]
pub enum Execution {
    /// Every executed step succeeded, or its failure was swallowed by a fallback.
    /// Holds the last step's outcome.
    Succeeded(Outcome),
    /// A step failed without a fallback. Holds that step's outcome.
    ///
    /// An empty chain also ends here, with an empty message.
    Failed(Outcome),
    /// A step registered with `throw_on_failed` failed.
    Escalated(Escalation),
    /// The cancellation token fired before `step` was invoked.
    Cancelled {
        /// The step that would have run next.
        step: StepId,
    },
}

impl Execution {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Execution::Succeeded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Execution::Failed(_))
    }

    pub fn is_escalated(&self) -> bool {
        matches!(self, Execution::Escalated(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Execution::Cancelled { .. })
    }

    /// The final outcome, for runs that produced one.
    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            Execution::Succeeded(outcome) | Execution::Failed(outcome) => Some(outcome),
            Execution::Escalated(_) | Execution::Cancelled { .. } => None,
        }
    }

    /// Returns the final outcome, re-raising escalation and cancellation as
    /// errors.
    ///
    /// ```
    /// use kusari::{ChainBuilder, ChainError, Outcome};
    ///
    /// #[derive(Debug, Default, thiserror::Error)]
    /// #[error("unauthorized")]
    /// struct Unauthorized;
    ///
    /// let mut chain = ChainBuilder::new();
    /// let login = chain.continue_with(|| Outcome::failed("401"));
    /// chain.throw_on_failed::<Unauthorized>(login).unwrap();
    ///
    /// let execution = chain.run().unwrap();
    /// assert!(execution.is_escalated());
    /// assert!(matches!(execution.into_result(), Err(ChainError::Escalated(_))));
    /// ```
    pub fn into_result(self) -> Result<Outcome, ChainError> {
        match self {
            Execution::Succeeded(outcome) | Execution::Failed(outcome) => Ok(outcome),
            Execution::Escalated(escalation) => Err(ChainError::Escalated(escalation)),
            Execution::Cancelled { step } => Err(ChainError::Cancelled { step }),
        }
    }
}

enum Route {
    Next(Option<usize>, Outcome),
    Stop(Execution),
}

/// Borrowed view of a chain's arena.
pub(crate) struct Executor<'a> {
    pub(crate) token: ChainToken,
    pub(crate) steps: &'a [Step],
    pub(crate) head: Option<usize>,
    pub(crate) config: &'a ChainConfig,
}

impl Executor<'_> {
    pub(crate) fn run(&self) -> Result<Execution, ChainError> {
        let mut current = self.head;
        let mut result = Outcome::failed("");
        let mut executed = 0usize;

        while let Some(index) = current {
            let id = StepId::new(self.token, index);
            let step = &self.steps[index];
            debug!("Running {}", id);

            result = match &step.operation {
                StepOperation::Sync(operation) => operation.run(),
                StepOperation::Async { .. } => {
                    warn!("{} is asynchronous, chain stopped", id);
                    return Err(ChainError::IllegalState(format!(
                        "{} is asynchronous, run the chain with execute_async",
                        id
                    )));
                }
            };
            executed += 1;

            match self.route(id, step, result) {
                Route::Next(next, outcome) => {
                    result = outcome;
                    current = next;
                }
                Route::Stop(execution) => return Ok(execution),
            }
        }

        Ok(self.finish(result, executed))
    }

    pub(crate) async fn run_async(&self, cancel: &CancellationToken) -> Execution {
        let mut current = self.head;
        let mut result = Outcome::failed("");
        let mut executed = 0usize;

        while let Some(index) = current {
            let id = StepId::new(self.token, index);
            let step = &self.steps[index];

            if self.config.cancellation == CancellationPolicy::BetweenSteps
                && cancel.is_cancelled()
            {
                warn!("Chain cancelled before {}", id);
                return Execution::Cancelled { step: id };
            }
            debug!("Running {}", id);

            result = match &step.operation {
                StepOperation::Sync(operation) => operation.run(),
                StepOperation::Async {
                    operation,
                    resume_on_captured_context,
                } => match invoke_async(operation, *resume_on_captured_context).await {
                    Some(outcome) => outcome,
                    None => {
                        warn!("{} was aborted by the runtime", id);
                        return Execution::Cancelled { step: id };
                    }
                },
            };
            executed += 1;

            match self.route(id, step, result) {
                Route::Next(next, outcome) => {
                    result = outcome;
                    current = next;
                }
                Route::Stop(execution) => return execution,
            }
        }

        self.finish(result, executed)
    }

    fn route(&self, id: StepId, step: &Step, outcome: Outcome) -> Route {
        if outcome.is_ok() {
            return Route::Next(step.next, outcome);
        }

        if step.continue_on_failure {
            info!(
                "{} failed: '{}', continuing with fallback",
                id,
                outcome.message()
            );
            return Route::Next(step.next, outcome);
        }

        match &step.failure_handler {
            Some(FailureHandler::Notify(handler)) => {
                warn!("{} failed: '{}', chain aborted", id, outcome.message());
                handler(outcome.message());
            }
            Some(FailureHandler::Escalate(raise)) => {
                let raised = raise();
                error!(
                    "{} failed: '{}', escalating: {}",
                    id,
                    outcome.message(),
                    raised
                );
                return Route::Stop(Execution::Escalated(Escalation::new(
                    id,
                    outcome.message(),
                    raised,
                )));
            }
            None => warn!("{} failed: '{}', chain aborted", id, outcome.message()),
        }

        Route::Stop(Execution::Failed(outcome))
    }

    fn finish(&self, result: Outcome, executed: usize) -> Execution {
        if executed == 0 {
            debug!("Chain has no steps");
        }
        if result.is_failed() {
            Execution::Failed(result)
        } else {
            info!("Chain completed successfully after {} steps", executed);
            Execution::Succeeded(result)
        }
    }
}

/// Awaits an asynchronous step. `None` when the runtime aborted the task.
async fn invoke_async(
    operation: &Arc<dyn AsyncOperation>,
    resume_on_captured_context: bool,
) -> Option<Outcome> {
    if resume_on_captured_context || tokio::runtime::Handle::try_current().is_err() {
        return Some(operation.run().await);
    }

    let operation = Arc::clone(operation);
    match tokio::spawn(async move { operation.run().await }).await {
        Ok(outcome) => Some(outcome),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => None,
    }
}

/// Narrows a chain's final outcome for the typed entry points.
pub(crate) fn narrow<T: Any + Default>(outcome: Outcome) -> Result<TypedOutcome<T>, ChainError> {
    if outcome.is_failed() {
        return Ok(TypedOutcome::failed(outcome.message(), T::default()));
    }

    outcome.narrow::<T>().map_err(|outcome| {
        ChainError::IllegalState(format!(
            "chain produced {} but {} was requested",
            outcome.payload_type_name().unwrap_or("no payload"),
            any::type_name::<T>()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result() {
        let outcome = Execution::Failed(Outcome::failed("X"))
            .into_result()
            .expect("failed outcomes are returned by value");
        assert_eq!(outcome.message(), "X");

        let step = StepId::new(ChainToken::next(), 3);
        let execution = Execution::Cancelled { step };
        match execution.into_result() {
            Err(ChainError::Cancelled { step: cancelled }) => assert_eq!(cancelled, step),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_outcome_accessor() {
        let execution = Execution::Succeeded(Outcome::ok_with(1u8));
        assert!(execution.is_succeeded());
        assert_eq!(execution.outcome().and_then(|o| o.payload::<u8>()), Some(&1));

        let step = StepId::new(ChainToken::next(), 0);
        assert!(Execution::Cancelled { step }.outcome().is_none());
    }

    #[test]
    fn test_narrow_failed_outcome_uses_default() {
        let typed = narrow::<String>(Outcome::failed_with("person info", 5u32))
            .expect("failed outcomes always narrow");
        assert!(typed.is_failed());
        assert_eq!(typed.message(), "person info");
        assert_eq!(typed.value(), "");
    }

    #[test]
    fn test_narrow_mismatch() {
        match narrow::<String>(Outcome::ok_with(5u32)) {
            Err(ChainError::IllegalState(msg)) => {
                assert_eq!(msg, "chain produced u32 but alloc::string::String was requested");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        match narrow::<String>(Outcome::ok()) {
            Err(ChainError::IllegalState(msg)) => assert!(msg.starts_with("chain produced no payload")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
