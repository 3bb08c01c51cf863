use crate::step::StepId;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed error raised by an escalating step.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A failure that a step's policy turned into a hard stop.
///
/// Produced by steps registered with
/// [`throw_on_failed`](crate::ChainBuilder::throw_on_failed). Carries the
/// error instance that was raised together with the failing step's message.
pub struct Escalation {
    step: StepId,
    message: String,
    error: BoxError,
}

impl Escalation {
    pub(crate) fn new(step: StepId, message: impl Into<String>, error: BoxError) -> Self {
        Self {
            step,
            message: message.into(),
            error,
        }
    }

    /// The step whose failure escalated.
    pub fn step(&self) -> StepId {
        self.step
    }

    /// The failing step's diagnostic message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The raised error.
    pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.error.as_ref()
    }

    /// Returns the raised error if it is an `E`.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.error.downcast_ref::<E>()
    }

    pub fn into_error(self) -> BoxError {
        self.error
    }
}

impl fmt::Debug for Escalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Escalation")
            .field("step", &self.step)
            .field("message", &self.message)
            .field("error", &self.error)
            .finish()
    }
}

impl fmt::Display for Escalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} escalated '{}': {}", self.step, self.message, self.error)
    }
}

/// Errors raised while building or executing a chain.
///
/// Domain failures are not errors: a failing step produces a failed
/// [`Outcome`](crate::Outcome) which is returned by value. Only the conditions
/// below leave the normal return path.
///
/// ```
/// use kusari::ChainError;
///
/// fn describe(error: &ChainError) -> String {
///     match error {
///         ChainError::InvalidArgument(msg) => format!("bad argument: {}", msg),
///         ChainError::IllegalState(msg) => format!("illegal state: {}", msg),
///         ChainError::Escalated(escalation) => format!("fatal: {}", escalation.message()),
///         ChainError::Cancelled { step } => format!("cancelled before {}", step),
///         _ => error.to_string(),
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ChainError {
    /// An argument passed to the builder is not usable, such as a step handle
    /// issued by another builder.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The call is not allowed in the current state.
    ///
    /// Raised when:
    /// - a second failure policy is attached to the same step
    /// - a typed execution finds a successful result of another type
    /// - the synchronous executor reaches an asynchronous step
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A step registered with `throw_on_failed` failed.
    #[error("Step escalated: {0}")]
    Escalated(#[source] Escalation),

    /// The run was cancelled before the given step was invoked.
    #[error("Cancelled before {step}")]
    Cancelled {
        /// The step that would have run next.
        step: StepId,
    },
}

impl StdError for Escalation {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.error.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::ChainToken;

    #[derive(Debug, Error)]
    #[error("token rejected")]
    struct TokenRejected;

    #[test]
    fn test_error_display() {
        let error = ChainError::IllegalState("step#0 already has a failure policy".to_string());
        assert_eq!(
            error.to_string(),
            "Illegal state: step#0 already has a failure policy"
        );

        let error = ChainError::Cancelled {
            step: StepId::new(ChainToken::next(), 2),
        };
        assert_eq!(error.to_string(), "Cancelled before step#2");
    }

    #[test]
    fn test_escalation_source_chain() {
        let step = StepId::new(ChainToken::next(), 1);
        let error = ChainError::Escalated(Escalation::new(
            step,
            "401",
            Box::new(TokenRejected),
        ));

        assert_eq!(
            error.to_string(),
            "Step escalated: step#1 escalated '401': token rejected"
        );

        let escalation = error.source().expect("escalation is the source");
        let raised = escalation.source().expect("raised error is the source");
        assert_eq!(raised.to_string(), "token rejected");
    }

    #[test]
    fn test_escalation_downcast() {
        let escalation = Escalation::new(
            StepId::new(ChainToken::next(), 0),
            "denied",
            Box::new(TokenRejected),
        );
        assert!(escalation.downcast_ref::<TokenRejected>().is_some());
        assert!(escalation.downcast_ref::<std::fmt::Error>().is_none());
        assert_eq!(escalation.message(), "denied");
    }
}
