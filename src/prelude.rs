//! Commonly used types and traits

pub use crate::cancel::CancellationToken;
pub use crate::chain::{Chain, ChainBuilder};
pub use crate::config::{CancellationPolicy, ChainConfig};
pub use crate::error::{ChainError, Escalation};
pub use crate::execution::Execution;
pub use crate::outcome::{Outcome, TypedOutcome};
pub use crate::step::{AsyncOperation, Operation, StepId};
