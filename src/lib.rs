//! # Kusari (鎖)
//!
//! A small execution engine for chains of fallible steps.
//!
//! The name "Kusari" (鎖) means "chain" in Japanese: every step is a link, and
//! a failing link either breaks the chain or hands over to a fallback.
//!
//! ## Features
//!
//! - **Outcomes, not panics**: steps return an [`Outcome`] with a success flag,
//!   a diagnostic message and an optional payload
//! - **Failure policies**: fallback steps, notification handlers and escalation
//!   to a typed error
//! - **Sync and async**: one chain can mix plain and asynchronous steps and is
//!   run with [`Chain::execute`] or [`Chain::execute_async`]
//! - **Typed results**: [`Chain::execute_typed`] narrows the final payload
//! - **Cooperative cancellation**: checked between steps (see [`ChainConfig`])
//!
//! ## Quick Start
//!
//! ```rust
//! use kusari::prelude::*;
//!
//! let mut chain = ChainBuilder::new();
//! chain.continue_with(|| Outcome::ok());
//! chain.continue_with(|| Outcome::ok_with("Hello, Kusari!".to_string()));
//!
//! let greeting = chain.execute_typed::<String>().expect("chain ran");
//! assert_eq!(greeting.value(), "Hello, Kusari!");
//! ```
//!
//! ## Failure Policies
//!
//! ```rust
//! use kusari::prelude::*;
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Debug, Default, thiserror::Error)]
//! #[error("could not obtain a token")]
//! struct NoToken;
//!
//! let log = Arc::new(Mutex::new(Vec::<String>::new()));
//!
//! let mut chain = ChainBuilder::new();
//! let ping = chain.continue_with(|| Outcome::ok());
//! let sink = Arc::clone(&log);
//! chain
//!     .on_failed(ping, move |message| sink.lock().unwrap().push(message.to_string()))
//!     .expect("first policy for ping");
//!
//! let token = chain.continue_with(|| Outcome::ok());
//! chain.throw_on_failed::<NoToken>(token).expect("first policy for token");
//!
//! let info = chain.continue_with(|| Outcome::failed_with("person info", String::new()));
//! chain
//!     .continue_on_failed(info, || Outcome::ok_with("new person info".to_string()))
//!     .expect("first policy for info");
//!
//! let person = chain.execute_typed::<String>().expect("no escalation");
//! assert_eq!(person.value(), "new person info");
//! assert!(log.lock().unwrap().is_empty());
//! ```
//!
//! ## Async Steps
//!
//! ```rust
//! use kusari::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut chain = ChainBuilder::new();
//! chain.continue_with_async(|| async { Outcome::ok_with(1u32) }, false);
//! chain.continue_with_async(|| async { Outcome::ok_with(2u32) }, true);
//!
//! let cancel = CancellationToken::new();
//! let outcome = chain.execute_async_typed::<u32>(&cancel).await.expect("not cancelled");
//! assert_eq!(*outcome.value(), 2);
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use kusari::prelude::*;
//!
//! # let chain = ChainBuilder::new();
//! match chain.execute() {
//!     Ok(outcome) if outcome.is_failed() => eprintln!("Chain failed: {}", outcome.message()),
//!     Ok(_) => println!("Chain succeeded"),
//!     Err(ChainError::Escalated(escalation)) => {
//!         eprintln!("Step {} escalated: {}", escalation.step(), escalation.error());
//!     }
//!     Err(error) => eprintln!("Error: {}", error),
//! }
//! ```

mod cancel;
mod chain;
mod config;
mod error;
mod execution;
mod outcome;
mod payload;
mod step;

pub mod prelude;

pub use cancel::CancellationToken;
pub use chain::{Chain, ChainBuilder, Steps};
pub use config::{CancellationPolicy, ChainConfig};
pub use error::{BoxError, ChainError, Escalation};
pub use execution::Execution;
pub use outcome::{Outcome, TypedOutcome};
pub use payload::Payload;
pub use step::{AsyncOperation, Operation, Step, StepId};
