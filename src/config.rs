use serde::{Deserialize, Serialize};

/// How the asynchronous executor reacts to its cancellation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationPolicy {
    /// Check the token before invoking each step and stop with
    /// [`Execution::Cancelled`](crate::Execution::Cancelled) once it fires.
    #[default]
    BetweenSteps,
    /// Never consult the token. Operations may still observe it themselves.
    Ignore,
}

/// Configuration for running a chain.
///
/// # Examples
///
/// ```
/// use kusari::{CancellationPolicy, ChainBuilder, ChainConfig};
///
/// let config = ChainConfig {
///     cancellation: CancellationPolicy::Ignore,
/// };
/// let chain = ChainBuilder::new().with_config(config.clone()).build();
/// assert_eq!(chain.config(), &config);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Cancellation handling for `execute_async` and friends.
    /// Default: [`CancellationPolicy::BetweenSteps`].
    pub cancellation: CancellationPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ChainConfig::default();
        assert_eq!(config.cancellation, CancellationPolicy::BetweenSteps);
    }

    #[test]
    fn test_deserialize_config() {
        let config: ChainConfig =
            serde_json::from_str(r#"{ "cancellation": "ignore" }"#).expect("valid config");
        assert_eq!(config.cancellation, CancellationPolicy::Ignore);

        let config: ChainConfig = serde_json::from_str("{}").expect("valid config");
        assert_eq!(config, ChainConfig::default());
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let result = serde_json::from_str::<ChainConfig>(r#"{ "cancellation": "sometimes" }"#);
        assert!(result.is_err());
    }
}
