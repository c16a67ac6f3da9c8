use super::ScriptValue;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Bindings visible to a script as the `env` constant.
pub type Environment = BTreeMap<String, ScriptValue>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("script compilation failed: {0}")]
    Compile(String),

    #[error("script execution failed: {0}")]
    Runtime(String),

    #[error("script exceeded resource limit: {0}")]
    ResourceLimit(String),

    #[error("script execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("script execution cancelled")]
    Cancelled,

    #[error("script returned unsupported value of type {0}")]
    UnsupportedValue(String),

    #[error("script engine failure: {0}")]
    Internal(String),
}

/// Sandbox that evaluates script text against an environment.
///
/// Implementations must not give scripts access to the filesystem or the
/// network, must not keep state between runs and must return
/// [`ExecutionError::Cancelled`] promptly once `ctx` is cancelled.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    /// Evaluate `script` and return the value of its last expression.
    async fn run(
        &self,
        ctx: &CancellationToken,
        script: String,
        env: Environment,
    ) -> Result<ScriptValue, ExecutionError>;
}
