pub mod child;
pub mod executor;
pub mod vlm;

pub use executor::{ExecutedCall, ExecutorAdapter, ExecutorResponse, MalformedEntry};
pub use vlm::{VlmAdapter, VlmRequest, VlmResponse};

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("child binary missing: {program}")]
    MissingBinary { program: String },
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io error talking to {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {timeout_ms}ms")]
    Timeout {
        program: String,
        timeout_ms: u64,
        stderr_tail: String,
    },
    #[error("{program} exited with code {exit_code}: {stderr_tail}")]
    NonZeroExit {
        program: String,
        exit_code: i32,
        stderr_tail: String,
    },
    #[error("failed to parse {program} output: {reason}")]
    Parse {
        program: String,
        reason: String,
        stderr_tail: String,
    },
    #[error("{program} reported an error: {message}")]
    ChildError { program: String, message: String },
    #[error("{program} invocation cancelled by shutdown")]
    Cancelled { program: String },
}
