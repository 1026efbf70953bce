//! Error types for the task-execution engine.

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),
}

/// Errors raised by the execution loop and its bounds.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Recursion limit exceeded: launching {task} at depth {depth} > {max}")]
    RecursionLimitExceeded { task: String, depth: u32, max: u32 },

    #[error("Step limit exceeded: task {task} did not finish within {max} steps")]
    StepLimitExceeded { task: String, max: u32 },

    #[error("Result type mismatch for task {task}: expected {expected}, got {actual}")]
    ResultTypeMismatch {
        task: String,
        expected: String,
        actual: String,
    },

    #[error("Worker for key {key} failed: {source}")]
    WorkerFailure {
        key: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Worker for key {key} panicked: {reason}")]
    WorkerPanicked { key: String, reason: String },

    #[error("Manager is destroyed")]
    ManagerDestroyed,
}

/// Model-API collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Unknown model API: {name}")]
    UnknownApi { name: String },

    #[error("Model API {api} request failed: {reason}")]
    RequestFailed { api: String, reason: String },
}

/// Task-definition errors.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Failed to decode result for task {task}: {reason}")]
    DecodeFailed { task: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
