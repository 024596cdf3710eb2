use crate::graph::TaskId;
use thiserror::Error;

/// Errors the runtime can report to a caller without aborting the process.
///
/// Invariant violations (negative pending-deps counters, status regression,
/// a task enqueued twice) are not part of this enum: those are programmer
/// errors in the runtime itself and are handled by panicking where they are
/// detected, per the "fatal, abort the process" policy.
#[derive(Debug, Error)]
pub enum CjError {
    #[error("invalid argument to {func}: {msg}")]
    InvalidArgument { func: &'static str, msg: String },

    #[error("device {device} cache exhausted: no evictable slot")]
    CacheExhausted { device: i32 },

    #[error("could not allocate worker: {0}")]
    WorkerAllocation(String),

    #[error("task {task:?} kernel failed: {reason}")]
    KernelFailed { task: TaskId, reason: String },
}

pub type CjResult<T> = Result<T, CjError>;
