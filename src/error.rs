use thiserror::Error;

use crate::config::{MAX_SIZE, MIN_SIZE};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("limit {limit} is invalid, the table needs at least one entry")]
    InvalidLimit { limit: usize },

    #[error("limit {limit} is too large, at most {max} is supported")]
    LimitTooLarge { limit: usize, max: usize },

    #[error("the worker pool needs at least one worker")]
    NoWorkers,

    #[error("{workers} workers requested, at most {max} are supported")]
    TooManyWorkers { workers: usize, max: usize },

    #[error("size {size} is invalid, must be between {} and {}", MIN_SIZE, MAX_SIZE)]
    InvalidSize { size: usize },

    /// Every worker went away while results were still expected, without any
    /// of them reporting a panic.
    #[error("worker pool disconnected while {outstanding} range(s) were outstanding")]
    PoolDisconnected { outstanding: usize },

    /// A worker broke a contract and unwound. The pool has been shut down.
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
