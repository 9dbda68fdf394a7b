use crate::error::{Error, Result};

/// Smallest spiral width accepted on the command line.
pub const MIN_SIZE: usize = 3;
/// Largest spiral width accepted on the command line (256M table cells).
pub const MAX_SIZE: usize = 16000;

pub const DEFAULT_WORKERS: usize = 4;

/// Every worker is a live thread, and a pool wider than this would also
/// push the seed ranges past any useful table size.
pub const MAX_WORKERS: usize = 1024;

/// Range bounds are doubled on every retirement, so they must stay well clear
/// of `usize::MAX`.
pub const MAX_LIMIT: usize = usize::MAX / 4;

/// Settings for one run of the factor-count engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Highest integer whose Ω value is computed (the N of `[1, N]`).
    pub limit: usize,
    /// Number of persistent worker threads.
    pub workers: usize,
}

impl EngineConfig {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Build a config for a square spiral of `size` x `size` pixels.
    pub fn for_spiral(size: usize) -> Result<Self> {
        if !(MIN_SIZE..=MAX_SIZE).contains(&size) {
            return Err(Error::InvalidSize { size });
        }
        Ok(Self::new(size * size))
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit < 1 {
            return Err(Error::InvalidLimit { limit: self.limit });
        }
        if self.limit > MAX_LIMIT {
            return Err(Error::LimitTooLarge {
                limit: self.limit,
                max: MAX_LIMIT,
            });
        }
        if self.workers == 0 {
            return Err(Error::NoWorkers);
        }
        if self.workers > MAX_WORKERS {
            return Err(Error::TooManyWorkers {
                workers: self.workers,
                max: MAX_WORKERS,
            });
        }
        Ok(())
    }
}
