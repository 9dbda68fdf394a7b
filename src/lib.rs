//! Parallel Ω(n) sieve behind the `ulam` spiral tool.
//!
//! [`compute_factor_counts`] fills a table with the number of prime factors
//! (with multiplicity) of every integer in `[1, N]` and collects the primes
//! up to `N`. The work is spread over a fixed pool of worker threads that
//! trial-divide ranges whose bounds double on every retirement, so the primes
//! already known always suffice for the next range.

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod reorder;
pub mod storage;
pub mod table;
pub mod worker;

pub use config::EngineConfig;
pub use engine::{Engine, EngineStats, FactorCounts, compute_factor_counts};
pub use error::{Error, Result};
