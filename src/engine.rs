use std::collections::VecDeque;
use std::ops::Range;
use std::thread::{self, ScopedJoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::registry::PrimeRegistry;
use crate::reorder::ReorderBuffer;
use crate::table::FactorTable;
use crate::worker::{self, Message, RangeResult, Report, Task, WorkerStats};

/// Smallest seed base: the pipeline always starts from unit ranges tiling
/// `[seed_base, 2 * seed_base)`, and everything below is classified up front.
const MIN_SEED_BASE: usize = 4;

/// Ω(i) for every `i` in `[1, N]` plus the primes found along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorCounts {
    table: Vec<u8>,
    primes: Vec<usize>,
    stats: EngineStats,
}

/// Bookkeeping from one engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub workers: usize,
    pub seed_base: usize,
    pub tasks_dispatched: usize,
    /// Most results ever parked in the reorder buffer at once.
    pub peak_buffered: usize,
    pub per_worker: Vec<WorkerStats>,
}

impl FactorCounts {
    /// `table()[i]` is Ω(i); entries 0 and 1 are 0.
    pub fn table(&self) -> &[u8] {
        &self.table
    }

    pub fn primes(&self) -> &[usize] {
        &self.primes
    }

    pub fn prime_count(&self) -> usize {
        self.primes.len()
    }

    pub fn limit(&self) -> usize {
        self.table.len() - 1
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn max_omega(&self) -> u8 {
        self.table.iter().copied().max().unwrap_or(0)
    }

    /// `histogram()[k]` is how many integers in `[2, N]` have exactly `k`
    /// prime factors.
    pub fn histogram(&self) -> Vec<usize> {
        let mut counts = vec![0; self.max_omega() as usize + 1];
        for &omega in self.table.iter().skip(2) {
            counts[omega as usize] += 1;
        }
        counts
    }
}

/// Compute Ω for `[1, limit]` with the default pool size.
pub fn compute_factor_counts(limit: usize) -> Result<FactorCounts> {
    Engine::new(EngineConfig::new(limit))?.run()
}

/// Parallel incremental trial-division sieve.
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn run(&self) -> Result<FactorCounts> {
        let EngineConfig { limit, workers } = self.config;
        let seed_base = workers.max(MIN_SEED_BASE);

        let table = FactorTable::new(limit);
        let mut registry = PrimeRegistry::with_limit(limit);
        bootstrap(&table, &mut registry, seed_base);
        let mut scheduler = Scheduler::new(limit, workers, seed_base, registry);

        let (intake_tx, intake_rx) = bounded::<Message>(workers);
        let (report_tx, report_rx) = unbounded::<Report>();

        let (outcome, per_worker) = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|id| {
                    let intake = intake_rx.clone();
                    let report = report_tx.clone();
                    let table = &table;
                    scope.spawn(move || worker::run_worker(id, table, intake, report))
                })
                .collect();
            drop(intake_rx);
            drop(report_tx);

            let outcome = scheduler.run(&intake_tx, &report_rx);

            // One shutdown per worker; every worker takes exactly one
            for _ in 0..workers {
                if intake_tx.send(Message::Shutdown).is_err() {
                    break;
                }
            }
            drop(intake_tx);

            (outcome, join_pool(handles))
        });
        // A panicked worker explains a scheduler error, so report it first
        let per_worker = per_worker?;
        outcome?;

        for (id, stats) in per_worker.iter().enumerate() {
            debug!(
                worker = id,
                tasks = stats.tasks,
                integers = stats.integers,
                "worker finished"
            );
        }

        let stats = EngineStats {
            workers,
            seed_base,
            tasks_dispatched: scheduler.tasks_dispatched,
            peak_buffered: scheduler.reorder.peak(),
            per_worker,
        };
        let primes = scheduler.registry.into_vec();
        info!(
            limit,
            workers,
            primes = primes.len(),
            tasks = stats.tasks_dispatched,
            peak_buffered = stats.peak_buffered,
            "factor counts complete"
        );

        Ok(FactorCounts {
            table: table.into_vec(),
            primes,
            stats,
        })
    }
}

/// Fix 2 and 3, then classify `[4, seed_base)` on the calling thread so the
/// registry is complete below the seed ranges.
fn bootstrap(table: &FactorTable, registry: &mut PrimeRegistry, seed_base: usize) {
    let limit = table.limit();
    for p in [2, 3].into_iter().filter(|&p| p <= limit) {
        table.set(p, 1);
        registry.retire(p, p + 1, &[p]);
    }
    for i in MIN_SEED_BASE..seed_base.min(limit + 1) {
        let found = worker::factor_range(table, i, i + 1, &registry.snapshot_for(i + 1));
        registry.retire(i, i + 1, &found);
    }
    debug!(
        seed_base,
        primes = registry.len(),
        "bootstrap complete"
    );
}

/// Join every worker, keeping the first panic as the error.
fn join_pool(handles: Vec<ScopedJoinHandle<'_, WorkerStats>>) -> Result<Vec<WorkerStats>> {
    let mut per_worker = Vec::with_capacity(handles.len());
    let mut panicked = None;
    for (worker, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(stats) => per_worker.push(stats),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("unknown cause");
                error!(worker, reason, "worker panicked");
                panicked.get_or_insert(Error::WorkerPanicked { worker });
            }
        }
    }
    match panicked {
        Some(err) => Err(err),
        None => Ok(per_worker),
    }
}

/// Dispatch/retire loop. Owns the registry; runs on the calling thread while
/// the pool works.
struct Scheduler {
    limit: usize,
    workers: usize,
    registry: PrimeRegistry,
    /// Ranges waiting to be dispatched, contiguous and increasing.
    candidates: VecDeque<Range<usize>>,
    /// Starts of dispatched, unretired ranges in dispatch order. Includes
    /// ranges whose result sits in the reorder buffer.
    in_flight: VecDeque<usize>,
    reorder: ReorderBuffer,
    exhausted: bool,
    tasks_dispatched: usize,
}

impl Scheduler {
    /// Start from the unit ranges tiling `[seed_base, 2 * seed_base)`, clipped
    /// to `limit`. `registry` must be complete below `seed_base`.
    fn new(limit: usize, workers: usize, seed_base: usize, registry: PrimeRegistry) -> Self {
        Self {
            limit,
            workers,
            registry,
            candidates: (seed_base..=limit.min(2 * seed_base - 1))
                .map(|start| start..start + 1)
                .collect(),
            in_flight: VecDeque::with_capacity(workers),
            reorder: ReorderBuffer::new(workers),
            exhausted: false,
            tasks_dispatched: 0,
        }
    }

    fn run(&mut self, intake: &Sender<Message>, reports: &Receiver<Report>) -> Result<()> {
        loop {
            match self.candidates.front() {
                Some(next) if next.start > self.limit => {
                    debug!(next = next.start, "table exhausted, draining");
                    self.candidates.clear();
                    self.exhausted = true;
                }
                Some(_) if self.in_flight.len() < self.workers => self.dispatch(intake)?,
                _ if self.in_flight.is_empty() => return Ok(()),
                _ => self.retire(reports)?,
            }
        }
    }

    fn dispatch(&mut self, intake: &Sender<Message>) -> Result<()> {
        let Some(Range { start, end }) = self.candidates.pop_front() else {
            return Ok(());
        };
        let end = end.min(self.limit + 1);
        let primes = self.registry.snapshot_for(end);

        debug!(start, end, known = primes.len(), "dispatch");
        intake
            .send(Message::Range(Task { start, end, primes }))
            .map_err(|_| Error::PoolDisconnected {
                outstanding: self.in_flight.len(),
            })?;
        self.in_flight.push_back(start);
        self.tasks_dispatched += 1;
        Ok(())
    }

    /// Retire the oldest dispatched range, waiting for it if needed.
    fn retire(&mut self, reports: &Receiver<Report>) -> Result<()> {
        let Some(&expected) = self.in_flight.front() else {
            return Ok(());
        };

        let result = match self.reorder.take(expected) {
            Some(result) => result,
            None => self.wait_for(expected, reports)?,
        };
        self.in_flight.pop_front();

        let RangeResult { start, end, primes } = result;
        self.registry.retire(start, end, &primes);
        debug!(start, end, found = primes.len(), "retire");

        if !self.exhausted {
            // Everything below `end` is now known, which covers sqrt(2 * end - 1)
            self.candidates.push_back(2 * start..2 * end);
        }
        Ok(())
    }

    fn wait_for(&mut self, expected: usize, reports: &Receiver<Report>) -> Result<RangeResult> {
        loop {
            match reports.recv() {
                Ok(Report::Done(result)) if result.start == expected => return Ok(result),
                Ok(Report::Done(result)) => {
                    debug!(start = result.start, expected, "buffering out-of-order result");
                    self.reorder.insert(result);
                }
                Ok(Report::Panicked { worker }) => {
                    return Err(Error::WorkerPanicked { worker });
                }
                Err(_) => {
                    return Err(Error::PoolDisconnected {
                        outstanding: self.in_flight.len(),
                    });
                }
            }
        }
    }
}
