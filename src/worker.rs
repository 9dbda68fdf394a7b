use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::trace;

use crate::registry::PrimeSnapshot;
use crate::table::FactorTable;

/// A half-open range `[start, end)` handed to exactly one worker.
#[derive(Debug, Clone)]
pub struct Task {
    pub start: usize,
    pub end: usize,
    pub primes: PrimeSnapshot,
}

/// What a worker sends back after finishing a [`Task`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeResult {
    pub start: usize,
    pub end: usize,
    /// Primes found inside `[start, end)`, increasing.
    pub primes: Vec<usize>,
}

/// Messages on the pool's report channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Done(RangeResult),
    /// The worker hit a broken contract and is unwinding.
    Panicked { worker: usize },
}

/// Messages on the pool's intake channel.
#[derive(Debug, Clone)]
pub enum Message {
    Range(Task),
    Shutdown,
}

/// Per-worker counters, returned when the worker exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub tasks: usize,
    pub integers: usize,
}

/// Classify every integer of `[start, end)` by trial division against
/// `primes`, writing Ω into `table` and returning the primes found.
///
/// The quotient `i / f` of a composite is either below `start`, finalized by
/// an earlier retired range, or an earlier index of this same range.
pub fn factor_range(
    table: &FactorTable,
    start: usize,
    end: usize,
    primes: &PrimeSnapshot,
) -> Vec<usize> {
    assert!(
        2 <= start && start < end && end <= table.len(),
        "malformed range [{}, {}) for table of {} cells",
        start,
        end,
        table.len()
    );

    let mut found = Vec::new();
    for i in start..end {
        // smallest integer > sqrt(i)
        let max = i.isqrt() + 1;
        match primes.iter().find(|&&f| f >= max || i % f == 0) {
            Some(&f) if f < max => table.set(i, 1 + table.get(i / f)),
            Some(_) => {
                table.set(i, 1);
                found.push(i);
            }
            None => {
                // Ran out of primes: i is prime only if none up to sqrt(i) are missing
                assert!(
                    max <= primes.bound(),
                    "primes below {} cannot classify {}",
                    primes.bound(),
                    i
                );
                table.set(i, 1);
                found.push(i);
            }
        }
    }
    found
}

/// Tells the scheduler when a worker unwinds, so it stops waiting for a
/// report that will never come.
struct PanicNotice<'a> {
    worker: usize,
    report: &'a Sender<Report>,
}

impl Drop for PanicNotice<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            let _ = self.report.send(Report::Panicked {
                worker: self.worker,
            });
        }
    }
}

/// Worker loop: pull tasks until [`Message::Shutdown`] or until the intake
/// channel closes.
pub fn run_worker(
    id: usize,
    table: &FactorTable,
    intake: Receiver<Message>,
    report: Sender<Report>,
) -> WorkerStats {
    let _notice = PanicNotice {
        worker: id,
        report: &report,
    };
    let mut stats = WorkerStats::default();

    for message in intake {
        let task = match message {
            Message::Range(task) => task,
            Message::Shutdown => break,
        };

        let primes = factor_range(table, task.start, task.end, &task.primes);
        stats.tasks += 1;
        stats.integers += task.end - task.start;
        trace!(
            worker = id,
            start = task.start,
            end = task.end,
            found = primes.len(),
            "range factored"
        );

        if report
            .send(Report::Done(RangeResult {
                start: task.start,
                end: task.end,
                primes,
            }))
            .is_err()
        {
            break; // Scheduler gone, stop this worker
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PrimeRegistry;
    use crossbeam_channel::bounded;

    /// Table with 2 and 3 filled in, plus the matching registry.
    fn seeded(limit: usize) -> (FactorTable, PrimeRegistry) {
        let table = FactorTable::new(limit);
        table.set(2, 1);
        table.set(3, 1);
        let mut registry = PrimeRegistry::default();
        registry.retire(2, 4, &[2, 3]);
        (table, registry)
    }

    #[test]
    fn test_factor_range_unit_ranges() {
        let (table, registry) = seeded(7);
        let primes = registry.snapshot_for(8);
        assert_eq!(&*primes, &[2]);
        assert_eq!(factor_range(&table, 4, 5, &primes), Vec::<usize>::new());
        assert_eq!(factor_range(&table, 5, 6, &primes), vec![5]);
        assert_eq!(factor_range(&table, 6, 7, &primes), Vec::<usize>::new());
        assert_eq!(factor_range(&table, 7, 8, &primes), vec![7]);
        assert_eq!(table.into_vec(), vec![0, 0, 1, 1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_factor_range_perfect_square() {
        let (table, registry) = seeded(9);
        let primes = registry.snapshot_for(10);
        factor_range(&table, 4, 9, &primes);
        assert_eq!(factor_range(&table, 9, 10, &primes), Vec::<usize>::new());
        assert_eq!(table.get(9), 2);
    }

    #[test]
    fn test_factor_range_primes_past_snapshot() {
        let (table, registry) = seeded(15);
        let found = factor_range(&table, 4, 16, &registry.snapshot_for(16));
        assert_eq!(found, vec![5, 7, 11, 13]);
        assert_eq!(table.get(8), 3);
        assert_eq!(table.get(12), 3);
        assert_eq!(table.get(15), 2);
    }

    #[test]
    fn test_factor_range_with_larger_snapshot() {
        let (table, mut registry) = seeded(48);
        let found = factor_range(&table, 4, 16, &registry.snapshot_for(16));
        registry.retire(4, 16, &found);
        // {2, 3} with bound 5 still settles 23
        let primes = registry.snapshot_for(25);
        assert_eq!(&*primes, &[2, 3]);
        let found = factor_range(&table, 16, 25, &primes);
        assert_eq!(found, vec![17, 19, 23]);
        registry.retire(16, 25, &found);

        let found = factor_range(&table, 25, 49, &registry.snapshot_for(49));
        assert_eq!(found, vec![29, 31, 37, 41, 43, 47]);
        assert_eq!(table.get(25), 2);
        assert_eq!(table.get(32), 5);
        assert_eq!(table.get(48), 5);
    }

    #[test]
    #[should_panic(expected = "cannot classify")]
    fn test_factor_range_insufficient_primes() {
        let (table, registry) = seeded(30);
        // 17 might be divisible by 4 as far as {2, 3} below 4 can tell
        factor_range(&table, 4, 18, &registry.snapshot_for(16));
    }

    #[test]
    #[should_panic(expected = "malformed range")]
    fn test_factor_range_empty_range() {
        let (table, registry) = seeded(10);
        factor_range(&table, 5, 5, &registry.snapshot_for(6));
    }

    #[test]
    #[should_panic(expected = "malformed range")]
    fn test_factor_range_past_table() {
        let (table, registry) = seeded(10);
        factor_range(&table, 9, 12, &registry.snapshot_for(12));
    }

    #[test]
    fn test_run_worker_until_shutdown() {
        let (table, mut registry) = seeded(12);
        let found = factor_range(&table, 4, 8, &registry.snapshot_for(8));
        registry.retire(4, 8, &found);

        let (intake_tx, intake_rx) = bounded(4);
        let (report_tx, report_rx) = bounded(4);

        let stats = std::thread::scope(|scope| {
            let handle = scope.spawn(|| run_worker(0, &table, intake_rx, report_tx));
            intake_tx
                .send(Message::Range(Task {
                    start: 8,
                    end: 13,
                    primes: registry.snapshot_for(13),
                }))
                .unwrap();
            let report = report_rx.recv().unwrap();
            assert_eq!(
                report,
                Report::Done(RangeResult {
                    start: 8,
                    end: 13,
                    primes: vec![11],
                })
            );
            intake_tx.send(Message::Shutdown).unwrap();
            handle.join().unwrap()
        });

        assert_eq!(stats, WorkerStats { tasks: 1, integers: 5 });
        assert_eq!(table.get(12), 3);
    }

    #[test]
    fn test_run_worker_stops_when_intake_closes() {
        let (table, _) = seeded(8);
        let (intake_tx, intake_rx) = bounded::<Message>(1);
        let (report_tx, _report_rx) = bounded(1);
        drop(intake_tx);
        let stats = run_worker(3, &table, intake_rx, report_tx);
        assert_eq!(stats, WorkerStats::default());
    }

    #[test]
    fn test_run_worker_reports_panic() {
        let (table, registry) = seeded(30);
        let (intake_tx, intake_rx) = bounded(1);
        let (report_tx, report_rx) = crossbeam_channel::unbounded();

        let joined = std::thread::scope(|scope| {
            let handle = scope.spawn(|| run_worker(5, &table, intake_rx, report_tx));
            intake_tx
                .send(Message::Range(Task {
                    start: 4,
                    end: 30,
                    primes: registry.snapshot_for(16),
                }))
                .unwrap();
            assert_eq!(report_rx.recv().unwrap(), Report::Panicked { worker: 5 });
            handle.join()
        });
        assert!(joined.is_err());
    }
}
