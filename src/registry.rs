use std::ops::Deref;
use std::sync::Arc;

/// Append-only, strictly increasing list of the primes found so far.
///
/// Only the scheduler appends, one retired range at a time and in range order,
/// so the list always holds *every* prime below [`PrimeRegistry::bound`].
/// Workers never see the registry itself, only a [`PrimeSnapshot`] copied out
/// of it at dispatch time.
#[derive(Debug)]
pub struct PrimeRegistry {
    primes: Vec<usize>,
    bound: usize,
}

/// The primes needed to trial-divide one range, frozen at dispatch time.
#[derive(Debug, Clone)]
pub struct PrimeSnapshot {
    primes: Arc<[usize]>,
    bound: usize,
}

impl PrimeSnapshot {
    /// Every prime below this value is in the snapshot.
    pub fn bound(&self) -> usize {
        self.bound
    }
}

impl Deref for PrimeSnapshot {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.primes
    }
}

impl Default for PrimeRegistry {
    fn default() -> Self {
        Self {
            primes: Vec::new(),
            bound: 2,
        }
    }
}

impl PrimeRegistry {
    /// Pre-size the registry for primes up to `limit`.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            primes: Vec::with_capacity(estimate_prime_count(limit)),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.primes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primes.is_empty()
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Whether the known primes settle every integer below `end` by trial
    /// division, i.e. every prime up to `sqrt(end - 1)` is known.
    pub fn covers(&self, end: usize) -> bool {
        end <= 1 || (end - 1).isqrt() < self.bound
    }

    /// Copy out the primes up to `sqrt(end - 1)`.
    ///
    /// The cut is at the floor of the root. A prime just above it, such as 5
    /// for `end = 25`, is left out: the snapshot's `bound` already tells
    /// workers that no prime up to the root is missing, which is all trial
    /// division below `end` needs.
    ///
    /// Panics if some of them are not known yet.
    pub fn snapshot_for(&self, end: usize) -> PrimeSnapshot {
        assert!(
            self.covers(end),
            "primes complete below {} cannot settle integers below {}",
            self.bound,
            end
        );
        let root = end.saturating_sub(1).isqrt();
        let count = self.primes.partition_point(|&p| p <= root);
        PrimeSnapshot {
            primes: Arc::from(&self.primes[..count]),
            bound: root + 1,
        }
    }

    /// Record the primes of the fully classified range `[start, end)`.
    ///
    /// Ranges must arrive contiguous and in order; anything else means the
    /// scheduler retired out of order, so this panics.
    pub fn retire(&mut self, start: usize, end: usize, found: &[usize]) {
        assert!(
            start == self.bound && start < end,
            "range [{}, {}) retired while registry is complete below {}",
            start,
            end,
            self.bound
        );
        debug_assert!(found.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(found.iter().all(|p| (start..end).contains(p)));

        self.primes.extend_from_slice(found);
        self.bound = end;
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.primes
    }
}

/// Upper estimate of π(limit), used only for capacity.
fn estimate_prime_count(limit: usize) -> usize {
    // x / (ln x - 4) overshoots π(x) for x > 55
    if limit <= 55 {
        return 16;
    }
    let x = limit as f64;
    (x / (x.ln() - 4.0).max(1.0)) as usize
}
