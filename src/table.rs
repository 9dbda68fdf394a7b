use std::sync::atomic::{AtomicU8, Ordering};

/// Per-index Ω counts for `[0, limit]`, shared between the scheduler and the
/// worker pool.
///
/// Each cell is written by exactly one worker. Reads of cells written by other
/// workers only happen after the owning range was reported back and a later
/// task was sent out, so the channels already order every write before any
/// read of it and relaxed atomics are enough.
pub struct FactorTable {
    cells: Box<[AtomicU8]>,
}

impl FactorTable {
    pub fn new(limit: usize) -> Self {
        let cells = (0..=limit).map(|_| AtomicU8::new(0)).collect();
        Self { cells }
    }

    /// Highest index held by the table.
    pub fn limit(&self) -> usize {
        self.cells.len() - 1
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        self.cells[index].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set(&self, index: usize, omega: u8) {
        self.cells[index].store(omega, Ordering::Relaxed);
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.cells
            .into_vec()
            .into_iter()
            .map(AtomicU8::into_inner)
            .collect()
    }
}
