use std::collections::BTreeMap;

use crate::worker::RangeResult;

/// Results that came back before the range they must be retired after.
///
/// Keyed by range start. The scheduler only parks a result while it waits on
/// an older range that is still in flight, so with `W` workers at most `W - 1`
/// results can sit here.
#[derive(Debug)]
pub struct ReorderBuffer {
    pending: BTreeMap<usize, RangeResult>,
    capacity: usize,
    peak: usize,
}

impl ReorderBuffer {
    pub fn new(workers: usize) -> Self {
        Self {
            pending: BTreeMap::new(),
            capacity: workers.saturating_sub(1),
            peak: 0,
        }
    }

    /// Park a result that arrived out of order.
    pub fn insert(&mut self, result: RangeResult) {
        let start = result.start;
        let previous = self.pending.insert(start, result);
        assert!(previous.is_none(), "range starting at {} reported twice", start);
        assert!(
            self.pending.len() <= self.capacity,
            "reorder buffer holds {} results, capacity is {}",
            self.pending.len(),
            self.capacity
        );
        self.peak = self.peak.max(self.pending.len());
    }

    /// Take the result for the range starting at `start`, if it is parked.
    pub fn take(&mut self, start: usize) -> Option<RangeResult> {
        self.pending.remove(&start)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Largest number of results held at once.
    pub fn peak(&self) -> usize {
        self.peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(start: usize, end: usize) -> RangeResult {
        RangeResult {
            start,
            end,
            primes: Vec::new(),
        }
    }

    #[test]
    fn test_take_in_order() {
        let mut buffer = ReorderBuffer::new(4);
        buffer.insert(result(6, 7));
        buffer.insert(result(5, 6));
        assert_eq!(buffer.len(), 2);

        assert_eq!(buffer.take(4), None);
        assert_eq!(buffer.take(5), Some(result(5, 6)));
        assert_eq!(buffer.take(6), Some(result(6, 7)));
        assert!(buffer.is_empty());
        assert_eq!(buffer.peak(), 2);
    }

    #[test]
    fn test_take_twice() {
        let mut buffer = ReorderBuffer::new(2);
        buffer.insert(result(10, 12));
        assert!(buffer.take(10).is_some());
        assert!(buffer.take(10).is_none());
    }

    #[test]
    fn test_peak_tracks_high_water_mark() {
        let mut buffer = ReorderBuffer::new(8);
        for start in 5..9 {
            buffer.insert(result(start, start + 1));
        }
        for start in 5..9 {
            buffer.take(start);
        }
        buffer.insert(result(20, 24));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.peak(), 4);
    }

    #[test]
    #[should_panic(expected = "capacity is 1")]
    fn test_insert_past_capacity() {
        let mut buffer = ReorderBuffer::new(2);
        buffer.insert(result(5, 6));
        buffer.insert(result(6, 7));
    }

    #[test]
    #[should_panic(expected = "reported twice")]
    fn test_insert_duplicate() {
        let mut buffer = ReorderBuffer::new(4);
        buffer.insert(result(5, 6));
        buffer.insert(result(5, 6));
    }
}
