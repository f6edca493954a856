//! Ring buffer for trace records.
//!
//! Holds the most recent records; once full, the oldest is evicted.

use std::collections::{HashMap, VecDeque};

use super::record::{TraceEvent, TraceRecord};

// =============================================================================
// Trace Buffer
// =============================================================================

/// Fixed-capacity buffer of trace records.
#[derive(Clone, Debug)]
pub struct TraceBuffer {
    records: VecDeque<TraceRecord>,
    max_size: usize,
    next_id: u64,
}

impl TraceBuffer {
    /// Creates a buffer holding at most `max_size` records.
    ///
    /// A zero size is treated as one.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            records: VecDeque::with_capacity(max_size.min(4096)),
            max_size,
            next_id: 0,
        }
    }

    /// Appends an event, evicting the oldest record if the buffer is full.
    ///
    /// Returns the id assigned to the record.
    pub fn push(&mut self, run: u64, timestamp_ns: u64, event: TraceEvent) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        if self.records.len() >= self.max_size {
            self.records.pop_front();
        }
        self.records.push_back(TraceRecord::new(id, run, timestamp_ns, event));
        id
    }

    /// Returns the number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the capacity.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Removes all records. Ids keep increasing.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Iterates records, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TraceRecord> {
        self.records.iter()
    }

    /// Returns the last `n` records, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<&TraceRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip).collect()
    }

    /// Returns the records matching a predicate.
    pub fn filter<F>(&self, predicate: F) -> Vec<&TraceRecord>
    where
        F: Fn(&TraceRecord) -> bool,
    {
        self.records.iter().filter(|r| predicate(r)).collect()
    }

    /// Returns the records of one event type.
    #[must_use]
    pub fn by_event_type(&self, event_type: &str) -> Vec<&TraceRecord> {
        self.filter(|r| r.event_type() == event_type)
    }

    /// Returns the records of one execution.
    #[must_use]
    pub fn records_for_run(&self, run: u64) -> Vec<&TraceRecord> {
        self.filter(|r| r.run == run)
    }

    /// Returns summary statistics.
    #[must_use]
    pub fn stats(&self) -> TraceBufferStats {
        let mut event_counts = HashMap::new();
        for record in &self.records {
            *event_counts.entry(record.event_type()).or_insert(0) += 1;
        }
        TraceBufferStats {
            record_count: self.records.len(),
            max_size: self.max_size,
            total_recorded: self.next_id,
            event_counts,
        }
    }
}

impl Default for TraceBuffer {
    fn default() -> Self {
        Self::new(super::DEFAULT_BUFFER_SIZE)
    }
}

/// Summary of a trace buffer's contents.
#[derive(Clone, Debug, Default)]
pub struct TraceBufferStats {
    /// Records currently held.
    pub record_count: usize,
    /// Capacity.
    pub max_size: usize,
    /// Records ever pushed, including evicted ones.
    pub total_recorded: u64,
    /// Held records per event type.
    pub event_counts: HashMap<&'static str, usize>,
}

impl TraceBufferStats {
    /// Returns how many records were evicted.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.total_recorded.saturating_sub(self.record_count as u64)
    }
}

// =============================================================================
// Tests
// =============================================================================
