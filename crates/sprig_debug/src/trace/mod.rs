//! Instruction tracing for the VM.
//!
//! A [`Tracer`] is a [`VmObserver`]: hand it to
//! [`Vm::execute_with_observer`](sprig_language::Vm::execute_with_observer)
//! and it records what the machine does into a ring buffer, optionally
//! echoing each record to stderr as it happens.
//!
//! ```text
//! Vm ──on_*──▶ Tracer ──filter──▶ TraceBuffer
//!                        └──────▶ stderr (human or JSON)
//! ```

mod buffer;
mod format;
mod record;

pub use buffer::{TraceBuffer, TraceBufferStats};
pub use format::{HumanFormatter, JsonFormatter, TraceFormatter};
pub use record::{TraceEvent, TraceRecord};

use std::time::Instant;

use sprig_foundation::{Error, Value};
use sprig_language::{Opcode, VmObserver};

/// Default ring buffer capacity.
pub const DEFAULT_BUFFER_SIZE: usize = 10_000;

// =============================================================================
// Tracer Configuration
// =============================================================================

/// Where live trace output goes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraceOutput {
    /// Records are only buffered.
    #[default]
    None,
    /// Each record is also written to stderr.
    Stderr,
}

/// Tracer settings.
#[derive(Clone, Debug)]
pub struct TracerConfig {
    /// Whether tracing is on.
    pub enabled: bool,
    /// Ring buffer capacity.
    pub buffer_size: usize,
    /// Live output destination.
    pub output: TraceOutput,
    /// Live output as JSON instead of text.
    pub json_format: bool,
    /// If set, only these event types are recorded.
    pub event_filter: Option<Vec<String>>,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            output: TraceOutput::None,
            json_format: false,
            event_filter: None,
        }
    }
}

impl TracerConfig {
    /// Creates a disabled configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns tracing on.
    #[must_use]
    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// Sets the ring buffer capacity.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Echoes records to stderr.
    #[must_use]
    pub fn to_stderr(mut self) -> Self {
        self.output = TraceOutput::Stderr;
        self
    }

    /// Uses JSON for live output.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.json_format = true;
        self
    }

    /// Records only the named event types (`instruction`, `call`, ...).
    #[must_use]
    pub fn filter_events(mut self, events: Vec<String>) -> Self {
        self.event_filter = Some(events);
        self
    }
}

// =============================================================================
// Tracer
// =============================================================================

/// Records VM events.
///
/// Each `execute` call is one run; run numbers start at 1 and advance after
/// a halt or an error.
#[derive(Debug)]
pub struct Tracer {
    config: TracerConfig,
    buffer: TraceBuffer,
    start_time: Instant,
    run: u64,
    in_run: bool,
    human_formatter: HumanFormatter,
    json_formatter: JsonFormatter,
}

impl Tracer {
    /// Creates a tracer.
    #[must_use]
    pub fn new(config: TracerConfig) -> Self {
        let buffer = TraceBuffer::new(config.buffer_size);
        Self {
            config,
            buffer,
            start_time: Instant::now(),
            run: 0,
            in_run: false,
            human_formatter: HumanFormatter::new(),
            json_formatter: JsonFormatter::new(),
        }
    }

    /// Creates a tracer that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(TracerConfig::default())
    }

    /// Creates an enabled tracer that echoes text records to stderr.
    #[must_use]
    pub fn to_stderr() -> Self {
        Self::new(TracerConfig::new().enabled().to_stderr())
    }

    /// Returns whether tracing is on.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Turns tracing on.
    pub fn enable(&mut self) {
        self.config.enabled = true;
    }

    /// Turns tracing off. Buffered records are kept.
    pub fn disable(&mut self) {
        self.config.enabled = false;
    }

    /// Switches live output between JSON and text.
    pub fn set_json_format(&mut self, json: bool) {
        self.config.json_format = json;
    }

    /// Sets where live output goes.
    pub fn set_output(&mut self, output: TraceOutput) {
        self.config.output = output;
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &TracerConfig {
        &self.config
    }

    /// Returns the number of the current (or last) run.
    #[must_use]
    pub const fn current_run(&self) -> u64 {
        self.run
    }

    /// Records an event if tracing is on.
    #[inline]
    pub fn record(&mut self, event: TraceEvent) {
        if !self.config.enabled {
            return;
        }
        self.record_internal(event);
    }

    fn record_internal(&mut self, event: TraceEvent) {
        if !self.in_run {
            self.run += 1;
            self.in_run = true;
        }
        if event.is_terminal() {
            self.in_run = false;
        }

        if let Some(filter) = &self.config.event_filter {
            if !filter.iter().any(|name| name == event.event_type()) {
                return;
            }
        }

        let timestamp_ns = u64::try_from(self.start_time.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.buffer.push(self.run, timestamp_ns, event);

        if self.config.output == TraceOutput::Stderr {
            if let Some(record) = self.buffer.iter().next_back() {
                eprintln!("{}", self.format_record(record));
            }
        }
    }

    /// Formats one record in the configured live format.
    #[must_use]
    pub fn format_record(&self, record: &TraceRecord) -> String {
        if self.config.json_format {
            self.json_formatter.format(record)
        } else {
            self.human_formatter.format(record)
        }
    }

    /// Formats every buffered record in the configured live format.
    #[must_use]
    pub fn format_records(&self) -> String {
        let records: Vec<&TraceRecord> = self.buffer.iter().collect();
        if self.config.json_format {
            self.json_formatter.format_many(&records)
        } else {
            self.human_formatter.format_many(&records)
        }
    }

    /// Returns the buffer.
    #[must_use]
    pub const fn buffer(&self) -> &TraceBuffer {
        &self.buffer
    }

    /// Drops buffered records.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Returns buffer statistics.
    #[must_use]
    pub fn stats(&self) -> TraceBufferStats {
        self.buffer.stats()
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::disabled()
    }
}

impl VmObserver for Tracer {
    #[inline]
    fn on_instruction(&mut self, offset: usize, op: Opcode, stack_depth: usize, frame_depth: usize) {
        self.record(TraceEvent::Instruction {
            offset,
            op,
            stack_depth,
            frame_depth,
        });
    }

    fn on_call(&mut self, offset: usize, target: u32, frame_depth: usize, tail: bool) {
        self.record(TraceEvent::Call {
            offset,
            target,
            frame_depth,
            tail,
        });
    }

    fn on_return(&mut self, offset: usize, return_to: usize, frame_depth: usize) {
        self.record(TraceEvent::Return {
            offset,
            return_to,
            frame_depth,
        });
    }

    fn on_debug(&mut self, offset: usize, hint: u16, frame_depth: usize, top: Option<&Value>) {
        self.record(TraceEvent::Debug {
            offset,
            hint,
            frame_depth,
            top: top.cloned(),
        });
    }

    fn on_halt(&mut self, offset: usize) {
        self.record(TraceEvent::Halt { offset });
    }

    fn on_error(&mut self, error: &Error) {
        self.record(TraceEvent::Error {
            message: error.to_string(),
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
