//! Trace event and record types.
//!
//! One event per thing the VM reports through its observer seam.

use sprig_foundation::Value;
use sprig_language::Opcode;

// =============================================================================
// Trace Event
// =============================================================================

/// Events recorded while the VM executes.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceEvent {
    /// An instruction is about to execute.
    Instruction {
        /// Offset of the instruction.
        offset: usize,
        /// The opcode.
        op: Opcode,
        /// Value stack depth before execution.
        stack_depth: usize,
        /// Frame stack depth before execution.
        frame_depth: usize,
    },

    /// Control transferred into a function.
    Call {
        /// Offset of the `Call` or `RecCall`.
        offset: usize,
        /// Entry address of the callee.
        target: u32,
        /// Frame stack depth after entering.
        frame_depth: usize,
        /// Whether the current frame was reused.
        tail: bool,
    },

    /// A function returned.
    Return {
        /// Offset of the `Return`.
        offset: usize,
        /// Offset execution resumes at.
        return_to: usize,
        /// Frame stack depth after unwinding.
        frame_depth: usize,
    },

    /// A `Debug` marker executed.
    Debug {
        /// Offset of the marker.
        offset: usize,
        /// The marker's operand.
        hint: u16,
        /// Frame stack depth at the marker.
        frame_depth: usize,
        /// The value on top of the stack, if any.
        top: Option<Value>,
    },

    /// Execution reached `Halt`.
    Halt {
        /// Offset of the `Halt`.
        offset: usize,
    },

    /// Execution failed.
    Error {
        /// The rendered error.
        message: String,
    },
}

impl TraceEvent {
    /// Returns the event type name used for filtering and output.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Instruction { .. } => "instruction",
            Self::Call { .. } => "call",
            Self::Return { .. } => "return",
            Self::Debug { .. } => "debug",
            Self::Halt { .. } => "halt",
            Self::Error { .. } => "error",
        }
    }

    /// Returns the instruction offset the event happened at, if it has one.
    #[must_use]
    pub const fn offset(&self) -> Option<usize> {
        match self {
            Self::Instruction { offset, .. }
            | Self::Call { offset, .. }
            | Self::Return { offset, .. }
            | Self::Debug { offset, .. }
            | Self::Halt { offset } => Some(*offset),
            Self::Error { .. } => None,
        }
    }

    /// Returns true for call and return events.
    #[must_use]
    pub const fn is_control_event(&self) -> bool {
        matches!(self, Self::Call { .. } | Self::Return { .. })
    }

    /// Returns true for events that end an execution.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Halt { .. } | Self::Error { .. })
    }
}

// =============================================================================
// Trace Record
// =============================================================================

/// A trace event with its sequence number and timing.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceRecord {
    /// Unique, increasing record id.
    pub id: u64,
    /// Which execution the record belongs to (counts `execute` calls).
    pub run: u64,
    /// Nanoseconds since the tracer started.
    pub timestamp_ns: u64,
    /// The event.
    pub event: TraceEvent,
}

impl TraceRecord {
    /// Creates a new trace record.
    #[must_use]
    pub const fn new(id: u64, run: u64, timestamp_ns: u64, event: TraceEvent) -> Self {
        Self {
            id,
            run,
            timestamp_ns,
            event,
        }
    }

    /// Returns the event type name.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}
