//! Tracing for the Sprig virtual machine.
//!
//! This crate provides:
//! - [`Tracer`] - a [`VmObserver`](sprig_language::VmObserver) that records
//!   executed instructions, calls, returns and `Debug` markers
//! - [`TraceBuffer`] - fixed-capacity ring storage for trace records
//! - [`HumanFormatter`] and [`JsonFormatter`] - trace output formats
//! - [`DebugConfig`] - tracing and VM limits bundled for front ends

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod trace;

pub use config::DebugConfig;
pub use trace::{
    HumanFormatter, JsonFormatter, TraceBuffer, TraceBufferStats, TraceEvent, TraceFormatter, TraceOutput,
    TraceRecord, Tracer, TracerConfig,
};
