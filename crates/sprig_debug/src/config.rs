//! Debug configuration for front ends.
//!
//! Bundles tracer settings with VM limits so a front end builds both from
//! one place.

use sprig_language::VmConfig;

use crate::trace::{Tracer, TracerConfig};

/// Tracing and VM limits together.
///
/// # Example
///
/// ```
/// use sprig_debug::DebugConfig;
///
/// let config = DebugConfig::new().with_tracing().with_max_frame_cells(4096);
/// assert!(config.tracing_enabled());
/// let tracer = config.tracer();
/// assert!(tracer.is_enabled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct DebugConfig {
    /// Tracer settings.
    pub trace: TracerConfig,
    /// VM limits.
    pub vm: VmConfig,
}

impl DebugConfig {
    /// Creates a configuration with tracing off and default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracing on, echoed to stderr as text.
    #[must_use]
    pub fn development() -> Self {
        Self::new().with_trace_config(TracerConfig::new().enabled().to_stderr())
    }

    /// Returns true if tracing is on.
    #[must_use]
    pub const fn tracing_enabled(&self) -> bool {
        self.trace.enabled
    }

    /// Turns tracing on.
    #[must_use]
    pub fn with_tracing(mut self) -> Self {
        self.trace.enabled = true;
        self
    }

    /// Echoes trace records to stderr, as JSON if `json` is set.
    #[must_use]
    pub fn with_stderr_trace(mut self, json: bool) -> Self {
        self.trace = self.trace.enabled().to_stderr();
        self.trace.json_format = json;
        self
    }

    /// Replaces the tracer settings.
    #[must_use]
    pub fn with_trace_config(mut self, trace: TracerConfig) -> Self {
        self.trace = trace;
        self
    }

    /// Replaces the VM limits.
    #[must_use]
    pub fn with_vm_config(mut self, vm: VmConfig) -> Self {
        self.vm = vm;
        self
    }

    /// Sets the frame stack limit.
    #[must_use]
    pub fn with_max_frame_cells(mut self, cells: usize) -> Self {
        self.vm = self.vm.with_max_frame_cells(cells);
        self
    }

    /// Sets the value stack limit.
    #[must_use]
    pub fn with_max_stack(mut self, values: usize) -> Self {
        self.vm = self.vm.with_max_stack(values);
        self
    }

    /// Builds a tracer from these settings.
    #[must_use]
    pub fn tracer(&self) -> Tracer {
        Tracer::new(self.trace.clone())
    }
}
