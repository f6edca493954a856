//! Trace output formatting.
//!
//! Two formats: aligned text for people and one JSON object per record for
//! tools.

use sprig_foundation::Value;

use super::record::{TraceEvent, TraceRecord};

/// Width of the mnemonic column, matching the disassembler.
const MNEMONIC_WIDTH: usize = 11;

// =============================================================================
// Formatter Trait
// =============================================================================

/// Renders trace records as text.
pub trait TraceFormatter {
    /// Formats a single record.
    fn format(&self, record: &TraceRecord) -> String;

    /// Formats several records.
    fn format_many(&self, records: &[&TraceRecord]) -> String {
        records.iter().map(|r| self.format(r)).collect::<Vec<_>>().join("\n")
    }
}

// =============================================================================
// Human Formatter
// =============================================================================

/// Aligned text, one line per record.
///
/// ```text
/// 0012  JumpIfNot   stack=3 frames=2
/// 0017  CALL        -> 0x00000040 frames=5
/// ```
#[derive(Clone, Debug, Default)]
pub struct HumanFormatter {
    show_timestamps: bool,
    show_ids: bool,
}

impl HumanFormatter {
    /// Creates a formatter with no prefix columns.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefixes each line with the time since tracing started.
    #[must_use]
    pub fn with_timestamps(mut self) -> Self {
        self.show_timestamps = true;
        self
    }

    /// Prefixes each line with the record id.
    #[must_use]
    pub fn with_ids(mut self) -> Self {
        self.show_ids = true;
        self
    }

    #[allow(clippy::cast_precision_loss)]
    fn format_timestamp(ns: u64) -> String {
        if ns >= 1_000_000_000 {
            format!("{:.3}s", ns as f64 / 1_000_000_000.0)
        } else if ns >= 1_000_000 {
            format!("{:.3}ms", ns as f64 / 1_000_000.0)
        } else {
            format!("{:.3}us", ns as f64 / 1_000.0)
        }
    }

    fn format_event(event: &TraceEvent) -> String {
        match event {
            TraceEvent::Instruction {
                offset,
                op,
                stack_depth,
                frame_depth,
            } => format!(
                "{offset:04x}  {:<MNEMONIC_WIDTH$} stack={stack_depth} frames={frame_depth}",
                op.mnemonic()
            ),
            TraceEvent::Call {
                offset,
                target,
                frame_depth,
                tail,
            } => {
                let label = if *tail { "TAIL CALL" } else { "CALL" };
                format!("{offset:04x}  {label:<MNEMONIC_WIDTH$} -> 0x{target:08x} frames={frame_depth}")
            }
            TraceEvent::Return {
                offset,
                return_to,
                frame_depth,
            } => format!("{offset:04x}  {:<MNEMONIC_WIDTH$} -> {return_to:04x} frames={frame_depth}", "RETURN"),
            TraceEvent::Debug {
                offset,
                hint,
                frame_depth,
                top,
            } => {
                let top = top.as_ref().map_or_else(|| "-".to_string(), |v| format!("{v:?}"));
                format!("{offset:04x}  {:<MNEMONIC_WIDTH$} {hint} frames={frame_depth} top={top}", "DEBUG")
            }
            TraceEvent::Halt { offset } => format!("{offset:04x}  HALT"),
            TraceEvent::Error { message } => format!("ERROR {message}"),
        }
    }
}

impl TraceFormatter for HumanFormatter {
    fn format(&self, record: &TraceRecord) -> String {
        let mut line = String::new();
        if self.show_ids {
            line.push_str(&format!("[{:06}] ", record.id));
        }
        if self.show_timestamps {
            line.push_str(&format!("{:>10} ", Self::format_timestamp(record.timestamp_ns)));
        }
        line.push_str(&Self::format_event(&record.event));
        line
    }
}

// =============================================================================
// JSON Formatter
// =============================================================================

/// One JSON object per record.
#[derive(Clone, Debug, Default)]
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a compact formatter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a formatter that indents its output.
    #[must_use]
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    fn escape_string(s: &str) -> String {
        let mut out = String::with_capacity(s.len() + 2);
        out.push('"');
        for c in s.chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
        }
        out.push('"');
        out
    }

    fn format_value(value: &Value) -> String {
        match value {
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::String(s) => Self::escape_string(s),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(Self::format_value).collect();
                format!("[{}]", items.join(","))
            }
            other => Self::escape_string(&other.to_string()),
        }
    }

    fn event_fields(event: &TraceEvent) -> Vec<(&'static str, String)> {
        match event {
            TraceEvent::Instruction {
                offset,
                op,
                stack_depth,
                frame_depth,
            } => vec![
                ("offset", offset.to_string()),
                ("op", Self::escape_string(op.mnemonic())),
                ("stack_depth", stack_depth.to_string()),
                ("frame_depth", frame_depth.to_string()),
            ],
            TraceEvent::Call {
                offset,
                target,
                frame_depth,
                tail,
            } => vec![
                ("offset", offset.to_string()),
                ("target", target.to_string()),
                ("frame_depth", frame_depth.to_string()),
                ("tail", tail.to_string()),
            ],
            TraceEvent::Return {
                offset,
                return_to,
                frame_depth,
            } => vec![
                ("offset", offset.to_string()),
                ("return_to", return_to.to_string()),
                ("frame_depth", frame_depth.to_string()),
            ],
            TraceEvent::Debug {
                offset,
                hint,
                frame_depth,
                top,
            } => vec![
                ("offset", offset.to_string()),
                ("hint", hint.to_string()),
                ("frame_depth", frame_depth.to_string()),
                ("top", top.as_ref().map_or_else(|| "null".to_string(), Self::format_value)),
            ],
            TraceEvent::Halt { offset } => vec![("offset", offset.to_string())],
            TraceEvent::Error { message } => vec![("message", Self::escape_string(message))],
        }
    }
}

impl TraceFormatter for JsonFormatter {
    fn format(&self, record: &TraceRecord) -> String {
        let mut fields = vec![
            ("id", record.id.to_string()),
            ("run", record.run.to_string()),
            ("timestamp_ns", record.timestamp_ns.to_string()),
            ("type", Self::escape_string(record.event_type())),
        ];
        fields.extend(Self::event_fields(&record.event));

        let (open, sep, close) = if self.pretty {
            ("{\n  ", ",\n  ", "\n}")
        } else {
            ("{", ",", "}")
        };
        let colon = if self.pretty { ": " } else { ":" };
        let body: Vec<String> = fields.iter().map(|(k, v)| format!("\"{k}\"{colon}{v}")).collect();
        format!("{open}{}{close}", body.join(sep))
    }

    fn format_many(&self, records: &[&TraceRecord]) -> String {
        let items: Vec<_> = records.iter().map(|r| self.format(r)).collect();
        if self.pretty {
            let indented: Vec<String> = items.iter().map(|item| item.replace('\n', "\n  ")).collect();
            format!("[\n  {}\n]", indented.join(",\n  "))
        } else {
            format!("[{}]", items.join(","))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
