//! Integration tests for Layers 2 and 3: Debug and Runtime
//!
//! Tests for sessions, the REPL over a scripted editor, compiled artifacts,
//! and instruction tracing.

mod artifacts;
mod repl;
mod session;
