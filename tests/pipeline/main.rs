//! Integration tests for the build pipeline
//!
//! Source files flow through the loader and expander, compile into
//! libraries, link into images, and run on the VM.

mod linking;
mod loading;
