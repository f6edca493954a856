//! Front ends for Sprig: the `sprig` command, the REPL, and compiled
//! artifacts.
//!
//! This crate provides:
//! - [`Session`] - persistent compile-and-run state shared by every front end
//! - [`Repl`] - interactive read-eval-print loop over a [`LineEditor`]
//! - [`Artifact`] - `MessagePack` envelopes for libraries and images
//! - build helpers that turn source files into artifacts

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod build;
pub mod editor;
pub mod highlight;
pub mod repl;
pub mod serialize;
pub mod session;

pub use build::{build_image, build_library, link_artifacts};
pub use editor::{LineEditor, MockEditor, ReadResult, RustylineEditor};
pub use highlight::SprigHighlighter;
pub use repl::{Repl, ReplConfig, Response};
pub use serialize::{Artifact, FORMAT_VERSION, MAGIC, Payload, load_from_file, save_to_file};
pub use session::{Session, emit_output};
