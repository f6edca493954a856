//! Ahead-of-time builds: source files to artifacts.
//!
//! `build_image` compiles with function bodies inline, as the REPL does.
//! `build_library` hoists bodies into a function table so the unit can be
//! linked with others later.

use std::path::{Path, PathBuf};

use sprig_foundation::{Error, ErrorKind, Result};
use sprig_language::{
    Ast, Expansion, GlobalRegistry, Image, Library, Loader, SourceProvider, compile_image, compile_library, expand,
    link, resolve,
};

use crate::serialize::{Payload, load_from_file};

/// Loads and expands `paths` in order as one program.
///
/// # Errors
/// Load, parse and expansion errors.
pub fn load_program<P: SourceProvider>(loader: &mut Loader<P>, paths: &[PathBuf]) -> Result<Expansion> {
    let mut forms: Vec<Ast> = Vec::new();
    for path in paths {
        forms.extend(loader.load_file(path)?);
    }
    expand(forms)
}

/// Compiles source files into a runnable image.
///
/// # Errors
/// Load and expansion errors, or `CompileFailed` with every compile error.
pub fn build_image<P: SourceProvider>(loader: &mut Loader<P>, paths: &[PathBuf]) -> Result<Image> {
    let expansion = load_program(loader, paths)?;
    let mut globals = GlobalRegistry::with_defaults();
    compile_image(&expansion.forms, &mut globals)
}

/// Compiles source files into a relocatable library.
///
/// # Errors
/// As for [`build_image`].
pub fn build_library<P: SourceProvider>(loader: &mut Loader<P>, paths: &[PathBuf]) -> Result<Library> {
    let expansion = load_program(loader, paths)?;
    compile_library(&expansion.forms, expansion.macro_names)
}

/// Links library artifacts, in order, into one image.
///
/// # Errors
/// I/O and decoding errors, an artifact that is not a library, or a link
/// failure.
pub fn link_artifacts(paths: &[PathBuf]) -> Result<Image> {
    let units = paths
        .iter()
        .map(|path| match load_from_file(path)?.payload {
            Payload::Library(library) => Ok(library),
            Payload::Image(_) => Err(not_a_library(path)),
        })
        .collect::<Result<Vec<Library>>>()?;
    resolve(&link(&units)?)
}

fn not_a_library(path: &Path) -> Error {
    Error::new(ErrorKind::SerializationError(format!(
        "{} holds an image; only libraries can be linked",
        path.display()
    )))
}
