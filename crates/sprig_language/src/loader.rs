//! Module loader for `(use "path")`.
//!
//! The loader reads a source file, finds its top-level `use` forms and
//! inlines each used module ahead of the file's own forms, recursively, so
//! the compiler sees one flat program. Every module is inlined once; a
//! module that (transitively) uses itself is an error.
//!
//! Paths resolve against the using file's directory first, then against
//! each configured search path. The `.sprig` extension is appended when
//! missing.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use sprig_foundation::{Error, ErrorKind, Result};

use crate::ast::Ast;
use crate::parser::parse;

// =============================================================================
// Source providers
// =============================================================================

/// Where module source text comes from.
pub trait SourceProvider {
    /// Reads the file at `path`.
    ///
    /// # Errors
    /// Returns `IoError` if the file cannot be read.
    fn read(&self, path: &Path) -> Result<String>;

    /// Returns true if `path` names a readable file.
    fn exists(&self, path: &Path) -> bool;

    /// Returns the identity used for duplicate and cycle detection.
    fn canonicalize(&self, path: &Path) -> PathBuf {
        normalize(path)
    }
}

/// Reads modules from the file system.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsProvider;

impl SourceProvider for FsProvider {
    fn read(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path)
            .map_err(|e| Error::new(ErrorKind::IoError(format!("{}: {e}", path.display()))))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn canonicalize(&self, path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| normalize(path))
    }
}

/// Serves modules from memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryProvider {
    files: HashMap<PathBuf, String>,
}

impl MemoryProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file.
    #[must_use]
    pub fn with_file(mut self, path: impl AsRef<Path>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    /// Adds or replaces a file.
    pub fn insert(&mut self, path: impl AsRef<Path>, source: impl Into<String>) {
        self.files.insert(normalize(path.as_ref()), source.into());
    }
}

impl SourceProvider for MemoryProvider {
    fn read(&self, path: &Path) -> Result<String> {
        self.files
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::IoError(format!("{}: no such file", path.display()))))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize(path))
    }
}

/// Resolves `.` and `..` components without touching the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// =============================================================================
// Configuration
// =============================================================================

/// Loader settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Directories searched after the using file's own directory.
    pub search_paths: Vec<PathBuf>,
    /// Extension appended to module names that have none.
    pub extension: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            extension: "sprig".to_string(),
        }
    }
}

impl LoaderConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a search path.
    #[must_use]
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Sets the module extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

// =============================================================================
// Loader
// =============================================================================

/// Resolves `use` forms into one program.
pub struct Loader<P: SourceProvider> {
    provider: P,
    config: LoaderConfig,
    /// Modules already inlined.
    loaded: HashSet<PathBuf>,
    /// Modules being loaded, outermost first.
    loading: Vec<PathBuf>,
}

impl Loader<FsProvider> {
    /// Creates a loader over the file system.
    #[must_use]
    pub fn from_fs(config: LoaderConfig) -> Self {
        Self::new(FsProvider, config)
    }
}

impl<P: SourceProvider> Loader<P> {
    /// Creates a loader.
    #[must_use]
    pub fn new(provider: P, config: LoaderConfig) -> Self {
        Self {
            provider,
            config,
            loaded: HashSet::new(),
            loading: Vec::new(),
        }
    }

    /// Returns true if `path` has already been inlined.
    #[must_use]
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.loaded.contains(&self.provider.canonicalize(path))
    }

    /// Loads a file and everything it uses.
    ///
    /// # Errors
    /// Read and parse failures, unresolvable or malformed `use` forms, and
    /// cyclic loads.
    pub fn load_file(&mut self, path: &Path) -> Result<Vec<Ast>> {
        let path = self.provider.canonicalize(path);
        if self.loaded.contains(&path) {
            return Ok(Vec::new());
        }
        self.load_module(path)
    }

    /// Loads source text that is not itself a module, such as REPL input.
    /// Relative `use` paths resolve against `base_dir`.
    ///
    /// Modules loaded by earlier calls are not inlined again.
    ///
    /// # Errors
    /// As for [`Loader::load_file`].
    pub fn load_source(&mut self, source: &str, base_dir: &Path) -> Result<Vec<Ast>> {
        let forms = parse(source)?;
        self.inline_uses(forms, base_dir)
    }

    fn load_module(&mut self, path: PathBuf) -> Result<Vec<Ast>> {
        if let Some(start) = self.loading.iter().position(|p| p == &path) {
            let mut cycle: Vec<String> = self.loading[start..]
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            cycle.push(path.display().to_string());
            return Err(Error::new(ErrorKind::CyclicLoad(cycle.join(" -> "))));
        }

        let source = self.provider.read(&path)?;
        let forms = parse(&source).map_err(|e| in_source(e, &path))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        self.loading.push(path.clone());
        let result = self.inline_uses(forms, &base_dir);
        self.loading.pop();

        let forms = result.map_err(|e| in_source(e, &path))?;
        self.loaded.insert(path);
        Ok(forms)
    }

    /// Replaces top-level `use` forms: used modules come first, in order,
    /// then the remaining forms.
    fn inline_uses(&mut self, forms: Vec<Ast>, base_dir: &Path) -> Result<Vec<Ast>> {
        let mut dependencies = Vec::new();
        let mut own = Vec::with_capacity(forms.len());

        for form in forms {
            match use_target(&form)? {
                Some(name) => {
                    let path = self.resolve(&name, base_dir).ok_or_else(|| {
                        let span = form.span();
                        Error::new(ErrorKind::ModuleNotFound(name.clone())).at_position(span.line, span.column)
                    })?;
                    if !self.loaded.contains(&path) {
                        dependencies.extend(self.load_module(path)?);
                    }
                }
                None => own.push(form),
            }
        }

        dependencies.extend(own);
        Ok(dependencies)
    }

    /// Finds the file a `use` names.
    fn resolve(&self, name: &str, base_dir: &Path) -> Option<PathBuf> {
        let mut file = PathBuf::from(name);
        if file.extension().is_none() {
            file.set_extension(&self.config.extension);
        }
        if file.is_absolute() {
            return self.provider.exists(&file).then(|| self.provider.canonicalize(&file));
        }

        std::iter::once(base_dir)
            .chain(self.config.search_paths.iter().map(PathBuf::as_path))
            .map(|dir| dir.join(&file))
            .find(|candidate| self.provider.exists(candidate))
            .map(|found| self.provider.canonicalize(&found))
    }
}

/// Returns the module named by a `(use "path")` form.
fn use_target(form: &Ast) -> Result<Option<String>> {
    let Some(items) = form.as_list() else {
        return Ok(None);
    };
    if items.first().and_then(Ast::as_symbol) != Some("use") {
        return Ok(None);
    }
    match items {
        [_, target] => target.as_string().map(|s| Some(s.to_string())).ok_or_else(|| {
            let span = target.span();
            Error::invalid_form("use expects a string path").at_position(span.line, span.column)
        }),
        _ => {
            let span = form.span();
            Err(Error::arity_mismatch("use", "1", items.len() - 1).at_position(span.line, span.column))
        }
    }
}

/// Records the module an error came from, keeping the innermost one.
fn in_source(mut error: Error, path: &Path) -> Error {
    let context = error.context.take().unwrap_or_default();
    error.context = Some(if context.source.is_some() {
        context
    } else {
        context.with_source(path.display().to_string())
    });
    error
}
