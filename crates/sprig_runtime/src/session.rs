//! Session state shared by the front ends.
//!
//! A session keeps everything that must survive between inputs: the global
//! registry the compiler assigns ids from, the VM holding global values,
//! the macro table, the set of modules already loaded, the tracer, and the
//! bytecode of every input run so far. Each input is assembled at the end
//! of that stream and run from there, so a function value defined earlier
//! still points at its body.
//!
//! ```text
//! source ─▶ Loader ─▶ Expander ─▶ compile_code ─▶ assemble_at(len) ─▶ code ─▶ Vm ─▶ Value
//!                                    │                                        │
//!                             GlobalRegistry ─────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use sprig_debug::{DebugConfig, TraceOutput, Tracer};
use sprig_foundation::{Port, Result, Value};
use sprig_language::{
    Ast, Expander, FsProvider, GlobalRegistry, Image, Loader, LoaderConfig, OutputLine, SourceProvider, Vm,
    assemble_at, compile_code, compile_image, parse, render,
};

/// Writes program output to the process's stdout and stderr.
pub fn emit_output(lines: &[OutputLine]) {
    for line in lines {
        match line.port {
            Port::Stdout => println!("{}", line.text),
            Port::Stderr => eprintln!("{}", line.text),
        }
    }
}

/// Persistent compile-and-run state.
pub struct Session<P: SourceProvider = FsProvider> {
    globals: GlobalRegistry,
    vm: Vm,
    expander: Expander,
    loader: Loader<P>,
    tracer: Tracer,
    code: Vec<u8>,
    base_dir: PathBuf,
}

impl Session<FsProvider> {
    /// Creates a session reading modules from the file system.
    #[must_use]
    pub fn new(debug: &DebugConfig, loader: LoaderConfig) -> Self {
        Self::with_provider(FsProvider, debug, loader)
    }
}

impl Default for Session<FsProvider> {
    fn default() -> Self {
        Self::new(&DebugConfig::default(), LoaderConfig::default())
    }
}

impl<P: SourceProvider> Session<P> {
    /// Creates a session over any module source.
    #[must_use]
    pub fn with_provider(provider: P, debug: &DebugConfig, loader: LoaderConfig) -> Self {
        let globals = GlobalRegistry::with_defaults();
        let vm = Vm::new(&globals, debug.vm.clone());
        Self {
            globals,
            vm,
            expander: Expander::new(),
            loader: Loader::new(provider, loader),
            tracer: debug.tracer(),
            code: Vec::new(),
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Sets the directory relative `use` paths in typed input resolve
    /// against.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Evaluates source text and returns the value of its last form.
    ///
    /// Definitions and macros persist into later calls. Output written by
    /// the program is kept until [`Session::take_output`].
    ///
    /// # Errors
    /// Parse, load, expansion and compile errors (compile errors arrive as
    /// one `CompileFailed`), then any runtime error.
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        let forms = self.loader.load_source(source, &self.base_dir)?;
        self.run_forms(forms)
    }

    /// Loads and evaluates files in order, as one program.
    ///
    /// # Errors
    /// As for [`Session::eval`].
    pub fn eval_files(&mut self, paths: &[PathBuf]) -> Result<Value> {
        let mut forms = Vec::new();
        for path in paths {
            forms.extend(self.loader.load_file(path)?);
        }
        self.run_forms(forms)
    }

    /// Runs an already compiled image against this session's VM.
    ///
    /// The image's globals replace the session's registry and its code
    /// replaces the session's stream; later input is appended after it.
    ///
    /// # Errors
    /// Fails if the image's global table is malformed, or at runtime.
    pub fn run_image(&mut self, image: &Image) -> Result<Value> {
        self.globals = image.registry()?;
        self.code.clone_from(&image.code);
        self.execute(0)
    }

    fn run_forms(&mut self, forms: Vec<Ast>) -> Result<Value> {
        let expansion = self.expander.expand_program(forms)?;
        let asm = compile_code(&expansion.forms, &mut self.globals)?;
        let entry = self.code.len();
        let bytes = assemble_at(&asm, entry)?;
        self.code.extend_from_slice(&bytes);
        self.execute(entry)
    }

    fn compile_forms(&mut self, forms: Vec<Ast>) -> Result<Image> {
        let expansion = self.expander.expand_program(forms)?;
        compile_image(&expansion.forms, &mut self.globals)
    }

    fn execute(&mut self, entry: usize) -> Result<Value> {
        self.vm.install_globals(&self.globals);
        self.vm.execute_from_with_observer(&self.code, entry, &mut self.tracer)
    }

    /// Bytes of code the session has accumulated.
    #[must_use]
    pub fn code_len(&self) -> usize {
        self.code.len()
    }

    /// Compiles source into an image without running it.
    ///
    /// # Errors
    /// As for [`Session::eval`], minus runtime errors.
    pub fn compile(&mut self, source: &str) -> Result<Image> {
        let forms = self.loader.load_source(source, &self.base_dir)?;
        self.compile_forms(forms)
    }

    /// Renders the abstract assembly `source` compiles to.
    ///
    /// Works on copies of the registry and macro table, so nothing is
    /// defined by looking.
    ///
    /// # Errors
    /// Parse, expansion and compile errors.
    pub fn asm(&self, source: &str) -> Result<String> {
        let (forms, mut globals) = self.preview(source)?;
        Ok(compile_code(&forms, &mut globals)?.to_string())
    }

    /// Renders the bytecode `source` compiles to.
    ///
    /// # Errors
    /// As for [`Session::asm`].
    pub fn disasm(&self, source: &str) -> Result<String> {
        let (forms, mut globals) = self.preview(source)?;
        render(&compile_image(&forms, &mut globals)?.code)
    }

    fn preview(&self, source: &str) -> Result<(Vec<Ast>, GlobalRegistry)> {
        let mut expander = self.expander.clone();
        let forms = expander.expand_program(parse(source)?)?.forms;
        Ok((forms, self.globals.clone()))
    }

    /// Returns every global with a value, in id order.
    #[must_use]
    pub fn globals(&self) -> Vec<(&str, &Value)> {
        self.vm.defined_globals()
    }

    /// Returns the global registry.
    #[must_use]
    pub const fn registry(&self) -> &GlobalRegistry {
        &self.globals
    }

    /// Returns the names of all macros declared so far, sorted.
    #[must_use]
    pub fn macro_names(&self) -> Vec<&str> {
        self.expander.macro_names()
    }

    /// Returns true if `path` has been loaded by a `use` or a file run.
    #[must_use]
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.loader.is_loaded(path)
    }

    /// Returns and clears the output written so far.
    pub fn take_output(&mut self) -> Vec<OutputLine> {
        self.vm.take_output()
    }

    /// Returns the tracer.
    #[must_use]
    pub const fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Returns the tracer mutably.
    pub fn tracer_mut(&mut self) -> &mut Tracer {
        &mut self.tracer
    }

    /// Turns tracing on (echoing to stderr) or off.
    pub fn set_tracing(&mut self, on: bool) {
        if on {
            self.tracer.set_output(TraceOutput::Stderr);
            self.tracer.enable();
        } else {
            self.tracer.disable();
        }
    }
}
