//! Sprig command-line entry point.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use sprig_debug::DebugConfig;
use sprig_foundation::{Result, Value};
use sprig_language::{Loader, LoaderConfig};
use sprig_runtime::repl::print_error;
use sprig_runtime::{
    Artifact, Repl, ReplConfig, Session, build_image, build_library, emit_output, link_artifacts, load_from_file,
    save_to_file,
};

/// Compiler, linker, and virtual machine for the Sprig language.
#[derive(Parser)]
#[command(name = "sprig", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Compile and run source files, or run a compiled artifact.
    Run {
        /// Source files (run in order as one program) or one artifact.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        search: SearchPaths,
        #[command(flatten)]
        limits: Limits,
        /// Trace executed instructions to stderr.
        #[arg(long)]
        trace: bool,
        /// Write trace records as JSON.
        #[arg(long, requires = "trace")]
        trace_json: bool,
    },
    /// Compile source files into an image, or a library with --lib.
    Build {
        /// Source files, compiled in order as one unit.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output path.
        #[arg(short, long)]
        output: PathBuf,
        /// Build a relocatable library instead of an image.
        #[arg(long)]
        lib: bool,
        #[command(flatten)]
        search: SearchPaths,
    },
    /// Link libraries into an image.
    Link {
        /// Library artifacts, in order.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the contents of an artifact.
    Disasm {
        /// A library or image.
        artifact: PathBuf,
    },
    /// Start the interactive REPL (the default).
    Repl {
        /// Keep history in this file.
        #[arg(long)]
        history: Option<PathBuf>,
        /// Start with tracing on.
        #[arg(long)]
        trace: bool,
        /// Skip the welcome banner.
        #[arg(long)]
        no_banner: bool,
        #[command(flatten)]
        search: SearchPaths,
    },
}

#[derive(Args)]
struct SearchPaths {
    /// Extra directory to search for `use`d modules.
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    dirs: Vec<PathBuf>,
}

impl SearchPaths {
    fn loader_config(&self) -> LoaderConfig {
        self.dirs
            .iter()
            .fold(LoaderConfig::new(), |config, dir| config.with_search_path(dir.clone()))
    }
}

#[derive(Args)]
struct Limits {
    /// Maximum frame stack size in cells.
    #[arg(long, value_name = "CELLS")]
    max_frames: Option<usize>,
    /// Maximum value stack size.
    #[arg(long, value_name = "VALUES")]
    max_stack: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Repl {
        history: None,
        trace: false,
        no_banner: false,
        search: SearchPaths { dirs: Vec::new() },
    });

    match dispatch(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Run {
            files,
            search,
            limits,
            trace,
            trace_json,
        } => {
            let mut debug = DebugConfig::new();
            if trace {
                debug = debug.with_stderr_trace(trace_json);
            }
            if let Some(cells) = limits.max_frames {
                debug = debug.with_max_frame_cells(cells);
            }
            if let Some(values) = limits.max_stack {
                debug = debug.with_max_stack(values);
            }
            let value = run(&files, &debug, search.loader_config())?;
            println!("{value:?}");
            Ok(())
        }
        Command::Build {
            files,
            output,
            lib,
            search,
        } => {
            let mut loader = Loader::from_fs(search.loader_config());
            let artifact = if lib {
                Artifact::library(build_library(&mut loader, &files)?)
            } else {
                Artifact::image(build_image(&mut loader, &files)?)
            };
            save_to_file(&artifact, &output)
        }
        Command::Link { inputs, output } => save_to_file(&Artifact::image(link_artifacts(&inputs)?), &output),
        Command::Disasm { artifact } => {
            print!("{}", load_from_file(&artifact)?.render()?);
            Ok(())
        }
        Command::Repl {
            history,
            trace,
            no_banner,
            search,
        } => {
            let mut config = ReplConfig::new();
            if let Some(path) = history {
                config = config.with_history_file(path);
            }
            if trace {
                config = config.with_trace();
            }
            if no_banner {
                config = config.without_banner();
            }
            Repl::new(config, &DebugConfig::new(), search.loader_config())?.run()
        }
    }
}

/// Runs source files, or a single artifact, flushing program output even
/// when execution fails.
fn run(files: &[PathBuf], debug: &DebugConfig, loader: LoaderConfig) -> Result<Value> {
    let mut session = Session::new(debug, loader);
    let result = match files {
        [single] if is_artifact(single) => load_from_file(single)?
            .into_image()
            .and_then(|image| session.run_image(&image)),
        _ => session.eval_files(files),
    };
    emit_output(&session.take_output());
    result
}

fn is_artifact(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "sprigc" | "sprigl"))
}
