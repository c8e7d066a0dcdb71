//! chunktmpl CLI
//!
//! Usage:
//!   chunktmpl [OPTIONS] [FILE]
//!
//! Options:
//!   -c, --context <FILE>  Template variables (TOML, or JSON for `.json` files)
//!       --config <FILE>   Engine options (TOML)
//!       --chunks          Print the chunk sequence as JSON instead of the text
//!   -v, --verbose         More logging (repeat for trace output)
//!   -h, --help            Print help

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use chunktmpl::{Context, Engine, Error, Options};

#[derive(Parser)]
#[command(name = "chunktmpl")]
#[command(about = "Render templates with priority-annotated output chunks")]
struct Cli {
    /// Template file (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Context file with template variables (TOML, or JSON for .json files)
    #[arg(short, long)]
    context: Option<PathBuf>,

    /// Engine options file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the chunk sequence as JSON
    #[arg(long)]
    chunks: bool,

    /// Increase log verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Load options
    let options = match &cli.config {
        Some(path) => match Options::from_file(path) {
            Ok(options) => options,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Options::default(),
    };

    // Load context
    let context = match &cli.context {
        Some(path) => match load_context(path) {
            Ok(context) => context,
            Err(e) => {
                eprintln!("Error loading context '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Context::new(),
    };

    // Read input
    let (name, source) = match &cli.input {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => (path.display().to_string(), content),
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => ("<stdin>".to_string(), buffer),
                Err(e) => {
                    eprintln!("Error reading from stdin: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    let engine = Engine::with_options(options);
    let template = match engine.compile_named(&name, &source) {
        Ok(template) => template,
        Err(Error::Parse(e)) => {
            eprint!("{}", e.format(&source, &name));
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = if cli.chunks {
        template.execute_chunks(&context).and_then(|chunks| {
            serde_json::to_string_pretty(&chunks)
                .map(|json| json + "\n")
                .map_err(|e| Error::Io(e.into()))
        })
    } else {
        template.execute(&context)
    };

    match result {
        Ok(output) => {
            let mut stdout = io::stdout().lock();
            if let Err(e) = stdout.write_all(output.as_bytes()) {
                eprintln!("Error writing output: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Log to stderr; `RUST_LOG` wins over `-v`
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[derive(Debug, thiserror::Error)]
enum ContextError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Toml(#[from] toml::de::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

fn load_context(path: &Path) -> Result<Context, ContextError> {
    let content = fs::read_to_string(path)?;
    if path.extension().is_some_and(|ext| ext == "json") {
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(toml::from_str(&content)?)
    }
}
