//! Closure CLI entry point

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "closure")]
#[command(about = "Compute the file and symbol closure of a C declaration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to closure.toml in the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Add a user include directory
    #[arg(short = 'I', value_name = "DIR", global = true)]
    include: Vec<PathBuf>,

    /// Add a system include directory
    #[arg(long = "isystem", value_name = "DIR", global = true)]
    system_include: Vec<PathBuf>,

    /// Record type uses (struct/union) as symbol dependencies
    #[arg(long, global = true)]
    include_type_refs: bool,

    /// Glob excluded from directory walks
    #[arg(long, value_name = "GLOB", global = true)]
    exclude: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the selectable symbols of each file
    List {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Print the signature of the N-th symbol of a file
    Select {
        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        symbol: usize,
    },
    /// Print the user inclusion tree of the given sources
    Tree {
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Print Graphviz DOT instead
        #[arg(long)]
        dot: bool,
    },
    /// Print the files and symbols needed by a symbol
    Closure {
        /// File the seed symbol is selected from
        #[arg(long)]
        file: PathBuf,

        /// Position of the seed symbol in the file
        #[arg(long)]
        symbol: usize,

        /// Sources (files or directories) the graphs are built from
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Print the symbol graph as Graphviz DOT instead
        #[arg(long)]
        dot: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for results
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("closure={log_level}")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let options = commands::Options {
        config: cli.config,
        include_dirs: cli.include,
        system_include_dirs: cli.system_include,
        include_type_refs: cli.include_type_refs,
        exclude: cli.exclude,
    };
    let config = options.load()?;

    match cli.command {
        Commands::List { files, format } => commands::list(&config, &files, format),
        Commands::Select { file, symbol } => commands::select(&config, &file, symbol),
        Commands::Tree { sources, format, dot } => commands::tree(&config, &sources, format, dot),
        Commands::Closure {
            file,
            symbol,
            sources,
            format,
            dot,
        } => commands::closure(&config, &file, symbol, &sources, format, dot),
    }
}
