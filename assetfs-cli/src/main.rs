//! AssetFS CLI - Command-line interface
//!
//! Inspect layered asset trees, compile them into embedded tree files and
//! serve them over HTTP.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::common::{self, SourceArgs};
use commands::query::{GlobArgs, WalkArgs};
use commands::{compile, query, serve};
use error::{must, CliError};

#[derive(Parser)]
#[command(name = "assetfs")]
#[command(about = "Layered virtual filesystem for named assets")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the content of an asset
    Cat {
        /// Logical path, e.g. z/sub-ns/nsf.txt
        path: String,
    },

    /// Describe how a path resolves
    Info {
        path: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// List one directory level
    Ls {
        #[arg(default_value = ".")]
        dir: String,

        /// Leave directories out
        #[arg(long)]
        files_only: bool,
    },

    /// Recursive listing
    Walk(WalkArgs),

    /// Print paths matching a pattern
    Glob(GlobArgs),

    /// Print every visible path once, sorted
    Dump {
        /// Leave directories out
        #[arg(long)]
        files_only: bool,

        /// Skip paths matching this shell pattern (repeatable)
        #[arg(long, value_name = "PATTERN")]
        ignore: Vec<String>,
    },

    /// Compile the tree into an embedded tree file
    Compile {
        /// Output file
        output: PathBuf,

        /// Skip paths matching this shell pattern (repeatable)
        #[arg(long, value_name = "PATTERN")]
        ignore: Vec<String>,
    },

    /// Copy one asset to a file
    Export {
        /// Logical path
        name: String,

        /// Destination file
        dest: PathBuf,

        /// Write even if the destination looks up to date
        #[arg(short, long)]
        force: bool,
    },

    /// Serve assets over HTTP
    Serve {
        /// Address to bind (default from config, then 127.0.0.1:8080)
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,
    },
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = common::merge_args(&cli.source, common::load_config(&cli.source)?)?;

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging = logging.with_level("debug");
    }
    let _guard = assetfs::logging::init_logging(&logging)?;
    tracing::debug!(version = assetfs::VERSION, "Starting assetfs");

    let session = common::open(&cli.source, &config)?;

    match cli.command {
        Commands::Cat { path } => query::run_cat(&session, &path),
        Commands::Info { path, json } => query::run_info(&session, &path, json),
        Commands::Ls { dir, files_only } => query::run_ls(&session, &dir, files_only),
        Commands::Walk(args) => query::run_walk(&session, &args),
        Commands::Glob(args) => query::run_glob(&session, &args),
        Commands::Dump { files_only, ignore } => compile::run_dump(&session, files_only, &ignore),
        Commands::Compile { output, ignore } => compile::run_compile(&session, &output, &ignore),
        Commands::Export { name, dest, force } => {
            compile::run_export(&session, &name, &dest, force)
        }
        Commands::Serve { listen } => serve::run(session, &config.http, listen.as_deref()),
    }
}

fn main() {
    must(run(Cli::parse()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_source_args_after_subcommand() {
        let cli = Cli::try_parse_from([
            "assetfs", "cat", "z/a.txt", "--root", "t/data", "--ns", "z=t/ns", "-n", "z",
        ])
        .unwrap();
        assert_eq!(cli.source.roots, vec![PathBuf::from("t/data")]);
        assert_eq!(cli.source.namespaces, vec!["z=t/ns".to_string()]);
        assert_eq!(cli.source.namespace.as_deref(), Some("z"));
        assert!(matches!(cli.command, Commands::Cat { ref path } if path == "z/a.txt"));
    }

    #[test]
    fn test_walk_flags_conflict() {
        let result = Cli::try_parse_from(["assetfs", "walk", "--files-only", "--dirs-only"]);
        assert!(result.is_err());
    }
}
