//! Source selection shared by every command.

use std::path::PathBuf;
use std::sync::Arc;

use assetfs::config::ConfigFile;
use assetfs::{AssetFs, AssetSource, EmbeddedFs, LocalSources, LookupContext, SourceDir};
use clap::Args;

use crate::error::CliError;

/// Where assets come from. Applies to every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct SourceArgs {
    /// Configuration file (default: ~/.assetfs/config.ini)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Root directory of the top-level namespace (repeatable, in precedence order)
    #[arg(long = "root", global = true, value_name = "DIR")]
    pub roots: Vec<PathBuf>,

    /// Root directory of a namespace, as NAME=DIR (repeatable)
    #[arg(long = "ns", global = true, value_name = "NAME=DIR")]
    pub namespaces: Vec<String>,

    /// Register a local source, as NAME=DIR (repeatable)
    #[arg(long = "local", global = true, value_name = "NAME=DIR")]
    pub locals: Vec<String>,

    /// Activate a registered local source for lookups (repeatable, in order)
    #[arg(long = "use-local", global = true, value_name = "NAME")]
    pub use_local: Vec<String>,

    /// Read from a compiled embedded tree instead of directories
    #[arg(long, global = true, value_name = "FILE")]
    pub embedded: Option<PathBuf>,

    /// Operate inside this namespace (dotted or slash separated)
    #[arg(short = 'n', long, global = true, value_name = "NAME")]
    pub namespace: Option<String>,
}

/// Everything a command needs to run lookups.
pub struct Session {
    pub source: Arc<dyn AssetSource>,
    /// The live tree, when not reading from an embedded file.
    pub live: Option<AssetFs>,
    pub context: LookupContext,
}

/// Split `NAME=DIR`.
pub fn parse_pair(value: &str) -> Result<(String, PathBuf), CliError> {
    match value.split_once('=') {
        Some((name, dir)) if !name.trim().is_empty() && !dir.trim().is_empty() => {
            Ok((name.trim().to_string(), PathBuf::from(dir.trim())))
        }
        _ => Err(CliError::InvalidArgument(format!(
            "expected NAME=DIR, got '{}'",
            value
        ))),
    }
}

/// Load the configuration file named by `--config`, or the default one.
pub fn load_config(args: &SourceArgs) -> Result<ConfigFile, CliError> {
    match &args.config {
        Some(path) => Ok(ConfigFile::load_from(path)?),
        None => Ok(ConfigFile::load()?),
    }
}

/// Merge command-line sources into the configuration.
pub fn merge_args(args: &SourceArgs, mut config: ConfigFile) -> Result<ConfigFile, CliError> {
    config.roots.extend(args.roots.iter().cloned());
    for value in &args.namespaces {
        let (name, dir) = parse_pair(value)?;
        match config.namespaces.iter_mut().find(|(n, _)| *n == name) {
            Some((_, roots)) => roots.push(dir),
            None => config.namespaces.push((name, vec![dir])),
        }
    }
    for value in &args.locals {
        config.local_sources.push(parse_pair(value)?);
    }
    Ok(config)
}

/// Build the asset source the command will read from.
pub fn open(args: &SourceArgs, config: &ConfigFile) -> Result<Session, CliError> {
    let context = LookupContext::new().with_local_names(args.use_local.iter().cloned());
    let namespace = args.namespace.as_deref().unwrap_or("");

    if let Some(path) = &args.embedded {
        let registry = Arc::new(LocalSources::new());
        for (name, dir) in &config.local_sources {
            registry.register(name.clone(), SourceDir::new(dir));
        }
        let embedded = EmbeddedFs::load(path)?
            .with_local_sources(registry)
            .namespace(namespace);
        return Ok(Session {
            source: Arc::new(embedded),
            live: None,
            context,
        });
    }

    if config.roots.is_empty() && config.namespaces.is_empty() {
        return Err(CliError::Config(
            "no asset roots configured; pass --root, --ns, --embedded or a config file".to_string(),
        ));
    }
    let fs = config.build_fs()?.namespace(namespace);
    Ok(Session {
        source: Arc::new(fs.clone()),
        live: Some(fs),
        context,
    })
}
