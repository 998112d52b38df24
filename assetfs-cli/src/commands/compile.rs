//! Commands that flatten or copy assets: dump, compile, export.

use std::io::{self, Write};
use std::path::Path;

use assetfs::export::save_asset;
use assetfs::{AssetFs, AssetResult, AssetSource, EmbeddedTree, Entry, Visit, WalkMode};

use crate::commands::common::Session;
use crate::error::CliError;

/// Build an ignore predicate from shell patterns matched against the
/// full logical path or the last segment.
pub fn ignore_matcher(patterns: &[String]) -> Result<impl Fn(&str) -> bool, CliError> {
    let compiled = patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| {
                CliError::InvalidArgument(format!("bad ignore pattern '{}': {}", p, e))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(move |path: &str| {
        let name = assetfs::path::base_name(path);
        compiled.iter().any(|p| p.matches(path) || p.matches(name))
    })
}

fn live(session: &Session, command: &str) -> Result<AssetFs, CliError> {
    session.live.clone().ok_or_else(|| {
        CliError::InvalidArgument(format!("{} needs directory roots, not --embedded", command))
    })
}

/// Print every visible path once, sorted.
pub fn run_dump(session: &Session, files_only: bool, ignore: &[String]) -> Result<(), CliError> {
    let ignore = ignore_matcher(ignore)?;
    let mut stdout = io::stdout().lock();
    let mut print = |entry: Entry| -> AssetResult<Visit> {
        match writeln!(stdout, "{}", entry) {
            Ok(()) => Ok(Visit::Continue),
            Err(_) => Ok(Visit::Stop),
        }
    };

    match &session.live {
        Some(fs) => {
            for entry in fs.tree_names(&session.context, files_only, Some(&ignore))? {
                if print(entry)? == Visit::Stop {
                    break;
                }
            }
        }
        None => {
            let mode = if files_only {
                WalkMode::FILES | WalkMode::NAMESPACES_LOOKUP
            } else {
                WalkMode::ALL
            };
            session.source.walk_info(".", mode, &mut |entry: Entry| {
                if ignore(entry.path()) {
                    return Ok(Visit::SkipDir);
                }
                print(entry)
            })?;
        }
    }
    Ok(())
}

/// Serialize the live tree into an embedded tree file.
pub fn run_compile(session: &Session, output: &Path, ignore: &[String]) -> Result<(), CliError> {
    let fs = live(session, "compile")?;
    let ignore = ignore_matcher(ignore)?;
    let tree = EmbeddedTree::compile(&fs, &session.context, Some(&ignore))?;
    tree.save(output)?;
    println!(
        "Compiled {} files, {} directories into {}",
        tree.file_count(),
        tree.dir_count(),
        output.display()
    );
    Ok(())
}

/// Copy one asset to a file.
pub fn run_export(session: &Session, name: &str, dest: &Path, force: bool) -> Result<(), CliError> {
    let written = save_asset(session.source.as_ref(), &session.context, name, dest, force)?;
    if written {
        println!("Saved {} to {}", name, dest.display());
    } else {
        println!("{} is up to date", dest.display());
    }
    Ok(())
}
