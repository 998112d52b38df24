//! Read-only lookup commands: cat, info, ls, walk, glob.

use std::io::{self, Write};

use assetfs::http::http_date;
use assetfs::{AssetResult, AssetSource, Entry, GlobPattern, Visit, WalkMode};
use clap::Args;
use serde_json::json;

use crate::commands::common::Session;
use crate::error::CliError;

/// Options of the `walk` command.
#[derive(Debug, Clone, Args)]
pub struct WalkArgs {
    /// Directory to walk
    #[arg(default_value = ".")]
    pub dir: String,

    /// Only report files
    #[arg(long, conflicts_with = "dirs_only")]
    pub files_only: bool,

    /// Only report directories
    #[arg(long)]
    pub dirs_only: bool,

    /// Do not descend into child namespaces
    #[arg(long)]
    pub no_namespaces: bool,

    /// Do not fall through to parent namespaces
    #[arg(long)]
    pub no_parent: bool,

    /// Visit roots last-registered first
    #[arg(long)]
    pub reverse: bool,
}

impl WalkArgs {
    pub fn mode(&self) -> WalkMode {
        let mut mode = WalkMode::ALL;
        if self.files_only {
            mode = mode.without(WalkMode::DIRS);
        }
        if self.dirs_only {
            mode = mode.without(WalkMode::FILES);
        }
        if self.no_namespaces {
            mode = mode.without(WalkMode::NAMESPACES_LOOKUP);
        }
        if self.no_parent {
            mode = mode.without(WalkMode::PARENT_LOOKUP);
        }
        if self.reverse {
            mode = mode.with(WalkMode::REVERSE);
        }
        mode
    }
}

/// Options of the `glob` command.
#[derive(Debug, Clone, Args)]
pub struct GlobArgs {
    /// Pattern, e.g. `css/*.css`
    pub pattern: String,

    /// Search subdirectories too
    #[arg(short, long)]
    pub recursive: bool,

    /// Only match files
    #[arg(long, conflicts_with = "dirs_only")]
    pub files_only: bool,

    /// Only match directories
    #[arg(long)]
    pub dirs_only: bool,
}

impl GlobArgs {
    pub fn pattern(&self) -> Result<GlobPattern, CliError> {
        let mut pattern = GlobPattern::new(&self.pattern)?;
        if self.recursive {
            pattern = pattern.recursive();
        }
        if self.files_only {
            pattern = pattern.files_only();
        }
        if self.dirs_only {
            pattern = pattern.dirs_only();
        }
        Ok(pattern)
    }
}

fn print_entry(out: &mut impl Write, entry: &Entry) -> AssetResult<Visit> {
    // A closed pipe ends the listing quietly.
    match writeln!(out, "{}", entry) {
        Ok(()) => Ok(Visit::Continue),
        Err(_) => Ok(Visit::Stop),
    }
}

/// Write the asset content to stdout.
pub fn run_cat(session: &Session, path: &str) -> Result<(), CliError> {
    let data = session.source.asset_in(&session.context, path)?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(&data)?;
    stdout.flush()?;
    Ok(())
}

/// Describe one entry.
pub fn run_info(session: &Session, path: &str, as_json: bool) -> Result<(), CliError> {
    let entry = session.source.asset_info_in(&session.context, path)?;
    let real_path = entry.real_path().map(|p| p.display().to_string());

    if as_json {
        let value = json!({
            "path": entry.path(),
            "name": entry.name(),
            "type": entry.file_type().to_string(),
            "is_dir": entry.is_dir(),
            "size": entry.size(),
            "modified": http_date(entry.modified()),
            "real_path": real_path,
        });
        println!("{}", value);
    } else {
        println!("Path:      {}", entry.path());
        println!("Type:      {}", entry.file_type());
        println!("Directory: {}", entry.is_dir());
        println!("Size:      {}", entry.size());
        println!("Modified:  {}", http_date(entry.modified()));
        println!("Real path: {}", real_path.as_deref().unwrap_or("(none)"));
    }
    Ok(())
}

/// List one directory level.
pub fn run_ls(session: &Session, dir: &str, skip_dirs: bool) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    session
        .source
        .read_dir(dir, skip_dirs, &mut |entry: Entry| print_entry(&mut stdout, &entry))?;
    Ok(())
}

/// Recursive listing.
pub fn run_walk(session: &Session, args: &WalkArgs) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    session
        .source
        .walk_info(&args.dir, args.mode(), &mut |entry: Entry| {
            print_entry(&mut stdout, &entry)
        })?;
    Ok(())
}

/// Print paths matching a pattern.
pub fn run_glob(session: &Session, args: &GlobArgs) -> Result<(), CliError> {
    let pattern = args.pattern()?;
    let mut stdout = io::stdout().lock();
    session
        .source
        .glob_info(&pattern, &mut |entry: Entry| print_entry(&mut stdout, &entry))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk_args() -> WalkArgs {
        WalkArgs {
            dir: ".".to_string(),
            files_only: false,
            dirs_only: false,
            no_namespaces: false,
            no_parent: false,
            reverse: false,
        }
    }

    #[test]
    fn test_walk_mode_flags() {
        assert_eq!(walk_args().mode(), WalkMode::ALL);

        let args = WalkArgs {
            files_only: true,
            no_parent: true,
            reverse: true,
            ..walk_args()
        };
        let mode = args.mode();
        assert!(mode.files() && !mode.dirs() && !mode.namespaces());
        assert!(!mode.parent_lookup() && mode.reverse());
    }

    #[test]
    fn test_glob_args_pattern() {
        let args = GlobArgs {
            pattern: "css/*.css".to_string(),
            recursive: true,
            files_only: true,
            dirs_only: false,
        };
        let pattern = args.pattern().unwrap();
        assert!(pattern.is_recursive());
        assert!(!pattern.allow_dirs());
        assert_eq!(pattern.dir(), "css");
    }
}
