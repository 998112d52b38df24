//! Copy an asset out to a physical file.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use crate::error::{is_absent, AssetError, AssetResult, UnsupportedReason};
use crate::local::LookupContext;
use crate::source::AssetSource;

/// Write the asset `name` to `dest`.
///
/// Parent directories are created. Unless `force` is set, a destination
/// with the same size and modification time is left alone and `Ok(false)`
/// is returned. The copy gets the asset's mtime and, for real files, its
/// permission bits.
pub fn save_asset<S: AssetSource + ?Sized>(
    source: &S,
    ctx: &LookupContext,
    name: &str,
    dest: &Path,
    force: bool,
) -> AssetResult<bool> {
    let entry = source.asset_info_in(ctx, name)?;
    if entry.is_dir() {
        let reason = if entry.is_namespace() {
            UnsupportedReason::IsNamespace
        } else {
            UnsupportedReason::IsDirectory
        };
        return Err(AssetError::unsupported(entry.path(), reason));
    }

    if !force {
        match fs::metadata(dest) {
            Ok(existing) => {
                let same_time = existing
                    .modified()
                    .map(|mtime| mtime == entry.modified())
                    .unwrap_or(false);
                if existing.len() == entry.size() && same_time {
                    tracing::debug!(
                        asset = %entry.path(),
                        dest = %dest.display(),
                        "Destination up to date"
                    );
                    return Ok(false);
                }
            }
            Err(e) if is_absent(&e) => {}
            Err(e) => return Err(AssetError::io(dest, e)),
        }
    }

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| AssetError::io(parent, e))?;
    }

    let mut reader = entry.reader()?;
    let mut file = File::create(dest).map_err(|e| AssetError::io(dest, e))?;
    io::copy(&mut reader, &mut file).map_err(|e| AssetError::io(dest, e))?;
    file.set_modified(entry.modified())
        .map_err(|e| AssetError::io(dest, e))?;

    if entry.file_type().is_real() {
        if let Some(real_path) = entry.real_path() {
            let permissions = fs::metadata(real_path)
                .map_err(|e| AssetError::io(real_path, e))?
                .permissions();
            fs::set_permissions(dest, permissions).map_err(|e| AssetError::io(dest, e))?;
        }
    }

    tracing::info!(
        asset = %entry.path(),
        dest = %dest.display(),
        bytes = entry.size(),
        "Saved asset"
    );
    Ok(true)
}
