//! Single-slot backup of a system file in the user's home directory

use std::fs;
use std::path::{Path, PathBuf};

use crate::ui::prelude::*;

use super::error::BackgroundError;

/// `<home>/<file name>.bak`
pub fn backup_path(source: &Path, home: &Path) -> Result<PathBuf, BackgroundError> {
    let name = source.file_name().ok_or_else(|| {
        BackgroundError::io(
            format!("{} has no file name", source.display()),
            std::io::Error::from(std::io::ErrorKind::InvalidInput),
        )
    })?;

    let mut backup_name = name.to_os_string();
    backup_name.push(".bak");
    Ok(home.join(backup_name))
}

/// Copy `source` to its backup location, replacing any previous backup.
///
/// Permissions and modification time are carried over.
pub fn backup(source: &Path, home: &Path) -> Result<PathBuf, BackgroundError> {
    if !source.exists() {
        return Err(BackgroundError::NotFound(source.to_path_buf()));
    }

    let destination = backup_path(source, home)?;
    if destination.exists() {
        fs::remove_file(&destination)
            .map_err(|e| BackgroundError::io("cannot remove stale backup", e))?;
    }

    fs::copy(source, &destination).map_err(|e| {
        BackgroundError::io(
            format!(
                "copying {} to {}",
                source.display(),
                destination.display()
            ),
            e,
        )
    })?;
    copy_modified_time(source, &destination)?;

    emit(
        Level::Debug,
        "backup.created",
        &format!("Backed up {} to {}", source.display(), destination.display()),
        None,
    );
    Ok(destination)
}

fn copy_modified_time(source: &Path, destination: &Path) -> Result<(), BackgroundError> {
    let context = || format!("preserving timestamps on {}", destination.display());

    let modified = fs::metadata(source)
        .and_then(|m| m.modified())
        .map_err(|e| BackgroundError::io(context(), e))?;

    // the copy inherits the source mode, which may be read-only
    let file = fs::OpenOptions::new()
        .write(true)
        .open(destination)
        .or_else(|_| fs::File::open(destination))
        .map_err(|e| BackgroundError::io(context(), e))?;
    file.set_modified(modified)
        .map_err(|e| BackgroundError::io(context(), e))
}
