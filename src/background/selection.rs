use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use super::error::BackgroundError;

/// An image the user picked, as an absolute path to an existing file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSelection {
    path: PathBuf,
}

impl ImageSelection {
    /// Resolve `path` against the current directory and check that it names a file.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, BackgroundError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| BackgroundError::io("getting current directory", e))?
                .join(path)
        };

        if !absolute.is_file() {
            return Err(BackgroundError::NotFound(absolute));
        }

        let path = absolute.canonicalize().map_err(|e| {
            BackgroundError::io(format!("resolving {}", absolute.display()), e)
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `file://` URI for the image, as GNOME and gnome-shell's CSS expect it
    pub fn file_uri(&self) -> String {
        file_uri(&self.path)
    }
}

impl fmt::Display for ImageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Build a `file://` URI, percent-encoding the raw bytes of each path segment
pub fn file_uri(path: &Path) -> String {
    let encoded: Vec<String> = path
        .as_os_str()
        .as_bytes()
        .split(|b| *b == b'/')
        .map(|segment| urlencoding::encode_binary(segment).into_owned())
        .collect();
    format!("file://{}", encoded.join("/"))
}
