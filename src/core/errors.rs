//! Error types
//!
//! [`BackendError`] covers every condition the backend surfaces to callers.
//! Application edges (CLI, config) use `anyhow` with [`BezyContext`] for
//! file-operation context.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("unknown font source identifier: {0}")]
    UnknownLocationBase(String),

    #[error("modifying isSparse is not supported (source '{0}')")]
    SparseFlagChange(String),

    #[error("kerning uses unknown source identifiers: {0:?}")]
    UnknownKerningSources(Vec<String>),

    #[error("can't write kerning to sparse sources: {0:?}")]
    SparseKerningSources(Vec<String>),

    #[error("the single-UFO backend does not support variation axes")]
    SingleUfoAxes,

    #[error("the single-UFO backend does not support multiple sources")]
    SingleUfoSources,

    #[error("glyph '{0}' does not exist")]
    GlyphNotFound(String),

    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error("unsupported font source: {}", .0.display())]
    UnsupportedSource(PathBuf),

    #[error("invalid name '{0}'")]
    InvalidName(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("plist error in {}: {source}", path.display())]
    Plist {
        path: PathBuf,
        #[source]
        source: plist::Error,
    },

    #[error("failed to read glyph {}: {source}", path.display())]
    GlifLoad {
        path: PathBuf,
        #[source]
        source: norad::error::GlifLoadError,
    },

    #[error("failed to encode glyph '{name}': {source}")]
    GlifWrite {
        name: String,
        #[source]
        source: norad::error::GlifWriteError,
    },

    #[error("invalid designspace {}: {message}", path.display())]
    Designspace { path: PathBuf, message: String },

    #[error("image error: {0}")]
    Image(String),

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("glyph dependency computation was cancelled")]
    DependenciesCancelled,

    #[error("glyph dependency scan failed: {0}")]
    DependencyScan(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Result alias for application-edge code
pub type BezyResult<T> = anyhow::Result<T>;

impl BackendError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackendError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn plist(path: impl Into<PathBuf>, source: plist::Error) -> Self {
        BackendError::Plist {
            path: path.into(),
            source,
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        BackendError::Invariant(message.into())
    }
}

/// Adds file-operation context to fallible results
pub trait BezyContext<T> {
    fn with_file_context(self, operation: &str, path: &Path) -> anyhow::Result<T>;
}

impl<T, E> BezyContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_file_context(self, operation: &str, path: &Path) -> anyhow::Result<T> {
        self.map_err(|error| {
            anyhow::Error::new(error).context(format!("Failed to {operation} {}", path.display()))
        })
    }
}

/// Check that `path` points at something the backend can open: a UFO
/// directory with a `metainfo.plist`, or a `.designspace` file.
pub fn validate_source_path(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Err(format!(
            "Font source does not exist: {}\nMake sure the path is correct and the file exists.",
            path.display()
        ));
    }
    if path.is_dir() {
        if !path.join("metainfo.plist").exists() {
            return Err(format!(
                "Not a valid UFO directory: missing metainfo.plist in {}",
                path.display()
            ));
        }
        return Ok(());
    }
    match path.extension() {
        Some(extension) if extension == "designspace" => Ok(()),
        Some(_) => Err(format!(
            "Unsupported file type: {}\nOnly .designspace files are supported for non-directory sources.",
            path.display()
        )),
        None => Err(format!(
            "File has no extension: {}\nExpected a .designspace file.",
            path.display()
        )),
    }
}
