use std::path::PathBuf;

use thiserror::Error;

/// Every way a fetch, install or run can fail.
///
/// Each variant names the pipeline stage it came from and the path or URL
/// involved, so the message alone is enough to tell the user what broke.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("platform detection: unsupported OS/arch: os={os} arch={arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("platform override: unknown platform '{0}' (see `runtime-fetcher platforms`)")]
    InvalidPlatform(String),

    #[error("download: GET {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("download: writing {} failed", path.display())]
    DownloadIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "verify: SHA-256 mismatch for {}\n\
         Expected: {expected}\n\
         Actual:   {actual}\n\
         Deleted corrupted download.",
        path.display()
    )]
    IntegrityMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("verify: could not find sha256 for {asset} on {page}: {reason}")]
    ChecksumUnavailable {
        asset: String,
        page: String,
        reason: String,
    },

    #[error("extract: {} failed: {reason}", archive.display())]
    Extraction { archive: PathBuf, reason: String },

    #[error("locate: {name} not found under {} after extraction", dir.display())]
    ExecutableNotFound { name: String, dir: PathBuf },

    #[error("run: executable not resolved under {} (run setup first)", dir.display())]
    ExecutableNotResolved { dir: PathBuf },

    #[error("i/o on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("lock: could not lock {}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code reported by the CLI for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::UnsupportedPlatform { .. } | Self::InvalidPlatform(_) => 2,
            Self::Http { .. } | Self::DownloadIo { .. } => 3,
            Self::IntegrityMismatch { .. } => 4,
            Self::Extraction { .. } => 5,
            Self::ExecutableNotFound { .. } => 6,
            Self::ChecksumUnavailable { .. } => 7,
            Self::ExecutableNotResolved { .. } => 8,
            Self::Io { .. } | Self::Lock { .. } => 1,
        }
    }
}
