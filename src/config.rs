use std::path::PathBuf;
use std::time::Duration;

use crate::download::{InstallRoot, ReleaseSource};
use crate::platform::Platform;
use crate::version::normalize_version;

/// Everything a setup or run needs, gathered from CLI flags and environment.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Already normalized; `"latest"` when the user gave nothing.
    pub version: String,
    /// Explicit variant, or `None` to detect the host.
    pub platform: Option<Platform>,
    pub root: PathBuf,
    /// Working directory for the launched runtime.
    pub project_dir: PathBuf,
    pub source: ReleaseSource,
    /// Whole-request limit for downloads; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl FetchConfig {
    pub fn new(root: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            version: normalize_version(None),
            platform: None,
            root: root.into(),
            project_dir: project_dir.into(),
            source: ReleaseSource::default(),
            timeout: None,
        }
    }

    pub fn with_version(mut self, version: Option<&str>) -> Self {
        self.version = normalize_version(version);
        self
    }

    pub fn with_platform(mut self, platform: Option<Platform>) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_source(mut self, source: ReleaseSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn install_root(&self) -> InstallRoot {
        InstallRoot::new(&self.root)
    }
}
