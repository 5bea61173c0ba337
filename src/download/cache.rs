use directories::ProjectDirs;
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::FetchError;
use crate::platform::Platform;

const RECEIPT_FILE: &str = ".receipt.json";

/// Identifies one installed distribution: (normalized version, platform variant).
#[derive(Debug, Clone, PartialEq)]
pub struct InstallKey {
    pub version: String,
    pub platform: Platform,
}

impl InstallKey {
    pub fn new(version: impl Into<String>, platform: Platform) -> Self {
        Self {
            version: version.into(),
            platform,
        }
    }
}

impl std::fmt::Display for InstallKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.version, self.platform)
    }
}

/// Written next to a completed installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub version: String,
    pub platform: String,
    pub url: String,
    pub sha256: String,
    /// Executable path relative to the installation directory.
    pub executable: PathBuf,
}

/// Directory tree holding all installations:
/// `<root>/<version>/<platform subdir>/...`
#[derive(Debug, Clone)]
pub struct InstallRoot {
    root: PathBuf,
}

impl InstallRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Per-user cache location, e.g. `~/.cache/runtime-fetcher/bun` on Linux.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "runtime-fetcher").map(|dirs| dirs.cache_dir().join("bun"))
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.root.join(version)
    }

    pub fn install_dir(&self, key: &InstallKey) -> PathBuf {
        self.version_dir(&key.version).join(key.platform.install_subdir())
    }

    /// Scratch directory a setup fills before renaming it to [`Self::install_dir`].
    pub fn staging_dir(&self, key: &InstallKey) -> PathBuf {
        self.version_dir(&key.version)
            .join(format!(".{}.partial", key.platform.install_subdir()))
    }

    /// Where the downloaded asset lives until it has been extracted.
    pub fn asset_path(&self, key: &InstallKey) -> PathBuf {
        self.staging_dir(key).join(key.platform.asset_name())
    }

    pub fn lock_path(&self, key: &InstallKey) -> PathBuf {
        self.version_dir(&key.version)
            .join(format!("{}.lock", key.platform.install_subdir()))
    }

    /// Block until this process holds the exclusive lock for `key`.
    pub fn lock(&self, key: &InstallKey) -> Result<InstallLock, FetchError> {
        InstallLock::acquire(&self.lock_path(key))
    }

    pub fn read_receipt(&self, key: &InstallKey) -> Option<InstallReceipt> {
        read_receipt(&self.install_dir(key))
    }

    /// Every completed installation under the root, sorted by version then platform.
    pub fn installations(&self) -> Result<Vec<(PathBuf, InstallReceipt)>, FetchError> {
        let mut found = Vec::new();
        if !self.root.exists() {
            return Ok(found);
        }

        for version in read_dir_sorted(&self.root)? {
            if !version.is_dir() {
                continue;
            }
            for install in read_dir_sorted(&version)? {
                let hidden = install
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'));
                if hidden || !install.is_dir() {
                    continue;
                }
                if let Some(receipt) = read_receipt(&install) {
                    found.push((install, receipt));
                }
            }
        }
        Ok(found)
    }

    /// Remove one version's installations, or everything when `version` is `None`.
    /// Returns the number of bytes freed.
    pub fn clean(&self, version: Option<&str>) -> Result<u64, FetchError> {
        let target = match version {
            Some(v) => self.version_dir(v),
            None => self.root.clone(),
        };
        if !target.exists() {
            return Ok(0);
        }
        let size = dir_size(&target);
        fs::remove_dir_all(&target).map_err(|e| FetchError::io(&target, e))?;
        Ok(size)
    }
}

pub(crate) fn write_receipt(dir: &Path, receipt: &InstallReceipt) -> Result<(), FetchError> {
    let path = dir.join(RECEIPT_FILE);
    let json = serde_json::to_vec_pretty(receipt)
        .map_err(|e| FetchError::io(&path, std::io::Error::other(e)))?;
    fs::write(&path, json).map_err(|e| FetchError::io(&path, e))
}

fn read_receipt(install_dir: &Path) -> Option<InstallReceipt> {
    let path = install_dir.join(RECEIPT_FILE);
    let text = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&text) {
        Ok(receipt) => Some(receipt),
        Err(e) => {
            tracing::warn!("ignoring unreadable receipt {}: {e}", path.display());
            None
        }
    }
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| FetchError::io(dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();
    Ok(entries)
}

pub fn dir_size(path: &Path) -> u64 {
    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}

/// Exclusive advisory lock on `<root>/<version>/<platform>.lock`, released on drop.
#[derive(Debug)]
pub struct InstallLock {
    file: File,
    path: PathBuf,
}

impl InstallLock {
    fn acquire(path: &Path) -> Result<Self, FetchError> {
        let lock_err = |source| FetchError::Lock {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(lock_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(lock_err)?;

        tracing::debug!("locking {}", path.display());
        FileExt::lock_exclusive(&file).map_err(lock_err)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn receipt(version: &str, platform: Platform) -> InstallReceipt {
        InstallReceipt {
            version: version.to_string(),
            platform: platform.to_string(),
            url: format!("https://example.com/{}", platform.asset_name()),
            sha256: "ab".repeat(32),
            executable: PathBuf::from(platform.install_subdir()).join(platform.executable_name()),
        }
    }

    #[test]
    fn layout_is_version_then_platform() {
        let root = InstallRoot::new("/cache/bun");
        let key = InstallKey::new("1.1.0", Platform::LinuxX64);

        assert_eq!(root.install_dir(&key), PathBuf::from("/cache/bun/1.1.0/bun-linux-x64"));
        assert_eq!(
            root.staging_dir(&key),
            PathBuf::from("/cache/bun/1.1.0/.bun-linux-x64.partial")
        );
        assert_eq!(
            root.asset_path(&key),
            PathBuf::from("/cache/bun/1.1.0/.bun-linux-x64.partial/bun-linux-x64.zip")
        );
        assert_eq!(root.lock_path(&key), PathBuf::from("/cache/bun/1.1.0/bun-linux-x64.lock"));
        assert_eq!(key.to_string(), "1.1.0/linux-x64");
    }

    #[test]
    fn receipts_round_trip_and_list_sorted() {
        let dir = tempdir().unwrap();
        let root = InstallRoot::new(dir.path());

        let keys = [
            ("1.1.0", Platform::LinuxX64),
            ("1.0.0", Platform::DarwinAarch64),
        ];
        for (version, platform) in keys {
            let key = InstallKey::new(version, platform);
            let install = root.install_dir(&key);
            fs::create_dir_all(&install).unwrap();
            write_receipt(&install, &receipt(version, platform)).unwrap();
        }
        // staging dirs are not installations
        let staging = root.staging_dir(&InstallKey::new("1.1.0", Platform::LinuxAarch64));
        fs::create_dir_all(&staging).unwrap();
        write_receipt(&staging, &receipt("1.1.0", Platform::LinuxAarch64)).unwrap();

        let listed = root.installations().unwrap();
        let versions: Vec<&str> = listed.iter().map(|(_, r)| r.version.as_str()).collect();
        assert_eq!(versions, ["1.0.0", "1.1.0"]);

        let key = InstallKey::new("1.1.0", Platform::LinuxX64);
        assert_eq!(root.read_receipt(&key), Some(receipt("1.1.0", Platform::LinuxX64)));
    }

    #[test]
    fn missing_root_lists_nothing() {
        let dir = tempdir().unwrap();
        let root = InstallRoot::new(dir.path().join("never-created"));
        assert!(root.installations().unwrap().is_empty());
        assert_eq!(root.clean(None).unwrap(), 0);
    }

    #[test]
    fn clean_single_version() {
        let dir = tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        for version in ["1.0.0", "1.1.0"] {
            let install = root.install_dir(&InstallKey::new(version, Platform::LinuxX64));
            fs::create_dir_all(&install).unwrap();
            fs::write(install.join("bun"), b"12345").unwrap();
        }

        assert_eq!(root.clean(Some("1.0.0")).unwrap(), 5);
        assert!(!root.version_dir("1.0.0").exists());
        assert!(root.version_dir("1.1.0").exists());
    }

    #[test]
    fn lock_can_be_reacquired_after_drop() {
        let dir = tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        let key = InstallKey::new("latest", Platform::LinuxX64);

        let lock = root.lock(&key).unwrap();
        assert!(lock.path().exists());
        drop(lock);

        let again = root.lock(&key).unwrap();
        assert_eq!(again.path(), root.lock_path(&key));
    }
}
