//! The setup pipeline: check existing → download → verify → extract → locate.
//!
//! Building a [`Setup`] only resolves the version and platform; nothing touches
//! the filesystem or network until [`Setup::run`]. Work happens in a staging
//! directory that is renamed into place once complete, under an exclusive
//! lock per installation key, so an installation directory is either absent
//! or fully populated.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::FetchConfig;
use crate::download::{
    extract_zip, verify, write_receipt, InstallKey, InstallReceipt, InstallRoot, ReleaseClient,
    ReleaseSource,
};
use crate::error::FetchError;
use crate::locate::{ensure_executable, locate_executable};
use crate::platform::Platform;
use crate::runner::Runner;
use crate::ui::{Phase, Ui};

/// A usable installation on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Installation {
    pub key: InstallKey,
    pub dir: PathBuf,
    pub executable: PathBuf,
}

impl Installation {
    pub fn runner(&self) -> Runner {
        Runner::unbound(&self.dir).bind(&self.executable)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetupOutcome {
    /// The executable was already present; nothing was downloaded.
    AlreadyInstalled(Installation),
    Installed(Installation),
}

impl SetupOutcome {
    pub fn installation(&self) -> &Installation {
        match self {
            SetupOutcome::AlreadyInstalled(i) | SetupOutcome::Installed(i) => i,
        }
    }

    pub fn into_installation(self) -> Installation {
        match self {
            SetupOutcome::AlreadyInstalled(i) | SetupOutcome::Installed(i) => i,
        }
    }
}

pub struct Setup {
    key: InstallKey,
    root: InstallRoot,
    source: ReleaseSource,
    timeout: Option<Duration>,
}

impl Setup {
    /// Resolve version and platform. Fails only when detection finds no variant.
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let platform = Platform::resolve(config.platform)?;
        Ok(Self {
            key: InstallKey::new(config.version.clone(), platform),
            root: config.install_root(),
            source: config.source.clone(),
            timeout: config.timeout,
        })
    }

    pub fn key(&self) -> &InstallKey {
        &self.key
    }

    pub fn install_dir(&self) -> PathBuf {
        self.root.install_dir(&self.key)
    }

    pub fn asset_url(&self) -> String {
        self.source.asset_url(&self.key.version, self.key.platform)
    }

    /// The installation if its executable is already on disk.
    pub fn existing(&self) -> Option<Installation> {
        let dir = self.install_dir();
        locate_executable(&dir, self.key.platform.executable_name()).map(|executable| Installation {
            key: self.key.clone(),
            dir,
            executable,
        })
    }

    pub fn run(&self, ui: &mut impl Ui) -> Result<SetupOutcome, FetchError> {
        ui.set_phase(Phase::Checking);
        ui.set_info(format!("bun {} ({})", self.key.version, self.key.platform));

        if let Some(installed) = self.existing() {
            ui.log(format!("Already installed: {}", installed.executable.display()));
            return Ok(SetupOutcome::AlreadyInstalled(installed));
        }

        let _lock = self.root.lock(&self.key)?;

        // Another process may have finished while we waited for the lock
        if let Some(installed) = self.existing() {
            ui.log(format!("Installed concurrently: {}", installed.executable.display()));
            return Ok(SetupOutcome::AlreadyInstalled(installed));
        }

        let staging = self.root.staging_dir(&self.key);
        reset_dir(&staging)?;

        let receipt = match self.populate(&staging, ui) {
            Ok(receipt) => receipt,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    tracing::warn!("could not remove {}: {cleanup}", staging.display());
                }
                return Err(e);
            }
        };

        let dir = self.install_dir();
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| FetchError::io(&dir, e))?;
        }
        fs::rename(&staging, &dir).map_err(|e| FetchError::io(&dir, e))?;

        let executable = dir.join(&receipt.executable);
        ui.set_phase(Phase::Complete);
        ui.log(format!("Bun ready: {}", executable.display()));

        Ok(SetupOutcome::Installed(Installation {
            key: self.key.clone(),
            dir,
            executable,
        }))
    }

    /// Download, verify, extract and locate inside `staging`.
    fn populate(&self, staging: &Path, ui: &mut impl Ui) -> Result<InstallReceipt, FetchError> {
        let platform = self.key.platform;
        let client = ReleaseClient::new(self.source.clone(), self.timeout)?;

        ui.set_phase(Phase::Downloading);
        let url = self.asset_url();
        let asset = self.root.asset_path(&self.key);
        ui.log(format!("Downloading {url}"));
        client.download(&url, &asset, ui)?;

        ui.set_phase(Phase::Verifying);
        let expected = client.expected_checksum(&self.key.version, platform.asset_name())?;
        let sha256 = verify(&asset, &expected)?;
        ui.log(format!("sha256 {sha256}"));

        ui.set_phase(Phase::Extracting);
        ui.log(format!("Extracting {} -> {}", platform.asset_name(), self.install_dir().display()));
        extract_zip(&asset, staging, ui)?;
        fs::remove_file(&asset).map_err(|e| FetchError::io(&asset, e))?;

        ui.set_phase(Phase::Locating);
        let found = locate_executable(staging, platform.executable_name()).ok_or_else(|| {
            FetchError::ExecutableNotFound {
                name: platform.executable_name().to_string(),
                dir: self.install_dir(),
            }
        })?;
        ensure_executable(&found).map_err(|e| FetchError::io(&found, e))?;

        let relative = found
            .strip_prefix(staging)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| found.clone());
        let receipt = InstallReceipt {
            version: self.key.version.clone(),
            platform: platform.to_string(),
            url,
            sha256,
            executable: relative,
        };
        write_receipt(staging, &receipt)?;

        Ok(receipt)
    }
}

/// Empty `dir`, removing leftovers of an interrupted setup.
fn reset_dir(dir: &Path) -> Result<(), FetchError> {
    if dir.exists() {
        tracing::debug!("removing stale {}", dir.display());
        fs::remove_dir_all(dir).map_err(|e| FetchError::io(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| FetchError::io(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::SilentUi;
    use tempfile::tempdir;

    fn config(root: &Path) -> FetchConfig {
        FetchConfig::new(root, root)
            .with_version(Some("1.1.0"))
            .with_platform(Some(Platform::LinuxX64))
            // nothing listens here; any network access fails the test
            .with_source(ReleaseSource::new("http://127.0.0.1:9", "http://127.0.0.1:9"))
    }

    #[test]
    fn construction_does_no_io() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        let setup = Setup::new(&config(&root)).unwrap();

        assert_eq!(setup.key(), &InstallKey::new("1.1.0", Platform::LinuxX64));
        assert_eq!(
            setup.asset_url(),
            "http://127.0.0.1:9/download/bun-v1.1.0/bun-linux-x64.zip"
        );
        assert!(!root.exists());
    }

    #[test]
    fn existing_installation_short_circuits() {
        let dir = tempdir().unwrap();
        let setup = Setup::new(&config(dir.path())).unwrap();
        let bin = setup.install_dir().join("bun-linux-x64").join("bun");
        fs::create_dir_all(bin.parent().unwrap()).unwrap();
        fs::write(&bin, b"").unwrap();

        let outcome = setup.run(&mut SilentUi::new()).unwrap();
        assert!(matches!(outcome, SetupOutcome::AlreadyInstalled(_)));
        assert_eq!(outcome.installation().executable, bin);
        assert_eq!(outcome.into_installation().runner().executable().unwrap(), bin);
    }

    #[test]
    fn download_failure_leaves_no_partial_state() {
        let dir = tempdir().unwrap();
        let setup = Setup::new(&config(dir.path())).unwrap();

        let err = setup.run(&mut SilentUi::new()).unwrap_err();
        assert_eq!(err.exit_code(), 3);

        let root = InstallRoot::new(dir.path());
        assert!(!root.staging_dir(setup.key()).exists());
        assert!(!setup.install_dir().exists());
    }

    #[test]
    fn reset_dir_clears_leftovers() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join(".bun-linux-x64.partial");
        fs::create_dir_all(staging.join("half")).unwrap();
        fs::write(staging.join("half").join("file"), b"x").unwrap();

        reset_dir(&staging).unwrap();
        assert!(staging.is_dir());
        assert_eq!(fs::read_dir(&staging).unwrap().count(), 0);
    }
}
