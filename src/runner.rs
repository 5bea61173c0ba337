use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::download::{InstallKey, InstallRoot};
use crate::error::FetchError;
use crate::locate::locate_executable;

/// Launches the runtime executable. Must be bound to a path first; running
/// an unbound runner is a usage error rather than an implicit setup.
#[derive(Debug, Clone)]
pub struct Runner {
    executable: Option<PathBuf>,
    install_dir: PathBuf,
}

impl Runner {
    /// A runner for `install_dir` whose executable has not been resolved yet.
    pub fn unbound(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: None,
            install_dir: install_dir.into(),
        }
    }

    pub fn bind(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    /// Bind from an existing installation without touching the network.
    pub fn resolve(root: &InstallRoot, key: &InstallKey) -> Self {
        let install_dir = root.install_dir(key);
        let executable = locate_executable(&install_dir, key.platform.executable_name());
        Self {
            executable,
            install_dir,
        }
    }

    pub fn executable(&self) -> Result<&Path, FetchError> {
        self.executable
            .as_deref()
            .ok_or_else(|| FetchError::ExecutableNotResolved {
                dir: self.install_dir.clone(),
            })
    }

    /// Run with inherited stdio and return the child's exit code.
    /// Arguments are passed through verbatim.
    pub fn run<I, S>(&self, working_dir: &Path, args: I) -> Result<i32, FetchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        // current_dir applies before the program path is resolved
        let executable = std::path::absolute(self.executable()?)
            .map_err(|e| FetchError::io(&self.install_dir, e))?;
        let executable = executable.as_path();
        let args: Vec<S> = args.into_iter().collect();

        tracing::info!("executable: [{}]", executable.display());
        tracing::info!(
            "arguments : {:?}",
            args.iter().map(|a| a.as_ref().to_string_lossy()).collect::<Vec<_>>()
        );

        let status = Command::new(executable)
            .args(&args)
            .current_dir(working_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| FetchError::io(executable, e))?;

        match status.code() {
            Some(code) => Ok(code),
            None => {
                tracing::warn!("{} terminated by a signal", executable.display());
                Ok(1)
            }
        }
    }
}
