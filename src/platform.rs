//! Supported Bun release variants and host detection.

use std::fmt;
use std::str::FromStr;

use crate::error::FetchError;

/// One (OS, CPU architecture, build flavor) combination with its own release asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    WindowsX64,
    WindowsX64Baseline,
    DarwinAarch64,
    DarwinX64,
    LinuxX64,
    LinuxX64Baseline,
    LinuxAarch64,
    LinuxX64Musl,
    LinuxX64MuslBaseline,
    LinuxAarch64Musl,
}

struct Variant {
    platform: Platform,
    name: &'static str,
    asset: &'static str,
    executable: &'static str,
}

// Release assets are always `bun-<name>.zip`
macro_rules! variant {
    ($platform:ident, $name:literal, $executable:literal) => {
        Variant {
            platform: Platform::$platform,
            name: $name,
            asset: concat!("bun-", $name, ".zip"),
            executable: $executable,
        }
    };
}

const VARIANTS: [Variant; 10] = [
    variant!(WindowsX64, "windows-x64", "bun.exe"),
    variant!(WindowsX64Baseline, "windows-x64-baseline", "bun.exe"),
    variant!(DarwinAarch64, "darwin-aarch64", "bun"),
    variant!(DarwinX64, "darwin-x64", "bun"),
    variant!(LinuxX64, "linux-x64", "bun"),
    variant!(LinuxX64Baseline, "linux-x64-baseline", "bun"),
    variant!(LinuxAarch64, "linux-aarch64", "bun"),
    variant!(LinuxX64Musl, "linux-x64-musl", "bun"),
    variant!(LinuxX64MuslBaseline, "linux-x64-musl-baseline", "bun"),
    variant!(LinuxAarch64Musl, "linux-aarch64-musl", "bun"),
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum HostOs {
    Windows,
    MacOs,
    Linux,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum HostArch {
    X64,
    Arm64,
}

impl Platform {
    pub const ALL: [Platform; 10] = [
        Platform::WindowsX64,
        Platform::WindowsX64Baseline,
        Platform::DarwinAarch64,
        Platform::DarwinX64,
        Platform::LinuxX64,
        Platform::LinuxX64Baseline,
        Platform::LinuxAarch64,
        Platform::LinuxX64Musl,
        Platform::LinuxX64MuslBaseline,
        Platform::LinuxAarch64Musl,
    ];

    fn variant(self) -> &'static Variant {
        // VARIANTS is declared in the same order as the enum
        &VARIANTS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.variant().name
    }

    /// Release asset file name, e.g. `bun-linux-x64.zip`.
    pub fn asset_name(self) -> &'static str {
        self.variant().asset
    }

    pub fn executable_name(self) -> &'static str {
        self.variant().executable
    }

    /// Directory name under a version directory, the asset name minus `.zip`.
    pub fn install_subdir(self) -> &'static str {
        let asset = self.asset_name();
        asset.strip_suffix(".zip").unwrap_or(asset)
    }

    /// Detect the variant for the running host.
    pub fn detect() -> Result<Self, FetchError> {
        Self::detect_from(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Match an (OS, arch) pair against the auto-detectable variants.
    ///
    /// Baseline and musl builds are never picked here; they are only
    /// reachable through an explicit override.
    pub fn detect_from(os: &str, arch: &str) -> Result<Self, FetchError> {
        let os_lower = os.to_ascii_lowercase();
        let arch_lower = arch.to_ascii_lowercase();

        let is_mac = os_lower == "macos" || os_lower.contains("darwin") || os_lower.contains("mac");
        let host_os = if is_mac {
            Some(HostOs::MacOs)
        } else if os_lower.starts_with("win") {
            Some(HostOs::Windows)
        } else if os_lower.contains("linux") {
            Some(HostOs::Linux)
        } else {
            None
        };

        let host_arch = if arch_lower.contains("aarch64") || arch_lower.contains("arm64") {
            Some(HostArch::Arm64)
        } else if arch_lower.contains("x86_64") || arch_lower.contains("amd64") {
            Some(HostArch::X64)
        } else {
            None
        };

        match (host_os, host_arch) {
            (Some(HostOs::Windows), Some(HostArch::X64)) => Ok(Platform::WindowsX64),
            (Some(HostOs::MacOs), Some(HostArch::Arm64)) => Ok(Platform::DarwinAarch64),
            (Some(HostOs::MacOs), Some(HostArch::X64)) => Ok(Platform::DarwinX64),
            (Some(HostOs::Linux), Some(HostArch::Arm64)) => Ok(Platform::LinuxAarch64),
            (Some(HostOs::Linux), Some(HostArch::X64)) => Ok(Platform::LinuxX64),
            _ => Err(FetchError::UnsupportedPlatform {
                os: os_lower,
                arch: arch_lower,
            }),
        }
    }

    /// Use the explicit override when given, otherwise detect.
    pub fn resolve(explicit: Option<Platform>) -> Result<Self, FetchError> {
        match explicit {
            Some(platform) => Ok(platform),
            None => Self::detect(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = FetchError;

    /// Accepts `linux-x64`, `bun-linux-x64`, `bun-linux-x64.zip` and
    /// `LINUX_X64`, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut key = s.trim().to_ascii_lowercase().replace('_', "-");
        if let Some(stripped) = key.strip_suffix(".zip") {
            key = stripped.to_string();
        }
        if let Some(stripped) = key.strip_prefix("bun-") {
            key = stripped.to_string();
        }

        VARIANTS
            .iter()
            .find(|v| v.name == key)
            .map(|v| v.platform)
            .ok_or_else(|| FetchError::InvalidPlatform(s.to_string()))
    }
}
