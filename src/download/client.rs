use regex::Regex;
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use crate::error::FetchError;
use crate::platform::Platform;
use crate::ui::Ui;
use crate::version::is_latest;

const DOWNLOAD_BASE: &str = "https://github.com/oven-sh/bun/releases";
const CHECKSUM_BASE: &str = "https://github.com/Jarred-Sumner/bun-releases-for-updater/releases";

/// Release tags are `bun-v<version>`.
const TAG_PREFIX: &str = "bun-v";

/// Maximum distance, in characters, between an asset name and its digest on the metadata page.
const CHECKSUM_WINDOW: usize = 400;

const USER_AGENT: &str = concat!("runtime-fetcher/", env!("CARGO_PKG_VERSION"));

/// Where release assets and their checksum metadata live.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseSource {
    pub download_base: String,
    pub checksum_base: String,
}

impl Default for ReleaseSource {
    fn default() -> Self {
        Self {
            download_base: DOWNLOAD_BASE.to_string(),
            checksum_base: CHECKSUM_BASE.to_string(),
        }
    }
}

impl ReleaseSource {
    pub fn new(download_base: impl Into<String>, checksum_base: impl Into<String>) -> Self {
        Self {
            download_base: download_base.into().trim_end_matches('/').to_string(),
            checksum_base: checksum_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Download URL for a platform's asset. No network access.
    pub fn asset_url(&self, version: &str, platform: Platform) -> String {
        if is_latest(version) {
            format!("{}/latest/download/{}", self.download_base, platform.asset_name())
        } else {
            format!(
                "{}/download/{TAG_PREFIX}{version}/{}",
                self.download_base,
                platform.asset_name()
            )
        }
    }

    /// Release page listing the SHA-256 digests for a version.
    pub fn checksum_page_url(&self, version: &str) -> String {
        if is_latest(version) {
            format!("{}/latest", self.checksum_base)
        } else {
            format!("{}/tag/{TAG_PREFIX}{version}", self.checksum_base)
        }
    }
}

pub struct ReleaseClient {
    client: Client,
    source: ReleaseSource,
}

impl ReleaseClient {
    /// `timeout` bounds a whole request including the body; `None` means no limit.
    pub fn new(source: ReleaseSource, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Http {
                url: source.download_base.clone(),
                source: err,
            })?;
        Ok(Self { client, source })
    }

    pub fn source(&self) -> &ReleaseSource {
        &self.source
    }

    /// Stream `url` into `dest`, creating parent directories and replacing any existing file.
    pub fn download(&self, url: &str, dest: &Path, ui: &mut impl Ui) -> Result<u64, FetchError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| FetchError::DownloadIo {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        tracing::debug!("GET {url}");
        let http_err = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };
        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(http_err)?;

        let total_size = response.content_length().unwrap_or(0);
        let write_err = |source| FetchError::DownloadIo {
            path: dest.to_path_buf(),
            source,
        };
        let mut file = File::create(dest).map_err(write_err)?;

        let mut downloaded: u64 = 0;
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = response.read(&mut buffer).map_err(write_err)?;

            if bytes_read == 0 {
                break;
            }

            file.write_all(&buffer[..bytes_read]).map_err(write_err)?;

            downloaded += bytes_read as u64;
            ui.set_progress(downloaded, total_size, format_bytes(downloaded, total_size));
        }
        file.flush().map_err(write_err)?;
        ui.clear_progress();

        tracing::debug!("downloaded {downloaded} bytes to {}", dest.display());
        Ok(downloaded)
    }

    /// Fetch the release metadata page and pull out the digest published for `asset`.
    pub fn expected_checksum(&self, version: &str, asset: &str) -> Result<String, FetchError> {
        let page = self.source.checksum_page_url(version);
        let unavailable = |reason: String| FetchError::ChecksumUnavailable {
            asset: asset.to_string(),
            page: page.clone(),
            reason,
        };

        tracing::debug!("fetching checksums from {page}");
        let html = self
            .client
            .get(&page)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| unavailable(e.to_string()))?;

        extract_checksum(&html, asset)
            .ok_or_else(|| unavailable("no sha256 near asset name".into()))
    }
}

/// Find `sha256:<64 hex>` within [`CHECKSUM_WINDOW`] characters after an
/// occurrence of `asset` in `page`. Returns the digest in lowercase.
pub fn extract_checksum(page: &str, asset: &str) -> Option<String> {
    let digest = Regex::new(r"sha256:\s*([0-9a-fA-F]{64})").ok()?;

    for (start, _) in page.match_indices(asset) {
        let tail = &page[start + asset.len()..];
        let Some(caps) = digest.captures(tail) else {
            // No digest anywhere after this occurrence, so none after later ones either
            return None;
        };
        let Some(whole) = caps.get(0) else { continue };
        if tail[..whole.start()].chars().count() <= CHECKSUM_WINDOW {
            return caps.get(1).map(|m| m.as_str().to_ascii_lowercase());
        }
    }
    None
}

/// Format bytes as human-readable string
fn format_bytes(current: u64, total: u64) -> String {
    fn fmt(bytes: u64) -> String {
        if bytes >= 1_000_000_000 {
            format!("{:.1} GB", bytes as f64 / 1_000_000_000.0)
        } else if bytes >= 1_000_000 {
            format!("{:.1} MB", bytes as f64 / 1_000_000.0)
        } else if bytes >= 1_000 {
            format!("{:.1} KB", bytes as f64 / 1_000.0)
        } else {
            format!("{} B", bytes)
        }
    }
    if total == 0 {
        fmt(current)
    } else {
        format!("{} / {}", fmt(current), fmt(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::SilentUi;

    const DIGEST: &str = "0f4a2b5e6c7d8e9f0a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f6071";

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500, 999), "500 B / 999 B");
        assert_eq!(format_bytes(1500, 3000), "1.5 KB / 3.0 KB");
        assert_eq!(format_bytes(1_500_000, 0), "1.5 MB");
    }

    #[test]
    fn latest_url_uses_download_alias() {
        let url = ReleaseSource::default().asset_url("latest", Platform::LinuxX64);
        assert_eq!(
            url,
            "https://github.com/oven-sh/bun/releases/latest/download/bun-linux-x64.zip"
        );
        assert!(url.ends_with("/latest/download/bun-linux-x64.zip"));
    }

    #[test]
    fn versioned_url_uses_tag() {
        let url = ReleaseSource::default().asset_url("1.1.0", Platform::LinuxX64);
        assert_eq!(
            url,
            "https://github.com/oven-sh/bun/releases/download/bun-v1.1.0/bun-linux-x64.zip"
        );
        let url = ReleaseSource::default().asset_url("1.1.0", Platform::WindowsX64Baseline);
        assert!(url.contains("/download/bun-v1.1.0/bun-windows-x64-baseline.zip"));
    }

    #[test]
    fn checksum_page_urls() {
        let source = ReleaseSource::new("http://host/dl/", "http://host/meta/");
        assert_eq!(source.checksum_page_url("latest"), "http://host/meta/latest");
        assert_eq!(source.checksum_page_url("1.2.3"), "http://host/meta/tag/bun-v1.2.3");
        assert_eq!(
            source.asset_url("1.2.3", Platform::DarwinAarch64),
            "http://host/dl/download/bun-v1.2.3/bun-darwin-aarch64.zip"
        );
    }

    #[test]
    fn extracts_checksum_near_asset() {
        let page = format!(
            "<li><span>bun-linux-x64.zip</span>\n<span class=\"digest\">sha256:{}</span></li>",
            DIGEST.to_uppercase()
        );
        assert_eq!(extract_checksum(&page, "bun-linux-x64.zip").as_deref(), Some(DIGEST));
    }

    #[test]
    fn picks_the_digest_for_the_right_asset() {
        let other = "a".repeat(64);
        let page = format!(
            "bun-linux-aarch64.zip sha256:{other}\nbun-linux-x64.zip sha256: {DIGEST}\n"
        );
        assert_eq!(extract_checksum(&page, "bun-linux-x64.zip").as_deref(), Some(DIGEST));
        assert_eq!(
            extract_checksum(&page, "bun-linux-aarch64.zip").as_deref(),
            Some(other.as_str())
        );
    }

    #[test]
    fn digest_too_far_away_is_ignored() {
        let filler = "x".repeat(CHECKSUM_WINDOW + 10);
        let page = format!("bun-linux-x64.zip{filler}sha256:{DIGEST}");
        assert_eq!(extract_checksum(&page, "bun-linux-x64.zip"), None);
    }

    #[test]
    fn missing_asset_yields_none() {
        let page = format!("bun-darwin-x64.zip sha256:{DIGEST}");
        assert_eq!(extract_checksum(&page, "bun-linux-x64.zip"), None);
    }

    #[test]
    fn download_writes_body_and_creates_parents() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/download/bun-v1.0.0/bun-linux-x64.zip")
            .with_status(200)
            .with_body("zip-bytes")
            .create();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("bun-linux-x64.zip");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, "stale content that is longer").unwrap();

        let source = ReleaseSource::new(server.url(), server.url());
        let client = ReleaseClient::new(source, None).unwrap();
        let url = client.source().asset_url("1.0.0", Platform::LinuxX64);
        let written = client.download(&url, &dest, &mut SilentUi::new()).unwrap();

        assert_eq!(written, 9);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "zip-bytes");
    }

    #[test]
    fn download_reports_http_status_as_failure() {
        let mut server = mockito::Server::new();
        let _m = server.mock("GET", "/missing.zip").with_status(404).create();

        let dir = tempfile::tempdir().unwrap();
        let source = ReleaseSource::new(server.url(), server.url());
        let client = ReleaseClient::new(source, None).unwrap();
        let url = format!("{}/missing.zip", server.url());
        let err = client
            .download(&url, &dir.path().join("a.zip"), &mut SilentUi::new())
            .unwrap_err();

        assert!(matches!(err, FetchError::Http { .. }));
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("missing.zip"));
    }

    #[test]
    fn missing_checksum_is_unavailable_not_mismatch() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/meta/tag/bun-v1.0.0")
            .with_status(200)
            .with_body("<html>no digests here</html>")
            .create();

        let source = ReleaseSource::new(server.url(), format!("{}/meta", server.url()));
        let client = ReleaseClient::new(source, None).unwrap();
        let err = client
            .expected_checksum("1.0.0", "bun-linux-x64.zip")
            .unwrap_err();

        assert!(matches!(err, FetchError::ChecksumUnavailable { .. }));
    }
}
