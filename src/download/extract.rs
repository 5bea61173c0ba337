use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use zip::ZipArchive;

use crate::error::FetchError;
use crate::ui::Ui;

/// Extract every entry of a zip file under `dest_dir`, keeping the archive's
/// relative paths. Existing files are overwritten. Entries that would land
/// outside `dest_dir` abort the extraction.
///
/// Nothing is rolled back on failure; callers that need atomicity extract
/// into a scratch directory and rename it on success.
pub fn extract_zip(
    zip_path: &Path,
    dest_dir: &Path,
    ui: &mut impl Ui,
) -> Result<usize, FetchError> {
    let fail = |reason: String| FetchError::Extraction {
        archive: zip_path.to_path_buf(),
        reason,
    };

    let file = File::open(zip_path).map_err(|e| fail(format!("open: {e}")))?;
    let reader = BufReader::new(file);
    let mut archive = ZipArchive::new(reader).map_err(|e| fail(format!("read archive: {e}")))?;

    fs::create_dir_all(dest_dir)
        .map_err(|e| fail(format!("create {}: {e}", dest_dir.display())))?;

    let total_entries = archive.len();

    for i in 0..total_entries {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| fail(format!("entry #{i}: {e}")))?;

        let name = entry.name().to_string();
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| fail(format!("entry '{name}' escapes the destination")))?;
        let out_path = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| fail(format!("create {}: {e}", out_path.display())))?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| fail(format!("create {}: {e}", parent.display())))?;
            }
            let mut out_file = File::create(&out_path)
                .map_err(|e| fail(format!("create {}: {e}", out_path.display())))?;
            io::copy(&mut entry, &mut out_file).map_err(|e| fail(format!("write {name}: {e}")))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode().filter(|m| m & 0o777 != 0) {
                    fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))
                        .map_err(|e| fail(format!("chmod {}: {e}", out_path.display())))?;
                }
            }
        }

        let done = i + 1;
        ui.set_progress(
            done as u64,
            total_entries as u64,
            format!("{done}/{total_entries} entries"),
        );
    }

    ui.clear_progress();
    tracing::debug!("extracted {total_entries} entries into {}", dest_dir.display());
    Ok(total_entries)
}
