use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Depth-first search under `root` for a file named `executable`, ignoring case.
///
/// Entries are visited in file-name order and the first match wins. A missing
/// or empty `root` is simply "not found".
pub fn locate_executable(root: &Path, executable: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("skipping unreadable entry under {}: {e}", root.display());
                None
            }
        })
        .find(|entry| {
            entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.eq_ignore_ascii_case(executable))
        })
        .map(|entry| entry.into_path())
}

/// Make sure the owner can execute `path`. Zips built on Windows carry no mode bits.
#[cfg(unix)]
pub fn ensure_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)?.permissions();
    let mode = perms.mode();
    if mode & 0o111 != 0o111 {
        perms.set_mode(mode | 0o755);
        std::fs::set_permissions(path, perms)?;
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn ensure_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"bin").unwrap();
    }

    #[test]
    fn finds_nested_executable_case_insensitively() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("x").join("y").join("bun"));
        touch(&root.join("z").join("BUN.EXE"));

        assert_eq!(locate_executable(root, "bun"), Some(root.join("x").join("y").join("bun")));
        assert_eq!(locate_executable(root, "bun.exe"), Some(root.join("z").join("BUN.EXE")));
    }

    #[test]
    fn first_match_in_depth_first_order_wins() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("a").join("deep").join("Bun"));
        touch(&root.join("b").join("bun"));
        touch(&root.join("bun-extra"));

        assert_eq!(
            locate_executable(root, "bun"),
            Some(root.join("a").join("deep").join("Bun"))
        );
    }

    #[test]
    fn directories_with_the_name_are_not_matches() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("bun")).unwrap();

        assert_eq!(locate_executable(root, "bun"), None);
    }

    #[test]
    fn empty_or_missing_root_is_not_found() {
        let dir = tempdir().unwrap();
        assert_eq!(locate_executable(dir.path(), "bun"), None);
        assert_eq!(locate_executable(&dir.path().join("missing"), "bun"), None);
    }

    #[cfg(unix)]
    #[test]
    fn ensure_executable_sets_mode_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let bin = dir.path().join("bun");
        touch(&bin);
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o644)).unwrap();

        ensure_executable(&bin).unwrap();
        let mode = fs::metadata(&bin).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
