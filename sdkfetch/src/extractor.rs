use crate::archive::{open_archive, ArchiveEntry, EntryKind};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::{
    cmp::Reverse,
    fs::{self, File},
    io,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;

#[cfg(target_family = "unix")]
use std::fs::{set_permissions, Permissions};
#[cfg(target_family = "unix")]
use std::os::unix::fs::PermissionsExt;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("archive entry `{0}` would be written outside of the destination directory")]
    UnsafePath(String),
}

/// Unpacks every entry of an archive under a destination directory.
#[derive(Debug)]
pub(crate) struct Extractor {
    dest: PathBuf,
}

impl Extractor {
    pub(crate) fn new(dest: PathBuf) -> Self {
        Self { dest }
    }

    pub(crate) fn dest(&self) -> &Path {
        &self.dest
    }

    /// Extracts the archive at `archive_path`. The first failure stops the extraction. Anything
    /// written before that point is left in place.
    pub(crate) fn extract(&self, archive_path: &Path) -> Result<()> {
        debug!(
            "extracting {} into {}",
            archive_path.display(),
            self.dest.display()
        );

        let mut archive = open_archive(archive_path)?;
        fs::create_dir_all(&self.dest).with_context(|| {
            format!(
                "failed to create destination directory {}",
                self.dest.display()
            )
        })?;

        let mut dir_modes = vec![];
        archive.for_each_entry(&mut |entry: &mut dyn ArchiveEntry| {
            self.extract_entry(entry, &mut dir_modes)
        })?;

        // Directory modes go on last, deepest first, so that a read-only directory doesn't stop us
        // from writing the files inside it.
        dir_modes.sort_by_key(|(dir, _)| Reverse(dir.components().count()));
        for (dir, mode) in dir_modes {
            set_mode(&dir, mode)?;
        }

        info!(
            "Extracted {} into {}",
            archive_path.display(),
            self.dest.display()
        );

        Ok(())
    }

    fn extract_entry(
        &self,
        entry: &mut dyn ArchiveEntry,
        dir_modes: &mut Vec<(PathBuf, u32)>,
    ) -> Result<()> {
        let name = entry.path()?;
        let relative = enclosed_path(&name)
            .ok_or_else(|| ExtractError::UnsafePath(name.to_string_lossy().to_string()))?;
        if relative.as_os_str().is_empty() {
            debug!("skipping archive entry `{}`", name.display());
            return Ok(());
        }
        let path = self.dest.join(relative);

        match entry.kind() {
            EntryKind::Directory => {
                debug!("creating directory {}", path.display());
                fs::create_dir_all(&path)
                    .with_context(|| format!("failed to create directory {}", path.display()))?;
                if let Some(mode) = entry.mode()? {
                    dir_modes.push((path, mode));
                }
            }
            EntryKind::File => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create directory {}", parent.display())
                    })?;
                }
                debug!("writing file {}", path.display());
                let mut file = File::create(&path)
                    .with_context(|| format!("failed to create file {}", path.display()))?;
                io::copy(entry, &mut file).with_context(|| {
                    format!("failed to write archive entry to {}", path.display())
                })?;
                if let Some(mode) = entry.mode()? {
                    set_mode(&path, mode)?;
                }
            }
            EntryKind::Other => {
                warn!(
                    "skipping archive entry `{}` because it is not a file or directory",
                    name.display()
                );
            }
        }

        Ok(())
    }
}

/// Returns the entry path with `.` components removed, or `None` if the path is absolute or
/// contains `..` and so could point outside the destination.
fn enclosed_path(name: &Path) -> Option<PathBuf> {
    let mut enclosed = PathBuf::new();
    for component in name.components() {
        match component {
            Component::Normal(c) => enclosed.push(c),
            Component::CurDir => (),
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(enclosed)
}

#[cfg(target_family = "unix")]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    set_permissions(path, Permissions::from_mode(mode & 0o7777))
        .with_context(|| format!("failed to set permissions on {}", path.display()))
}

#[cfg(not(target_family = "unix"))]
#[allow(clippy::unnecessary_wraps)]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{write_tar_gz, write_zip, TestEntry};
    use rstest::rstest;
    #[cfg(target_family = "unix")]
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[cfg(target_family = "unix")]
    fn mode_of(path: &Path) -> Result<u32> {
        Ok(path.metadata()?.permissions().mode() & 0o7777)
    }

    #[test_log::test]
    fn file_before_its_directory() -> Result<()> {
        let td = tempdir()?;
        let archive = write_zip(
            td.path(),
            "sdk.zip",
            &[
                TestEntry::file("a/b.txt", "hello", 0o640),
                TestEntry::dir("a/", 0o750),
            ],
        )?;
        let dest = td.path().join("empty-dest");

        Extractor::new(dest.clone()).extract(&archive)?;

        let file = dest.join("a").join("b.txt");
        assert_eq!(fs::read_to_string(&file)?, "hello");
        #[cfg(target_family = "unix")]
        {
            assert_eq!(mode_of(&file)?, 0o640);
            assert_eq!(mode_of(&dest.join("a"))?, 0o750);
        }

        Ok(())
    }

    #[test_log::test]
    fn directory_before_its_file() -> Result<()> {
        let td = tempdir()?;
        let archive = write_zip(
            td.path(),
            "sdk.zip",
            &[
                TestEntry::dir("a/", 0o755),
                TestEntry::dir("a/nested/", 0o755),
                TestEntry::file("a/nested/tool", "#!/bin/sh\n", 0o755),
                TestEntry::file("top.txt", "top", 0o644),
            ],
        )?;
        let dest = td.path().join("sdk");

        Extractor::new(dest.clone()).extract(&archive)?;

        let tool = dest.join("a").join("nested").join("tool");
        assert_eq!(fs::read_to_string(&tool)?, "#!/bin/sh\n");
        assert_eq!(fs::read_to_string(dest.join("top.txt"))?, "top");
        #[cfg(target_family = "unix")]
        assert_eq!(mode_of(&tool)?, 0o755);

        Ok(())
    }

    #[test_log::test]
    fn file_without_directory_entries() -> Result<()> {
        let td = tempdir()?;
        let archive = write_zip(
            td.path(),
            "sdk.zip",
            &[TestEntry::file("deep/er/file.txt", "content", 0o644)],
        )?;
        let dest = td.path().join("sdk");

        Extractor::new(dest.clone()).extract(&archive)?;

        assert_eq!(
            fs::read_to_string(dest.join("deep").join("er").join("file.txt"))?,
            "content"
        );

        Ok(())
    }

    #[test_log::test]
    fn existing_files_are_truncated() -> Result<()> {
        let td = tempdir()?;
        let dest = td.path().join("sdk");
        fs::create_dir_all(dest.join("a"))?;
        fs::write(dest.join("a").join("b.txt"), "a much longer old version")?;

        let archive = write_zip(
            td.path(),
            "sdk.zip",
            &[TestEntry::file("a/b.txt", "hello", 0o644)],
        )?;
        Extractor::new(dest.clone()).extract(&archive)?;

        assert_eq!(fs::read_to_string(dest.join("a").join("b.txt"))?, "hello");

        Ok(())
    }

    #[test_log::test]
    fn tarball() -> Result<()> {
        let td = tempdir()?;
        let archive = write_tar_gz(
            td.path(),
            "sdk.tar.gz",
            &[
                TestEntry::dir("./sdk/", 0o755),
                TestEntry::file("./sdk/bin/tool", "binary", 0o750),
                TestEntry::file("./sdk/README.md", "docs", 0o600),
            ],
        )?;
        let dest = td.path().join("out");

        Extractor::new(dest.clone()).extract(&archive)?;

        let tool = dest.join("sdk").join("bin").join("tool");
        assert_eq!(fs::read_to_string(&tool)?, "binary");
        let readme = dest.join("sdk").join("README.md");
        assert_eq!(fs::read_to_string(&readme)?, "docs");
        #[cfg(target_family = "unix")]
        {
            assert_eq!(mode_of(&tool)?, 0o750);
            assert_eq!(mode_of(&readme)?, 0o600);
        }

        Ok(())
    }

    #[rstest]
    #[case::zip("sdk.zip")]
    #[case::tarball("sdk.tar.gz")]
    fn symlinks_are_skipped(#[case] archive_name: &str) -> Result<()> {
        let td = tempdir()?;
        let entries = [
            TestEntry::file("sdk/before.txt", "before", 0o644),
            TestEntry::symlink("sdk/link", "/etc/passwd"),
            TestEntry::file("sdk/after.txt", "after", 0o644),
        ];
        let archive = if archive_name.ends_with(".zip") {
            write_zip(td.path(), archive_name, &entries)?
        } else {
            write_tar_gz(td.path(), archive_name, &entries)?
        };
        let dest = td.path().join("out");

        Extractor::new(dest.clone()).extract(&archive)?;

        assert_eq!(fs::read_to_string(dest.join("sdk").join("before.txt"))?, "before");
        assert_eq!(fs::read_to_string(dest.join("sdk").join("after.txt"))?, "after");
        assert!(
            fs::symlink_metadata(dest.join("sdk").join("link")).is_err(),
            "nothing is written for a symlink entry"
        );

        Ok(())
    }

    #[test_log::test]
    fn root_entry_is_skipped() -> Result<()> {
        let td = tempdir()?;
        let archive = write_tar_gz(
            td.path(),
            "sdk.tar.gz",
            &[
                TestEntry::dir("./", 0o700),
                TestEntry::file("./tool", "binary", 0o755),
            ],
        )?;
        let dest = td.path().join("out");

        Extractor::new(dest.clone()).extract(&archive)?;

        let names = fs::read_dir(&dest)?
            .map(|e| e.map(|e| e.file_name()))
            .collect::<io::Result<Vec<_>>>()?;
        assert_eq!(names, ["tool"]);
        assert_eq!(fs::read_to_string(dest.join("tool"))?, "binary");

        Ok(())
    }

    #[rstest]
    #[case::parent_dir("../evil.txt")]
    #[case::nested_parent_dir("a/../../evil.txt")]
    #[case::absolute("/tmp/evil.txt")]
    fn unsafe_paths_are_rejected(#[case] name: &'static str) -> Result<()> {
        let td = tempdir()?;
        let archive = write_zip(
            td.path(),
            "evil.zip",
            &[
                TestEntry::file("ok.txt", "fine", 0o644),
                TestEntry::file(name, "evil", 0o644),
                TestEntry::file("never.txt", "not reached", 0o644),
            ],
        )?;
        let dest = td.path().join("a").join("sdk");

        let err = Extractor::new(dest.clone()).extract(&archive).unwrap_err();
        match err.downcast_ref::<ExtractError>() {
            Some(ExtractError::UnsafePath(p)) => assert_eq!(p, name),
            None => panic!("expected an unsafe path error, got {err}"),
        }

        assert!(dest.join("ok.txt").exists(), "earlier entries are kept");
        assert!(!dest.join("never.txt").exists(), "extraction stopped");
        assert!(!td.path().join("evil.txt").exists());
        assert!(!td.path().join("a").join("evil.txt").exists());

        Ok(())
    }

    #[test_log::test]
    fn missing_archive_is_an_error() -> Result<()> {
        let td = tempdir()?;
        let err = Extractor::new(td.path().join("sdk"))
            .extract(&td.path().join("missing.zip"))
            .unwrap_err();
        assert!(err.to_string().starts_with("Failed to open file at"), "got {err}");
        Ok(())
    }

    #[rstest]
    #[case("a/b.txt", Some("a/b.txt"))]
    #[case("./a/./b.txt", Some("a/b.txt"))]
    #[case("./", Some(""))]
    #[case("a/../b.txt", None)]
    #[case("/etc/passwd", None)]
    fn enclosed_path(#[case] name: &str, #[case] expect: Option<&str>) {
        assert_eq!(
            super::enclosed_path(Path::new(name)),
            expect.map(PathBuf::from)
        );
    }
}
