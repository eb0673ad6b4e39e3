//! Zip staging for directory uploads.
//!
//! A directory is packed into a zip in a private temp directory which lives
//! exactly as long as the upload; dropping [`StagedZip`] removes it on every
//! exit path.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;
use zip::write::FileOptions;

/// A zip archive staged for upload. The backing temp directory is removed
/// when this value is dropped.
pub struct StagedZip {
    pub path: PathBuf,
    _staging: TempDir,
}

/// Pack `dir` recursively into `<dirname>.zip` inside a fresh temp
/// directory. Entry names are relative to `dir`.
pub fn stage_directory_zip(dir: &Path) -> Result<StagedZip> {
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("cannot derive an archive name from {}", dir.display()))?;
    let staging = tempfile::tempdir().context("create zip staging directory")?;
    let zip_path = staging.path().join(format!("{name}.zip"));

    let file = File::create(&zip_path)
        .with_context(|| format!("create archive {}", zip_path.display()))?;
    let mut writer = zip::ZipWriter::new(file);
    add_directory(&mut writer, dir, Path::new(""))
        .with_context(|| format!("pack {}", dir.display()))?;
    writer.finish().context("finish archive")?;

    Ok(StagedZip {
        path: zip_path,
        _staging: staging,
    })
}

fn add_directory(
    writer: &mut zip::ZipWriter<File>,
    dir: &Path,
    prefix: &Path,
) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("read directory {}", dir.display()))?
        .collect::<io::Result<_>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let relative = prefix.join(entry.file_name());
        let entry_name = relative.to_string_lossy().replace('\\', "/");
        if path.is_dir() {
            writer.add_directory(format!("{entry_name}/"), FileOptions::<()>::default())?;
            add_directory(writer, &path, &relative)?;
        } else {
            writer.start_file(entry_name, FileOptions::<()>::default())?;
            let contents =
                std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            writer.write_all(&contents)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_a_zip_named_after_the_directory() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("reports");
        std::fs::create_dir_all(dir.join("q3")).unwrap();
        std::fs::write(dir.join("summary.txt"), "totals").unwrap();
        std::fs::write(dir.join("q3").join("detail.txt"), "lines").unwrap();

        let staged = stage_directory_zip(&dir).unwrap();
        assert_eq!(staged.path.file_name().unwrap(), "reports.zip");

        let mut archive = zip::ZipArchive::new(File::open(&staged.path).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|index| archive.by_index(index).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"summary.txt".to_string()));
        assert!(names.contains(&"q3/detail.txt".to_string()));
    }

    #[test]
    fn staging_directory_is_removed_on_drop() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("docs");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("a.txt"), "a").unwrap();

        let staged = stage_directory_zip(&dir).unwrap();
        let zip_path = staged.path.clone();
        assert!(zip_path.exists());
        drop(staged);
        assert!(!zip_path.exists());
    }
}
