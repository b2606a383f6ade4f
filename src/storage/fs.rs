//! Module to import music files from the file system

use walkdir::WalkDir;

use std::path::{Path, PathBuf};

use crate::{
    domain::track::TrackName,
    storage::{error::StorageError, operations::Storage},
};

const MUSIC_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "m4a", "ogg", "aac"];

pub fn is_music_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MUSIC_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Best-effort check that a path points to a real, playable music file.
///
/// This does NOT decode audio, but rules out:
/// - missing paths
/// - directories / special files
/// - wrong extensions
/// - empty files
pub fn is_valid_music_path(path: &Path) -> bool {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return false,
    };

    meta.is_file() && is_music_file(path) && meta.len() > 0
}

/// Expands the given paths into music files.
///
/// Directories are walked recursively in file name order, plain files are taken as they are.
/// Entries that can't be read are logged and skipped.
pub fn collect_music_files(paths: &[PathBuf], follow_symlinks: bool) -> Vec<PathBuf> {
    let mut found = Vec::new();

    for root in paths {
        let root_str = root.to_string_lossy();
        let walker = WalkDir::new(root)
            .follow_links(follow_symlinks)
            .sort_by_file_name();

        found.extend(
            walker
                .into_iter()
                .filter_map(|e| match e {
                    Ok(e) => Some(e),
                    Err(err) => {
                        log::warn!("error while scanning {root_str}, skipping an entry: {err}");
                        None
                    }
                })
                .map(|e| e.path().to_path_buf())
                .filter(|p| is_valid_music_path(p)),
        );
    }

    found
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<(TrackName, PathBuf)>,
    pub skipped: Vec<(PathBuf, String)>,
}

impl Storage {
    /// Uploads every music file found under the given paths, keyed by file name.
    ///
    /// A file that fails to import is reported and does not stop the others.
    pub fn import_paths(
        &mut self,
        paths: &[PathBuf],
        follow_symlinks: bool,
    ) -> Result<ImportReport, StorageError> {
        let mut report = ImportReport::default();

        for path in collect_music_files(paths, follow_symlinks) {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                report.skipped.push((path, "no file name".into()));
                continue;
            };

            let data = match std::fs::read(&path) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("failed to read {}: {e}", path.to_string_lossy());
                    report.skipped.push((path, e.to_string()));
                    continue;
                }
            };

            match self.put_track(&name, data) {
                Ok(track) => report.imported.push((track.name, path)),
                Err(StorageError::InvalidTrackName(name)) => {
                    report
                        .skipped
                        .push((path, format!("invalid track name {name:?}")));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use crate::storage::{
        fs::{collect_music_files, is_valid_music_path},
        operations::setup_storage,
    };

    #[test]
    fn collect_finds_music_files_only() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        let song1 = root.join("song1.mp3");
        let song2 = root.join("nested").join("song2.FLAC");
        let not_music = root.join("notes.txt");
        let empty = root.join("empty.mp3");

        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(&song1, b"aaa").unwrap();
        fs::write(&song2, b"bbb").unwrap();
        fs::write(&not_music, b"ccc").unwrap();
        fs::write(&empty, b"").unwrap();

        let files = collect_music_files(&[root.to_path_buf()], false);

        assert_eq!(files, vec![song2, song1]);
    }

    #[test]
    fn collect_accepts_plain_files() {
        let tmp = TempDir::new().unwrap();
        let song = tmp.path().join("a.ogg");
        fs::write(&song, b"x").unwrap();

        assert_eq!(collect_music_files(&[song.clone()], false), vec![song]);
    }

    #[test]
    fn missing_path_is_not_valid() {
        let tmp = TempDir::new().unwrap();
        assert!(!is_valid_music_path(&tmp.path().join("gone.mp3")));
        assert!(!is_valid_music_path(tmp.path()));
    }

    #[test]
    fn import_stores_files_by_name() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let dir1 = tmp.path().join("one");
        let dir2 = tmp.path().join("two");
        fs::create_dir_all(&dir1)?;
        fs::create_dir_all(&dir2)?;

        fs::write(dir1.join("a.mp3"), b"first a")?;
        fs::write(dir1.join("b.wav"), b"b")?;
        // same file name in another directory overwrites the bytes
        fs::write(dir2.join("a.mp3"), b"second a")?;

        let mut storage = setup_storage()?;
        let report = storage.import_paths(&[dir1, dir2], false)?;

        assert_eq!(report.imported.len(), 3);
        assert!(report.skipped.is_empty());

        let all = storage.get_all_tracks()?;
        let names: Vec<_> = all.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a.mp3", "b.wav"]);
        assert_eq!(&all[0].data[..], b"second a");

        Ok(())
    }
}
