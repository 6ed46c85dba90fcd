use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::UpNextError;

pub(crate) const EPISODE_EXTENSIONS: [&str; 10] = [
    "mkv", "mp4", "avi", "flv", "mov", "wmv", "webm", "mpg", "mpeg", "m4v",
];

pub(crate) fn find_episodes(dir: &Path) -> Result<Vec<PathBuf>, UpNextError> {
    find_episodes_with(dir, &EPISODE_EXTENSIONS)
}

/// Lists the files directly inside `dir` whose name ends in `.<ext>` for one
/// of `extensions`, sorted by path.
///
/// Names are compared as raw bytes, so brackets and other glob characters in
/// either the folder or the file name are plain text. Hidden files are
/// skipped, like a shell `*.ext` glob would.
pub(crate) fn find_episodes_with(
    dir: &Path,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, UpNextError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(UpNextError::DirectoryMissing {
                path: dir.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(UpNextError::Discovery {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let suffixes: Vec<String> = extensions.iter().map(|ext| format!(".{ext}")).collect();
    let mut episodes = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| UpNextError::Discovery {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name();
        let name = name.as_encoded_bytes();
        if name.starts_with(b".") {
            continue;
        }
        if !suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_bytes()))
        {
            continue;
        }
        let path = entry.path();
        // Follows symlinks; dangling links and folders named like videos are skipped.
        if fs::metadata(&path).map(|meta| meta.is_file()).unwrap_or(false) {
            episodes.push(path);
        }
    }

    episodes.sort();
    debug!(dir = %dir.display(), count = episodes.len(), "discovered episodes");
    Ok(episodes)
}
