use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::UpNextError;

/// Progress of one series folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressRecord {
    pub path: String,
    pub next_episode: u64,
}

impl ProgressRecord {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            next_episode: 1,
        }
    }

    /// Any positive index is accepted; whether it points past the last
    /// episode is only decided when the folder is scanned.
    pub fn set_next_episode(&mut self, n: u64) -> Result<(), UpNextError> {
        if n == 0 {
            return Err(UpNextError::InvalidEpisode { value: 0 });
        }
        self.next_episode = n;
        Ok(())
    }

    /// Moves the next episode by `n`, which may be negative.
    pub fn watch(&mut self, n: i64) -> Result<u64, UpNextError> {
        match self.next_episode.checked_add_signed(n) {
            Some(next) if next >= 1 => {
                self.next_episode = next;
                Ok(next)
            }
            _ => Err(UpNextError::InvalidEpisode {
                value: i128::from(self.next_episode) + i128::from(n),
            }),
        }
    }

    pub fn advance(&mut self) {
        self.next_episode = self.next_episode.saturating_add(1);
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create registry {}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("registry {} is not valid", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("registry {} entry #{position}: {reason}", path.display())]
    InvalidRecord {
        path: PathBuf,
        position: usize,
        reason: String,
    },

    #[error("failed to encode registry")]
    Encode(#[source] serde_json::Error),

    #[error("failed to write registry {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Handle to a record inside a [`Registry`].
///
/// Stays valid until the next [`Registry::remove_by_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordId(usize);

/// All tracked series, backed by a single JSON file.
///
/// The file is read once by [`Registry::load`] and rewritten as a whole by
/// [`Registry::save`]. Two processes saving concurrently race: the last
/// save wins, but each writes its own temp file so the published document
/// is always complete.
#[derive(Debug)]
pub struct Registry {
    file: PathBuf,
    records: Vec<ProgressRecord>,
}

impl Registry {
    pub fn load(file: &Path) -> Result<Self, RegistryError> {
        let raw = match fs::read_to_string(file) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                create_empty_file(file)?;
                info!(path = %file.display(), "created empty registry");
                return Ok(Self {
                    file: file.to_path_buf(),
                    records: Vec::new(),
                });
            }
            Err(source) => {
                return Err(RegistryError::Read {
                    path: file.to_path_buf(),
                    source,
                });
            }
        };

        let records = parse_records(file, &raw)?;
        debug!(path = %file.display(), count = records.len(), "loaded registry");
        Ok(Self {
            file: file.to_path_buf(),
            records,
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file
    }

    pub fn records(&self) -> &[ProgressRecord] {
        &self.records
    }

    pub fn find_by_path(&self, path: &str) -> Option<RecordId> {
        self.records
            .iter()
            .position(|record| record.path == path)
            .map(RecordId)
    }

    pub fn create_by_path(&mut self, path: &str) -> RecordId {
        if let Some(id) = self.find_by_path(path) {
            return id;
        }
        self.records.push(ProgressRecord::new(path));
        RecordId(self.records.len() - 1)
    }

    pub fn get(&self, id: RecordId) -> Option<&ProgressRecord> {
        self.records.get(id.0)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut ProgressRecord> {
        self.records.get_mut(id.0)
    }

    /// Returns how many records were dropped.
    pub fn remove_by_path(&mut self, path: &str) -> usize {
        let before = self.records.len();
        self.records.retain(|record| record.path != path);
        before - self.records.len()
    }

    pub fn search<'a>(&'a self, term: &'a str) -> impl Iterator<Item = &'a ProgressRecord> + 'a {
        self.records
            .iter()
            .filter(move |record| record.path.contains(term))
    }

    /// Replaces the backing file through a sibling temp file and a rename,
    /// so readers never observe a half-written registry.
    pub fn save(&self) -> Result<(), RegistryError> {
        let mut encoded =
            serde_json::to_string_pretty(&self.records).map_err(RegistryError::Encode)?;
        encoded.push('\n');

        if let Some(parent) = self.file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RegistryError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let temp_path = temp_path_for(&self.file);
        let write_err = |source| RegistryError::Write {
            path: temp_path.clone(),
            source,
        };
        let mut file = fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(encoded.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        if let Err(source) = fs::rename(&temp_path, &self.file) {
            let _ = fs::remove_file(&temp_path);
            return Err(RegistryError::Write {
                path: self.file.clone(),
                source,
            });
        }
        debug!(path = %self.file.display(), count = self.records.len(), "saved registry");
        Ok(())
    }
}

fn parse_records(file: &Path, raw: &str) -> Result<Vec<ProgressRecord>, RegistryError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let records: Vec<ProgressRecord> =
        serde_json::from_str(raw).map_err(|source| RegistryError::Malformed {
            path: file.to_path_buf(),
            source,
        })?;

    let mut seen = HashSet::new();
    for (index, record) in records.iter().enumerate() {
        let reason = if record.path.is_empty() {
            Some("path should be a non-empty string".to_string())
        } else if record.next_episode == 0 {
            Some("next_episode should be a positive integer".to_string())
        } else if !seen.insert(record.path.as_str()) {
            Some(format!("duplicate entry for {}", record.path))
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(RegistryError::InvalidRecord {
                path: file.to_path_buf(),
                position: index + 1,
                reason,
            });
        }
    }
    Ok(records)
}

fn create_empty_file(file: &Path) -> Result<(), RegistryError> {
    let create_err = |source| RegistryError::Create {
        path: file.to_path_buf(),
        source,
    };
    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(create_err)?;
    }
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(file)
        .map_err(create_err)?;
    Ok(())
}

fn temp_path_for(file: &Path) -> PathBuf {
    let name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "registry".to_string());
    file.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}
