use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum UpNextError {
    #[error("no series found for {path}. Please run `upnext init` first.")]
    NotInitialized { path: String },

    #[error("no more episodes to watch")]
    SeriesOver,

    #[error("series folder {} no longer exists", path.display())]
    DirectoryMissing { path: PathBuf },

    #[error("failed to list episodes in {}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Persistence(#[from] RegistryError),

    #[error("failed to run player {}", bin.display())]
    PlayerInvocation {
        bin: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open player log {}", path.display())]
    PlayerLog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "next episode must be at least 1 and at most 18446744073709551615 (would become {value})"
    )]
    InvalidEpisode { value: i128 },

    #[error("playback of episode {episode} was interrupted; progress kept at {episode}")]
    Interrupted { episode: u64 },
}
