use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::Local;
use tracing::{debug, warn};

use super::player::Player;
use crate::app::discover::find_episodes;
use crate::error::UpNextError;
use crate::registry::{ProgressRecord, RecordId, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Play exactly one episode.
    Single,
    /// Keep playing until the folder runs out, pausing between episodes.
    All { wait_secs: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlayedEpisode {
    pub(crate) number: u64,
    pub(crate) player_ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SequenceReport {
    pub(crate) played: Vec<PlayedEpisode>,
    /// The last check found no episode left to play.
    pub(crate) series_over: bool,
}

#[derive(Debug)]
enum Phase {
    Checking,
    Waiting { number: u64, file: PathBuf },
    Playing { number: u64, file: PathBuf },
    Advancing,
    Done { series_over: bool },
}

/// `true` once the record points past the last of `episodes`.
pub(crate) fn is_over(record: &ProgressRecord, episodes: &[PathBuf]) -> bool {
    episode_at(episodes, record.next_episode).is_none()
}

fn episode_at(episodes: &[PathBuf], next_episode: u64) -> Option<PathBuf> {
    let index = usize::try_from(next_episode.checked_sub(1)?).ok()?;
    episodes.get(index).cloned()
}

pub(crate) struct Sequencer<'a, P: Player> {
    registry: &'a mut Registry,
    series: RecordId,
    series_path: String,
    player: &'a mut P,
    mode: Mode,
    sleep: fn(Duration),
}

impl<'a, P: Player> Sequencer<'a, P> {
    pub(crate) fn new(
        registry: &'a mut Registry,
        series_path: &str,
        player: &'a mut P,
        mode: Mode,
    ) -> Result<Self, UpNextError> {
        let series =
            registry
                .find_by_path(series_path)
                .ok_or_else(|| UpNextError::NotInitialized {
                    path: series_path.to_string(),
                })?;
        Ok(Self {
            registry,
            series,
            series_path: series_path.to_string(),
            player,
            mode,
            sleep: thread::sleep,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    /// Drives the series from its stored progress.
    ///
    /// Fails with [`UpNextError::SeriesOver`] when nothing was left to play
    /// at the first check, and with [`UpNextError::Interrupted`] when the
    /// user stops the player, without advancing past that episode. Progress
    /// is saved after every episode, so an error later in the run keeps what
    /// was already watched.
    pub(crate) fn run(mut self) -> Result<SequenceReport, UpNextError> {
        let mut played = Vec::new();
        let mut phase = Phase::Checking;
        loop {
            debug!(?phase, "sequencer step");
            phase = match phase {
                Phase::Checking => {
                    let record = self.record()?;
                    let number = record.next_episode;
                    let episodes = find_episodes(Path::new(&record.path))?;
                    match episode_at(&episodes, number) {
                        Some(file) if played.is_empty() => Phase::Playing { number, file },
                        Some(file) => Phase::Waiting { number, file },
                        None if played.is_empty() => return Err(UpNextError::SeriesOver),
                        None => Phase::Done { series_over: true },
                    }
                }
                Phase::Waiting { number, file } => {
                    if let Mode::All { wait_secs } = self.mode {
                        countdown(wait_secs, self.sleep);
                    }
                    Phase::Playing { number, file }
                }
                Phase::Playing { number, file } => {
                    println!(
                        "Starting episode {number} at {}.",
                        Local::now().format("%H:%M")
                    );
                    let run = self.player.play(&file)?;
                    if run.interrupted {
                        warn!(episode = number, "playback interrupted, not advancing");
                        return Err(UpNextError::Interrupted { episode: number });
                    }
                    if let Some(detail) = &run.failure_detail {
                        warn!(episode = number, "{detail}");
                        eprintln!("Warning: {detail}. Episode {number} is counted as watched.");
                    }
                    played.push(PlayedEpisode {
                        number,
                        player_ok: run.success,
                    });
                    Phase::Advancing
                }
                Phase::Advancing => {
                    self.record_mut()?.advance();
                    self.registry.save()?;
                    match self.mode {
                        Mode::Single => Phase::Done { series_over: false },
                        Mode::All { .. } => Phase::Checking,
                    }
                }
                Phase::Done { series_over } => {
                    return Ok(SequenceReport {
                        played,
                        series_over,
                    });
                }
            };
        }
    }

    fn record(&self) -> Result<&ProgressRecord, UpNextError> {
        self.registry
            .get(self.series)
            .ok_or_else(|| UpNextError::NotInitialized {
                path: self.series_path.clone(),
            })
    }

    fn record_mut(&mut self) -> Result<&mut ProgressRecord, UpNextError> {
        let path = &self.series_path;
        self.registry
            .get_mut(self.series)
            .ok_or_else(|| UpNextError::NotInitialized { path: path.clone() })
    }
}

fn countdown(seconds: u64, sleep: fn(Duration)) {
    if seconds == 0 {
        return;
    }
    println!("Playing next episode in {seconds} seconds...");
    for remaining in (0..seconds).rev() {
        sleep(Duration::from_secs(1));
        println!("{remaining}");
    }
}
