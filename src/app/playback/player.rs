use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, ExitStatus, Stdio};

use anyhow::Result;
use chrono::Local;
use tracing::{info, warn};

use super::process::{spawn_with_default_signals, with_sigint_ignored};
use crate::error::UpNextError;
use crate::paths::{player_bin, player_log_path};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlayerRun {
    pub(crate) success: bool,
    /// The user stopped playback (Ctrl-C) before the player finished.
    pub(crate) interrupted: bool,
    pub(crate) failure_detail: Option<String>,
}

impl PlayerRun {
    pub(crate) fn finished() -> Self {
        Self {
            success: true,
            interrupted: false,
            failure_detail: None,
        }
    }

    pub(crate) fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            interrupted: false,
            failure_detail: Some(detail.into()),
        }
    }

    pub(crate) fn interrupted(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            interrupted: true,
            failure_detail: Some(detail.into()),
        }
    }
}

#[cfg(unix)]
fn killed_by_interrupt(status: ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;

    status.signal() == Some(libc::SIGINT)
}

#[cfg(not(unix))]
fn killed_by_interrupt(_status: ExitStatus) -> bool {
    false
}

/// Something that can show one episode and block until it is done.
pub(crate) trait Player {
    /// `Ok` means the player ran, whatever its exit status; `Err` means it
    /// never got to play the file. An interrupted run is reported through
    /// `PlayerRun::interrupted`.
    fn play(&mut self, episode: &Path) -> Result<PlayerRun, UpNextError>;
}

/// Launches `<bin> <file> --play-and-exit --fullscreen` and appends its
/// output to the player log.
#[derive(Debug, Clone)]
pub(crate) struct ExternalPlayer {
    bin: PathBuf,
    log_path: PathBuf,
}

impl ExternalPlayer {
    pub(crate) fn new(bin: PathBuf, log_path: PathBuf) -> Self {
        Self { bin, log_path }
    }

    pub(crate) fn from_env() -> Result<Self> {
        Ok(Self::new(player_bin(), player_log_path()?))
    }

    fn open_log(&self) -> Result<File, UpNextError> {
        let log_err = |source| UpNextError::PlayerLog {
            path: self.log_path.clone(),
            source,
        };
        if let Some(parent) = self.log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(log_err)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(log_err)
    }

    fn launch(&self, episode: &Path, log: &File) -> io::Result<ExitStatus> {
        let mut cmd = ProcessCommand::new(&self.bin);
        cmd.arg(episode)
            .arg("--play-and-exit")
            .arg("--fullscreen")
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log.try_clone()?));
        with_sigint_ignored(|| spawn_with_default_signals(&mut cmd)?.wait())
    }
}

impl Player for ExternalPlayer {
    fn play(&mut self, episode: &Path) -> Result<PlayerRun, UpNextError> {
        let mut log = self.open_log()?;
        let log_err = |source| UpNextError::PlayerLog {
            path: self.log_path.clone(),
            source,
        };
        writeln!(
            log,
            "\n[{}] Playing {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            episode.display()
        )
        .map_err(log_err)?;
        log.flush().map_err(log_err)?;

        info!(player = %self.bin.display(), episode = %episode.display(), "launching player");
        match self.launch(episode, &log) {
            Ok(status) if status.success() => Ok(PlayerRun::finished()),
            Ok(status) if killed_by_interrupt(status) => {
                let detail = format!("{} was interrupted ({status})", self.bin.display());
                info!("{detail}");
                let _ = writeln!(log, "[upnext] {detail}");
                Ok(PlayerRun::interrupted(detail))
            }
            Ok(status) => {
                let detail = format!("{} exited with {status}", self.bin.display());
                warn!("{detail}");
                let _ = writeln!(log, "[upnext] {detail}");
                Ok(PlayerRun::failed(detail))
            }
            Err(source) => {
                let _ = writeln!(
                    log,
                    "[upnext] failed to launch {}: {source}",
                    self.bin.display()
                );
                Err(UpNextError::PlayerInvocation {
                    bin: self.bin.clone(),
                    source,
                })
            }
        }
    }
}
