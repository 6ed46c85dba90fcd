mod discover;
mod playback;
mod prompt;

#[cfg(test)]
mod tests;

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command as ProcessCommand;

use anyhow::{Context, Result, bail};
use clap::CommandFactory;
use tracing::info;

use crate::cli::{Cli, Command};
use crate::error::UpNextError;
use crate::paths::registry_file_path;
use crate::registry::{ProgressRecord, RecordId, Registry};

use self::discover::find_episodes;
use self::playback::{ExternalPlayer, Mode, PlayedEpisode, Player, Sequencer, is_over};

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "upnext", &mut io::stdout());
        }
        Command::Which => println!("{}", registry_file_path()?.display()),
        Command::Edit => edit_registry(&registry_file_path()?)?,
        Command::Info => open_app()?.info()?,
        Command::Init => open_app()?.init()?,
        Command::Set { n } => open_app()?.set(n)?,
        Command::Watch { n } => open_app()?.watch(n)?,
        Command::Remove => open_app()?.remove()?,
        Command::List => open_app()?.list(),
        Command::Find { term } => open_app()?.find(&term),
        Command::Play { wait } => {
            let mut app = open_app()?;
            let mut player = ExternalPlayer::from_env()?;
            app.play(
                Mode::All { wait_secs: wait },
                &mut player,
                &mut prompt::confirm,
            )?;
        }
        Command::Next => {
            let mut app = open_app()?;
            let mut player = ExternalPlayer::from_env()?;
            app.play(Mode::Single, &mut player, &mut prompt::confirm)?;
        }
    }

    Ok(())
}

fn open_app() -> Result<App> {
    let registry = Registry::load(&registry_file_path()?)?;
    Ok(App::new(registry, current_dir_key()?))
}

/// Registry key for the working directory, used verbatim.
fn current_dir_key() -> Result<String> {
    let cwd = env::current_dir().context("failed to resolve current directory")?;
    cwd.to_str()
        .map(str::to_string)
        .with_context(|| format!("current directory is not valid UTF-8: {}", cwd.display()))
}

/// Commands that act on the series of one directory.
pub(crate) struct App {
    registry: Registry,
    cwd: String,
}

impl App {
    pub(crate) fn new(registry: Registry, cwd: String) -> Self {
        Self { registry, cwd }
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    fn current(&self) -> Result<RecordId, UpNextError> {
        self.registry
            .find_by_path(&self.cwd)
            .ok_or_else(|| UpNextError::NotInitialized {
                path: self.cwd.clone(),
            })
    }

    fn current_record(&self) -> Result<&ProgressRecord, UpNextError> {
        let id = self.current()?;
        self.registry
            .get(id)
            .ok_or_else(|| UpNextError::NotInitialized {
                path: self.cwd.clone(),
            })
    }

    fn current_record_mut(&mut self) -> Result<&mut ProgressRecord, UpNextError> {
        let id = self.current()?;
        let path = &self.cwd;
        self.registry
            .get_mut(id)
            .ok_or_else(|| UpNextError::NotInitialized { path: path.clone() })
    }

    pub(crate) fn info(&self) -> Result<()> {
        let record = self.current_record()?;
        print_record(record);
        match find_episodes(Path::new(&record.path)) {
            Ok(episodes) => {
                let remaining = (episodes.len() as u64 + 1).saturating_sub(record.next_episode);
                println!("  Episodes found: {} ({remaining} left)", episodes.len());
                if is_over(record, &episodes) {
                    println!("  All episodes watched.");
                }
            }
            Err(UpNextError::DirectoryMissing { .. }) => {
                println!("  Episodes found: folder missing");
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    pub(crate) fn init(&mut self) -> Result<()> {
        if self.registry.find_by_path(&self.cwd).is_some() {
            println!("Current directory is already initialized.");
        } else {
            println!("Initializing current directory.");
            self.registry.create_by_path(&self.cwd);
            self.registry.save()?;
            info!(
                series = %self.cwd,
                registry = %self.registry.file_path().display(),
                "started tracking series"
            );
        }
        print_record(self.current_record()?);
        Ok(())
    }

    pub(crate) fn set(&mut self, n: u64) -> Result<()> {
        print_record(self.current_record()?);
        self.current_record_mut()?.set_next_episode(n)?;
        self.registry.save()?;
        print_record(self.current_record()?);
        Ok(())
    }

    pub(crate) fn watch(&mut self, n: i64) -> Result<()> {
        print_record(self.current_record()?);
        self.current_record_mut()?.watch(n)?;
        self.registry.save()?;
        print_record(self.current_record()?);
        Ok(())
    }

    pub(crate) fn remove(&mut self) -> Result<()> {
        print_record(self.current_record()?);
        let removed = self.registry.remove_by_path(&self.cwd);
        self.registry.save()?;
        info!(series = %self.cwd, removed, "stopped tracking series");
        println!("Series removed.");
        Ok(())
    }

    pub(crate) fn play<P: Player>(
        &mut self,
        mode: Mode,
        player: &mut P,
        confirm: &mut dyn FnMut(&str) -> Result<bool>,
    ) -> Result<()> {
        print_record(self.current_record()?);
        let outcome = Sequencer::new(&mut self.registry, &self.cwd, player, mode)?.run();
        let series_over = match outcome {
            Ok(report) => {
                if !report.played.is_empty() {
                    print_played(&report.played);
                    print_record(self.current_record()?);
                }
                report.series_over
            }
            Err(UpNextError::SeriesOver) => true,
            Err(err) => return Err(err.into()),
        };
        if series_over {
            self.series_over(confirm)?;
        }
        Ok(())
    }

    fn series_over(&mut self, confirm: &mut dyn FnMut(&str) -> Result<bool>) -> Result<()> {
        println!("No more episodes to watch.");
        if confirm("Reset this series (stop tracking it)?")? {
            self.registry.remove_by_path(&self.cwd);
            self.registry.save()?;
            println!("Series removed.");
        }
        Ok(())
    }

    pub(crate) fn list(&self) {
        print_table(self.registry.records());
    }

    pub(crate) fn find(&self, term: &str) {
        let matches: Vec<ProgressRecord> = self.registry.search(term).cloned().collect();
        if matches.is_empty() {
            println!("No series matching \"{term}\".");
            return;
        }
        print_table(&matches);
    }
}

fn print_record(record: &ProgressRecord) {
    println!("Series: {}", record.path);
    println!("  Next episode: {}", record.next_episode);
}

fn print_played(played: &[PlayedEpisode]) {
    let numbers: Vec<String> = played.iter().map(|ep| ep.number.to_string()).collect();
    println!("Played episode(s) {}.", numbers.join(", "));
    let failed = played.iter().filter(|ep| !ep.player_ok).count();
    if failed > 0 {
        println!("{failed} of them ended with a player error; see the player log.");
    }
}

fn print_table(records: &[ProgressRecord]) {
    if records.is_empty() {
        println!("No tracked series yet. Run `upnext init` inside a series folder.");
        return;
    }
    println!("{:>6}  {}", "NEXT", "PATH");
    for record in records {
        println!("{:>6}  {}", record.next_episode, record.path);
    }
}

fn edit_registry(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    let (program, args) = editor_command(env::var_os("VISUAL"), env::var_os("EDITOR"));
    println!("Opening {} with {program}.", path.display());
    let status = ProcessCommand::new(&program)
        .args(&args)
        .arg(path)
        .status()
        .with_context(|| format!("failed to launch {program}"))?;
    if !status.success() {
        bail!("{program} exited with status: {status}");
    }
    Ok(())
}

pub(crate) fn editor_command(
    visual: Option<OsString>,
    editor: Option<OsString>,
) -> (String, Vec<String>) {
    let configured = [visual, editor]
        .into_iter()
        .flatten()
        .map(|value| value.to_string_lossy().into_owned())
        .find(|value| !value.trim().is_empty());
    let Some(configured) = configured else {
        let opener = if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        };
        return (opener.to_string(), Vec::new());
    };
    let mut parts = configured.split_whitespace().map(str::to_string);
    let program = parts.next().unwrap_or_default();
    (program, parts.collect())
}
