use std::ffi::OsString;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use super::discover::*;
use super::playback::*;
use super::prompt::confirm_line;
use super::{App, editor_command};
use crate::error::UpNextError;
use crate::registry::Registry;

#[derive(Default)]
struct FakePlayer {
    played: Vec<PathBuf>,
    exit_failure: bool,
    launch_error: bool,
    interrupt_at: Option<usize>,
}

impl Player for FakePlayer {
    fn play(&mut self, episode: &Path) -> Result<PlayerRun, UpNextError> {
        if self.launch_error {
            return Err(UpNextError::PlayerInvocation {
                bin: PathBuf::from("missing-player"),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }
        self.played.push(episode.to_path_buf());
        if self.interrupt_at == Some(self.played.len()) {
            Ok(PlayerRun::interrupted("missing-player was interrupted"))
        } else if self.exit_failure {
            Ok(PlayerRun::failed("missing-player exited with exit status: 1"))
        } else {
            Ok(PlayerRun::finished())
        }
    }
}

struct Fixture {
    dir: TempDir,
    series: PathBuf,
}

impl Fixture {
    fn new(files: &[&str]) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let series = dir.path().join("Show [2020]");
        fs::create_dir(&series).expect("series dir");
        for name in files {
            fs::write(series.join(name), b"").expect("episode file");
        }
        Self { dir, series }
    }

    fn key(&self) -> String {
        self.series.to_str().expect("utf-8 temp path").to_string()
    }

    fn registry_file(&self) -> PathBuf {
        self.dir.path().join("upnext.json")
    }

    fn registry(&self) -> Registry {
        Registry::load(&self.registry_file()).expect("registry should load")
    }

    fn initialized(&self, next_episode: u64) -> Registry {
        let mut registry = self.registry();
        let id = registry.create_by_path(&self.key());
        registry
            .get_mut(id)
            .expect("live record")
            .set_next_episode(next_episode)
            .expect("positive index");
        registry.save().expect("save");
        registry
    }

    fn app(&self, registry: Registry) -> App {
        App::new(registry, self.key())
    }

    fn stored_next_episode(&self) -> Option<u64> {
        let registry = self.registry();
        let id = registry.find_by_path(&self.key())?;
        registry.get(id).map(|record| record.next_episode)
    }
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|path| {
            path.file_name()
                .expect("file name")
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

fn no_sleep(_: Duration) {}

fn answer(yes: bool) -> impl FnMut(&str) -> Result<bool> {
    move |_question: &str| Ok(yes)
}

fn not_initialized(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<UpNextError>(),
        Some(UpNextError::NotInitialized { .. })
    )
}

#[test]
fn find_episodes_sorts_across_extensions() {
    let fx = Fixture::new(&["b.mkv", "a.mp4", "c.avi", "notes.txt"]);
    let episodes = find_episodes(&fx.series).expect("listing should succeed");
    assert_eq!(file_names(&episodes), vec!["a.mp4", "b.mkv", "c.avi"]);
}

#[test]
fn find_episodes_treats_brackets_literally() {
    let fx = Fixture::new(&["Show [2020].mkv", "Show [2020] E02.mkv"]);
    let episodes = find_episodes(&fx.series).expect("listing should succeed");
    assert_eq!(
        file_names(&episodes),
        vec!["Show [2020] E02.mkv", "Show [2020].mkv"]
    );
    assert!(episodes.iter().all(|path| path.starts_with(&fx.series)));
}

#[test]
fn find_episodes_matches_suffix_case_sensitively() {
    let fx = Fixture::new(&["e01.MKV", "e02.mkv", "e03.mkv.part", "mkv"]);
    let episodes = find_episodes(&fx.series).expect("listing should succeed");
    assert_eq!(file_names(&episodes), vec!["e02.mkv"]);
}

#[test]
fn find_episodes_skips_hidden_files_and_folders() {
    let fx = Fixture::new(&["._e01.mkv", "e01.mkv"]);
    fs::create_dir(fx.series.join("extras.mkv")).expect("folder");
    fs::write(fx.series.join("extras.mkv").join("e99.mkv"), b"").expect("nested file");

    let episodes = find_episodes(&fx.series).expect("listing should succeed");
    assert_eq!(file_names(&episodes), vec!["e01.mkv"]);
}

#[test]
fn find_episodes_with_custom_extensions() {
    let fx = Fixture::new(&["a.mkv", "b.ogv"]);
    let episodes = find_episodes_with(&fx.series, &["ogv"]).expect("listing should succeed");
    assert_eq!(file_names(&episodes), vec!["b.ogv"]);
}

#[test]
fn find_episodes_returns_empty_for_folder_without_videos() {
    let fx = Fixture::new(&["cover.jpg"]);
    let episodes = find_episodes(&fx.series).expect("empty folder is not an error");
    assert!(episodes.is_empty());
}

#[test]
fn find_episodes_reports_missing_folder() {
    let fx = Fixture::new(&[]);
    let gone = fx.series.join("Season 2");
    let err = find_episodes(&gone).expect_err("missing folder should fail");
    assert!(matches!(err, UpNextError::DirectoryMissing { path } if path == gone));
}

#[test]
fn single_step_play_advances_until_series_over() {
    let fx = Fixture::new(&["e1.mkv", "e2.mkv", "e3.mkv"]);
    let mut registry = fx.initialized(1);
    let mut player = FakePlayer::default();

    for expected in [2, 3, 4] {
        let report = Sequencer::new(&mut registry, &fx.key(), &mut player, Mode::Single)
            .expect("series is tracked")
            .run()
            .expect("episode should play");
        assert_eq!(report.played.len(), 1);
        assert!(!report.series_over);
        assert_eq!(fx.stored_next_episode(), Some(expected));
    }

    let err = Sequencer::new(&mut registry, &fx.key(), &mut player, Mode::Single)
        .expect("series is tracked")
        .run()
        .expect_err("fourth play should report the end");
    assert!(matches!(err, UpNextError::SeriesOver));
    assert_eq!(file_names(&player.played), vec!["e1.mkv", "e2.mkv", "e3.mkv"]);
    assert_eq!(fx.stored_next_episode(), Some(4));
}

static SLEEPS: AtomicUsize = AtomicUsize::new(0);

fn counting_sleep(duration: Duration) {
    assert_eq!(duration, Duration::from_secs(1));
    SLEEPS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn play_all_counts_down_between_episodes_only() {
    let fx = Fixture::new(&["e1.mkv", "e2.mkv", "e3.mkv", "e4.mkv"]);
    let mut registry = fx.initialized(2);
    let mut player = FakePlayer::default();

    let report = Sequencer::new(
        &mut registry,
        &fx.key(),
        &mut player,
        Mode::All { wait_secs: 3 },
    )
    .expect("series is tracked")
    .with_sleep(counting_sleep)
    .run()
    .expect("remaining episodes should play");

    let numbers: Vec<u64> = report.played.iter().map(|ep| ep.number).collect();
    assert_eq!(numbers, vec![2, 3, 4]);
    assert!(report.series_over);
    assert_eq!(SLEEPS.load(Ordering::SeqCst), 6);
    assert_eq!(file_names(&player.played), vec!["e2.mkv", "e3.mkv", "e4.mkv"]);
    assert_eq!(fx.stored_next_episode(), Some(5));
}

#[test]
fn play_all_on_finished_series_reports_series_over() {
    let fx = Fixture::new(&["e1.mkv"]);
    let mut registry = fx.initialized(2);
    let mut player = FakePlayer::default();

    let err = Sequencer::new(
        &mut registry,
        &fx.key(),
        &mut player,
        Mode::All { wait_secs: 0 },
    )
    .expect("series is tracked")
    .with_sleep(no_sleep)
    .run()
    .expect_err("nothing left to play");
    assert!(matches!(err, UpNextError::SeriesOver));
    assert!(player.played.is_empty());
}

#[test]
fn failed_player_exit_still_advances() {
    let fx = Fixture::new(&["e1.mkv", "e2.mkv"]);
    let mut registry = fx.initialized(1);
    let mut player = FakePlayer {
        exit_failure: true,
        ..FakePlayer::default()
    };

    let report = Sequencer::new(&mut registry, &fx.key(), &mut player, Mode::Single)
        .expect("series is tracked")
        .run()
        .expect("a player that ran counts as played");
    assert!(!report.played[0].player_ok);
    assert_eq!(fx.stored_next_episode(), Some(2));
}

#[test]
fn interrupted_player_stops_play_all_without_advancing() {
    let fx = Fixture::new(&["e1.mkv", "e2.mkv", "e3.mkv"]);
    let mut registry = fx.initialized(1);
    let mut player = FakePlayer {
        interrupt_at: Some(2),
        ..FakePlayer::default()
    };

    let err = Sequencer::new(
        &mut registry,
        &fx.key(),
        &mut player,
        Mode::All { wait_secs: 0 },
    )
    .expect("series is tracked")
    .with_sleep(no_sleep)
    .run()
    .expect_err("interrupt should end the run");
    assert!(matches!(err, UpNextError::Interrupted { episode: 2 }));
    assert_eq!(file_names(&player.played), vec!["e1.mkv", "e2.mkv"]);
    assert_eq!(fx.stored_next_episode(), Some(2));
}

#[test]
fn player_launch_error_keeps_progress() {
    let fx = Fixture::new(&["e1.mkv", "e2.mkv"]);
    let mut registry = fx.initialized(1);
    let mut player = FakePlayer {
        launch_error: true,
        ..FakePlayer::default()
    };

    let err = Sequencer::new(
        &mut registry,
        &fx.key(),
        &mut player,
        Mode::All { wait_secs: 0 },
    )
    .expect("series is tracked")
    .run()
    .expect_err("launch failure should surface");
    assert!(matches!(err, UpNextError::PlayerInvocation { .. }));
    assert_eq!(fx.stored_next_episode(), Some(1));
}

#[test]
fn sequencer_requires_tracked_series() {
    let fx = Fixture::new(&["e1.mkv"]);
    let mut registry = fx.registry();
    let mut player = FakePlayer::default();

    let err = Sequencer::new(&mut registry, &fx.key(), &mut player, Mode::Single)
        .err()
        .expect("untracked folder should be rejected");
    assert!(matches!(err, UpNextError::NotInitialized { .. }));
}

#[test]
fn sequencer_reports_missing_series_folder() {
    let fx = Fixture::new(&["e1.mkv"]);
    let mut registry = fx.initialized(1);
    fs::remove_dir_all(&fx.series).expect("remove folder");
    let mut player = FakePlayer::default();

    let err = Sequencer::new(&mut registry, &fx.key(), &mut player, Mode::Single)
        .expect("series is tracked")
        .run()
        .expect_err("missing folder should surface");
    assert!(matches!(err, UpNextError::DirectoryMissing { .. }));
}

#[test]
fn out_of_range_set_is_accepted_and_over() {
    let fx = Fixture::new(&["e1.mkv", "e2.mkv", "e3.mkv"]);
    let registry = fx.initialized(1);
    let mut app = fx.app(registry);

    app.set(999).expect("set does not check the folder");
    let registry = app.registry();
    let id = registry.find_by_path(&fx.key()).expect("tracked");
    let record = registry.get(id).expect("live record");
    assert_eq!(record.next_episode, 999);

    let episodes = find_episodes(&fx.series).expect("listing");
    assert!(is_over(record, &episodes));
}

#[test]
fn set_then_watch_adds_up() {
    let fx = Fixture::new(&[]);
    let registry = fx.initialized(1);
    let mut app = fx.app(registry);

    app.set(5).expect("set");
    app.watch(2).expect("watch");
    assert_eq!(fx.stored_next_episode(), Some(7));
    app.watch(1).expect("default watch");
    assert_eq!(fx.stored_next_episode(), Some(8));

    let err = app.watch(-8).expect_err("cannot go below episode 1");
    assert!(matches!(
        err.downcast_ref::<UpNextError>(),
        Some(UpNextError::InvalidEpisode { value: 0 })
    ));
    assert_eq!(fx.stored_next_episode(), Some(8));
}

#[test]
fn commands_on_untracked_folder_fail_with_not_initialized() {
    let fx = Fixture::new(&["e1.mkv"]);
    let mut app = fx.app(fx.registry());
    let mut player = FakePlayer::default();

    assert!(not_initialized(&app.info().expect_err("info")));
    assert!(not_initialized(&app.set(2).expect_err("set")));
    assert!(not_initialized(&app.watch(1).expect_err("watch")));
    assert!(not_initialized(&app.remove().expect_err("remove")));
    assert!(not_initialized(
        &app.play(Mode::Single, &mut player, &mut answer(true))
            .expect_err("next")
    ));
    assert!(player.played.is_empty());
}

#[test]
fn init_twice_keeps_one_record() {
    let fx = Fixture::new(&[]);
    let mut app = fx.app(fx.registry());

    app.init().expect("first init");
    app.init().expect("second init");
    assert_eq!(app.registry().records().len(), 1);
    assert_eq!(fx.registry().records().len(), 1);
    assert_eq!(fx.stored_next_episode(), Some(1));
}

#[test]
fn remove_drops_only_current_series() {
    let fx = Fixture::new(&[]);
    let mut registry = fx.initialized(3);
    registry.create_by_path("/elsewhere");
    registry.save().expect("save");
    let mut app = fx.app(registry);

    app.remove().expect("remove");
    let remaining = fx.registry();
    assert_eq!(remaining.records().len(), 1);
    assert_eq!(remaining.records()[0].path, "/elsewhere");
}

#[test]
fn series_over_prompt_yes_removes_series() {
    let fx = Fixture::new(&["e1.mkv"]);
    let registry = fx.initialized(1);
    let mut app = fx.app(registry);
    let mut player = FakePlayer::default();

    app.play(Mode::Single, &mut player, &mut answer(true))
        .expect("first episode plays");
    assert_eq!(fx.stored_next_episode(), Some(2));

    let mut asked = Vec::new();
    let mut confirm = |question: &str| -> Result<bool> {
        asked.push(question.to_string());
        Ok(true)
    };
    app.play(Mode::Single, &mut player, &mut confirm)
        .expect("series over is not an error");
    assert_eq!(asked.len(), 1);
    assert_eq!(fx.stored_next_episode(), None);
}

#[test]
fn series_over_prompt_no_keeps_series() {
    let fx = Fixture::new(&["e1.mkv", "e2.mkv"]);
    let registry = fx.initialized(1);
    let mut app = fx.app(registry);
    let mut player = FakePlayer::default();

    app.play(Mode::All { wait_secs: 0 }, &mut player, &mut answer(false))
        .expect("all episodes play");
    assert_eq!(player.played.len(), 2);
    assert_eq!(fx.stored_next_episode(), Some(3));
}

#[test]
fn confirm_line_accepts_only_yes() {
    assert!(confirm_line("Reset?", &mut Cursor::new("y\n")).expect("answer"));
    assert!(confirm_line("Reset?", &mut Cursor::new(" YES \n")).expect("answer"));
    assert!(!confirm_line("Reset?", &mut Cursor::new("\n")).expect("answer"));
    assert!(!confirm_line("Reset?", &mut Cursor::new("nope\n")).expect("answer"));
    assert!(!confirm_line("Reset?", &mut Cursor::new("")).expect("eof"));
}

#[test]
fn editor_command_prefers_visual_then_editor() {
    let (program, args) = editor_command(
        Some(OsString::from("code --wait")),
        Some(OsString::from("vim")),
    );
    assert_eq!(program, "code");
    assert_eq!(args, vec!["--wait".to_string()]);

    let (program, args) = editor_command(Some(OsString::from("  ")), Some(OsString::from("vim")));
    assert_eq!(program, "vim");
    assert!(args.is_empty());
}

#[test]
fn editor_command_falls_back_to_system_opener() {
    let (program, args) = editor_command(None, None);
    assert!(program == "xdg-open" || program == "open");
    assert!(args.is_empty());
}

#[cfg(unix)]
#[test]
fn external_player_appends_header_and_status_to_log() {
    let fx = Fixture::new(&["e1.mkv"]);
    let log_path = fx.dir.path().join("logs").join("player.log");
    let episode = fx.series.join("e1.mkv");

    let mut ok_player = ExternalPlayer::new(PathBuf::from("true"), log_path.clone());
    let run = ok_player.play(&episode).expect("true should run");
    assert!(run.success);

    let mut failing_player = ExternalPlayer::new(PathBuf::from("false"), log_path.clone());
    let run = failing_player.play(&episode).expect("false should run");
    assert!(!run.success);

    let log = fs::read_to_string(&log_path).expect("log written");
    assert_eq!(log.matches("Playing ").count(), 2);
    assert!(log.contains(&episode.display().to_string()));
    assert!(log.contains("[upnext] false exited with"));
}

#[cfg(unix)]
#[test]
fn external_player_reports_interrupt() {
    let fx = Fixture::new(&[]);
    let log_path = fx.dir.path().join("player.log");
    // `sh <file> --play-and-exit --fullscreen` runs the episode as a script.
    let episode = fx.series.join("e1.mkv");
    fs::write(&episode, "kill -INT $$\n").expect("script episode");

    let mut player = ExternalPlayer::new(PathBuf::from("sh"), log_path.clone());
    let run = player.play(&episode).expect("sh should run");
    assert!(run.interrupted);
    assert!(!run.success);
    let log = fs::read_to_string(&log_path).expect("log written");
    assert!(log.contains("[upnext] sh was interrupted"));
}

#[cfg(unix)]
#[test]
fn external_player_launch_failure_is_logged() {
    let fx = Fixture::new(&["e1.mkv"]);
    let log_path = fx.dir.path().join("player.log");
    let mut player = ExternalPlayer::new(
        fx.dir.path().join("no-such-player"),
        log_path.clone(),
    );

    let err = player
        .play(&fx.series.join("e1.mkv"))
        .expect_err("missing binary should fail");
    assert!(matches!(err, UpNextError::PlayerInvocation { .. }));
    let log = fs::read_to_string(&log_path).expect("log written");
    assert!(log.contains("failed to launch"));
}
