use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub const REGISTRY_PATH_ENV: &str = "UPNEXT_REGISTRY_PATH";
pub const PLAYER_LOG_ENV: &str = "UPNEXT_PLAYER_LOG";
pub const PLAYER_BIN_ENV: &str = "UPNEXT_PLAYER_BIN";
pub const LOG_FILTER_ENV: &str = "UPNEXT_LOG";

const REGISTRY_FILE_NAME: &str = ".upnext.json";
const PLAYER_LOG_FILE_NAME: &str = ".upnext-player.log";
const DEFAULT_PLAYER: &str = "vlc";

pub fn registry_file_path() -> Result<PathBuf> {
    home_file_or_override(env::var_os(REGISTRY_PATH_ENV), REGISTRY_FILE_NAME)
}

pub fn player_log_path() -> Result<PathBuf> {
    home_file_or_override(env::var_os(PLAYER_LOG_ENV), PLAYER_LOG_FILE_NAME)
}

pub fn player_bin() -> PathBuf {
    player_bin_from_env(env::var_os(PLAYER_BIN_ENV))
}

pub(crate) fn player_bin_from_env(env_value: Option<OsString>) -> PathBuf {
    match env_value {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(DEFAULT_PLAYER),
    }
}

fn home_file_or_override(env_value: Option<OsString>, file_name: &str) -> Result<PathBuf> {
    if let Some(value) = env_value.filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(value));
    }
    let home = dirs::home_dir().context("unable to resolve home directory")?;
    Ok(home.join(file_name))
}
