use clap::{Parser, Subcommand};

/// Keep track of the next episode of each series folder and play it.
#[derive(Debug, Parser)]
#[command(
    name = "upnext",
    version,
    about = "Track series progress per folder and play the next episode",
    long_about = "Remembers, for every initialized folder, which episode comes next and plays it \
                  in an external player. Episodes are the video files of the folder sorted by name. \
                  Renaming, adding or deleting files shifts the numbering; fix it with `upnext set`.\n\
                  Progress is stored in ~/.upnext.json (override with UPNEXT_REGISTRY_PATH).\n\
                  Registries from older releases (~/.upnext.toml, UPNEXT_TOML_PATH) are not \
                  read, and the JSON file keeps no comments; re-run `upnext init` and \
                  `upnext set` in each series folder to carry progress over."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the progress of the series in the current directory.
    Info,
    /// Start tracking the current directory as a series.
    Init,
    /// Set the next episode number (starts at 1).
    Set {
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        n: u64,
    },
    /// Mark episodes as watched by moving the next episode forward (or back, if negative).
    #[command(visible_alias = "inc")]
    Watch {
        #[arg(default_value_t = 1, allow_negative_numbers = true)]
        n: i64,
    },
    /// Stop tracking the current directory.
    #[command(visible_alias = "reset")]
    Remove,
    /// Play all remaining episodes, one after another.
    Play {
        /// Seconds to wait between episodes.
        #[arg(long, short = 'w', default_value_t = 5)]
        wait: u64,
    },
    /// Play the next episode only.
    Next,
    /// List every tracked series.
    List,
    /// List tracked series whose path contains the search term.
    Find { term: String },
    /// Print the location of the registry file.
    Which,
    /// Open the registry file in an editor.
    Edit,
    /// Print shell completions.
    Completions { shell: clap_complete::Shell },
}
