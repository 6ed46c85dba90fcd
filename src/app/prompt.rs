use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

struct RawMode;

impl RawMode {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Asks a yes/no question; anything but an explicit yes counts as no.
pub(crate) fn confirm(question: &str) -> Result<bool> {
    if io::stdin().is_terminal() {
        confirm_key(question)
    } else {
        confirm_line(question, &mut io::stdin().lock())
    }
}

fn confirm_key(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush().context("failed to flush prompt")?;

    let answer = {
        let _raw = RawMode::enter()?;
        loop {
            match event::read().context("failed to read key")? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    break matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y'));
                }
                _ => continue,
            }
        }
    };
    println!("{}", if answer { "y" } else { "n" });
    Ok(answer)
}

pub(crate) fn confirm_line<R: BufRead>(question: &str, input: &mut R) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush().context("failed to flush prompt")?;

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .context("failed to read answer")?;
    if read == 0 {
        println!();
        return Ok(false);
    }
    Ok(is_yes(&line))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
