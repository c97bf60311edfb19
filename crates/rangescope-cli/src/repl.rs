//! Line commands for `rangescope watch`.

use anyhow::{anyhow, Result};
use rangescope_session::{SessionEvent, Slot};

pub const HELP: &str = "\
commands:
  frequency|f KEY    pick a frequency
  category|c KEY     pick a category
  instrument|i KEY   pick an instrument
  timeframe|t KEY    pick a timeframe
  clear              reset the selection
  show               redraw the current view
  help               this text
  quit               exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Select(Slot, String),
    Clear,
    Show,
    Help,
    Quit,
}

impl Command {
    /// The session event this command maps to, if any.
    pub fn into_event(self) -> Option<SessionEvent> {
        match self {
            Command::Select(slot, key) => Some(SessionEvent::Select { slot, key }),
            Command::Clear => Some(SessionEvent::ClearSelection),
            Command::Show => Some(SessionEvent::Refresh),
            Command::Help | Command::Quit => None,
        }
    }
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "clear" | "reset" => Command::Clear,
        "show" | "view" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => {
            let slot: Slot = other
                .parse()
                .map_err(|_| anyhow!("unknown command `{word}` (try `help`)"))?;
            if rest.is_empty() {
                return Err(anyhow!("`{word}` needs a key, e.g. `{word} {}`", example(slot)));
            }
            Command::Select(slot, rest.to_string())
        }
    };
    Ok(Some(command))
}

fn example(slot: Slot) -> &'static str {
    match slot {
        Slot::Frequency => "daily",
        Slot::Category => "klines",
        Slot::Instrument => "BTCUSDT",
        Slot::Timeframe => "1h",
    }
}
