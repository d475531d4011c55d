//! Plain-text mirrors of the on-air lines for OBS Text Sources

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::state::{NextTitle, OnAirState};

pub const CURRENT_TITLE_FILE: &str = "current_title.txt";
pub const CURRENT_PAIR_FILE: &str = "current_pair.txt";
pub const NEXT_TITLE_FILE: &str = "next_title.txt";

const PAIR_SEPARATOR: &str = " — ";

/// The three lines a Text Source can show
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLines {
    pub current_title: String,
    pub current_pair: String,
    pub next_title: String,
}

impl TextLines {
    /// Hidden content renders as empty lines, like the overlay does
    pub fn new(state: &OnAirState, next: &NextTitle) -> Self {
        if state.hidden {
            return Self {
                next_title: next.title.clone(),
                ..Self::default()
            };
        }

        let current_pair = if state.without_pair {
            state.leader.clone()
        } else {
            [state.leader.as_str(), state.follower.as_str()]
                .iter()
                .filter(|name| !name.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(PAIR_SEPARATOR)
        };

        Self {
            current_title: state.title.clone(),
            current_pair,
            next_title: next.title.clone(),
        }
    }
}

/// Writes [`TextLines`] into one directory, a file per line
#[derive(Debug, Clone)]
pub struct TextOutputs {
    dir: PathBuf,
}

impl TextOutputs {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, lines: &TextLines) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory: {:?}", self.dir))?;

        for (file, text) in [
            (CURRENT_TITLE_FILE, &lines.current_title),
            (CURRENT_PAIR_FILE, &lines.current_pair),
            (NEXT_TITLE_FILE, &lines.next_title),
        ] {
            let path = self.dir.join(file);
            std::fs::write(&path, text)
                .with_context(|| format!("Failed to write output file: {:?}", path))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(leader: &str, follower: &str) -> OnAirState {
        OnAirState {
            title: "Final A".into(),
            leader: leader.into(),
            follower: follower.into(),
            ..OnAirState::default()
        }
    }

    #[test]
    fn test_pair_line() {
        let next = NextTitle::default();
        assert_eq!(
            TextLines::new(&state("Anna", "Boris"), &next).current_pair,
            "Anna — Boris"
        );
        assert_eq!(TextLines::new(&state("Anna", ""), &next).current_pair, "Anna");
        assert_eq!(TextLines::new(&state("", ""), &next).current_pair, "");

        let mut solo = state("Anna", "Boris");
        solo.without_pair = true;
        assert_eq!(TextLines::new(&solo, &next).current_pair, "Anna");
    }

    #[test]
    fn test_hidden_blanks_current_lines() {
        let mut next = NextTitle::default();
        next.set("NEXT: Final B".into());
        let mut hidden = state("Anna", "Boris");
        hidden.hidden = true;

        let lines = TextLines::new(&hidden, &next);
        assert_eq!(lines.current_title, "");
        assert_eq!(lines.current_pair, "");
        assert_eq!(lines.next_title, "NEXT: Final B");
    }

    #[test]
    fn test_write_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = TextOutputs::new(dir.path().join("out"));
        outputs
            .write(&TextLines::new(&state("Anna", "Boris"), &NextTitle::default()))
            .unwrap();

        let read = |file: &str| std::fs::read_to_string(outputs.dir().join(file)).unwrap();
        assert_eq!(read(CURRENT_TITLE_FILE), "Final A");
        assert_eq!(read(CURRENT_PAIR_FILE), "Anna — Boris");
        assert_eq!(read(NEXT_TITLE_FILE), "");
    }
}
