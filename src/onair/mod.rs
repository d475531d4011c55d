//! On-air state engine: current line, next line, undo/redo journal

mod desk;
mod history;
mod output;
mod state;

pub use desk::{OnAirAction, OnAirDesk};
pub use history::{HistorySnapshot, DEFAULT_HISTORY_CAPACITY};
pub use output::{TextLines, TextOutputs};
pub use state::{NextTitle, OnAirState, PairRef};
