//! Operator desk: runs on-air actions and journals them
//!
//! The desk owns the store and the history log together so that one action
//! (mutation plus journal append) is a single synchronous step under the
//! caller's lock.

use tracing::{debug, info, warn};

use crate::catalog::{CatalogProvider, ContestKind};
use crate::error::ValidationError;

use super::history::{HistoryLog, HistorySnapshot};
use super::output::{TextLines, TextOutputs};
use super::state::{build_title, NextTitle, OnAirState, OnAirStore, PairRef};

const INITIAL_LABEL: &str = "Initial";

/// An operator or admin request against the on-air line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnAirAction {
    /// Title plus a pair given by catalog references
    Pair {
        title: String,
        leader: Option<PairRef>,
        follower: Option<PairRef>,
        without_pair: bool,
    },
    /// Pair from a finals contest, title taken from the contest.
    /// With `without_pair` only the first participant is shown.
    Finals {
        contest_id: String,
        first: u32,
        second: Option<u32>,
        without_pair: bool,
    },
    /// Heat screen for a rounds contest
    Rounds {
        contest_id: String,
        heat_label: Option<String>,
    },
    /// Item of a special segment shown as a solo line
    Special { special_id: String, index: usize },
    /// Free heat title
    Heat {
        title: String,
        heat_label: Option<String>,
    },
    Leader(String),
    Follower(String),
    Clear,
    Hide,
    Show,
}

/// Store + journal
#[derive(Debug)]
pub struct OnAirDesk {
    store: OnAirStore,
    history: HistoryLog,
    next: NextTitle,
    outputs: Option<TextOutputs>,
}

impl OnAirDesk {
    pub fn new(history_capacity: usize) -> Self {
        let store = OnAirStore::new();
        let mut history = HistoryLog::new(history_capacity);
        history.record(store.snapshot(INITIAL_LABEL));

        Self {
            store,
            history,
            next: NextTitle::default(),
            outputs: None,
        }
    }

    /// Mirror every change into text files. The files are reset right away
    /// so they never show a previous run's lines.
    pub fn with_outputs(mut self, outputs: TextOutputs) -> Self {
        self.outputs = Some(outputs);
        self.publish();
        self
    }

    pub fn text_lines(&self) -> TextLines {
        TextLines::new(self.store.state(), &self.next)
    }

    /// A failed write is logged; the on-air change stands
    fn publish(&self) {
        if let Some(outputs) = &self.outputs {
            if let Err(e) = outputs.write(&self.text_lines()) {
                warn!("{:#}", e);
            }
        }
    }

    pub fn state(&self) -> &OnAirState {
        self.store.state()
    }

    pub fn next(&self) -> &NextTitle {
        &self.next
    }

    pub fn history(&self) -> HistorySnapshot {
        self.history.snapshot()
    }

    /// Apply an action and journal the result. On error nothing changes.
    pub fn perform(
        &mut self,
        catalog: &dyn CatalogProvider,
        action: OnAirAction,
    ) -> Result<OnAirState, ValidationError> {
        let label = self.apply(catalog, action)?;
        self.history.record(self.store.snapshot(label.clone()));
        self.publish();

        let state = self.store.state();
        info!(apply_id = state.apply_id, "On air: {}", label);
        Ok(state.clone())
    }

    fn apply(
        &mut self,
        catalog: &dyn CatalogProvider,
        action: OnAirAction,
    ) -> Result<String, ValidationError> {
        let label = match action {
            OnAirAction::Pair {
                title,
                leader,
                follower,
                without_pair,
            } => {
                self.store.apply_pair(
                    catalog,
                    &title,
                    leader.as_ref(),
                    follower.as_ref(),
                    without_pair,
                )?;
                format!("Pair: {}", self.store.state().title)
            }
            OnAirAction::Finals {
                contest_id,
                first,
                second,
                without_pair,
            } => {
                let contest = require_contest(catalog, &contest_id, Some(ContestKind::Finals))?;
                let second = second.map(|number| PairRef::Participant { number });
                self.store.apply_pair(
                    catalog,
                    &build_title(&contest.name, None, false),
                    Some(&PairRef::Participant { number: first }),
                    second.as_ref(),
                    without_pair,
                )?;
                format!("Pair: {}", self.store.state().title)
            }
            OnAirAction::Rounds {
                contest_id,
                heat_label,
            } => {
                let contest = require_contest(catalog, &contest_id, Some(ContestKind::Rounds))?;
                self.store.apply_heat(&contest.name, heat_label.as_deref());
                format!("Heat: {}", self.store.state().title)
            }
            OnAirAction::Special { special_id, index } => {
                let special = catalog
                    .special(&special_id)
                    .ok_or_else(|| ValidationError::UnknownSpecial(special_id.clone()))?;
                let item = PairRef::SpecialItem { special_id, index };
                self.store
                    .apply_pair(catalog, &special.name, Some(&item), None, true)?;
                format!("Special: {}", special.name)
            }
            OnAirAction::Heat { title, heat_label } => {
                self.store.apply_heat(&title, heat_label.as_deref());
                format!("Heat: {}", self.store.state().title)
            }
            OnAirAction::Leader(name) => {
                self.store.apply_leader_only(&name);
                format!("Leader: {}", self.store.state().leader)
            }
            OnAirAction::Follower(name) => {
                self.store.apply_follower_only(&name);
                format!("Follower: {}", self.store.state().follower)
            }
            OnAirAction::Clear => {
                self.store.clear();
                "Clear".to_string()
            }
            OnAirAction::Hide => {
                self.store.hide();
                "Hide".to_string()
            }
            OnAirAction::Show => {
                self.store.show();
                "Show".to_string()
            }
        };
        Ok(label)
    }

    /// Restore the previous journal entry, if any
    pub fn undo(&mut self) -> Option<OnAirState> {
        let entry = self.history.undo()?;
        self.store.restore(&entry);
        self.publish();
        debug!(index = self.history.index(), "Undo to '{}'", entry.label);
        Some(self.store.state().clone())
    }

    /// Re-apply the next journal entry, if any
    pub fn redo(&mut self) -> Option<OnAirState> {
        let entry = self.history.redo()?;
        self.store.restore(&entry);
        self.publish();
        debug!(index = self.history.index(), "Redo to '{}'", entry.label);
        Some(self.store.state().clone())
    }

    /// Set the NEXT line from a contest; the heat is only used for rounds
    pub fn apply_next(
        &mut self,
        catalog: &dyn CatalogProvider,
        contest_id: &str,
        heat_label: Option<&str>,
    ) -> Result<NextTitle, ValidationError> {
        let contest = require_contest(catalog, contest_id, None)?;
        let heat = match contest.kind {
            ContestKind::Rounds => heat_label,
            ContestKind::Finals => None,
        };
        self.next.set(build_title(&contest.name, heat, true));
        self.publish();
        info!(apply_id = self.next.apply_id, "Next: {}", self.next.title);
        Ok(self.next.clone())
    }

    pub fn clear_next(&mut self) -> NextTitle {
        self.next.clear();
        self.publish();
        self.next.clone()
    }
}

fn require_contest(
    catalog: &dyn CatalogProvider,
    contest_id: &str,
    kind: Option<ContestKind>,
) -> Result<crate::catalog::Contest, ValidationError> {
    if contest_id.trim().is_empty() {
        return Err(ValidationError::Missing("contestId"));
    }
    let contest = catalog
        .contest(contest_id)
        .ok_or_else(|| ValidationError::UnknownContest(contest_id.to_string()))?;

    match kind {
        Some(expected) if contest.kind != expected => Err(ValidationError::WrongContestType {
            id: contest.id,
            expected: expected.as_str(),
        }),
        _ => Ok(contest),
    }
}
