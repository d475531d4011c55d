//! Authoritative on-air state and its transitions
//!
//! `OnAirStore` is the only place the on-air line is mutated. Every
//! transition bumps `apply_id` exactly once; overlays compare that token to
//! decide whether anything changed. The store knows nothing about history:
//! the desk journals a snapshot after each successful transition.

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogProvider;
use crate::error::ValidationError;

use super::history::HistoryEntry;

const NEXT_PREFIX: &str = "NEXT: ";
const HEAT_SEPARATOR: &str = " • ";

/// What the overlay currently shows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnAirState {
    pub title: String,
    pub leader: String,
    pub follower: String,
    pub without_pair: bool,
    pub hidden: bool,
    pub apply_id: u64,
}

/// Reference to a name in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum PairRef {
    /// Participant by bib number
    Participant { number: u32 },
    /// Item of a special segment by position
    #[serde(rename_all = "camelCase")]
    SpecialItem { special_id: String, index: usize },
}

impl PairRef {
    /// Display text for the reference, if it resolves
    pub fn resolve(&self, catalog: &dyn CatalogProvider) -> Result<String, ValidationError> {
        match self {
            PairRef::Participant { number } => catalog
                .participant(*number)
                .map(|p| p.full_name)
                .ok_or(ValidationError::UnknownParticipant(*number)),
            PairRef::SpecialItem { special_id, index } => {
                let special = catalog
                    .special(special_id)
                    .ok_or_else(|| ValidationError::UnknownSpecial(special_id.clone()))?;
                special
                    .items
                    .get(*index)
                    .cloned()
                    .ok_or_else(|| ValidationError::UnknownSpecialItem {
                        special_id: special_id.clone(),
                        index: *index,
                    })
            }
        }
    }
}

/// Compose a title line: `[NEXT: ]name[ • heat]`
pub fn build_title(name: &str, heat: Option<&str>, is_next: bool) -> String {
    let prefix = if is_next { NEXT_PREFIX } else { "" };
    let heat_part = heat
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(|h| format!("{}{}", HEAT_SEPARATOR, h))
        .unwrap_or_default();
    format!("{}{}{}", prefix, name.trim(), heat_part).trim().to_string()
}

/// Owner of the live on-air state
#[derive(Debug, Default)]
pub struct OnAirStore {
    state: OnAirState,
}

impl OnAirStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &OnAirState {
        &self.state
    }

    /// Snapshot of the current content for the history log
    pub fn snapshot(&self, label: impl Into<String>) -> HistoryEntry {
        HistoryEntry {
            title: self.state.title.clone(),
            leader: self.state.leader.clone(),
            follower: self.state.follower.clone(),
            without_pair: self.state.without_pair,
            hidden: self.state.hidden,
            label: label.into(),
        }
    }

    /// Show a title with a pair resolved from the catalog.
    ///
    /// Both references are required unless `without_pair` is set, in which
    /// case the follower may be omitted. Every provided reference is
    /// resolved before anything is written.
    pub fn apply_pair(
        &mut self,
        catalog: &dyn CatalogProvider,
        title: &str,
        leader: Option<&PairRef>,
        follower: Option<&PairRef>,
        without_pair: bool,
    ) -> Result<(), ValidationError> {
        let leader = leader.ok_or(ValidationError::Missing("leader"))?;
        let leader_name = leader.resolve(catalog)?;

        let follower_name = match (follower, without_pair) {
            (Some(follower), _) => follower.resolve(catalog)?,
            (None, true) => String::new(),
            (None, false) => return Err(ValidationError::Missing("follower")),
        };

        self.state.title = title.trim().to_string();
        self.state.leader = leader_name;
        self.state.follower = if without_pair { String::new() } else { follower_name };
        self.state.without_pair = without_pair;
        self.bump();
        Ok(())
    }

    /// Heat or round screen. Never shows a pair.
    pub fn apply_heat(&mut self, title: &str, heat_label: Option<&str>) {
        self.state.title = build_title(title, heat_label, false);
        self.state.leader.clear();
        self.state.follower.clear();
        self.state.without_pair = false;
        self.bump();
    }

    pub fn apply_leader_only(&mut self, name: &str) {
        self.state.leader = name.trim().to_string();
        self.bump();
    }

    pub fn apply_follower_only(&mut self, name: &str) {
        self.state.follower = name.trim().to_string();
        self.bump();
    }

    /// Empty the content; the hidden flag is left alone
    pub fn clear(&mut self) {
        self.state.title.clear();
        self.state.leader.clear();
        self.state.follower.clear();
        self.state.without_pair = false;
        self.bump();
    }

    pub fn hide(&mut self) {
        self.state.hidden = true;
        self.bump();
    }

    pub fn show(&mut self) {
        self.state.hidden = false;
        self.bump();
    }

    /// Replace the content with a journaled snapshot
    pub fn restore(&mut self, entry: &HistoryEntry) {
        self.state.title = entry.title.clone();
        self.state.leader = entry.leader.clone();
        self.state.follower = entry.follower.clone();
        self.state.without_pair = entry.without_pair;
        self.state.hidden = entry.hidden;
        self.bump();
    }

    fn bump(&mut self) {
        self.state.apply_id += 1;
    }
}

/// The "next up" line shown by overlays in `next` mode
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextTitle {
    pub title: String,
    pub apply_id: u64,
}

impl NextTitle {
    pub fn set(&mut self, title: String) {
        self.title = title;
        self.apply_id += 1;
    }

    pub fn clear(&mut self) {
        self.set(String::new());
    }

    /// Render as an overlay state with no pair
    pub fn as_overlay_state(&self) -> OnAirState {
        OnAirState {
            title: self.title.clone(),
            apply_id: self.apply_id,
            ..OnAirState::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{JsonCatalog, Participant, Special};

    fn catalog() -> JsonCatalog {
        JsonCatalog::from_parts(
            vec![
                Participant { number: 3, full_name: "#3 Alice".into(), role: None },
                Participant { number: 8, full_name: "#8 Bob".into(), role: None },
            ],
            Vec::new(),
            vec![Special {
                id: "show".into(),
                name: "Showcase".into(),
                items: vec!["Team A".into(), "Team B".into()],
            }],
        )
    }

    fn participant(number: u32) -> PairRef {
        PairRef::Participant { number }
    }

    #[test]
    fn test_build_title() {
        assert_eq!(build_title("Final A", None, false), "Final A");
        assert_eq!(build_title("Round 2", Some("Heat 3"), false), "Round 2 • Heat 3");
        assert_eq!(build_title("Round 2", Some("  "), true), "NEXT: Round 2");
        assert_eq!(build_title("", None, false), "");
    }

    #[test]
    fn test_apply_pair_resolves_names() {
        let mut store = OnAirStore::new();
        store
            .apply_pair(&catalog(), "Final A", Some(&participant(3)), Some(&participant(8)), false)
            .unwrap();

        let state = store.state();
        assert_eq!(state.title, "Final A");
        assert_eq!(state.leader, "#3 Alice");
        assert_eq!(state.follower, "#8 Bob");
        assert_eq!(state.apply_id, 1);
    }

    #[test]
    fn test_apply_pair_is_all_or_nothing() {
        let mut store = OnAirStore::new();
        store.apply_heat("Warmup", None);
        let before = store.state().clone();

        let err = store
            .apply_pair(&catalog(), "Final A", Some(&participant(3)), Some(&participant(99)), false)
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownParticipant(99));
        assert_eq!(store.state(), &before);

        let err = store
            .apply_pair(&catalog(), "Final A", Some(&participant(3)), None, false)
            .unwrap_err();
        assert_eq!(err, ValidationError::Missing("follower"));
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn test_without_pair_allows_missing_follower() {
        let mut store = OnAirStore::new();
        let item = PairRef::SpecialItem { special_id: "show".into(), index: 1 };
        store.apply_pair(&catalog(), "Showcase", Some(&item), None, true).unwrap();
        assert_eq!(store.state().leader, "Team B");
        assert!(store.state().without_pair);

        let missing = PairRef::SpecialItem { special_id: "show".into(), index: 5 };
        assert!(matches!(
            store.apply_pair(&catalog(), "Showcase", Some(&missing), None, true),
            Err(ValidationError::UnknownSpecialItem { index: 5, .. })
        ));
    }

    #[test]
    fn test_heat_clears_pair() {
        let mut store = OnAirStore::new();
        store
            .apply_pair(&catalog(), "Final A", Some(&participant(3)), Some(&participant(8)), false)
            .unwrap();
        store.apply_heat("Round 2", Some("Heat 3"));

        let state = store.state();
        assert_eq!(state.title, "Round 2 • Heat 3");
        assert_eq!(state.leader, "");
        assert_eq!(state.follower, "");
    }

    #[test]
    fn test_single_half_updates() {
        let mut store = OnAirStore::new();
        store
            .apply_pair(&catalog(), "Final A", Some(&participant(3)), Some(&participant(8)), false)
            .unwrap();
        store.apply_leader_only("Carol");

        let state = store.state();
        assert_eq!(state.leader, "Carol");
        assert_eq!(state.follower, "#8 Bob");
        assert_eq!(state.title, "Final A");
    }

    #[test]
    fn test_clear_preserves_hidden() {
        let mut store = OnAirStore::new();
        store.apply_heat("Round 1", None);
        store.hide();
        store.clear();
        assert!(store.state().hidden);
        assert_eq!(store.state().title, "");
    }

    #[test]
    fn test_hide_show_restores_content() {
        let mut store = OnAirStore::new();
        store
            .apply_pair(&catalog(), "Final A", Some(&participant(3)), Some(&participant(8)), false)
            .unwrap();
        let before = store.state().clone();

        store.hide();
        store.show();

        let after = store.state();
        assert_eq!(after.title, before.title);
        assert_eq!(after.leader, before.leader);
        assert_eq!(after.follower, before.follower);
        assert_eq!(after.without_pair, before.without_pair);
        assert!(!after.hidden);
        assert_eq!(after.apply_id, before.apply_id + 2);
    }

    #[test]
    fn test_next_title_has_its_own_counter() {
        let mut next = NextTitle::default();
        next.set(build_title("Final B", None, true));
        next.clear();
        assert_eq!(next.apply_id, 2);
        assert_eq!(next.as_overlay_state().title, "");
    }
}
