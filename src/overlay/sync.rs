//! Overlay-side synchronization
//!
//! Mirrors what a browser overlay does with `/api/overlay-state`: render the
//! first state it sees, then re-render only when `applyId` moves, and
//! animate only the fields whose text actually changed.

use tracing::trace;

use crate::onair::OnAirState;
use crate::settings::VersionedSettings;

/// Restartable animation on one element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimationTrigger {
    playing: bool,
    generation: u64,
    kind: String,
    duration_ms: u32,
}

impl AnimationTrigger {
    /// Start the animation again from the beginning.
    ///
    /// The element always leaves the playing state before re-entering it,
    /// so a trigger that lands while a previous run is still going restarts
    /// it instead of being swallowed.
    pub fn restart(&mut self, kind: &str, duration_ms: u32) -> u64 {
        self.playing = false;
        self.kind = kind.to_string();
        self.duration_ms = duration_ms;
        self.generation += 1;
        self.playing = true;
        trace!(kind, duration_ms, generation = self.generation, "Animation restarted");
        self.generation
    }

    #[cfg(test)]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Number of times the animation has been (re)started
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn duration_ms(&self) -> u32 {
        self.duration_ms
    }
}

/// One rendered text element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldView {
    pub text: String,
    /// Whether the element occupies layout
    pub visible: bool,
    pub animation: AnimationTrigger,
}

impl Default for FieldView {
    fn default() -> Self {
        Self {
            text: String::new(),
            visible: true,
            animation: AnimationTrigger::default(),
        }
    }
}

/// What the overlay currently shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayView {
    pub title: FieldView,
    pub leader: FieldView,
    /// Separator plus follower name
    pub tail: FieldView,
    /// The line holding leader and tail
    pub pair_visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Uninitialized,
    Synced { apply_id: u64 },
}

/// Fields touched by one render
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangedFields {
    pub title: bool,
    pub leader: bool,
    pub follower: bool,
    pub without_pair: bool,
}

impl ChangedFields {
    pub fn any(&self) -> bool {
        self.title || self.leader || self.follower || self.without_pair
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Same `applyId` as last time
    Unchanged,
    Rendered(ChangedFields),
}

/// Last texts seen, after hidden-state blanking
#[derive(Debug, Clone, Default)]
struct LastSeen {
    title: Option<String>,
    leader: Option<String>,
    follower: Option<String>,
    without_pair: bool,
}

#[derive(Debug, Clone)]
pub struct OverlayClient {
    state: SyncState,
    hide_empty: bool,
    style: Option<VersionedSettings>,
    last: LastSeen,
    view: OverlayView,
    failed_polls: u64,
}

impl OverlayClient {
    pub fn new(hide_empty: bool) -> Self {
        Self {
            state: SyncState::Uninitialized,
            hide_empty,
            style: None,
            last: LastSeen::default(),
            view: OverlayView {
                pair_visible: true,
                ..OverlayView::default()
            },
            failed_polls: 0,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn view(&self) -> &OverlayView {
        &self.view
    }

    #[cfg(test)]
    pub fn style(&self) -> Option<&VersionedSettings> {
        self.style.as_ref()
    }

    pub fn failed_polls(&self) -> u64 {
        self.failed_polls
    }

    /// Feed one polled state
    pub fn apply_state(&mut self, state: &OnAirState) -> SyncOutcome {
        if self.state == (SyncState::Synced { apply_id: state.apply_id }) {
            return SyncOutcome::Unchanged;
        }
        let changed = self.render(state);
        self.state = SyncState::Synced {
            apply_id: state.apply_id,
        };
        SyncOutcome::Rendered(changed)
    }

    /// Feed one polled settings blob. Returns whether styles were re-applied.
    pub fn apply_settings(&mut self, settings: VersionedSettings) -> bool {
        if self.style.as_ref().map(|s| s.version) == Some(settings.version) {
            return false;
        }
        trace!(version = settings.version, "Applying overlay style");
        self.style = Some(settings);
        true
    }

    /// A poll failed; keep showing what is on screen
    pub fn poll_failed(&mut self) {
        self.failed_polls += 1;
    }

    fn render(&mut self, state: &OnAirState) -> ChangedFields {
        let blank = |text: &str| {
            if state.hidden {
                String::new()
            } else {
                text.to_string()
            }
        };
        let title = blank(&state.title);
        let leader = blank(&state.leader);
        let follower = blank(&state.follower);
        let without_pair = state.without_pair;

        let changed = ChangedFields {
            title: self.last.title.as_deref() != Some(title.as_str()),
            leader: self.last.leader.as_deref() != Some(leader.as_str()),
            follower: self.last.follower.as_deref() != Some(follower.as_str()),
            without_pair: self.last.without_pair != without_pair,
        };

        let style = self.style.as_ref().map(|s| &s.settings);

        if changed.title {
            self.view.title.text = title.clone();
            if let Some((kind, ms)) = style.and_then(|s| animation(&s.title_anim_type, s.title_anim_ms)) {
                self.view.title.animation.restart(kind, ms);
            }
            self.last.title = Some(title.clone());
        }

        let show_tail = !without_pair && !follower.trim().is_empty();
        if changed.leader || changed.follower || changed.without_pair {
            self.view.leader.text = leader.clone();
            self.view.tail.visible = show_tail;
            self.view.tail.text = if show_tail { follower.clone() } else { String::new() };

            if changed.leader && !leader.is_empty() {
                if let Some((kind, ms)) =
                    style.and_then(|s| animation(&s.leader_anim_type, s.leader_anim_ms))
                {
                    self.view.leader.animation.restart(kind, ms);
                }
            }
            if changed.follower && show_tail {
                if let Some((kind, ms)) =
                    style.and_then(|s| animation(&s.follower_anim_type, s.follower_anim_ms))
                {
                    self.view.tail.animation.restart(kind, ms);
                }
            }

            self.last.leader = Some(leader.clone());
            self.last.follower = Some(follower);
            self.last.without_pair = without_pair;
        }

        if self.hide_empty {
            self.view.title.visible = !title.trim().is_empty();
            self.view.pair_visible = !leader.trim().is_empty() || show_tail;
        }

        changed
    }
}

fn animation(kind: &str, ms: u32) -> Option<(&str, u32)> {
    if kind.is_empty() || kind == "none" {
        None
    } else {
        Some((kind, ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{JsonCatalog, Participant};
    use crate::onair::{OnAirAction, OnAirDesk, PairRef};
    use crate::settings::Settings;

    fn on_air(title: &str, leader: &str, follower: &str, apply_id: u64) -> OnAirState {
        OnAirState {
            title: title.into(),
            leader: leader.into(),
            follower: follower.into(),
            without_pair: false,
            hidden: false,
            apply_id,
        }
    }

    fn animated() -> VersionedSettings {
        VersionedSettings {
            version: 1,
            settings: Settings {
                title_anim_type: "fade".into(),
                leader_anim_type: "slide".into(),
                follower_anim_type: "slide".into(),
                ..Settings::default()
            },
        }
    }

    fn client() -> OverlayClient {
        let mut client = OverlayClient::new(true);
        client.apply_settings(animated());
        client
    }

    #[test]
    fn test_first_poll_renders_unconditionally() {
        let mut client = OverlayClient::new(true);
        assert_eq!(client.state(), SyncState::Uninitialized);

        let outcome = client.apply_state(&on_air("", "", "", 0));
        assert!(matches!(outcome, SyncOutcome::Rendered(_)));
        assert_eq!(client.state(), SyncState::Synced { apply_id: 0 });
        assert!(!client.view().title.visible);
        assert!(!client.view().pair_visible);
    }

    #[test]
    fn test_same_apply_id_does_not_rerender() {
        let mut client = client();
        client.apply_state(&on_air("Finals", "Anna", "", 3));
        let generation = client.view().title.animation.generation();

        let outcome = client.apply_state(&on_air("Something else", "Anna", "", 3));
        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert_eq!(client.view().title.text, "Finals");
        assert_eq!(client.view().title.animation.generation(), generation);
    }

    #[test]
    fn test_only_changed_follower_animates() {
        let mut client = client();
        client.apply_state(&on_air("Finals", "Anna", "Boris", 1));
        let title_gen = client.view().title.animation.generation();
        let leader_gen = client.view().leader.animation.generation();
        let tail_gen = client.view().tail.animation.generation();

        let outcome = client.apply_state(&on_air("Finals", "Anna", "Carl", 2));
        let SyncOutcome::Rendered(changed) = outcome else {
            panic!("expected a render");
        };
        assert!(!changed.title && !changed.leader && changed.follower);
        assert_eq!(client.view().title.animation.generation(), title_gen);
        assert_eq!(client.view().leader.animation.generation(), leader_gen);
        assert_eq!(client.view().tail.animation.generation(), tail_gen + 1);
        assert_eq!(client.view().tail.text, "Carl");
    }

    fn generations(client: &OverlayClient) -> (u64, u64, u64) {
        let view = client.view();
        (
            view.title.animation.generation(),
            view.leader.animation.generation(),
            view.tail.animation.generation(),
        )
    }

    #[test]
    fn test_desk_changes_animate_only_what_moved() {
        let catalog = JsonCatalog::from_parts(
            vec![
                Participant { number: 3, full_name: "#3 Alice".into(), role: None },
                Participant { number: 8, full_name: "#8 Bob".into(), role: None },
            ],
            Vec::new(),
            Vec::new(),
        );
        let mut desk = OnAirDesk::new(200);
        let mut client = client();

        desk.perform(
            &catalog,
            OnAirAction::Pair {
                title: "Final A".into(),
                leader: Some(PairRef::Participant { number: 3 }),
                follower: Some(PairRef::Participant { number: 8 }),
                without_pair: false,
            },
        )
        .unwrap();
        assert!(matches!(client.apply_state(desk.state()), SyncOutcome::Rendered(_)));
        assert_eq!(generations(&client), (1, 1, 1));
        assert_eq!(client.view().leader.text, "#3 Alice");
        assert_eq!(client.view().tail.text, "#8 Bob");

        // Polling the same state again animates nothing
        assert_eq!(client.apply_state(desk.state()), SyncOutcome::Unchanged);
        assert_eq!(generations(&client), (1, 1, 1));

        desk.perform(&catalog, OnAirAction::Leader("Carol".into())).unwrap();
        let SyncOutcome::Rendered(changed) = client.apply_state(desk.state()) else {
            panic!("expected a render");
        };
        assert!(changed.leader && !changed.title && !changed.follower);
        assert_eq!(generations(&client), (1, 2, 1));
        assert_eq!(client.view().leader.text, "Carol");
        assert_eq!(client.view().tail.text, "#8 Bob");
    }

    #[test]
    fn test_cleared_leader_does_not_animate() {
        let mut client = client();
        client.apply_state(&on_air("Finals", "Anna", "", 1));
        let leader_gen = client.view().leader.animation.generation();

        client.apply_state(&on_air("Finals", "", "", 2));
        assert_eq!(client.view().leader.text, "");
        assert_eq!(client.view().leader.animation.generation(), leader_gen);
        assert!(!client.view().pair_visible);
    }

    #[test]
    fn test_hidden_blanks_every_field() {
        let mut client = client();
        client.apply_state(&on_air("Finals", "Anna", "Boris", 1));

        let mut hidden = on_air("Finals", "Anna", "Boris", 2);
        hidden.hidden = true;
        client.apply_state(&hidden);

        let view = client.view();
        assert_eq!(view.title.text, "");
        assert_eq!(view.leader.text, "");
        assert_eq!(view.tail.text, "");
        assert!(!view.title.visible);
        assert!(!view.pair_visible);
    }

    #[test]
    fn test_without_pair_hides_tail() {
        let mut client = client();
        let mut state = on_air("Heat 1", "Anna", "Boris", 1);
        state.without_pair = true;
        client.apply_state(&state);

        assert!(!client.view().tail.visible);
        assert_eq!(client.view().tail.text, "");
        assert!(client.view().pair_visible);
    }

    #[test]
    fn test_hide_empty_off_keeps_layout() {
        let mut client = OverlayClient::new(false);
        client.apply_state(&on_air("", "", "", 1));
        assert!(client.view().title.visible);
        assert!(client.view().pair_visible);
    }

    #[test]
    fn test_no_animation_without_style() {
        let mut client = OverlayClient::new(true);
        client.apply_state(&on_air("Finals", "Anna", "Boris", 1));
        assert_eq!(client.view().title.animation.generation(), 0);
        assert!(!client.view().title.animation.is_playing());
    }

    #[test]
    fn test_restart_while_playing_bumps_generation() {
        let mut trigger = AnimationTrigger::default();
        assert_eq!(trigger.restart("fade", 300), 1);
        assert!(trigger.is_playing());
        assert_eq!(trigger.restart("fade", 300), 2);
        assert!(trigger.is_playing());
        assert_eq!(trigger.kind(), "fade");
        assert_eq!(trigger.duration_ms(), 300);
    }

    #[test]
    fn test_settings_reapplied_only_on_new_version() {
        let mut client = OverlayClient::new(true);
        assert!(client.apply_settings(animated()));
        assert!(!client.apply_settings(animated()));

        let mut newer = animated();
        newer.version = 2;
        assert!(client.apply_settings(newer));
        assert_eq!(client.style().map(|s| s.version), Some(2));
    }

    #[test]
    fn test_failed_poll_keeps_content() {
        let mut client = client();
        client.apply_state(&on_air("Finals", "Anna", "Boris", 1));
        let before = client.view().clone();

        client.poll_failed();
        assert_eq!(client.view(), &before);
        assert_eq!(client.failed_polls(), 1);
    }
}
