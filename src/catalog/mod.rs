//! Read-only catalog of contests, participants and specials
//!
//! The on-air desk validates references against this catalog but never
//! mutates it. The records are maintained by the admin tooling and stored
//! as plain JSON files in the data directory.

mod store;

pub use store::JsonCatalog;

use serde::{Deserialize, Serialize};

/// Which on-air flow a contest uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContestKind {
    /// Final pairs, shown with leader and follower names
    Finals,
    /// Elimination heats, shown without a pair
    Rounds,
}

impl ContestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContestKind::Finals => "finals",
            ContestKind::Rounds => "rounds",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default = "default_contest_kind")]
    pub kind: ContestKind,
}

fn default_contest_kind() -> ContestKind {
    ContestKind::Rounds
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Lead,
    Follow,
    #[serde(other)]
    Unknown,
}

impl Role {
    /// Default rule: odd numbers lead, even numbers follow
    pub fn from_number(number: u32) -> Self {
        if number % 2 == 1 {
            Role::Lead
        } else {
            Role::Follow
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub number: u32,
    pub full_name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

impl Participant {
    pub fn role(&self) -> Role {
        self.role.unwrap_or_else(|| Role::from_number(self.number))
    }
}

/// An ad-hoc segment with selectable display items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Special {
    pub id: String,
    pub name: String,
    pub items: Vec<String>,
}

/// Lookups the on-air desk needs from the catalog
pub trait CatalogProvider: Send + Sync {
    fn contest(&self, id: &str) -> Option<Contest>;

    /// All contests, optionally filtered by kind
    fn contests(&self, kind: Option<ContestKind>) -> Vec<Contest>;

    fn participant(&self, number: u32) -> Option<Participant>;

    /// Participants allowed in a contest (everyone when no subset is set)
    fn participants_for_contest(&self, contest_id: &str) -> Vec<Participant>;

    fn participants(&self) -> Vec<Participant>;

    fn special(&self, id: &str) -> Option<Special>;

    fn specials(&self) -> Vec<Special>;

    fn round_buttons(&self) -> Vec<String>;
}
