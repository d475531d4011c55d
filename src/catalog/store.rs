//! JSON file backed catalog

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{CatalogProvider, Contest, ContestKind, Participant, Special};

const PARTICIPANTS_FILE: &str = "participants.json";
const CONTESTS_FILE: &str = "contests.json";
const CONTEST_PARTICIPANTS_FILE: &str = "contest-participants.json";
const ROUND_BUTTONS_FILE: &str = "round-buttons.json";
const SPECIALS_FILE: &str = "specials.json";

const MAX_SPECIAL_ITEMS: usize = 120;

/// Catalog snapshot loaded from the data directory
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    participants: Vec<Participant>,
    contests: Vec<Contest>,
    contest_participants: HashMap<String, Vec<u32>>,
    round_buttons: Vec<String>,
    specials: Vec<Special>,
}

impl JsonCatalog {
    /// Load every catalog file from `dir`, falling back to defaults for
    /// missing or unreadable files. Legacy specials are normalized and
    /// written back.
    pub fn load(dir: &Path) -> Result<Self> {
        let participants: Vec<Participant> = read_records(&dir.join(PARTICIPANTS_FILE))
            .into_iter()
            .map(with_role)
            .collect();
        let contests: Vec<Contest> = read_records(&dir.join(CONTESTS_FILE));
        let contest_participants: HashMap<String, Vec<u32>> =
            read_json_or(&dir.join(CONTEST_PARTICIPANTS_FILE), HashMap::new());
        let round_buttons: Vec<String> =
            read_json_or(&dir.join(ROUND_BUTTONS_FILE), default_round_buttons());

        let specials_path = dir.join(SPECIALS_FILE);
        let raw_specials: Value = read_json_or(&specials_path, Value::Array(Vec::new()));
        let specials = normalize_specials(&raw_specials);
        if specials_path.exists() {
            write_json(&specials_path, &specials)?;
        }

        info!(
            "Loaded {} participants, {} contests, {} specials",
            participants.len(),
            contests.len(),
            specials.len()
        );

        Ok(Self {
            participants,
            contests,
            contest_participants,
            round_buttons,
            specials,
        })
    }

    /// Build a catalog from in-memory records
    #[cfg(test)]
    pub fn from_parts(
        participants: Vec<Participant>,
        contests: Vec<Contest>,
        specials: Vec<Special>,
    ) -> Self {
        Self {
            participants: participants.into_iter().map(with_role).collect(),
            contests,
            contest_participants: HashMap::new(),
            round_buttons: default_round_buttons(),
            specials,
        }
    }

    #[cfg(test)]
    pub fn with_contest_subset(mut self, contest_id: &str, numbers: Vec<u32>) -> Self {
        self.contest_participants.insert(contest_id.to_string(), numbers);
        self
    }
}

impl CatalogProvider for JsonCatalog {
    fn contest(&self, id: &str) -> Option<Contest> {
        self.contests.iter().find(|c| c.id == id).cloned()
    }

    fn contests(&self, kind: Option<ContestKind>) -> Vec<Contest> {
        self.contests
            .iter()
            .filter(|c| kind.map_or(true, |k| c.kind == k))
            .cloned()
            .collect()
    }

    fn participant(&self, number: u32) -> Option<Participant> {
        self.participants.iter().find(|p| p.number == number).cloned()
    }

    fn participants_for_contest(&self, contest_id: &str) -> Vec<Participant> {
        match self.contest_participants.get(contest_id) {
            Some(allowed) if !allowed.is_empty() => {
                let allowed: HashSet<u32> = allowed.iter().copied().collect();
                self.participants
                    .iter()
                    .filter(|p| allowed.contains(&p.number))
                    .cloned()
                    .collect()
            }
            _ => self.participants.clone(),
        }
    }

    fn participants(&self) -> Vec<Participant> {
        self.participants.clone()
    }

    fn special(&self, id: &str) -> Option<Special> {
        self.specials.iter().find(|s| s.id == id).cloned()
    }

    fn specials(&self) -> Vec<Special> {
        self.specials.clone()
    }

    fn round_buttons(&self) -> Vec<String> {
        self.round_buttons.clone()
    }
}

/// Spell out the parity default so clients always see a role
fn with_role(mut participant: Participant) -> Participant {
    participant.role = Some(participant.role());
    participant
}

fn default_round_buttons() -> Vec<String> {
    (1..=4).map(|n| format!("Heat {}", n)).collect()
}

/// Accept both the current `{id, name, items}` shape and the legacy
/// `{id, name, info, teams}` shape. Entries without id or name are dropped.
fn normalize_specials(raw: &Value) -> Vec<Special> {
    let Some(entries) = raw.as_array() else {
        return Vec::new();
    };

    entries.iter().filter_map(normalize_special).collect()
}

fn normalize_special(value: &Value) -> Option<Special> {
    let obj = value.as_object()?;
    let id = json_text(obj.get("id"))?;
    let name = json_text(obj.get("name"))?;

    let source = obj
        .get("items")
        .and_then(Value::as_array)
        .or_else(|| obj.get("teams").and_then(Value::as_array));

    let items = source
        .map(|list| {
            list.iter()
                .filter_map(|item| json_text(Some(item)))
                .take(MAX_SPECIAL_ITEMS)
                .collect()
        })
        .unwrap_or_default();

    Some(Special { id, name, items })
}

/// Trimmed, non-empty text of a JSON string or number
fn json_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Read a JSON array record by record. Entries that do not fit `T` are
/// skipped with a warning instead of discarding the whole file.
fn read_records<T: DeserializeOwned>(path: &PathBuf) -> Vec<T> {
    let raw: Value = read_json_or(path, Value::Array(Vec::new()));
    let Some(entries) = raw.as_array() else {
        warn!("Catalog file {:?} is not a list, ignoring it", path);
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| match serde_json::from_value::<T>(entry.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping entry {} of {:?}: {}", i, path, e);
                None
            }
        })
        .collect()
}

fn read_json_or<T: DeserializeOwned>(path: &PathBuf, default: T) -> T {
    if !path.exists() {
        debug!("Catalog file {:?} not found, using defaults", path);
        return default;
    }

    let parsed = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {:?}", path))
        .and_then(|raw| {
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse catalog file: {:?}", path))
        });

    match parsed {
        Ok(value) => value,
        Err(e) => {
            warn!("{:#}", e);
            default
        }
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents = serde_json::to_string_pretty(value).context("Failed to serialize catalog")?;
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write catalog file: {:?}", path))
}
