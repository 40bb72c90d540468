use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use crate::error::{BoardError, EntityKind};

/// Default columns seeded into every new board: (id, title).
pub const DEFAULT_COLUMNS: &[(&str, &str)] = &[
    ("col-todo", "To Do"),
    ("col-inprogress", "In Progress"),
    ("col-done", "Done"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounded label vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Bug,
    Feature,
    Design,
    Docs,
    Chore,
}

impl Label {
    pub const ALL: [Label; 5] = [
        Label::Bug,
        Label::Feature,
        Label::Design,
        Label::Docs,
        Label::Chore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Bug => "bug",
            Label::Feature => "feature",
            Label::Design => "design",
            Label::Docs => "docs",
            Label::Chore => "chore",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub labels: BTreeSet<Label>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Position within the column at creation time. `Column::card_ids` is authoritative.
    #[serde(default)]
    pub order: usize,
}

impl Card {
    /// A freshly created card: medium priority, no labels, unassigned.
    pub fn new(id: String, title: String, order: usize, now: i64) -> Self {
        Self {
            id,
            title,
            description: String::new(),
            priority: Priority::Medium,
            labels: BTreeSet::new(),
            assignee_id: None,
            created_at: now,
            updated_at: now,
            order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub card_ids: Vec<String>,
    /// Position among sibling columns at creation time. `Board::column_ids` is authoritative.
    #[serde(default)]
    pub order: usize,
}

impl Column {
    pub fn new(id: String, title: String, order: usize) -> Self {
        Self {
            id,
            title,
            card_ids: Vec::new(),
            order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub owner_id: String,
    #[serde(default)]
    pub member_ids: BTreeSet<String>,
    #[serde(default)]
    pub column_ids: Vec<String>,
    #[serde(default)]
    pub columns: BTreeMap<String, Column>,
    #[serde(default)]
    pub cards: BTreeMap<String, Card>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Board {
    /// A new board owned by `owner_id`, seeded with the default columns.
    /// The owner is also the first member.
    pub fn seeded(id: &str, title: &str, description: &str, owner_id: &str, now: i64) -> Self {
        let mut columns = BTreeMap::new();
        let mut column_ids = Vec::with_capacity(DEFAULT_COLUMNS.len());
        for (order, (col_id, col_title)) in DEFAULT_COLUMNS.iter().enumerate() {
            column_ids.push(col_id.to_string());
            columns.insert(
                col_id.to_string(),
                Column::new(col_id.to_string(), col_title.to_string(), order),
            );
        }

        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            owner_id: owner_id.to_string(),
            member_ids: BTreeSet::from([owner_id.to_string()]),
            column_ids,
            columns,
            cards: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn column(&self, column_id: &str) -> Result<&Column, BoardError> {
        self.columns
            .get(column_id)
            .ok_or_else(|| BoardError::not_found(EntityKind::Column, column_id))
    }

    pub fn card(&self, card_id: &str) -> Result<&Card, BoardError> {
        self.cards
            .get(card_id)
            .ok_or_else(|| BoardError::not_found(EntityKind::Card, card_id))
    }

    /// Id of the column whose `card_ids` contains `card_id`.
    pub fn column_of(&self, card_id: &str) -> Option<&str> {
        self.columns
            .values()
            .find(|col| col.card_ids.iter().any(|id| id == card_id))
            .map(|col| col.id.as_str())
    }

    /// Columns in display order. Ids without a record are skipped.
    pub fn ordered_columns(&self) -> impl Iterator<Item = &Column> {
        self.column_ids.iter().filter_map(|id| self.columns.get(id))
    }

    /// Total number of card references across all columns.
    pub fn card_count(&self) -> usize {
        self.columns.values().map(|c| c.card_ids.len()).sum()
    }

    pub fn summary(&self) -> BoardSummary {
        BoardSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            owner_id: self.owner_id.clone(),
            created_at: self.created_at,
        }
    }

    pub fn fingerprint(&self) -> BoardFingerprint {
        BoardFingerprint::of(self)
    }

    /// Check the structural invariants of the aggregate.
    pub fn check_invariants(&self) -> Result<(), BoardError> {
        let mut seen_columns = HashSet::new();
        for col_id in &self.column_ids {
            if !seen_columns.insert(col_id.as_str()) {
                return Err(BoardError::Validation(format!(
                    "column {} listed twice in columnIds",
                    col_id
                )));
            }
            if !self.columns.contains_key(col_id) {
                return Err(BoardError::Validation(format!(
                    "columnIds references missing column {}",
                    col_id
                )));
            }
        }

        let mut seen_cards: HashSet<&str> = HashSet::new();
        for col in self.columns.values() {
            for card_id in &col.card_ids {
                if !self.cards.contains_key(card_id) {
                    return Err(BoardError::Validation(format!(
                        "column {} references missing card {}",
                        col.id, card_id
                    )));
                }
                if !seen_cards.insert(card_id.as_str()) {
                    return Err(BoardError::Validation(format!(
                        "card {} appears in more than one position",
                        card_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Restore the invariants after merging state from different sources.
    ///
    /// Columns in `preferred` claim their cards first, so a card that shows up
    /// in two columns stays in the preferred one. Dangling ids are dropped.
    /// Returns the number of references removed.
    pub fn repair(&mut self, preferred: &HashSet<String>) -> usize {
        let mut removed = 0;

        let mut seen_columns = HashSet::new();
        let columns = &self.columns;
        let before = self.column_ids.len();
        self.column_ids
            .retain(|id| columns.contains_key(id) && seen_columns.insert(id.clone()));
        removed += before - self.column_ids.len();

        let mut visit_order: Vec<String> = Vec::with_capacity(self.columns.len());
        visit_order.extend(
            self.column_ids
                .iter()
                .filter(|id| preferred.contains(*id))
                .cloned(),
        );
        visit_order.extend(
            self.column_ids
                .iter()
                .filter(|id| !preferred.contains(*id))
                .cloned(),
        );
        for id in self.columns.keys() {
            if !self.column_ids.contains(id) {
                visit_order.push(id.clone());
            }
        }

        let mut claimed: HashSet<String> = HashSet::new();
        for col_id in visit_order {
            let cards = &self.cards;
            if let Some(col) = self.columns.get_mut(&col_id) {
                let before = col.card_ids.len();
                col.card_ids
                    .retain(|id| cards.contains_key(id) && claimed.insert(id.clone()));
                removed += before - col.card_ids.len();
            }
        }

        if removed > 0 {
            log::warn!(
                "[taskflow.board] Repaired board {}: dropped {} dangling or duplicate references",
                self.id,
                removed
            );
        }
        removed
    }
}

/// List-view projection of a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub owner_id: String,
    pub created_at: i64,
}

/// SHA-256 over the canonical JSON form of a board.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoardFingerprint(pub String);

impl BoardFingerprint {
    pub fn of(board: &Board) -> Self {
        use sha2::{Digest, Sha256};
        // Maps are BTreeMaps, so the serialized form is stable.
        let bytes = serde_json::to_vec(board).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoardFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
