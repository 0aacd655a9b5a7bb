use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A boat registered in a regatta. Results reference it by `entry_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Entry {
    pub entry_id: Uuid,
    /// Sailor account behind the entry, used to follow the same sailor across regattas.
    pub user_id: Option<Uuid>,
    pub name: String,
    pub sail_number: String,
    pub boat_class: String,
    pub division: Option<String>,
    pub club: Option<String>,
}

impl Entry {
    pub fn new(entry_id: Uuid, name: impl Into<String>, sail_number: impl Into<String>) -> Self {
        Self {
            entry_id,
            user_id: None,
            name: name.into(),
            sail_number: sail_number.into(),
            boat_class: String::new(),
            division: None,
            club: None,
        }
    }

    pub fn label(&self) -> &str {
        if self.sail_number.is_empty() {
            &self.name
        } else {
            &self.sail_number
        }
    }
}

/// A race inside a regatta; `sequence` is its 1-based order in the series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Race {
    pub race_id: Uuid,
    pub sequence: u32,
    pub name: Option<String>,
}

impl Race {
    pub fn new(race_id: Uuid, sequence: u32) -> Self {
        Self {
            race_id,
            sequence,
            name: None,
        }
    }
}
