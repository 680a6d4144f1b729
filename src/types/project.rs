//! Destination-side project state

use serde::{Deserialize, Serialize};

use super::Visibility;

/// Project state as observed from the destination provider.
///
/// Read fresh on every run; only changed through explicit provider calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationProjectState {
    /// Provider's numeric project id
    pub id: u64,

    #[serde(default)]
    pub description: String,

    pub visibility: Visibility,

    #[serde(default)]
    pub archived: bool,
}

impl DestinationProjectState {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            description: String::new(),
            visibility: Visibility::Private,
            archived: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_archived(mut self, archived: bool) -> Self {
        self.archived = archived;
        self
    }
}

/// Body of an "edit project" call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEdit {
    pub description: String,
    pub visibility: Visibility,
}
