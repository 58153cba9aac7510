//! Script model - the artifact the writing workflow produces.

use crate::id::{OwnerId, ScriptId};
use crate::Time;
use serde::{Deserialize, Serialize};

/// A saved script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    /// Unique identifier
    pub id: ScriptId,

    /// Author
    pub owner_id: OwnerId,

    /// Title
    pub title: String,

    /// Format, e.g. "vertical short drama" or "feature film"
    pub script_type: String,

    /// Planned number of episodes
    pub episode_count: u32,

    /// Target words per episode
    pub word_count: u32,

    /// Seed keywords
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Chosen story idea
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logline: Option<String>,

    /// Story outline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<String>,

    /// Episode breakdown
    #[serde(default)]
    pub episodes: Vec<Episode>,

    /// Script body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Creation timestamp
    pub created_at: Time,

    /// Last update timestamp
    pub updated_at: Time,
}

/// One entry of an episode breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Episode number as text
    pub id: String,
    /// What happens
    pub summary: String,
    /// Closing hook
    #[serde(default)]
    pub cliffhanger: String,
}

/// Fields supplied when saving a new script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewScript {
    /// Title; a dated default is used when absent
    pub title: Option<String>,
    /// Format
    pub script_type: String,
    /// Planned number of episodes
    pub episode_count: u32,
    /// Target words per episode
    pub word_count: u32,
    /// Seed keywords
    pub keywords: Vec<String>,
    /// Chosen story idea
    pub logline: Option<String>,
    /// Story outline
    pub outline: Option<String>,
    /// Episode breakdown
    pub episodes: Vec<Episode>,
    /// Script body
    pub content: Option<String>,
}

/// Partial update of a saved script. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptUpdate {
    /// New title
    pub title: Option<String>,
    /// New story idea
    pub logline: Option<String>,
    /// New outline
    pub outline: Option<String>,
    /// Replacement episode breakdown
    pub episodes: Option<Vec<Episode>>,
    /// New script body
    pub content: Option<String>,
}

impl Script {
    /// Build a script from a save request.
    pub fn create(new: NewScript, owner_id: OwnerId) -> Self {
        let now = chrono::Utc::now();
        let title = new
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Script {}", now.format("%Y-%m-%d")));
        Self {
            id: ScriptId::new(),
            owner_id,
            title,
            script_type: new.script_type,
            episode_count: new.episode_count,
            word_count: new.word_count,
            keywords: new.keywords,
            logline: new.logline,
            outline: new.outline,
            episodes: new.episodes,
            content: new.content,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update and bump `updated_at`.
    pub fn apply(&mut self, update: ScriptUpdate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(logline) = update.logline {
            self.logline = Some(logline);
        }
        if let Some(outline) = update.outline {
            self.outline = Some(outline);
        }
        if let Some(episodes) = update.episodes {
            self.episodes = episodes;
        }
        if let Some(content) = update.content {
            self.content = Some(content);
        }
        self.updated_at = chrono::Utc::now();
    }
}
