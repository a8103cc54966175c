use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::constants::SKILL_PREVIEW_COUNT;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Case-insensitive substring match on the name or any skill tag.
    /// An empty term matches everything.
    pub fn matches(&self, term: &str) -> bool {
        self.name_matches(term)
            || self
                .skills
                .iter()
                .any(|skill| skill.to_lowercase().contains(&term.to_lowercase()))
    }

    pub fn name_matches(&self, term: &str) -> bool {
        self.full_name.to_lowercase().contains(&term.to_lowercase())
    }

    /// Leading skills for a card, plus how many were left out.
    pub fn skill_preview(&self) -> (&[String], usize) {
        let shown = self.skills.len().min(SKILL_PREVIEW_COUNT);
        (&self.skills[..shown], self.skills.len() - shown)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub user_id: Uuid,
    pub full_name: String,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: String,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub profile_image_url: Option<String>,
}

/// Splits a comma-separated skills field, trimming and dropping empty tags.
pub fn parse_skills(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|skill| !skill.is_empty())
        .map(str::to_string)
        .collect()
}
