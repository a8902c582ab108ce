//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::text::{non_blank, parse_tags};
use crate::{Error, Result};

/// Group assigned when a submission leaves it blank
pub const DEFAULT_GROUP: &str = "Grupo A";

/// Filter sentinel that matches every group
pub const ALL_GROUPS: &str = "all";

/// Most images kept per submission; extras are dropped
pub const MAX_IMAGES: usize = 6;

/// Delimiter joining image paths in the `image_urls` column
pub const IMAGE_DELIMITER: &str = "||";

/// A stored gabinete submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub student_name: String,
    pub email: String,
    pub group: String,
    pub artifact_title: String,
    pub artifact_desc: String,
    pub tags: String,
    pub reflection_q1: String,
    pub reflection_q2: String,
    pub reflection_q3: String,
    pub image_urls: Vec<String>,
    pub audio_url: Option<String>,
    pub suno_link: Option<String>,
}

impl Entry {
    /// Parsed tag set
    pub fn tag_list(&self) -> Vec<String> {
        parse_tags(&self.tags)
    }

    pub fn has_audio(&self) -> bool {
        self.audio_url.is_some() || self.suno_link.is_some()
    }

    /// Every textual field joined, used by free-text search
    pub fn search_blob(&self) -> String {
        [
            self.student_name.as_str(),
            self.email.as_str(),
            self.group.as_str(),
            self.artifact_title.as_str(),
            self.artifact_desc.as_str(),
            self.tags.as_str(),
            self.reflection_q1.as_str(),
            self.reflection_q2.as_str(),
            self.reflection_q3.as_str(),
        ]
        .join(" ")
        .to_lowercase()
    }

    /// Media paths referenced by this entry, images first
    pub fn media_paths(&self) -> Vec<&str> {
        self.image_urls
            .iter()
            .map(String::as_str)
            .chain(self.audio_url.as_deref())
            .collect()
    }
}

/// Encode image paths for the `image_urls` column
pub fn join_image_urls(urls: &[String]) -> String {
    urls.join(IMAGE_DELIMITER)
}

/// Decode the `image_urls` column
pub fn split_image_urls(value: &str) -> Vec<String> {
    value
        .split(IMAGE_DELIMITER)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fields of a submission before it is stored
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewEntry {
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub artifact_title: String,
    #[serde(default)]
    pub artifact_desc: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub reflection_q1: String,
    #[serde(default)]
    pub reflection_q2: String,
    #[serde(default)]
    pub reflection_q3: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub suno_link: Option<String>,
}

impl NewEntry {
    /// Names of required fields that are blank after trimming
    pub fn missing_fields(&self) -> Vec<String> {
        [
            ("student_name", &self.student_name),
            ("email", &self.email),
            ("artifact_title", &self.artifact_title),
            ("artifact_desc", &self.artifact_desc),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name.to_string())
        .collect()
    }

    /// Reject blank required fields, then trim everything and apply defaults
    ///
    /// Images beyond [`MAX_IMAGES`] are silently dropped.
    pub fn normalize(self) -> Result<NewEntry> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(Error::Validation { missing });
        }

        Ok(NewEntry {
            student_name: self.student_name.trim().to_string(),
            email: self.email.trim().to_string(),
            group: Some(non_blank(self.group.as_deref()).unwrap_or_else(|| DEFAULT_GROUP.to_string())),
            artifact_title: self.artifact_title.trim().to_string(),
            artifact_desc: self.artifact_desc.trim().to_string(),
            tags: self.tags.trim().to_string(),
            reflection_q1: self.reflection_q1.trim().to_string(),
            reflection_q2: self.reflection_q2.trim().to_string(),
            reflection_q3: self.reflection_q3.trim().to_string(),
            image_urls: self
                .image_urls
                .into_iter()
                .filter(|u| !u.trim().is_empty())
                .take(MAX_IMAGES)
                .collect(),
            audio_url: non_blank(self.audio_url.as_deref()),
            suno_link: non_blank(self.suno_link.as_deref()),
        })
    }
}

/// Gallery filter; all set conditions must hold
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryFilter {
    /// Exact group, or `"all"` for any
    pub group: Option<String>,
    /// Case-insensitive substring over all text fields
    pub free_text: Option<String>,
    /// Literal member of the parsed tag set
    pub exact_tag: Option<String>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &Entry) -> bool {
        if let Some(group) = non_blank(self.group.as_deref()) {
            if !group.eq_ignore_ascii_case(ALL_GROUPS) && entry.group != group {
                return false;
            }
        }

        if let Some(needle) = non_blank(self.free_text.as_deref()) {
            if !entry.search_blob().contains(&needle.to_lowercase()) {
                return false;
            }
        }

        if let Some(tag) = non_blank(self.exact_tag.as_deref()) {
            if !entry.tag_list().contains(&tag) {
                return false;
            }
        }

        true
    }
}

/// Summary numbers for the teacher panel
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryStats {
    pub total: usize,
    pub with_audio: usize,
    pub with_more_than_two_images: usize,
    pub groups: BTreeMap<String, usize>,
}

impl EntryStats {
    pub fn from_entries(entries: &[Entry]) -> Self {
        let mut stats = EntryStats {
            total: entries.len(),
            ..Default::default()
        };
        for entry in entries {
            if entry.has_audio() {
                stats.with_audio += 1;
            }
            if entry.image_urls.len() > 2 {
                stats.with_more_than_two_images += 1;
            }
            *stats.groups.entry(entry.group.clone()).or_insert(0) += 1;
        }
        stats
    }
}

/// Highest rubric sub-score
pub const MAX_SCORE: u8 = 4;

/// Teacher rubric, one 0–4 score per SPARK section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rubric {
    pub sensing: u8,
    pub probing: u8,
    pub acting: u8,
    pub reflecting: u8,
    pub knowing: u8,
}

impl Rubric {
    pub fn scores(&self) -> [u8; 5] {
        [
            self.sensing,
            self.probing,
            self.acting,
            self.reflecting,
            self.knowing,
        ]
    }

    pub fn validate(&self) -> Result<()> {
        if self.scores().iter().any(|s| *s > MAX_SCORE) {
            return Err(Error::InvalidInput(format!(
                "Rubric scores must be between 0 and {}",
                MAX_SCORE
            )));
        }
        Ok(())
    }
}

/// A stored rubric evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparkScore {
    pub email: String,
    pub rubric: Rubric,
    pub comments: String,
    pub updated_at: DateTime<Utc>,
}
