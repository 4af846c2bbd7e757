//! Pattern catalog: the intents the assistant can recognise.
//!
//! A [`Dataset`] is an immutable snapshot. Reloading builds a brand-new
//! snapshot and swaps the whole thing; entries are never patched in place.
//!
//! The on-disk format is TOML:
//!
//! ```toml
//! [[skills.time.commands]]
//! patterns = ["который час", "what time is it"]
//! action = "time.now"
//! response = { ru = "Сейчас посмотрю.", en = "Let me check." }
//!
//! [meta.reload_dataset]
//! patterns = ["обнови датасет"]
//! response = { ru = "Датасет обновлён." }
//!
//! [[smalltalk.commands]]
//! patterns = ["привет"]
//! response = "Здравствуйте!"
//! ```

use crate::error::{AssistantError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level intent category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Dispatched to a skill handler.
    Skill,
    /// Administrative command handled by the executor itself.
    Meta,
    /// Canned conversational reply.
    SmallTalk,
}

/// Reply template attached to a pattern: one string, or one per language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// Same text for every language.
    Text(String),
    /// Language code → text.
    Localized(BTreeMap<String, String>),
}

impl Default for Response {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl Response {
    /// Text for `language`, falling back to `base_language`, then to any translation.
    pub fn resolve(&self, language: &str, base_language: &str) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Localized(map) => map
                .get(language)
                .or_else(|| map.get(base_language))
                .or_else(|| map.values().next())
                .map(String::as_str)
                .unwrap_or(""),
        }
    }
}

/// One recognizable phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternEntry {
    /// Example utterance as written in the catalog.
    pub phrase: String,
    /// Which tier of the catalog the phrase belongs to.
    pub category: Category,
    /// Skill category name, meta key, or `smalltalk_<n>` group id.
    pub group_key: String,
    /// Dispatch target; always present for [`Category::Skill`].
    pub action: Option<String>,
    /// Reply template.
    pub response: Response,
}

/// Immutable snapshot of every pattern in the catalog.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    entries: Vec<PatternEntry>,
    meta: BTreeMap<String, Response>,
}

impl Dataset {
    /// Build a snapshot from already-flattened entries.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Dataset`] if a skill entry has no action.
    pub fn from_entries(entries: Vec<PatternEntry>) -> Result<Self> {
        let mut meta = BTreeMap::new();
        for entry in &entries {
            match entry.category {
                Category::Skill if entry.action.as_deref().is_none_or(str::is_empty) => {
                    return Err(AssistantError::Dataset(format!(
                        "skill pattern \"{}\" in \"{}\" has no action",
                        entry.phrase, entry.group_key
                    )));
                }
                Category::Meta => {
                    meta.entry(entry.group_key.clone())
                        .or_insert_with(|| entry.response.clone());
                }
                _ => {}
            }
        }
        Ok(Self { entries, meta })
    }

    /// Parse a TOML catalog.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Dataset`] on syntax errors or invalid entries.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: DatasetFile = toml::from_str(content)
            .map_err(|e| AssistantError::Dataset(format!("cannot parse dataset: {e}")))?;
        Self::from_entries(file.flatten())
    }

    /// Read and parse a TOML catalog from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AssistantError::Dataset(format!("cannot read dataset {}: {e}", path.display()))
        })?;
        let dataset = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            patterns = dataset.len(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// All entries in tie-break order.
    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    /// Reply template of a meta command, if the catalog defines it.
    pub fn meta(&self, key: &str) -> Option<&Response> {
        self.meta.get(key)
    }

    /// Keys of every meta command.
    pub fn meta_keys(&self) -> impl Iterator<Item = &str> {
        self.meta.keys().map(String::as_str)
    }

    /// Distinct skill actions referenced by the catalog.
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self
            .entries
            .iter()
            .filter(|e| e.category == Category::Skill)
            .filter_map(|e| e.action.as_deref())
            .collect();
        actions.sort_unstable();
        actions.dedup();
        actions
    }

    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no patterns at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where fresh catalog snapshots come from.
pub trait DatasetSource: Send {
    /// Produce a complete new snapshot.
    ///
    /// # Errors
    ///
    /// Any error leaves the caller's current snapshot in effect.
    fn load(&self) -> Result<Dataset>;
}

/// Loads the catalog from a TOML file every time it is asked.
#[derive(Debug, Clone)]
pub struct FileDatasetSource {
    path: PathBuf,
}

impl FileDatasetSource {
    /// Source backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The catalog file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetSource for FileDatasetSource {
    fn load(&self) -> Result<Dataset> {
        Dataset::load(&self.path)
    }
}

// ---------------------------------------------------------------------------
// On-disk schema
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DatasetFile {
    skills: BTreeMap<String, SkillGroup>,
    meta: BTreeMap<String, MetaCommand>,
    smalltalk: SmallTalkGroup,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SkillGroup {
    commands: Vec<SkillCommand>,
}

#[derive(Debug, Deserialize)]
struct SkillCommand {
    patterns: PatternList,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    response: Response,
}

#[derive(Debug, Deserialize)]
struct MetaCommand {
    patterns: PatternList,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    response: Response,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SmallTalkGroup {
    commands: Vec<SmallTalkCommand>,
}

#[derive(Debug, Deserialize)]
struct SmallTalkCommand {
    patterns: PatternList,
    #[serde(default)]
    response: Response,
}

/// `"phrase"`, `["a", "b"]`, or `{ ru = ["a"], en = "b" }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PatternList {
    One(String),
    Many(Vec<String>),
    ByLanguage(BTreeMap<String, OneOrMany>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl PatternList {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(p) => vec![p],
            Self::Many(ps) => ps,
            Self::ByLanguage(map) => map
                .into_values()
                .flat_map(|v| match v {
                    OneOrMany::One(p) => vec![p],
                    OneOrMany::Many(ps) => ps,
                })
                .collect(),
        }
    }
}

impl DatasetFile {
    fn flatten(self) -> Vec<PatternEntry> {
        let mut entries = Vec::new();

        for (category, group) in self.skills {
            for cmd in group.commands {
                for phrase in cmd.patterns.into_vec() {
                    entries.push(PatternEntry {
                        phrase,
                        category: Category::Skill,
                        group_key: category.clone(),
                        action: cmd.action.clone(),
                        response: cmd.response.clone(),
                    });
                }
            }
        }

        for (key, cmd) in self.meta {
            for phrase in cmd.patterns.into_vec() {
                entries.push(PatternEntry {
                    phrase,
                    category: Category::Meta,
                    group_key: key.clone(),
                    action: cmd.action.clone(),
                    response: cmd.response.clone(),
                });
            }
        }

        for (idx, cmd) in self.smalltalk.commands.into_iter().enumerate() {
            for phrase in cmd.patterns.into_vec() {
                entries.push(PatternEntry {
                    phrase,
                    category: Category::SmallTalk,
                    group_key: format!("smalltalk_{idx}"),
                    action: None,
                    response: cmd.response.clone(),
                });
            }
        }

        entries
    }
}
