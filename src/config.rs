//! Configuration types for the command pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level configuration for the assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Session-level settings (language, active window).
    pub assistant: SessionConfig,
    /// Wake phrases per language.
    pub wake_words: WakeWordConfig,
    /// Intent matcher thresholds.
    pub matcher: MatcherConfig,
    /// Stop-words and segment separators.
    pub text: TextConfig,
    /// Localized canned replies produced by the core itself.
    pub responses: ResponseConfig,
    /// Pattern catalog location.
    pub dataset: DatasetConfig,
}

/// Session / activation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Language used until the recognizer reports one, and for missing translations.
    pub default_language: String,
    /// Seconds the assistant stays awake after the last utterance.
    pub active_timeout_s: u32,
    /// Consecutive empty recognitions the recognizer feed absorbs before it
    /// passes one "nothing heard" prompt on to the dispatch worker.
    ///
    /// 0 or 1 passes every empty recognition through.
    pub miss_limit: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_language: "ru".to_owned(),
            active_timeout_s: 20,
            miss_limit: 3,
        }
    }
}

/// Wake phrases grouped by language.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeWordConfig {
    /// Language code → wake phrases.
    pub by_language: BTreeMap<String, Vec<String>>,
}

impl WakeWordConfig {
    /// All configured wake phrases, lower-cased, trimmed and de-duplicated.
    pub fn all(&self) -> Vec<String> {
        let mut words: Vec<String> = self
            .by_language
            .values()
            .flatten()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        words.sort();
        words.dedup();
        words
    }
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        let mut by_language = BTreeMap::new();
        by_language.insert("ru".to_owned(), vec!["джарвис".to_owned()]);
        by_language.insert(
            "en".to_owned(),
            vec!["jarvis".to_owned(), "hey jarvis".to_owned()],
        );
        by_language.insert("uz".to_owned(), vec!["jarvis".to_owned()]);
        Self { by_language }
    }
}

/// Fuzzy matcher tunables.
///
/// Scores are on a 0–100 scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Primary acceptance threshold.
    pub threshold: f64,
    /// Lowest score a SmallTalk candidate may ever be accepted at.
    pub smalltalk_floor: f64,
    /// How far below `threshold` a SmallTalk candidate may score.
    pub smalltalk_margin: f64,
    /// Lowest partial-similarity score accepted by the soft fallback.
    pub partial_floor: f64,
    /// Fraction of `threshold` required by the soft fallback.
    pub partial_factor: f64,
    /// Maximum number of memoized segment results per catalog snapshot.
    pub cache_capacity: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: 70.0,
            smalltalk_floor: 30.0,
            smalltalk_margin: 30.0,
            partial_floor: 45.0,
            partial_factor: 0.7,
            cache_capacity: 2048,
        }
    }
}

/// Text preprocessing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Language code → stop-words removed before matching.
    ///
    /// The union over all languages is applied regardless of the utterance language.
    pub stopwords: BTreeMap<String, Vec<String>>,
    /// Tokens/phrases that split one utterance into several commands.
    pub separators: Vec<String>,
}

impl TextConfig {
    /// Union of every language's stop-words.
    pub fn all_stopwords(&self) -> Vec<String> {
        let mut words: Vec<String> = self
            .stopwords
            .values()
            .flatten()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        words.sort();
        words.dedup();
        words
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| (*w).to_owned()).collect::<Vec<_>>();

        let mut stopwords = BTreeMap::new();
        stopwords.insert(
            "ru".to_owned(),
            owned(&[
                "пожалуйста",
                "пжлст",
                "скажи",
                "скажи мне",
                "потом",
                "и",
                "ещё",
                "еще",
                "но",
                "так",
                "вообще",
                "иногда",
                "хорошо",
                "давай",
                "да",
            ]),
        );
        stopwords.insert(
            "en".to_owned(),
            owned(&["please", "and", "then", "say", "tell", "now", "hey", "ok"]),
        );
        stopwords.insert(
            "uz".to_owned(),
            owned(&["iltimos", "keyin", "va", "ayt", "yana"]),
        );

        Self {
            stopwords,
            separators: owned(&[
                " и ",
                " а потом ",
                " затем ",
                " потом ",
                " and then ",
                " then ",
                " and ",
                " undan keyin ",
                " keyin ",
                " yana ",
                " va ",
                ",",
                ";",
            ]),
        }
    }
}

/// A piece of text available in several languages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(pub BTreeMap<String, String>);

impl LocalizedText {
    /// Build from `(language, text)` pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(lang, text)| ((*lang).to_owned(), (*text).to_owned()))
                .collect(),
        )
    }

    /// Text for `language`, falling back to `base_language`, then to any entry.
    pub fn resolve(&self, language: &str, base_language: &str) -> &str {
        self.0
            .get(language)
            .or_else(|| self.0.get(base_language))
            .or_else(|| self.0.values().next())
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Canned replies the core produces without consulting the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Nothing in the utterance matched.
    pub not_understood: LocalizedText,
    /// Wake phrase heard while dormant, with nothing after it.
    pub acknowledge: LocalizedText,
    /// Wake phrase re-spoken while already active, with nothing after it.
    pub listening: LocalizedText,
    /// A reload meta command failed; the previous catalog stays in effect.
    pub reload_failed: LocalizedText,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            not_understood: LocalizedText::from_pairs(&[
                ("ru", "Извини, я не понял, что ты сказал."),
                ("en", "Sorry, I didn't understand that."),
                ("uz", "Kechirasiz, tushunmadim."),
            ]),
            acknowledge: LocalizedText::from_pairs(&[
                ("ru", "Слушаю вас."),
                ("en", "I'm listening."),
                ("uz", "Eshitaman."),
            ]),
            listening: LocalizedText::from_pairs(&[
                ("ru", "Да, я слушаю."),
                ("en", "Yes, I'm listening."),
                ("uz", "Ha, eshitaman."),
            ]),
            reload_failed: LocalizedText::from_pairs(&[
                ("ru", "Не удалось обновить датасет, оставляю прежний."),
                ("en", "Reload failed, keeping the previous commands."),
                ("uz", "Yangilab bo'lmadi, avvalgi buyruqlar qoldi."),
            ]),
        }
    }
}

/// Pattern catalog location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Path to the TOML pattern catalog.
    pub path: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: AssistantConfig::default_config_dir().join("commands.toml"),
        }
    }
}

impl AssistantConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails [`Self::validate`].
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::AssistantError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AssistantError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::AssistantError::Config`] describing the first bad value.
    pub fn validate(&self) -> crate::error::Result<()> {
        let m = &self.matcher;
        for (name, value) in [
            ("matcher.threshold", m.threshold),
            ("matcher.smalltalk_floor", m.smalltalk_floor),
            ("matcher.partial_floor", m.partial_floor),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(crate::error::AssistantError::Config(format!(
                    "{name} must be within 0..=100, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&m.partial_factor) {
            return Err(crate::error::AssistantError::Config(format!(
                "matcher.partial_factor must be within 0..=1, got {}",
                m.partial_factor
            )));
        }
        if self.assistant.default_language.trim().is_empty() {
            return Err(crate::error::AssistantError::Config(
                "assistant.default_language must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Directory holding `config.toml` and the default catalog.
    pub fn default_config_dir() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("jarvis")
        } else if let Some(dir) = dirs::config_dir() {
            dir.join("jarvis")
        } else {
            PathBuf::from("/tmp/jarvis-config")
        }
    }

    /// Returns the default config file path: `~/.config/jarvis/config.toml`.
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }
}
