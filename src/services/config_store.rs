// Configuration Storage Service
// Detection settings, rule lexicons and config file read/write with version backup

use crate::models::{ConfidenceThresholds, LayerWeights, RuleType, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Semantic analysis is enabled but no API key is configured")]
    MissingApiKey,
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rule_threshold")]
    pub threshold: usize,
    #[serde(default)]
    pub severity: Severity,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_rule_threshold(),
            severity: Severity::Medium,
        }
    }
}

impl RuleConfig {
    pub fn new(threshold: usize, severity: Severity) -> Self {
        Self { enabled: true, threshold, severity }
    }
}

/// Word lists and patterns the detectors scan for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Lexicon {
    pub high_frequency_words: Vec<String>,
    pub sentence_starters: Vec<String>,
    /// Regular expressions; entries that fail to compile are skipped.
    pub false_range_patterns: Vec<String>,
    pub utm_markers: Vec<String>,
    pub ghost_markers: Vec<String>,
    pub placeholder_dates: Vec<String>,
    /// Regular expressions; entries that fail to compile are skipped.
    pub markdown_patterns: Vec<String>,
    pub knowledge_cutoff_phrases: Vec<String>,
    pub collaborative_phrases: Vec<String>,
    pub first_person_pronouns: Vec<String>,
    pub emotional_words: Vec<String>,
    pub uncertainty_markers: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            high_frequency_words: strings(&[
                "crucial", "pivotal", "vital", "groundbreaking", "revolutionary", "profound",
                "significant", "关键", "至关重要", "革命性", "突破性",
            ]),
            sentence_starters: strings(&["Additionally", "Furthermore", "Moreover", "此外", "另外", "而且"]),
            false_range_patterns: strings(&[
                r"(?i)\bfrom\s+[^,.;!?\n]+?\s+to\s+\w+",
                r"从[^，。,.;；!?！？\n]+?到[^，。,.;；!?！？\n]+",
            ]),
            utm_markers: strings(&["utm_source=chatgpt.com", "utm_source=openai"]),
            ghost_markers: strings(&["contentReference[oaicite:", "[oai_citation:", "turn0search"]),
            placeholder_dates: strings(&["2025-XX-XX", "YYYY-MM-DD", "20XX"]),
            markdown_patterns: strings(&[
                r"(?m)^#{1,6}",
                r"\*\*[^*\n]+\*\*",
                r"\[[^\]\n]+\]\([^)\s]+\)",
                r"```",
            ]),
            knowledge_cutoff_phrases: strings(&[
                "As of my last knowledge update",
                "As of my training data",
                "截至我的知识更新",
                "根据我的训练数据",
            ]),
            collaborative_phrases: strings(&[
                "I hope this helps",
                "Let me know if",
                "Feel free to",
                "希望这能帮到你",
                "如果需要",
                "随时告诉我",
            ]),
            first_person_pronouns: strings(&["I", "me", "my", "mine", "我", "我的"]),
            emotional_words: strings(&["feel", "think", "believe", "hope", "感觉", "认为", "相信", "希望"]),
            uncertainty_markers: strings(&["might", "maybe", "perhaps", "possibly", "可能", "也许", "或许"]),
        }
    }
}

/// Maximum points per scoring dimension. Conventionally sums to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DimensionWeights {
    pub vocabulary_diversity: f64,
    pub sentence_complexity: f64,
    pub personalization: f64,
    pub logical_coherence: f64,
    pub emotional_authenticity: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            vocabulary_diversity: 20.0,
            sentence_complexity: 15.0,
            personalization: 25.0,
            logical_coherence: 20.0,
            emotional_authenticity: 20.0,
        }
    }
}

impl DimensionWeights {
    pub fn total(&self) -> f64 {
        self.vocabulary_diversity
            + self.sentence_complexity
            + self.personalization
            + self.logical_coherence
            + self.emotional_authenticity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultimodalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub enable_statistics: bool,
    #[serde(default)]
    pub enable_semantic: bool,
    /// Gate the costlier layers on the confidence of the cheaper ones.
    #[serde(default = "default_true")]
    pub tiered_trigger: bool,
    #[serde(default)]
    pub weights: LayerWeights,
    #[serde(default)]
    pub confidence_thresholds: ConfidenceThresholds,
}

impl Default for MultimodalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            enable_statistics: true,
            enable_semantic: false,
            tiered_trigger: true,
            weights: LayerWeights::default(),
            confidence_thresholds: ConfidenceThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based), capped at `max_backoff_ms`.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let exp = attempt.saturating_sub(1) as i32;
        let delay = self.initial_backoff_ms as f64 * self.multiplier.max(1.0).powi(exp);
        (delay as u64).min(self.max_backoff_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl(),
            max_entries: default_cache_entries(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            model: default_model(),
            endpoint: default_endpoint(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl SemanticConfig {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Fill the key and enabled flag from the environment when unset.
    pub fn apply_env(&mut self) {
        if self.api_key().is_none() {
            self.api_key = ["GEMINI_API_KEY", "HUMANSCORE_GEMINI_API_KEY"]
                .iter()
                .filter_map(|k| env::var(k).ok())
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty());
        }
        if let Ok(flag) = env::var("GEMINI_ENABLED") {
            self.enabled = matches!(flag.trim(), "1" | "true" | "TRUE" | "True");
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.api_key().is_none() {
            return Err(ConfigError::MissingApiKey);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} outside [0, 2]",
                self.temperature
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeoutSecs must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_rules")]
    pub rules: BTreeMap<RuleType, RuleConfig>,
    #[serde(default)]
    pub lexicon: Lexicon,
    #[serde(default)]
    pub scoring: DimensionWeights,
    #[serde(default)]
    pub multimodal: MultimodalConfig,
    #[serde(default)]
    pub semantic: SemanticConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            rules: default_rules(),
            lexicon: Lexicon::default(),
            scoring: DimensionWeights::default(),
            multimodal: MultimodalConfig::default(),
            semantic: SemanticConfig::default(),
        }
    }
}

impl AppConfig {
    /// Settings for one rule; a rule absent from the map runs with threshold 1.
    pub fn rule(&self, rule_type: RuleType) -> RuleConfig {
        self.rules.get(&rule_type).copied().unwrap_or_default()
    }

    pub fn is_rule_enabled(&self, rule_type: RuleType) -> bool {
        self.rule(rule_type).enabled
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = self.multimodal.weights;
        if [weights.rule, weights.statistics, weights.semantic]
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(ConfigError::Invalid("layer weights must be non-negative".to_string()));
        }
        if self.multimodal.enabled && self.multimodal.enable_semantic {
            self.semantic.validate()?;
        }
        Ok(())
    }
}

fn default_true() -> bool { true }
fn default_rule_threshold() -> usize { 1 }
fn default_version() -> String { "1.0.0".to_string() }
fn default_max_attempts() -> u32 { 3 }
fn default_initial_backoff_ms() -> u64 { 1_000 }
fn default_max_backoff_ms() -> u64 { 30_000 }
fn default_backoff_multiplier() -> f64 { 2.0 }
fn default_cache_ttl() -> u64 { 3_600 }
fn default_cache_entries() -> usize { 1_000 }
fn default_model() -> String { "gemini-pro".to_string() }
fn default_endpoint() -> String { "https://generativelanguage.googleapis.com/v1beta".to_string() }
fn default_temperature() -> f64 { 0.3 }
fn default_max_tokens() -> u32 { 500 }
fn default_timeout_secs() -> u64 { 30 }

pub fn default_rules() -> BTreeMap<RuleType, RuleConfig> {
    use RuleType::*;
    use Severity::*;
    BTreeMap::from([
        (HighFrequencyWords, RuleConfig::new(3, High)),
        (SentenceStarters, RuleConfig::new(5, High)),
        (FalseRange, RuleConfig::new(2, Medium)),
        (CitationAnomaly, RuleConfig::new(1, Critical)),
        (EmDashDensity, RuleConfig::new(5, Medium)),
        (MarkdownResidue, RuleConfig::new(3, High)),
        (EmojiAnomaly, RuleConfig::new(5, Medium)),
        (KnowledgeCutoff, RuleConfig::new(1, Critical)),
        (CollaborativeTone, RuleConfig::new(3, High)),
        (Perfectionism, RuleConfig::new(5, High)),
    ])
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("humanscore"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir)?;
        Ok(())
    }

    /// Load configuration from file; a missing file yields the defaults.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_file.exists() {
            info!("[CONFIG] No config at {}, using defaults", self.config_file.display());
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        info!("[CONFIG] Loaded config version {} from {}", config.version, self.config_file.display());
        Ok(config)
    }

    /// Load the file, then overlay environment settings for the semantic layer.
    pub fn load_with_env(&self) -> Result<AppConfig, ConfigError> {
        let mut config = self.load()?;
        config.semantic.apply_env();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        self.ensure_dir()?;

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_file, content)?;
        Ok(())
    }

    /// Create a backup of current config
    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));
        fs::copy(&self.config_file, &backup_file)?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10)
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), ConfigError> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        entries.sort_by_key(|e| e.file_name());

        let remove_count = entries.len() - keep;
        for entry in entries.iter().take(remove_count) {
            if let Err(e) = fs::remove_file(entry.path()) {
                warn!("[CONFIG] Failed to remove old backup {}: {}", entry.path().display(), e);
            }
        }

        Ok(())
    }
}
