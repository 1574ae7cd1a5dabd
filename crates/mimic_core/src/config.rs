use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{ConversationId, Entropy};

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MimicConfig {
    pub behavior: BehaviorConfig,
    pub initiator: InitiatorConfig,
    pub corpus: CorpusConfig,
    pub chats: ChatsConfig,
    pub logging: LoggingConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onebot: Option<OneBotConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be within [0, 1], got {value}")]
    Probability { field: &'static str, value: f64 },
    #[error("{field} range is invalid: min {min} / max {max}")]
    Range {
        field: &'static str,
        min: f64,
        max: f64,
    },
}

impl MimicConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied and the result validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: MimicConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Try to load from path; a missing or invalid file gives defaults plus env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({:#}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                if let Err(e) = cfg.validate() {
                    tracing::warn!("Ignoring env overrides: {}", e);
                    cfg = Self::default();
                }
                cfg
            }
        }
    }

    /// File contents only, without env overrides, for tools that rewrite the
    /// file. A missing file yields defaults.
    pub fn load_raw<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse TOML config")
    }

    /// Write the config back as TOML, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.behavior;
        check_probability("behavior.response_probability", b.response_probability)?;
        check_probability("behavior.typing_probability", b.typing_probability)?;
        check_probability("behavior.save_probability", b.save_probability)?;
        b.response_delay.check("behavior.response_delay")?;

        let i = &self.initiator;
        check_probability("initiator.probability", i.probability)?;
        check_probability("initiator.greeting_probability", i.greeting_probability)?;
        i.check_interval.check("initiator.check_interval")?;
        i.idle_threshold.check("initiator.idle_threshold")?;
        i.typing_delay.check("initiator.typing_delay")?;
        Ok(())
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MIMIC_RESPONSE_PROBABILITY") {
            if let Ok(p) = v.parse() {
                self.behavior.response_probability = p;
            }
        }
        if let Ok(v) = std::env::var("MIMIC_LEARNING_ENABLED") {
            if let Ok(flag) = v.parse() {
                self.behavior.learning_enabled = flag;
            }
        }
        if let Ok(v) = std::env::var("MIMIC_CORPUS_PATH") {
            self.corpus.path = PathBuf::from(v);
        }
        // OneBot env overrides
        if let Ok(url) = std::env::var("ONEBOT_WS_URL") {
            let token = std::env::var("ONEBOT_ACCESS_TOKEN").ok();
            self.onebot = Some(OneBotConfig {
                ws_url: url,
                access_token: token,
            });
        } else if let (Some(onebot), Ok(token)) =
            (self.onebot.as_mut(), std::env::var("ONEBOT_ACCESS_TOKEN"))
        {
            onebot.access_token = Some(token);
        }
    }
}

fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { field, value })
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

/// Upper bound for any configured delay: one week
pub const MAX_DELAY_SECS: f64 = 7.0 * 24.0 * 3600.0;

/// Inclusive range of seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: f64,
    pub max: f64,
}

impl DelayRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn check(&self, field: &'static str) -> Result<(), ConfigError> {
        if self.min >= 0.0 && self.min <= self.max && self.max <= MAX_DELAY_SECS {
            Ok(())
        } else {
            Err(ConfigError::Range {
                field,
                min: self.min,
                max: self.max,
            })
        }
    }

    /// Uniform duration within the range. Out-of-range values (an unvalidated
    /// config) are clamped to `[0, MAX_DELAY_SECS]`.
    pub fn sample<E: Entropy + ?Sized>(&self, entropy: &mut E) -> Duration {
        let secs = entropy.between(self.min, self.max);
        Duration::try_from_secs_f64(secs.clamp(0.0, MAX_DELAY_SECS))
            .unwrap_or(Duration::from_secs(MAX_DELAY_SECS as u64))
    }
}

/// How the agent reacts to incoming messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub response_probability: f64,
    pub response_delay: DelayRange,
    /// Chance of showing "typing..." before a reply
    pub typing_probability: f64,
    /// Chance of persisting the corpus after a learned message
    pub save_probability: f64,
    pub learning_enabled: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            response_probability: 0.7,
            response_delay: DelayRange::new(1.0, 5.0),
            typing_probability: 0.8,
            save_probability: 0.1,
            learning_enabled: true,
        }
    }
}

/// Unprompted messages in quiet chats
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InitiatorConfig {
    pub enabled: bool,
    /// Chance per check that an idle chat gets a message
    pub probability: f64,
    /// Chance that the unprompted message is a plain greeting
    pub greeting_probability: f64,
    pub check_interval: DelayRange,
    pub idle_threshold: DelayRange,
    pub typing_delay: DelayRange,
}

impl Default for InitiatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            probability: 0.3,
            greeting_probability: 0.5,
            check_interval: DelayRange::new(300.0, 900.0),
            idle_threshold: DelayRange::new(600.0, 3600.0),
            typing_delay: DelayRange::new(1.0, 3.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("message_data.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatsConfig {
    pub monitored: Vec<ConversationId>,
    pub greet_on_start: bool,
}

impl Default for ChatsConfig {
    fn default() -> Self {
        Self {
            monitored: Vec::new(),
            greet_on_start: true,
        }
    }
}

impl ChatsConfig {
    /// Returns false if the chat was already listed.
    pub fn add(&mut self, id: ConversationId) -> bool {
        if self.monitored.contains(&id) {
            return false;
        }
        self.monitored.push(id);
        true
    }

    /// Returns false if the chat was not listed.
    pub fn remove(&mut self, id: &ConversationId) -> bool {
        let before = self.monitored.len();
        self.monitored.retain(|c| c != id);
        self.monitored.len() != before
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log file in addition to stdout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneBotConfig {
    pub ws_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = MimicConfig::default();
        assert_eq!(cfg.behavior.response_probability, 0.7);
        assert_eq!(cfg.behavior.response_delay, DelayRange::new(1.0, 5.0));
        assert!(cfg.behavior.learning_enabled);
        assert_eq!(cfg.initiator.probability, 0.3);
        assert_eq!(cfg.corpus.path, PathBuf::from("message_data.json"));
        assert!(cfg.chats.monitored.is_empty());
        assert!(cfg.onebot.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[behavior]
response_probability = 0.25
"#;
        let cfg: MimicConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.behavior.response_probability, 0.25);
        // Defaults for unspecified fields
        assert_eq!(cfg.behavior.typing_probability, 0.8);
        assert_eq!(cfg.initiator.check_interval, DelayRange::new(300.0, 900.0));
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[behavior]
response_probability = 0.5
typing_probability = 0.9
save_probability = 0.2
learning_enabled = false
response_delay = { min = 2.0, max = 8.0 }

[initiator]
enabled = false
probability = 0.1
greeting_probability = 0.4
check_interval = { min = 60.0, max = 120.0 }
idle_threshold = { min = 30.0, max = 90.0 }
typing_delay = { min = 0.5, max = 1.5 }

[corpus]
path = "data/corpus.json"

[chats]
monitored = ["group:1001", "private:42"]
greet_on_start = false

[logging]
file = "logs/mimic.log"

[onebot]
ws_url = "ws://localhost:3001"
access_token = "secret"
"#;
        let cfg: MimicConfig = toml::from_str(toml_str).unwrap();
        assert!(!cfg.behavior.learning_enabled);
        assert_eq!(cfg.behavior.response_delay.max, 8.0);
        assert!(!cfg.initiator.enabled);
        assert_eq!(cfg.initiator.idle_threshold.min, 30.0);
        assert_eq!(cfg.corpus.path, PathBuf::from("data/corpus.json"));
        assert_eq!(cfg.chats.monitored.len(), 2);
        assert_eq!(cfg.chats.monitored[0].as_str(), "group:1001");
        assert!(!cfg.chats.greet_on_start);
        assert_eq!(cfg.logging.file, Some(PathBuf::from("logs/mimic.log")));
        let onebot = cfg.onebot.unwrap();
        assert_eq!(onebot.ws_url, "ws://localhost:3001");
        assert_eq!(onebot.access_token, Some("secret".to_string()));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = MimicConfig::default();
        cfg.behavior.response_probability = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Probability { field: "behavior.response_probability", .. })
        ));

        let mut cfg = MimicConfig::default();
        cfg.behavior.response_delay = DelayRange::new(5.0, 1.0);
        assert!(matches!(cfg.validate(), Err(ConfigError::Range { .. })));

        cfg.behavior.response_delay = DelayRange::new(1.0, 1e20);
        assert!(matches!(cfg.validate(), Err(ConfigError::Range { .. })));

        cfg.behavior.response_delay = DelayRange::new(1.0, f64::NAN);
        assert!(matches!(cfg.validate(), Err(ConfigError::Range { .. })));
    }

    #[test]
    fn test_delay_sample_stays_in_range() {
        let mut e = crate::StdEntropy::seeded(3);
        let range = DelayRange::new(1.0, 5.0);
        for _ in 0..100 {
            let d = range.sample(&mut e);
            assert!(d >= Duration::from_secs(1) && d <= Duration::from_secs(5));
        }

        // unvalidated huge bound is clamped, not a panic
        let huge = DelayRange::new(1e20, 1e20);
        assert_eq!(huge.sample(&mut e), Duration::from_secs(MAX_DELAY_SECS as u64));
    }

    #[test]
    fn test_chats_add_remove() {
        let mut chats = ChatsConfig::default();
        assert!(chats.add("group:1".into()));
        assert!(!chats.add("group:1".into()));
        assert!(chats.remove(&"group:1".into()));
        assert!(!chats.remove(&"group:1".into()));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/mimic.toml");
        let mut cfg = MimicConfig::default();
        cfg.chats.add("private:7".into());
        cfg.behavior.response_probability = 0.4;
        cfg.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let loaded: MimicConfig = toml::from_str(&text).unwrap();
        assert_eq!(loaded.chats.monitored, vec![ConversationId::from("private:7")]);
        assert_eq!(loaded.behavior.response_probability, 0.4);
    }

    #[test]
    fn test_load_raw() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("mimic.toml");
        assert!(MimicConfig::load_raw(&path).unwrap().chats.monitored.is_empty());

        std::fs::write(&path, "[chats]\nmonitored = [\"group:3\"]\n").unwrap();
        let cfg = MimicConfig::load_raw(&path).unwrap();
        assert_eq!(cfg.chats.monitored, vec![ConversationId::from("group:3")]);

        std::fs::write(&path, "[chats\n").unwrap();
        assert!(MimicConfig::load_raw(&path).is_err());
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        // Part 1: env overrides
        std::env::set_var("ONEBOT_WS_URL", "ws://example:6700");
        std::env::set_var("MIMIC_LEARNING_ENABLED", "false");

        let mut cfg = MimicConfig::default();
        cfg.apply_env_overrides();

        assert_eq!(cfg.onebot.as_ref().unwrap().ws_url, "ws://example:6700");
        assert!(!cfg.behavior.learning_enabled);

        // Clean up env vars before testing defaults
        std::env::remove_var("ONEBOT_WS_URL");
        std::env::remove_var("MIMIC_LEARNING_ENABLED");

        // Part 2: nonexistent path returns defaults (no env interference)
        let cfg = MimicConfig::load_or_default("/nonexistent/path.toml");
        assert!(cfg.behavior.learning_enabled);
        assert!(cfg.onebot.is_none());
    }
}
