//! Configuration management with YAML support

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::enrich::PassKind;
use crate::error::ConfigError;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub translator: TranslatorConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub passes: HashMap<String, PassConfig>,

    #[serde(default)]
    pub fewshot: FewShotConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub daily: DailyConfig,
}

/// Where the exported conversation files live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_root")]
    pub root: String,

    #[serde(default = "default_file_name")]
    pub file_name: String,
}

/// Run ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: String,
}

/// Azure Translator settings. Key and region come from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default = "default_translator_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// OpenAI-compatible chat completion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_classifier_model")]
    pub classifier_model: String,

    #[serde(default = "default_standalone_model")]
    pub standalone_model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Per-pass overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassConfig {
    #[serde(default)]
    pub delay_ms: Option<u64>,

    #[serde(default)]
    pub batch_size: Option<usize>,
}

/// Few-shot example set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FewShotConfig {
    #[serde(default = "default_fewshot_path")]
    pub path: String,

    #[serde(default = "default_fewshot_start")]
    pub start_date: NaiveDate,

    #[serde(default = "default_standalone_examples_path")]
    pub standalone_examples_path: String,
}

/// Non-retrieval filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub excluded_farmers: Vec<String>,
}

/// Passes run by `furrow daily`, in order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyConfig {
    #[serde(default = "default_daily_passes")]
    pub passes: Vec<PassKind>,
}

// Default value functions
fn default_data_root() -> String {
    "daily_conversation_analysis".to_string()
}

fn default_file_name() -> String {
    "conversations.json".to_string()
}

fn default_ledger_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("furrow/ledger.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "~/.local/share/furrow/ledger.db".to_string())
}

fn default_translator_endpoint() -> String {
    "https://api.cognitive.microsofttranslator.com".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_classifier_model() -> String {
    "gpt-4o".to_string()
}

fn default_standalone_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_fewshot_path() -> String {
    "daily_conversation_analysis/few_shot_examples/few_shot_examples.json".to_string()
}

fn default_fewshot_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 19).unwrap_or_default()
}

fn default_standalone_examples_path() -> String {
    "standalone_query_examples.txt".to_string()
}

fn default_daily_passes() -> Vec<PassKind> {
    vec![PassKind::Transliterate, PassKind::Classify]
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: default_data_root(),
            file_name: default_file_name(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_translator_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key_env: default_api_key_env(),
            classifier_model: default_classifier_model(),
            standalone_model: default_standalone_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for FewShotConfig {
    fn default() -> Self {
        Self {
            path: default_fewshot_path(),
            start_date: default_fewshot_start(),
            standalone_examples_path: default_standalone_examples_path(),
        }
    }
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            passes: default_daily_passes(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            ledger: LedgerConfig::default(),
            translator: TranslatorConfig::default(),
            llm: LlmConfig::default(),
            passes: HashMap::new(),
            fewshot: FewShotConfig::default(),
            filter: FilterConfig::default(),
            daily: DailyConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./furrow.yaml (current directory)
    /// 3. ~/.config/furrow/furrow.yaml
    pub fn load(path: &str) -> Result<Self> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "furrow.yaml".to_string(),
            shellexpand::tilde("~/.config/furrow/furrow.yaml").to_string(),
        ];

        for search_path in &search_paths {
            if std::path::Path::new(search_path).exists() {
                let content = std::fs::read_to_string(search_path)
                    .with_context(|| format!("Failed to read {}", search_path))?;
                let config: Config = serde_yaml::from_str(&content)
                    .with_context(|| format!("Invalid config {}", search_path))?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Get the ledger path, expanding ~ to home directory
    pub fn ledger_path(&self) -> PathBuf {
        expand(&self.ledger.path)
    }

    pub fn data_root(&self) -> PathBuf {
        expand(&self.data.root)
    }

    pub fn fewshot_path(&self) -> PathBuf {
        expand(&self.fewshot.path)
    }

    pub fn standalone_examples_path(&self) -> PathBuf {
        expand(&self.fewshot.standalone_examples_path)
    }

    /// Delay between external calls for a pass.
    /// Classification defaults to a slower pace than the translator passes.
    pub fn pass_delay(&self, kind: PassKind) -> Duration {
        let default_ms = match kind {
            PassKind::Classify => 1000,
            PassKind::Standalone => 1000,
            PassKind::Translate | PassKind::StandaloneTranslate => 200,
            PassKind::Transliterate => 1000,
        };
        let ms = self
            .passes
            .get(kind.as_str())
            .and_then(|p| p.delay_ms)
            .unwrap_or(default_ms);
        Duration::from_millis(ms)
    }

    /// Number of messages sent per backend call
    pub fn pass_batch_size(&self, kind: PassKind) -> usize {
        let default = match kind {
            PassKind::Classify => 50,
            _ => 1,
        };
        self.passes
            .get(kind.as_str())
            .and_then(|p| p.batch_size)
            .unwrap_or(default)
            .max(1)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// Secrets read from the environment. Never stored in the YAML file.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub translator_key: Option<String>,
    pub translator_region: Option<String>,
    pub translator_endpoint: Option<String>,
    pub llm_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env(config: &Config) -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            translator_key: var("AZURE_TRANSLATION_KEY"),
            translator_region: var("AZURE_TRANSLATION_REGION"),
            translator_endpoint: var("AZURE_TRANSLATION_ENDPOINT"),
            llm_api_key: var(&config.llm.api_key_env),
        }
    }

    pub fn require_translator(&self) -> Result<(&str, &str), ConfigError> {
        let key = self
            .translator_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingCredential("AZURE_TRANSLATION_KEY".into()))?;
        let region = self
            .translator_region
            .as_deref()
            .ok_or_else(|| ConfigError::MissingCredential("AZURE_TRANSLATION_REGION".into()))?;
        Ok((key, region))
    }

    pub fn require_llm(&self, config: &Config) -> Result<&str, ConfigError> {
        self.llm_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingCredential(config.llm.api_key_env.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data.file_name, "conversations.json");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(
            config.daily.passes,
            vec![PassKind::Transliterate, PassKind::Classify]
        );
        assert_eq!(config.pass_batch_size(PassKind::Classify), 50);
        assert_eq!(config.pass_batch_size(PassKind::Translate), 1);
    }

    #[test]
    fn test_pass_overrides() {
        let mut config = Config::default();
        config.passes.insert(
            "classify".to_string(),
            PassConfig {
                delay_ms: Some(10_000),
                batch_size: Some(0),
            },
        );
        assert_eq!(
            config.pass_delay(PassKind::Classify),
            Duration::from_secs(10)
        );
        // zero is clamped so the annotator always makes progress
        assert_eq!(config.pass_batch_size(PassKind::Classify), 1);
        assert_eq!(
            config.pass_delay(PassKind::Translate),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn test_missing_credentials_are_reported() {
        let config = Config::default();
        let creds = Credentials::default();
        let err = creds.require_translator().unwrap_err();
        assert!(err.to_string().contains("AZURE_TRANSLATION_KEY"));
        let err = creds.require_llm(&config).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_invalid_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("furrow.yaml");
        std::fs::write(&path, "daily:\n  passes: [weed]\n").unwrap();

        let err = Config::load(&path.to_string_lossy()).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid config"));

        std::fs::write(&path, "data:\n  root: /srv/chats\n").unwrap();
        let config = Config::load(&path.to_string_lossy()).unwrap();
        assert_eq!(config.data_root(), PathBuf::from("/srv/chats"));
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
data:
  root: ~/chats

ledger:
  path: /tmp/furrow-test.db

llm:
  base_url: https://api.sarvam.ai/v1
  standalone_model: sarvam-m

passes:
  transliterate:
    delay_ms: 200

fewshot:
  start_date: 2025-11-20

filter:
  excluded_farmers: [priyanshu, popatganore]

daily:
  passes: [standalone, classify]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.ledger_path(), PathBuf::from("/tmp/furrow-test.db"));
        assert_eq!(config.llm.standalone_model, "sarvam-m");
        assert_eq!(config.llm.classifier_model, "gpt-4o");
        assert_eq!(
            config.pass_delay(PassKind::Transliterate),
            Duration::from_millis(200)
        );
        assert_eq!(
            config.fewshot.start_date,
            NaiveDate::from_ymd_opt(2025, 11, 20).unwrap()
        );
        assert_eq!(config.filter.excluded_farmers.len(), 2);
        assert_eq!(
            config.daily.passes,
            vec![PassKind::Standalone, PassKind::Classify]
        );
    }
}
