//! Configuration module for the learning-content pipeline.
//!
//! Recognized options are loaded from environment variables. App-specific
//! options are namespaced under `CORTEX_*` (the `DATABASE_URL` exception
//! matches platform convention); any `CORTEX_*` variable that is not on the
//! recognized list fails startup with a listed-suggestions error instead of
//! being silently ignored (spec §9, "Dynamic config").

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
    #[error("Unrecognized configuration key {key}{suggestion}")]
    UnknownKey { key: String, suggestion: String },
}

/// Per-collection identifier for an external source (e.g. a Notion database id).
pub type CollectionId = String;

/// Question-type quota targets for the Interleaver (§4.J).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TypeQuotas {
    pub mcq: f32,
    pub true_false: f32,
    pub parsons: f32,
    pub matching: f32,
}

impl Default for TypeQuotas {
    fn default() -> Self {
        Self {
            mcq: 0.35,
            true_false: 0.25,
            parsons: 0.25,
            matching: 0.15,
        }
    }
}

/// Minimum-per-type floors enforced by the Interleaver when content permits.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TypeMinimums {
    pub mcq: usize,
    pub true_false: usize,
    pub parsons: usize,
    pub matching: usize,
}

impl Default for TypeMinimums {
    fn default() -> Self {
        Self {
            mcq: 2,
            true_false: 2,
            parsons: 2,
            matching: 1,
        }
    }
}

/// Quality Analyzer thresholds (§4.E). Defaults are the evidence-defaults
/// the spec documents.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QualityThresholds {
    pub front_optimal_words: usize,
    pub front_warn_words: usize,
    pub front_max_words: usize,
    pub back_optimal_words: usize,
    pub back_warn_words: usize,
    pub back_max_words: usize,
    pub back_max_chars: usize,
    pub mode: QualityMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMode {
    Relaxed,
    Strict,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            front_optimal_words: 15,
            front_warn_words: 20,
            front_max_words: 25,
            back_optimal_words: 5,
            back_warn_words: 15,
            back_max_words: 15,
            back_max_chars: 120,
            mode: QualityMode::Relaxed,
        }
    }
}

/// Token-bucket rate limit for a single external API.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimit {
    pub requests_per_second: f64,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Notion integration token.
    pub notion_api_key: String,
    /// Per-collection Notion database ids, keyed by our internal collection name.
    pub notion_collections: HashMap<String, CollectionId>,
    /// AnkiConnect JSON-RPC endpoint, e.g. `http://127.0.0.1:8765`.
    pub ankiconnect_url: String,
    /// Generative LLM API key used by the Rewriter (§4.G).
    pub llm_api_key: String,
    /// Generative LLM model identifier.
    pub llm_model: String,
    /// Notion API rate limit (default: 3 req/s per §4.B).
    pub notion_rate_limit: RateLimit,
    /// Quality Analyzer thresholds and mode.
    pub quality: QualityThresholds,
    /// Session interleaving quotas.
    pub type_quotas: TypeQuotas,
    /// Session interleaving minimums.
    pub type_minimums: TypeMinimums,
    /// Fuzzy duplicate similarity threshold (§4.F, default 0.85).
    pub duplicate_fuzzy_threshold: f64,
    /// FSRS target retention (§4.I, default 0.90; §9 open question: kept configurable).
    pub fsrs_target_retention: f32,
    /// Background sync interval.
    pub sync_interval: Duration,
    /// Write-protection flag (§4.A). Defaults to on; vetoes all mutating Notion calls.
    pub write_protection: bool,
    /// Global dry-run flag; individual CLI/HTTP calls may still override per-request.
    pub dry_run: bool,
    /// `tracing` log level filter, e.g. "info,sqlx=warn".
    pub log_level: String,
    /// Optional log file path; stdout when unset.
    pub log_path: Option<String>,
    /// HTTP bind address ("host:port").
    pub bind_address: String,
    /// Shared admin key gating observability endpoints. Empty disables them.
    pub admin_api_key: String,
}

/// All recognized `CORTEX_*` suffixes (i.e. without the `CORTEX_` prefix).
/// `DATABASE_URL` is recognized un-prefixed for platform convention.
const RECOGNIZED_KEYS: &[&str] = &[
    "NOTION_API_KEY",
    "NOTION_COLLECTIONS",
    "ANKICONNECT_URL",
    "LLM_API_KEY",
    "LLM_MODEL",
    "NOTION_RATE_LIMIT_RPS",
    "QUALITY_MODE",
    "QUALITY_FRONT_OPTIMAL_WORDS",
    "QUALITY_FRONT_WARN_WORDS",
    "QUALITY_FRONT_MAX_WORDS",
    "QUALITY_BACK_OPTIMAL_WORDS",
    "QUALITY_BACK_WARN_WORDS",
    "QUALITY_BACK_MAX_WORDS",
    "QUALITY_BACK_MAX_CHARS",
    "TYPE_QUOTA_MCQ",
    "TYPE_QUOTA_TF",
    "TYPE_QUOTA_PARSONS",
    "TYPE_QUOTA_MATCHING",
    "TYPE_MIN_MCQ",
    "TYPE_MIN_TF",
    "TYPE_MIN_PARSONS",
    "TYPE_MIN_MATCHING",
    "DUPLICATE_FUZZY_THRESHOLD",
    "FSRS_TARGET_RETENTION",
    "SYNC_INTERVAL_SECONDS",
    "WRITE_PROTECTION",
    "DRY_RUN",
    "LOG_LEVEL",
    "LOG_PATH",
    "BIND_ADDRESS",
    "ADMIN_API_KEY",
];

impl AppConfig {
    /// Load and validate configuration from environment variables.
    ///
    /// Refuses to start if a `CORTEX_*` variable is set that isn't on
    /// [`RECOGNIZED_KEYS`] (§9 "Dynamic config"), suggesting the closest
    /// recognized key by edit distance.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        reject_unknown_keys()?;

        Ok(Self {
            database_url: env_var("DATABASE_URL")?,
            notion_api_key: env_var_or("NOTION_API_KEY", ""),
            notion_collections: parse_collections(&env_var_or("NOTION_COLLECTIONS", "")),
            ankiconnect_url: env_var_or("ANKICONNECT_URL", "http://127.0.0.1:8765"),
            llm_api_key: env_var_or("LLM_API_KEY", ""),
            llm_model: env_var_or("LLM_MODEL", "claude-sonnet"),
            notion_rate_limit: RateLimit {
                requests_per_second: parse_f64_or("NOTION_RATE_LIMIT_RPS", 3.0)?,
            },
            quality: QualityThresholds {
                front_optimal_words: parse_usize_or("QUALITY_FRONT_OPTIMAL_WORDS", 15)?,
                front_warn_words: parse_usize_or("QUALITY_FRONT_WARN_WORDS", 20)?,
                front_max_words: parse_usize_or("QUALITY_FRONT_MAX_WORDS", 25)?,
                back_optimal_words: parse_usize_or("QUALITY_BACK_OPTIMAL_WORDS", 5)?,
                back_warn_words: parse_usize_or("QUALITY_BACK_WARN_WORDS", 15)?,
                back_max_words: parse_usize_or("QUALITY_BACK_MAX_WORDS", 15)?,
                back_max_chars: parse_usize_or("QUALITY_BACK_MAX_CHARS", 120)?,
                mode: parse_quality_mode(&env_var_or("QUALITY_MODE", "relaxed"))?,
            },
            type_quotas: TypeQuotas {
                mcq: parse_f32_or("TYPE_QUOTA_MCQ", 0.35)?,
                true_false: parse_f32_or("TYPE_QUOTA_TF", 0.25)?,
                parsons: parse_f32_or("TYPE_QUOTA_PARSONS", 0.25)?,
                matching: parse_f32_or("TYPE_QUOTA_MATCHING", 0.15)?,
            },
            type_minimums: TypeMinimums {
                mcq: parse_usize_or("TYPE_MIN_MCQ", 2)?,
                true_false: parse_usize_or("TYPE_MIN_TF", 2)?,
                parsons: parse_usize_or("TYPE_MIN_PARSONS", 2)?,
                matching: parse_usize_or("TYPE_MIN_MATCHING", 1)?,
            },
            duplicate_fuzzy_threshold: parse_f64_or("DUPLICATE_FUZZY_THRESHOLD", 0.85)?,
            fsrs_target_retention: parse_f32_or("FSRS_TARGET_RETENTION", 0.90)?,
            sync_interval: Duration::from_secs(parse_u64_or("SYNC_INTERVAL_SECONDS", 3600)?),
            write_protection: parse_bool_or("WRITE_PROTECTION", true)?,
            dry_run: parse_bool_or("DRY_RUN", false)?,
            log_level: env_var_or("LOG_LEVEL", "info,sqlx=warn"),
            log_path: env::var("CORTEX_LOG_PATH").ok(),
            bind_address: env_var_or("BIND_ADDRESS", "0.0.0.0:8080"),
            admin_api_key: env_var_or("ADMIN_API_KEY", ""),
        })
    }
}

fn prefixed(name: &str) -> String {
    if name == "DATABASE_URL" {
        name.to_string()
    } else {
        format!("CORTEX_{name}")
    }
}

fn env_var(name: &str) -> Result<String, ConfigError> {
    let key = prefixed(name);
    env::var(&key).map_err(|_| ConfigError::MissingVar(key))
}

fn env_var_or(name: &str, default: &str) -> String {
    env::var(prefixed(name)).unwrap_or_else(|_| default.to_string())
}

fn parse_usize_or(name: &str, default: usize) -> Result<usize, ConfigError> {
    parse_or(name, default)
}

fn parse_u64_or(name: &str, default: u64) -> Result<u64, ConfigError> {
    parse_or(name, default)
}

fn parse_f32_or(name: &str, default: f32) -> Result<f32, ConfigError> {
    parse_or(name, default)
}

fn parse_f64_or(name: &str, default: f64) -> Result<f64, ConfigError> {
    parse_or(name, default)
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(prefixed(name)) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(prefixed(name), raw)),
    }
}

fn parse_bool_or(name: &str, default: bool) -> Result<bool, ConfigError> {
    match env::var(prefixed(name)) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(prefixed(name), raw)),
        },
    }
}

fn parse_quality_mode(raw: &str) -> Result<QualityMode, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "relaxed" => Ok(QualityMode::Relaxed),
        "strict" => Ok(QualityMode::Strict),
        other => Err(ConfigError::InvalidValue(
            prefixed("QUALITY_MODE"),
            other.to_string(),
        )),
    }
}

/// Parses `name=database_id,name2=database_id2` into a collection map.
fn parse_collections(raw: &str) -> HashMap<String, CollectionId> {
    raw.split(',')
        .filter_map(|pair| {
            let (name, id) = pair.split_once('=')?;
            let name = name.trim();
            let id = id.trim();
            if name.is_empty() || id.is_empty() {
                None
            } else {
                Some((name.to_string(), id.to_string()))
            }
        })
        .collect()
}

/// Walks every `CORTEX_*` environment variable and rejects the startup if any
/// of them isn't a recognized key, naming the closest recognized suggestion.
fn reject_unknown_keys() -> Result<(), ConfigError> {
    for (key, _) in env::vars() {
        let Some(suffix) = key.strip_prefix("CORTEX_") else {
            continue;
        };
        if RECOGNIZED_KEYS.contains(&suffix) {
            continue;
        }
        let suggestion = closest_key(suffix)
            .map(|s| format!(" (did you mean CORTEX_{s}?)"))
            .unwrap_or_default();
        return Err(ConfigError::UnknownKey {
            key: key.clone(),
            suggestion,
        });
    }
    Ok(())
}

/// Finds the recognized key with the smallest edit distance to `key`.
fn closest_key(key: &str) -> Option<&'static str> {
    RECOGNIZED_KEYS
        .iter()
        .map(|&candidate| (candidate, edit_distance(key, candidate)))
        .min_by_key(|(_, dist)| *dist)
        .map(|(candidate, _)| candidate)
}

/// Levenshtein distance, used only to produce a helpful suggestion.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for i in 1..=a.len() {
        let mut prev_diag = row[0];
        row[0] = i;
        for j in 1..=b.len() {
            let tmp = row[j];
            row[j] = if a[i - 1] == b[j - 1] {
                prev_diag
            } else {
                1 + prev_diag.min(row[j]).min(row[j - 1])
            };
            prev_diag = tmp;
        }
    }

    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_or_uses_default() {
        let val = env_var_or("NON_EXISTENT_VAR_12345", "default_value");
        assert_eq!(val, "default_value");
    }

    #[test]
    fn test_parse_collections() {
        let map = parse_collections("flashcards=abc123, anki_export = def456");
        assert_eq!(map.get("flashcards").map(String::as_str), Some("abc123"));
        assert_eq!(map.get("anki_export").map(String::as_str), Some("def456"));
    }

    #[test]
    fn test_parse_collections_empty() {
        assert!(parse_collections("").is_empty());
    }

    #[test]
    fn test_edit_distance_identical() {
        assert_eq!(edit_distance("LOG_LEVEL", "LOG_LEVEL"), 0);
    }

    #[test]
    fn test_closest_key_suggests_typo() {
        // Missing a letter relative to LOG_LEVEL
        assert_eq!(closest_key("LOG_LEVL"), Some("LOG_LEVEL"));
    }

    #[test]
    fn test_quality_mode_parses_case_insensitively() {
        assert_eq!(parse_quality_mode("STRICT").unwrap(), QualityMode::Strict);
        assert_eq!(
            parse_quality_mode("Relaxed").unwrap(),
            QualityMode::Relaxed
        );
    }

    #[test]
    fn test_quality_mode_rejects_unknown() {
        assert!(parse_quality_mode("yolo").is_err());
    }

    #[test]
    fn test_bool_parsing_accepts_common_spellings() {
        // SAFETY (test-only): no other test in this process reads this var concurrently.
        unsafe {
            env::set_var("CORTEX_DRY_RUN", "yes");
        }
        assert!(parse_bool_or("DRY_RUN", false).unwrap());
        unsafe {
            env::remove_var("CORTEX_DRY_RUN");
        }
    }

    #[test]
    fn test_type_quotas_default_sums_to_one() {
        let q = TypeQuotas::default();
        let sum = q.mcq + q.true_false + q.parsons + q.matching;
        assert!((sum - 1.0).abs() < 0.001);
    }
}
