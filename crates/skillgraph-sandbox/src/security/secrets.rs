//! Secret classification, display masking and output redaction.
//!
//! Redaction targets values, never names: a variable name may be disclosed, its value
//! may not leave the executing process.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use skillgraph_core::config::{AppConfig, SecurityConfig, DEFAULT_SECRET_PATTERNS};
use skillgraph_core::{Error, Result};

/// Replaces secret values in read-style responses.
pub const MASK_PLACEHOLDER: &str = "<SECRET>";

/// Replaces secret values found in captured output.
pub const REDACTION_PLACEHOLDER: &str = "<REDACTED>";

/// A variable map split into public and secret parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
    pub public: BTreeMap<String, String>,
    pub secret_names: Vec<String>,
    pub secret_values: BTreeMap<String, String>,
}

/// Decides which variable names are secrets.
#[derive(Debug, Clone)]
pub struct SecretClassifier {
    patterns: Vec<Regex>,
}

impl SecretClassifier {
    /// Compile `patterns` case-insensitively. Plain globs such as `SECRET_*` are accepted
    /// alongside regexes.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| compile_pattern(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn from_config(cfg: &SecurityConfig) -> Result<Self> {
        Self::new(&cfg.secret_patterns)
    }

    pub fn with_defaults() -> Self {
        Self {
            patterns: DEFAULT_SECRET_PATTERNS
                .iter()
                .filter_map(|p| compile_pattern(p).ok())
                .collect(),
        }
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    pub fn is_secret(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(name))
    }

    /// Every name lands on exactly one side.
    pub fn classify(&self, variables: &BTreeMap<String, String>) -> Classified {
        let mut out = Classified::default();
        for (name, value) in variables {
            if self.is_secret(name) {
                out.secret_names.push(name.clone());
                out.secret_values.insert(name.clone(), value.clone());
            } else {
                out.public.insert(name.clone(), value.clone());
            }
        }
        out
    }
}

/// Process-wide classifier built once from `SKILLGRAPH_SECRET_PATTERNS` (or the defaults).
///
/// Invalid configured patterns fall back to the defaults with a warning.
pub fn default_classifier() -> &'static SecretClassifier {
    static DEFAULT: OnceLock<SecretClassifier> = OnceLock::new();
    DEFAULT.get_or_init(|| {
        let mut cfg = AppConfig::default();
        cfg.apply_env_overrides();
        SecretClassifier::from_config(&cfg.security).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid secret patterns, using defaults");
            SecretClassifier::with_defaults()
        })
    })
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains('*')
        && pattern
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '*')
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    let source = if is_glob(pattern) {
        let body: Vec<String> = pattern
            .split('*')
            .map(regex::escape)
            .collect();
        format!("^{}$", body.join(".*"))
    } else {
        pattern.to_string()
    };
    RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::Config(format!("invalid secret pattern '{}': {}", pattern, e)))
}

/// Copy of `variables` with every name in `secret_names` masked.
pub fn mask_for_display<S: AsRef<str>>(
    variables: &BTreeMap<String, String>,
    secret_names: &[S],
) -> BTreeMap<String, String> {
    variables
        .iter()
        .map(|(name, value)| {
            let masked = secret_names.iter().any(|s| s.as_ref() == name);
            let shown = if masked { MASK_PLACEHOLDER } else { value.as_str() };
            (name.clone(), shown.to_string())
        })
        .collect()
}

/// Replace every literal occurrence of every non-empty secret value.
///
/// Single left-to-right pass that prefers the longest value at each position, so the
/// result does not depend on the order of `secret_values`.
pub fn redact_from_text<S: AsRef<str>>(text: &str, secret_values: &[S]) -> String {
    let mut secrets: Vec<&str> = secret_values
        .iter()
        .map(|s| s.as_ref())
        .filter(|s| !s.is_empty())
        .collect();
    if secrets.is_empty() || text.is_empty() {
        return text.to_string();
    }
    secrets.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    secrets.dedup();

    let alternation = secrets
        .iter()
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|");
    match Regex::new(&alternation) {
        Ok(re) => re.replace_all(text, REDACTION_PLACEHOLDER).into_owned(),
        Err(e) => {
            tracing::debug!(error = %e, "secret alternation too large, redacting sequentially");
            secrets
                .iter()
                .fold(text.to_string(), |acc, s| acc.replace(*s, REDACTION_PLACEHOLDER))
        }
    }
}

/// `redact_from_text` applied to every string inside a JSON value, keys included.
pub fn redact_value<S: AsRef<str>>(value: &Value, secret_values: &[S]) -> Value {
    match value {
        Value::String(s) => Value::String(redact_from_text(s, secret_values)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| redact_value(item, secret_values))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (redact_from_text(k, secret_values), redact_value(v, secret_values)))
                .collect(),
        ),
        other => other.clone(),
    }
}
