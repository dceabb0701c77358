//! Prometheus-style relabeling of alert labels.
//!
//! A rule document is YAML holding either one rule mapping or a sequence of
//! them, using the field names of Prometheus `relabel_configs`. Unknown
//! fields are rejected. Rules run in order against the label set; `keep`,
//! `drop`, `keepequal` and `dropequal` can discard the whole set, which
//! leaves it empty. Labels with empty values are removed once all rules
//! have run.
//!
//! ```rust
//! use alertmanager_notifier::{Labels, RelabelRules};
//!
//! let rules = RelabelRules::parse(
//!     "
//! - source_labels: [namespace]
//!   target_label: team
//!   regex: 'team-(.*)'
//! ",
//! )
//! .unwrap()
//! .unwrap();
//!
//! let mut labels = Labels::new();
//! labels.insert("namespace".into(), "team-payments".into());
//!
//! let labels = rules.process(labels);
//! assert_eq!(labels.get("team").map(String::as_str), Some("payments"));
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::errors::{NotifierError, Result};
use crate::types::Labels;

const DEFAULT_SEPARATOR: &str = ";";
const DEFAULT_REGEX: &str = "(.*)";
const DEFAULT_REPLACEMENT: &str = "$1";

/// Pattern a `target_label` or `labelmap` replacement must match; allows `$1` style templates
const RELABEL_TARGET: &str = r"^(?:(?:[a-zA-Z_]|\$(?:\{\w+\}|\w+))+\w*)+$";

/// Error returned by a [`Relabeler`] that cannot rewrite a label set
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RelabelError {
    message: String,
}

impl RelabelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Rewrites a label set according to some rule set
///
/// Returns an empty label set when the rules discard it entirely.
pub trait Relabeler: Send + Sync + Debug {
    fn relabel(&self, labels: Labels) -> std::result::Result<Labels, RelabelError>;
}

/// Relabel action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Action {
    /// Set `target_label` to the expanded `replacement` when `regex` matches
    #[default]
    Replace,
    /// Discard the label set unless `regex` matches
    Keep,
    /// Discard the label set if `regex` matches
    Drop,
    /// Set `target_label` to a hash of the source value modulo `modulus`
    HashMod,
    /// Copy labels whose names match `regex` to names built from `replacement`
    LabelMap,
    /// Remove labels whose names match `regex`
    LabelDrop,
    /// Remove labels whose names do not match `regex`
    LabelKeep,
    /// Set `target_label` to the lowercased source value
    Lowercase,
    /// Set `target_label` to the uppercased source value
    Uppercase,
    /// Discard the label set unless the source value equals `target_label`'s value
    KeepEqual,
    /// Discard the label set if the source value equals `target_label`'s value
    DropEqual,
}

impl Action {
    fn as_str(&self) -> &'static str {
        match self {
            Action::Replace => "replace",
            Action::Keep => "keep",
            Action::Drop => "drop",
            Action::HashMod => "hashmod",
            Action::LabelMap => "labelmap",
            Action::LabelDrop => "labeldrop",
            Action::LabelKeep => "labelkeep",
            Action::Lowercase => "lowercase",
            Action::Uppercase => "uppercase",
            Action::KeepEqual => "keepequal",
            Action::DropEqual => "dropequal",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(Action::Replace),
            "keep" => Ok(Action::Keep),
            "drop" => Ok(Action::Drop),
            "hashmod" => Ok(Action::HashMod),
            "labelmap" => Ok(Action::LabelMap),
            "labeldrop" => Ok(Action::LabelDrop),
            "labelkeep" => Ok(Action::LabelKeep),
            "lowercase" => Ok(Action::Lowercase),
            "uppercase" => Ok(Action::Uppercase),
            "keepequal" => Ok(Action::KeepEqual),
            "dropequal" => Ok(Action::DropEqual),
            other => Err(format!("unknown relabel action {other:?}")),
        }
    }
}

impl TryFrom<String> for Action {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

/// Regular expression anchored at both ends, as relabel rules expect
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelabelRegex {
    pattern: String,
    regex: Regex,
}

impl RelabelRegex {
    pub fn new(pattern: &str) -> std::result::Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as written, without anchors
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl Default for RelabelRegex {
    fn default() -> Self {
        Self::new(DEFAULT_REGEX).expect("default relabel regex is valid")
    }
}

impl Debug for RelabelRegex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RelabelRegex({:?})", self.pattern)
    }
}

impl PartialEq for RelabelRegex {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl TryFrom<String> for RelabelRegex {
    type Error = regex::Error;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<RelabelRegex> for String {
    fn from(regex: RelabelRegex) -> Self {
        regex.pattern
    }
}

/// One relabel rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelabelConfig {
    /// Labels whose values are joined with `separator` to form the source value
    #[serde(default)]
    pub source_labels: Vec<String>,

    #[serde(default = "default_separator")]
    pub separator: String,

    #[serde(default)]
    pub regex: RelabelRegex,

    /// Required for `hashmod`
    #[serde(default)]
    pub modulus: u64,

    #[serde(default)]
    pub target_label: String,

    #[serde(default = "default_replacement")]
    pub replacement: String,

    #[serde(default)]
    pub action: Action,
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

fn default_replacement() -> String {
    DEFAULT_REPLACEMENT.to_string()
}

impl Default for RelabelConfig {
    fn default() -> Self {
        Self {
            source_labels: Vec::new(),
            separator: default_separator(),
            regex: RelabelRegex::default(),
            modulus: 0,
            target_label: String::new(),
            replacement: default_replacement(),
            action: Action::default(),
        }
    }
}

impl RelabelConfig {
    /// Check that the fields set are the ones the action needs
    pub fn validate(&self) -> std::result::Result<(), String> {
        let action = self.action;

        if action == Action::HashMod && self.modulus == 0 {
            return Err("relabel configuration for hashmod requires non-zero modulus".into());
        }

        let needs_target = matches!(
            action,
            Action::Replace
                | Action::HashMod
                | Action::Lowercase
                | Action::Uppercase
                | Action::KeepEqual
                | Action::DropEqual
        );
        if needs_target && self.target_label.is_empty() {
            return Err(format!(
                "relabel configuration for {action} action requires 'target_label' value"
            ));
        }

        let target_template = Regex::new(RELABEL_TARGET).map_err(|e| e.to_string())?;
        if action == Action::Replace && !target_template.is_match(&self.target_label) {
            return Err(format!(
                "{:?} is invalid 'target_label' for {action} action",
                self.target_label
            ));
        }

        let literal_target = matches!(
            action,
            Action::HashMod
                | Action::Lowercase
                | Action::Uppercase
                | Action::KeepEqual
                | Action::DropEqual
        );
        if literal_target && !is_valid_label_name(&self.target_label) {
            return Err(format!(
                "{:?} is invalid 'target_label' for {action} action",
                self.target_label
            ));
        }

        let case_or_equal = matches!(
            action,
            Action::Lowercase | Action::Uppercase | Action::KeepEqual | Action::DropEqual
        );
        if case_or_equal && self.replacement != DEFAULT_REPLACEMENT {
            return Err(format!("'replacement' can not be set for {action} action"));
        }

        if action == Action::LabelMap && !target_template.is_match(&self.replacement) {
            return Err(format!(
                "{:?} is invalid 'replacement' for {action} action",
                self.replacement
            ));
        }

        if matches!(action, Action::KeepEqual | Action::DropEqual)
            && (self.regex.as_str() != DEFAULT_REGEX
                || self.modulus != 0
                || self.separator != DEFAULT_SEPARATOR
                || self.replacement != DEFAULT_REPLACEMENT)
        {
            return Err(format!(
                "{action} action requires only 'source_labels' and 'target_label', and no other fields"
            ));
        }

        if matches!(action, Action::LabelDrop | Action::LabelKeep)
            && (!self.source_labels.is_empty()
                || !self.target_label.is_empty()
                || self.modulus != 0
                || self.separator != DEFAULT_SEPARATOR
                || self.replacement != DEFAULT_REPLACEMENT)
        {
            return Err(format!(
                "{action} action requires only 'regex', and no other fields"
            ));
        }

        Ok(())
    }

    /// Apply this rule in place; returns `false` if the label set is discarded
    fn apply(&self, labels: &mut Labels) -> bool {
        let value = self
            .source_labels
            .iter()
            .map(|name| labels.get(name).map(String::as_str).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(&self.separator);

        match self.action {
            Action::Drop => {
                if self.regex.is_match(&value) {
                    return false;
                }
            }
            Action::Keep => {
                if !self.regex.is_match(&value) {
                    return false;
                }
            }
            Action::DropEqual => {
                if label_value(labels, &self.target_label) == value {
                    return false;
                }
            }
            Action::KeepEqual => {
                if label_value(labels, &self.target_label) != value {
                    return false;
                }
            }
            Action::Replace => {
                let Some(captures) = self.regex.regex.captures(&value) else {
                    return true;
                };
                let mut target = String::new();
                captures.expand(&self.target_label, &mut target);
                if !is_valid_label_name(&target) {
                    return true;
                }
                let mut replaced = String::new();
                captures.expand(&self.replacement, &mut replaced);
                set_label(labels, target, replaced);
            }
            Action::Lowercase => {
                set_label(labels, self.target_label.clone(), value.to_lowercase());
            }
            Action::Uppercase => {
                set_label(labels, self.target_label.clone(), value.to_uppercase());
            }
            Action::HashMod => {
                let modulus = hash_value(&value) % self.modulus;
                set_label(labels, self.target_label.clone(), modulus.to_string());
            }
            Action::LabelMap => {
                let snapshot: Vec<(String, String)> = labels
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                for (name, value) in snapshot {
                    if self.regex.is_match(&name) {
                        let mapped = self
                            .regex
                            .regex
                            .replace_all(&name, self.replacement.as_str())
                            .into_owned();
                        set_label(labels, mapped, value);
                    }
                }
            }
            Action::LabelDrop => {
                labels.retain(|name, _| !self.regex.is_match(name));
            }
            Action::LabelKeep => {
                labels.retain(|name, _| self.regex.is_match(name));
            }
        }

        true
    }
}

fn label_value<'a>(labels: &'a Labels, name: &str) -> &'a str {
    labels.get(name).map(String::as_str).unwrap_or_default()
}

/// An empty value removes the label
fn set_label(labels: &mut Labels, name: String, value: String) {
    if value.is_empty() {
        labels.remove(&name);
    } else {
        labels.insert(name, value);
    }
}

/// Low 64 bits of the MD5 digest, big-endian
fn hash_value(value: &str) -> u64 {
    let digest = md5::compute(value.as_bytes());
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&digest.0[8..]);
    u64::from_be_bytes(tail)
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// An ordered, validated list of relabel rules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelabelRules {
    configs: Vec<RelabelConfig>,
}

impl RelabelRules {
    /// Build from already-constructed rules, validating each
    pub fn new(configs: Vec<RelabelConfig>) -> Result<Self> {
        for (index, config) in configs.iter().enumerate() {
            config
                .validate()
                .map_err(|reason| NotifierError::InvalidRelabelRule { index, reason })?;
        }
        Ok(Self { configs })
    }

    /// Parse a rule document
    ///
    /// Returns `Ok(None)` for a blank document, meaning relabeling is off.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid YAML, contains fields
    /// that are not part of a relabel rule, or a rule fails validation.
    pub fn parse(document: &str) -> Result<Option<Self>> {
        if document.trim().is_empty() {
            return Ok(None);
        }

        let value: serde_yaml::Value =
            serde_yaml::from_str(document).map_err(NotifierError::RelabelConfig)?;

        let configs = match value {
            serde_yaml::Value::Sequence(_) => serde_yaml::from_value::<Vec<RelabelConfig>>(value),
            other => serde_yaml::from_value::<RelabelConfig>(other).map(|config| vec![config]),
        }
        .map_err(NotifierError::RelabelConfig)?;

        debug!(rules = configs.len(), "Loaded relabel rules");

        Self::new(configs).map(Some)
    }

    pub fn configs(&self) -> &[RelabelConfig] {
        &self.configs
    }

    /// Run every rule in order
    ///
    /// The result is empty if a rule discarded the label set. Labels left
    /// with an empty value are removed.
    pub fn process(&self, mut labels: Labels) -> Labels {
        for config in &self.configs {
            if !config.apply(&mut labels) {
                debug!("Relabel rules discarded the label set");
                return Labels::new();
            }
        }
        labels.retain(|_, value| !value.is_empty());
        labels
    }
}

impl Relabeler for RelabelRules {
    fn relabel(&self, labels: Labels) -> std::result::Result<Labels, RelabelError> {
        Ok(self.process(labels))
    }
}
