//! The selector-row mini-language.
//!
//! One configuration row is a pipe-delimited string of up to three fields:
//! `domainGlob|selector|mode`. With a single field the whole string is the
//! selector; with two, the first is the domain glob. From the third pipe on,
//! everything is re-joined as the mode, so a selector cannot contain a
//! literal `|` without the remainder being read as a mode. Known limitation
//! of the mini-language.

use serde::{Deserialize, Serialize};

/// One user-configured collector row as persisted in the config state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorRow {
    /// Disabled rows are skipped with no output and no error
    #[serde(default)]
    pub enabled: bool,

    /// The raw `domainGlob|selector|mode` string
    #[serde(default)]
    pub value: String,
}

impl CollectorRow {
    /// Create an enabled row from a raw value string.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            enabled: true,
            value: value.into(),
        }
    }
}

/// A parsed match rule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rule {
    /// Glob over `host + path`; empty matches every location
    pub domain_glob: String,

    /// CSS selector; a rule with an empty selector is inert
    pub selector: String,

    /// Extraction mode: empty, `inner`, `inner:strip`, or `attr:<name>`
    pub mode: String,
}

impl Rule {
    /// Parse one row value into a rule. Pure; never touches a document.
    pub fn parse(value: &str) -> Self {
        let parts: Vec<&str> = value.split('|').collect();
        match parts.len() {
            1 => Self {
                domain_glob: String::new(),
                selector: parts[0].trim().to_string(),
                mode: String::new(),
            },
            2 => Self {
                domain_glob: parts[0].trim().to_string(),
                selector: parts[1].trim().to_string(),
                mode: String::new(),
            },
            _ => Self {
                domain_glob: parts[0].trim().to_string(),
                selector: parts[1].trim().to_string(),
                mode: parts[2..].join("|").trim().to_string(),
            },
        }
    }

    /// A rule whose selector resolved to empty produces no output.
    pub fn is_inert(&self) -> bool {
        self.selector.is_empty()
    }
}
