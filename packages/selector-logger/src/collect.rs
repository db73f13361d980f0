//! The collection engine.
//!
//! Applies parsed rules to a document in input order, extracting one output
//! line per matched node. Selector, mode, and attribute problems become
//! inline error lines in the same output stream, so the user sees them in
//! context; they never abort the run.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::glob::UrlGlob;
use crate::page::Document;
use crate::rules::{CollectorRow, Rule};

static NEWLINE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\r?\n)+").unwrap());

/// Run every enabled row against the document, in order.
///
/// Pure function of `(rows, document)`; repeated runs on an unchanged
/// document yield identical output.
pub fn run_collectors(rows: &[CollectorRow], document: &Document) -> Vec<String> {
    let mut lines = Vec::new();
    let target = document.location().target();

    for row in rows {
        if !row.enabled {
            continue;
        }
        let rule = Rule::parse(&row.value);
        if rule.is_inert() {
            continue;
        }
        if !rule.domain_glob.is_empty() {
            match UrlGlob::new(&rule.domain_glob) {
                Ok(glob) if glob.matches(&target) => {}
                // Non-matching location, or a glob the regex engine refused
                _ => continue,
            }
        }

        let selector = match Selector::parse(&rule.selector) {
            Ok(selector) => selector,
            Err(e) => {
                lines.push(format!("[selector error] {} :: {}", rule.selector, e));
                continue;
            }
        };

        for element in document.html().select(&selector) {
            match extract(element, &rule.mode) {
                Extracted::Value(value) => lines.push(flatten(&value)),
                Extracted::ErrorLine(line) => lines.push(line),
                Extracted::Skip => {}
            }
        }
    }

    lines
}

enum Extracted {
    Value(String),
    ErrorLine(String),
    Skip,
}

fn extract(element: ElementRef<'_>, mode: &str) -> Extracted {
    if mode.is_empty() {
        return Extracted::Value(element.html());
    }
    if mode == "inner" {
        return Extracted::Value(element.inner_html());
    }
    if mode == "inner:strip" {
        return Extracted::Value(element.text().collect());
    }
    if let Some(name) = mode.strip_prefix("attr:") {
        let name = name.trim();
        if name.is_empty() {
            return Extracted::ErrorLine("[attr error] missing attribute name".to_string());
        }
        return match element.value().attr(name) {
            Some(value) => Extracted::Value(value.to_string()),
            // Absent attribute: skip the node, no line
            None => Extracted::Skip,
        };
    }
    Extracted::ErrorLine(format!("[mode error] unsupported mode \"{mode}\""))
}

/// Collapse newline runs to single spaces and trim, producing one line.
fn flatten(value: &str) -> String {
    NEWLINE_RUN.replace_all(value, " ").trim().to_string()
}
