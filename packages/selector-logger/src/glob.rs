//! Domain/path glob matching.
//!
//! `*` matches any run of characters; everything else is literal. The
//! compiled pattern is anchored at both ends and tested against
//! `host + path` of the current location (query and fragment excluded).

use regex::Regex;

/// A compiled `*`-wildcard pattern.
#[derive(Debug, Clone)]
pub struct UrlGlob {
    pattern: Regex,
}

impl UrlGlob {
    /// Compile a glob. Callers treat an empty glob as match-all and never
    /// compile it.
    pub fn new(glob: &str) -> Result<Self, regex::Error> {
        let escaped = regex::escape(glob).replace("\\*", ".*");
        let pattern = Regex::new(&format!("^{escaped}$"))?;
        Ok(Self { pattern })
    }

    /// Test a `host + path` target string.
    pub fn matches(&self, target: &str) -> bool {
        self.pattern.is_match(target)
    }
}
