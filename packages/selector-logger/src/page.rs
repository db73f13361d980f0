//! The page context: a parsed document plus its location, and the executor
//! seam through which collection runs are injected into it.

use async_trait::async_trait;
use scraper::Html;
use url::Url;

use crate::collect::run_collectors;
use crate::error::{CollectError, CollectResult};
use crate::rules::CollectorRow;

/// The `host + path` view of a document's location, as seen by the glob
/// matcher. Query and fragment never participate in matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Host, including a non-default port
    pub host: String,

    /// Path, always starting with `/`
    pub path: String,
}

impl Location {
    /// Derive a location from a parsed URL.
    pub fn from_url(url: &Url) -> Self {
        let host = url.host_str().unwrap_or_default();
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Self {
            host,
            path: url.path().to_string(),
        }
    }

    /// The glob target string.
    pub fn target(&self) -> String {
        format!("{}{}", self.host, self.path)
    }
}

/// A document the collection engine can run against.
#[derive(Debug)]
pub struct Document {
    html: Html,
    location: Location,
}

impl Document {
    /// Parse an HTML source fetched from `url`.
    pub fn parse(source: &str, url: &str) -> CollectResult<Self> {
        let url = Url::parse(url)
            .map_err(|e| CollectError::Fault(format!("invalid document url {url:?}: {e}")))?;
        Ok(Self {
            html: Html::parse_document(source),
            location: Location::from_url(&url),
        })
    }

    pub(crate) fn html(&self) -> &Html {
        &self.html
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

/// Runs the collection engine inside a target document's own execution
/// context. The engine has no storage or network access through this seam;
/// a run is a pure function of the document plus the input rows.
///
/// Implementations report a destroyed context or a whole-run fault as an
/// error, discarding any partially collected lines.
#[async_trait]
pub trait PageExecutor: Send + Sync {
    async fn run_collectors(&self, rows: &[CollectorRow]) -> CollectResult<Vec<String>>;
}

/// In-process executor over a fetched HTML source. Reparses per run; the
/// document tree itself is not `Send` and never crosses an await point.
pub struct HtmlExecutor {
    url: String,
    source: String,
}

impl HtmlExecutor {
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
        }
    }
}

#[async_trait]
impl PageExecutor for HtmlExecutor {
    async fn run_collectors(&self, rows: &[CollectorRow]) -> CollectResult<Vec<String>> {
        let document = Document::parse(&self.source, &self.url)?;
        Ok(run_collectors(rows, &document))
    }
}
