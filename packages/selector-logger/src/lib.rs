//! Selector-row collection with session state and native-host forwarding.
//!
//! Scans a document for elements matching configurable CSS selector rows,
//! extracts content in one of several modes, and keeps visited-URL dedup
//! state, a bounded log, and a persistent native-process connection
//! consistent across three independently scheduled contexts: a long-lived
//! background controller, a short-lived page-injected collector, and a
//! user-facing control surface.
//!
//! # Row mini-language
//!
//! One row is `domainGlob|selector|mode`:
//!
//! ```
//! use selector_logger::Rule;
//!
//! let rule = Rule::parse("example.com*|.headline|attr:data-id");
//! assert_eq!(rule.domain_glob, "example.com*");
//! assert_eq!(rule.selector, ".headline");
//! assert_eq!(rule.mode, "attr:data-id");
//! ```
//!
//! # Modules
//!
//! - [`rules`] - The pipe-delimited row mini-language
//! - [`glob`] - `*`-wildcard matching over `host + path`
//! - [`collect`] - The collection engine, run inside the page context
//! - [`page`] - Documents, locations, and the page-executor seam
//! - [`session`] - Config state, visited set, bounded log
//! - [`native`] - Length-prefixed JSON bridge to the host process
//! - [`protocol`] - Typed cross-context messages
//! - [`controller`] - The background controller
//! - [`testing`] - Mock collaborators

pub mod collect;
pub mod controller;
pub mod error;
pub mod glob;
pub mod native;
pub mod normalize;
pub mod page;
pub mod protocol;
pub mod rules;
pub mod session;
pub mod stores;
pub mod testing;
pub mod traits;

// Re-export core types at crate root
pub use collect::run_collectors;
pub use controller::Controller;
pub use error::{
    CollectError, ControllerError, NativeError, StoreError, WireError,
};
pub use glob::UrlGlob;
pub use native::{
    ConnectionState, HostHandle, HostLauncher, NativeBridge, ProcessLauncher, HOST_NAME,
    SEND_GRACE,
};
pub use normalize::normalize_url;
pub use page::{Document, HtmlExecutor, Location, PageExecutor};
pub use protocol::{Request, Response};
pub use rules::{CollectorRow, Rule};
pub use session::{ConfigState, SessionStore, LOG_KEY, MAX_LOG_LINES, STATE_KEY, VISITED_KEY};
pub use stores::MemoryKv;
pub use traits::{Badge, KvStore};
