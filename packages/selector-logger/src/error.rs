//! Typed errors for the selector-logger library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors raised while running the collection engine in a page context.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Uncaught fault during a collection run. Partial output is discarded.
    #[error("collection fault: {0}")]
    Fault(String),

    /// The page context was torn down before the run completed
    /// (navigation away, tab closed).
    #[error("page context destroyed")]
    ContextDestroyed,
}

/// Errors raised by the session state store or its key-value backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing key-value store failed
    #[error("storage error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A persisted record did not round-trip through JSON
    #[error("record serialization error: {0}")]
    Record(#[from] serde_json::Error),
}

/// Errors on the framed native-messaging pipe.
#[derive(Debug, Error)]
pub enum WireError {
    /// Peer closed the pipe cleanly between frames
    #[error("pipe closed")]
    Closed,

    /// Read or write on the pipe failed
    #[error("pipe I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame payload was not valid JSON
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Length prefix exceeds [`crate::native::wire::MAX_FRAME_LEN`]
    #[error("frame of {len} bytes exceeds maximum")]
    Oversize { len: usize },
}

/// Errors raised by the native bridge.
#[derive(Debug, Error)]
pub enum NativeError {
    /// The host could not be launched at all
    #[error("native host \"{host}\" not found or not permitted")]
    HostNotFound { host: String },

    /// The host went away, either before the connection settled or mid-send
    #[error("native host disconnected: {reason}")]
    HostDisconnected { reason: String },

    /// `send` was called without an open connection
    #[error("no native port")]
    NoConnection,

    /// The host answered `{ok:false}` with an error
    #[error("native host rejected request: {reason}")]
    HostRejected { reason: String },

    /// Outbound message could not be encoded
    #[error("message encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors surfaced by the background controller to message callers.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Malformed cross-context message; surfaced immediately, no retry
    #[error("invalid payload: {reason}")]
    InvalidPayload { reason: String },

    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Native(#[from] NativeError),
}

/// Result type alias for collection runs.
pub type CollectResult<T> = std::result::Result<T, CollectError>;

/// Result type alias for session store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for the frame codec.
pub type WireResult<T> = std::result::Result<T, WireError>;

/// Result type alias for native bridge operations.
pub type NativeResult<T> = std::result::Result<T, NativeError>;

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, ControllerError>;
