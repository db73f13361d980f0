//! The long-lived background controller.
//!
//! Owns the session store, the single shared native bridge, and the badge
//! sink. Serves the cross-context protocol for user-triggered work and
//! watches page-load completions for autonomous runs. User-triggered
//! failures surface in the response; autonomous-path failures are logged
//! and swallowed, never retried.

use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::error::{NativeResult, StoreResult};
use crate::native::bridge::{HostLauncher, NativeBridge};
use crate::normalize::normalize_url;
use crate::page::PageExecutor;
use crate::protocol::{Request, Response};
use crate::session::SessionStore;
use crate::traits::badge::Badge;
use crate::traits::kv::KvStore;

/// Background controller over its three collaborators.
pub struct Controller<K, L, B> {
    session: SessionStore<K>,
    // The one shared connection; all sends queue behind this lock
    bridge: Mutex<NativeBridge<L>>,
    badge: B,
}

impl<K, L, B> Controller<K, L, B>
where
    K: KvStore,
    L: HostLauncher,
    B: Badge,
{
    pub fn new(kv: K, launcher: L, badge: B) -> Self {
        Self {
            session: SessionStore::new(kv),
            bridge: Mutex::new(NativeBridge::new(launcher)),
            badge,
        }
    }

    /// The session state store, shared with the control surface.
    pub fn session(&self) -> &SessionStore<K> {
        &self.session
    }

    /// Dispatch an untrusted message value.
    pub async fn handle_value(&self, message: Value, executor: &dyn PageExecutor) -> Response {
        match Request::from_value(message) {
            Ok(request) => self.handle(request, executor).await,
            Err(e) => Response::error(e.to_string()),
        }
    }

    /// Serve one protocol request. User-triggered path: errors surface.
    pub async fn handle(&self, request: Request, executor: &dyn PageExecutor) -> Response {
        match request {
            Request::RunCollectors { rows } => match executor.run_collectors(&rows).await {
                Ok(result) => Response::Collected { result },
                Err(e) => Response::CollectFailed {
                    error: e.to_string(),
                },
            },
            Request::UpdateBadge => match self.update_badge().await {
                Ok(()) => Response::ok(),
                Err(e) => Response::error(e.to_string()),
            },
            Request::NativePing => {
                let mut bridge = self.bridge.lock().await;
                match bridge.connect().await {
                    Ok(()) => Response::ok(),
                    Err(e) => Response::error(e.to_string()),
                }
            }
            Request::NativeAppend { path, lines } => {
                if path.is_empty() {
                    return Response::error("Invalid payload (path/lines)");
                }
                match self.native_append(&path, &lines).await {
                    Ok(_) => Response::ok(),
                    Err(e) => Response::error(e.to_string()),
                }
            }
        }
    }

    /// Recompute the deduplicated visited count and show it.
    pub async fn update_badge(&self) -> StoreResult<()> {
        let count = self.session.visited().await?.len();
        self.badge.show_count(count).await;
        Ok(())
    }

    /// Connect (or reuse the connection) and forward one append request.
    pub async fn native_append(&self, path: &str, lines: &[String]) -> NativeResult<Value> {
        let mut bridge = self.bridge.lock().await;
        bridge.connect().await?;
        bridge
            .send(&json!({"op": "append", "path": path, "lines": lines}))
            .await
    }

    /// Autonomous collection round for one completed page load.
    ///
    /// Never surfaces an error: a torn-down page context, a store hiccup,
    /// or a missing host all end the round quietly.
    pub async fn on_page_complete(&self, url: &str, executor: &dyn PageExecutor) {
        let state = match self.session.state().await {
            Ok(state) => state,
            Err(e) => {
                tracing::debug!(error = %e, "skipping run, state unreadable");
                return;
            }
        };
        if !state.auto_run {
            return;
        }

        let url = normalize_url(url);
        let mut visited = match self.session.visited().await {
            Ok(visited) => visited,
            Err(e) => {
                tracing::debug!(error = %e, "skipping run, visited set unreadable");
                return;
            }
        };
        if state.skip_visited && visited.contains(&url) {
            tracing::debug!(url = %url, "already visited");
            return;
        }

        let lines = match executor.run_collectors(&state.rows).await {
            Ok(lines) => lines,
            // Navigation can destroy the page context mid-run; drop the
            // round, no retry
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "ignoring injection failure");
                return;
            }
        };
        tracing::info!(url = %url, lines = lines.len(), "autonomous collection completed");

        if let Err(e) = self.session.append_log(&lines).await {
            tracing::debug!(error = %e, "log append failed");
        }

        if state.enable_native && !state.file_path.is_empty() && !lines.is_empty() {
            if let Err(e) = self.native_append(&state.file_path, &lines).await {
                tracing::debug!(error = %e, "native forward failed");
            }
        }

        if state.skip_visited && !url.is_empty() {
            visited.insert(url);
            match self.session.set_visited(&visited).await {
                Ok(()) => {
                    if let Err(e) = self.update_badge().await {
                        tracing::debug!(error = %e, "badge update failed");
                    }
                }
                Err(e) => tracing::debug!(error = %e, "visited update failed"),
            }
        }
    }
}
