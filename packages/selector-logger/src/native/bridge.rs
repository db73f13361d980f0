//! Connection manager for the native host pipe.
//!
//! At most one physical connection exists at a time. `connect` is a no-op
//! when a connection is already open; `send` supports one outstanding
//! request, correlated as the next frame received once replies owed to
//! timed-out sends are drained. The bridge never retries on its own.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;

use crate::error::{NativeError, NativeResult, WireError};
use crate::native::wire;

/// Fixed host identifier the browser side registers.
pub const HOST_NAME: &str = "com.pfahlr.selectorlogger";

/// How long `send` waits for a reply before treating the request as
/// implicitly acknowledged. The host is not required to answer.
pub const SEND_GRACE: Duration = Duration::from_millis(250);

/// Connection lifecycle. Disconnection from any state returns to
/// `Unconnected`; the next `connect` re-establishes transparently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected,
}

/// An open pipe to a launched host, plus a disconnect signal that fires
/// once with the reason when the host goes away.
pub struct HostHandle {
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub disconnected: watch::Receiver<Option<String>>,
}

/// Opens the pipe to the fixed host. Production launches a process; tests
/// substitute an in-memory pipe with scripted behavior.
#[async_trait]
pub trait HostLauncher: Send + Sync {
    /// The host identifier, for error messages and logging.
    fn host_name(&self) -> &str;

    /// Open the pipe. A failure to open at all is `HostNotFound`.
    async fn launch(&self) -> NativeResult<HostHandle>;
}

/// Launches the registered host executable with piped stdin/stdout.
pub struct ProcessLauncher {
    host: String,
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(host: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

#[async_trait]
impl HostLauncher for ProcessLauncher {
    fn host_name(&self) -> &str {
        &self.host
    }

    async fn launch(&self) -> NativeResult<HostHandle> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                tracing::debug!(host = %self.host, error = %e, "host launch failed");
                NativeError::HostNotFound {
                    host: self.host.clone(),
                }
            })?;

        let stdin = child.stdin.take().ok_or_else(|| NativeError::HostNotFound {
            host: self.host.clone(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| NativeError::HostNotFound {
            host: self.host.clone(),
        })?;

        let (tx, rx) = watch::channel(None);
        tokio::spawn(async move {
            let reason = match child.wait().await {
                Ok(status) => format!("native host exited: {status}"),
                Err(e) => format!("native host wait failed: {e}"),
            };
            let _ = tx.send(Some(reason));
        });

        Ok(HostHandle {
            writer: Box::new(stdin),
            reader: Box::new(stdout),
            disconnected: rx,
        })
    }
}

struct Connection {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    reader: Box<dyn AsyncRead + Send + Unpin>,
}

/// Exclusive owner of the single native connection.
pub struct NativeBridge<L> {
    launcher: L,
    state: ConnectionState,
    connection: Option<Connection>,
    // Replies still owed by the host for sends that hit the grace period;
    // they arrive first on the pipe and must not correlate with later sends
    stale_replies: usize,
}

impl<L: HostLauncher> NativeBridge<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            state: ConnectionState::Unconnected,
            connection: None,
            stale_replies: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Establish the connection if one is not already open.
    ///
    /// After launching, a zero-delay settle tick races the disconnect
    /// signal: a disconnect first means the host refused or died on
    /// startup, and the attempt fails with its reason.
    pub async fn connect(&mut self) -> NativeResult<()> {
        if self.state == ConnectionState::Connected && self.connection.is_some() {
            return Ok(());
        }
        self.state = ConnectionState::Connecting;

        let handle = match self.launcher.launch().await {
            Ok(handle) => handle,
            Err(e) => {
                self.state = ConnectionState::Unconnected;
                return Err(e);
            }
        };
        let mut disconnected = handle.disconnected;

        // Let a freshly spawned exit waiter report a host that died on
        // startup before the settle tick can win the race below
        tokio::task::yield_now().await;

        tokio::select! {
            biased;
            changed = disconnected.changed() => {
                self.state = ConnectionState::Unconnected;
                let reason = match changed {
                    Ok(()) => disconnected
                        .borrow()
                        .clone()
                        .unwrap_or_else(|| "native host disconnected".to_string()),
                    Err(_) => "native host disconnected".to_string(),
                };
                return Err(NativeError::HostDisconnected { reason });
            }
            _ = tokio::time::sleep(Duration::ZERO) => {}
        }

        self.connection = Some(Connection {
            writer: handle.writer,
            reader: handle.reader,
        });
        self.stale_replies = 0;
        self.state = ConnectionState::Connected;
        tracing::info!(host = self.launcher.host_name(), "native host connected");
        Ok(())
    }

    /// Send one message and wait up to [`SEND_GRACE`] for its reply. No
    /// reply within the grace period counts as `{ok:true}`; a reply
    /// carrying `{ok:false,error}` is `HostRejected`.
    ///
    /// A host slower than the grace period still answers eventually, so
    /// any reply owed to a timed-out send is drained and discarded before
    /// the next frame is taken as this request's reply.
    pub async fn send(&mut self, message: &Value) -> NativeResult<Value> {
        if self.state != ConnectionState::Connected {
            return Err(NativeError::NoConnection);
        }
        let owed = self.stale_replies;
        let Some(connection) = self.connection.as_mut() else {
            return Err(NativeError::NoConnection);
        };

        if let Err(e) = wire::write_frame(&mut connection.writer, message).await {
            return match e {
                WireError::Json(e) => Err(NativeError::Encode(e)),
                e => {
                    let reason = e.to_string();
                    self.teardown(&reason);
                    Err(NativeError::HostDisconnected { reason })
                }
            };
        }

        let mut drained = 0;
        let outcome = tokio::time::timeout(SEND_GRACE, async {
            loop {
                let frame = wire::read_frame(&mut connection.reader).await?;
                if drained < owed {
                    drained += 1;
                    tracing::debug!("discarding stale reply from a timed-out send");
                    continue;
                }
                return Ok::<_, WireError>(frame);
            }
        })
        .await;

        match outcome {
            // Silent host: implicitly acknowledged, one more reply owed
            Err(_elapsed) => {
                self.stale_replies = owed - drained + 1;
                Ok(json!({ "ok": true }))
            }
            Ok(Ok(reply)) => {
                self.stale_replies = 0;
                let rejected = reply.get("ok").and_then(Value::as_bool) == Some(false);
                match reply.get("error") {
                    Some(error) if rejected => {
                        let reason = error
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| error.to_string());
                        Err(NativeError::HostRejected { reason })
                    }
                    _ => Ok(reply),
                }
            }
            Ok(Err(e)) => {
                let reason = e.to_string();
                self.teardown(&reason);
                Err(NativeError::HostDisconnected { reason })
            }
        }
    }

    fn teardown(&mut self, reason: &str) {
        tracing::warn!(host = self.launcher.host_name(), reason, "native connection lost");
        self.connection = None;
        self.stale_replies = 0;
        self.state = ConnectionState::Unconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{HostBehavior, ScriptedHost};

    #[tokio::test]
    async fn connect_fails_with_host_not_found() {
        let mut bridge = NativeBridge::new(ScriptedHost::new(HostBehavior::NotFound));
        let err = bridge.connect().await.unwrap_err();
        assert!(matches!(err, NativeError::HostNotFound { .. }));
        assert_eq!(bridge.state(), ConnectionState::Unconnected);
    }

    #[tokio::test]
    async fn disconnect_before_settle_carries_the_reason() {
        let mut bridge = NativeBridge::new(ScriptedHost::new(HostBehavior::DisconnectImmediately {
            reason: "host crashed".to_string(),
        }));
        match bridge.connect().await.unwrap_err() {
            NativeError::HostDisconnected { reason } => assert_eq!(reason, "host crashed"),
            other => panic!("expected HostDisconnected, got {other:?}"),
        }
        assert_eq!(bridge.state(), ConnectionState::Unconnected);
    }

    #[tokio::test]
    async fn disconnect_signaled_after_launch_is_still_observed() {
        let mut bridge = NativeBridge::new(ScriptedHost::new(HostBehavior::DisconnectAfterSpawn {
            reason: "exec format error".to_string(),
        }));
        match bridge.connect().await.unwrap_err() {
            NativeError::HostDisconnected { reason } => assert_eq!(reason, "exec format error"),
            other => panic!("expected HostDisconnected, got {other:?}"),
        }
        assert_eq!(bridge.state(), ConnectionState::Unconnected);
    }

    #[tokio::test]
    async fn connect_twice_reuses_the_connection() {
        let host = ScriptedHost::new(HostBehavior::Silent);
        let launches = host.launch_count_handle();
        let mut bridge = NativeBridge::new(host);
        bridge.connect().await.unwrap();
        bridge.connect().await.unwrap();
        assert_eq!(bridge.state(), ConnectionState::Connected);
        assert_eq!(*launches.read().unwrap(), 1);
    }

    #[tokio::test]
    async fn send_without_connection_fails() {
        let mut bridge = NativeBridge::new(ScriptedHost::new(HostBehavior::Silent));
        let err = bridge.send(&json!({"op": "append"})).await.unwrap_err();
        assert!(matches!(err, NativeError::NoConnection));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_host_is_implicitly_acknowledged() {
        let mut bridge = NativeBridge::new(ScriptedHost::new(HostBehavior::Silent));
        bridge.connect().await.unwrap();
        let reply = bridge.send(&json!({"op": "append"})).await.unwrap();
        assert_eq!(reply, json!({ "ok": true }));
        // Connection survives a silent exchange
        assert_eq!(bridge.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn late_reply_to_a_timed_out_send_is_not_taken_for_the_next() {
        let mut bridge = NativeBridge::new(ScriptedHost::new(HostBehavior::DelayedFirstReply {
            delay: SEND_GRACE + Duration::from_millis(150),
        }));
        bridge.connect().await.unwrap();

        // First reply lands after the grace period: implicitly acknowledged
        let first = bridge.send(&json!({"op": "append", "seq": 0})).await.unwrap();
        assert_eq!(first, json!({ "ok": true }));

        // The late reply to the first frame is drained, and the second send
        // resolves with its own reply
        let second = bridge.send(&json!({"op": "append", "seq": 1})).await.unwrap();
        assert_eq!(second, json!({ "replyTo": 1 }));
        assert_eq!(bridge.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn host_reply_passes_through() {
        let mut bridge = NativeBridge::new(ScriptedHost::new(HostBehavior::Reply(
            json!({"ok": true, "appended": 3}),
        )));
        bridge.connect().await.unwrap();
        let reply = bridge.send(&json!({"op": "append"})).await.unwrap();
        assert_eq!(reply, json!({"ok": true, "appended": 3}));
    }

    #[tokio::test]
    async fn host_rejection_surfaces_its_error() {
        let mut bridge = NativeBridge::new(ScriptedHost::new(HostBehavior::RejectWith(
            "permission denied".to_string(),
        )));
        bridge.connect().await.unwrap();
        match bridge.send(&json!({"op": "append"})).await.unwrap_err() {
            NativeError::HostRejected { reason } => assert_eq!(reason, "permission denied"),
            other => panic!("expected HostRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pipe_close_during_send_tears_down() {
        let mut bridge = NativeBridge::new(ScriptedHost::new(HostBehavior::CloseOnFrame));
        bridge.connect().await.unwrap();
        let err = bridge.send(&json!({"op": "append"})).await.unwrap_err();
        assert!(matches!(err, NativeError::HostDisconnected { .. }));
        assert_eq!(bridge.state(), ConnectionState::Unconnected);

        // Reconnection after disconnect is transparent
        bridge.connect().await.unwrap();
        assert_eq!(bridge.state(), ConnectionState::Connected);
    }
}
