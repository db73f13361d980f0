//! Testing utilities including mock collaborators.
//!
//! Useful for exercising the controller and bridge without a live page
//! context or a real host process.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::split;
use tokio::sync::watch;

use crate::error::{CollectError, CollectResult, NativeError, NativeResult};
use crate::native::bridge::{HostHandle, HostLauncher, HOST_NAME};
use crate::native::wire;
use crate::page::PageExecutor;
use crate::rules::CollectorRow;
use crate::traits::badge::Badge;

/// Canned page-context executor.
///
/// Returns a fixed outcome for every run and records the rows it was
/// handed, for assertions.
pub struct MockExecutor {
    outcome: MockOutcome,
    calls: Arc<RwLock<Vec<Vec<CollectorRow>>>>,
}

enum MockOutcome {
    Lines(Vec<String>),
    Fault(String),
    Destroyed,
}

impl MockExecutor {
    /// Executor that yields these lines on every run.
    pub fn with_lines(lines: Vec<&str>) -> Self {
        Self {
            outcome: MockOutcome::Lines(lines.into_iter().map(String::from).collect()),
            calls: Arc::default(),
        }
    }

    /// Executor whose runs fail with a collection fault.
    pub fn faulting(message: &str) -> Self {
        Self {
            outcome: MockOutcome::Fault(message.to_string()),
            calls: Arc::default(),
        }
    }

    /// Executor whose page context is already gone.
    pub fn destroyed() -> Self {
        Self {
            outcome: MockOutcome::Destroyed,
            calls: Arc::default(),
        }
    }

    /// Number of runs requested so far.
    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// The rows handed to each run.
    pub fn calls(&self) -> Vec<Vec<CollectorRow>> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl PageExecutor for MockExecutor {
    async fn run_collectors(&self, rows: &[CollectorRow]) -> CollectResult<Vec<String>> {
        self.calls.write().unwrap().push(rows.to_vec());
        match &self.outcome {
            MockOutcome::Lines(lines) => Ok(lines.clone()),
            MockOutcome::Fault(message) => Err(CollectError::Fault(message.clone())),
            MockOutcome::Destroyed => Err(CollectError::ContextDestroyed),
        }
    }
}

/// How a [`ScriptedHost`] behaves once launched.
pub enum HostBehavior {
    /// Launch itself fails
    NotFound,
    /// Launch succeeds but the disconnect signal fires before the settle tick
    DisconnectImmediately { reason: String },
    /// Accepts frames and never replies
    Silent,
    /// Replies to every frame with this value
    Reply(Value),
    /// Replies to every frame with `{ok:false, error}`
    RejectWith(String),
    /// Reads one frame, then closes the pipe
    CloseOnFrame,
    /// Launch succeeds, then the disconnect signal arrives from a spawned
    /// task rather than before launch returns
    DisconnectAfterSpawn { reason: String },
    /// Replies to frame `n` with `{replyTo: n}`, the first after a delay
    DelayedFirstReply { delay: Duration },
}

/// In-memory host double for bridge tests: an in-process pipe driven by a
/// scripted behavior instead of a spawned process.
pub struct ScriptedHost {
    name: String,
    behavior: HostBehavior,
    launches: Arc<RwLock<usize>>,
    frames: Arc<Mutex<Vec<Value>>>,
    // Keeps disconnect senders alive for the lifetime of the host
    signals: Mutex<Vec<watch::Sender<Option<String>>>>,
}

impl ScriptedHost {
    pub fn new(behavior: HostBehavior) -> Self {
        Self {
            name: HOST_NAME.to_string(),
            behavior,
            launches: Arc::default(),
            frames: Arc::default(),
            signals: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Handle onto the launch counter, usable after the host moves into a
    /// bridge.
    pub fn launch_count_handle(&self) -> Arc<RwLock<usize>> {
        Arc::clone(&self.launches)
    }

    /// Frames the host has received so far.
    pub fn received_frames(&self) -> Vec<Value> {
        self.frames.lock().unwrap().clone()
    }

    /// Handle onto the received-frame log.
    pub fn frames_handle(&self) -> Arc<Mutex<Vec<Value>>> {
        Arc::clone(&self.frames)
    }
}

#[async_trait]
impl HostLauncher for ScriptedHost {
    fn host_name(&self) -> &str {
        &self.name
    }

    async fn launch(&self) -> NativeResult<HostHandle> {
        *self.launches.write().unwrap() += 1;

        enum Script {
            Silent,
            Reply(Value),
            CloseOnFrame,
            DelayedFirstReply(Duration),
        }

        let script = match &self.behavior {
            HostBehavior::NotFound => {
                return Err(NativeError::HostNotFound {
                    host: self.name.clone(),
                })
            }
            HostBehavior::DisconnectImmediately { reason } => {
                let (near, _far) = tokio::io::duplex(64 * 1024);
                let (reader, writer) = split(near);
                let (tx, rx) = watch::channel(None);
                let _ = tx.send(Some(reason.clone()));
                self.signals.lock().unwrap().push(tx);
                return Ok(HostHandle {
                    writer: Box::new(writer),
                    reader: Box::new(reader),
                    disconnected: rx,
                });
            }
            HostBehavior::DisconnectAfterSpawn { reason } => {
                let (near, _far) = tokio::io::duplex(64 * 1024);
                let (reader, writer) = split(near);
                let (tx, rx) = watch::channel(None);
                let reason = reason.clone();
                tokio::spawn(async move {
                    let _ = tx.send(Some(reason));
                    std::future::pending::<()>().await;
                });
                return Ok(HostHandle {
                    writer: Box::new(writer),
                    reader: Box::new(reader),
                    disconnected: rx,
                });
            }
            HostBehavior::Silent => Script::Silent,
            HostBehavior::Reply(value) => Script::Reply(value.clone()),
            HostBehavior::RejectWith(error) => {
                Script::Reply(json!({"ok": false, "error": error}))
            }
            HostBehavior::CloseOnFrame => Script::CloseOnFrame,
            HostBehavior::DelayedFirstReply { delay } => Script::DelayedFirstReply(*delay),
        };

        let (near, far) = tokio::io::duplex(64 * 1024);
        let (near_reader, near_writer) = split(near);
        let (mut far_reader, mut far_writer) = split(far);

        let (tx, rx) = watch::channel(None);
        let frames = Arc::clone(&self.frames);
        tokio::spawn(async move {
            let mut frame_index: u64 = 0;
            loop {
                match wire::read_frame(&mut far_reader).await {
                    Ok(frame) => {
                        frames.lock().unwrap().push(frame);
                        match &script {
                            Script::Silent => {}
                            Script::CloseOnFrame => break,
                            Script::Reply(reply) => {
                                if wire::write_frame(&mut far_writer, reply).await.is_err() {
                                    break;
                                }
                            }
                            Script::DelayedFirstReply(delay) => {
                                if frame_index == 0 {
                                    tokio::time::sleep(*delay).await;
                                }
                                let reply = json!({ "replyTo": frame_index });
                                if wire::write_frame(&mut far_writer, &reply).await.is_err() {
                                    break;
                                }
                            }
                        }
                        frame_index += 1;
                    }
                    Err(_) => break,
                }
            }
            let _ = tx.send(Some("native host exited".to_string()));
        });

        Ok(HostHandle {
            writer: Box::new(near_writer),
            reader: Box::new(near_reader),
            disconnected: rx,
        })
    }
}

/// Badge sink that records every shown count.
#[derive(Debug, Default)]
pub struct RecordingBadge {
    counts: Arc<RwLock<Vec<usize>>>,
}

impl RecordingBadge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts shown so far, oldest first.
    pub fn shown(&self) -> Vec<usize> {
        self.counts.read().unwrap().clone()
    }

    /// Handle onto the shown-count log.
    pub fn counts_handle(&self) -> Arc<RwLock<Vec<usize>>> {
        Arc::clone(&self.counts)
    }
}

#[async_trait]
impl Badge for RecordingBadge {
    async fn show_count(&self, count: usize) {
        self.counts.write().unwrap().push(count);
    }
}
