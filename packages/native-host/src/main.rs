//! The native host process.
//!
//! Speaks the length-prefixed JSON protocol on stdin/stdout and serves the
//! `append` operation: append each line plus a newline to the file at
//! `path`, creating it (and its parent directories) if absent. Diagnostics
//! go to stderr; stdout belongs to the pipe.

use std::path::Path;

use anyhow::Result;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

use selector_logger::native::wire;
use selector_logger::WireError;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();

    loop {
        let request = match wire::read_frame(&mut stdin).await {
            Ok(request) => request,
            Err(WireError::Closed) => break,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed request stream");
                break;
            }
        };
        let reply = handle(&request).await;
        wire::write_frame(&mut stdout, &reply).await?;
    }

    Ok(())
}

async fn handle(request: &Value) -> Value {
    match request.get("op").and_then(Value::as_str) {
        Some("append") => match append(request).await {
            Ok(count) => {
                tracing::debug!(lines = count, "append completed");
                json!({ "ok": true })
            }
            Err(e) => json!({ "ok": false, "error": e.to_string() }),
        },
        _ => json!({ "ok": false, "error": "unknown op" }),
    }
}

async fn append(request: &Value) -> Result<usize> {
    let path = request
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing path"))?;
    let lines = request
        .get("lines")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    for line in &lines {
        let text = match line {
            Value::String(text) => text.as_str(),
            Value::Null => "",
            other => anyhow::bail!("line is not a string: {other}"),
        };
        file.write_all(text.as_bytes()).await?;
        file.write_all(b"\n").await?;
    }
    file.flush().await?;

    Ok(lines.len())
}
