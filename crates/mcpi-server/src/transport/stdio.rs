//! Newline-delimited JSON-RPC over stdio.
//!
//! Reads requests off its own stdin and writes responses (and, per the
//! push-first design, unsolicited `interaction.prompt`/`interaction.continue`
//! notifications) to stdout.
//!
//! All outbound lines — responses and notifications alike — funnel through
//! a single channel into one writer task, so two concurrent in-flight
//! requests (or a notification racing a response) can never interleave
//! partial JSON on the same line. The notification hooks the engine calls
//! are synchronous closures, which a bounded async mutex cannot satisfy
//! directly; an unbounded mpsc sender can be cloned and invoked from sync
//! code without blocking the caller.

use std::sync::Arc;

use mcpi_engine::{Progress, ProgressHook, PromptHook};
use mcpi_protocol::{JsonRpcNotification, JsonRpcRequest, Prompt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::dispatcher::RpcDispatcher;

/// Non-JSON lines to tolerate on stdin before giving up — guards against a
/// misconfigured caller piping plain-text logs into our stdin.
const MAX_SKIP_LINES: usize = 1000;

pub struct StdioServerTransport {
    outbound_tx: mpsc::UnboundedSender<String>,
}

impl StdioServerTransport {
    /// Builds the transport and its outbound channel. The receiver half is
    /// handed to [`Self::run`]; the sender half is cloned into the
    /// [`PromptHook`]/[`ProgressHook`] closures wired into the engine
    /// before `run` is called, so construction happens before the engine
    /// exists.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { outbound_tx: tx }, rx)
    }

    pub fn prompt_hook(&self) -> PromptHook {
        let tx = self.outbound_tx.clone();
        Arc::new(move |session_id: &str, prompt: &Prompt| {
            let notif = JsonRpcNotification::new(
                "interaction.prompt",
                Some(serde_json::json!({ "sessionId": session_id, "prompt": prompt })),
            );
            match serde_json::to_string(&notif) {
                Ok(line) => {
                    let _ = tx.send(line);
                }
                Err(e) => tracing::warn!(error = %e, "failed to serialize interaction.prompt notification"),
            }
        })
    }

    pub fn progress_hook(&self) -> ProgressHook {
        let tx = self.outbound_tx.clone();
        Arc::new(move |session_id: &str, progress: Progress| {
            let notif = JsonRpcNotification::new(
                "interaction.continue",
                Some(serde_json::json!({
                    "sessionId": session_id,
                    "current": progress.current,
                    "total": progress.total,
                    "message": progress.message,
                })),
            );
            match serde_json::to_string(&notif) {
                Ok(line) => {
                    let _ = tx.send(line);
                }
                Err(e) => tracing::warn!(error = %e, "failed to serialize interaction.continue notification"),
            }
        })
    }

    /// Drives the read loop until stdin closes. Each request is dispatched
    /// on its own task so a slow `interaction.start` handshake never blocks
    /// an unrelated `interaction.getState` poll arriving right behind it.
    pub async fn run(
        self,
        dispatcher: Arc<RpcDispatcher>,
        mut outbound_rx: mpsc::UnboundedReceiver<String>,
    ) -> anyhow::Result<()> {
        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(line) = outbound_rx.recv().await {
                if stdout.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if stdout.write_all(b"\n").await.is_err() {
                    break;
                }
                if stdout.flush().await.is_err() {
                    break;
                }
            }
        });

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut skipped = 0usize;

        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !trimmed.starts_with('{') {
                skipped += 1;
                tracing::debug!(line = %trimmed, "skipping non-JSON line on stdin");
                if skipped >= MAX_SKIP_LINES {
                    anyhow::bail!("stdin produced too many non-JSON lines");
                }
                continue;
            }

            let req: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, line = %trimmed, "dropping unparseable JSON-RPC request");
                    continue;
                }
            };

            let dispatcher = Arc::clone(&dispatcher);
            let tx = self.outbound_tx.clone();
            tokio::spawn(async move {
                let resp = dispatcher.dispatch(req).await;
                match serde_json::to_string(&resp) {
                    Ok(line) => {
                        let _ = tx.send(line);
                    }
                    Err(e) => tracing::error!(error = %e, "failed to serialize response"),
                }
            });
        }

        drop(self.outbound_tx);
        let _ = writer.await;
        Ok(())
    }
}
