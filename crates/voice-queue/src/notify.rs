//! Interaction notification port.
//!
//! Sequences report "playback was blocked" and "blocked state cleared" through an
//! [`InteractionNotifier`]. Delivery is best-effort: callers log failures and move on.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Environment-level condition raised by the sequence player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionSignal {
    /// The host refused to start a clip; a user gesture is probably needed.
    PromptInteraction,
    /// A clip played to the end, so any earlier prompt is stale.
    ClearPromptInteraction,
}

/// Wire form of a signal: `{"type":"promptInteraction"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalMessage {
    #[serde(rename = "type")]
    pub kind: InteractionSignal,
}

pub trait InteractionNotifier: Send + Sync {
    fn notify(&self, signal: InteractionSignal) -> Result<()>;
}

/// Notifier that only writes the signal to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl InteractionNotifier for LogNotifier {
    fn notify(&self, signal: InteractionSignal) -> Result<()> {
        match signal {
            InteractionSignal::PromptInteraction => {
                tracing::warn!(signal = ?signal, "playback blocked; interaction required")
            }
            InteractionSignal::ClearPromptInteraction => {
                tracing::debug!(signal = ?signal, "interaction prompt cleared")
            }
        }
        Ok(())
    }
}

/// Notifier that POSTs [`SignalMessage`] JSON to a fixed endpoint.
///
/// Requests run on a dedicated worker thread; [`notify`](InteractionNotifier::notify)
/// only queues the signal. Delivery failures are logged by the worker.
pub struct HttpNotifier {
    url: String,
    signal_tx: Sender<InteractionSignal>,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let url = url.into();
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        let agent = ureq::Agent::new_with_config(config);

        let (signal_tx, signal_rx) = crossbeam_channel::unbounded();
        let worker_url = url.clone();
        std::thread::spawn(move || http_worker_main(agent, worker_url, signal_rx));

        Self { url, signal_tx }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl InteractionNotifier for HttpNotifier {
    fn notify(&self, signal: InteractionSignal) -> Result<()> {
        self.signal_tx
            .send(signal)
            .map_err(|_| anyhow!("http notifier worker is not running"))
    }
}

/// Deliver queued signals in order until every sender is gone.
fn http_worker_main(agent: ureq::Agent, url: String, signal_rx: Receiver<InteractionSignal>) {
    while let Ok(signal) = signal_rx.recv() {
        if let Err(e) = post_signal(&agent, &url, signal) {
            tracing::warn!(url = %url, "failed to deliver {signal:?}: {e:#}");
        }
    }
    tracing::debug!(url = %url, "http notifier stopped");
}

/// Blocking POST of one signal.
fn post_signal(agent: &ureq::Agent, url: &str, signal: InteractionSignal) -> Result<()> {
    let resp = agent
        .post(url)
        .send_json(SignalMessage { kind: signal })
        .with_context(|| format!("post {:?} to {}", signal, url))?;
    if !resp.status().is_success() {
        return Err(anyhow!("notify failed with {}", resp.status()));
    }
    Ok(())
}

/// Notifier that forwards signals to an in-process receiver.
#[derive(Clone, Debug)]
pub struct ChannelNotifier {
    tx: Sender<InteractionSignal>,
}

impl ChannelNotifier {
    pub fn new(tx: Sender<InteractionSignal>) -> Self {
        Self { tx }
    }
}

impl InteractionNotifier for ChannelNotifier {
    fn notify(&self, signal: InteractionSignal) -> Result<()> {
        self.tx
            .send(signal)
            .map_err(|_| anyhow!("interaction receiver disconnected"))
    }
}
