//! Message-bus transport: a WebSocket subscriber with auto-reconnect.
//!
//! Every text or binary message received on the bus is one frame. The
//! background task fans messages out through a bounded
//! [`tokio::sync::broadcast`] channel; a consumer that falls behind
//! skips the oldest messages rather than queueing them.
//!
//! # Example
//!
//! ```rust,ignore
//! use telemon_ingest::bus::{BusSubscription, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let url = Url::parse("ws://127.0.0.1:5556/telemetry")?;
//! let mut bus = BusSubscription::connect(url, ReconnectConfig::default(), cancel.clone());
//!
//! while let Some(message) = bus.recv().await {
//!     println!("{}", String::from_utf8_lossy(&message));
//! }
//! ```

use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Broadcast channel capacity ───────────────────────────────────────

const MESSAGE_CHANNEL_CAPACITY: usize = 256;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Floor on the pause between bus sessions.
pub const MIN_RESUBSCRIBE_DELAY: Duration = Duration::from_millis(100);

/// How long to wait before subscribing again after a session ends.
///
/// Every session end is followed by at least `delay`, whether the bus
/// closed cleanly or failed. Sessions that deliver nothing (refused
/// connections, immediate closes) count as failures; each consecutive
/// failure doubles the wait up to `max_delay`. A session that delivered
/// at least one message resets the count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Base pause after any session. Default: 5s.
    pub delay: Duration,

    /// Ceiling for the doubled pause before spread is added. Default: 60s.
    pub max_delay: Duration,

    /// Consecutive failures tolerated before the subscription gives up.
    /// `None` means retry forever.
    pub max_failures: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::from_delay(Duration::from_secs(5))
    }
}

impl ReconnectConfig {
    /// Base the schedule on the link reconnect delay used elsewhere.
    pub fn from_delay(delay: Duration) -> Self {
        let delay = delay.max(MIN_RESUBSCRIBE_DELAY);
        Self {
            delay,
            max_delay: delay.saturating_mul(12),
            max_failures: None,
        }
    }

    /// Pause after a session, given the current run of failed sessions.
    ///
    /// Never shorter than `delay`; up to a quarter longer than the capped
    /// doubling so that many viewers do not resubscribe in lockstep.
    pub fn wait_after(&self, failures: u32) -> Duration {
        let doublings = failures.saturating_sub(1).min(16);
        let base = self
            .delay
            .saturating_mul(1_u32 << doublings)
            .min(self.max_delay.max(self.delay));
        let spread = failures.wrapping_mul(2_654_435_761) % 1000;
        base.saturating_add((base / 4000).saturating_mul(spread))
    }
}

// ── BusSubscription ──────────────────────────────────────────────────

/// Receiving end of a bus subscription.
#[derive(Debug)]
pub struct BusSubscription {
    rx: broadcast::Receiver<Bytes>,
    cancel: CancellationToken,
}

impl BusSubscription {
    /// Spawn the subscriber loop and return immediately.
    ///
    /// The first connection attempt happens in the background; messages
    /// start flowing once it succeeds.
    pub fn connect(url: Url, reconnect: ReconnectConfig, cancel: CancellationToken) -> Self {
        let (tx, rx) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            subscribe_loop(url, tx, reconnect, task_cancel).await;
        });

        Self { rx, cancel }
    }

    /// Wrap an existing channel, e.g. an in-process publisher.
    pub fn from_receiver(rx: broadcast::Receiver<Bytes>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }

    /// Next message, or `None` once the bus is shut down.
    ///
    /// Messages dropped because this consumer lagged are logged and skipped.
    pub async fn recv(&mut self) -> Option<Bytes> {
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                result = self.rx.recv() => match result {
                    Ok(message) => return Some(message),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Bus consumer lagging, skipping stale messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }

    /// A second receiver on the same stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.rx.resubscribe()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Subscriber loop ──────────────────────────────────────────────────

/// How one connection to the bus ended.
#[derive(Debug)]
struct SessionEnd {
    delivered: u64,
    error: Option<Error>,
}

/// Subscribe, forward messages until the session ends, pause, repeat.
async fn subscribe_loop(
    url: Url,
    tx: broadcast::Sender<Bytes>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;

    loop {
        let end = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            end = run_session(&url, &tx) => end,
        };

        match &end.error {
            Some(e) => tracing::warn!(url = %url, delivered = end.delivered, error = %e, "Bus session failed"),
            None => tracing::info!(url = %url, delivered = end.delivered, "Bus closed the session"),
        }

        failures = if end.delivered > 0 { 0 } else { failures.saturating_add(1) };
        if reconnect.max_failures.is_some_and(|max| failures > max) {
            tracing::error!(failures, "Bus keeps failing, giving up");
            break;
        }

        let wait = reconnect.wait_after(failures);
        tracing::info!(
            delay_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
            failures,
            "Waiting before resubscribing"
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(wait) => {}
        }
    }

    tracing::debug!("Bus subscriber stopped");
}

// ── Single session ───────────────────────────────────────────────────

async fn run_session(url: &Url, tx: &broadcast::Sender<Bytes>) -> SessionEnd {
    let mut delivered = 0;
    let error = forward_messages(url, tx, &mut delivered).await.err();
    SessionEnd { delivered, error }
}

async fn forward_messages(
    url: &Url,
    tx: &broadcast::Sender<Bytes>,
    delivered: &mut u64,
) -> Result<(), Error> {
    tracing::debug!(url = %url, "Subscribing to bus");
    let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::BusConnect(e.to_string()))?;
    tracing::info!(url = %url, "Bus subscribed");

    let (_write, mut read) = stream.split();
    while let Some(message) = read.next().await {
        match message.map_err(|e| Error::BusConnect(e.to_string()))? {
            Message::Close(frame) => {
                if let Some(frame) = frame {
                    tracing::debug!(code = %frame.code, reason = %frame.reason, "Bus sent close");
                }
                break;
            }
            message => {
                if let Some(payload) = message_payload(message) {
                    *delivered += 1;
                    // Nobody listening right now is fine.
                    let _ = tx.send(payload);
                }
            }
        }
    }
    Ok(())
}

/// Data carried by a WebSocket message; control frames carry none.
fn message_payload(message: Message) -> Option<Bytes> {
    match message {
        Message::Text(text) => Some(Bytes::copy_from_slice(text.as_bytes())),
        Message::Binary(data) => Some(data),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn schedule_follows_the_link_delay() {
        let config = ReconnectConfig::from_delay(Duration::from_secs(2));
        assert_eq!(config.delay, Duration::from_secs(2));
        assert_eq!(config.max_delay, Duration::from_secs(24));
        assert!(config.max_failures.is_none());

        let floored = ReconnectConfig::from_delay(Duration::ZERO);
        assert_eq!(floored.delay, MIN_RESUBSCRIBE_DELAY);
    }

    #[test]
    fn productive_sessions_wait_the_base_delay() {
        let config = ReconnectConfig::from_delay(Duration::from_secs(1));
        assert_eq!(config.wait_after(0), Duration::from_secs(1));
    }

    #[test]
    fn failures_double_the_wait_up_to_the_cap() {
        let config = ReconnectConfig::from_delay(Duration::from_secs(1));
        let waits: Vec<Duration> = (1..=6).map(|n| config.wait_after(n)).collect();

        for (n, wait) in (1_u32..).zip(&waits) {
            let base = Duration::from_secs(1 << (n - 1).min(16)).min(config.max_delay);
            assert!(*wait >= base, "failure {n}: {wait:?} < {base:?}");
            assert!(*wait <= base.mul_f64(1.25), "failure {n}: {wait:?} too long");
        }
        assert!(config.wait_after(u32::MAX) <= config.max_delay.mul_f64(1.25));
    }

    #[test]
    fn data_messages_become_frames() {
        let text = message_payload(Message::text("speed 42")).unwrap();
        assert_eq!(text.as_ref(), b"speed 42");

        let binary = message_payload(Message::binary(vec![1_u8, 2, 3])).unwrap();
        assert_eq!(binary.as_ref(), &[1, 2, 3]);

        assert!(message_payload(Message::Ping(Bytes::new())).is_none());
    }

    #[tokio::test]
    async fn lagging_consumer_skips_to_newer_messages() {
        let (tx, rx) = broadcast::channel(2);
        let mut bus = BusSubscription::from_receiver(rx, CancellationToken::new());

        for i in 0..5_u8 {
            tx.send(Bytes::from(vec![i])).unwrap();
        }

        assert_eq!(bus.recv().await.unwrap().as_ref(), &[3]);
        assert_eq!(bus.recv().await.unwrap().as_ref(), &[4]);
    }

    /// Accept each connection, complete the handshake, close at once,
    /// and note when it happened.
    async fn closing_server(
        listener: tokio::net::TcpListener,
        accepted: tokio::sync::mpsc::UnboundedSender<tokio::time::Instant>,
    ) {
        while let Ok((stream, _)) = listener.accept().await {
            let _ = accepted.send(tokio::time::Instant::now());
            if let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await {
                let _ = ws.close(None).await;
                while ws.next().await.is_some() {}
            }
        }
    }

    #[tokio::test]
    async fn clean_closes_are_spaced_by_the_delay() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("ws://{}/", listener.local_addr().unwrap())).unwrap();
        let (accepted_tx, mut accepted) = tokio::sync::mpsc::unbounded_channel();
        let server = tokio::spawn(closing_server(listener, accepted_tx));

        let delay = Duration::from_millis(150);
        let cancel = CancellationToken::new();
        let _bus = BusSubscription::connect(url, ReconnectConfig::from_delay(delay), cancel.clone());

        let mut stamps = Vec::new();
        while stamps.len() < 3 {
            let stamp = tokio::time::timeout(Duration::from_secs(5), accepted.recv())
                .await
                .unwrap()
                .unwrap();
            stamps.push(stamp);
        }
        cancel.cancel();
        server.abort();

        for pair in stamps.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= delay, "resubscribed after {gap:?}");
        }
    }

    #[tokio::test]
    async fn recv_ends_on_shutdown_or_close() {
        let (tx, rx) = broadcast::channel::<Bytes>(4);
        let mut bus = BusSubscription::from_receiver(rx, CancellationToken::new());
        let mut second = BusSubscription::from_receiver(bus.subscribe(), CancellationToken::new());

        bus.shutdown();
        assert!(bus.recv().await.is_none());

        drop(tx);
        assert!(second.recv().await.is_none());
    }
}
