//! Best-effort live update channel.
//!
//! The push connection is used purely as a refetch trigger: any inbound
//! data message, whatever its content, asks the owner to re-run the fetch
//! with the current filter. A supervising loop keeps the channel alive
//! with capped exponential backoff and jitter; the safety guards (empty
//! endpoint, mixed content) are evaluated on every attempt. Heartbeat and
//! connection live in the same task, so teardown stops both together.

use futures::{SinkExt, StreamExt};
use rand::Rng;
use reqwest::Url;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

/// Heartbeat payload; the only client-to-server traffic on the channel.
pub const HEARTBEAT_PAYLOAD: &str = "ping";

/// Base delay for the reconnect backoff, doubled per failed attempt.
const BACKOFF_BASE_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Connecting,
    Open,
    Backoff,
}

/// Reconnect/heartbeat tuning, taken from `[live]` in the config.
#[derive(Debug, Clone, Copy)]
pub struct LiveSettings {
    pub heartbeat: Duration,
    pub max_backoff: Duration,
}

/// Owner-side handle. Dropping it tears the channel down; `shutdown`
/// does the same but waits for the task to finish.
pub struct LiveChannelHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    state: watch::Receiver<ChannelState>,
}

impl LiveChannelHandle {
    fn inert() -> LiveChannelHandle {
        let (shutdown, _) = watch::channel(false);
        let (_state_tx, state) = watch::channel(ChannelState::Closed);
        LiveChannelHandle {
            shutdown,
            task: None,
            state,
        }
    }

    /// Whether a supervising task exists at all (the disabled-endpoint
    /// guard produces a handle without one).
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Wait for a state change and return the new state.
    pub async fn state_changed(&mut self) -> Option<ChannelState> {
        self.state.changed().await.ok()?;
        Some(*self.state.borrow())
    }

    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for LiveChannelHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// Mixed-content guard: a secure context must not open a cleartext
/// channel.
pub fn blocked_by_mixed_content(secure_context: bool, push_url: &Url) -> bool {
    secure_context && push_url.scheme() == "ws"
}

/// Deterministic part of the reconnect delay: base doubled per attempt,
/// capped. A zero cap leaves only the doubling ceiling in place.
pub fn backoff_delay(attempt: u32, max_backoff: Duration) -> Duration {
    let secs = BACKOFF_BASE_SECS * (1u64 << attempt.min(10));
    let secs = if max_backoff.is_zero() {
        secs
    } else {
        secs.min(max_backoff.as_secs().max(1))
    };
    Duration::from_secs(secs)
}

/// Full jitter: a uniform draw from `[0, delay]`.
pub fn with_jitter(delay: Duration) -> Duration {
    let millis = delay.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
}

/// Start the channel supervisor.
///
/// `push_url == None` means the feature is disabled and nothing is ever
/// opened. `secure_context` tells the guard whether the surrounding
/// session is itself on a secure transport.
pub fn spawn(
    push_url: Option<Url>,
    secure_context: bool,
    settings: LiveSettings,
    trigger: mpsc::Sender<()>,
) -> LiveChannelHandle {
    let Some(push_url) = push_url else {
        debug!("push endpoint not configured, live updates disabled");
        return LiveChannelHandle::inert();
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (state_tx, state_rx) = watch::channel(ChannelState::Closed);
    let task = tokio::spawn(supervise(
        push_url,
        secure_context,
        settings,
        trigger,
        state_tx,
        shutdown_rx,
    ));
    LiveChannelHandle {
        shutdown: shutdown_tx,
        task: Some(task),
        state: state_rx,
    }
}

async fn supervise(
    push_url: Url,
    secure_context: bool,
    settings: LiveSettings,
    trigger: mpsc::Sender<()>,
    state: watch::Sender<ChannelState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;
    loop {
        if blocked_by_mixed_content(secure_context, &push_url) {
            warn!(%push_url, "refusing insecure push endpoint from a secure context");
            let _ = state.send(ChannelState::Closed);
            return;
        }

        let _ = state.send(ChannelState::Connecting);
        let connected = tokio::select! {
            _ = shutdown.changed() => {
                let _ = state.send(ChannelState::Closed);
                return;
            }
            connected = connect_async(push_url.as_str()) => connected,
        };
        match connected {
            Ok((stream, _)) => {
                info!(%push_url, "push channel open");
                attempt = 0;
                let _ = state.send(ChannelState::Open);
                serve_open(stream, settings.heartbeat, &trigger, &mut shutdown).await;
                if *shutdown.borrow() {
                    let _ = state.send(ChannelState::Closed);
                    return;
                }
                info!("push channel lost");
            }
            Err(err) => {
                warn!(%err, %push_url, "push channel connect failed");
            }
        }

        let _ = state.send(ChannelState::Backoff);
        let delay = with_jitter(backoff_delay(attempt, settings.max_backoff));
        attempt = attempt.saturating_add(1);
        debug!(?delay, attempt, "push channel backing off");
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = state.send(ChannelState::Closed);
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Drive one open connection until it drops or the owner shuts down.
/// The heartbeat interval exists only inside this scope, so it can never
/// fire against a closed connection.
async fn serve_open<S>(
    stream: tokio_tungstenite::WebSocketStream<S>,
    heartbeat_every: Duration,
    trigger: &mpsc::Sender<()>,
    shutdown: &mut watch::Receiver<bool>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut inbound) = stream.split();
    let mut heartbeat =
        tokio::time::interval_at(tokio::time::Instant::now() + heartbeat_every, heartbeat_every);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                return;
            }
            message = inbound.next() => match message {
                // Any data message is an opaque refetch hint; a trigger
                // already queued covers it.
                Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                    let _ = trigger.try_send(());
                }
                Some(Ok(Message::Close(_))) | None => return,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(%err, "push channel read failed");
                    return;
                }
            },
            _ = heartbeat.tick() => {
                if sink
                    .send(Message::Text(HEARTBEAT_PAYLOAD.to_string()))
                    .await
                    .is_err()
                {
                    return;
                }
            }
        }
    }
}
