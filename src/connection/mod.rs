//! Connection lifecycle and RPC dispatch.
//!
//! One logical connection multiplexes any number of concurrent calls over a
//! single duplex channel. A driver task owns the channel: it writes queued
//! outbound frames, routes inbound frames to the pending-call table by
//! correlation token, and sweeps expired deadlines. Callers suspend on
//! [`Connection::call`] until their call resolves, times out, or the
//! connection is torn down.

mod channel;
mod id;
mod keepalive;
mod pending;

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub use channel::{Channel, MemoryChannel};
pub use id::{IdStrategy, RequestIdGenerator, MAX_SEQUENTIAL_ID};
pub use keepalive::DEFAULT_KEEPALIVE_INTERVAL;
pub use pending::{CallResult, PendingCalls};

use crate::error::{DriverError, DriverResult};
use crate::protocol::{self, Request, ResponsePayload};
use crate::value::Value;
use keepalive::Keepalive;

/// Connection state machine: `Disconnected → Connecting → Connected →
/// Disconnected`. Re-entering `Disconnected` is terminal for this
/// connection; reconnection is an external policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Connection tuning knobs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Keepalive ping interval; `None` disables the keepalive driver.
    pub keepalive_interval: Option<Duration>,
    /// How often the driver task sweeps for expired call deadlines.
    pub sweep_interval: Duration,
    /// Correlation-token generation strategy.
    pub id_strategy: IdStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            keepalive_interval: Some(DEFAULT_KEEPALIVE_INTERVAL),
            sweep_interval: Duration::from_millis(25),
            id_strategy: IdStrategy::default(),
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Reject the call with a timeout once this much time elapses without a
    /// response. `None` waits indefinitely (until disconnect).
    pub timeout: Option<Duration>,
    /// Opaque trace context attached to the outbound envelope.
    pub trace: Option<String>,
}

struct Shared {
    pending: PendingCalls,
    ids: RequestIdGenerator,
    outbound: mpsc::Sender<Vec<u8>>,
    status: Mutex<ConnectionStatus>,
}

impl Shared {
    fn status(&self) -> ConnectionStatus {
        *self.status.lock()
    }

    fn set_status(&self, status: ConnectionStatus) {
        *self.status.lock() = status;
    }
}

/// Serializes a method call into a wire envelope, correlates it, transmits
/// it, and settles the caller's handle. Cheap to clone; all clones share
/// the connection's state.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    pub(crate) fn status(&self) -> ConnectionStatus {
        self.shared.status()
    }

    pub(crate) async fn call(
        &self,
        method: &str,
        params: Vec<Value>,
        options: CallOptions,
    ) -> DriverResult<Value> {
        if self.status() != ConnectionStatus::Connected {
            return Err(DriverError::ConnectionClosed);
        }

        let deadline = options.timeout.map(|t| Instant::now() + t);

        // Draw tokens until one registers cleanly; collisions are possible
        // in random mode and are never surfaced to the caller.
        let (token, rx) = loop {
            let token = self.shared.ids.next();
            match self.shared.pending.register(&token, deadline) {
                Ok(rx) => break (token, rx),
                Err(DriverError::TokenCollision(t)) => {
                    tracing::trace!("Token collision on '{}', redrawing", t);
                }
                Err(e) => return Err(e),
            }
        };

        let request = Request {
            id: token.clone(),
            method: method.to_string(),
            params,
            trace: options.trace,
        };

        let frame = match protocol::encode_request(&request) {
            Ok(frame) => frame,
            Err(e) => {
                // Encoding failed locally; the entry must not linger
                self.shared.pending.reject(&token, e.clone());
                return Err(e);
            }
        };

        if self.shared.outbound.send(frame).await.is_err() {
            self.shared
                .pending
                .reject(&token, DriverError::ConnectionClosed);
            return Err(DriverError::ConnectionClosed);
        }

        match rx.await {
            Ok(result) => result,
            // The driver task went away without settling the call
            Err(_) => Err(DriverError::ConnectionClosed),
        }
    }
}

/// A single logical connection to a server over an abstract channel.
///
/// Dropping the connection (or calling [`close`]) tears it down: the driver
/// task stops, keepalive stops, and every pending call is rejected with
/// [`DriverError::ConnectionClosed`].
///
/// [`close`]: Connection::close
pub struct Connection {
    dispatcher: Dispatcher,
    keepalive: Keepalive,
    shutdown: watch::Sender<bool>,
    driver: JoinHandle<()>,
}

impl Connection {
    /// Open a connection over an established channel.
    ///
    /// Dialing and handshaking belong to the transport; the channel handed
    /// in here must already be open. The connection enters `Connected` and
    /// starts the keepalive driver (when configured) before returning.
    pub fn open<C: Channel>(channel: C, config: Config) -> Connection {
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            pending: PendingCalls::new(),
            ids: RequestIdGenerator::new(config.id_strategy),
            outbound: outbound_tx,
            status: Mutex::new(ConnectionStatus::Connecting),
        });

        // Connected must be set before the driver starts: a driver that
        // exits instantly transitions to Disconnected, which is terminal.
        shared.set_status(ConnectionStatus::Connected);

        let driver = tokio::spawn(drive(
            channel,
            Arc::clone(&shared),
            outbound_rx,
            shutdown_rx,
            config.sweep_interval,
        ));
        tracing::debug!("Connection established");

        let dispatcher = Dispatcher { shared };
        let mut keepalive = Keepalive::new(dispatcher.clone());
        if let Some(interval) = config.keepalive_interval {
            keepalive.start(interval);
        }

        Connection {
            dispatcher,
            keepalive,
            shutdown: shutdown_tx,
            driver,
        }
    }

    /// Dispatch a remote call and await its result.
    pub async fn call(
        &self,
        method: &str,
        params: Vec<Value>,
        options: CallOptions,
    ) -> DriverResult<Value> {
        self.dispatcher.call(method, params, options).await
    }

    /// No-op round trip; returns `true` when the server answers.
    pub async fn ping(&self) -> DriverResult<bool> {
        match self
            .call("ping", Vec::new(), CallOptions::default())
            .await?
        {
            Value::Bool(b) => Ok(b),
            // Some servers answer ping with an empty result
            Value::None => Ok(true),
            other => Err(DriverError::Protocol(format!(
                "Unexpected ping response: {}",
                other.kind()
            ))),
        }
    }

    /// The raw server version string, conventionally prefixed `surrealdb-`.
    /// See [`crate::protocol::strip_version_prefix`].
    pub async fn version(&self) -> DriverResult<String> {
        match self
            .call("version", Vec::new(), CallOptions::default())
            .await?
        {
            Value::String(v) => Ok(v),
            other => Err(DriverError::Protocol(format!(
                "Unexpected version response: {}",
                other.kind()
            ))),
        }
    }

    /// Invalidate the server-side session; returns `true` on success.
    pub async fn invalidate(&self) -> DriverResult<bool> {
        match self
            .call("invalidate", Vec::new(), CallOptions::default())
            .await?
        {
            Value::Bool(b) => Ok(b),
            Value::None => Ok(true),
            other => Err(DriverError::Protocol(format!(
                "Unexpected invalidate response: {}",
                other.kind()
            ))),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.dispatcher.status()
    }

    /// Number of calls currently awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.dispatcher.shared.pending.len()
    }

    /// (Re)start the keepalive driver. Any prior timer is cleared first, so
    /// calling this twice leaves exactly one active timer.
    pub fn start_keepalive(&mut self, interval: Duration) {
        self.keepalive.start(interval);
    }

    /// Stop the keepalive driver. Idempotent.
    pub fn stop_keepalive(&mut self) {
        self.keepalive.stop();
    }

    /// Tear the connection down: stops keepalive, stops the driver task and
    /// rejects every pending call with `ConnectionClosed`.
    pub async fn close(mut self) {
        self.keepalive.stop();
        self.dispatcher
            .shared
            .set_status(ConnectionStatus::Disconnected);
        let _ = self.shutdown.send(true);
        let _ = (&mut self.driver).await;
    }
}

enum Step {
    Outbound(Option<Vec<u8>>),
    Inbound(Option<DriverResult<Vec<u8>>>),
    Sweep,
    Shutdown,
}

/// The driver task: sole owner of the channel. Inbound frames are routed
/// one at a time; outbound frames are queued by callers; expired deadlines
/// are swept periodically. Exiting for any reason drains the table.
async fn drive<C: Channel>(
    mut channel: C,
    shared: Arc<Shared>,
    mut outbound_rx: mpsc::Receiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
    sweep_interval: Duration,
) {
    let mut sweep = tokio::time::interval(sweep_interval);
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        let step = tokio::select! {
            _ = shutdown.changed() => Step::Shutdown,
            frame = outbound_rx.recv() => Step::Outbound(frame),
            inbound = channel.recv() => Step::Inbound(inbound),
            _ = sweep.tick() => Step::Sweep,
        };

        match step {
            Step::Outbound(Some(frame)) => {
                if let Err(e) = channel.send(frame).await {
                    tracing::warn!("Channel send failed: {}", e);
                    break;
                }
            }
            // All senders dropped: the connection handle is gone
            Step::Outbound(None) => break,
            Step::Inbound(Some(Ok(frame))) => route_frame(&shared, &frame),
            Step::Inbound(Some(Err(e))) => {
                tracing::warn!("Channel error: {}", e);
                break;
            }
            Step::Inbound(None) => {
                tracing::debug!("Channel closed by peer");
                break;
            }
            Step::Sweep => {
                shared.pending.expire_due(Instant::now());
            }
            Step::Shutdown => break,
        }
    }

    // Refuse new outbound traffic before draining. A call registered
    // during teardown either queued its frame before this point (its
    // entry is covered by the drain below) or its send fails and the
    // dispatcher unwinds the entry itself; nothing can register after the
    // drain and hang.
    outbound_rx.close();
    shared.set_status(ConnectionStatus::Disconnected);
    shared.pending.drain_all(DriverError::ConnectionClosed);
    tracing::debug!("Connection driver stopped");
}

/// Decode one inbound frame and settle the matching pending call.
/// Malformed or unmatchable frames are logged and dropped, never fatal.
fn route_frame(shared: &Shared, frame: &[u8]) {
    let response = match protocol::decode_response(frame) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Dropping malformed inbound envelope: {}", e);
            return;
        }
    };

    let Some(token) = response.id else {
        tracing::warn!("Dropping inbound envelope without correlation token");
        return;
    };

    match response.payload {
        ResponsePayload::Result(value) => shared.pending.resolve(&token, value),
        ResponsePayload::Error(err) => shared.pending.reject(
            &token,
            DriverError::Remote {
                code: err.code,
                message: err.message,
            },
        ),
    }
}
