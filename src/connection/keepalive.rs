use std::time::Duration;

use tokio::task::JoinHandle;

use super::{CallOptions, ConnectionStatus, Dispatcher};

/// Interval used when none is configured.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Issues a periodic no-op `ping` through the dispatcher to keep the
/// channel alive and detect silent failure.
///
/// Pings are fire-and-forget: failures are logged, never surfaced. Both
/// `start` and `stop` are idempotent; `start` clears any prior timer first,
/// so at most one timer is ever active.
pub(crate) struct Keepalive {
    dispatcher: Dispatcher,
    task: Option<JoinHandle<()>>,
}

impl Keepalive {
    pub(crate) fn new(dispatcher: Dispatcher) -> Self {
        Keepalive {
            dispatcher,
            task: None,
        }
    }

    pub(crate) fn start(&mut self, interval: Duration) {
        self.stop();

        let dispatcher = self.dispatcher.clone();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; the schedule starts one
            // interval from now.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                // A tick that observes teardown stops the timer itself
                if dispatcher.status() != ConnectionStatus::Connected {
                    tracing::debug!("Keepalive stopping: connection no longer active");
                    break;
                }

                let ping = dispatcher.clone();
                tokio::spawn(async move {
                    // Bound each ping by the interval so unanswered pings
                    // cannot pile up in the pending-call table
                    let options = CallOptions {
                        timeout: Some(interval),
                        ..CallOptions::default()
                    };
                    if let Err(e) = ping.call("ping", Vec::new(), options).await {
                        tracing::debug!("Keepalive ping failed: {}", e);
                    }
                });
            }
        }));
    }

    pub(crate) fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Keepalive {
    fn drop(&mut self) {
        self.stop();
    }
}
