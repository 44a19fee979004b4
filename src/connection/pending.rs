use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{DriverError, DriverResult};
use crate::value::Value;

/// The terminal outcome delivered to a caller.
pub type CallResult = DriverResult<Value>;

struct PendingCall {
    tx: oneshot::Sender<CallResult>,
    issued_at: Instant,
    deadline: Option<Instant>,
}

/// Maps in-flight correlation tokens to the callers awaiting their results.
///
/// This is the single piece of shared mutable state on a connection. Every
/// transition (resolve, reject, expire, drain) removes the entry under one
/// mutex, so each pending call sees exactly one terminal resolution and
/// concurrent resolve/expire/drain races are linearized: one wins, the
/// others become warning-level no-ops.
#[derive(Default)]
pub struct PendingCalls {
    inner: Mutex<HashMap<String, PendingCall>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token and hand back the receiver the caller awaits.
    /// Fails when the token is already in flight.
    pub fn register(
        &self,
        token: &str,
        deadline: Option<Instant>,
    ) -> DriverResult<oneshot::Receiver<CallResult>> {
        let mut inner = self.inner.lock();
        if inner.contains_key(token) {
            return Err(DriverError::TokenCollision(token.to_string()));
        }
        let (tx, rx) = oneshot::channel();
        inner.insert(
            token.to_string(),
            PendingCall {
                tx,
                issued_at: Instant::now(),
                deadline,
            },
        );
        Ok(rx)
    }

    /// Deliver a successful result. Unknown tokens are reported and ignored:
    /// the response may have arrived after the call expired or was drained.
    pub fn resolve(&self, token: &str, value: Value) {
        match self.inner.lock().remove(token) {
            Some(call) => {
                // The caller may have stopped awaiting; a dead receiver is fine
                let _ = call.tx.send(Ok(value));
            }
            None => {
                tracing::warn!("Response for unknown or completed token '{}'", token);
            }
        }
    }

    /// Deliver a failure. Same unknown-token policy as [`resolve`].
    ///
    /// [`resolve`]: PendingCalls::resolve
    pub fn reject(&self, token: &str, error: DriverError) {
        match self.inner.lock().remove(token) {
            Some(call) => {
                let _ = call.tx.send(Err(error));
            }
            None => {
                tracing::warn!("Rejection for unknown or completed token '{}'", token);
            }
        }
    }

    /// Reject every entry whose deadline has elapsed. Returns how many were
    /// expired.
    pub fn expire_due(&self, now: Instant) -> usize {
        let expired: Vec<PendingCall> = {
            let mut inner = self.inner.lock();
            let tokens: Vec<String> = inner
                .iter()
                .filter(|(_, call)| call.deadline.is_some_and(|d| d <= now))
                .map(|(token, _)| token.clone())
                .collect();
            tokens
                .iter()
                .filter_map(|token| inner.remove(token))
                .collect()
        };

        let count = expired.len();
        for call in expired {
            tracing::debug!(
                "Expiring call pending for {:?}",
                call.issued_at.elapsed()
            );
            let _ = call.tx.send(Err(DriverError::Timeout));
        }
        count
    }

    /// Reject every still-pending entry and empty the table. Invoked on
    /// disconnect; the mutex makes this atomic with racing resolves.
    pub fn drain_all(&self, error: DriverError) {
        let drained: Vec<(String, PendingCall)> = self.inner.lock().drain().collect();
        if !drained.is_empty() {
            tracing::debug!("Draining {} pending call(s): {}", drained.len(), error);
        }
        for (_, call) in drained {
            let _ = call.tx.send(Err(error.clone()));
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, token: &str) -> bool {
        self.inner.lock().contains_key(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_register_and_resolve() {
        let table = PendingCalls::new();
        let rx = table.register("1", None).unwrap();
        table.resolve("1", Value::Bool(true));

        assert_eq!(rx.await.unwrap(), Ok(Value::Bool(true)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_receiver_pends_until_resolution() {
        let table = PendingCalls::new();
        let mut rx = tokio_test::task::spawn(table.register("1", None).unwrap());

        tokio_test::assert_pending!(rx.poll());

        table.resolve("1", Value::Int(7));
        assert!(rx.is_woken());
        let result = tokio_test::assert_ready!(rx.poll()).unwrap();
        assert_eq!(result, Ok(Value::Int(7)));
    }

    #[test]
    fn test_register_detects_collision() {
        let table = PendingCalls::new();
        let _rx = table.register("dup", None).unwrap();
        assert_eq!(
            table.register("dup", None).unwrap_err(),
            DriverError::TokenCollision("dup".to_string())
        );
    }

    #[test]
    fn test_resolve_unknown_token_is_a_noop() {
        let table = PendingCalls::new();
        table.resolve("ghost", Value::None);
        table.reject("ghost", DriverError::Timeout);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_resolution() {
        let table = PendingCalls::new();
        let rx = table.register("1", None).unwrap();

        table.resolve("1", Value::Int(1));
        // A late duplicate must not change the observed result
        table.resolve("1", Value::Int(2));
        table.reject("1", DriverError::ConnectionClosed);

        assert_eq!(rx.await.unwrap(), Ok(Value::Int(1)));
    }

    #[tokio::test]
    async fn test_expire_due_rejects_only_elapsed_deadlines() {
        let table = PendingCalls::new();
        let now = Instant::now();

        let overdue = table.register("old", Some(now - Duration::from_millis(5))).unwrap();
        let _fresh = table
            .register("new", Some(now + Duration::from_secs(60)))
            .unwrap();
        let _eternal = table.register("none", None).unwrap();

        assert_eq!(table.expire_due(now), 1);
        assert_eq!(overdue.await.unwrap(), Err(DriverError::Timeout));
        assert_eq!(table.len(), 2);
        assert!(!table.contains("old"));
    }

    #[tokio::test]
    async fn test_drain_all_empties_the_table() {
        let table = PendingCalls::new();
        let receivers: Vec<_> = (0..5)
            .map(|i| table.register(&i.to_string(), None).unwrap())
            .collect();

        table.drain_all(DriverError::ConnectionClosed);

        assert!(table.is_empty());
        for rx in receivers {
            assert_eq!(rx.await.unwrap(), Err(DriverError::ConnectionClosed));
        }
    }
}
