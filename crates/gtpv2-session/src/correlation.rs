use std::collections::HashMap;
use std::pin::pin;
use std::time::Duration;

use gtpv2_core::{GtpError, Message, Result};
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;
use tracing::debug;

/// Per-session rendezvous between a unit of work waiting for a message with
/// a given sequence number and the handler that receives it.
///
/// Each waiter owns a single-slot channel; a message is delivered to at most
/// one waiter, and both sides give up after their own timeout.
#[derive(Default)]
pub struct Correlator {
    waiters: Mutex<HashMap<u32, oneshot::Sender<Message>>>,
    registered: Notify,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the message carrying `sequence`
    pub async fn wait_message(&self, sequence: u32, timeout: Duration) -> Result<Message> {
        let (tx, rx) = oneshot::channel();
        let replaced = self.waiters.lock().insert(sequence, tx);
        if replaced.is_some() {
            debug!(seq = sequence, "Replaced an earlier waiter for the same sequence");
        }
        self.registered.notify_waiters();

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(msg)) => Ok(msg),
            _ => {
                self.waiters.lock().remove(&sequence);
                Err(GtpError::Timeout(timeout))
            }
        }
    }

    /// Hand `msg` to whoever waits for its sequence number.
    ///
    /// If nobody waits yet, keeps trying until `timeout` elapses.
    pub async fn pass_message(&self, msg: Message, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let sequence = msg.sequence();

        loop {
            let mut notified = pin!(self.registered.notified());
            notified.as_mut().enable();

            let waiter = self.waiters.lock().remove(&sequence);
            if let Some(tx) = waiter {
                // A waiter that timed out concurrently has dropped its receiver
                return tx.send(msg).map_err(|_| GtpError::Timeout(timeout));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(GtpError::Timeout(timeout));
            }
        }
    }

    /// Number of sequence numbers currently awaited
    pub fn pending(&self) -> usize {
        self.waiters.lock().len()
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtpv2_core::Ie;
    use std::sync::Arc;

    fn response(seq: u32) -> Message {
        Message::create_session_response(1, seq, vec![Ie::cause(16)])
    }

    #[tokio::test]
    async fn test_pass_unblocks_waiter() {
        let correlator = Arc::new(Correlator::new());

        let waiter = {
            let correlator = correlator.clone();
            tokio::spawn(async move {
                correlator
                    .wait_message(42, Duration::from_secs(2))
                    .await
            })
        };

        correlator
            .pass_message(response(42), Duration::from_secs(2))
            .await
            .unwrap();

        let msg = waiter.await.unwrap().unwrap();
        assert_eq!(msg, response(42));
        assert_eq!(correlator.pending(), 0);
    }

    #[tokio::test]
    async fn test_pass_before_wait_is_held() {
        let correlator = Arc::new(Correlator::new());

        let passer = {
            let correlator = correlator.clone();
            tokio::spawn(async move {
                correlator
                    .pass_message(response(7), Duration::from_secs(2))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        let msg = correlator
            .wait_message(7, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(msg.sequence(), 7);
        passer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let correlator = Correlator::new();
        let result = correlator
            .wait_message(1, Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(GtpError::Timeout(_))));
        assert_eq!(correlator.pending(), 0);
    }

    #[tokio::test]
    async fn test_pass_after_expiry_times_out() {
        let correlator = Correlator::new();
        let _ = correlator
            .wait_message(9, Duration::from_millis(20))
            .await;

        let result = correlator
            .pass_message(response(9), Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(GtpError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_other_sequence_not_delivered() {
        let correlator = Arc::new(Correlator::new());

        let waiter = {
            let correlator = correlator.clone();
            tokio::spawn(async move {
                correlator
                    .wait_message(100, Duration::from_millis(200))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let result = correlator
            .pass_message(response(101), Duration::from_millis(50))
            .await;
        assert!(result.is_err());
        assert!(waiter.await.unwrap().is_err());
    }
}
