//! Event stream plumbing: one bounded channel per run, the driver as the
//! sole producer.
//!
//! A consumer that stops draining must not wedge the engine. On a full
//! buffer the sender falls back to a blocking send bounded by a grace
//! period; once that elapses the consumer is treated as abandoned and
//! later events are dropped (counted, never affecting engine correctness).

use std::time::Duration;

use flotilla_core::Event;
use metrics::counter;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

pub(crate) struct EventSender {
    tx: mpsc::Sender<Event>,
    grace: Duration,
    abandoned: bool,
}

impl EventSender {
    pub(crate) fn channel(capacity: usize, grace: Duration) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, grace, abandoned: false }, rx)
    }

    pub(crate) async fn emit(&mut self, event: Event) {
        if self.abandoned {
            counter!("events_dropped_total", 1u64);
            return;
        }
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Closed(_)) => {
                // Receiver gone; nothing left to deliver to.
                self.abandoned = true;
                counter!("events_dropped_total", 1u64);
            }
            Err(TrySendError::Full(event)) => {
                match tokio::time::timeout(self.grace, self.tx.send(event)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => {
                        self.abandoned = true;
                        counter!("events_dropped_total", 1u64);
                    }
                    Err(_) => {
                        warn!(grace_ms = self.grace.as_millis() as u64, "event consumer stalled; dropping further events");
                        self.abandoned = true;
                        counter!("events_dropped_total", 1u64);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_core::EventKind;

    fn ev(message: &str) -> Event {
        Event::new(EventKind::Applied, None, Some(0), message)
    }

    #[tokio::test]
    async fn delivers_in_order_while_drained() {
        let (mut tx, mut rx) = EventSender::channel(4, Duration::from_millis(50));
        tx.emit(ev("one")).await;
        tx.emit(ev("two")).await;
        assert_eq!(rx.recv().await.unwrap().message, "one");
        assert_eq!(rx.recv().await.unwrap().message, "two");
    }

    #[tokio::test]
    async fn stalled_consumer_is_abandoned_after_grace() {
        let (mut tx, rx) = EventSender::channel(1, Duration::from_millis(20));
        tx.emit(ev("fills the buffer")).await;
        let t0 = std::time::Instant::now();
        tx.emit(ev("overflows")).await;
        assert!(t0.elapsed() >= Duration::from_millis(20));
        assert!(tx.abandoned);
        // Further emits return immediately.
        let t1 = std::time::Instant::now();
        tx.emit(ev("dropped")).await;
        assert!(t1.elapsed() < Duration::from_millis(20));
        drop(rx);
    }

    #[tokio::test]
    async fn closed_receiver_is_abandoned() {
        let (mut tx, rx) = EventSender::channel(4, Duration::from_millis(20));
        drop(rx);
        tx.emit(ev("nobody listening")).await;
        assert!(tx.abandoned);
    }
}
