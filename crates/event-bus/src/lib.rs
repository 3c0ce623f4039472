use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use dmsweep_core_types::SweepError;

pub mod messages;

pub use messages::{Direction, SurfaceMessage};

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), SweepError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// In-memory fan-out bus. Publishing with no live subscriber is an error the
/// caller is free to ignore.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), SweepError> {
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|err| SweepError::new(err.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

/// Materialise an mpsc receiver from the bus subscription so callers can await
/// events without handling broadcast lag themselves.
pub fn to_mpsc<E>(bus: Arc<InMemoryBus<E>>, capacity: usize) -> mpsc::Receiver<E>
where
    E: Event,
{
    let mut rx = bus.subscribe();
    let (tx, out_rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    if tx.send(ev).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "bus subscriber lagged; continuing");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    out_rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmsweep_core_types::Progress;

    #[tokio::test]
    async fn publish_without_subscribers_reports_error() {
        let bus: Arc<InMemoryBus<SurfaceMessage>> = InMemoryBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.publish(SurfaceMessage::GetStatus).await.is_err());
    }

    #[tokio::test]
    async fn mpsc_bridge_relays_in_order() {
        let bus: Arc<InMemoryBus<SurfaceMessage>> = InMemoryBus::new(8);
        let mut rx = to_mpsc(bus.clone(), 8);

        bus.publish(SurfaceMessage::ProgressUpdate(Progress::new(1, 3, "a")))
            .await
            .unwrap();
        bus.publish(SurfaceMessage::DeleteComplete(Progress::new(3, 3, "b")))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().name(), "progress_update");
        assert_eq!(rx.recv().await.unwrap().name(), "delete_complete");
    }
}
