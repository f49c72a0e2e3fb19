use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::error::QueueError;
use crate::queue::JobMessage;

/// Publish-one/consume-one broker collaborator. Delivery is at-least-once in
/// spirit: consumers must tolerate a redelivered message for a job that has
/// already reached a terminal state.
pub trait MessageBroker: Send + Sync {
    fn publish(&self, message: JobMessage) -> Result<(), QueueError>;

    /// Cheap connectivity check used by the dispatch re-probe policy.
    fn probe(&self) -> bool;
}

/// In-process broker over a bounded crossbeam channel. Stands in for the
/// distributed broker in tests and single-node deployments.
pub struct ChannelBroker {
    sender: Sender<JobMessage>,
}

impl ChannelBroker {
    /// Returns the broker and the consume side handed to the worker pool.
    pub fn new(capacity: usize) -> (Self, Receiver<JobMessage>) {
        let (sender, receiver) = bounded(capacity);
        (Self { sender }, receiver)
    }
}

impl MessageBroker for ChannelBroker {
    fn publish(&self, message: JobMessage) -> Result<(), QueueError> {
        match self.sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(QueueError::PublishFailed(
                "queue is at capacity".to_string(),
            )),
            Err(TrySendError::Disconnected(_)) => Err(QueueError::ChannelClosed),
        }
    }

    fn probe(&self) -> bool {
        // An in-process channel is reachable for the lifetime of the process;
        // disconnection only surfaces on publish.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_consume() {
        let (broker, receiver) = ChannelBroker::new(4);
        broker
            .publish(JobMessage {
                job_id: "j1".to_string(),
                organization_id: "org-1".to_string(),
                storage_key: "org-1/receipts/x.pdf".to_string(),
                filename: "x.pdf".to_string(),
                mime_type: Some("application/pdf".to_string()),
            })
            .unwrap();

        let msg = receiver.recv().unwrap();
        assert_eq!(msg.job_id, "j1");
        assert_eq!(msg.storage_key, "org-1/receipts/x.pdf");
    }

    #[test]
    fn test_publish_to_full_queue_fails_fast() {
        let (broker, _receiver) = ChannelBroker::new(1);
        let message = JobMessage {
            job_id: "j1".to_string(),
            organization_id: "org-1".to_string(),
            storage_key: "k".to_string(),
            filename: "f".to_string(),
            mime_type: None,
        };
        broker.publish(message.clone()).unwrap();
        let err = broker.publish(message).unwrap_err();
        assert!(matches!(err, QueueError::PublishFailed(_)));
    }

    #[test]
    fn test_publish_after_consumer_dropped() {
        let (broker, receiver) = ChannelBroker::new(1);
        drop(receiver);
        let err = broker
            .publish(JobMessage {
                job_id: "j1".to_string(),
                organization_id: "org-1".to_string(),
                storage_key: "k".to_string(),
                filename: "f".to_string(),
                mime_type: None,
            })
            .unwrap_err();
        assert!(matches!(err, QueueError::ChannelClosed));
    }
}
