/// In-process notification bus with topic-prefix subscriptions
///
/// Delivery is synchronous on the sending task. Matching subscriptions are
/// snapshotted before delivery so handlers may subscribe or unsubscribe while a
/// notification is in flight. A subscriber registered for the same prefix on
/// several platforms still receives each notification once.

use crate::workflow::component::PlatformId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// A delivered notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub topic: String,
    /// Monotonic per topic, starting at 1
    pub sequence: u64,
    pub body: String,
}

/// Receiver side of the transport
pub trait NotificationSubscriber: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Transport contract consumed by the lifecycle runtime
pub trait NotificationService: Send + Sync {
    /// Deliver notifications whose topic starts with `topic_prefix` published on `platform`
    fn subscribe(
        &self,
        topic_prefix: &str,
        subscriber: Arc<dyn NotificationSubscriber>,
        platform: &PlatformId,
    );

    /// Remove a subscription; unknown subscriptions are ignored
    fn unsubscribe(
        &self,
        topic_prefix: &str,
        subscriber: &Arc<dyn NotificationSubscriber>,
        platform: &PlatformId,
    );

    /// Publish a notification to every matching subscriber
    fn send(&self, topic: &str, body: &str);
}

struct Subscription {
    topic_prefix: String,
    platform: PlatformId,
    subscriber: Arc<dyn NotificationSubscriber>,
}

/// Subscriber identity is the pointee address, not the vtable
fn subscriber_key(subscriber: &Arc<dyn NotificationSubscriber>) -> usize {
    Arc::as_ptr(subscriber) as *const () as usize
}

/// Single-process `NotificationService`
#[derive(Default)]
pub struct LocalNotificationBus {
    subscriptions: Mutex<Vec<Subscription>>,
    sequences: Mutex<HashMap<String, u64>>,
}

impl LocalNotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered (prefix, platform, subscriber) triples
    pub fn subscription_count(&self) -> usize {
        self.lock_subscriptions().len()
    }

    fn lock_subscriptions(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_sequence(&self, topic: &str) -> u64 {
        let mut sequences = self.sequences.lock().unwrap_or_else(|e| e.into_inner());
        let sequence = sequences.entry(topic.to_string()).or_insert(0);
        *sequence += 1;
        *sequence
    }
}

impl NotificationService for LocalNotificationBus {
    fn subscribe(
        &self,
        topic_prefix: &str,
        subscriber: Arc<dyn NotificationSubscriber>,
        platform: &PlatformId,
    ) {
        let mut subscriptions = self.lock_subscriptions();
        let key = subscriber_key(&subscriber);
        let exists = subscriptions.iter().any(|s| {
            s.topic_prefix == topic_prefix && &s.platform == platform && subscriber_key(&s.subscriber) == key
        });
        if !exists {
            tracing::debug!("📥 Subscribed to '{}' on platform {}", topic_prefix, platform);
            subscriptions.push(Subscription {
                topic_prefix: topic_prefix.to_string(),
                platform: platform.clone(),
                subscriber,
            });
        }
    }

    fn unsubscribe(
        &self,
        topic_prefix: &str,
        subscriber: &Arc<dyn NotificationSubscriber>,
        platform: &PlatformId,
    ) {
        let key = subscriber_key(subscriber);
        self.lock_subscriptions().retain(|s| {
            !(s.topic_prefix == topic_prefix && &s.platform == platform && subscriber_key(&s.subscriber) == key)
        });
    }

    fn send(&self, topic: &str, body: &str) {
        let notification = Notification {
            topic: topic.to_string(),
            sequence: self.next_sequence(topic),
            body: body.to_string(),
        };

        let receivers: Vec<Arc<dyn NotificationSubscriber>> = {
            let subscriptions = self.lock_subscriptions();
            let mut seen = HashSet::new();
            subscriptions
                .iter()
                .filter(|s| topic.starts_with(&s.topic_prefix))
                .filter(|s| seen.insert(subscriber_key(&s.subscriber)))
                .map(|s| Arc::clone(&s.subscriber))
                .collect()
        };

        tracing::trace!(
            "Delivering '{}' #{} to {} subscribers",
            topic,
            notification.sequence,
            receivers.len()
        );
        for receiver in receivers {
            receiver.notify(&notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        received: Mutex<Vec<Notification>>,
    }

    impl NotificationSubscriber for Recorder {
        fn notify(&self, notification: &Notification) {
            self.received.lock().unwrap().push(notification.clone());
        }
    }

    #[test]
    fn prefix_match_delivers_once_per_subscriber() {
        let bus = LocalNotificationBus::new();
        let recorder = Arc::new(Recorder::default());
        let subscriber: Arc<dyn NotificationSubscriber> = recorder.clone();
        bus.subscribe("component.state.finished:", subscriber.clone(), &PlatformId::new("a"));
        bus.subscribe("component.state.finished:", subscriber.clone(), &PlatformId::new("b"));

        bus.send("component.state.finished:wf-1", "c-1");
        bus.send("component.state.failed:wf-1", "c-2");
        bus.send("component.state.finished:wf-1", "c-3");

        let received = recorder.received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].sequence, 1);
        assert_eq!(received[1].sequence, 2);
        assert_eq!(received[1].body, "c-3");
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = LocalNotificationBus::new();
        let recorder = Arc::new(Recorder::default());
        let subscriber: Arc<dyn NotificationSubscriber> = recorder.clone();
        let platform = PlatformId::new("local");
        bus.subscribe("t", subscriber.clone(), &platform);
        bus.unsubscribe("t", &subscriber, &platform);
        bus.unsubscribe("t", &subscriber, &platform);

        bus.send("topic", "x");
        assert!(recorder.received.lock().unwrap().is_empty());
        assert_eq!(bus.subscription_count(), 0);
    }
}
