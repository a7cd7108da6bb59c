//! The outbound message port and in-process implementations.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::message::Message;

/// Outbound side of the transport: a non-blocking publish.
pub trait MessagePublisher: Send + Sync {
    /// Publish a message onto its topic.
    fn publish(&self, message: Message);
}

impl<P: MessagePublisher + ?Sized> MessagePublisher for Arc<P> {
    fn publish(&self, message: Message) {
        (**self).publish(message);
    }
}

type Handler = Arc<dyn Fn(Message) + Send + Sync>;

struct Subscriber {
    topic: String,
    handler: Handler,
}

/// A topic-routed in-process bus.
///
/// Delivery is synchronous and fans out to every subscriber of the topic,
/// the publisher included; consensus handlers are idempotent against
/// hearing their own messages.
#[derive(Default)]
pub struct LoopbackBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl LoopbackBus {
    /// An empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one topic.
    pub fn subscribe(&self, topic: impl Into<String>, handler: impl Fn(Message) + Send + Sync + 'static) {
        self.subscribers.lock().push(Subscriber {
            topic: topic.into(),
            handler: Arc::new(handler),
        });
    }
}

impl MessagePublisher for LoopbackBus {
    fn publish(&self, message: Message) {
        let handlers: Vec<Handler> = self
            .subscribers
            .lock()
            .iter()
            .filter(|sub| sub.topic == message.uri)
            .map(|sub| Arc::clone(&sub.handler))
            .collect();
        // Handlers run outside the subscriber lock so they may publish.
        for handler in handlers {
            handler(message.clone());
        }
    }
}

/// A publisher that just records everything, for handler tests.
#[derive(Default)]
pub struct RecordingBus {
    messages: Mutex<Vec<Message>>,
}

impl RecordingBus {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded messages.
    pub fn take(&self) -> Vec<Message> {
        std::mem::take(&mut self.messages.lock())
    }

    /// Number of recorded messages.
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Whether nothing was published.
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl MessagePublisher for RecordingBus {
    fn publish(&self, message: Message) {
        self.messages.lock().push(message);
    }
}
