//! Live message distribution over the shared relay topic.
//!
//! The relay rides the substrate's pubsub: outbound messages are encoded and
//! published, inbound ones run the decode → policy → dedup → archive →
//! deliver pipeline. Malformed or policy-rejected input is absorbed here so a
//! single bad peer can never stall message processing for everyone else.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use libp2p::gossipsub::{IdentTopic, Message as PubsubMessage, MessageId, TopicHash};
use murmur_archive::MessageArchive;
use murmur_network::NetworkClient;
use murmur_primitives::{Digest, Message, SignaturePolicy, RELAY_TOPIC};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

mod dedup;

pub use dedup::DedupCache;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub signature_policy: SignaturePolicy,

    /// Size of the dedup recency set.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,

    /// Bound of each local subscriber's delivery queue.
    #[serde(default = "default_subscriber_queue_capacity")]
    pub subscriber_queue_capacity: usize,
}

const fn default_dedup_capacity() -> usize {
    1_024
}

const fn default_subscriber_queue_capacity() -> usize {
    256
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            signature_policy: SignaturePolicy::default(),
            dedup_capacity: default_dedup_capacity(),
            subscriber_queue_capacity: default_subscriber_queue_capacity(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("already subscribed to the relay topic")]
    AlreadySubscribed,
    #[error("not subscribed to the relay topic")]
    NotSubscribed,
    #[error("malformed message: {0}")]
    Encode(#[from] murmur_codec::EncodeError),
    #[error("substrate rejected the send: {0}")]
    Publish(eyre::Report),
    #[error("substrate rejected the subscription change: {0}")]
    Subscription(eyre::Report),
}

/// One relay instance bound to the well-known topic.
#[derive(Debug)]
pub struct Relay {
    client: NetworkClient,
    topic: IdentTopic,
    topic_hash: TopicHash,
    policy: SignaturePolicy,
    subscribed: AtomicBool,
    dedup: Mutex<DedupCache>,
    subscribers: Mutex<Vec<mpsc::Sender<Message>>>,
    queue_capacity: usize,
    archive: Option<Arc<dyn MessageArchive>>,
}

impl Relay {
    #[must_use]
    pub fn new(
        client: NetworkClient,
        config: &RelayConfig,
        archive: Option<Arc<dyn MessageArchive>>,
    ) -> Self {
        let topic = IdentTopic::new(RELAY_TOPIC);
        let topic_hash = topic.hash();

        Self {
            client,
            topic,
            topic_hash,
            policy: config.signature_policy,
            subscribed: AtomicBool::new(false),
            dedup: Mutex::new(DedupCache::new(config.dedup_capacity)),
            subscribers: Mutex::new(Vec::new()),
            queue_capacity: config.subscriber_queue_capacity,
            archive,
        }
    }

    #[must_use]
    pub fn topic_hash(&self) -> &TopicHash {
        &self.topic_hash
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }

    /// Registers a local subscriber and returns its delivery queue.
    ///
    /// Delivery is at-most-once in arrival order; messages overflowing a
    /// lagging subscriber's queue are dropped for that subscriber only.
    #[must_use]
    pub fn subscriber(&self) -> mpsc::Receiver<Message> {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Begins consuming the shared relay topic from the substrate.
    pub async fn subscribe(&self) -> Result<(), RelayError> {
        if self
            .subscribed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RelayError::AlreadySubscribed);
        }

        if let Err(err) = self.client.subscribe(self.topic.clone()).await {
            self.subscribed.store(false, Ordering::Release);
            return Err(RelayError::Subscription(err));
        }

        Ok(())
    }

    pub async fn unsubscribe(&self) -> Result<(), RelayError> {
        if self
            .subscribed
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RelayError::NotSubscribed);
        }

        if let Err(err) = self.client.unsubscribe(self.topic.clone()).await {
            self.subscribed.store(true, Ordering::Release);
            return Err(RelayError::Subscription(err));
        }

        Ok(())
    }

    /// Encodes and hands a message to the substrate.
    ///
    /// Legal in either subscription state; a substrate rejection (e.g. not
    /// yet connected to any topic peer) is reported, never retried here.
    pub async fn publish(&self, message: &Message) -> Result<MessageId, RelayError> {
        let encoded = murmur_codec::encode(message)?;

        self.client
            .publish(self.topic_hash.clone(), encoded)
            .await
            .map_err(RelayError::Publish)
    }

    /// Convenience for callers waiting on topic connectivity.
    pub async fn mesh_peer_count(&self) -> usize {
        self.client.mesh_peer_count(self.topic_hash.clone()).await
    }

    /// Inbound pipeline, invoked once per substrate topic delivery.
    pub fn handle_message(&self, id: &MessageId, message: &PubsubMessage) {
        if message.topic != self.topic_hash {
            debug!(topic = %message.topic, "Ignoring message for foreign topic");
            return;
        }

        if !self.is_subscribed() {
            debug!(%id, "Dropping message received while unsubscribed");
            return;
        }

        let decoded = match murmur_codec::decode(&message.data) {
            Ok(decoded) => decoded,
            Err(err) => {
                debug!(%id, %err, "Dropping undecodable message");
                return;
            }
        };

        if !self.policy.admits(message.source.is_some()) {
            debug!(
                %id,
                policy = %self.policy,
                signed = message.source.is_some(),
                "Dropping message rejected by signature policy"
            );
            return;
        }

        let digest = Digest::of(&message.data);

        if !self.dedup.lock().insert(digest) {
            debug!(%id, %digest, "Suppressing duplicate message");
            return;
        }

        if let Some(archive) = &self.archive {
            let _key = archive.append(RELAY_TOPIC, decoded.clone(), digest);
        }

        self.deliver(decoded);
    }

    fn deliver(&self, message: Message) {
        let mut subscribers = self.subscribers.lock();

        subscribers.retain(|sender| match sender.try_send(message.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Subscriber queue full, dropping message for it");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}
