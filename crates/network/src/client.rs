use eyre::Result as EyreResult;
use libp2p::gossipsub::{IdentTopic, MessageId, TopicHash};
use libp2p::{Multiaddr, PeerId, StreamProtocol};
use tokio::sync::{mpsc, oneshot};

use crate::stream::Stream;

/// Commands accepted by the substrate event loop. Every command carries a
/// oneshot for its outcome so callers never block on anything but their own
/// request.
#[derive(Debug)]
pub enum NetworkMessage {
    Dial {
        request: Multiaddr,
        outcome: oneshot::Sender<EyreResult<()>>,
    },
    ListenOn {
        request: Multiaddr,
        outcome: oneshot::Sender<EyreResult<()>>,
    },
    Subscribe {
        request: IdentTopic,
        outcome: oneshot::Sender<EyreResult<IdentTopic>>,
    },
    Unsubscribe {
        request: IdentTopic,
        outcome: oneshot::Sender<EyreResult<IdentTopic>>,
    },
    Publish {
        topic: TopicHash,
        data: Vec<u8>,
        outcome: oneshot::Sender<EyreResult<MessageId>>,
    },
    OpenStream {
        peer_id: PeerId,
        protocol: StreamProtocol,
        outcome: oneshot::Sender<EyreResult<Stream>>,
    },
    PeerCount {
        outcome: oneshot::Sender<usize>,
    },
    MeshPeerCount {
        topic: TopicHash,
        outcome: oneshot::Sender<usize>,
    },
}

/// Handle to the substrate event loop.
#[derive(Clone, Debug)]
pub struct NetworkClient {
    sender: mpsc::Sender<NetworkMessage>,
}

impl NetworkClient {
    #[must_use]
    pub const fn new(sender: mpsc::Sender<NetworkMessage>) -> Self {
        Self { sender }
    }

    pub async fn dial(&self, peer_addr: Multiaddr) -> EyreResult<()> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(NetworkMessage::Dial {
                request: peer_addr,
                outcome: tx,
            })
            .await
            .expect("Mailbox not to be dropped");

        rx.await.expect("Mailbox not to be dropped")
    }

    pub async fn listen_on(&self, addr: Multiaddr) -> EyreResult<()> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(NetworkMessage::ListenOn {
                request: addr,
                outcome: tx,
            })
            .await
            .expect("Mailbox not to be dropped");

        rx.await.expect("Mailbox not to be dropped")
    }

    pub async fn subscribe(&self, topic: IdentTopic) -> EyreResult<IdentTopic> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(NetworkMessage::Subscribe {
                request: topic,
                outcome: tx,
            })
            .await
            .expect("Mailbox not to be dropped");

        rx.await.expect("Mailbox not to be dropped")
    }

    pub async fn unsubscribe(&self, topic: IdentTopic) -> EyreResult<IdentTopic> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(NetworkMessage::Unsubscribe {
                request: topic,
                outcome: tx,
            })
            .await
            .expect("Mailbox not to be dropped");

        rx.await.expect("Mailbox not to be dropped")
    }

    pub async fn publish(&self, topic: TopicHash, data: Vec<u8>) -> EyreResult<MessageId> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(NetworkMessage::Publish {
                topic,
                data,
                outcome: tx,
            })
            .await
            .expect("Mailbox not to be dropped");

        rx.await.expect("Mailbox not to be dropped")
    }

    pub async fn open_stream(&self, peer_id: PeerId, protocol: StreamProtocol) -> EyreResult<Stream> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(NetworkMessage::OpenStream {
                peer_id,
                protocol,
                outcome: tx,
            })
            .await
            .expect("Mailbox not to be dropped");

        rx.await.expect("Mailbox not to be dropped")
    }

    pub async fn peer_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(NetworkMessage::PeerCount { outcome: tx })
            .await
            .expect("Mailbox not to be dropped");

        rx.await.expect("Mailbox not to be dropped")
    }

    pub async fn mesh_peer_count(&self, topic: TopicHash) -> usize {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(NetworkMessage::MeshPeerCount { topic, outcome: tx })
            .await
            .expect("Mailbox not to be dropped");

        rx.await.expect("Mailbox not to be dropped")
    }
}
