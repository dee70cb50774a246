//! The assembled node: substrate, relay, archive and store wired together.
//!
//! [`Node::spawn`] brings up the substrate, hangs the relay and the store
//! service off its event stream, and hands back a handle. Everything after
//! that is driven by background tasks; dropping the handle's last clone of
//! the substrate client shuts the event loop down.

use std::sync::Arc;

use eyre::{bail, Result as EyreResult};
use libp2p::identity::Keypair;
use libp2p::PeerId;
use multiaddr::{Multiaddr, Protocol};
use murmur_archive::{MemoryArchive, MessageArchive};
use murmur_network::{NetworkClient, NetworkConfig, NetworkEvent, SwarmConfig};
use murmur_relay::Relay;
use murmur_store::StoreClient;
use parking_lot::Mutex;
use tokio::spawn;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::debug;

mod config;

pub use config::{NodeConfig, StoreConfig};

/// Handle to a running node.
#[derive(Debug)]
pub struct Node {
    peer_id: PeerId,
    client: NetworkClient,
    relay: Arc<Relay>,
    archive: Arc<MemoryArchive>,
    store: StoreClient,
    listen_addrs: Arc<Mutex<Vec<Multiaddr>>>,
}

impl Node {
    /// Starts a node and returns once the substrate is listening.
    pub async fn spawn(config: NodeConfig) -> EyreResult<Self> {
        let identity = config
            .identity
            .unwrap_or_else(Keypair::generate_ed25519);
        let peer_id = identity.public().to_peer_id();

        let network_config = NetworkConfig::new(
            identity,
            SwarmConfig::new(config.listen),
            config.gossipsub,
            config.signature_policy,
        );

        let (client, event_receiver) = murmur_network::run(&network_config).await?;

        let archive = Arc::new(MemoryArchive::new());

        let relay_archive = config
            .store
            .archive
            .then(|| Arc::clone(&archive) as Arc<dyn MessageArchive>);
        let relay = Arc::new(Relay::new(client.clone(), &config.relay, relay_archive));

        let store = StoreClient::new(client.clone());

        let listen_addrs = Arc::new(Mutex::new(Vec::new()));

        drop(spawn(dispatch(
            event_receiver,
            Arc::clone(&relay),
            Arc::clone(&archive),
            Arc::clone(&listen_addrs),
            config.store.serve,
        )));

        Ok(Self {
            peer_id,
            client,
            relay,
            archive,
            store,
            listen_addrs,
        })
    }

    #[must_use]
    pub const fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    #[must_use]
    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    #[must_use]
    pub const fn store(&self) -> &StoreClient {
        &self.store
    }

    #[must_use]
    pub fn archive(&self) -> &MemoryArchive {
        &self.archive
    }

    #[must_use]
    pub const fn network(&self) -> &NetworkClient {
        &self.client
    }

    /// Connects to a peer. The address must carry the peer's `/p2p` suffix
    /// so the connection can be authenticated against it.
    pub async fn dial(&self, addr: Multiaddr) -> EyreResult<()> {
        if !matches!(addr.iter().last(), Some(Protocol::P2p(_))) {
            bail!("dial address must end in a /p2p peer id: {addr}");
        }

        self.client.dial(addr).await
    }

    /// Addresses the substrate has bound so far.
    #[must_use]
    pub fn listen_addrs(&self) -> Vec<Multiaddr> {
        self.listen_addrs.lock().clone()
    }

    /// Waits until at least one listen address is bound. Listener setup is
    /// asynchronous, so port-zero binds are only known after the fact.
    pub async fn wait_for_listen_addrs(&self) -> Vec<Multiaddr> {
        loop {
            let addrs = self.listen_addrs();
            if !addrs.is_empty() {
                return addrs;
            }

            sleep(Duration::from_millis(50)).await;
        }
    }
}

async fn dispatch(
    mut events: mpsc::Receiver<NetworkEvent>,
    relay: Arc<Relay>,
    archive: Arc<MemoryArchive>,
    listen_addrs: Arc<Mutex<Vec<Multiaddr>>>,
    serve_store: bool,
) {
    while let Some(event) = events.recv().await {
        match event {
            NetworkEvent::ListeningOn { address, .. } => {
                debug!(%address, "Listening");
                listen_addrs.lock().push(address);
            }
            NetworkEvent::Subscribed { peer_id, topic } => {
                debug!(%peer_id, %topic, "Peer subscribed");
            }
            NetworkEvent::Message { id, message } => {
                relay.handle_message(&id, &message);
            }
            NetworkEvent::StreamOpened { peer_id, stream } => {
                if serve_store {
                    debug!(%peer_id, "Serving store stream");
                    drop(spawn(murmur_store::serve(
                        *stream,
                        Arc::clone(&archive) as Arc<dyn MessageArchive>,
                    )));
                } else {
                    debug!(%peer_id, "Dropping store stream, serving is disabled");
                }
            }
        }
    }
}
