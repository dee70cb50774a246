use std::net::Ipv4Addr;

use libp2p::identity::Keypair;
use multiaddr::{Multiaddr, Protocol};
use murmur_network::GossipsubConfig;
use murmur_primitives::SignaturePolicy;
use murmur_relay::RelayConfig;
use serde::{Deserialize, Serialize};

/// Everything a node needs to come up.
#[derive(Debug)]
pub struct NodeConfig {
    /// Fixed identity; a fresh ed25519 keypair is generated when absent.
    pub identity: Option<Keypair>,
    pub listen: Vec<Multiaddr>,
    pub gossipsub: GossipsubConfig,
    pub signature_policy: SignaturePolicy,
    pub relay: RelayConfig,
    pub store: StoreConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            identity: None,
            listen: vec![Multiaddr::empty()
                .with(Protocol::Ip4(Ipv4Addr::UNSPECIFIED))
                .with(Protocol::Tcp(0))],
            gossipsub: GossipsubConfig::default(),
            signature_policy: SignaturePolicy::default(),
            relay: RelayConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Answer store queries from peers.
    #[serde(default = "default_true")]
    pub serve: bool,

    /// Archive relayed messages locally. Without it the node still relays
    /// and can query others, but has nothing to serve.
    #[serde(default = "default_true")]
    pub archive: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            serve: true,
            archive: true,
        }
    }
}
