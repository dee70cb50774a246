use libp2p::identity::Keypair;
use multiaddr::Multiaddr;
use murmur_primitives::SignaturePolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug)]
#[non_exhaustive]
pub struct NetworkConfig {
    pub identity: Keypair,

    pub swarm: SwarmConfig,
    pub gossipsub: GossipsubConfig,
    pub signature_policy: SignaturePolicy,
}

impl NetworkConfig {
    #[must_use]
    pub const fn new(
        identity: Keypair,
        swarm: SwarmConfig,
        gossipsub: GossipsubConfig,
        signature_policy: SignaturePolicy,
    ) -> Self {
        Self {
            identity,
            swarm,
            gossipsub,
            signature_policy,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[non_exhaustive]
pub struct SwarmConfig {
    pub listen: Vec<Multiaddr>,
}

impl SwarmConfig {
    #[must_use]
    pub const fn new(listen: Vec<Multiaddr>) -> Self {
        Self { listen }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct GossipsubConfig {
    /// Minimum number of peers in mesh (D_low in the gossipsub spec).
    /// For 2-node networks this should be 1.
    pub mesh_n_low: usize,

    /// Target number of peers in mesh (D).
    pub mesh_n: usize,

    /// Maximum number of peers in mesh (D_high).
    pub mesh_n_high: usize,

    /// Number of outbound-only peers to keep (D_out).
    pub mesh_outbound_min: usize,

    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
}

impl Default for GossipsubConfig {
    fn default() -> Self {
        // Optimized for small networks (2-20 nodes) while still reasonable
        // for larger ones.
        Self {
            mesh_n_low: 1,
            mesh_n: 2,
            mesh_n_high: 4,
            mesh_outbound_min: 1,
            heartbeat_interval_secs: 1,
        }
    }
}
