use std::collections::hash_map::HashMap;

use eyre::{bail, Result as EyreResult};
use futures_util::StreamExt;
use libp2p::gossipsub::{
    Behaviour as GossipsubBehaviour, ConfigBuilder as GossipsubConfigBuilder, MessageAuthenticity,
    ValidationMode,
};
use libp2p::identify::{Behaviour as IdentifyBehaviour, Config as IdentifyConfig};
use libp2p::noise::Config as NoiseConfig;
use libp2p::ping::Behaviour as PingBehaviour;
use libp2p::swarm::{NetworkBehaviour, Swarm};
use libp2p::tcp::Config as TcpConfig;
use libp2p::tls::Config as TlsConfig;
use libp2p::yamux::Config as YamuxConfig;
use libp2p::{PeerId, SwarmBuilder};
use libp2p_stream::{Behaviour as StreamBehaviour, IncomingStreams};
use murmur_primitives::SignaturePolicy;
use tokio::select;
use tokio::spawn;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;

pub mod client;
pub mod config;
pub mod events;
mod handlers;
pub mod stream;

pub use client::{NetworkClient, NetworkMessage};
pub use config::{GossipsubConfig, NetworkConfig, SwarmConfig};
pub use events::NetworkEvent;
pub use stream::{CodecError, Frame, FrameCodec, Stream, MAX_FRAME_SIZE, MURMUR_STORE_PROTOCOL};

const PROTOCOL_VERSION: &str = concat!("/", env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(NetworkBehaviour)]
struct Behaviour {
    gossipsub: GossipsubBehaviour,
    identify: IdentifyBehaviour,
    ping: PingBehaviour,
    stream: StreamBehaviour,
}

/// Starts the substrate: builds the swarm, spawns the event loop, and binds
/// the configured listen addresses.
pub async fn run(
    config: &NetworkConfig,
) -> EyreResult<(NetworkClient, mpsc::Receiver<NetworkEvent>)> {
    let (client, event_receiver, event_loop) = init(config)?;

    drop(spawn(event_loop.run()));

    for addr in &config.swarm.listen {
        client.listen_on(addr.clone()).await?;
    }

    Ok((client, event_receiver))
}

fn init(
    config: &NetworkConfig,
) -> EyreResult<(NetworkClient, mpsc::Receiver<NetworkEvent>, EventLoop)> {
    // The configured signature policy fixes the gossipsub signing mode at
    // construction; the relay applies the same policy per message on top.
    let (authenticity, validation_mode) = match config.signature_policy {
        SignaturePolicy::AcceptAny => (
            MessageAuthenticity::Signed(config.identity.clone()),
            ValidationMode::Permissive,
        ),
        SignaturePolicy::RequireSigned => (
            MessageAuthenticity::Signed(config.identity.clone()),
            ValidationMode::Strict,
        ),
        SignaturePolicy::RequireUnsigned => {
            (MessageAuthenticity::Anonymous, ValidationMode::Anonymous)
        }
    };

    let gossipsub_config = GossipsubConfigBuilder::default()
        .validation_mode(validation_mode)
        .mesh_n_low(config.gossipsub.mesh_n_low)
        .mesh_n(config.gossipsub.mesh_n)
        .mesh_n_high(config.gossipsub.mesh_n_high)
        .mesh_outbound_min(config.gossipsub.mesh_outbound_min)
        .heartbeat_interval(Duration::from_secs(config.gossipsub.heartbeat_interval_secs))
        .build();

    let gossipsub_config = match gossipsub_config {
        Ok(gossipsub_config) => gossipsub_config,
        Err(err) => bail!("Invalid gossipsub config: {:?}", err),
    };

    let swarm = SwarmBuilder::with_existing_identity(config.identity.clone())
        .with_tokio()
        .with_tcp(
            TcpConfig::default(),
            (TlsConfig::new, NoiseConfig::new),
            YamuxConfig::default,
        )?
        .with_quic()
        .with_behaviour(|key| Behaviour {
            gossipsub: GossipsubBehaviour::new(authenticity, gossipsub_config)
                .expect("Valid gossipsub config."),
            identify: IdentifyBehaviour::new(
                IdentifyConfig::new(PROTOCOL_VERSION.to_owned(), key.public())
                    .with_push_listen_addr_updates(true),
            ),
            ping: PingBehaviour::default(),
            stream: StreamBehaviour::new(),
        })
        .map_err(|err| eyre::eyre!("Failed to setup swarm behaviour: {:?}", err))?
        .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(Duration::from_secs(30)))
        .build();

    let incoming_streams = match swarm
        .behaviour()
        .stream
        .new_control()
        .accept(stream::MURMUR_STORE_PROTOCOL)
    {
        Ok(incoming_streams) => incoming_streams,
        Err(err) => {
            bail!("Failed to setup control for stream protocol: {:?}", err)
        }
    };

    let (command_sender, command_receiver) = mpsc::channel(32);
    let (event_sender, event_receiver) = mpsc::channel(32);

    let client = NetworkClient::new(command_sender);

    let event_loop = EventLoop::new(swarm, incoming_streams, command_receiver, event_sender);

    Ok((client, event_receiver, event_loop))
}

pub(crate) struct EventLoop {
    swarm: Swarm<Behaviour>,
    incoming_streams: IncomingStreams,
    command_receiver: mpsc::Receiver<NetworkMessage>,
    event_sender: mpsc::Sender<NetworkEvent>,
    pending_dial: HashMap<PeerId, oneshot::Sender<EyreResult<()>>>,
}

impl EventLoop {
    fn new(
        swarm: Swarm<Behaviour>,
        incoming_streams: IncomingStreams,
        command_receiver: mpsc::Receiver<NetworkMessage>,
        event_sender: mpsc::Sender<NetworkEvent>,
    ) -> Self {
        Self {
            swarm,
            incoming_streams,
            command_receiver,
            event_sender,
            pending_dial: HashMap::default(),
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            select! {
                event = self.swarm.next() => {
                    self.handle_swarm_event(event.expect("Swarm stream to be infinite.")).await;
                },
                incoming_stream = self.incoming_streams.next() => {
                    self.handle_incoming_stream(incoming_stream.expect("Incoming streams to be infinite.")).await;
                },
                command = self.command_receiver.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command);
                }
            }
        }
    }
}
