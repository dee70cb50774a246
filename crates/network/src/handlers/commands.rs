use eyre::eyre;
use multiaddr::Protocol;
use tracing::debug;

use crate::client::NetworkMessage;
use crate::stream::Stream;
use crate::EventLoop;

impl EventLoop {
    pub(crate) fn handle_command(&mut self, command: NetworkMessage) {
        match command {
            NetworkMessage::Dial {
                request: mut peer_addr,
                outcome,
            } => {
                let Some(Protocol::P2p(peer_id)) = peer_addr.pop() else {
                    let _ignored =
                        outcome.send(Err(eyre!("No peer ID in address: {}", peer_addr)));
                    return;
                };

                if self.pending_dial.contains_key(&peer_id) {
                    // A dial to this peer is already in flight; piggyback on it.
                    let _ignored = outcome.send(Ok(()));
                    return;
                }

                match self.swarm.dial(peer_addr) {
                    Ok(()) => {
                        let _ignored = self.pending_dial.insert(peer_id, outcome);
                    }
                    Err(err) => {
                        let _ignored = outcome.send(Err(eyre!(err)));
                    }
                }
            }
            NetworkMessage::ListenOn { request, outcome } => {
                let result = self
                    .swarm
                    .listen_on(request)
                    .map(|_listener_id| ())
                    .map_err(|err| eyre!(err));

                let _ignored = outcome.send(result);
            }
            NetworkMessage::Subscribe { request, outcome } => {
                let result = match self.swarm.behaviour_mut().gossipsub.subscribe(&request) {
                    Ok(_newly) => Ok(request),
                    Err(err) => Err(eyre!("Failed to subscribe: {:?}", err)),
                };

                let _ignored = outcome.send(result);
            }
            NetworkMessage::Unsubscribe { request, outcome } => {
                let _ignored = self.swarm.behaviour_mut().gossipsub.unsubscribe(&request);

                let _ignored = outcome.send(Ok(request));
            }
            NetworkMessage::Publish {
                topic,
                data,
                outcome,
            } => {
                let result = self
                    .swarm
                    .behaviour_mut()
                    .gossipsub
                    .publish(topic, data)
                    .map_err(|err| eyre!("Failed to publish: {:?}", err));

                let _ignored = outcome.send(result);
            }
            NetworkMessage::OpenStream {
                peer_id,
                protocol,
                outcome,
            } => {
                let mut control = self.swarm.behaviour().stream.new_control();

                // Opening negotiates on the wire; do it off the event loop.
                drop(tokio::spawn(async move {
                    let result = match control.open_stream(peer_id, protocol).await {
                        Ok(stream) => Ok(Stream::new(stream)),
                        Err(err) => Err(eyre!("Failed to open stream: {:?}", err)),
                    };

                    let _ignored = outcome.send(result);
                }));
            }
            NetworkMessage::PeerCount { outcome } => {
                let _ignored = outcome.send(self.swarm.connected_peers().count());
            }
            NetworkMessage::MeshPeerCount { topic, outcome } => {
                debug!(%topic, "Checking mesh peer count");

                let count = self.swarm.behaviour().gossipsub.mesh_peers(&topic).count();

                let _ignored = outcome.send(count);
            }
        }
    }
}
