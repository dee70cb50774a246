use eyre::eyre;
use libp2p::gossipsub;
use libp2p::swarm::SwarmEvent;
use tracing::{debug, error};

use crate::events::NetworkEvent;
use crate::{BehaviourEvent, EventLoop};

impl EventLoop {
    pub(crate) async fn handle_swarm_event(&mut self, event: SwarmEvent<BehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr {
                listener_id,
                address,
            } => {
                debug!(%listener_id, %address, "Listening on address");

                if let Err(err) = self
                    .event_sender
                    .send(NetworkEvent::ListeningOn {
                        listener_id,
                        address,
                    })
                    .await
                {
                    error!(%err, "Failed to send listening-on event");
                }
            }
            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                debug!(%peer_id, "Connection established");

                if let Some(outcome) = self.pending_dial.remove(&peer_id) {
                    let _ignored = outcome.send(Ok(()));
                }
            }
            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                debug!(?peer_id, %error, "Outgoing connection failed");

                if let Some(outcome) = peer_id.and_then(|id| self.pending_dial.remove(&id)) {
                    let _ignored = outcome.send(Err(eyre!("Failed to dial peer: {}", error)));
                }
            }
            SwarmEvent::Behaviour(BehaviourEvent::Gossipsub(event)) => {
                self.handle_gossipsub_event(event).await;
            }
            SwarmEvent::Behaviour(BehaviourEvent::Identify(event)) => {
                debug!("identify: {:?}", event);
            }
            SwarmEvent::Behaviour(BehaviourEvent::Ping(event)) => {
                debug!("ping: {:?}", event);
            }
            other => {
                debug!("swarm: {:?}", other);
            }
        }
    }

    async fn handle_gossipsub_event(&mut self, event: gossipsub::Event) {
        debug!("gossipsub: {:?}", event);

        match event {
            gossipsub::Event::Message {
                message_id: id,
                message,
                ..
            } => {
                if let Err(err) = self
                    .event_sender
                    .send(NetworkEvent::Message { id, message })
                    .await
                {
                    error!(%err, "Failed to send message event");
                }
            }
            gossipsub::Event::Subscribed { peer_id, topic } => {
                if let Err(err) = self
                    .event_sender
                    .send(NetworkEvent::Subscribed { peer_id, topic })
                    .await
                {
                    error!(%err, "Failed to send subscribed event");
                }
            }
            _ => {}
        }
    }
}
