use libp2p::{PeerId, Stream as P2pStream};
use tracing::{debug, error};

use crate::events::NetworkEvent;
use crate::stream::Stream;
use crate::EventLoop;

impl EventLoop {
    pub(crate) async fn handle_incoming_stream(&mut self, (peer_id, stream): (PeerId, P2pStream)) {
        debug!(%peer_id, "Peer opened a stream");

        if let Err(err) = self
            .event_sender
            .send(NetworkEvent::StreamOpened {
                peer_id,
                stream: Box::new(Stream::new(stream)),
            })
            .await
        {
            error!(%err, "Failed to send stream-opened event");
        }
    }
}
