//! The client-side interface to the Peer Manager, the supervisor that
//! tracks live peers and announces connect/disconnect (out of scope; see
//! the design's §1).

use tokio::sync::mpsc;

use crate::{control::PeerCommandSender, error::Error, PeerId, Sha1Hash};

pub enum PeerManagerEvent {
    Connect {
        info_hash: Sha1Hash,
        peer_id: PeerId,
        control: PeerCommandSender,
    },
    Disconnect(PeerId),
}

#[derive(Clone)]
pub struct PeerManagerHandle {
    tx: mpsc::UnboundedSender<PeerManagerEvent>,
}

impl PeerManagerHandle {
    pub fn new(tx: mpsc::UnboundedSender<PeerManagerEvent>) -> Self {
        Self { tx }
    }

    pub fn connect(
        &self,
        info_hash: Sha1Hash,
        peer_id: PeerId,
        control: PeerCommandSender,
    ) -> Result<(), Error> {
        self.tx
            .send(PeerManagerEvent::Connect {
                info_hash,
                peer_id,
                control,
            })
            .map_err(|_| Error::ChannelClosed("peer manager"))
    }

    pub fn disconnect(&self, peer_id: PeerId) -> Result<(), Error> {
        self.tx
            .send(PeerManagerEvent::Disconnect(peer_id))
            .map_err(|_| Error::ChannelClosed("peer manager"))
    }
}
