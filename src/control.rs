//! The control channel on which the Peer Manager and Choke Manager send
//! directives to a single peer's Controller.

use tokio::sync::mpsc;

use crate::{block::BlockInfo, PieceIndex};

pub type PeerCommandSender = mpsc::UnboundedSender<PeerCommand>;
pub type PeerCommandReceiver = mpsc::UnboundedReceiver<PeerCommand>;

/// Directives a Controller may receive from the Peer Manager or Choke
/// Manager on its control channel.
pub enum PeerCommand {
    /// A piece the local client just finished has been verified and should
    /// be announced to this peer.
    PieceCompleted(PieceIndex),
    /// The Choke Manager decided to choke this peer.
    ChokePeer,
    /// The Choke Manager decided to unchoke this peer.
    UnchokePeer,
    /// The swarm no longer wants a block this Controller had queued (e.g.
    /// another peer delivered it first); prune it from both `blockQueue`
    /// and the outbound send queue.
    CancelBlock(PieceIndex, BlockInfo),
    /// The supervisor is shutting this peer down.
    Shutdown,
}

pub fn channel() -> (PeerCommandSender, PeerCommandReceiver) {
    mpsc::unbounded_channel()
}
