//! Wires a single peer's four actors (Receiver, Sender, Sender Queue,
//! Controller) around one `TcpStream`, mirroring the role
//! `cratetorrent::peer::PeerSession` plays for its own, simpler session
//! loop — but spawning the richer four-task pipeline this design calls for.

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{
    control::{self, PeerCommandSender},
    controller::{Controller, PeerConf},
    error::Error,
    receiver::Receiver,
    sender::Sender,
    sender_queue::{self, SenderQueue},
};

/// A handle to a running peer session: the control channel the Peer
/// Manager/Choke Manager use to drive this peer, the bandwidth-grant
/// channel the Choke Manager uses to fund outbound block data, and the
/// join handle for the whole session's completion.
pub struct PeerSession {
    pub command_tx: PeerCommandSender,
    pub grant_tx: mpsc::UnboundedSender<usize>,
    pub join: JoinHandle<Result<(), Error>>,
}

/// Spawns the Receiver, Sender and Sender Queue tasks and runs the
/// Controller to completion on the current task, returning once the
/// session has shut down.
///
/// `conf` must already carry this peer's identity, piece map and
/// collaborator handles (the handshake that produces them is out of
/// scope, per the design).
pub fn spawn(socket: TcpStream, conf: PeerConf) -> PeerSession {
    let (reader, writer) = socket.into_split();

    let (command_tx, command_rx) = control::channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (bandwidth_tx, bandwidth_rx) = mpsc::unbounded_channel();
    let (sq_cmd_tx, sq_cmd_rx) = sender_queue::channel(conf.tuning.send_queue_bound);
    let (written_tx, written_rx) = mpsc::unbounded_channel();
    let (grant_tx, grant_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut receiver = Receiver::new(reader, inbound_tx);
        if let Err(e) = receiver.run().await {
            log::warn!("receiver task ended: {}", e);
        }
    });

    tokio::spawn(async move {
        let mut sender = Sender::new(writer, out_rx, vec![written_tx, bandwidth_tx]);
        if let Err(e) = sender.run().await {
            log::warn!("sender task ended: {}", e);
        }
    });

    tokio::spawn(async move {
        let mut sender_queue = SenderQueue::new(sq_cmd_rx, written_rx, grant_rx, out_tx);
        sender_queue.run().await;
    });

    let join = tokio::spawn(async move {
        let mut controller =
            Controller::new(conf, inbound_rx, command_rx, bandwidth_rx, sq_cmd_tx);
        controller.run().await
    });

    PeerSession {
        command_tx,
        grant_tx,
        join,
    }
}
