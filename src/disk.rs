//! The client-side interface to the File System Process.
//!
//! The real disk-reading implementation is out of scope here (see the
//! design's §1); this module implements only the `ReadBlock` RPC contract
//! the Controller uses to serve outbound block requests.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::{block::BlockInfo, error::Error, PieceIndex};

pub enum DiskRequest {
    ReadBlock(PieceIndex, BlockInfo, oneshot::Sender<Result<Bytes, Error>>),
}

#[derive(Clone)]
pub struct DiskHandle {
    tx: mpsc::UnboundedSender<DiskRequest>,
}

impl DiskHandle {
    pub fn new(tx: mpsc::UnboundedSender<DiskRequest>) -> Self {
        Self { tx }
    }

    /// Synchronously (from the Controller's perspective) reads a block from
    /// disk to serve an incoming `REQUEST`.
    ///
    /// The design notes (§9, open question 4) that this blocks the
    /// Controller task on a potentially slow disk, and that pushing it into
    /// the Sender's path instead is a known follow-up, not implemented
    /// here.
    pub async fn read_block(&self, piece_index: PieceIndex, block: BlockInfo) -> Result<Bytes, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(DiskRequest::ReadBlock(piece_index, block, reply_tx))
            .map_err(|_| Error::ChannelClosed("file system"))?;
        reply_rx
            .await
            .map_err(|_| Error::ChannelClosed("file system"))?
    }
}
