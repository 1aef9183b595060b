//! The client-side interface to the Piece Manager.
//!
//! The Piece Manager itself — global authority on which blocks are still
//! needed and where to store them — is out of scope (see the design's §1);
//! this module only implements the channel contract the Controller depends
//! on, per §6. Tests provide a mock actor behind this same channel.

use tokio::sync::{mpsc, oneshot};

use crate::{error::Error, piece_set::PieceSet, PieceIndex};

use crate::block::BlockInfo;

/// The reply to a `GrabBlocks` request: whether the piece manager is still
/// in normal leeching mode, or has moved to endgame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrabResult {
    Leech(Vec<(PieceIndex, BlockInfo)>),
    Endgame(Vec<(PieceIndex, BlockInfo)>),
}

impl GrabResult {
    pub fn into_blocks(self) -> Vec<(PieceIndex, BlockInfo)> {
        match self {
            Self::Leech(b) | Self::Endgame(b) => b,
        }
    }

    pub fn is_endgame(&self) -> bool {
        matches!(self, Self::Endgame(_))
    }
}

/// The requests a Controller may issue to the Piece Manager.
pub enum PieceManagerRequest {
    GetDone(oneshot::Sender<Vec<PieceIndex>>),
    PeerHave(Vec<PieceIndex>),
    PeerUnhave(Vec<PieceIndex>),
    AskInterested(PieceSet, oneshot::Sender<bool>),
    GrabBlocks(usize, PieceSet, oneshot::Sender<GrabResult>),
    StoreBlock(PieceIndex, BlockInfo, bytes::Bytes),
    PutbackBlocks(Vec<(PieceIndex, BlockInfo)>),
}

/// A cheaply cloneable handle the Controller uses to talk to the Piece
/// Manager. Synchronous-looking RPCs (`get_done`, `ask_interested`,
/// `grab_blocks`) are implemented as send-then-await-oneshot.
#[derive(Clone)]
pub struct PieceManagerHandle {
    tx: mpsc::UnboundedSender<PieceManagerRequest>,
}

impl PieceManagerHandle {
    pub fn new(tx: mpsc::UnboundedSender<PieceManagerRequest>) -> Self {
        Self { tx }
    }

    fn send(&self, req: PieceManagerRequest) -> Result<(), Error> {
        self.tx
            .send(req)
            .map_err(|_| Error::ChannelClosed("piece manager"))
    }

    pub async fn get_done(&self) -> Result<Vec<PieceIndex>, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(PieceManagerRequest::GetDone(reply_tx))?;
        reply_rx.await.map_err(|_| Error::ChannelClosed("piece manager"))
    }

    pub fn peer_have(&self, pieces: Vec<PieceIndex>) -> Result<(), Error> {
        self.send(PieceManagerRequest::PeerHave(pieces))
    }

    pub fn peer_unhave(&self, pieces: Vec<PieceIndex>) -> Result<(), Error> {
        self.send(PieceManagerRequest::PeerUnhave(pieces))
    }

    pub async fn ask_interested(&self, peer_pieces: PieceSet) -> Result<bool, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(PieceManagerRequest::AskInterested(peer_pieces, reply_tx))?;
        reply_rx.await.map_err(|_| Error::ChannelClosed("piece manager"))
    }

    pub async fn grab_blocks(
        &self,
        n: usize,
        peer_pieces: PieceSet,
    ) -> Result<GrabResult, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(PieceManagerRequest::GrabBlocks(n, peer_pieces, reply_tx))?;
        reply_rx.await.map_err(|_| Error::ChannelClosed("piece manager"))
    }

    pub fn store_block(
        &self,
        piece_index: PieceIndex,
        block: BlockInfo,
        data: bytes::Bytes,
    ) -> Result<(), Error> {
        self.send(PieceManagerRequest::StoreBlock(piece_index, block, data))
    }

    pub fn putback_blocks(&self, blocks: Vec<(PieceIndex, BlockInfo)>) -> Result<(), Error> {
        if blocks.is_empty() {
            return Ok(());
        }
        self.send(PieceManagerRequest::PutbackBlocks(blocks))
    }
}
