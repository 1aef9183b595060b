//! The Sender: drains the Sender Queue's single-message output and writes it
//! to the peer's socket.

use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;

use crate::{error::Error, wire::codec::PeerCodec, wire::Message};

/// Runs until its inbound channel closes or a write fails.
///
/// Every message written reports its encoded length back on
/// `bytes_written`, fanned out to both the Sender Queue (for budget
/// accounting) and the Controller (for `up_rate` sampling), matching the
/// two consumers described for the Sender's output.
pub struct Sender<W> {
    sink: FramedWrite<W, PeerCodec>,
    msg_rx: mpsc::UnboundedReceiver<Message>,
    bytes_written_tx: Vec<mpsc::UnboundedSender<usize>>,
}

impl<W: AsyncWrite + Unpin> Sender<W> {
    pub fn new(
        writer: W,
        msg_rx: mpsc::UnboundedReceiver<Message>,
        bytes_written_tx: Vec<mpsc::UnboundedSender<usize>>,
    ) -> Self {
        Self {
            sink: FramedWrite::new(writer, PeerCodec),
            msg_rx,
            bytes_written_tx,
        }
    }

    pub async fn run(&mut self) -> Result<(), Error> {
        while let Some(msg) = self.msg_rx.recv().await {
            let len = encoded_len(&msg);
            self.sink.send(msg).await?;
            for tx in &self.bytes_written_tx {
                let _ = tx.send(len);
            }
        }
        log::debug!("sender channel closed, shutting down");
        Ok(())
    }
}

/// The number of bytes this message will occupy on the wire, length prefix
/// included, used for bandwidth accounting without re-encoding.
fn encoded_len(msg: &Message) -> usize {
    let payload_len = match msg {
        Message::KeepAlive => 0,
        Message::Choke
        | Message::Unchoke
        | Message::Interested
        | Message::NotInterested => 1,
        Message::Have(_) => 5,
        Message::Bitfield(bits) => 1 + (bits.len() + 7) / 8,
        Message::Request(_) | Message::Cancel(_) => 13,
        Message::Piece { data, .. } => 9 + data.len(),
        Message::Port(_) => 3,
    };
    4 + payload_len
}
