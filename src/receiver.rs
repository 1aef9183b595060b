//! The Receiver: reads framed messages off the peer's socket and forwards
//! them to the Controller.

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;

use crate::{error::Error, wire::codec::PeerCodec, wire::Message};

/// An inbound message paired with the number of bytes it occupied on the
/// wire, so the Controller can sample `down_rate` without re-encoding.
pub struct Inbound {
    pub message: Message,
    pub bytes_on_wire: usize,
}

/// Runs until the socket is closed or a framing error occurs. Framing
/// errors are fatal: they're forwarded once on `msg_tx` is no longer
/// useful, so the Receiver instead returns the error to its caller, which
/// tears the peer down.
pub struct Receiver<R> {
    stream: FramedRead<R, PeerCodec>,
    msg_tx: mpsc::UnboundedSender<Inbound>,
}

impl<R: AsyncRead + Unpin> Receiver<R> {
    pub fn new(reader: R, msg_tx: mpsc::UnboundedSender<Inbound>) -> Self {
        Self {
            stream: FramedRead::new(reader, PeerCodec),
            msg_tx,
        }
    }

    pub async fn run(&mut self) -> Result<(), Error> {
        while let Some(frame) = self.stream.next().await {
            let message = frame?;
            let bytes_on_wire = wire_len(&message);
            if self
                .msg_tx
                .send(Inbound {
                    message,
                    bytes_on_wire,
                })
                .is_err()
            {
                log::debug!("controller channel closed, receiver shutting down");
                break;
            }
        }
        Ok(())
    }
}

fn wire_len(msg: &Message) -> usize {
    let payload_len = match msg {
        Message::KeepAlive => 0,
        Message::Choke | Message::Unchoke | Message::Interested | Message::NotInterested => 1,
        Message::Have(_) => 5,
        Message::Bitfield(bits) => 1 + (bits.len() + 7) / 8,
        Message::Request(_) | Message::Cancel(_) => 13,
        Message::Piece { data, .. } => 9 + data.len(),
        Message::Port(_) => 3,
    };
    4 + payload_len
}
