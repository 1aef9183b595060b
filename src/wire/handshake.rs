//! The BitTorrent handshake.
//!
//! Handshake *negotiation* (who sends first, validating the peer's response)
//! is out of this crate's scope — it happens before a [`Controller`] is
//! created. This module only keeps the wire shape around so a `PeerConf` can
//! be built the way a real caller would build one, and so tests can
//! construct realistic fixtures.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{error::Error, PeerId, Sha1Hash};

pub const PROTOCOL_STRING: &str = "BitTorrent protocol";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Handshake {
    pub protocol: [u8; 19],
    pub reserved: [u8; 8],
    pub info_hash: Sha1Hash,
    pub peer_id: PeerId,
}

impl Handshake {
    pub fn new(info_hash: Sha1Hash, peer_id: PeerId) -> Self {
        let mut protocol = [0u8; 19];
        protocol.copy_from_slice(PROTOCOL_STRING.as_bytes());
        Self {
            protocol,
            reserved: [0u8; 8],
            info_hash,
            peer_id,
        }
    }
}

pub struct HandshakeCodec;

impl Encoder<Handshake> for HandshakeCodec {
    type Error = Error;

    fn encode(&mut self, hs: Handshake, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_u8(19);
        dst.extend_from_slice(&hs.protocol);
        dst.extend_from_slice(&hs.reserved);
        dst.extend_from_slice(&hs.info_hash);
        dst.extend_from_slice(&hs.peer_id);
        Ok(())
    }
}

impl Decoder for HandshakeCodec {
    type Item = Handshake;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        const LEN: usize = 1 + 19 + 8 + 20 + 20;
        if src.remaining() < LEN {
            src.reserve(LEN - src.remaining());
            return Ok(None);
        }
        let prot_len = src.get_u8();
        if prot_len != 19 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "invalid protocol string length",
            )));
        }
        let mut protocol = [0u8; 19];
        src.copy_to_slice(&mut protocol);
        let mut reserved = [0u8; 8];
        src.copy_to_slice(&mut reserved);
        let mut info_hash = [0u8; 20];
        src.copy_to_slice(&mut info_hash);
        let mut peer_id = [0u8; 20];
        src.copy_to_slice(&mut peer_id);
        Ok(Some(Handshake {
            protocol,
            reserved,
            info_hash,
            peer_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let hs = Handshake::new([1u8; 20], [2u8; 20]);
        let mut buf = BytesMut::new();
        HandshakeCodec.encode(hs.clone(), &mut buf).unwrap();
        let decoded = HandshakeCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, hs);
    }
}
