//! The Controller: the per-peer state machine that owns choke/interest
//! state, the outstanding block queue, and drives the Receiver, Sender
//! Queue and collaborator handles.

use std::collections::HashSet;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use crate::{
    block::BlockInfo,
    conf::TuningConf,
    control::{PeerCommand, PeerCommandReceiver},
    counter::Rate,
    disk::DiskHandle,
    error::Error,
    piece_manager::PieceManagerHandle,
    piece_map::PieceMap,
    piece_set::{Bits, PieceSet},
    peer_manager::PeerManagerHandle,
    receiver::Inbound,
    registers::{RateEntry, SharedRegister, StatusSample},
    sender_queue::{SenderQueueCommand, SenderQueueSender},
    wire::Message,
    PeerId, Sha1Hash, TorrentId,
};

/// Mutable per-session state (`PST` in the design).
pub struct PeerState {
    pub we_choke: bool,
    pub we_interested: bool,
    pub peer_choke: bool,
    pub peer_interested: bool,
    pub peer_pieces: PieceSet,
    pub block_queue: HashSet<(crate::PieceIndex, BlockInfo)>,
    pub up_rate: Rate,
    pub down_rate: Rate,
    pub running_endgame: bool,
}

impl PeerState {
    pub fn new(piece_count: usize, now: Instant) -> Self {
        Self {
            we_choke: true,
            we_interested: false,
            peer_choke: true,
            peer_interested: false,
            peer_pieces: PieceSet::new(piece_count),
            block_queue: HashSet::new(),
            up_rate: Rate::new(now),
            down_rate: Rate::new(now),
            running_endgame: false,
        }
    }

    /// True once the peer's announced piece set covers every piece, i.e.
    /// it's a seeder.
    pub fn peer_is_seeder(&self) -> bool {
        self.peer_pieces.is_full()
    }
}

/// Immutable per-session configuration (`PCF` in the design): the
/// collaborator handles, the torrent's piece map, and the peer's identity.
#[derive(Clone)]
pub struct PeerConf {
    pub torrent_id: TorrentId,
    pub info_hash: Sha1Hash,
    pub peer_id: PeerId,
    pub piece_map: PieceMap,
    pub piece_manager: PieceManagerHandle,
    pub disk: DiskHandle,
    pub peer_manager: PeerManagerHandle,
    pub rate_register: SharedRegister<RateEntry>,
    pub status_register: SharedRegister<StatusSample>,
    pub tuning: TuningConf,
}

/// The Controller's four input channels plus its handle to the Sender
/// Queue, all owned for the lifetime of `run`.
pub struct Controller {
    conf: PeerConf,
    state: PeerState,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    command_rx: PeerCommandReceiver,
    bandwidth_rx: mpsc::UnboundedReceiver<usize>,
    sender_queue: SenderQueueSender,
}

impl Controller {
    pub fn new(
        conf: PeerConf,
        inbound_rx: mpsc::UnboundedReceiver<Inbound>,
        command_rx: PeerCommandReceiver,
        bandwidth_rx: mpsc::UnboundedReceiver<usize>,
        sender_queue: SenderQueueSender,
    ) -> Self {
        let piece_count = conf.piece_map.piece_count();
        let state = PeerState::new(piece_count, Instant::now());
        Self {
            conf,
            state,
            inbound_rx,
            command_rx,
            bandwidth_rx,
            sender_queue,
        }
    }

    /// Runs the four-source select loop until a fatal error occurs or the
    /// control channel is closed by the supervisor, then runs cleanup.
    pub async fn run(&mut self) -> Result<(), Error> {
        let mut ticker = time::interval(self.conf.tuning.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = match self.send_initial_bitfield().await {
            Ok(()) => self.run_event_loop(&mut ticker).await,
            Err(e) => Err(e),
        };

        self.shutdown().await;
        result
    }

    /// Announces our locally-owned pieces to the peer, per the lifecycle
    /// described in the design: sent once, immediately after the session is
    /// created.
    async fn send_initial_bitfield(&mut self) -> Result<(), Error> {
        let done = self.conf.piece_manager.get_done().await?;
        let mut bits = Bits::repeat(false, self.conf.piece_map.piece_count());
        for index in done {
            if let Some(mut slot) = bits.get_mut(index) {
                *slot = true;
            }
        }
        self.sender_queue
            .send(SenderQueueCommand::Enqueue(Message::Bitfield(bits)))
            .await
            .map_err(|_| Error::ChannelClosed("sender queue"))
    }

    async fn run_event_loop(
        &mut self,
        ticker: &mut time::Interval,
    ) -> Result<(), Error> {
        loop {
            tokio::select! {
                inbound = self.inbound_rx.recv() => {
                    match inbound {
                        Some(inbound) => {
                            if let Err(e) = self.handle_inbound(inbound).await {
                                break Err(e);
                            }
                        }
                        None => {
                            log::debug!("receiver channel closed for peer {}", hex::encode(self.conf.peer_id));
                            break Ok(());
                        }
                    }
                }
                command = self.command_rx.recv() => {
                    match command {
                        Some(PeerCommand::Shutdown) | None => break Ok(()),
                        Some(command) => {
                            if let Err(e) = self.handle_command(command).await {
                                break Err(e);
                            }
                        }
                    }
                }
                sample = self.bandwidth_rx.recv() => {
                    match sample {
                        Some(bytes) => self.handle_bandwidth_sample(bytes),
                        None => break Ok(()),
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.handle_tick().await {
                        break Err(e);
                    }
                }
            }
        }
    }

    async fn handle_inbound(&mut self, inbound: Inbound) -> Result<(), Error> {
        self.state.down_rate.update(inbound.bytes_on_wire as u64);
        match inbound.message {
            Message::KeepAlive => {}
            Message::Choke => {
                self.state.peer_choke = true;
                self.conf.piece_manager.putback_blocks(
                    self.state.block_queue.iter().copied().collect(),
                )?;
                self.state.block_queue.clear();
            }
            Message::Unchoke => {
                self.state.peer_choke = false;
                self.fill_blocks().await?;
            }
            Message::Interested => {
                self.state.peer_interested = true;
            }
            Message::NotInterested => {
                self.state.peer_interested = false;
            }
            Message::Have(index) => {
                if !self.conf.piece_map.contains(index) {
                    return Err(Error::InvalidPieceIndex(index));
                }
                self.state.peer_pieces.insert(index);
                self.conf.piece_manager.peer_have(vec![index])?;
                self.consider_interest().await?;
            }
            Message::Bitfield(bits) => {
                self.handle_bitfield(bits)?;
                self.consider_interest().await?;
            }
            Message::Request(block) => {
                self.handle_request(block).await?;
            }
            Message::Piece {
                piece_index,
                offset,
                data,
            } => {
                self.handle_piece(piece_index, offset, data).await?;
            }
            Message::Cancel(block) => {
                self.sender_queue
                    .send(SenderQueueCommand::Cancel(block.piece_index, block))
                    .await
                    .map_err(|_| Error::ChannelClosed("sender queue"))?;
            }
            Message::Port(_) => {
                // DHT is out of scope; ignored per design.
            }
        }
        Ok(())
    }

    fn handle_bitfield(&mut self, bits: crate::piece_set::Bits) -> Result<(), Error> {
        if !self.state.peer_pieces.is_empty() {
            return Err(Error::BitfieldAlreadyPopulated);
        }
        let piece_count = self.conf.piece_map.piece_count();
        let expected = (piece_count + 7) / 8;
        let actual = bits.len() / 8;
        if actual != expected {
            return Err(Error::MalformedBitfieldLength { expected, actual });
        }
        // the wire always carries whole bytes, so the last byte may pad
        // out past `piece_count` with spare bits; trim them before storing
        let mut bits = bits;
        bits.truncate(piece_count);
        let have: Vec<_> = bits.iter().enumerate().filter_map(|(i, b)| if *b { Some(i) } else { None }).collect();
        self.state.peer_pieces.set_from_bitfield(bits);
        if !have.is_empty() {
            self.conf.piece_manager.peer_have(have)?;
        }
        Ok(())
    }

    async fn handle_request(&mut self, block: BlockInfo) -> Result<(), Error> {
        if self.state.we_choke {
            // stray request while choking the peer; silently absorbed.
            return Ok(());
        }
        let data = self.conf.disk.read_block(block.piece_index, block).await?;
        self.sender_queue
            .send(SenderQueueCommand::Enqueue(Message::Piece {
                piece_index: block.piece_index,
                offset: block.offset,
                data,
            }))
            .await
            .map_err(|_| Error::ChannelClosed("sender queue"))
    }

    async fn handle_piece(
        &mut self,
        piece_index: crate::PieceIndex,
        offset: u32,
        data: bytes::Bytes,
    ) -> Result<(), Error> {
        let block = BlockInfo {
            piece_index,
            offset,
            len: data.len() as u32,
        };
        if !self.state.block_queue.remove(&(piece_index, block)) {
            // stray or already-canceled piece; absorbed, not an error.
            return Ok(());
        }
        self.conf.piece_manager.store_block(piece_index, block, data)?;
        self.fill_blocks().await
    }

    async fn handle_command(&mut self, command: PeerCommand) -> Result<(), Error> {
        match command {
            PeerCommand::PieceCompleted(index) => {
                self.sender_queue
                    .send(SenderQueueCommand::Enqueue(Message::Have(index)))
                    .await
                    .map_err(|_| Error::ChannelClosed("sender queue"))?;
            }
            PeerCommand::ChokePeer => {
                if !self.state.we_choke {
                    self.state.we_choke = true;
                    self.sender_queue
                        .send(SenderQueueCommand::Choke)
                        .await
                        .map_err(|_| Error::ChannelClosed("sender queue"))?;
                }
            }
            PeerCommand::UnchokePeer => {
                if self.state.we_choke {
                    self.state.we_choke = false;
                    self.sender_queue
                        .send(SenderQueueCommand::Enqueue(Message::Unchoke))
                        .await
                        .map_err(|_| Error::ChannelClosed("sender queue"))?;
                }
            }
            PeerCommand::CancelBlock(piece_index, block) => {
                self.state.block_queue.remove(&(piece_index, block));
                self.sender_queue
                    .send(SenderQueueCommand::RequestPrune(piece_index, block))
                    .await
                    .map_err(|_| Error::ChannelClosed("sender queue"))?;
            }
            PeerCommand::Shutdown => unreachable!("handled in run's select arm"),
        }
        Ok(())
    }

    fn handle_bandwidth_sample(&mut self, bytes: usize) {
        self.state.up_rate.update(bytes as u64);
    }

    async fn handle_tick(&mut self) -> Result<(), Error> {
        let now = Instant::now();
        let up_bps = self.state.up_rate.extract_rate(now);
        let down_bps = self.state.down_rate.extract_rate(now);
        self.conf.rate_register.push(RateEntry {
            peer_id: self.conf.peer_id,
            up_bps,
            down_bps,
            peer_interested: self.state.peer_interested,
            is_seeder: self.state.peer_is_seeder(),
            peer_choke: self.state.peer_choke,
        });
        self.conf.status_register.push(StatusSample {
            torrent_id: self.conf.torrent_id,
            up_bytes: self.state.up_rate.extract_count(),
            down_bytes: self.state.down_rate.extract_count(),
        });
        Ok(())
    }

    /// Asks the piece manager whether `peerPieces` still holds anything we
    /// want, flipping `weInterested` and emitting `INTERESTED`/
    /// `NOT_INTERESTED` on change. Does not itself trigger a refill; that
    /// only happens on `UNCHOKE` and on block delivery.
    async fn consider_interest(&mut self) -> Result<(), Error> {
        let interested = self
            .conf
            .piece_manager
            .ask_interested(self.state.peer_pieces.clone())
            .await?;
        if interested == self.state.we_interested {
            return Ok(());
        }
        self.state.we_interested = interested;
        let msg = if interested {
            Message::Interested
        } else {
            Message::NotInterested
        };
        self.sender_queue
            .send(SenderQueueCommand::Enqueue(msg))
            .await
            .map_err(|_| Error::ChannelClosed("sender queue"))
    }

    /// If the peer has us choked, does nothing; otherwise defers to
    /// `checkWatermark`.
    async fn fill_blocks(&mut self) -> Result<(), Error> {
        if self.state.peer_choke {
            return Ok(());
        }
        self.check_watermark().await
    }

    /// The request-pipelining policy: once the outstanding block count
    /// falls below the active low watermark, tops it back up to the high
    /// watermark in one synchronous round-trip to the piece manager.
    async fn check_watermark(&mut self) -> Result<(), Error> {
        let lo = if self.state.running_endgame {
            self.conf.tuning.endgame_lo_mark
        } else {
            self.conf.tuning.lo_mark
        };
        let n = self.state.block_queue.len();
        if n >= lo {
            return Ok(());
        }
        let hi = self.conf.tuning.hi_mark;
        let result = self
            .conf
            .piece_manager
            .grab_blocks(hi - n, self.state.peer_pieces.clone())
            .await?;
        self.state.running_endgame = result.is_endgame();
        for (piece_index, block) in result.into_blocks() {
            if self.state.block_queue.insert((piece_index, block)) {
                self.sender_queue
                    .send(SenderQueueCommand::Enqueue(Message::Request(block)))
                    .await
                    .map_err(|_| Error::ChannelClosed("sender queue"))?;
            }
        }
        Ok(())
    }

    /// Invariant 5's cleanup path: run from every exit point of `run`,
    /// atomically with respect to other peers (this peer's own task is the
    /// only writer to its state, so no further locking is needed here).
    async fn shutdown(&mut self) {
        if !self.state.block_queue.is_empty() {
            let blocks: Vec<_> = self.state.block_queue.drain().collect();
            if let Err(e) = self.conf.piece_manager.putback_blocks(blocks) {
                log::warn!("failed to return blocks on shutdown: {}", e);
            }
        }
        if !self.state.peer_pieces.is_empty() {
            let have: Vec<_> = self.state.peer_pieces.iter().collect();
            if let Err(e) = self.conf.piece_manager.peer_unhave(have) {
                log::warn!("failed to report peer_unhave on shutdown: {}", e);
            }
        }
        if let Err(e) = self.conf.peer_manager.disconnect(self.conf.peer_id) {
            log::warn!("failed to notify peer manager of disconnect: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskRequest;
    use crate::peer_manager::PeerManagerEvent;
    use crate::piece_manager::{GrabResult, PieceManagerRequest};
    use crate::wire::Message as WireMessage;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::mpsc as tmpsc;

    #[test]
    fn check_watermark_threshold_tightens_in_endgame() {
        let mut state = PeerState::new(4, Instant::now());
        let tuning = TuningConf::default();
        state.block_queue.insert((
            0,
            BlockInfo {
                piece_index: 0,
                offset: 0,
                len: 16384,
            },
        ));
        assert!(state.block_queue.len() < tuning.lo_mark);
        state.running_endgame = true;
        assert!(state.block_queue.len() >= tuning.endgame_lo_mark);
    }

    #[test]
    fn peer_is_seeder_once_piece_set_is_full() {
        let mut state = PeerState::new(2, Instant::now());
        assert!(!state.peer_is_seeder());
        state.peer_pieces.insert(0);
        state.peer_pieces.insert(1);
        assert!(state.peer_is_seeder());
    }

    #[test]
    fn not_interested_message_display_is_distinct_from_interested() {
        assert_ne!(
            WireMessage::Interested.to_string(),
            WireMessage::NotInterested.to_string()
        );
    }

    /// Piece manager test double: serves `GetDone`/`AskInterested` from
    /// fixed fields and `GrabBlocks` from a scripted queue, recording
    /// every `PeerHave`/`PeerUnhave`/`StoreBlock`/`PutbackBlocks` call so
    /// tests can assert on it afterwards.
    #[derive(Default)]
    struct PmLog {
        have: Vec<Vec<crate::PieceIndex>>,
        unhave: Vec<Vec<crate::PieceIndex>>,
        stored: Vec<(crate::PieceIndex, BlockInfo)>,
        putback: Vec<Vec<(crate::PieceIndex, BlockInfo)>>,
        grab_calls: usize,
    }

    fn spawn_piece_manager(
        done: Vec<crate::PieceIndex>,
        interested: bool,
        grab_script: Vec<GrabResult>,
    ) -> (PieceManagerHandle, std::sync::Arc<Mutex<PmLog>>) {
        let (tx, mut rx) = tmpsc::unbounded_channel::<PieceManagerRequest>();
        let log = std::sync::Arc::new(Mutex::new(PmLog::default()));
        let task_log = log.clone();
        tokio::spawn(async move {
            let mut script: VecDeque<GrabResult> = grab_script.into();
            while let Some(req) = rx.recv().await {
                match req {
                    PieceManagerRequest::GetDone(reply) => {
                        let _ = reply.send(done.clone());
                    }
                    PieceManagerRequest::PeerHave(list) => {
                        task_log.lock().unwrap().have.push(list);
                    }
                    PieceManagerRequest::PeerUnhave(list) => {
                        task_log.lock().unwrap().unhave.push(list);
                    }
                    PieceManagerRequest::AskInterested(_, reply) => {
                        let _ = reply.send(interested);
                    }
                    PieceManagerRequest::GrabBlocks(_, _, reply) => {
                        task_log.lock().unwrap().grab_calls += 1;
                        let result = script.pop_front().unwrap_or(GrabResult::Leech(vec![]));
                        let _ = reply.send(result);
                    }
                    PieceManagerRequest::StoreBlock(pn, blk, _) => {
                        task_log.lock().unwrap().stored.push((pn, blk));
                    }
                    PieceManagerRequest::PutbackBlocks(blocks) => {
                        task_log.lock().unwrap().putback.push(blocks);
                    }
                }
            }
        });
        (PieceManagerHandle::new(tx), log)
    }

    fn spawn_disk() -> DiskHandle {
        let (tx, mut rx) = tmpsc::unbounded_channel::<DiskRequest>();
        tokio::spawn(async move {
            while let Some(DiskRequest::ReadBlock(_, block, reply)) = rx.recv().await {
                let _ = reply.send(Ok(bytes::Bytes::from(vec![0u8; block.len as usize])));
            }
        });
        DiskHandle::new(tx)
    }

    fn spawn_peer_manager() -> (PeerManagerHandle, std::sync::Arc<Mutex<Vec<PeerId>>>) {
        let (tx, mut rx) = tmpsc::unbounded_channel::<PeerManagerEvent>();
        let disconnects = std::sync::Arc::new(Mutex::new(Vec::new()));
        let task_log = disconnects.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let PeerManagerEvent::Disconnect(peer_id) = event {
                    task_log.lock().unwrap().push(peer_id);
                }
            }
        });
        (PeerManagerHandle::new(tx), disconnects)
    }

    fn tuning() -> TuningConf {
        TuningConf {
            tick_interval: std::time::Duration::from_secs(3600),
            ..TuningConf::default()
        }
    }

    fn test_controller(
        piece_manager: PieceManagerHandle,
        disk: DiskHandle,
        peer_manager: PeerManagerHandle,
    ) -> Controller {
        let piece_map = PieceMap::new(32768, 32768, vec![[0u8; 20]; 8]);
        let conf = PeerConf {
            torrent_id: 1,
            info_hash: [0u8; 20],
            peer_id: [7u8; 20],
            piece_map,
            piece_manager,
            disk,
            peer_manager,
            rate_register: SharedRegister::new(),
            status_register: SharedRegister::new(),
            tuning: tuning(),
        };
        let (_inbound_tx, inbound_rx) = tmpsc::unbounded_channel();
        let (_command_tx, command_rx) = crate::control::channel();
        let (_bandwidth_tx, bandwidth_rx) = tmpsc::unbounded_channel();
        let (sq_tx, _sq_rx) = crate::sender_queue::channel(tuning().send_queue_bound);
        Controller::new(conf, inbound_rx, command_rx, bandwidth_rx, sq_tx)
    }

    fn full_bitfield(piece_count: usize) -> Bits {
        Bits::repeat(true, piece_count)
    }

    fn request_block(piece_index: crate::PieceIndex, index: usize) -> (crate::PieceIndex, BlockInfo) {
        (piece_index, BlockInfo::new(piece_index, index, 32768))
    }

    /// S1 — first contact: a full bitfield makes us interested, and
    /// unchoking triggers a pipeline fill up to the high watermark.
    #[tokio::test]
    async fn s1_bitfield_then_unchoke_fills_pipeline_to_hi_mark() {
        let grabbed: Vec<_> = (0..15).map(|i| request_block(i, 0)).collect();
        let (pm, log) = spawn_piece_manager(vec![0, 2], true, vec![GrabResult::Leech(grabbed)]);
        let disk = spawn_disk();
        let (peer_mgr, _) = spawn_peer_manager();
        let mut controller = test_controller(pm, disk, peer_mgr);

        controller
            .handle_bitfield(full_bitfield(8))
            .expect("bitfield accepted");
        controller.consider_interest().await.unwrap();
        assert!(controller.state.we_interested);
        assert_eq!(log.lock().unwrap().have.last().unwrap().len(), 8);

        controller.state.peer_choke = false;
        controller.fill_blocks().await.unwrap();
        assert_eq!(controller.state.block_queue.len(), 15);
    }

    /// S2 — choke mid-transfer returns every outstanding block and clears
    /// the queue.
    #[tokio::test]
    async fn s2_choke_putback_clears_queue() {
        let (pm, log) = spawn_piece_manager(vec![], true, vec![]);
        let disk = spawn_disk();
        let (peer_mgr, _) = spawn_peer_manager();
        let mut controller = test_controller(pm, disk, peer_mgr);

        let blocks = vec![request_block(3, 0), request_block(3, 1), request_block(5, 0)];
        for b in &blocks {
            controller.state.block_queue.insert(*b);
        }
        controller.state.peer_choke = false;

        controller
            .handle_inbound(Inbound {
                message: Message::Choke,
                bytes_on_wire: 5,
            })
            .await
            .unwrap();

        assert!(controller.state.peer_choke);
        assert!(controller.state.block_queue.is_empty());
        let putback = log.lock().unwrap().putback.clone();
        assert_eq!(putback.len(), 1);
        assert_eq!(putback[0].len(), 3);
    }

    /// S3 — a PIECE for a block we never requested is silently dropped.
    #[tokio::test]
    async fn s3_stray_piece_is_ignored() {
        let (pm, log) = spawn_piece_manager(vec![], true, vec![]);
        let disk = spawn_disk();
        let (peer_mgr, _) = spawn_peer_manager();
        let mut controller = test_controller(pm, disk, peer_mgr);

        controller.state.block_queue.insert(request_block(2, 0));

        controller
            .handle_inbound(Inbound {
                message: Message::Piece {
                    piece_index: 2,
                    offset: 16384,
                    data: bytes::Bytes::from(vec![0u8; 16384]),
                },
                bytes_on_wire: 16384 + 9,
            })
            .await
            .unwrap();

        assert!(log.lock().unwrap().stored.is_empty());
        assert_eq!(controller.state.block_queue.len(), 1);
    }

    /// S4 — a second BITFIELD after piece availability is already
    /// populated is a protocol violation.
    #[tokio::test]
    async fn s4_late_bitfield_is_rejected() {
        let (pm, _log) = spawn_piece_manager(vec![], true, vec![]);
        let disk = spawn_disk();
        let (peer_mgr, _) = spawn_peer_manager();
        let mut controller = test_controller(pm, disk, peer_mgr);

        controller.handle_bitfield(full_bitfield(8)).unwrap();
        let err = controller.handle_bitfield(full_bitfield(8)).unwrap_err();
        assert!(matches!(err, Error::BitfieldAlreadyPopulated));
    }

    /// S5 — a REQUEST while we're choking the peer produces no disk read
    /// and no outbound PIECE.
    #[tokio::test]
    async fn s5_request_while_choking_is_ignored() {
        let (pm, _log) = spawn_piece_manager(vec![], true, vec![]);
        let disk = spawn_disk();
        let (peer_mgr, _) = spawn_peer_manager();
        let mut controller = test_controller(pm, disk, peer_mgr);

        assert!(controller.state.we_choke);
        controller
            .handle_request(BlockInfo {
                piece_index: 0,
                offset: 0,
                len: 16384,
            })
            .await
            .unwrap();
        // no panic, no enqueue: the sender queue receiver was dropped in
        // test_controller, so a stray send would itself return an error
        // that `handle_request` already would have surfaced above.
    }

    /// S6 — once the piece manager signals endgame, the latch stays set
    /// and the next refill uses the endgame low watermark.
    #[tokio::test]
    async fn s6_endgame_latches() {
        let endgame_block = request_block(7, 0);
        let (pm, log) = spawn_piece_manager(
            vec![],
            true,
            vec![GrabResult::Endgame(vec![endgame_block])],
        );
        let disk = spawn_disk();
        let (peer_mgr, _) = spawn_peer_manager();
        let mut controller = test_controller(pm, disk, peer_mgr);

        controller.state.peer_choke = false;
        controller.check_watermark().await.unwrap();

        assert!(controller.state.running_endgame);
        assert_eq!(controller.state.block_queue.len(), 1);
        assert_eq!(log.lock().unwrap().grab_calls, 1);
    }

    /// Invariant 5: on shutdown, outstanding blocks are returned and
    /// piece availability is reported as lost, exactly once.
    #[tokio::test]
    async fn invariant5_shutdown_returns_blocks_and_reports_unhave() {
        let (pm, log) = spawn_piece_manager(vec![], true, vec![]);
        let disk = spawn_disk();
        let (peer_mgr, disconnects) = spawn_peer_manager();
        let mut controller = test_controller(pm, disk, peer_mgr);

        controller.state.block_queue.insert(request_block(1, 0));
        controller.state.peer_pieces.insert(0);
        controller.state.peer_pieces.insert(3);

        controller.shutdown().await;

        assert_eq!(log.lock().unwrap().putback.len(), 1);
        assert_eq!(log.lock().unwrap().unhave[0].len(), 2);
        // give the peer manager task a chance to drain its channel
        tokio::task::yield_now().await;
        assert_eq!(disconnects.lock().unwrap().len(), 1);
    }

    /// Invariant 6: `isSeeder` reported to the rate register matches
    /// whether `peerPieces` covers every piece at tick time.
    #[tokio::test]
    async fn invariant6_tick_reports_is_seeder_accurately() {
        let (pm, _log) = spawn_piece_manager(vec![], true, vec![]);
        let disk = spawn_disk();
        let (peer_mgr, _) = spawn_peer_manager();
        let mut controller = test_controller(pm, disk, peer_mgr);

        for i in 0..8 {
            controller.state.peer_pieces.insert(i);
        }
        controller.handle_tick().await.unwrap();

        let entries = controller.conf.rate_register.drain();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_seeder);
    }
}
