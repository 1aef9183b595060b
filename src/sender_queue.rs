//! The Sender Queue: owns the outbound priority queue, applies prune/cancel
//! semantics, and gates outbound block data on the choke-manager-imposed
//! upload bandwidth budget.

use std::collections::VecDeque;

use tokio::sync::mpsc;

use crate::{block::BlockInfo, wire::Message, PieceIndex};

/// Commands the Controller may enqueue on the Sender Queue.
pub enum SenderQueueCommand {
    /// An ordinary message; appended to the back of the queue.
    Enqueue(Message),
    /// We're choking this peer: append the `CHOKE` message, and purge all
    /// pending `REQUEST`/`PIECE` messages still queued, since we will no
    /// longer serve them.
    Choke,
    /// A `CANCEL` for a block we may still have a queued `PIECE` for; drop
    /// the queued reply if present, otherwise forward the cancel itself.
    Cancel(PieceIndex, BlockInfo),
    /// The swarm canceled a block the Controller had queued a `REQUEST`
    /// for; remove it if it hasn't been sent yet.
    RequestPrune(PieceIndex, BlockInfo),
}

pub type SenderQueueSender = mpsc::Sender<SenderQueueCommand>;
pub type SenderQueueReceiver = mpsc::Receiver<SenderQueueCommand>;

/// `bound` gives the Controller genuine backpressure on this link: once the
/// Sender Queue falls behind, `enqueue`s from the Controller start to wait
/// rather than growing an unbounded queue in memory.
pub fn channel(bound: usize) -> (SenderQueueSender, SenderQueueReceiver) {
    mpsc::channel(bound)
}

/// Runs the Sender Queue actor until its command channel or its outbound
/// channel to the Sender closes.
pub struct SenderQueue {
    cmd_rx: SenderQueueReceiver,
    /// Notifications from the Sender that N bytes were actually written;
    /// used to account for the upload budget.
    written_rx: mpsc::UnboundedReceiver<usize>,
    /// Bandwidth grants from the Choke Manager, in bytes.
    grant_rx: mpsc::UnboundedReceiver<usize>,
    /// Single messages handed to the Sender, one at a time.
    out_tx: mpsc::UnboundedSender<Message>,
    queue: VecDeque<Message>,
    /// Remaining upload byte budget for `Piece` messages. Other message
    /// kinds are never gated by it.
    budget: i64,
}

impl SenderQueue {
    pub fn new(
        cmd_rx: SenderQueueReceiver,
        written_rx: mpsc::UnboundedReceiver<usize>,
        grant_rx: mpsc::UnboundedReceiver<usize>,
        out_tx: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self {
            cmd_rx,
            written_rx,
            grant_rx,
            out_tx,
            queue: VecDeque::new(),
            budget: 0,
        }
    }

    pub async fn run(&mut self) {
        loop {
            // drain as many queued messages as the budget allows before
            // waiting on new events
            self.flush();

            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd),
                        None => {
                            log::debug!("sender queue command channel closed");
                            break;
                        }
                    }
                }
                written = self.written_rx.recv() => {
                    match written {
                        Some(_n) => {
                            // bytes were confirmed written; nothing further
                            // to reconcile since the budget was already
                            // debited optimistically on send.
                        }
                        None => break,
                    }
                }
                grant = self.grant_rx.recv() => {
                    match grant {
                        Some(n) => self.budget += n as i64,
                        None => break,
                    }
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: SenderQueueCommand) {
        match cmd {
            SenderQueueCommand::Enqueue(msg) => self.queue.push_back(msg),
            SenderQueueCommand::Choke => {
                self.queue.retain(|m| {
                    !matches!(m, Message::Request(_) | Message::Piece { .. })
                });
                self.queue.push_back(Message::Choke);
            }
            SenderQueueCommand::Cancel(pn, blk) => {
                let pos = self.queue.iter().position(|m| match m {
                    Message::Piece {
                        piece_index,
                        offset,
                        data,
                    } => *piece_index == pn && *offset == blk.offset && data.len() as u32 == blk.len,
                    _ => false,
                });
                match pos {
                    Some(idx) => {
                        self.queue.remove(idx);
                    }
                    None => self.queue.push_back(Message::Cancel(blk)),
                }
            }
            SenderQueueCommand::RequestPrune(pn, blk) => {
                let pos = self.queue.iter().position(|m| {
                    matches!(m, Message::Request(b) if b.piece_index == pn && *b == blk)
                });
                if let Some(idx) = pos {
                    self.queue.remove(idx);
                }
            }
        }
    }

    /// Sends as many queued messages to the Sender as the current budget
    /// (and queue contents) allow.
    fn flush(&mut self) {
        while let Some(msg) = self.queue.front() {
            if msg.is_block_data() {
                let len = match msg {
                    Message::Piece { data, .. } => data.len() as i64,
                    _ => unreachable!(),
                };
                if self.budget < len {
                    break;
                }
                self.budget -= len;
            }
            let msg = self.queue.pop_front().unwrap();
            if self.out_tx.send(msg).is_err() {
                break;
            }
        }
    }
}
