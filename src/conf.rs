//! This module defines types used to configure the peer engine and its
//! parts.

use std::time::Duration;

use crate::PeerId;

/// The default client id this crate announces to peers when none is
/// supplied by the embedder.
pub const DEFAULT_CLIENT_ID: &PeerId = b"cbt-0000000000000000";

/// Tuning knobs for a single peer session: watermarks, timer cadence and
/// channel bounds. Embedded as a field of `controller::PeerConf`, which
/// additionally carries the collaborator handles, piece map and infohash
/// that make up the rest of the design's `PCF`.
#[derive(Clone, Debug)]
pub struct TuningConf {
    /// Below this many outstanding block requests, the Controller refills
    /// the pipeline (see `checkWatermark` in the design).
    pub lo_mark: usize,
    /// The low watermark used once endgame mode has been latched. Much
    /// smaller than `lo_mark` so the last few blocks are requested from
    /// every peer that has them.
    pub endgame_lo_mark: usize,
    /// The Controller never lets the number of outstanding requests exceed
    /// this value.
    pub hi_mark: usize,
    /// How often the Controller re-arms its periodic timer to publish rate
    /// and status samples.
    pub tick_interval: Duration,
    /// The bound of the internal channel between the Controller and the
    /// Sender Queue; a bounded channel gives the Controller genuine
    /// backpressure when the peer can't keep up draining its outbound
    /// queue.
    pub send_queue_bound: usize,
    /// The client id announced during handshakes.
    pub client_id: PeerId,
}

impl Default for TuningConf {
    fn default() -> Self {
        Self {
            lo_mark: 10,
            endgame_lo_mark: 1,
            hi_mark: 15,
            tick_interval: Duration::from_secs(5),
            send_queue_bound: 50,
            client_id: *DEFAULT_CLIENT_ID,
        }
    }
}
