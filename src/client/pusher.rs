//! Relays one vnode's records from local storage to a target node.
//!
//! # Stream protocol
//!
//! 1. **Handshake**: `<push-command> <unit> <vnode>`, node answers `READY`.
//! 2. **Stream**: every dump record, re-encoded with clock 0 so the receiver
//!    treats it as a full resync rather than an incremental update.
//! 3. **Terminate**: 20 zero bytes.
//! 4. **Acknowledge**: node answers `STORED`.
//!
//! Records are paced by a fixed delay per record. The delay does not react
//! to the receiver: it only keeps a fast local disk from flooding the node's
//! receive buffer. Delays shorter than the timer resolution are accumulated
//! and slept in one go, so the average rate matches the configured one.

use crate::connection::pool::{ConnectionPool, PoolGuard};
use crate::core::{Result, VnodeId};
use crate::protocol::command::{self, DEFAULT_PUSH_COMMAND, READY, STORED};
use crate::protocol::record::{STREAM_TERMINATOR, zero_clock};
use bytes::Bytes;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info_span, warn};

/// Default pause between two streamed records.
pub const DEFAULT_STREAM_THROTTLE: Duration = Duration::from_micros(100);

/// Shortest pause handed to the timer; tokio sleeps in whole milliseconds.
const MIN_SLEEP: Duration = Duration::from_millis(1);

/// Spreads a per-record pause over the stream.
#[derive(Debug)]
struct Pacer {
    interval: Duration,
    /// Pause due but not slept yet.
    owed: Duration,
    /// Time slept beyond what was due.
    ahead: Duration,
}

impl Pacer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            owed: Duration::ZERO,
            ahead: Duration::ZERO,
        }
    }

    /// Accounts for one record; returns the pause due now, if any.
    fn record_sent(&mut self) -> Option<Duration> {
        if self.ahead >= self.interval {
            self.ahead -= self.interval;
            return None;
        }
        self.owed += self.interval - self.ahead;
        self.ahead = Duration::ZERO;
        (self.owed >= MIN_SLEEP).then_some(self.owed)
    }

    /// Settles the debt by the time actually slept.
    fn slept(&mut self, actual: Duration) {
        if actual >= self.owed {
            self.ahead += actual - self.owed;
            self.owed = Duration::ZERO;
        } else {
            self.owed -= actual;
        }
    }
}

/// Step of the push at which a node answered something unexpected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushPhase {
    Handshake,
    Acknowledge,
}

impl fmt::Display for PushPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handshake => write!(f, "handshake"),
            Self::Acknowledge => write!(f, "acknowledge"),
        }
    }
}

/// How a target node answered a vnode push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Node acknowledged with `STORED`.
    Stored { records: u64 },
    /// Node answered `response` instead of `READY` or `STORED`.
    Rejected { phase: PushPhase, response: String },
}

impl PushOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }

    /// The node's literal reply.
    pub fn response(&self) -> &str {
        match self {
            Self::Stored { .. } => STORED,
            Self::Rejected { response, .. } => response,
        }
    }
}

/// Pushes vnode dumps to nodes, one connection per push.
#[derive(Clone)]
pub struct VnodePusher {
    pool: ConnectionPool,
    push_command: String,
    throttle: Duration,
}

impl VnodePusher {
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool,
            push_command: DEFAULT_PUSH_COMMAND.to_string(),
            throttle: DEFAULT_STREAM_THROTTLE,
        }
    }

    pub fn push_command(mut self, push_command: impl Into<String>) -> Self {
        self.push_command = push_command.into();
        self
    }

    /// Pause between records; `Duration::ZERO` disables pacing.
    pub fn throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Streams `records` (encoded dump records) of `vnode` in shard `unit` to `node`.
    ///
    /// A node answering anything but `READY`/`STORED` yields
    /// [`PushOutcome::Rejected`]. I/O and storage failures are logged and
    /// returned as errors. The pooled connection is released or closed on
    /// every path.
    pub async fn push<I>(&self, unit: &str, vnode: VnodeId, node: &str, records: I) -> Result<PushOutcome>
    where
        I: IntoIterator<Item = Result<Bytes>>,
    {
        let span = info_span!("push_vnode", unit, vnode, node);
        let result = self.run(unit, vnode, node, records).instrument(span).await;
        if let Err(err) = &result {
            error!(unit, vnode, node, error = %err, "push of vnode stream aborted");
        }
        result
    }

    async fn run<I>(&self, unit: &str, vnode: VnodeId, node: &str, records: I) -> Result<PushOutcome>
    where
        I: IntoIterator<Item = Result<Bytes>>,
    {
        let mut conn = self.pool.get_connection(node).await?;

        conn.write_line(&command::push_vnode(&self.push_command, unit, vnode))
            .await?;
        let reply = conn.read_line().await?;
        if reply != READY {
            warn!(reply = %reply, "node refused vnode stream");
            // The node may still expect a stream on this socket.
            conn.discard();
            return Ok(PushOutcome::Rejected {
                phase: PushPhase::Handshake,
                response: reply,
            });
        }

        let records = self.stream_records(&mut conn, records).await?;

        conn.write_raw(&STREAM_TERMINATOR).await?;
        conn.flush().await?;
        let reply = conn.read_line().await?;
        conn.release();

        if reply == STORED {
            debug!(records, "vnode stream stored");
            Ok(PushOutcome::Stored { records })
        } else {
            warn!(reply = %reply, records, "node did not store vnode stream");
            Ok(PushOutcome::Rejected {
                phase: PushPhase::Acknowledge,
                response: reply,
            })
        }
    }

    async fn stream_records<I>(&self, conn: &mut PoolGuard, records: I) -> Result<u64>
    where
        I: IntoIterator<Item = Result<Bytes>>,
    {
        let mut sent = 0u64;
        let mut pacer = Pacer::new(self.throttle);
        for record in records {
            let record = match record.and_then(|raw| zero_clock(&raw)) {
                Ok(record) => record,
                Err(err) => {
                    // Half a stream is on the wire; the socket cannot be reused.
                    conn.discard();
                    return Err(err);
                }
            };
            conn.write_raw(&record).await?;
            conn.flush().await?;
            sent += 1;
            if let Some(pause) = pacer.record_sent() {
                let started = Instant::now();
                tokio::time::sleep(pause).await;
                pacer.slept(started.elapsed());
            }
        }
        Ok(sent)
    }
}
