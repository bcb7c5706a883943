//! Staged advisory delivery.
//!
//! The scheduler is a caller-driven state machine with no internal thread.
//! The host supplies a millisecond clock: `start` queues one reveal per
//! advisory at absolute due times, and `advance_to` fires whatever is due.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Scheduled(n) -> ... -> Scheduled(0) -> Idle
//! ```
//!
//! Every queued reveal captures the generation token that was current when
//! it was scheduled. `cancel` and `start` bump the generation, so reveals
//! from an earlier run are no-ops when they fire, whether or not they were
//! removed from the queue.

use crate::Advisory;
use crossbeam_channel::{Receiver, Sender};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Generation of a delivery run
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeliveryToken(pub u64);

/// Timing of reveals relative to `start`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTiming {
    pub initial_delay_ms: u64,
    pub inter_delay_ms: u64,
    /// Upper bound of the random offset applied by `start_with_rng`
    pub jitter_ms: u64,
}

impl Default for DeliveryTiming {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            inter_delay_ms: 800,
            jitter_ms: 0,
        }
    }
}

impl DeliveryTiming {
    pub fn from_config(config: &crate::config::DeliveryConfig) -> Self {
        Self {
            initial_delay_ms: config.initial_delay_ms,
            inter_delay_ms: config.inter_delay_ms,
            jitter_ms: config.jitter_ms,
        }
    }

    /// No waiting at all
    pub fn immediate() -> Self {
        Self {
            initial_delay_ms: 0,
            inter_delay_ms: 0,
            jitter_ms: 0,
        }
    }

    fn base_offset(&self, index: usize) -> u64 {
        self.initial_delay_ms + index as u64 * self.inter_delay_ms
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "remaining", rename_all = "snake_case")]
pub enum DeliveryState {
    Idle,
    /// Reveals still outstanding in the current run
    Scheduled(usize),
}

/// Notification emitted by the scheduler
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeliveryEvent {
    Revealed {
        token: DeliveryToken,
        index: usize,
        advisory: Advisory,
    },
    Completed {
        token: DeliveryToken,
        revealed: usize,
    },
    Cancelled {
        token: DeliveryToken,
    },
}

/// A queued reveal callback
#[derive(Clone, Debug)]
struct PendingReveal {
    due_ms: u64,
    seq: u64,
    generation: DeliveryToken,
    index: usize,
    total: usize,
    advisory: Advisory,
}

impl PartialEq for PendingReveal {
    fn eq(&self, other: &Self) -> bool {
        (self.due_ms, self.seq) == (other.due_ms, other.seq)
    }
}

impl Eq for PendingReveal {}

impl PartialOrd for PendingReveal {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingReveal {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.due_ms, self.seq).cmp(&(other.due_ms, other.seq))
    }
}

/// Single-threaded cooperative scheduler revealing advisories one at a time
pub struct DeliveryScheduler {
    generation: DeliveryToken,
    state: DeliveryState,
    queue: BinaryHeap<Reverse<PendingReveal>>,
    next_seq: u64,
    revealed: Vec<Advisory>,
    subscribers: Vec<Sender<DeliveryEvent>>,
}

impl Default for DeliveryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryScheduler {
    pub fn new() -> Self {
        Self {
            generation: DeliveryToken(0),
            state: DeliveryState::Idle,
            queue: BinaryHeap::new(),
            next_seq: 0,
            revealed: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    pub fn token(&self) -> DeliveryToken {
        self.generation
    }

    /// Advisories revealed so far in the current run
    pub fn revealed(&self) -> &[Advisory] {
        &self.revealed
    }

    /// Number of queued callbacks, stale ones included
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Due time of the earliest queued callback
    pub fn next_due(&self) -> Option<u64> {
        self.queue.peek().map(|Reverse(p)| p.due_ms)
    }

    /// Receive every event the scheduler emits from now on
    pub fn subscribe(&mut self) -> Receiver<DeliveryEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a new run; any run in flight is superseded
    pub fn start(
        &mut self,
        advisories: Vec<Advisory>,
        timing: DeliveryTiming,
        now_ms: u64,
    ) -> DeliveryToken {
        let offsets = (0..advisories.len())
            .map(|k| timing.base_offset(k))
            .collect();
        self.schedule_run(advisories, offsets, now_ms)
    }

    /// Begin a new run with a random offset on each reveal
    ///
    /// Offsets are drawn from `rng` in `0..=min(jitter_ms, inter_delay_ms - 1)`
    /// and due times stay strictly increasing.
    pub fn start_with_rng<R: Rng>(
        &mut self,
        advisories: Vec<Advisory>,
        timing: DeliveryTiming,
        now_ms: u64,
        rng: &mut R,
    ) -> DeliveryToken {
        let max_jitter = timing
            .jitter_ms
            .min(timing.inter_delay_ms.saturating_sub(1));
        let mut offsets: Vec<u64> = Vec::with_capacity(advisories.len());
        for k in 0..advisories.len() {
            let jitter = if max_jitter > 0 {
                rng.gen_range(0..=max_jitter)
            } else {
                0
            };
            let mut offset = timing.base_offset(k) + jitter;
            if let Some(prev) = offsets.last() {
                offset = offset.max(prev + 1);
            }
            offsets.push(offset);
        }
        self.schedule_run(advisories, offsets, now_ms)
    }

    /// Stop the current run; queued reveals become no-ops
    pub fn cancel(&mut self) -> DeliveryToken {
        let cancelled = self.generation;
        let was_active = matches!(self.state, DeliveryState::Scheduled(_));
        self.generation = DeliveryToken(self.generation.0 + 1);
        self.state = DeliveryState::Idle;

        if was_active {
            tracing::info!("Cancelled delivery run {:?}", cancelled);
            self.emit(DeliveryEvent::Cancelled { token: cancelled });
        }
        self.generation
    }

    /// Drop queued callbacks that belong to earlier generations
    pub fn prune_stale(&mut self) -> usize {
        let before = self.queue.len();
        let current = self.generation;
        self.queue.retain(|Reverse(p)| p.generation == current);
        before - self.queue.len()
    }

    /// Fire every callback due at or before `now_ms`, in due order
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<DeliveryEvent> {
        let mut events = Vec::new();

        while let Some(Reverse(head)) = self.queue.peek() {
            if head.due_ms > now_ms {
                break;
            }
            let Some(Reverse(pending)) = self.queue.pop() else {
                break;
            };
            self.fire(pending, &mut events);
        }

        events
    }

    fn schedule_run(
        &mut self,
        advisories: Vec<Advisory>,
        offsets: Vec<u64>,
        now_ms: u64,
    ) -> DeliveryToken {
        if matches!(self.state, DeliveryState::Scheduled(_)) {
            self.cancel();
        } else {
            self.generation = DeliveryToken(self.generation.0 + 1);
        }
        self.prune_stale();
        self.revealed.clear();

        let token = self.generation;
        let total = advisories.len();
        tracing::info!(
            "Starting delivery run {:?} with {} advisories",
            token,
            total
        );

        if total == 0 {
            self.state = DeliveryState::Idle;
            self.emit(DeliveryEvent::Completed { token, revealed: 0 });
            return token;
        }

        for (index, (advisory, offset)) in advisories.into_iter().zip(offsets).enumerate() {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.queue.push(Reverse(PendingReveal {
                due_ms: now_ms + offset,
                seq,
                generation: token,
                index,
                total,
                advisory,
            }));
        }
        self.state = DeliveryState::Scheduled(total);
        token
    }

    fn fire(&mut self, pending: PendingReveal, events: &mut Vec<DeliveryEvent>) {
        // Generation check and state update happen under the same &mut borrow
        if pending.generation != self.generation {
            tracing::debug!(
                "Ignoring stale reveal {} from run {:?}",
                pending.index,
                pending.generation
            );
            return;
        }

        let token = pending.generation;
        self.revealed.push(pending.advisory.clone());
        let remaining = pending.total - pending.index - 1;
        self.state = DeliveryState::Scheduled(remaining);

        let revealed = DeliveryEvent::Revealed {
            token,
            index: pending.index,
            advisory: pending.advisory,
        };
        self.emit(revealed.clone());
        events.push(revealed);

        if pending.index + 1 == pending.total {
            self.state = DeliveryState::Idle;
            let completed = DeliveryEvent::Completed {
                token,
                revealed: self.revealed.len(),
            };
            tracing::info!("Delivery run {:?} complete", token);
            self.emit(completed.clone());
            events.push(completed);
        }
    }

    fn emit(&mut self, event: DeliveryEvent) {
        // Subscribers whose receiver was dropped are forgotten
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
