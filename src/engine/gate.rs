use crate::engine::turn::RenderJob;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverOutcome {
    Accepted,
    Stale { expected: u64, got: u64 },
    NoPending,
    EmptyImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Image(String),
    TimedOut,
    Cancelled,
}

#[derive(Debug, Default)]
struct Slot {
    pending: Option<RenderJob>,
    delivered: Option<String>,
    last_accepted: Option<u64>,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct RenderJobGate {
    slot: Mutex<Slot>,
    cond: Condvar,
}

impl RenderJobGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, job: RenderJob) {
        let mut slot = self.slot.lock().expect("gate lock");
        slot.pending = Some(job);
        slot.delivered = None;
        slot.last_accepted = None;
        self.cond.notify_all();
    }

    pub fn peek(&self) -> Option<RenderJob> {
        let slot = self.slot.lock().expect("gate lock");
        slot.pending.clone()
    }

    pub fn deliver(&self, seq: u64, image_b64: String) -> DeliverOutcome {
        if image_b64.is_empty() {
            return DeliverOutcome::EmptyImage;
        }
        let mut slot = self.slot.lock().expect("gate lock");
        if slot.last_accepted == Some(seq) {
            return DeliverOutcome::Accepted;
        }
        let Some(job) = &slot.pending else {
            return DeliverOutcome::NoPending;
        };
        if job.seq != seq {
            return DeliverOutcome::Stale {
                expected: job.seq,
                got: seq,
            };
        }
        slot.delivered = Some(image_b64);
        slot.last_accepted = Some(seq);
        self.cond.notify_all();
        DeliverOutcome::Accepted
    }

    pub fn wait(&self, seq: u64, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock().expect("gate lock");
        loop {
            if slot.closed {
                return WaitOutcome::Cancelled;
            }
            if slot.last_accepted == Some(seq) {
                if let Some(image) = slot.delivered.take() {
                    slot.pending = None;
                    return WaitOutcome::Image(image);
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }
            let (guard, _) = self
                .cond
                .wait_timeout(slot, deadline - now)
                .expect("gate lock");
            slot = guard;
        }
    }

    pub fn shutdown(&self) {
        let mut slot = self.slot.lock().expect("gate lock");
        slot.closed = true;
        slot.pending = None;
        slot.delivered = None;
        self.cond.notify_all();
    }
}
