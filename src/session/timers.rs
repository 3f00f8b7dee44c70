//! Two named countdown slots with handle ids
//!
//! Scheduling into a slot always cancels whatever it held first, so each
//! slot has at most one live handle. Firings are only honoured for the live
//! handle; anything else is stale.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::engine::Effect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerKind {
    /// Reveals the answer when the user runs out of time
    Reveal,
    /// Moves to the next card after an answer
    AutoAdvance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(pub u64);

#[derive(Debug, Clone, Default)]
pub struct TimerSlots {
    next_handle: u64,
    reveal: Option<TimerHandle>,
    auto_advance: Option<TimerHandle>,
}

impl TimerSlots {
    fn slot_mut(&mut self, kind: TimerKind) -> &mut Option<TimerHandle> {
        match kind {
            TimerKind::Reveal => &mut self.reveal,
            TimerKind::AutoAdvance => &mut self.auto_advance,
        }
    }

    pub fn pending(&self, kind: TimerKind) -> Option<TimerHandle> {
        match kind {
            TimerKind::Reveal => self.reveal,
            TimerKind::AutoAdvance => self.auto_advance,
        }
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.pending(kind).is_some()
    }

    pub fn schedule(
        &mut self,
        kind: TimerKind,
        after: Duration,
        effects: &mut Vec<Effect>,
    ) -> TimerHandle {
        self.cancel(kind, effects);

        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        *self.slot_mut(kind) = Some(handle);
        effects.push(Effect::StartTimer {
            kind,
            handle,
            after,
        });
        handle
    }

    pub fn cancel(&mut self, kind: TimerKind, effects: &mut Vec<Effect>) {
        if let Some(handle) = self.slot_mut(kind).take() {
            effects.push(Effect::CancelTimer { kind, handle });
        }
    }

    pub fn cancel_all(&mut self, effects: &mut Vec<Effect>) {
        self.cancel(TimerKind::Reveal, effects);
        self.cancel(TimerKind::AutoAdvance, effects);
    }

    /// Consume a firing. Returns false for stale or canceled handles.
    pub fn claim(&mut self, kind: TimerKind, handle: TimerHandle) -> bool {
        let slot = self.slot_mut(kind);
        if *slot == Some(handle) {
            *slot = None;
            true
        } else {
            false
        }
    }
}
