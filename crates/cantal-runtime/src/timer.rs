use cantal_core::EventName;

/// Countdown armed by a blocking host call, advanced by frame deltas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    event: EventName,
    duration_ms: u64,
    elapsed_ms: u64,
}

impl Timer {
    pub fn new(event: EventName, duration_ms: u64) -> Self {
        Self {
            event,
            duration_ms,
            elapsed_ms: 0,
        }
    }

    pub fn event(&self) -> EventName {
        self.event
    }

    pub fn remaining_ms(&self) -> u64 {
        self.duration_ms.saturating_sub(self.elapsed_ms)
    }

    /// Adds `dt_ms` and reports whether the timer has now fired.
    pub fn update(&mut self, dt_ms: u64) -> bool {
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);
        self.elapsed_ms >= self.duration_ms
    }
}
