/// Wrap-tolerant millisecond arithmetic.
///
/// The millisecond counter is a `u32` that wraps after ~49.7 days. All
/// comparisons go through elapsed-time subtraction so a deadline set just
/// before the wrap still fires just after it.

/// Milliseconds elapsed from `since` to `now`, across a counter wrap.
#[inline]
pub fn elapsed(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

/// True once `now` is at or past `deadline`.
///
/// Valid while the two are less than half the counter range apart.
#[inline]
pub fn reached(now: u32, deadline: u32) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

/// A single optional deadline. Setting overwrites; there is no queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<u32>,
}

impl Deadline {
    pub const fn new() -> Self {
        Self { at: None }
    }

    /// Arm (or re-arm) the deadline `ms` from `now`.
    pub fn set(&mut self, now: u32, ms: u32) {
        self.at = Some(now.wrapping_add(ms));
    }

    pub fn clear(&mut self) {
        self.at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    /// True if armed and passed. Does not disarm.
    pub fn expired(&self, now: u32) -> bool {
        self.at.is_some_and(|at| reached(now, at))
    }

    /// Disarm and return true if the deadline has passed.
    pub fn take_expired(&mut self, now: u32) -> bool {
        if self.expired(now) {
            self.at = None;
            true
        } else {
            false
        }
    }
}

/// Fixed-period cadence for the control loop steps.
#[derive(Debug, Clone, Copy)]
pub struct Every {
    period_ms: u32,
    last: u32,
}

impl Every {
    pub const fn new(period_ms: u32, now: u32) -> Self {
        Self { period_ms, last: now }
    }

    /// True (and restarts the period) once at least `period_ms` has elapsed.
    pub fn due(&mut self, now: u32) -> bool {
        if elapsed(now, self.last) >= self.period_ms {
            self.last = now;
            true
        } else {
            false
        }
    }
}
