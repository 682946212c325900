/// Active buzzer scheduler.
///
/// Drives a DC siren (on = line high) through the hardware layer. Timed
/// beeps share one pending off-deadline: a new beep overwrites whatever was
/// pending, it never queues. Alert patterns drive the line directly each
/// tick. While muted nothing turns the buzzer on.
use crate::hal::{Line, PanelHal};
use crate::timing::Deadline;

/// What the alert machine wants from the buzzer this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzerCue {
    /// No alert sound; timed beeps keep running
    Quiet,
    /// Continuous pattern, currently in its on (true) or off phase
    Tone(bool),
    /// Start a timed pulse of this many milliseconds
    Pulse(u32),
}

#[derive(Debug, Default)]
pub struct Buzzer {
    on: bool,
    off_at: Deadline,
    /// Line is currently owned by a continuous pattern
    patterned: bool,
}

impl Buzzer {
    pub const fn new() -> Self {
        Self {
            on: false,
            off_at: Deadline::new(),
            patterned: false,
        }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    fn set(&mut self, hal: &mut impl PanelHal, on: bool) {
        if on != self.on {
            hal.set_line(Line::Buzzer, on);
            self.on = on;
        }
    }

    /// Sound for `ms`, replacing any pending off-deadline. Ignored when muted.
    pub fn beep(&mut self, hal: &mut impl PanelHal, ms: u32, muted: bool) {
        if muted {
            return;
        }
        self.set(hal, true);
        let now = hal.millis();
        self.off_at.set(now, ms);
    }

    /// Turn off once the pending deadline has passed.
    pub fn tick(&mut self, hal: &mut impl PanelHal) {
        let now = hal.millis();
        if self.off_at.take_expired(now) && !self.patterned {
            self.set(hal, false);
        }
    }

    /// Apply the alert machine's cue for this tick.
    pub fn drive(&mut self, hal: &mut impl PanelHal, cue: BuzzerCue, muted: bool) {
        match cue {
            BuzzerCue::Tone(_) | BuzzerCue::Pulse(_) if muted => {}
            BuzzerCue::Tone(on) => {
                self.patterned = true;
                self.set(hal, on);
            }
            BuzzerCue::Pulse(ms) => {
                self.patterned = false;
                self.beep(hal, ms, muted);
            }
            BuzzerCue::Quiet => {
                if self.patterned {
                    self.patterned = false;
                    if !self.off_at.is_armed() {
                        self.set(hal, false);
                    }
                }
            }
        }
    }

    /// Force off and drop any pending beep.
    pub fn silence(&mut self, hal: &mut impl PanelHal) {
        self.patterned = false;
        self.off_at.clear();
        hal.set_line(Line::Buzzer, false);
        self.on = false;
    }
}
