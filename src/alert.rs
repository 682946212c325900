/// Threshold-driven alert state machine.
///
/// Evaluated once per control-loop tick against the selected receiver's last
/// signal level. Produces a visual level (one LED) and a buzzer cue; it has
/// no I/O of its own. Priority, first match wins:
///
/// 1. Hold: caution, buzzer quiet
/// 2. Danger (`level >= danger`): danger, fast on/off pattern
/// 3. Alert (`level >= alert`): caution, one short pulse per window
/// 4. Nominal: safe, buzzer quiet
///
/// Panic forces the danger buzzer pattern below Hold. Mute silences every
/// cue but never changes the visual level.
use crate::buzzer::BuzzerCue;
use crate::config;
use crate::hal::{Line, PanelHal};
use crate::profile::Thresholds;

/// Visual output, one LED lit at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visual {
    /// Green
    Safe,
    /// Yellow
    Caution,
    /// Red
    Danger,
}

impl Visual {
    /// (red, yellow, green)
    pub fn leds(&self) -> (bool, bool, bool) {
        match self {
            Visual::Safe => (false, false, true),
            Visual::Caution => (false, true, false),
            Visual::Danger => (true, false, false),
        }
    }

    /// Drive the three status LEDs.
    pub fn apply(&self, hal: &mut impl PanelHal) {
        let (r, y, g) = self.leds();
        hal.set_line(Line::LedRed, r);
        hal.set_line(Line::LedYellow, y);
        hal.set_line(Line::LedGreen, g);
    }
}

/// Which rule matched this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Hold,
    Danger,
    Alert,
    Nominal,
}

/// Everything an evaluation looks at.
#[derive(Debug, Clone, Copy)]
pub struct AlertInputs {
    pub level: u16,
    pub hold: bool,
    pub mute: bool,
    pub panic: bool,
    pub thresholds: Thresholds,
    pub now_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertOutput {
    pub state: AlertState,
    pub visual: Visual,
    pub buzzer: BuzzerCue,
}

/// Danger pattern phase: on for the first half-period, off for the second.
fn danger_phase(now_ms: u32) -> bool {
    (now_ms / config::DANGER_HALF_PERIOD_MS) % 2 == 0
}

#[derive(Debug, Default)]
pub struct AlertMachine {
    /// Alert window in which the last pulse was issued
    pulsed_window: Option<u32>,
    last: Option<AlertState>,
}

impl AlertMachine {
    pub const fn new() -> Self {
        Self {
            pulsed_window: None,
            last: None,
        }
    }

    /// State of the most recent evaluation
    pub fn state(&self) -> Option<AlertState> {
        self.last
    }

    pub fn evaluate(&mut self, inputs: &AlertInputs) -> AlertOutput {
        let t = &inputs.thresholds;
        let (state, visual) = if inputs.hold {
            (AlertState::Hold, Visual::Caution)
        } else if inputs.level >= t.danger {
            (AlertState::Danger, Visual::Danger)
        } else if inputs.level >= t.alert {
            (AlertState::Alert, Visual::Caution)
        } else {
            (AlertState::Nominal, Visual::Safe)
        };

        let mut buzzer = match state {
            AlertState::Hold => BuzzerCue::Quiet,
            AlertState::Danger => BuzzerCue::Tone(danger_phase(inputs.now_ms)),
            AlertState::Alert => self.alert_pulse(inputs.now_ms),
            AlertState::Nominal => BuzzerCue::Quiet,
        };
        if state != AlertState::Alert {
            self.pulsed_window = None;
        }
        if inputs.panic && state != AlertState::Hold {
            buzzer = BuzzerCue::Tone(danger_phase(inputs.now_ms));
        }
        if inputs.mute {
            buzzer = BuzzerCue::Quiet;
        }

        if self.last != Some(state) {
            log::debug!("Alert state {:?} (level {})", state, inputs.level);
            self.last = Some(state);
        }

        AlertOutput {
            state,
            visual,
            buzzer,
        }
    }

    fn alert_pulse(&mut self, now_ms: u32) -> BuzzerCue {
        let window = now_ms / config::ALERT_WINDOW_MS;
        if self.pulsed_window == Some(window) {
            BuzzerCue::Quiet
        } else {
            self.pulsed_window = Some(window);
            BuzzerCue::Pulse(config::ALERT_BEEP_MS)
        }
    }
}
