/// Local controls: scan button, joystick push switch and joystick axes.
///
/// Raw samples go in, discrete [`InputEvent`]s come out. The control core
/// only ever sees the events; which physical control produced them is
/// settled here.
use heapless::Vec;

use crate::config;
use crate::timing::elapsed;

/// A discrete operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    NextChannel,
    PrevChannel,
    TuneUp,
    TuneDown,
    CyclePage,
    TriggerScan,
}

/// Events produced by one poll. At most one per control.
pub type Events = Vec<InputEvent, 4>;

/// Anything the control loop can poll for operator input.
pub trait InputSource {
    fn poll(&mut self, now_ms: u32) -> Events;
}

/// A queued batch, drained on the next poll. Handy for scripted input.
impl InputSource for Events {
    fn poll(&mut self, _now_ms: u32) -> Events {
        core::mem::take(self)
    }
}

/// Press detector for an active-low push button.
///
/// A level change is accepted only once [`config::DEBOUNCE_MS`] has passed
/// since the last accepted change. Reports the press edge only.
#[derive(Debug, Clone, Copy)]
pub struct Debounce {
    pressed: bool,
    changed_at: u32,
}

impl Debounce {
    pub const fn new(pressed: bool, now_ms: u32) -> Self {
        Self {
            pressed,
            changed_at: now_ms,
        }
    }

    /// Feed the current level; true on an accepted press.
    pub fn update(&mut self, pressed: bool, now_ms: u32) -> bool {
        if pressed == self.pressed || elapsed(now_ms, self.changed_at) <= config::DEBOUNCE_MS {
            return false;
        }
        self.changed_at = now_ms;
        self.pressed = pressed;
        pressed
    }
}

/// Joystick deflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Classifies analog joystick samples into directions.
///
/// Deflection is measured from the centre sampled at boot. The vertical axis
/// is checked first, so a diagonal reads as up/down. After a direction is
/// reported the stick is ignored for [`config::JOY_REPEAT_MS`].
#[derive(Debug, Clone, Copy)]
pub struct Joystick {
    centre_x: i32,
    centre_y: i32,
    last_move: u32,
}

impl Joystick {
    pub const fn new(centre_x: u16, centre_y: u16, now_ms: u32) -> Self {
        Self {
            centre_x: centre_x as i32,
            centre_y: centre_y as i32,
            last_move: now_ms.wrapping_sub(config::JOY_REPEAT_MS),
        }
    }

    pub fn classify(&mut self, x: u16, y: u16, now_ms: u32) -> Option<Direction> {
        if elapsed(now_ms, self.last_move) < config::JOY_REPEAT_MS {
            return None;
        }
        let dx = x as i32 - self.centre_x;
        let dy = y as i32 - self.centre_y;
        let dir = if dy > config::JOY_DEADZONE {
            Direction::Up
        } else if dy < -config::JOY_DEADZONE {
            Direction::Down
        } else if dx > config::JOY_DEADZONE {
            Direction::Right
        } else if dx < -config::JOY_DEADZONE {
            Direction::Left
        } else {
            return None;
        };
        self.last_move = now_ms;
        Some(dir)
    }
}

/// One sample of every local control.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawInputs {
    pub scan_pressed: bool,
    pub switch_pressed: bool,
    pub joy_x: u16,
    pub joy_y: u16,
}

/// The front panel's control set.
#[derive(Debug, Clone, Copy)]
pub struct Controls {
    scan: Debounce,
    switch: Debounce,
    joystick: Joystick,
}

impl Controls {
    /// `boot` is the first sample; its axes become the joystick centre.
    pub const fn new(boot: RawInputs, now_ms: u32) -> Self {
        Self {
            scan: Debounce::new(boot.scan_pressed, now_ms),
            switch: Debounce::new(boot.switch_pressed, now_ms),
            joystick: Joystick::new(boot.joy_x, boot.joy_y, now_ms),
        }
    }

    pub fn update(&mut self, raw: RawInputs, now_ms: u32) -> Events {
        let mut events = Events::new();
        // capacity 4 covers the at-most-three events pushed below
        if self.scan.update(raw.scan_pressed, now_ms) {
            let _ = events.push(InputEvent::TriggerScan);
        }
        if self.switch.update(raw.switch_pressed, now_ms) {
            let _ = events.push(InputEvent::CyclePage);
        }
        let event = match self.joystick.classify(raw.joy_x, raw.joy_y, now_ms) {
            Some(Direction::Left) => Some(InputEvent::NextChannel),
            Some(Direction::Right) => Some(InputEvent::PrevChannel),
            Some(Direction::Up) => Some(InputEvent::TuneUp),
            Some(Direction::Down) => Some(InputEvent::TuneDown),
            None => None,
        };
        if let Some(event) = event {
            let _ = events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_reports_press_after_quiet_period() {
        let mut db = Debounce::new(false, 0);
        assert!(!db.update(true, 20));
        assert!(!db.update(true, 30));
        assert!(db.update(true, 31));
        // held: no repeat
        assert!(!db.update(true, 200));
        // release is accepted but not reported
        assert!(!db.update(false, 300));
        assert!(db.update(true, 400));
    }

    #[test]
    fn debounce_ignores_chatter() {
        let mut db = Debounce::new(false, 0);
        assert!(db.update(true, 100));
        assert!(!db.update(false, 110));
        assert!(!db.update(true, 120));
        assert!(!db.update(false, 125));
    }

    #[test]
    fn joystick_deadzone() {
        let mut joy = Joystick::new(2048, 2048, 0);
        assert_eq!(joy.classify(2048 + 450, 2048 - 450, 1000), None);
        assert_eq!(joy.classify(2048, 2048 + 451, 1000), Some(Direction::Up));
    }

    #[test]
    fn joystick_vertical_first() {
        let mut joy = Joystick::new(2048, 2048, 0);
        assert_eq!(joy.classify(0, 0, 1000), Some(Direction::Down));
    }

    #[test]
    fn joystick_repeat_guard() {
        let mut joy = Joystick::new(2000, 2000, 0);
        assert_eq!(joy.classify(2500, 2000, 0), Some(Direction::Right));
        assert_eq!(joy.classify(2500, 2000, 159), None);
        assert_eq!(joy.classify(1000, 2000, 160), Some(Direction::Left));
    }

    #[test]
    fn controls_map_to_events() {
        let boot = RawInputs {
            joy_x: 2048,
            joy_y: 2048,
            ..Default::default()
        };
        let mut c = Controls::new(boot, 0);
        let ev = c.update(
            RawInputs {
                scan_pressed: true,
                switch_pressed: false,
                joy_x: 100,
                joy_y: 2048,
            },
            100,
        );
        assert_eq!(ev.as_slice(), &[InputEvent::TriggerScan, InputEvent::NextChannel]);

        let ev = c.update(
            RawInputs {
                scan_pressed: true,
                switch_pressed: true,
                joy_x: 2048,
                joy_y: 3000,
            },
            300,
        );
        assert_eq!(ev.as_slice(), &[InputEvent::CyclePage, InputEvent::TuneUp]);
    }

    #[test]
    fn queued_events_drain_once() {
        let mut q = Events::new();
        q.push(InputEvent::CyclePage).unwrap();
        assert_eq!(q.poll(0).len(), 1);
        assert!(q.poll(0).is_empty());
    }
}
