/// Hardware-access layer consumed by the control core.
///
/// The core never touches peripherals directly. Everything it needs is four
/// primitives: drive a named digital line, sample a named analog line, read a
/// monotonic millisecond counter, and busy-wait. The firmware binary maps
/// [`Line`]s onto real GPIO/ADC pins; tests use [`mock::MockHal`].
///
/// Screens normally leave the core through [`crate::panel::Panel::tick`].
/// Blocking routines that hold the loop push theirs through
/// [`PanelHal::present`] instead.
use crate::display::Screen;

/// A named control line on the front panel.
///
/// Receiver-specific lines carry the channel id (1..=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    /// Shared register bus data line
    VrxData,
    /// Shared register bus clock line
    VrxClock,
    /// Per-receiver latch-enable line
    VrxLatch(u8),
    /// Per-receiver signal strength (analog input)
    Rssi(u8),
    LedRed,
    LedYellow,
    LedGreen,
    Buzzer,
}

/// The four primitives the core consumes.
pub trait PanelHal {
    /// Drive a digital output line.
    fn set_line(&mut self, line: Line, high: bool);

    /// Latest raw sample of an analog input line (12-bit on the ESP32-S3).
    fn read_analog(&mut self, line: Line) -> u16;

    /// Monotonic milliseconds. Wraps at `u32::MAX`; callers compare with
    /// [`crate::timing`] helpers only.
    fn millis(&self) -> u32;

    /// Busy-wait for at least `us` microseconds.
    fn delay_us(&mut self, us: u32);

    /// Busy-wait for at least `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1000);
        }
    }

    /// Draw a screen right away. Headless builds ignore it.
    fn present(&mut self, _screen: &Screen) {}
}

#[cfg(test)]
pub(crate) mod mock {
    //! Recording hardware double.
    //!
    //! Keeps a virtual microsecond clock advanced only by the delay calls,
    //! records every line change with its timestamp, and decodes register
    //! writes off the bus so tests can check what a receiver latched.

    use super::{Line, PanelHal};
    use crate::display::Screen;
    use crate::vrx::synth_word;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineChange {
        pub at_us: u64,
        pub line: Line,
        pub high: bool,
    }

    /// A register write as seen by a receiver on its latch pulse.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Latched {
        pub channel: u8,
        pub packet: u32,
        pub bits: u8,
    }

    impl Latched {
        pub fn address(&self) -> u8 {
            (self.packet & 0x0F) as u8
        }

        pub fn data(&self) -> u32 {
            (self.packet >> 5) & 0xF_FFFF
        }
    }

    pub struct MockHal {
        pub now_us: u64,
        /// Added to the derived millisecond counter, for wraparound tests
        pub ms_offset: u32,
        pub changes: Vec<LineChange>,
        pub latched: Vec<Latched>,
        /// (channel, frequency MHz, level) rows for the RSSI model
        pub levels: Vec<(u8, u16, u16)>,
        /// Level returned when no row matches
        pub default_level: u16,
        /// Screens pushed through `present`
        pub frames: Vec<Screen>,
        state: [(Line, bool); 8],
        shift: u32,
        shift_bits: u8,
        tuned_word: [Option<u32>; 3],
    }

    impl MockHal {
        pub fn new() -> Self {
            Self {
                now_us: 0,
                ms_offset: 0,
                changes: Vec::new(),
                latched: Vec::new(),
                levels: Vec::new(),
                default_level: 0,
                frames: Vec::new(),
                state: [
                    (Line::VrxData, false),
                    (Line::VrxClock, false),
                    (Line::VrxLatch(1), false),
                    (Line::VrxLatch(2), false),
                    (Line::VrxLatch(3), false),
                    (Line::LedRed, false),
                    (Line::LedYellow, false),
                    (Line::LedGreen, false),
                ],
                shift: 0,
                shift_bits: 0,
                tuned_word: [None; 3],
            }
        }

        pub fn with_level(mut self, channel: u8, freq_mhz: u16, level: u16) -> Self {
            self.levels.push((channel, freq_mhz, level));
            self
        }

        pub fn level(&self, line: Line) -> bool {
            if line == Line::Buzzer {
                return self.buzzer_on();
            }
            self.state
                .iter()
                .find(|(l, _)| *l == line)
                .map(|&(_, h)| h)
                .unwrap_or(false)
        }

        pub fn buzzer_on(&self) -> bool {
            self.changes
                .iter()
                .rev()
                .find(|c| c.line == Line::Buzzer)
                .map(|c| c.high)
                .unwrap_or(false)
        }

        pub fn leds(&self) -> (bool, bool, bool) {
            (
                self.level(Line::LedRed),
                self.level(Line::LedYellow),
                self.level(Line::LedGreen),
            )
        }

        pub fn advance_ms(&mut self, ms: u32) {
            self.now_us += ms as u64 * 1000;
        }

        fn store(&mut self, line: Line, high: bool) {
            if let Some(slot) = self.state.iter_mut().find(|(l, _)| *l == line) {
                slot.1 = high;
            }
        }
    }

    impl PanelHal for MockHal {
        fn set_line(&mut self, line: Line, high: bool) {
            let was_high = self.level(line);
            self.changes.push(LineChange {
                at_us: self.now_us,
                line,
                high,
            });
            self.store(line, high);

            match line {
                Line::VrxClock if high && !was_high => {
                    if self.shift_bits < 32 {
                        if self.level(Line::VrxData) {
                            self.shift |= 1 << self.shift_bits;
                        }
                        self.shift_bits += 1;
                    }
                }
                Line::VrxLatch(_) if !high && was_high => {}
                Line::VrxLatch(ch) if high && !was_high => {
                    let latched = Latched {
                        channel: ch,
                        packet: self.shift,
                        bits: self.shift_bits,
                    };
                    if latched.address() == 0x01 {
                        self.tuned_word[(ch - 1) as usize] = Some(latched.data());
                    }
                    self.latched.push(latched);
                }
                Line::VrxLatch(_) => {
                    // Latch driven low: a new packet starts
                    self.shift = 0;
                    self.shift_bits = 0;
                }
                _ => {}
            }
        }

        fn read_analog(&mut self, line: Line) -> u16 {
            let Line::Rssi(ch) = line else {
                return 0;
            };
            let word = self.tuned_word[(ch - 1) as usize];
            self.levels
                .iter()
                .find(|&&(c, f, _)| c == ch && Some(synth_word(f)) == word)
                .map(|&(_, _, level)| level)
                .unwrap_or(self.default_level)
        }

        fn millis(&self) -> u32 {
            ((self.now_us / 1000) as u32).wrapping_add(self.ms_offset)
        }

        fn delay_us(&mut self, us: u32) {
            self.now_us += us as u64;
        }

        fn delay_ms(&mut self, ms: u32) {
            self.now_us += ms as u64 * 1000;
        }

        fn present(&mut self, screen: &Screen) {
            self.frames.push(screen.clone());
        }
    }
}
