/// Receiver (VRX) channel controller.
///
/// Three analog video receivers share one bit-serial register bus (data +
/// clock) and each has its own latch-enable line and RSSI input. This module
/// owns the synthesizer register protocol, the frequency-to-register math,
/// RSSI oversampling, manual tuning, and the per-channel best-signal scan.
///
/// All bus timing is busy-waited through [`PanelHal`]; nothing here yields.
use crate::config;
use crate::hal::{Line, PanelHal};

/// Number of receivers on the panel
pub const CHANNEL_COUNT: usize = 3;

/// Synthesizer register holding the reference divider
pub const REG_SYNTH_A: u8 = 0x00;
/// Synthesizer register holding the N/A frequency word
pub const REG_SYNTH_B: u8 = 0x01;
/// Power-on value written to [`REG_SYNTH_A`]
pub const SYNTH_A_INIT: u32 = 0x0_0008;

/// Bits in one register packet: 4 address + 1 write flag + 20 data
pub const PACKET_BITS: u32 = 25;

/// Frequency tables, fixed per band (MHz)
pub static FREQS_5G8: &[u16] = &[5645, 5705, 5740, 5800, 5865, 5885, 5945];
pub static FREQS_3G3: &[u16] = &[3100, 3200, 3300, 3400, 3500, 3600, 3700];
pub static FREQS_1G2: &[u16] = &[1080, 1120, 1200, 1280, 1400, 1600, 1800, 2000, 2200];

/// Band profile labels, in channel order
pub const BAND_LABELS: [&str; CHANNEL_COUNT] = ["5.8G", "3.3G", "1.2G"];

/// Receiver tuning mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Auto,
    Manual,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Auto => "AUTO",
            Mode::Manual => "MANUAL",
        }
    }
}

/// One receiver module and its last known state.
#[derive(Debug, Clone)]
pub struct Channel {
    /// 1..=3
    pub id: u8,
    pub name: &'static str,
    pub band: &'static str,
    pub mode: Mode,
    pub scanning: bool,
    pub locked: bool,
    pub freqs: &'static [u16],
    /// Always `< freqs.len()`
    pub idx: usize,
    pub freq_mhz: u16,
    /// Last sampled level (raw ADC units)
    pub rssi_raw: u16,
    pub best_freq_mhz: u16,
    pub best_rssi_raw: u16,
}

impl Channel {
    const fn new(
        id: u8,
        name: &'static str,
        band: &'static str,
        freqs: &'static [u16],
        idx: usize,
    ) -> Self {
        Self {
            id,
            name,
            band,
            mode: Mode::Auto,
            scanning: false,
            locked: false,
            freqs,
            idx,
            freq_mhz: freqs[idx],
            rssi_raw: 0,
            best_freq_mhz: freqs[idx],
            best_rssi_raw: 0,
        }
    }

    fn latch(&self) -> Line {
        Line::VrxLatch(self.id)
    }

    fn rssi_line(&self) -> Line {
        Line::Rssi(self.id)
    }

    /// Clamp an index into this channel's table.
    pub fn clamp_index(&self, idx: i32) -> usize {
        idx.clamp(0, self.freqs.len() as i32 - 1) as usize
    }

    /// Table index one step up or down, wrapping at both ends.
    pub fn step_index(&self, up: bool) -> usize {
        let n = self.freqs.len();
        if up {
            (self.idx + 1) % n
        } else {
            (self.idx + n - 1) % n
        }
    }
}

/// The three receivers at their boot defaults (mode AUTO, unlocked).
pub fn default_channels() -> [Channel; CHANNEL_COUNT] {
    [
        Channel::new(1, "VRX-1 FS58R3MW", BAND_LABELS[0], FREQS_5G8, 3),
        Channel::new(2, "VRX-2 FS3137RX", BAND_LABELS[1], FREQS_3G3, 2),
        Channel::new(3, "VRX-3 FS1264R", BAND_LABELS[2], FREQS_1G2, 3),
    ]
}

/// Synthesizer word for a frequency: `(N << 7) | A`.
///
/// `divider = max(f - 479, 0) / 2`, `N = divider / 32`, `A = divider % 32`.
pub fn synth_word(freq_mhz: u16) -> u32 {
    let offset = (freq_mhz as u32).saturating_sub(479);
    let divider = offset / 2;
    let n = divider / 32;
    let a = divider % 32;
    (n << 7) | a
}

/// Build the 25-bit packet: address in bits 0..4, write flag in bit 4,
/// data in bits 5..25. Out-of-range address/data bits are masked off.
pub fn register_packet(addr: u8, data: u32) -> u32 {
    let addr = (addr & 0x0F) as u32;
    let data = data & 0xF_FFFF;
    (data << 5) | (1 << 4) | addr
}

fn clock_pulse(hal: &mut impl PanelHal) {
    hal.set_line(Line::VrxClock, true);
    hal.delay_us(config::BUS_CLOCK_PHASE_US);
    hal.set_line(Line::VrxClock, false);
    hal.delay_us(config::BUS_CLOCK_PHASE_US);
}

/// Shift one register write to a receiver, LSB first.
///
/// Latch low, 25 data bits each clocked high-then-low, then a latch pulse
/// and the settle delay the module needs before the next write.
pub fn write_register(hal: &mut impl PanelHal, latch: Line, addr: u8, data: u32) {
    let packet = register_packet(addr, data);

    hal.set_line(latch, false);
    for bit in 0..PACKET_BITS {
        hal.set_line(Line::VrxData, (packet >> bit) & 1 == 1);
        clock_pulse(hal);
    }
    hal.set_line(latch, true);
    hal.delay_us(config::BUS_LATCH_PULSE_US);
    hal.set_line(latch, false);
    hal.delay_us(config::BUS_SETTLE_US);
}

/// Average of [`config::RSSI_SAMPLES`] reads of an RSSI input.
pub fn read_rssi(hal: &mut impl PanelHal, line: Line) -> u16 {
    let mut sum: u32 = 0;
    for _ in 0..config::RSSI_SAMPLES {
        sum += hal.read_analog(line) as u32;
        hal.delay_us(config::RSSI_SAMPLE_GAP_US);
    }
    (sum / config::RSSI_SAMPLES) as u16
}

/// Power-on register setup for one receiver.
pub fn init(hal: &mut impl PanelHal, ch: &Channel) {
    write_register(hal, ch.latch(), REG_SYNTH_A, SYNTH_A_INIT);
}

/// Program the synthesizer only. Mode and lock are left to the caller.
fn program(hal: &mut impl PanelHal, ch: &mut Channel, freq_mhz: u16) {
    write_register(hal, ch.latch(), REG_SYNTH_B, synth_word(freq_mhz));
    ch.freq_mhz = freq_mhz;
}

/// Boot tune: program the stored frequency without touching mode or lock.
pub fn retune(hal: &mut impl PanelHal, ch: &mut Channel) {
    let freq = ch.best_freq_mhz;
    program(hal, ch, freq);
}

/// Manual tune to any frequency. Always MANUAL and locked.
///
/// Out-of-table frequencies are accepted; the register math clamps.
pub fn tune_freq(hal: &mut impl PanelHal, ch: &mut Channel, freq_mhz: u16) {
    ch.mode = Mode::Manual;
    program(hal, ch, freq_mhz);
    ch.locked = true;
}

/// Manual tune to a table entry; the index is clamped into the table.
pub fn tune_index(hal: &mut impl PanelHal, ch: &mut Channel, idx: i32) {
    let idx = ch.clamp_index(idx);
    let freq = ch.freqs[idx];
    ch.idx = idx;
    tune_freq(hal, ch, freq);
}

/// Refresh the channel's signal level.
pub fn sample(hal: &mut impl PanelHal, ch: &mut Channel) -> u16 {
    ch.rssi_raw = read_rssi(hal, ch.rssi_line());
    ch.rssi_raw
}

/// Sweep the channel's table and settle on the strongest entry.
///
/// Every entry is tuned, given [`config::SCAN_SETTLE_MS`] and sampled. The
/// first entry with the highest level wins ties. The channel ends tuned to
/// that entry in AUTO mode, locked only if the level reaches `min_lock`.
///
/// Blocks for roughly `len * (settle + bus + sampling)`; 9 entries is about
/// 330 ms. Hold is checked by the caller before the sweep, never during it.
pub fn scan(hal: &mut impl PanelHal, ch: &mut Channel, min_lock: u16) {
    ch.scanning = true;
    ch.locked = false;
    ch.mode = Mode::Auto;

    let mut best_level: u16 = 0;
    let mut best_idx: usize = 0;
    for (i, &freq) in ch.freqs.iter().enumerate() {
        program(hal, ch, freq);
        hal.delay_ms(config::SCAN_SETTLE_MS);
        let level = read_rssi(hal, ch.rssi_line());
        if level > best_level {
            best_level = level;
            best_idx = i;
        }
    }

    ch.best_rssi_raw = best_level;
    ch.best_freq_mhz = ch.freqs[best_idx];
    ch.idx = best_idx;
    let best_freq = ch.best_freq_mhz;
    program(hal, ch, best_freq);
    ch.locked = best_level >= min_lock;
    ch.scanning = false;

    log::info!(
        "{} scan: best {} MHz level {} ({})",
        ch.name,
        best_freq,
        best_level,
        if ch.locked { "locked" } else { "no lock" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockHal;

    fn channel(id: usize) -> Channel {
        default_channels()[id - 1].clone()
    }

    // ── Register math ──────────────────────────────────────────────

    #[test]
    fn synth_word_matches_formula() {
        for f in [479u16, 480, 1080, 1280, 3300, 5645, 5800, 5945, 6000] {
            let div = (f as u32 - 479) / 2;
            assert_eq!(synth_word(f), ((div / 32) << 7) | (div % 32), "f={f}");
        }
    }

    #[test]
    fn synth_word_known_values() {
        // 5800: (5321/2)=2660 -> N=83, A=4
        assert_eq!(synth_word(5800), (83 << 7) | 4);
        // 3300: 1410 -> N=44, A=2
        assert_eq!(synth_word(3300), (44 << 7) | 2);
    }

    #[test]
    fn synth_word_clamps_below_offset() {
        assert_eq!(synth_word(0), 0);
        assert_eq!(synth_word(478), 0);
        assert_eq!(synth_word(479), 0);
    }

    #[test]
    fn packet_layout() {
        let p = register_packet(0x0A, 0xABCDE);
        assert_eq!(p & 0x0F, 0x0A);
        assert_eq!((p >> 4) & 1, 1);
        assert_eq!((p >> 5) & 0xF_FFFF, 0xABCDE);
        assert!(p < (1 << 25));
    }

    #[test]
    fn packet_masks_oversized_fields() {
        let p = register_packet(0xFF, 0xFFFF_FFFF);
        assert_eq!(p, (1 << 25) - 1);
    }

    // ── Bus protocol ───────────────────────────────────────────────

    #[test]
    fn write_register_shifts_lsb_first() {
        let mut hal = MockHal::new();
        write_register(&mut hal, Line::VrxLatch(2), 0x01, 0x1234);

        assert_eq!(hal.latched.len(), 1);
        let l = hal.latched[0];
        assert_eq!(l.channel, 2);
        assert_eq!(l.bits, 25);
        assert_eq!(l.packet, register_packet(0x01, 0x1234));
        assert_eq!(l.address(), 0x01);
        assert_eq!(l.data(), 0x1234);
    }

    #[test]
    fn write_register_pulse_ordering_and_widths() {
        let mut hal = MockHal::new();
        write_register(&mut hal, Line::VrxLatch(1), 0x00, SYNTH_A_INIT);

        let latch: Vec<_> = hal
            .changes
            .iter()
            .filter(|c| c.line == Line::VrxLatch(1))
            .copied()
            .collect();
        assert_eq!(latch.len(), 3);
        assert!(!latch[0].high);
        assert!(latch[1].high);
        assert!(!latch[2].high);
        assert!(latch[2].at_us - latch[1].at_us >= 2);

        let clocks: Vec<_> = hal
            .changes
            .iter()
            .filter(|c| c.line == Line::VrxClock)
            .copied()
            .collect();
        assert_eq!(clocks.len(), 50);
        for pair in clocks.chunks(2) {
            assert!(pair[0].high && !pair[1].high);
            assert!(pair[1].at_us - pair[0].at_us >= 1);
        }
        // All clocking happens while the latch is low
        assert!(clocks.last().unwrap().at_us <= latch[1].at_us);
        // Settle delay after the latch drops
        assert!(hal.now_us - latch[2].at_us >= 80);
    }

    #[test]
    fn read_rssi_averages_six_samples() {
        let mut hal = MockHal::new();
        hal.default_level = 1000;
        assert_eq!(read_rssi(&mut hal, Line::Rssi(1)), 1000);
        assert_eq!(hal.now_us, 6 * 200);
    }

    // ── Tuning ─────────────────────────────────────────────────────

    #[test]
    fn tune_freq_locks_manual() {
        let mut hal = MockHal::new();
        let mut ch = channel(2);
        tune_freq(&mut hal, &mut ch, 3333);
        assert_eq!(ch.mode, Mode::Manual);
        assert!(ch.locked);
        assert_eq!(ch.freq_mhz, 3333);
        assert_eq!(hal.latched.last().unwrap().data(), synth_word(3333));
    }

    #[test]
    fn tune_index_clamps() {
        let mut hal = MockHal::new();
        let mut ch = channel(3);
        tune_index(&mut hal, &mut ch, 42);
        assert_eq!(ch.idx, 8);
        assert_eq!(ch.freq_mhz, 2200);
        tune_index(&mut hal, &mut ch, -3);
        assert_eq!(ch.idx, 0);
        assert_eq!(ch.freq_mhz, 1080);
        assert!(ch.locked);
        assert_eq!(ch.mode, Mode::Manual);
    }

    #[test]
    fn step_index_wraps() {
        let mut ch = channel(1);
        ch.idx = 6;
        assert_eq!(ch.step_index(true), 0);
        ch.idx = 0;
        assert_eq!(ch.step_index(false), 6);
    }

    // ── Scan ───────────────────────────────────────────────────────

    #[test]
    fn scan_picks_strongest_and_locks() {
        let mut hal = MockHal::new()
            .with_level(1, 5705, 800)
            .with_level(1, 5865, 1500)
            .with_level(1, 5945, 1200);
        let mut ch = channel(1);
        scan(&mut hal, &mut ch, 900);

        assert_eq!(ch.best_freq_mhz, 5865);
        assert_eq!(ch.best_rssi_raw, 1500);
        assert_eq!(ch.freq_mhz, 5865);
        assert_eq!(ch.idx, 4);
        assert!(ch.locked);
        assert!(!ch.scanning);
        assert_eq!(ch.mode, Mode::Auto);
        assert_eq!(hal.latched.last().unwrap().data(), synth_word(5865));
    }

    #[test]
    fn scan_first_maximum_wins_ties() {
        let mut hal = MockHal::new()
            .with_level(2, 3200, 1000)
            .with_level(2, 3500, 1000);
        let mut ch = channel(2);
        scan(&mut hal, &mut ch, 900);
        assert_eq!(ch.best_freq_mhz, 3200);
        assert_eq!(ch.idx, 1);
    }

    #[test]
    fn scan_below_min_lock_stays_unlocked() {
        let mut hal = MockHal::new().with_level(3, 1600, 850);
        let mut ch = channel(3);
        ch.locked = true;
        ch.mode = Mode::Manual;
        scan(&mut hal, &mut ch, 900);
        assert_eq!(ch.best_freq_mhz, 1600);
        assert!(!ch.locked);
        assert_eq!(ch.mode, Mode::Auto);
    }

    #[test]
    fn scan_lock_threshold_is_inclusive() {
        let mut hal = MockHal::new().with_level(3, 1600, 900);
        let mut ch = channel(3);
        scan(&mut hal, &mut ch, 900);
        assert!(ch.locked);
    }

    #[test]
    fn scan_silent_band_settles_on_first_entry() {
        let mut hal = MockHal::new();
        let mut ch = channel(2);
        scan(&mut hal, &mut ch, 700);
        assert_eq!(ch.idx, 0);
        assert_eq!(ch.freq_mhz, 3100);
        assert!(!ch.locked);
    }

    #[test]
    fn scan_waits_settle_time_per_entry() {
        let mut hal = MockHal::new();
        let mut ch = channel(1);
        scan(&mut hal, &mut ch, 900);
        let min_us = ch.freqs.len() as u64 * config::SCAN_SETTLE_MS as u64 * 1000;
        assert!(hal.now_us >= min_us);
        // one write per entry plus the final retune
        assert_eq!(hal.latched.len(), ch.freqs.len() + 1);
    }
}
