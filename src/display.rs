/// Text screen composition for the 128x96 OLED.
///
/// The control core hands a read-only [`Snapshot`] to [`compose`] every UI
/// refresh and gets back at most [`ROWS`] lines of at most [`COLS`]
/// characters (6x10 font, 12 px pitch). Pixel drawing is the firmware's job.
/// An active command overlay replaces whatever page is showing.
use core::fmt::{self, Write};

use heapless::{String, Vec};

use crate::vrx::CHANNEL_COUNT;

pub const ROWS: usize = 8;
pub const COLS: usize = 21;

pub type Row = String<COLS>;
pub type Screen = Vec<Row, ROWS>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Overview,
    Detail,
    /// Shown while a sweep is running
    Scan,
    /// Bring-up checklist
    Test,
}

impl Page {
    /// Push-switch order: Overview, Detail, Test, back to Overview.
    pub fn next(self) -> Page {
        match self {
            Page::Overview => Page::Detail,
            Page::Detail => Page::Test,
            Page::Scan | Page::Test => Page::Overview,
        }
    }
}

/// Which link features have been exercised since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checklist {
    pub telemetry: bool,
    pub uart_rx: bool,
    pub cmd_ack: bool,
    pub beep: bool,
    pub scan: bool,
    pub tune: bool,
    pub hold: bool,
    pub mute: bool,
    pub video: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelView {
    pub band: &'static str,
    pub name: &'static str,
    pub mode: &'static str,
    pub freq_mhz: u16,
    pub rssi_raw: u16,
    pub locked: bool,
    pub scanning: bool,
    pub best_freq_mhz: u16,
    pub best_rssi_raw: u16,
}

/// Outcome of the most recent command, while its overlay is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayView<'a> {
    pub req_id: &'a str,
    pub cmd: &'a str,
    pub ok: bool,
    pub err: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub page: Page,
    /// Selected channel, 1..=3
    pub sel: u8,
    pub fpv_state: &'static str,
    pub channels: [ChannelView; CHANNEL_COUNT],
    pub hold: bool,
    pub mute: bool,
    pub panic: bool,
    /// Framing errors since boot
    pub errors: u32,
    /// Rejected commands since boot
    pub rejected: u32,
    pub overlay: Option<OverlayView<'a>>,
    pub checklist: Checklist,
}

/// Writer that keeps what fits and silently drops the rest.
struct Clip<'a>(&'a mut Row);

impl fmt::Write for Clip<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

struct Composer {
    screen: Screen,
}

impl Composer {
    fn line(&mut self, args: fmt::Arguments) {
        let mut row = Row::new();
        let _ = Clip(&mut row).write_fmt(args);
        // rows past the bottom of the panel are dropped
        let _ = self.screen.push(row);
    }

    fn text(&mut self, s: &str) {
        self.line(format_args!("{}", s));
    }
}

fn flag(b: bool) -> u8 {
    b as u8
}

fn overview(c: &mut Composer, snap: &Snapshot) {
    c.text("FPV OVERVIEW (3 VRX)");
    c.line(format_args!("SEL VRX{}  {}", snap.sel, snap.fpv_state));
    for (i, ch) in snap.channels.iter().enumerate() {
        let marker = if snap.sel as usize == i + 1 { '>' } else { ' ' };
        let lock = if ch.locked { '*' } else { ' ' };
        c.line(format_args!("{}{} F:{} R:{}{}", marker, ch.band, ch.freq_mhz, ch.rssi_raw, lock));
    }
    c.line(format_args!(
        "H:{} M:{} P:{}",
        flag(snap.hold),
        flag(snap.mute),
        flag(snap.panic)
    ));
    c.text("BTN=SCAN  SW=DETAIL");
}

fn detail(c: &mut Composer, snap: &Snapshot) {
    let i = (snap.sel as usize).clamp(1, CHANNEL_COUNT) - 1;
    let ch = &snap.channels[i];
    c.line(format_args!("DETAIL VRX{}", snap.sel));
    c.text(ch.name);
    c.line(format_args!("Band: {} {}", ch.band, ch.mode));
    c.line(format_args!("Freq: {} MHz", ch.freq_mhz));
    c.line(format_args!("RSSI: {}{}", ch.rssi_raw, if ch.locked { " LOCK" } else { "" }));
    c.text(if snap.hold { "HOLD: tune disabled" } else { "" });
    c.text("L/R VRX  U/D Tune");
    c.text("SW=TEST");
}

fn scan(c: &mut Composer, snap: &Snapshot) {
    c.text("SCANNING...");
    for (i, ch) in snap.channels.iter().enumerate() {
        let tag = if ch.scanning { '~' } else { ' ' };
        c.line(format_args!(
            "V{}{}best {} R{}",
            i + 1,
            tag,
            ch.best_freq_mhz,
            ch.best_rssi_raw
        ));
    }
}

fn test(c: &mut Composer, snap: &Snapshot) {
    let k = &snap.checklist;
    let cells = [
        ("TELEM", k.telemetry),
        ("UART RX", k.uart_rx),
        ("CMD ACK", k.cmd_ack),
        ("BEEP", k.beep),
        ("SCAN", k.scan),
        ("TUNE", k.tune),
        ("HOLD", k.hold),
        ("MUTE", k.mute),
        ("VIDEO", k.video),
    ];
    let mark = |ok: bool| if ok { 'x' } else { ' ' };
    c.text("TEST CHECKLIST");
    for pair in cells.chunks(2) {
        match pair {
            [(a, ax), (b, bx)] => c.line(format_args!("[{}]{:<7} [{}]{}", mark(*ax), a, mark(*bx), b)),
            [(a, ax)] => c.line(format_args!("[{}]{}", mark(*ax), a)),
            _ => {}
        }
    }
    c.line(format_args!("ERR:{} REJ:{}", snap.errors, snap.rejected));
    c.text("SW=EXIT TEST");
}

fn overlay(c: &mut Composer, o: &OverlayView) {
    c.text("SERIAL CMD RECEIVED");
    c.line(format_args!("REQ: {}", if o.req_id.is_empty() { "-" } else { o.req_id }));
    c.line(format_args!("CMD: {}", o.cmd));
    c.line(format_args!("RESULT: {}", if o.ok { "OK" } else { "FAIL" }));
    c.line(format_args!("ERR: {}", o.err.unwrap_or("-")));
    c.text("");
    c.text("Beep=cmd confirm");
}

/// Lay out one refresh worth of text.
pub fn compose(snap: &Snapshot) -> Screen {
    let mut c = Composer {
        screen: Screen::new(),
    };
    if let Some(o) = &snap.overlay {
        overlay(&mut c, o);
        return c.screen;
    }
    match snap.page {
        Page::Overview => overview(&mut c, snap),
        Page::Detail => detail(&mut c, snap),
        Page::Scan => scan(&mut c, snap),
        Page::Test => test(&mut c, snap),
    }
    c.screen
}
