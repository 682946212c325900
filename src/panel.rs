/// The front panel control core.
///
/// [`Panel`] owns every piece of mutable state: the three receivers, the
/// active threshold profile, the operator session, the buzzer, the alert
/// machine and the serial line reader. The firmware calls [`Panel::boot`]
/// once and then [`Panel::tick`] forever; tests drive the same entry points
/// against the mock hardware.
///
/// One tick runs, in order: buzzer deadline, periodic RSSI resample, local
/// inputs, alert evaluation, serial drain and dispatch, periodic telemetry,
/// periodic display refresh. A full scan blocks the loop until the sweep is
/// done; nothing else runs in the meantime.
use crate::alert::{AlertInputs, AlertMachine, Visual};
use crate::buzzer::Buzzer;
use crate::comm::{self, bounded, ByteSource, Envelope, LineReader, LineSink};
use crate::config;
use crate::display::{self, ChannelView, Checklist, OverlayView, Page, Screen, Snapshot};
use crate::hal::PanelHal;
use crate::input::{InputEvent, InputSource};
use crate::profile::{ActiveProfile, ThresholdProfile};
use crate::protocol::{
    event, CmdName, CommandError, DeviceInfo, DeviceMessage, Features, FpvInfo, HostCommand, Label,
    LedInfo, LinkInfo, PanelFlags, ReqId, UiAlias, VrxInventory, VrxTelemetry,
};
use crate::timing::{elapsed, Deadline, Every};
use crate::vrx::{self, Channel, CHANNEL_COUNT};

const CHANNEL_IDS: [u8; CHANNEL_COUNT] = [1, 2, 3];

/// Channel by 1-based id, None when out of range.
fn channel_mut(channels: &mut [Channel; CHANNEL_COUNT], id: u8) -> Option<&mut Channel> {
    channels.get_mut((id as usize).checked_sub(1)?)
}

/// Operator-facing state. Nothing here survives a power cycle.
#[derive(Debug, Clone)]
pub struct Session {
    /// Selected receiver, 1..=3
    pub sel: u8,
    pub hold: bool,
    pub mute: bool,
    pub panic: bool,
    /// Band profile label set by the host. Stored only: it never retunes
    /// and telemetry reports the selected receiver's band instead.
    pub band: Label,
    pub page: Page,
    /// Framing errors since boot
    pub errors: u32,
    /// Commands acknowledged with `ok:false` since boot
    pub rejected: u32,
    /// Time the last command line was accepted
    pub last_rx: Option<u32>,
}

impl Default for Session {
    fn default() -> Self {
        let mut band = Label::new();
        let _ = band.push_str(vrx::BAND_LABELS[0]);
        Self {
            sel: 1,
            hold: false,
            mute: false,
            panic: false,
            band,
            page: Page::Overview,
            errors: 0,
            rejected: 0,
            last_rx: None,
        }
    }
}

/// The last command's outcome, shown until its deadline.
#[derive(Debug, Clone)]
struct Overlay {
    req_id: ReqId,
    cmd: CmdName,
    ok: bool,
    err: Option<&'static str>,
    until: Deadline,
}

/// Whether a command still needs its ack sent by the dispatcher.
enum Reply {
    Send,
    /// The handler already acknowledged (mute acks before applying)
    Sent,
}

pub struct Panel {
    pub channels: [Channel; CHANNEL_COUNT],
    pub profile: ActiveProfile,
    pub session: Session,
    pub checklist: Checklist,
    overlay: Option<Overlay>,
    buzzer: Buzzer,
    alert: AlertMachine,
    visual: Option<Visual>,
    reader: LineReader,
    rssi_every: Every,
    telemetry_every: Every,
    ui_every: Every,
}

impl Panel {
    pub fn new(now_ms: u32) -> Self {
        Self {
            channels: vrx::default_channels(),
            profile: ActiveProfile::new(),
            session: Session::default(),
            checklist: Checklist::default(),
            overlay: None,
            buzzer: Buzzer::new(),
            alert: AlertMachine::new(),
            visual: None,
            reader: LineReader::new(),
            rssi_every: Every::new(config::RSSI_MS, now_ms),
            telemetry_every: Every::new(config::TELEMETRY_MS, now_ms),
            ui_every: Every::new(config::UI_MS, now_ms),
        }
    }

    /// Power-on sequence: program the receivers, show safe, short-short
    /// beep, then announce capabilities and a first telemetry frame.
    pub fn boot(&mut self, hal: &mut impl PanelHal, sink: &mut impl LineSink) {
        for ch in self.channels.iter_mut() {
            vrx::init(hal, ch);
            vrx::retune(hal, ch);
            hal.delay_ms(config::BOOT_TUNE_GAP_MS);
        }
        self.profile.apply(ThresholdProfile::Balanced.as_str());
        self.show(hal, Visual::Safe);

        let mute = self.session.mute;
        self.buzzer.beep(hal, config::BOOT_BEEP_MS, mute);
        hal.delay_ms(config::BOOT_BEEP_GAP_MS);
        self.buzzer.tick(hal);
        self.buzzer.beep(hal, config::BOOT_BEEP_MS, mute);

        self.send_capabilities(hal, sink);
        self.send_telemetry(hal, sink);

        let now = hal.millis();
        self.rssi_every = Every::new(config::RSSI_MS, now);
        self.telemetry_every = Every::new(config::TELEMETRY_MS, now);
        self.ui_every = Every::new(config::UI_MS, now);
        log::info!("Front panel ready: {} v{}", config::DEVICE_MODEL, config::FW_VERSION);
    }

    /// One control-loop iteration. Returns a composed screen when a display
    /// refresh is due.
    pub fn tick<L>(
        &mut self,
        hal: &mut impl PanelHal,
        link: &mut L,
        inputs: &mut impl InputSource,
    ) -> Option<Screen>
    where
        L: LineSink + ByteSource,
    {
        self.buzzer.tick(hal);

        if self.rssi_every.due(hal.millis()) {
            for ch in self.channels.iter_mut() {
                vrx::sample(hal, ch);
            }
        }

        for ev in inputs.poll(hal.millis()) {
            self.handle_input(hal, link, ev);
        }

        self.update_alerts(hal);

        while let Some(byte) = link.read_byte() {
            self.feed_byte(hal, link, byte);
        }

        if self.telemetry_every.due(hal.millis()) {
            self.send_telemetry(hal, link);
        }

        let now = hal.millis();
        if self.ui_every.due(now) {
            if self.overlay.as_ref().is_some_and(|o| o.until.expired(now)) {
                self.overlay = None;
            }
            return Some(display::compose(&self.snapshot()));
        }
        None
    }

    // ── Alerts ─────────────────────────────────────────────────────────

    fn show(&mut self, hal: &mut impl PanelHal, visual: Visual) {
        if self.visual != Some(visual) {
            visual.apply(hal);
            self.visual = Some(visual);
        }
    }

    /// Evaluate the alert machine against the selected receiver.
    pub fn update_alerts(&mut self, hal: &mut impl PanelHal) {
        let out = self.alert.evaluate(&AlertInputs {
            level: self.selected().rssi_raw,
            hold: self.session.hold,
            mute: self.session.mute,
            panic: self.session.panic,
            thresholds: self.profile.thresholds(),
            now_ms: hal.millis(),
        });
        self.show(hal, out.visual);
        self.buzzer.drive(hal, out.buzzer, self.session.mute);
    }

    pub fn set_panic(&mut self, on: bool) {
        if on != self.session.panic {
            log::warn!("Panic {}", if on { "on" } else { "off" });
        }
        self.session.panic = on;
    }

    fn selected(&self) -> &Channel {
        let i = (self.session.sel as usize).clamp(1, CHANNEL_COUNT) - 1;
        &self.channels[i]
    }

    fn beep(&mut self, hal: &mut impl PanelHal, ms: u32) {
        self.buzzer.beep(hal, ms, self.session.mute);
    }

    // ── Scan ───────────────────────────────────────────────────────────

    /// Sweep one receiver (0-based index). No-op while held.
    pub fn scan_channel(&mut self, hal: &mut impl PanelHal, index: usize) {
        if self.session.hold {
            return;
        }
        let min_lock = self.profile.thresholds().min_lock;
        if let Some(ch) = self.channels.get_mut(index) {
            vrx::scan(hal, ch, min_lock);
        }
    }

    /// Sweep all receivers in order, bracketed by start/stop events.
    ///
    /// Owns the loop for the whole sweep, about a second for the stock
    /// tables. No-op while held.
    pub fn scan_all(&mut self, hal: &mut impl PanelHal, sink: &mut impl LineSink) {
        if self.session.hold {
            log::info!("Scan ignored: hold active");
            return;
        }
        self.checklist.scan = true;
        self.session.page = Page::Scan;
        self.present_scan(hal);
        self.beep(hal, config::SCAN_START_BEEP_MS);
        self.send_event(hal, sink, event::SCAN_START, 1);
        log::info!("Scan started");

        for index in 0..CHANNEL_COUNT {
            self.scan_channel(hal, index);
            self.present_scan(hal);
            self.beep(hal, config::SCAN_TICK_BEEP_MS);
            hal.delay_ms(config::SCAN_CHANNEL_GAP_MS);
            self.buzzer.tick(hal);
        }

        self.send_event(hal, sink, event::SCAN_STOP, 1);
        self.session.page = Page::Overview;
        log::info!("Scan finished: state {}", self.fpv_state());
    }

    /// The loop is not refreshing the display mid-sweep, so the scan page
    /// goes straight out. It takes the screen over any live overlay.
    fn present_scan(&self, hal: &mut impl PanelHal) {
        let mut snap = self.snapshot();
        snap.overlay = None;
        hal.present(&display::compose(&snap));
    }

    // ── Local inputs ───────────────────────────────────────────────────

    pub fn handle_input(
        &mut self,
        hal: &mut impl PanelHal,
        sink: &mut impl LineSink,
        ev: InputEvent,
    ) {
        let page = self.session.page;
        let browsing = matches!(page, Page::Overview | Page::Detail);
        match ev {
            InputEvent::TriggerScan if page != Page::Scan => self.scan_all(hal, sink),
            InputEvent::CyclePage => {
                self.session.page = page.next();
                self.beep(hal, config::PAGE_BEEP_MS);
            }
            InputEvent::NextChannel if browsing => {
                self.session.sel = self.session.sel % CHANNEL_COUNT as u8 + 1;
                self.beep(hal, config::SELECT_BEEP_MS);
            }
            InputEvent::PrevChannel if browsing => {
                self.session.sel = (self.session.sel + 1) % CHANNEL_COUNT as u8 + 1;
                self.beep(hal, config::SELECT_BEEP_MS);
            }
            InputEvent::TuneUp | InputEvent::TuneDown
                if page == Page::Detail && !self.session.hold =>
            {
                let up = ev == InputEvent::TuneUp;
                let sel = self.session.sel;
                let Some(ch) = channel_mut(&mut self.channels, sel) else {
                    return;
                };
                let idx = ch.step_index(up);
                vrx::tune_index(hal, ch, idx as i32);
                let name = if up {
                    event::LOCAL_TUNE_UP
                } else {
                    event::LOCAL_TUNE_DOWN
                };
                self.send_event(hal, sink, name, sel as i32);
                self.beep(hal, config::STEP_TUNE_BEEP_MS);
            }
            _ => {}
        }
    }

    // ── Serial link ────────────────────────────────────────────────────

    /// Feed every byte of `bytes` through the line reader.
    pub fn receive(&mut self, hal: &mut impl PanelHal, sink: &mut impl LineSink, bytes: &[u8]) {
        for &b in bytes {
            self.feed_byte(hal, sink, b);
        }
    }

    pub fn feed_byte(&mut self, hal: &mut impl PanelHal, sink: &mut impl LineSink, byte: u8) {
        let parsed = match self.reader.feed(byte) {
            None => return,
            Some(line) => line.and_then(comm::parse_command),
        };
        match parsed {
            Ok(envelope) => {
                self.session.last_rx = Some(hal.millis());
                self.checklist.uart_rx = true;
                self.dispatch(hal, sink, envelope);
            }
            Err(e) => {
                self.session.errors = self.session.errors.wrapping_add(1);
                log::warn!("Dropped inbound line: {} ({} errors)", e, self.session.errors);
            }
        }
    }

    /// Execute a parsed command and send its single ack.
    pub fn dispatch(&mut self, hal: &mut impl PanelHal, sink: &mut impl LineSink, envelope: Envelope) {
        let Envelope {
            req_id,
            cmd,
            command,
        } = envelope;
        log::info!("Command {} (req {})", cmd, req_id);

        let result = command.and_then(|c| self.execute(hal, sink, c, &req_id, &cmd));
        match result {
            Ok(Reply::Sent) => {}
            Ok(Reply::Send) => self.ack(hal, sink, &req_id, &cmd, None),
            Err(e) => {
                log::warn!("Command {} rejected: {}", cmd, e);
                self.session.rejected = self.session.rejected.wrapping_add(1);
                self.ack(hal, sink, &req_id, &cmd, Some(e));
            }
        }
    }

    fn execute(
        &mut self,
        hal: &mut impl PanelHal,
        sink: &mut impl LineSink,
        command: HostCommand,
        req_id: &str,
        cmd: &str,
    ) -> Result<Reply, CommandError> {
        match command {
            HostCommand::ScanStart => self.scan_all(hal, sink),
            HostCommand::TestBeep => self.checklist.beep = true,
            HostCommand::SetHold { hold } => {
                self.session.hold = hold;
                self.checklist.hold = true;
                self.send_event(hal, sink, event::HOLD_SET, hold as i32);
            }
            HostCommand::SetMute { mute } => {
                self.checklist.mute = true;
                // operator sees and hears the confirmation before silence
                self.send_event(hal, sink, event::MUTE_SET, mute as i32);
                self.ack(hal, sink, req_id, cmd, None);
                self.session.mute = mute;
                if mute {
                    self.buzzer.silence(hal);
                }
                return Ok(Reply::Sent);
            }
            HostCommand::VideoSelect { sel } => {
                if !(1..=CHANNEL_COUNT as u8).contains(&sel) {
                    return Err(CommandError::SelOutOfRange);
                }
                self.session.sel = sel;
                self.checklist.video = true;
                self.send_event(hal, sink, event::VIDEO_SELECT, sel as i32);
            }
            HostCommand::TuneFreq { vrx_id, freq_mhz } => {
                if self.session.hold {
                    return Err(CommandError::HoldActive);
                }
                let ch = channel_mut(&mut self.channels, vrx_id)
                    .ok_or(CommandError::VrxIdOutOfRange)?;
                vrx::tune_freq(hal, ch, freq_mhz);
                self.checklist.tune = true;
                self.send_event(hal, sink, event::TUNE_FREQ, vrx_id as i32);
            }
            HostCommand::TuneIndex { vrx_id, idx } => {
                if self.session.hold {
                    return Err(CommandError::HoldActive);
                }
                let ch = channel_mut(&mut self.channels, vrx_id)
                    .ok_or(CommandError::VrxIdOutOfRange)?;
                if idx < 0 || idx as usize >= ch.freqs.len() {
                    return Err(CommandError::IdxOutOfRange);
                }
                vrx::tune_index(hal, ch, idx);
                self.checklist.tune = true;
                self.send_event(hal, sink, event::TUNE_INDEX, vrx_id as i32);
            }
            HostCommand::SetThresholdProfile { threshold } => {
                self.profile.apply(&threshold);
            }
            HostCommand::SetBandProfile { band } => {
                log::info!("Band profile: {}", band);
                self.session.band = band;
            }
        }
        Ok(Reply::Send)
    }

    /// Send the ack and raise the overlay. Success adds the confirm beep.
    fn ack(
        &mut self,
        hal: &mut impl PanelHal,
        sink: &mut impl LineSink,
        req_id: &str,
        cmd: &str,
        err: Option<CommandError>,
    ) {
        let now = hal.millis();
        let err = err.map(|e| e.as_token());
        comm::send(
            sink,
            &DeviceMessage::CmdAck {
                proto: config::PROTO_VER,
                req_id,
                cmd,
                ok: err.is_none(),
                err,
                esp_ms: now,
                ts_ms: now,
            },
        );
        self.checklist.cmd_ack = true;

        let mut until = Deadline::new();
        until.set(now, config::OVERLAY_MS);
        self.overlay = Some(Overlay {
            req_id: bounded(req_id),
            cmd: bounded(cmd),
            ok: err.is_none(),
            err,
            until,
        });
        if err.is_none() {
            self.beep(hal, config::CONFIRM_BEEP_MS);
        }
    }

    // ── Outbound messages ──────────────────────────────────────────────

    fn send_event(&self, hal: &impl PanelHal, sink: &mut impl LineSink, name: &str, value: i32) {
        let now = hal.millis();
        comm::send(
            sink,
            &DeviceMessage::Event {
                proto: config::PROTO_VER,
                esp_ms: now,
                ts_ms: now,
                event: name,
                value,
            },
        );
    }

    pub fn send_capabilities(&self, hal: &impl PanelHal, sink: &mut impl LineSink) {
        let now = hal.millis();
        let thresholds = ThresholdProfile::ALL.map(|p| p.as_str());
        comm::send(
            sink,
            &DeviceMessage::Capabilities {
                proto: config::PROTO_VER,
                esp_ms: now,
                ts_ms: now,
                device: DeviceInfo {
                    model: config::DEVICE_MODEL,
                    fw_version: config::FW_VERSION,
                    hw: config::HW_MODEL,
                },
                features: Features {
                    fpv_scan: true,
                    fpv_lock: true,
                    fpv_hold: true,
                    manual_tune: true,
                    band_profiles: &vrx::BAND_LABELS,
                    threshold_profiles: &thresholds,
                    video_switch: true,
                    buzzer: true,
                    leds: true,
                    physical_mute_btn: true,
                },
                vrx: VrxInventory {
                    count: CHANNEL_COUNT as u8,
                    ids: &CHANNEL_IDS,
                },
            },
        );
    }

    pub fn send_telemetry(&mut self, hal: &impl PanelHal, sink: &mut impl LineSink) {
        let now = hal.millis();
        let s = &self.session;

        let vrx: [VrxTelemetry; CHANNEL_COUNT] = core::array::from_fn(|i| {
            let ch = &self.channels[i];
            VrxTelemetry {
                id: ch.id,
                mode: ch.mode.as_str(),
                lock: ch.locked as u8,
                scan: ch.scanning as u8,
                freq_mhz: ch.freq_mhz,
                idx: ch.idx as u8,
                rssi_raw: ch.rssi_raw,
                f: ch.freq_mhz,
                r: ch.rssi_raw,
                rssi_dbm: None,
            }
        });
        let locked: heapless::Vec<u8, CHANNEL_COUNT> =
            self.channels.iter().filter(|c| c.locked).map(|c| c.id).collect();
        let (r, y, g) = self.visual.unwrap_or(Visual::Safe).leds();

        let sent = comm::send(
            sink,
            &DeviceMessage::Telemetry {
                proto: config::PROTO_VER,
                esp_ms: now,
                ts_ms: now,
                sel: s.sel,
                ui: UiAlias {
                    hold: s.hold as u8,
                    vrx: s.sel,
                },
                link: LinkInfo {
                    rx_age_ms: s.last_rx.map_or(0, |t| elapsed(now, t)),
                    errors: s.errors,
                },
                panel: PanelFlags {
                    sel_vrx: s.sel,
                    hold: s.hold as u8,
                    mute: s.mute as u8,
                    panic: s.panic as u8,
                },
                fpv: FpvInfo {
                    band: self.selected().band,
                    threshold: self.profile.profile().as_str(),
                    state: self.fpv_state(),
                    locked_vrx: &locked,
                    active_vrx: &CHANNEL_IDS,
                },
                led: LedInfo {
                    r: r as u8,
                    y: y as u8,
                    g: g as u8,
                },
                vrx: &vrx,
            },
        );
        if sent {
            self.checklist.telemetry = true;
        }
    }

    // ── Read-only views ────────────────────────────────────────────────

    /// "hold", "locked", "scanning" or "stopped"
    pub fn fpv_state(&self) -> &'static str {
        if self.session.hold {
            "hold"
        } else if self.channels.iter().any(|c| c.locked) {
            "locked"
        } else if self.channels.iter().any(|c| c.scanning) {
            "scanning"
        } else {
            "stopped"
        }
    }

    pub fn buzzer_on(&self) -> bool {
        self.buzzer.is_on()
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        let view = |ch: &Channel| ChannelView {
            band: ch.band,
            name: ch.name,
            mode: ch.mode.as_str(),
            freq_mhz: ch.freq_mhz,
            rssi_raw: ch.rssi_raw,
            locked: ch.locked,
            scanning: ch.scanning,
            best_freq_mhz: ch.best_freq_mhz,
            best_rssi_raw: ch.best_rssi_raw,
        };
        Snapshot {
            page: self.session.page,
            sel: self.session.sel,
            fpv_state: self.fpv_state(),
            channels: [
                view(&self.channels[0]),
                view(&self.channels[1]),
                view(&self.channels[2]),
            ],
            hold: self.session.hold,
            mute: self.session.mute,
            panic: self.session.panic,
            errors: self.session.errors,
            rejected: self.session.rejected,
            overlay: self.overlay.as_ref().map(|o| OverlayView {
                req_id: &o.req_id,
                cmd: &o.cmd,
                ok: o.ok,
                err: o.err,
            }),
            checklist: self.checklist,
        }
    }
}
