/// JSON line protocol between the front panel and the host.
///
/// All messages are newline-delimited JSON (NDJSON), one record per line.
/// Outbound records are serialized with `serde_json_core` from the types
/// below; inbound commands are flat objects picked apart by
/// [`crate::fields`] and validated in [`crate::comm::parse_command`].
/// Uses `heapless` types for no_std/no-alloc operation.
use core::fmt;

use heapless::String;
use serde::Serialize;

use crate::config::{MAX_CMD_LEN, MAX_REQ_ID_LEN};

/// Request id echoed back in acks
pub type ReqId = String<MAX_REQ_ID_LEN>;

/// Command name echoed back in acks
pub type CmdName = String<MAX_CMD_LEN>;

/// Threshold profile or band label carried by a command
pub type Label = String<16>;

/// Device identity block of the capabilities message
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub model: &'static str,
    pub fw_version: &'static str,
    pub hw: &'static str,
}

/// Feature flags advertised once at boot
#[derive(Debug, Clone, Serialize)]
pub struct Features<'a> {
    pub fpv_scan: bool,
    pub fpv_lock: bool,
    pub fpv_hold: bool,
    pub manual_tune: bool,
    pub band_profiles: &'a [&'static str],
    pub threshold_profiles: &'a [&'static str],
    pub video_switch: bool,
    pub buzzer: bool,
    pub leds: bool,
    pub physical_mute_btn: bool,
}

/// Receiver inventory
#[derive(Debug, Clone, Serialize)]
pub struct VrxInventory<'a> {
    pub count: u8,
    pub ids: &'a [u8],
}

/// Short-form UI alias block (`ui.hold`, `ui.vrx`)
#[derive(Debug, Clone, Serialize)]
pub struct UiAlias {
    pub hold: u8,
    pub vrx: u8,
}

/// Serial link health
#[derive(Debug, Clone, Serialize)]
pub struct LinkInfo {
    /// Milliseconds since the last accepted line (0 before any)
    pub rx_age_ms: u32,
    /// Framing errors since boot
    pub errors: u32,
}

/// Operator flags
#[derive(Debug, Clone, Serialize)]
pub struct PanelFlags {
    pub sel_vrx: u8,
    pub hold: u8,
    pub mute: u8,
    pub panic: u8,
}

/// Scan/lock summary
#[derive(Debug, Clone, Serialize)]
pub struct FpvInfo<'a> {
    pub band: &'a str,
    pub threshold: &'static str,
    /// "hold", "locked", "scanning" or "stopped"
    pub state: &'static str,
    pub locked_vrx: &'a [u8],
    pub active_vrx: &'a [u8],
}

/// LED read-back, 0/1 each
#[derive(Debug, Clone, Serialize)]
pub struct LedInfo {
    pub r: u8,
    pub y: u8,
    pub g: u8,
}

/// Per-receiver telemetry. `f` and `r` alias `freq_mhz` and `rssi_raw`.
#[derive(Debug, Clone, Serialize)]
pub struct VrxTelemetry {
    pub id: u8,
    pub mode: &'static str,
    pub lock: u8,
    pub scan: u8,
    pub freq_mhz: u16,
    pub idx: u8,
    pub rssi_raw: u16,
    pub f: u16,
    pub r: u16,
    /// Always null: the receivers only expose raw RSSI
    pub rssi_dbm: Option<i16>,
}

/// Messages sent from the panel to the host
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage<'a> {
    /// Sent once at boot
    #[serde(rename = "capabilities")]
    Capabilities {
        proto: u8,
        esp_ms: u32,
        ts_ms: u32,
        device: DeviceInfo,
        features: Features<'a>,
        vrx: VrxInventory<'a>,
    },
    /// Periodic full state snapshot
    #[serde(rename = "telemetry")]
    Telemetry {
        proto: u8,
        esp_ms: u32,
        ts_ms: u32,
        /// Alias of `panel.sel_vrx`
        sel: u8,
        ui: UiAlias,
        link: LinkInfo,
        panel: PanelFlags,
        fpv: FpvInfo<'a>,
        led: LedInfo,
        vrx: &'a [VrxTelemetry],
    },
    /// Discrete state transition
    #[serde(rename = "event")]
    Event {
        proto: u8,
        esp_ms: u32,
        ts_ms: u32,
        event: &'a str,
        value: i32,
    },
    /// Exactly one per accepted command
    #[serde(rename = "cmd_ack")]
    CmdAck {
        proto: u8,
        req_id: &'a str,
        cmd: &'a str,
        ok: bool,
        err: Option<&'a str>,
        esp_ms: u32,
        ts_ms: u32,
    },
}

/// Event names carried by [`DeviceMessage::Event`]
pub mod event {
    pub const SCAN_START: &str = "SCAN_START_PRESS";
    pub const SCAN_STOP: &str = "SCAN_STOP_PRESS";
    pub const HOLD_SET: &str = "HOLD_SET";
    pub const MUTE_SET: &str = "MUTE_SET";
    pub const VIDEO_SELECT: &str = "VIDEO_SELECT";
    pub const TUNE_FREQ: &str = "FPV_TUNE_FREQ";
    pub const TUNE_INDEX: &str = "FPV_TUNE_INDEX";
    pub const LOCAL_TUNE_UP: &str = "LOCAL_TUNE_UP";
    pub const LOCAL_TUNE_DOWN: &str = "LOCAL_TUNE_DOWN";
}

/// Inbound command names
pub mod cmd {
    pub const SCAN_START: &str = "FPV_SCAN_START";
    pub const HOLD_SET: &str = "FPV_HOLD_SET";
    pub const MUTE_SET: &str = "MUTE_SET";
    pub const VIDEO_SELECT: &str = "VIDEO_SELECT";
    pub const TUNE_FREQ: &str = "FPV_TUNE_FREQ";
    pub const TUNE_INDEX: &str = "FPV_TUNE_INDEX";
    pub const SET_THRESHOLD_PROFILE: &str = "FPV_SET_THRESHOLD_PROFILE";
    pub const SET_BAND_PROFILE: &str = "FPV_SET_BAND_PROFILE";
    pub const TEST_BEEP: &str = "TEST_BEEP";
}

/// Type marker every inbound command must carry
pub const CMD_TYPE: &str = "cmd";

/// Commands sent from the host to the panel, after field validation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// Full scan of all receivers
    ScanStart,
    SetHold { hold: bool },
    SetMute { mute: bool },
    /// Select the receiver shown/alerted on (1..=3)
    VideoSelect { sel: u8 },
    /// Manual tune; `freq_mhz` already clamped into `u16`
    TuneFreq { vrx_id: u8, freq_mhz: u16 },
    /// Manual tune to a table entry; index checked at dispatch
    TuneIndex { vrx_id: u8, idx: i32 },
    SetThresholdProfile { threshold: Label },
    SetBandProfile { band: Label },
    TestBeep,
}

/// Validation failure, reported in a `cmd_ack` with `ok:false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    MissingType,
    MissingCmd,
    MissingHold,
    MissingMute,
    MissingSel,
    MissingVrxId,
    MissingFreq,
    MissingIdx,
    MissingThreshold,
    MissingBand,
    SelOutOfRange,
    VrxIdOutOfRange,
    IdxOutOfRange,
    /// Tuning refused while the operator hold is on
    HoldActive,
    UnknownCmd,
}

impl CommandError {
    /// Machine-readable token carried in `err`
    pub fn as_token(&self) -> &'static str {
        match self {
            CommandError::MissingType => "missing_type",
            CommandError::MissingCmd => "missing_cmd",
            CommandError::MissingHold => "missing_hold",
            CommandError::MissingMute => "missing_mute",
            CommandError::MissingSel => "missing_sel",
            CommandError::MissingVrxId => "missing_vrx_id",
            CommandError::MissingFreq => "missing_freq_mhz",
            CommandError::MissingIdx => "missing_idx",
            CommandError::MissingThreshold => "missing_threshold",
            CommandError::MissingBand => "missing_band",
            CommandError::SelOutOfRange => "sel_oob",
            CommandError::VrxIdOutOfRange => "vrx_id_oob",
            CommandError::IdxOutOfRange => "idx_oob",
            CommandError::HoldActive => "hold_active",
            CommandError::UnknownCmd => "unknown_cmd",
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 1024;
