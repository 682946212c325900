/// Compile-time tuning for the front panel.
///
/// Timing values are milliseconds unless the name says otherwise. Nothing
/// here is persisted or changed at runtime; the session state in
/// [`crate::panel`] carries everything the host can adjust.

// ── Identity ───────────────────────────────────────────────────────────

/// Protocol version carried in every outbound line
pub const PROTO_VER: u8 = 1;

/// Device model reported in capabilities
pub const DEVICE_MODEL: &str = "N-Defender FrontPanel";

/// Firmware version string
pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hardware model reported in capabilities
pub const HW_MODEL: &str = "ESP32-S3";

// ── Serial link ────────────────────────────────────────────────────────

/// Serial baud rate
pub const SERIAL_BAUD: u32 = 115200;

/// Longest inbound line accepted before drop-and-resync
pub const MAX_LINE_LEN: usize = 900;

/// Longest request id echoed back in acks
pub const MAX_REQ_ID_LEN: usize = 64;

/// Longest command name echoed back in acks
pub const MAX_CMD_LEN: usize = 64;

/// Request id substituted when a command carries none
pub const NO_REQ_ID: &str = "no_req";

// ── Control loop cadence ───────────────────────────────────────────────

/// Telemetry emission period (10 Hz)
pub const TELEMETRY_MS: u32 = 100;

/// Signal level resample period
pub const RSSI_MS: u32 = 120;

/// Display refresh period
pub const UI_MS: u32 = 150;

// ── Receiver timing ────────────────────────────────────────────────────

/// Synthesizer/AGC settle time after each tune during a scan
pub const SCAN_SETTLE_MS: u32 = 35;

/// Gap between channels in a full scan
pub const SCAN_CHANNEL_GAP_MS: u32 = 60;

/// Gap between receivers during boot tuning
pub const BOOT_TUNE_GAP_MS: u32 = 20;

/// Clock phase width on the register bus (each of high and low)
pub const BUS_CLOCK_PHASE_US: u32 = 1;

/// Latch-enable pulse width after the 25 bits are shifted
pub const BUS_LATCH_PULSE_US: u32 = 2;

/// Settle delay after the latch pulse, before the next register write
pub const BUS_SETTLE_US: u32 = 80;

/// Number of samples averaged per signal level read
pub const RSSI_SAMPLES: u32 = 6;

/// Spacing between signal level samples
pub const RSSI_SAMPLE_GAP_US: u32 = 200;

// ── Alert cadence ──────────────────────────────────────────────────────

/// Half-period of the danger (and panic) buzzer pattern
pub const DANGER_HALF_PERIOD_MS: u32 = 150;

/// Window length of the alert pulse pattern; one pulse per window
pub const ALERT_WINDOW_MS: u32 = 900;

// ── Operator feedback ──────────────────────────────────────────────────

/// How long the command overlay stays on screen
pub const OVERLAY_MS: u32 = 5000;

/// Confirmation beep after every command
pub const CONFIRM_BEEP_MS: u32 = 3000;

/// Alert pulse length
pub const ALERT_BEEP_MS: u32 = 120;

/// Long beep when a full scan starts
pub const SCAN_START_BEEP_MS: u32 = 450;

/// Short tick between channels of a full scan
pub const SCAN_TICK_BEEP_MS: u32 = 70;

/// Tick when cycling display pages
pub const PAGE_BEEP_MS: u32 = 60;

/// Tick when changing the selected receiver
pub const SELECT_BEEP_MS: u32 = 40;

/// Tick on a local step-tune
pub const STEP_TUNE_BEEP_MS: u32 = 50;

/// Each of the two boot beeps
pub const BOOT_BEEP_MS: u32 = 80;

/// Pause between the two boot beeps
pub const BOOT_BEEP_GAP_MS: u32 = 120;

// ── Local inputs ───────────────────────────────────────────────────────

/// Button debounce interval
pub const DEBOUNCE_MS: u32 = 30;

/// Joystick deflection (ADC counts from centre) that counts as a move
pub const JOY_DEADZONE: i32 = 450;

/// Minimum time between repeated joystick moves
pub const JOY_REPEAT_MS: u32 = 160;
