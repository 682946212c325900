/// Serial NDJSON transport: line framing, serialization and command parsing.
///
/// Inbound bytes are accumulated by [`LineReader`] into bounded lines;
/// complete lines are turned into an [`Envelope`] by [`parse_command`].
/// Outbound [`DeviceMessage`]s are serialized one per line and handed to a
/// [`LineSink`]. The link is best effort: a message that fails to serialize
/// is logged and dropped.
use core::fmt;

use crate::config::{MAX_LINE_LEN, NO_REQ_ID};
use crate::fields::Fields;
use crate::protocol::{
    cmd, CmdName, CommandError, DeviceMessage, HostCommand, Label, ReqId, CMD_TYPE, MAX_MSG_LEN,
};
use crate::vrx::CHANNEL_COUNT;

/// Framing errors. Counted in telemetry, never acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// First non-whitespace character is not `{`
    NotObject,
    /// Line exceeded [`MAX_LINE_LEN`]; the rest of it is discarded
    Overflow,
    /// Object carries a type marker other than `"cmd"`
    NotCommand,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::NotObject => f.write_str("line is not an object"),
            FrameError::Overflow => f.write_str("line too long"),
            FrameError::NotCommand => f.write_str("record is not a command"),
        }
    }
}

/// Destination for outbound lines (the UART in firmware).
pub trait LineSink {
    /// Write one complete line, trailing `\n` included.
    fn send_line(&mut self, line: &[u8]);
}

/// Source of inbound bytes, drained without blocking.
pub trait ByteSource {
    /// Next received byte, or None when nothing is pending.
    fn read_byte(&mut self) -> Option<u8>;
}

#[cfg(test)]
impl LineSink for std::vec::Vec<std::string::String> {
    fn send_line(&mut self, line: &[u8]) {
        let text = core::str::from_utf8(line).unwrap_or("<invalid utf-8>");
        self.push(text.trim_end_matches('\n').to_owned());
    }
}

// ── Serialization helpers ──────────────────────────────────────────────

/// Serialize a DeviceMessage to JSON bytes and append the NDJSON newline.
/// Returns the number of bytes written, or None if it did not fit.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    let len = serde_json_core::to_slice(msg, buf).ok()?;
    if len < buf.len() {
        buf[len] = b'\n';
        Some(len + 1)
    } else {
        None
    }
}

/// Serialize and send one message. Returns false if it was dropped.
pub fn send(sink: &mut impl LineSink, msg: &DeviceMessage) -> bool {
    let mut buf = [0u8; MAX_MSG_LEN];
    match serialize_message(msg, &mut buf) {
        Some(len) => {
            sink.send_line(&buf[..len]);
            true
        }
        None => {
            log::warn!("Dropped outbound message: exceeds {} bytes", MAX_MSG_LEN);
            false
        }
    }
}

// ── Command parsing ────────────────────────────────────────────────────

/// A framed command record. `command` carries the validation outcome; the
/// request id and command name are echoed back in the ack either way.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub req_id: ReqId,
    pub cmd: CmdName,
    pub command: Result<HostCommand, CommandError>,
}

/// Copy as much of `s` as fits, cut on a char boundary.
pub(crate) fn bounded<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Decode a raw string value from [`Fields`] into a bounded string, cut
/// when full. A malformed escape or a lone surrogate ends the value.
pub(crate) fn unescaped<const N: usize>(raw: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        let c = match c {
            '\\' => match chars.next() {
                Some('"') => '"',
                Some('\\') => '\\',
                Some('/') => '/',
                Some('b') => '\u{8}',
                Some('f') => '\u{c}',
                Some('n') => '\n',
                Some('r') => '\r',
                Some('t') => '\t',
                Some('u') => {
                    let rest = chars.as_str();
                    let code = rest
                        .get(..4)
                        .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
                        .and_then(|h| u32::from_str_radix(h, 16).ok())
                        .and_then(char::from_u32);
                    match code {
                        Some(c) => {
                            chars = rest[4..].chars();
                            c
                        }
                        None => break,
                    }
                }
                _ => break,
            },
            c => c,
        };
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

fn channel_id(fields: &Fields, missing: CommandError) -> Result<u8, CommandError> {
    let id = fields.get_int("vrx_id").ok_or(missing)?;
    if (1..=CHANNEL_COUNT as i32).contains(&id) {
        Ok(id as u8)
    } else {
        Err(CommandError::VrxIdOutOfRange)
    }
}

fn flag(fields: &Fields, key: &str, missing: CommandError) -> Result<bool, CommandError> {
    fields.get_int(key).map(|v| v != 0).ok_or(missing)
}

fn label(fields: &Fields, key: &str, missing: CommandError) -> Result<Label, CommandError> {
    fields.get_str(key).map(unescaped).ok_or(missing)
}

/// Validate the parameters of a named command.
///
/// Channel ids and the selection are range-checked here. Table indices are
/// checked at dispatch against the target channel's table.
fn decode(name: &str, fields: &Fields) -> Result<HostCommand, CommandError> {
    match name {
        cmd::SCAN_START => Ok(HostCommand::ScanStart),
        cmd::TEST_BEEP => Ok(HostCommand::TestBeep),
        cmd::HOLD_SET => Ok(HostCommand::SetHold {
            hold: flag(fields, "hold", CommandError::MissingHold)?,
        }),
        cmd::MUTE_SET => Ok(HostCommand::SetMute {
            mute: flag(fields, "mute", CommandError::MissingMute)?,
        }),
        cmd::VIDEO_SELECT => {
            let sel = fields.get_int("sel").ok_or(CommandError::MissingSel)?;
            if !(1..=CHANNEL_COUNT as i32).contains(&sel) {
                return Err(CommandError::SelOutOfRange);
            }
            Ok(HostCommand::VideoSelect { sel: sel as u8 })
        }
        cmd::TUNE_FREQ => {
            let vrx_id = channel_id(fields, CommandError::MissingVrxId)?;
            let freq = fields.get_int("freq_mhz").ok_or(CommandError::MissingFreq)?;
            Ok(HostCommand::TuneFreq {
                vrx_id,
                freq_mhz: freq.clamp(0, u16::MAX as i32) as u16,
            })
        }
        cmd::TUNE_INDEX => {
            let vrx_id = channel_id(fields, CommandError::MissingVrxId)?;
            let idx = fields.get_int("idx").ok_or(CommandError::MissingIdx)?;
            Ok(HostCommand::TuneIndex { vrx_id, idx })
        }
        cmd::SET_THRESHOLD_PROFILE => Ok(HostCommand::SetThresholdProfile {
            threshold: label(fields, "threshold", CommandError::MissingThreshold)?,
        }),
        cmd::SET_BAND_PROFILE => Ok(HostCommand::SetBandProfile {
            band: label(fields, "band", CommandError::MissingBand)?,
        }),
        _ => Err(CommandError::UnknownCmd),
    }
}

/// Parse one framed line into a command envelope.
///
/// Only a record explicitly typed as something other than a command is a
/// framing error; everything else yields an envelope to acknowledge.
pub fn parse_command(line: &[u8]) -> Result<Envelope, FrameError> {
    let fields = Fields::new(line);

    let typed = match fields.get_str("type") {
        Some(CMD_TYPE) => true,
        Some(_) => return Err(FrameError::NotCommand),
        None => false,
    };

    let req_id = unescaped(fields.get_str("req_id").filter(|r| !r.is_empty()).unwrap_or(NO_REQ_ID));
    let name = fields.get_str("cmd").unwrap_or("");
    let command = if !typed {
        Err(CommandError::MissingType)
    } else if name.is_empty() {
        Err(CommandError::MissingCmd)
    } else {
        decode(name, &fields)
    };

    Ok(Envelope {
        req_id,
        cmd: unescaped(name),
        command,
    })
}

// ── Serial NDJSON reader ───────────────────────────────────────────────

/// Serial NDJSON reader state machine.
///
/// Accumulates bytes until `\n`, then yields the line. `\r` is dropped.
/// Blank lines are skipped silently. A line that outgrows the buffer is
/// reported once and the rest of it, up to the next `\n`, is discarded.
pub struct LineReader {
    buf: [u8; MAX_LINE_LEN],
    pos: usize,
    discarding: bool,
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_LINE_LEN],
            pos: 0,
            discarding: false,
        }
    }

    /// Feed a byte into the reader. Returns a complete object-shaped line
    /// (without newline), or the framing error that ended a line.
    pub fn feed(&mut self, byte: u8) -> Option<Result<&[u8], FrameError>> {
        match byte {
            b'\r' => None,
            b'\n' => {
                let len = self.pos;
                self.pos = 0;
                if core::mem::take(&mut self.discarding) {
                    return None;
                }
                let line = &self.buf[..len];
                match line.iter().find(|b| !b.is_ascii_whitespace()) {
                    None => None,
                    Some(b'{') => Some(Ok(line)),
                    Some(_) => Some(Err(FrameError::NotObject)),
                }
            }
            _ if self.discarding => None,
            _ if self.pos < self.buf.len() => {
                self.buf[self.pos] = byte;
                self.pos += 1;
                None
            }
            _ => {
                // Overflow: drop what we have and resync on the next newline
                self.pos = 0;
                self.discarding = true;
                Some(Err(FrameError::Overflow))
            }
        }
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(reader: &mut LineReader, data: &[u8]) -> Vec<Result<Vec<u8>, FrameError>> {
        data.iter()
            .filter_map(|&b| reader.feed(b).map(|r| r.map(|l| l.to_vec())))
            .collect()
    }

    #[test]
    fn reader_yields_line_without_cr() {
        let mut r = LineReader::new();
        let out = feed_all(&mut r, b"{\"a\":1}\r\n");
        assert_eq!(out, vec![Ok(b"{\"a\":1}".to_vec())]);
    }

    #[test]
    fn reader_rejects_plain_text_and_skips_blank() {
        let mut r = LineReader::new();
        let out = feed_all(&mut r, b"hello\n\n   \n  {\"x\":2}\n");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Err(FrameError::NotObject));
        assert_eq!(out[1], Ok(b"  {\"x\":2}".to_vec()));
    }

    #[test]
    fn reader_overflow_reports_once_and_resyncs() {
        let mut r = LineReader::new();
        let mut data = vec![b'{'; MAX_LINE_LEN + 50];
        data.push(b'\n');
        data.extend_from_slice(b"{\"ok\":1}\n");
        let out = feed_all(&mut r, &data);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Err(FrameError::Overflow));
        assert_eq!(out[1], Ok(b"{\"ok\":1}".to_vec()));
    }

    #[test]
    fn reader_accepts_line_at_bound() {
        let mut r = LineReader::new();
        let mut data = vec![b' '; MAX_LINE_LEN];
        data[0] = b'{';
        data.push(b'\n');
        let out = feed_all(&mut r, &data);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_ok());
    }

    #[test]
    fn parse_tune_freq() {
        let env = parse_command(
            br#"{"type":"cmd","cmd":"FPV_TUNE_FREQ","req_id":"r1","vrx_id":2,"freq_mhz":3300}"#,
        )
        .unwrap();
        assert_eq!(env.req_id.as_str(), "r1");
        assert_eq!(env.cmd.as_str(), "FPV_TUNE_FREQ");
        assert_eq!(
            env.command,
            Ok(HostCommand::TuneFreq {
                vrx_id: 2,
                freq_mhz: 3300
            })
        );
    }

    #[test]
    fn parse_missing_req_id_uses_sentinel() {
        let env = parse_command(br#"{"type":"cmd","cmd":"TEST_BEEP"}"#).unwrap();
        assert_eq!(env.req_id.as_str(), NO_REQ_ID);
        assert_eq!(env.command, Ok(HostCommand::TestBeep));
    }

    #[test]
    fn parse_missing_cmd() {
        let env = parse_command(br#"{"type":"cmd","req_id":"5"}"#).unwrap();
        assert_eq!(env.command, Err(CommandError::MissingCmd));
        assert_eq!(env.cmd.as_str(), "");
    }

    #[test]
    fn parse_missing_type() {
        let env = parse_command(br#"{"cmd":"TEST_BEEP","req_id":"5"}"#).unwrap();
        assert_eq!(env.command, Err(CommandError::MissingType));
    }

    #[test]
    fn parse_foreign_type_is_framing_error() {
        assert_eq!(
            parse_command(br#"{"type":"telemetry","cmd":"TEST_BEEP"}"#),
            Err(FrameError::NotCommand)
        );
    }

    #[test]
    fn parse_sel_range() {
        let env = parse_command(br#"{"type":"cmd","cmd":"VIDEO_SELECT","sel":5}"#).unwrap();
        assert_eq!(env.command, Err(CommandError::SelOutOfRange));
        let env = parse_command(br#"{"type":"cmd","cmd":"VIDEO_SELECT","sel":0}"#).unwrap();
        assert_eq!(env.command, Err(CommandError::SelOutOfRange));
        let env = parse_command(br#"{"type":"cmd","cmd":"VIDEO_SELECT","sel":3}"#).unwrap();
        assert_eq!(env.command, Ok(HostCommand::VideoSelect { sel: 3 }));
        let env = parse_command(br#"{"type":"cmd","cmd":"VIDEO_SELECT"}"#).unwrap();
        assert_eq!(env.command, Err(CommandError::MissingSel));
    }

    #[test]
    fn parse_vrx_id_checked_before_other_fields() {
        let env = parse_command(br#"{"type":"cmd","cmd":"FPV_TUNE_INDEX","vrx_id":4,"idx":1}"#).unwrap();
        assert_eq!(env.command, Err(CommandError::VrxIdOutOfRange));
        let env = parse_command(br#"{"type":"cmd","cmd":"FPV_TUNE_INDEX","vrx_id":1}"#).unwrap();
        assert_eq!(env.command, Err(CommandError::MissingIdx));
        let env = parse_command(br#"{"type":"cmd","cmd":"FPV_TUNE_FREQ","freq_mhz":5800}"#).unwrap();
        assert_eq!(env.command, Err(CommandError::MissingVrxId));
    }

    #[test]
    fn parse_freq_clamps_into_u16() {
        let env = parse_command(br#"{"type":"cmd","cmd":"FPV_TUNE_FREQ","vrx_id":1,"freq_mhz":-20}"#).unwrap();
        assert_eq!(env.command, Ok(HostCommand::TuneFreq { vrx_id: 1, freq_mhz: 0 }));
        let env = parse_command(br#"{"type":"cmd","cmd":"FPV_TUNE_FREQ","vrx_id":1,"freq_mhz":70000}"#).unwrap();
        assert_eq!(env.command, Ok(HostCommand::TuneFreq { vrx_id: 1, freq_mhz: u16::MAX }));
    }

    #[test]
    fn parse_flags_and_labels() {
        let env = parse_command(br#"{"type":"cmd","cmd":"FPV_HOLD_SET","hold":1}"#).unwrap();
        assert_eq!(env.command, Ok(HostCommand::SetHold { hold: true }));
        let env = parse_command(br#"{"type":"cmd","cmd":"MUTE_SET","mute":0}"#).unwrap();
        assert_eq!(env.command, Ok(HostCommand::SetMute { mute: false }));
        let env = parse_command(br#"{"type":"cmd","cmd":"MUTE_SET"}"#).unwrap();
        assert_eq!(env.command, Err(CommandError::MissingMute));
        let env = parse_command(br#"{"type":"cmd","cmd":"FPV_SET_THRESHOLD_PROFILE","threshold":"Strict"}"#).unwrap();
        assert!(matches!(env.command, Ok(HostCommand::SetThresholdProfile { ref threshold }) if threshold.as_str() == "Strict"));
        let env = parse_command(br#"{"type":"cmd","cmd":"FPV_SET_BAND_PROFILE"}"#).unwrap();
        assert_eq!(env.command, Err(CommandError::MissingBand));
    }

    #[test]
    fn parse_unknown_cmd() {
        let env = parse_command(br#"{"type":"cmd","cmd":"SELF_DESTRUCT","req_id":"x"}"#).unwrap();
        assert_eq!(env.command, Err(CommandError::UnknownCmd));
        assert_eq!(env.cmd.as_str(), "SELF_DESTRUCT");
    }

    #[test]
    fn long_req_id_is_truncated() {
        let id = "a".repeat(100);
        let line = format!(r#"{{"type":"cmd","cmd":"TEST_BEEP","req_id":"{id}"}}"#);
        let env = parse_command(line.as_bytes()).unwrap();
        assert_eq!(env.req_id.len(), crate::config::MAX_REQ_ID_LEN);
    }

    #[test]
    fn req_id_escapes_are_decoded() {
        let env = parse_command(br#"{"type":"cmd","cmd":"TEST_BEEP","req_id":"a\"b\\c\u0041"}"#).unwrap();
        assert_eq!(env.req_id.as_str(), r#"a"b\cA"#);
        let env = parse_command(br#"{"type":"cmd","cmd":"FPV_SET_BAND_PROFILE","band":"5.8G\n"}"#).unwrap();
        assert!(matches!(env.command, Ok(HostCommand::SetBandProfile { ref band }) if band.as_str() == "5.8G\n"));
    }

    #[test]
    fn malformed_escape_ends_value() {
        assert_eq!(unescaped::<8>(r"ab\x").as_str(), "ab");
        assert_eq!(unescaped::<8>(r"ab\u12").as_str(), "ab");
        assert_eq!(unescaped::<8>(r"ab\ud800").as_str(), "ab");
    }

    #[test]
    fn serialize_appends_newline() {
        let msg = DeviceMessage::Event {
            proto: 1,
            esp_ms: 0,
            ts_ms: 0,
            event: "X",
            value: 0,
        };
        let mut buf = [0u8; 256];
        let len = serialize_message(&msg, &mut buf).unwrap();
        assert_eq!(buf[len - 1], b'\n');
        assert_eq!(buf[0], b'{');
    }

    #[test]
    fn serialize_without_room_for_newline_fails() {
        let msg = DeviceMessage::Event {
            proto: 1,
            esp_ms: 0,
            ts_ms: 0,
            event: "X",
            value: 0,
        };
        let mut big = [0u8; 256];
        let exact = serde_json_core::to_slice(&msg, &mut big).unwrap();
        let mut buf = vec![0u8; exact];
        assert_eq!(serialize_message(&msg, &mut buf), None);
    }

    #[test]
    fn send_pushes_one_line() {
        let mut sink: Vec<String> = Vec::new();
        let msg = DeviceMessage::Event {
            proto: 1,
            esp_ms: 3,
            ts_ms: 3,
            event: "MUTE_SET",
            value: 1,
        };
        assert!(send(&mut sink, &msg));
        assert_eq!(sink.len(), 1);
        assert!(sink[0].contains(r#""event":"MUTE_SET""#));
        assert!(!sink[0].ends_with('\n'));
    }
}
