//! MHS-5200 codec
//!
//! Command grammar: `:rNx` reads and `:sNx…` writes, newline terminated,
//! where `N` is a channel digit or a fixed register address and `x` the
//! operation letter. Replies echo the command prefix before the value.
//!
//! Scaling quirks observed on hardware and kept as-is: amplitude rides the
//! wire as volts x100, frequency as Hz x100 in 8 digits, offset biased by
//! +120, and duty cycle is encoded as percent x10 but decoded as /10 of a
//! 3-digit field. The channel-enable register is shared: `:r1b` answers
//! with the number of the enabled channel and `:s2b1`/`:s2b2` flips it.

use std::thread;
use std::time::Duration;

use crate::protocol::{DeviceSession, FlowControl, Parity, PortSettings, StatusSink};

use super::types::{
    IdName, MeasureMode, SweepDirection, SweepObject, SweepSource, TransferProgress, WaveType,
};
use super::{DeviceKind, FuncGen};

/// Highest settable frequency, 25 MHz
pub const MAX_FREQ: f64 = 25_000_000.0;

const SLICE_COUNT: usize = 16;
const SAMPLES_PER_SLICE: usize = 128;
const ARB_READ_SLICE_DELAY: Duration = Duration::from_millis(100);
const ARB_WRITE_SLICE_DELAY: Duration = Duration::from_millis(200);

/// Strip the `:rNx` echo and return the value text after the operation
/// letter `cmd`
fn reply_value<'a>(reply: &'a str, cmd: char) -> Option<&'a str> {
    let rest = reply.trim().strip_prefix(":r")?;
    let mut chars = rest.char_indices();
    let _addr = chars.next()?;
    let (i, c) = chars.next()?;
    if c != cmd {
        return None;
    }
    Some(rest[i + c.len_utf8()..].trim())
}

/// Some registers answer with the value in the address position
/// (`:r2g` means gate 2); extract that digit
fn reply_digit(reply: &str, cmd: char) -> Option<i32> {
    let rest = reply.trim().strip_prefix(":r")?;
    let mut chars = rest.chars();
    let digit = chars.next()?.to_digit(10)?;
    if chars.next()? != cmd {
        return None;
    }
    Some(digit as i32)
}

/// Drop the `:bNS` echo in front of an arbitrary-data slice
fn strip_arb_echo(reply: &str) -> &str {
    let t = reply.trim();
    if let Some(rest) = t.strip_prefix(":b") {
        let mut chars = rest.char_indices();
        if let (Some((_, a)), Some((i, b))) = (chars.next(), chars.next()) {
            if a.is_ascii_hexdigit() && b.is_ascii_hexdigit() {
                return &rest[i + b.len_utf8()..];
            }
        }
    }
    t
}

/// MHS-5200 series function generator
pub struct Mhs5200 {
    session: DeviceSession,
}

impl Mhs5200 {
    /// Create the codec with an injected status sink
    pub fn new(status: StatusSink) -> Self {
        Self {
            session: DeviceSession::new(DeviceKind::Mhs5200.name(), Self::port_settings(), status),
        }
    }

    fn port_settings() -> PortSettings {
        PortSettings {
            default_port_name: "ttyUSB0".to_string(),
            baud_rate: 57600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow_control: FlowControl::RTS | FlowControl::CTS,
        }
    }

    /// Direct access to the session (port enumeration, observers)
    pub fn session_mut(&mut self) -> &mut DeviceSession {
        &mut self.session
    }

    /// Whether the frequency measurement is running
    pub fn get_measure_run_state(&mut self) -> i32 {
        self.session
            .request_reply(":r6b\n")
            .and_then(|r| reply_value(&r, 'b').and_then(|v| v.parse().ok()))
            .unwrap_or(0)
    }

    /// Counter-reset register
    pub fn get_reset_counter(&mut self) -> i32 {
        self.session
            .request_reply(":r5b\n")
            .and_then(|r| reply_value(&r, 'b').and_then(|v| v.parse().ok()))
            .unwrap_or(0)
    }

    /// Whether a sweep is running
    pub fn get_sweep_state(&mut self) -> bool {
        self.session
            .request_reply(":r8b\n")
            .and_then(|r| reply_value(&r, 'b').and_then(|v| v.parse::<i32>().ok()))
            .unwrap_or(0)
            != 0
    }

    fn reply_f64(&mut self, request: &str, cmd: char, scale: f64, default: f64) -> f64 {
        self.session
            .request_reply(request)
            .and_then(|r| reply_value(&r, cmd).and_then(|v| v.parse::<f64>().ok()))
            .map(|v| v / scale)
            .unwrap_or(default)
    }

    fn reply_i32(&mut self, request: &str, cmd: char, default: i32) -> i32 {
        self.session
            .request_reply(request)
            .and_then(|r| reply_value(&r, cmd).and_then(|v| v.parse().ok()))
            .unwrap_or(default)
    }
}

impl FuncGen for Mhs5200 {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Mhs5200
    }

    fn session_mut(&mut self) -> Option<&mut DeviceSession> {
        Some(&mut self.session)
    }

    fn default_port_name(&self) -> String {
        self.session.default_port_name().to_string()
    }

    fn set_port(&mut self, name: &str) {
        let _ = self.session.set_port(name);
    }

    fn connect(&mut self) {
        let _ = self.session.connect();
    }

    fn disconnect(&mut self) {
        self.session.disconnect();
    }

    fn is_online(&self) -> bool {
        self.session.is_online()
    }

    fn wave_types(&self, _channel: u8) -> Vec<WaveType> {
        let mut list = vec![
            WaveType::new(0, "Sine"),
            WaveType::new(1, "Square"),
            WaveType::new(2, "Triangle"),
            WaveType::new(3, "Sawtooth Rise"),
            WaveType::new(4, "Sawtooth Fall"),
        ];
        for n in 0..16 {
            list.push(WaveType::new(100 + n, format!("Arbitrary {n}")));
        }
        list
    }

    fn get_waveform(&mut self, channel: u8) -> i32 {
        self.reply_i32(&format!(":r{channel}w\n"), 'w', 0)
    }

    fn set_waveform(&mut self, channel: u8, waveform: &WaveType) {
        self.session
            .write_text(&format!(":s{channel}w{:03}\n", waveform.id));
    }

    fn get_frequency(&mut self, channel: u8) -> f64 {
        self.reply_f64(&format!(":r{channel}f\n"), 'f', 100.0, 0.0)
    }

    fn set_frequency(&mut self, channel: u8, frequency: f64) {
        if frequency > 0.0 && frequency <= MAX_FREQ {
            self.session
                .write_text(&format!(":s{channel}f{:08}\n", (frequency * 100.0) as u64));
        }
    }

    fn max_frequency(&self) -> f64 {
        MAX_FREQ
    }

    fn get_amplitude(&mut self, channel: u8) -> f64 {
        self.reply_f64(&format!(":r{channel}a\n"), 'a', 100.0, 0.0)
    }

    fn set_amplitude(&mut self, channel: u8, amplitude: f64) {
        let value = ((amplitude * 100.0) as i32).clamp(0, 2000);
        self.session.write_text(&format!(":s{channel}a{value}\n"));
    }

    fn get_duty_cycle(&mut self, channel: u8) -> f64 {
        self.reply_f64(&format!(":r{channel}d\n"), 'd', 10.0, 50.0)
    }

    fn set_duty_cycle(&mut self, channel: u8, duty: f64) {
        let value = ((duty * 10.0) as i32).clamp(0, 999);
        self.session.write_text(&format!(":s{channel}d{value:03}\n"));
    }

    fn get_offset(&mut self, channel: u8) -> i32 {
        self.reply_i32(&format!(":r{channel}o\n"), 'o', 120) - 120
    }

    fn set_offset(&mut self, channel: u8, offset: i32) {
        let value = (offset + 120).clamp(0, 240);
        self.session.write_text(&format!(":s{channel}o{value:03}\n"));
    }

    fn get_phase(&mut self, channel: u8) -> i32 {
        self.reply_i32(&format!(":r{channel}p\n"), 'p', 0)
    }

    fn set_phase(&mut self, channel: u8, phase: i32) {
        self.session
            .write_text(&format!(":s{channel}p{}\n", (phase % 360).abs()));
    }

    fn get_attenuation(&mut self, channel: u8) -> i32 {
        self.reply_i32(&format!(":r{channel}y\n"), 'y', 0)
    }

    fn set_attenuation(&mut self, channel: u8, atten: i32) {
        self.session.write_text(&format!(":s{channel}y{atten}\n"));
    }

    fn get_invert(&mut self, channel: u8) -> bool {
        let letter = if channel & 1 == 0 { 'a' } else { 'b' };
        self.reply_i32(&format!(":r{letter}b\n"), 'b', 0) != 0
    }

    fn set_invert(&mut self, channel: u8, enable: bool) {
        let letter = if channel & 1 == 0 { 'a' } else { 'b' };
        self.session
            .write_text(&format!(":s{letter}b{}\n", i32::from(enable)));
    }

    fn get_enable_channel(&mut self, channel: u8) -> bool {
        self.reply_i32(&format!(":r{channel}b\n"), 'b', 0) == i32::from(channel)
    }

    fn set_enable_channel(&mut self, channel: u8, enabled: bool) {
        // One shared register: writing 1 enables channel 1, 2 enables
        // channel 2
        if (channel == 1 && enabled) || (channel == 2 && !enabled) {
            self.session.write_text(":s2b1\n");
        } else {
            self.session.write_text(":s2b2\n");
        }
    }

    fn get_enable_output(&mut self) -> bool {
        self.reply_i32(":r1b\n", 'b', 0) != 0
    }

    fn set_enable_output(&mut self, enable: bool) {
        self.session
            .write_text(&format!(":s1b{}\n", i32::from(enable)));
    }

    fn get_power_out(&mut self) -> bool {
        self.reply_i32(":r9b\n", 'b', 0) != 0
    }

    fn set_power_out(&mut self, enable: bool) {
        self.session
            .write_text(&format!(":s9b{}\n", i32::from(enable)));
    }

    fn get_trace(&mut self) -> i32 {
        self.reply_i32(":r3b\n", 'b', 0)
    }

    fn set_trace(&mut self, enable: bool) {
        self.session
            .write_text(&format!(":s3b{}\n", i32::from(enable)));
    }

    fn get_ext_ttl(&mut self) -> i32 {
        self.reply_i32(":r4b\n", 'b', 0)
    }

    fn set_ext_ttl(&mut self, use_ttl: bool) {
        // Register is inverted: 0 selects TTL
        self.session
            .write_text(&format!(":s4b{}\n", i32::from(!use_ttl)));
    }

    fn get_measure_mode(&mut self) -> MeasureMode {
        self.session
            .request_reply(":r1m\n")
            .and_then(|r| reply_digit(&r, 'm'))
            .and_then(MeasureMode::from_id)
            .unwrap_or(MeasureMode::Counter)
    }

    fn set_measure_mode(&mut self, mode: MeasureMode) {
        self.session.write_text(&format!(":s{}m\n", mode.id()));
    }

    fn get_count(&mut self) -> i32 {
        self.reply_i32(":r0e\n", 'e', 0)
    }

    fn gate_values(&self) -> Vec<IdName> {
        vec![
            IdName::new(0, "1 s"),
            IdName::new(1, "10 s"),
            IdName::new(2, "0.01 s"),
            IdName::new(3, "0.1 s"),
        ]
    }

    fn get_gate_value(&mut self) -> i32 {
        self.session
            .request_reply(":r1g\n")
            .and_then(|r| reply_digit(&r, 'g'))
            .unwrap_or(0)
    }

    fn set_gate_value(&mut self, value: i32) {
        self.session.write_text(&format!(":s{value}g\n"));
    }

    fn set_reset_counter(&mut self, num: i32) {
        self.session.write_text(&format!(":s5b{num}\n"));
    }

    fn set_measure_run_state(&mut self, num: i32) {
        self.session.write_text(&format!(":s6b{num}\n"));
    }

    fn get_sweep_start(&mut self) -> f64 {
        self.reply_f64(":r3f\n", 'f', 100.0, 0.0)
    }

    fn set_sweep_start(&mut self, frequency: f64) {
        if frequency > 0.0 && frequency <= MAX_FREQ {
            self.session
                .write_text(&format!(":s3f{:08}\n", (frequency * 100.0) as u64));
        }
    }

    fn get_sweep_end(&mut self) -> f64 {
        self.reply_f64(":r4f\n", 'f', 100.0, 0.0)
    }

    fn set_sweep_end(&mut self, frequency: f64) {
        if frequency > 0.0 && frequency <= MAX_FREQ {
            self.session
                .write_text(&format!(":s4f{:08}\n", (frequency * 100.0) as u64));
        }
    }

    fn get_sweep_time(&mut self) -> f64 {
        self.reply_f64(":r5t\n", 't', 100.0, 0.0)
    }

    fn set_sweep_time(&mut self, seconds: f64) {
        self.session
            .write_text(&format!(":s5t{}\n", (seconds as i64).max(0)));
    }

    fn get_sweep_lin_log(&mut self) -> i32 {
        self.reply_i32(":r7b\n", 'b', 0)
    }

    fn set_sweep_lin_log(&mut self, lin_log: i32) {
        self.session.write_text(&format!(":s7b{}\n", lin_log & 1));
    }

    fn set_sweep_state(&mut self, run: bool) {
        self.session
            .write_text(&format!(":s8b{}\n", i32::from(run)));
    }

    fn set_sweep_object(&mut self, _object: SweepObject) {
        // Not addressable on this family
    }

    fn set_sweep_source(&mut self, _source: SweepSource) {
        // Not addressable on this family
    }

    fn set_sweep_direction(&mut self, _direction: SweepDirection) {
        // Not addressable on this family
    }

    fn load_settings(&mut self, slot: u8) {
        self.session.write_text(&format!(":s{:x}v\n", slot & 0xf));
    }

    fn save_settings(&mut self, slot: u8) {
        self.session.write_text(&format!(":s{:x}u\n", slot & 0xf));
    }

    fn arb_size(&self) -> usize {
        SLICE_COUNT * SAMPLES_PER_SLICE
    }

    fn arb_min(&self) -> i32 {
        0
    }

    fn arb_max(&self) -> i32 {
        4096
    }

    fn arb_offset(&self) -> i32 {
        2048
    }

    fn get_arb_data(&mut self, num: u8, progress: &mut dyn TransferProgress) -> Vec<i32> {
        // 12-bit samples in 16 slices of 128; unparseable entries read
        // back as 0
        let mut data = vec![0i32; SLICE_COUNT * SAMPLES_PER_SLICE];
        for slice in 0..SLICE_COUNT {
            if progress.cancelled() {
                break;
            }
            let reply = self
                .session
                .request_reply(&format!(":b{:x}{:x}\n", num & 0xf, slice));
            let body = reply.as_deref().map(strip_arb_echo).unwrap_or("");
            let mut values = body.split(',').map(|v| v.trim().parse::<i32>().unwrap_or(0));
            for i in 0..SAMPLES_PER_SLICE {
                data[slice * SAMPLES_PER_SLICE + i] = values.next().unwrap_or(0);
            }
            progress.progress(slice * SAMPLES_PER_SLICE);
            thread::sleep(ARB_READ_SLICE_DELAY);
        }
        data
    }

    fn set_arb_data(&mut self, num: u8, data: &[i32], progress: &mut dyn TransferProgress) {
        let mut buf = String::new();
        for slice in 0..SLICE_COUNT {
            if progress.cancelled() {
                break;
            }
            buf.clear();
            buf.push_str(&format!(":a{:x}{:x}", num & 0xf, slice));
            for i in 0..SAMPLES_PER_SLICE {
                if i > 0 {
                    buf.push(',');
                }
                let x = slice * SAMPLES_PER_SLICE + i;
                buf.push_str(&data.get(x).copied().unwrap_or(0).to_string());
            }
            buf.push('\n');
            self.session.write_text(&buf);
            thread::sleep(ARB_WRITE_SLICE_DELAY);
            progress.progress(slice * SAMPLES_PER_SLICE);
        }
    }

    fn get_model(&mut self) -> String {
        self.session
            .request_reply(":r0c\n")
            .map(|r| reply_value(&r, 'c').unwrap_or(r.trim()).to_string())
            .unwrap_or_default()
    }

    fn get_product(&mut self) -> String {
        self.session
            .request_reply(":r1c\n")
            .map(|r| reply_value(&r, 'c').unwrap_or(r.trim()).to_string())
            .unwrap_or_default()
    }

    fn get_firmware(&mut self) -> String {
        self.session
            .request_reply(":r2c\n")
            .map(|r| reply_value(&r, 'c').unwrap_or(r.trim()).to_string())
            .unwrap_or_default()
    }
}
