//! FY-6900 codec
//!
//! Command grammar: `R??` reads and `W??` writes with `M` (main) or `F`
//! (second) channel letters, newline terminated. Replies carry the bare
//! value, no echo prefix. Which channel letter maps to which channel
//! number is not uniform across registers; each method keeps the mapping
//! verified against hardware.
//!
//! Amplitude reads back scaled by 10000; frequency is written as raw Hz
//! in 8 digits. The arbitrary-waveform upload is the one acknowledged
//! exchange: `DDS_WAVEn` must answer `W` before the packed payload is
//! sent with line-terminated assembly turned off.

use crate::protocol::{DeviceSession, FlowControl, Parity, PortSettings, Status, StatusSink};

use super::types::{
    IdName, MeasureMode, SweepDirection, SweepObject, SweepSource, TransferProgress, WaveType,
};
use super::{DeviceKind, FuncGen};

/// Highest settable frequency, 100 MHz
pub const MAX_FREQ: f64 = 100_000_000.0;

const ARB_SIZE: usize = 8192;
const ARB_MIN: i32 = 0;
const ARB_MAX: i32 = 8191;

/// FY-6900 series function generator
pub struct Fy6900 {
    session: DeviceSession,
}

impl Fy6900 {
    /// Create the codec with an injected status sink
    pub fn new(status: StatusSink) -> Self {
        Self {
            session: DeviceSession::new(DeviceKind::Fy6900.name(), Self::port_settings(), status),
        }
    }

    fn port_settings() -> PortSettings {
        PortSettings {
            default_port_name: "ttyUSB0".to_string(),
            baud_rate: 115200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow_control: FlowControl::DISABLED,
        }
    }

    /// Direct access to the session (port enumeration, observers)
    pub fn session_mut(&mut self) -> &mut DeviceSession {
        &mut self.session
    }
}

impl FuncGen for Fy6900 {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Fy6900
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

    fn wave_types(&self, channel: u8) -> Vec<WaveType> {
        let mut names = vec![
            "Sine",
            "Square",
            "Retangle",
            "Trapezoid",
            "CMOS",
        ];
        if channel & 1 == 1 {
            // Not available on the second channel
            names.push("Adj-Pulse");
        }
        names.extend([
            "DC",
            "TRGL",
            "Ramp",
            "NegRamp",
            "Stair-TRGL",
            "StairStep",
            "NegStair",
            "PosExponent",
            "NegExponent",
            "P-Fall-Exp",
            "N-Fall-Exp",
            "PosLogaritm",
            "NegLogaritm",
            "P-Fall-Log",
            "N-Fall-Log",
            "P-Full-Wave",
            "N-Full-Wave",
            "P-Half-Wave",
            "N-Half-Wave",
            "Lorentz-Pulse",
            "Multitone",
            "Random-Noise",
            "ECG",
            "Trapezoid",
            "Sinc-Pulse",
            "Impulse",
            "AWGN",
            "AM",
            "FM",
            "Chirp",
        ]);
        let mut list: Vec<WaveType> = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| WaveType::new(i as u16, name))
            .collect();
        let base = list.len() as u16;
        for n in 1..=64u16 {
            list.push(WaveType::new(base + n - 1, format!("Arbitrary {n}")));
        }
        list
    }

    fn get_waveform(&mut self, channel: u8) -> i32 {
        let cmd = if channel & 1 == 0 { "RFW\n" } else { "RMW\n" };
        self.session.request_reply_int(cmd, 0)
    }

    fn set_waveform(&mut self, channel: u8, waveform: &WaveType) {
        let prefix = if channel & 1 == 0 { "WFW" } else { "WMW" };
        self.session
            .write_text(&format!("{prefix}{}\n", waveform.id));
    }

    fn get_frequency(&mut self, channel: u8) -> f64 {
        let cmd = if channel & 1 == 0 { "RFF\n" } else { "RMF\n" };
        self.session.request_reply_f64(cmd, 0.0)
    }

    fn set_frequency(&mut self, channel: u8, frequency: f64) {
        if frequency >= 0.0 && frequency <= MAX_FREQ {
            let prefix = if channel & 1 == 0 { "WFF" } else { "WMF" };
            self.session
                .write_text(&format!("{prefix}{:08}\n", frequency as u64));
        }
    }

    fn max_frequency(&self) -> f64 {
        MAX_FREQ
    }

    fn get_amplitude(&mut self, channel: u8) -> f64 {
        let cmd = if channel & 1 == 0 { "RMA\n" } else { "RFA\n" };
        self.session.request_reply_f64(cmd, 0.0) / 10000.0
    }

    fn set_amplitude(&mut self, channel: u8, amplitude: f64) {
        let prefix = if channel & 1 == 0 { "WFA" } else { "WMA" };
        self.session
            .write_text(&format!("{prefix}{amplitude:.6}\n"));
    }

    fn get_duty_cycle(&mut self, channel: u8) -> f64 {
        let cmd = if channel & 1 == 0 { "RMD\n" } else { "RFD\n" };
        self.session.request_reply_f64(cmd, 50.0)
    }

    fn set_duty_cycle(&mut self, channel: u8, duty: f64) {
        let prefix = if channel & 1 == 0 { "WFD" } else { "WMD" };
        self.session.write_text(&format!("{prefix}{duty:.6}\n"));
    }

    fn get_offset(&mut self, channel: u8) -> i32 {
        let cmd = if channel & 1 == 0 { "RFO\n" } else { "RMO\n" };
        self.session.request_reply_int(cmd, 0)
    }

    fn set_offset(&mut self, channel: u8, offset: i32) {
        let prefix = if channel & 1 == 0 { "WFO" } else { "WMO" };
        self.session.write_text(&format!("{prefix}{offset:08}\n"));
    }

    fn get_phase(&mut self, _channel: u8) -> i32 {
        0
    }

    fn set_phase(&mut self, channel: u8, phase: i32) {
        let prefix = if channel & 1 == 0 { "WFP" } else { "WMP" };
        self.session.write_text(&format!("{prefix}{phase}\n"));
    }

    fn get_attenuation(&mut self, _channel: u8) -> i32 {
        0
    }

    fn set_attenuation(&mut self, _channel: u8, _atten: i32) {
        // No attenuation register on this family
    }

    fn get_invert(&mut self, _channel: u8) -> bool {
        false
    }

    fn set_invert(&mut self, _channel: u8, _enable: bool) {
        // No invert register on this family
    }

    fn get_enable_channel(&mut self, _channel: u8) -> bool {
        true
    }

    fn set_enable_channel(&mut self, channel: u8, enabled: bool) {
        let prefix = if channel & 1 == 0 { "WFN" } else { "WMN" };
        self.session
            .write_text(&format!("{prefix}{}\n", i32::from(enabled)));
    }

    fn get_enable_output(&mut self) -> bool {
        false
    }

    fn set_enable_output(&mut self, _enable: bool) {
        // No separate output-enable register
    }

    fn get_power_out(&mut self) -> bool {
        false
    }

    fn set_power_out(&mut self, _enable: bool) {
        // No power-out register on this family
    }

    fn get_trace(&mut self) -> i32 {
        0
    }

    fn set_trace(&mut self, _enable: bool) {
        // No trace register on this family
    }

    fn get_ext_ttl(&mut self) -> i32 {
        0
    }

    fn set_ext_ttl(&mut self, _use_ttl: bool) {
        // No TTL/EXT register on this family
    }

    fn get_measure_mode(&mut self) -> MeasureMode {
        MeasureMode::Frequency
    }

    fn set_measure_mode(&mut self, _mode: MeasureMode) {
        // Measure mode is fixed on this family
    }

    fn get_count(&mut self) -> i32 {
        self.session.request_reply_int("RCC\n", 0)
    }

    fn gate_values(&self) -> Vec<IdName> {
        vec![
            IdName::new(0, "1 s"),
            IdName::new(1, "10 s"),
            IdName::new(2, "100 s"),
        ]
    }

    fn get_gate_value(&mut self) -> i32 {
        self.session.request_reply_int("RCG\n", 0)
    }

    fn set_gate_value(&mut self, value: i32) {
        self.session.write_text(&format!("WCG{value}\n"));
    }

    fn set_reset_counter(&mut self, _num: i32) {
        self.session.write_text("WCZ0\n");
    }

    fn set_measure_run_state(&mut self, num: i32) {
        self.session.write_text(&format!("WCP{num}\n"));
    }

    fn get_sweep_start(&mut self) -> f64 {
        0.0
    }

    fn set_sweep_start(&mut self, frequency: f64) {
        if frequency > 0.0 && frequency <= MAX_FREQ {
            self.session.write_text(&format!("SST{frequency:.6}\n"));
        }
    }

    fn get_sweep_end(&mut self) -> f64 {
        0.0
    }

    fn set_sweep_end(&mut self, frequency: f64) {
        if frequency > 0.0 && frequency <= MAX_FREQ {
            self.session.write_text(&format!("SEN{frequency:.6}\n"));
        }
    }

    fn get_sweep_time(&mut self) -> f64 {
        0.0
    }

    fn set_sweep_time(&mut self, seconds: f64) {
        self.session.write_text(&format!("STI{seconds:.6}\n"));
    }

    fn get_sweep_lin_log(&mut self) -> i32 {
        0
    }

    fn set_sweep_lin_log(&mut self, lin_log: i32) {
        self.session.write_text(&format!("SMO{}\n", lin_log & 1));
    }

    fn set_sweep_state(&mut self, run: bool) {
        self.session
            .write_text(&format!("SBE{}\n", i32::from(run)));
    }

    fn set_sweep_object(&mut self, object: SweepObject) {
        self.session.write_text(&format!("SOB{}\n", object.id()));
    }

    fn set_sweep_source(&mut self, source: SweepSource) {
        self.session.write_text(&format!("SXY{}\n", source.id()));
    }

    fn set_sweep_direction(&mut self, _direction: SweepDirection) {
        // No direction register on this family
    }

    fn load_settings(&mut self, slot: u8) {
        self.session.write_text(&format!("ULN{slot}\n"));
    }

    fn save_settings(&mut self, slot: u8) {
        self.session.write_text(&format!("USN{slot}\n"));
    }

    fn arb_size(&self) -> usize {
        ARB_SIZE
    }

    fn arb_min(&self) -> i32 {
        ARB_MIN
    }

    fn arb_max(&self) -> i32 {
        ARB_MAX
    }

    fn arb_offset(&self) -> i32 {
        2048
    }

    fn get_arb_data(&mut self, _num: u8, _progress: &mut dyn TransferProgress) -> Vec<i32> {
        // Readback is not part of the wire protocol
        Vec::new()
    }

    fn set_arb_data(&mut self, num: u8, data: &[i32], progress: &mut dyn TransferProgress) {
        let res1 = self.session.request_reply(&format!("DDS_WAVE{}\n", num as u32 + 1));
        if res1.as_deref() != Some("W") {
            self.session.emit_status(
                Status::Online,
                &format!("data write refused: {}", res1.unwrap_or_default()),
            );
            return;
        }
        self.session.emit_status(Status::Online, "ok to write data");

        // 14-bit samples, low 7 bits first
        let mut payload = Vec::with_capacity(data.len() * 2);
        for &v in data {
            let d = v.clamp(ARB_MIN, ARB_MAX);
            payload.push((d & 0x7f) as u8);
            payload.push(((d >> 7) & 0xff) as u8);
        }

        // Acknowledgement bytes are not line-delimited; the guard restores
        // line assembly on every exit path
        let _guard = self.session.binary_mode_guard();
        let res2 = self.session.request_reply_bytes(&payload);
        match res2.as_deref() {
            Some("H") => {
                self.session.emit_status(Status::Online, "data acknowledged");
                // Second reply arrives when the device finishes storing
                let res3 = self.session.poll();
                if res3.as_deref() == Some("N") {
                    self.session.emit_status(Status::Online, "data stored");
                } else {
                    self.session.emit_status(
                        Status::Online,
                        &format!("data store failed: {}", res3.unwrap_or_default()),
                    );
                }
            }
            Some("N") => {
                self.session.emit_status(Status::Online, "data stored");
            }
            Some("HN") => {
                self.session
                    .emit_status(Status::Online, "data received and stored");
            }
            other => {
                self.session.emit_status(
                    Status::Online,
                    &format!("data write failed: {}", other.unwrap_or_default()),
                );
            }
        }
        progress.progress(data.len());
    }

    fn get_model(&mut self) -> String {
        self.session.request_reply("UMO\n").unwrap_or_default()
    }

    fn get_product(&mut self) -> String {
        self.session.request_reply("UID\n").unwrap_or_default()
    }

    fn get_firmware(&mut self) -> String {
        self.session.request_reply("UVE\n").unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testutil::recording_sink;
    use crate::device::types::NullProgress;
    use crate::protocol::mock::MockTransport;
    use pretty_assertions::assert_eq;

    fn wired() -> (Fy6900, MockTransport) {
        let (sink, _) = recording_sink();
        let mut dev = Fy6900::new(sink);
        let mock = MockTransport::new();
        dev.session_mut().attach_transport(Box::new(mock.clone()));
        (dev, mock)
    }

    #[test]
    fn amplitude_decodes_by_ten_thousand() {
        let (mut dev, mock) = wired();
        mock.script_reply(b"23.45\n");
        let amp = dev.get_amplitude(1);
        assert!((amp * 10000.0 - 23.45).abs() < 0.01);
        assert_eq!(mock.written_string(), "RFA\n");
    }

    #[test]
    fn waveform_uses_main_prefix_on_channel_one() {
        let (mut dev, mock) = wired();
        mock.script_reply(b"234\n");
        assert_eq!(dev.get_waveform(1), 234);
        assert_eq!(mock.written_string(), "RMW\n");
    }

    #[test]
    fn frequency_channel_letters_differ_from_amplitude() {
        let (mut dev, mock) = wired();
        mock.script_reply(b"880.0\n");
        assert_eq!(dev.get_frequency(1), 880.0);
        assert_eq!(mock.written_string(), "RMF\n");
        mock.clear_writes();
        mock.script_reply(b"440.0\n");
        assert_eq!(dev.get_frequency(2), 440.0);
        assert_eq!(mock.written_string(), "RFF\n");
    }

    #[test]
    fn set_frequency_writes_raw_hz() {
        let (mut dev, mock) = wired();
        dev.set_frequency(1, 880.0);
        assert_eq!(mock.written_string(), "WMF00000880\n");
        mock.clear_writes();
        dev.set_frequency(1, 200_000_000.0);
        assert_eq!(mock.writes().len(), 0);
    }

    #[test]
    fn identification_commands() {
        let (mut dev, mock) = wired();
        mock.script_reply(b"FY6900-60M\n");
        assert_eq!(dev.get_model(), "FY6900-60M");
        mock.script_reply(b"V1.4\n");
        assert_eq!(dev.get_firmware(), "V1.4");
        assert_eq!(mock.written_string(), "UMO\nUVE\n");
    }

    #[test]
    fn catalog_counts_vary_by_channel() {
        let (dev, _) = wired();
        let ch2 = dev.wave_types(2);
        let ch1 = dev.wave_types(1);
        assert_eq!(ch2.len(), 99);
        assert_eq!(ch1.len(), 100);
        assert_eq!(ch1[5], WaveType::new(5, "Adj-Pulse"));
        assert_eq!(ch2[5], WaveType::new(5, "DC"));
        assert_eq!(ch1[99], WaveType::new(99, "Arbitrary 64"));
        assert_eq!(dev.gate_values().len(), 3);
    }

    #[test]
    fn port_defaults() {
        let settings = Fy6900::port_settings();
        assert_eq!(settings.baud_rate, 115200);
        assert_eq!(settings.flow_control, FlowControl::DISABLED);
    }

    #[test]
    fn arb_write_packs_and_acknowledges() {
        let (mut dev, mock) = wired();
        mock.script_reply(b"W\n");
        mock.script_replies(&[b"H", b"N"]);
        let data = [0i32, 1, 127, 128, 8191, 9000];
        dev.set_arb_data(0, &data, &mut NullProgress);

        let writes = mock.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], b"DDS_WAVE1\n".to_vec());
        // low 7 bits then the remaining bits, over-range clamped
        assert_eq!(
            writes[1],
            vec![0, 0, 1, 0, 127, 0, 0, 1, 127, 63, 127, 63]
        );
        // Line-terminated assembly is restored after the exchange
        mock.script_reply(b"ULN done\n");
        assert_eq!(
            dev.session_mut().request_reply("UMO\n"),
            Some("ULN done".to_string())
        );
    }

    #[test]
    fn arb_write_refused_without_ack() {
        let (mut dev, mock) = wired();
        mock.script_reply(b"E\n");
        dev.set_arb_data(0, &[1, 2, 3], &mut NullProgress);
        assert_eq!(mock.writes().len(), 1);
    }

    #[test]
    fn arb_readback_is_unsupported() {
        let (mut dev, mock) = wired();
        assert!(dev.get_arb_data(0, &mut NullProgress).is_empty());
        assert_eq!(mock.writes().len(), 0);
    }
}
