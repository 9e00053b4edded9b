//! Inert codec used before a device family is selected

use crate::protocol::{DeviceSession, Status, StatusSink};

use super::types::{
    IdName, MeasureMode, SweepDirection, SweepObject, SweepSource, TransferProgress, WaveType,
};
use super::{DeviceKind, FuncGen};

/// Stand-in that never opens a port and answers every query with a
/// harmless default
pub struct NullDevice {
    status: StatusSink,
}

impl NullDevice {
    /// Create the stand-in with an injected status sink
    pub fn new(status: StatusSink) -> Self {
        Self { status }
    }
}

impl FuncGen for NullDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::None
    }

    fn session_mut(&mut self) -> Option<&mut DeviceSession> {
        None
    }

    fn default_port_name(&self) -> String {
        String::new()
    }

    fn set_port(&mut self, _name: &str) {
        (self.status)(Status::Offline, "");
    }

    fn connect(&mut self) {
        (self.status)(Status::Offline, "");
    }

    fn disconnect(&mut self) {
        (self.status)(Status::Offline, "");
    }

    fn is_online(&self) -> bool {
        false
    }

    fn wave_types(&self, _channel: u8) -> Vec<WaveType> {
        Vec::new()
    }

    fn get_waveform(&mut self, _channel: u8) -> i32 {
        0
    }

    fn set_waveform(&mut self, _channel: u8, _waveform: &WaveType) {}

    fn get_frequency(&mut self, _channel: u8) -> f64 {
        0.0
    }

    fn set_frequency(&mut self, _channel: u8, _frequency: f64) {}

    fn max_frequency(&self) -> f64 {
        0.0
    }

    fn get_amplitude(&mut self, _channel: u8) -> f64 {
        0.0
    }

    fn set_amplitude(&mut self, _channel: u8, _amplitude: f64) {}

    fn get_duty_cycle(&mut self, _channel: u8) -> f64 {
        50.0
    }

    fn set_duty_cycle(&mut self, _channel: u8, _duty: f64) {}

    fn get_offset(&mut self, _channel: u8) -> i32 {
        0
    }

    fn set_offset(&mut self, _channel: u8, _offset: i32) {}

    fn get_phase(&mut self, _channel: u8) -> i32 {
        0
    }

    fn set_phase(&mut self, _channel: u8, _phase: i32) {}

    fn get_attenuation(&mut self, _channel: u8) -> i32 {
        0
    }

    fn set_attenuation(&mut self, _channel: u8, _atten: i32) {}

    fn get_invert(&mut self, _channel: u8) -> bool {
        false
    }

    fn set_invert(&mut self, _channel: u8, _enable: bool) {}

    fn get_enable_channel(&mut self, _channel: u8) -> bool {
        false
    }

    fn set_enable_channel(&mut self, _channel: u8, _enabled: bool) {}

    fn get_enable_output(&mut self) -> bool {
        false
    }

    fn set_enable_output(&mut self, _enable: bool) {}

    fn get_power_out(&mut self) -> bool {
        false
    }

    fn set_power_out(&mut self, _enable: bool) {}

    fn get_trace(&mut self) -> i32 {
        0
    }

    fn set_trace(&mut self, _enable: bool) {}

    fn get_ext_ttl(&mut self) -> i32 {
        0
    }

    fn set_ext_ttl(&mut self, _use_ttl: bool) {}

    fn get_measure_mode(&mut self) -> MeasureMode {
        MeasureMode::Frequency
    }

    fn set_measure_mode(&mut self, _mode: MeasureMode) {}

    fn get_count(&mut self) -> i32 {
        0
    }

    fn gate_values(&self) -> Vec<IdName> {
        Vec::new()
    }

    fn get_gate_value(&mut self) -> i32 {
        0
    }

    fn set_gate_value(&mut self, _value: i32) {}

    fn set_reset_counter(&mut self, _num: i32) {}

    fn set_measure_run_state(&mut self, _num: i32) {}

    fn get_sweep_start(&mut self) -> f64 {
        0.0
    }

    fn set_sweep_start(&mut self, _frequency: f64) {}

    fn get_sweep_end(&mut self) -> f64 {
        0.0
    }

    fn set_sweep_end(&mut self, _frequency: f64) {}

    fn get_sweep_time(&mut self) -> f64 {
        0.0
    }

    fn set_sweep_time(&mut self, _seconds: f64) {}

    fn get_sweep_lin_log(&mut self) -> i32 {
        0
    }

    fn set_sweep_lin_log(&mut self, _lin_log: i32) {}

    fn set_sweep_state(&mut self, _run: bool) {}

    fn set_sweep_object(&mut self, _object: SweepObject) {}

    fn set_sweep_source(&mut self, _source: SweepSource) {}

    fn set_sweep_direction(&mut self, _direction: SweepDirection) {}

    fn load_settings(&mut self, _slot: u8) {}

    fn save_settings(&mut self, _slot: u8) {}

    fn arb_size(&self) -> usize {
        0
    }

    fn arb_min(&self) -> i32 {
        0
    }

    fn arb_max(&self) -> i32 {
        0
    }

    fn arb_offset(&self) -> i32 {
        0
    }

    fn get_arb_data(&mut self, _num: u8, _progress: &mut dyn TransferProgress) -> Vec<i32> {
        Vec::new()
    }

    fn set_arb_data(&mut self, _num: u8, _data: &[i32], _progress: &mut dyn TransferProgress) {}

    fn get_model(&mut self) -> String {
        String::new()
    }

    fn get_product(&mut self) -> String {
        String::new()
    }

    fn get_firmware(&mut self) -> String {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testutil::recording_sink;
    use crate::protocol::Status;
    use pretty_assertions::assert_eq;

    #[test]
    fn all_queries_answer_defaults() {
        let (sink, _) = recording_sink();
        let mut dev = NullDevice::new(sink);
        assert_eq!(dev.get_amplitude(1), 0.0);
        assert_eq!(dev.get_duty_cycle(1), 50.0);
        assert_eq!(dev.get_measure_mode(), MeasureMode::Frequency);
        assert!(dev.wave_types(1).is_empty());
        assert!(dev.gate_values().is_empty());
        assert_eq!(dev.get_model(), "");
        assert!(!dev.is_online());
        assert!(dev.session_mut().is_none());
    }

    #[test]
    fn lifecycle_reports_offline_without_a_port() {
        let (sink, events) = recording_sink();
        let mut dev = NullDevice::new(sink);
        dev.connect();
        dev.disconnect();
        let log = events.lock();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|(s, _)| *s == Status::Offline));
    }
}
