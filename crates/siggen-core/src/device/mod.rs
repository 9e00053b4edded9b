//! Device capability contract and the per-family codecs
//!
//! [`FuncGen`] declares every operation an instrument codec supports. A
//! codec that cannot express an operation on its hardware answers with a
//! harmless default instead of failing the session. All getters re-query
//! the instrument and all setters re-transmit; there is no cached state.

mod fy6900;
mod mhs5200;
mod null;
pub mod types;

pub use fy6900::Fy6900;
pub use mhs5200::Mhs5200;
pub use null::NullDevice;
pub use types::{
    parse_freq, IdName, MeasureMode, NullProgress, SweepDirection, SweepObject, SweepSource,
    TransferProgress, WaveType,
};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::protocol::{DeviceSession, StatusSink};

/// Number of output channels on every supported instrument
pub const CHANNEL_COUNT: u8 = 2;

/// The instrument capability contract.
///
/// Operations take `&mut self` because each one is a serial transaction;
/// exclusive access makes one-transaction-at-a-time a compile-time
/// property of a single device value. Getters return defaults on timeout
/// or parse failure, setters are fire-and-forget unless the wire protocol
/// acknowledges.
pub trait FuncGen: Send {
    /// Which family this codec drives
    fn kind(&self) -> DeviceKind;

    /// The underlying session, absent on the inert stand-in
    fn session_mut(&mut self) -> Option<&mut DeviceSession>;

    /// Port name the family suggests before the operator picks one
    fn default_port_name(&self) -> String;

    /// Bind to a port and connect; outcome arrives on the status sink
    fn set_port(&mut self, name: &str);

    /// Open the bound port; outcome arrives on the status sink
    fn connect(&mut self);

    /// Close the port if open
    fn disconnect(&mut self);

    /// Whether the session is connected
    fn is_online(&self) -> bool;

    /// Waveform catalog for a channel
    fn wave_types(&self, channel: u8) -> Vec<WaveType>;

    /// Current waveform id on a channel
    fn get_waveform(&mut self, channel: u8) -> i32;

    /// Select a catalog waveform on a channel
    fn set_waveform(&mut self, channel: u8, waveform: &WaveType);

    /// Frequency in Hz
    fn get_frequency(&mut self, channel: u8) -> f64;

    /// Set frequency in Hz; out-of-range values are not transmitted
    fn set_frequency(&mut self, channel: u8, frequency: f64);

    /// Highest settable frequency in Hz
    fn max_frequency(&self) -> f64;

    /// Amplitude in volts
    fn get_amplitude(&mut self, channel: u8) -> f64;

    /// Set amplitude in volts
    fn set_amplitude(&mut self, channel: u8, amplitude: f64);

    /// Duty cycle in percent
    fn get_duty_cycle(&mut self, channel: u8) -> f64;

    /// Set duty cycle in percent
    fn set_duty_cycle(&mut self, channel: u8, duty: f64);

    /// DC offset in device units
    fn get_offset(&mut self, channel: u8) -> i32;

    /// Set DC offset in device units
    fn set_offset(&mut self, channel: u8, offset: i32);

    /// Phase in degrees
    fn get_phase(&mut self, channel: u8) -> i32;

    /// Set phase in degrees
    fn set_phase(&mut self, channel: u8, phase: i32);

    /// Attenuation step: 0 = 0 dB, 1 = -20 dB
    fn get_attenuation(&mut self, channel: u8) -> i32;

    /// Set attenuation step
    fn set_attenuation(&mut self, channel: u8, atten: i32);

    /// Whether a channel output is inverted
    fn get_invert(&mut self, channel: u8) -> bool;

    /// Invert a channel output
    fn set_invert(&mut self, channel: u8, enable: bool);

    /// Whether a channel is enabled
    fn get_enable_channel(&mut self, channel: u8) -> bool;

    /// Enable or disable a channel
    fn set_enable_channel(&mut self, channel: u8, enabled: bool);

    /// Whether the main output is enabled
    fn get_enable_output(&mut self) -> bool;

    /// Enable or disable the main output
    fn set_enable_output(&mut self, enable: bool);

    /// Whether the auxiliary power output is enabled
    fn get_power_out(&mut self) -> bool;

    /// Enable or disable the auxiliary power output
    fn set_power_out(&mut self, enable: bool);

    /// Trace mode register
    fn get_trace(&mut self) -> i32;

    /// Enable or disable trace mode
    fn set_trace(&mut self, enable: bool);

    /// TTL/EXT input selector (0 = EXT, 1 = TTL)
    fn get_ext_ttl(&mut self) -> i32;

    /// Select the TTL or EXT input
    fn set_ext_ttl(&mut self, use_ttl: bool);

    /// Current counter measurement mode
    fn get_measure_mode(&mut self) -> MeasureMode;

    /// Set the counter measurement mode
    fn set_measure_mode(&mut self, mode: MeasureMode);

    /// Counter value
    fn get_count(&mut self) -> i32;

    /// Gate-time catalog
    fn gate_values(&self) -> Vec<IdName>;

    /// Current gate-time selector
    fn get_gate_value(&mut self) -> i32;

    /// Set the gate-time selector
    fn set_gate_value(&mut self, value: i32);

    /// Reset the counter
    fn set_reset_counter(&mut self, num: i32);

    /// Start or stop the measurement
    fn set_measure_run_state(&mut self, num: i32);

    /// Sweep start frequency in Hz
    fn get_sweep_start(&mut self) -> f64;

    /// Set sweep start frequency
    fn set_sweep_start(&mut self, frequency: f64);

    /// Sweep end frequency in Hz
    fn get_sweep_end(&mut self) -> f64;

    /// Set sweep end frequency
    fn set_sweep_end(&mut self, frequency: f64);

    /// Sweep time in seconds
    fn get_sweep_time(&mut self) -> f64;

    /// Set sweep time in seconds
    fn set_sweep_time(&mut self, seconds: f64);

    /// Linear/logarithmic selector
    fn get_sweep_lin_log(&mut self) -> i32;

    /// Set the linear/logarithmic selector
    fn set_sweep_lin_log(&mut self, lin_log: i32);

    /// Start or stop the sweep
    fn set_sweep_state(&mut self, run: bool);

    /// Select the quantity the sweep varies
    fn set_sweep_object(&mut self, object: SweepObject);

    /// Select the sweep drive source
    fn set_sweep_source(&mut self, source: SweepSource);

    /// Select the sweep direction
    fn set_sweep_direction(&mut self, direction: SweepDirection);

    /// Load a stored settings slot
    fn load_settings(&mut self, slot: u8);

    /// Save the current settings to a slot
    fn save_settings(&mut self, slot: u8);

    /// Samples in one arbitrary waveform
    fn arb_size(&self) -> usize;

    /// Lowest valid sample value
    fn arb_min(&self) -> i32;

    /// Highest valid sample value
    fn arb_max(&self) -> i32;

    /// Sample value representing zero
    fn arb_offset(&self) -> i32;

    /// Read an arbitrary waveform from the instrument
    fn get_arb_data(&mut self, num: u8, progress: &mut dyn TransferProgress) -> Vec<i32>;

    /// Write an arbitrary waveform to the instrument
    fn set_arb_data(&mut self, num: u8, data: &[i32], progress: &mut dyn TransferProgress);

    /// Model identification string
    fn get_model(&mut self) -> String;

    /// Product identification string
    fn get_product(&mut self) -> String;

    /// Firmware identification string
    fn get_firmware(&mut self) -> String;
}

/// Supported device families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceKind {
    /// No device selected
    #[default]
    None,
    /// MHS-5200 series
    Mhs5200,
    /// FY-6900 series
    Fy6900,
}

impl DeviceKind {
    /// All selectable kinds
    pub const ALL: [DeviceKind; 3] = [DeviceKind::None, DeviceKind::Mhs5200, DeviceKind::Fy6900];

    /// Display name; empty for the none kind
    pub fn name(&self) -> &'static str {
        match self {
            DeviceKind::None => "",
            DeviceKind::Mhs5200 => "MHS5200",
            DeviceKind::Fy6900 => "FY6900",
        }
    }

    /// Construct the codec for this family with an injected status sink
    pub fn build(&self, status: StatusSink) -> Box<dyn FuncGen> {
        match self {
            DeviceKind::None => Box::new(NullDevice::new(status)),
            DeviceKind::Mhs5200 => Box::new(Mhs5200::new(status)),
            DeviceKind::Fy6900 => Box::new(Fy6900::new(status)),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::protocol::{Status, StatusSink};
    use parking_lot::Mutex;
    use std::sync::Arc;

    pub(crate) type StatusLog = Arc<Mutex<Vec<(Status, String)>>>;

    pub(crate) fn recording_sink() -> (StatusSink, StatusLog) {
        let events: StatusLog = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        let sink: StatusSink = Arc::new(move |status, msg: &str| {
            events_clone.lock().push((status, msg.to_string()));
        });
        (sink, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn kind_builds_matching_codec() {
        for kind in DeviceKind::ALL {
            let (sink, _) = testutil::recording_sink();
            let dev = kind.build(sink);
            assert_eq!(dev.kind(), kind);
        }
    }

    #[test]
    fn kind_names() {
        assert_eq!(DeviceKind::None.name(), "");
        assert_eq!(DeviceKind::Mhs5200.to_string(), "MHS5200");
        assert_eq!(DeviceKind::Fy6900.to_string(), "FY6900");
    }
}
