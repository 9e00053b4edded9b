//! Value types shared by the device codecs

use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of a device waveform catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveType {
    /// Device-assigned waveform id
    pub id: u16,
    /// Display name
    pub name: String,
}

impl WaveType {
    /// Catalog entry constructor
    pub fn new(id: u16, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

impl fmt::Display for WaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Generic (id, display name) pair, used for gate-time catalogs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdName {
    /// Device-assigned id
    pub id: i32,
    /// Display name
    pub name: String,
}

impl IdName {
    /// Pair constructor
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

impl fmt::Display for IdName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Frequency-counter measurement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasureMode {
    /// Measure frequency
    Frequency,
    /// Count events
    Counter,
    /// Positive pulse width
    PwmPos,
    /// Negative pulse width
    PwmNeg,
    /// Period
    Period,
    /// Duty cycle
    Duty,
}

impl MeasureMode {
    /// All modes in id order
    pub const ALL: [MeasureMode; 6] = [
        MeasureMode::Frequency,
        MeasureMode::Counter,
        MeasureMode::PwmPos,
        MeasureMode::PwmNeg,
        MeasureMode::Period,
        MeasureMode::Duty,
    ];

    /// Wire id
    pub fn id(&self) -> i32 {
        match self {
            MeasureMode::Frequency => 0,
            MeasureMode::Counter => 1,
            MeasureMode::PwmPos => 2,
            MeasureMode::PwmNeg => 3,
            MeasureMode::Period => 4,
            MeasureMode::Duty => 5,
        }
    }

    /// Mode for a wire id
    pub fn from_id(id: i32) -> Option<MeasureMode> {
        MeasureMode::ALL.iter().copied().find(|m| m.id() == id)
    }

    /// Display name
    pub fn label(&self) -> &'static str {
        match self {
            MeasureMode::Frequency => "Frequency",
            MeasureMode::Counter => "Counter",
            MeasureMode::PwmPos => "Positive PWM",
            MeasureMode::PwmNeg => "Negative PWM",
            MeasureMode::Period => "Period",
            MeasureMode::Duty => "Duty cycle",
        }
    }
}

impl fmt::Display for MeasureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Quantity a sweep varies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepObject {
    /// Sweep frequency
    Frequency,
    /// Sweep amplitude
    Amplitude,
    /// Sweep offset
    Offset,
    /// Sweep duty cycle
    DutyCycle,
}

impl SweepObject {
    /// Wire id
    pub fn id(&self) -> i32 {
        match self {
            SweepObject::Frequency => 0,
            SweepObject::Amplitude => 1,
            SweepObject::Offset => 2,
            SweepObject::DutyCycle => 3,
        }
    }
}

/// What drives a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepSource {
    /// Internal timebase
    Time,
    /// External VCO input
    Vco,
}

impl SweepSource {
    /// Wire id
    pub fn id(&self) -> i32 {
        match self {
            SweepSource::Time => 0,
            SweepSource::Vco => 1,
        }
    }
}

/// Sweep traversal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepDirection {
    /// Start to end
    Rise,
    /// End to start
    Fall,
    /// Up then down
    RiseFall,
}

impl SweepDirection {
    /// Wire id
    pub fn id(&self) -> i32 {
        match self {
            SweepDirection::Rise => 0,
            SweepDirection::Fall => 1,
            SweepDirection::RiseFall => 2,
        }
    }
}

/// Progress sink for bulk waveform transfers.
///
/// Cancellation is checked once per slice; a transfer never stops
/// mid-slice.
pub trait TransferProgress {
    /// Called after each slice with the number of samples completed
    fn progress(&mut self, samples: usize);

    /// Polled at slice boundaries
    fn cancelled(&self) -> bool {
        false
    }
}

/// Progress sink that ignores everything
pub struct NullProgress;

impl TransferProgress for NullProgress {
    fn progress(&mut self, _samples: usize) {}
}

/// Parse a frequency with an optional kHz/MHz/GHz suffix.
///
/// `"1.5 MHz"` parses to 1 500 000.0; a bare number is taken as Hz.
pub fn parse_freq(text: &str) -> Option<f64> {
    let upper = text.trim().to_ascii_uppercase();
    let (number, scale) = if let Some(n) = upper.strip_suffix("KHZ") {
        (n, 1e3)
    } else if let Some(n) = upper.strip_suffix("MHZ") {
        (n, 1e6)
    } else if let Some(n) = upper.strip_suffix("GHZ") {
        (n, 1e9)
    } else if let Some(n) = upper.strip_suffix("HZ") {
        (n, 1.0)
    } else {
        (upper.as_str(), 1.0)
    };
    number.trim().parse::<f64>().ok().map(|d| d * scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn measure_mode_ids_round_trip() {
        for mode in MeasureMode::ALL {
            assert_eq!(MeasureMode::from_id(mode.id()), Some(mode));
        }
        assert_eq!(MeasureMode::from_id(6), None);
        assert_eq!(MeasureMode::PwmPos.id(), 2);
    }

    #[test]
    fn parse_freq_suffixes() {
        assert_eq!(parse_freq("880"), Some(880.0));
        assert_eq!(parse_freq("880 Hz"), Some(880.0));
        assert_eq!(parse_freq("1.5 kHz"), Some(1500.0));
        assert_eq!(parse_freq("1.5MHz"), Some(1_500_000.0));
        assert_eq!(parse_freq("2 GHz"), Some(2e9));
        assert_eq!(parse_freq("not a number"), None);
        assert_eq!(parse_freq(""), None);
    }

    #[test]
    fn sweep_ids() {
        assert_eq!(SweepObject::DutyCycle.id(), 3);
        assert_eq!(SweepSource::Vco.id(), 1);
        assert_eq!(SweepDirection::RiseFall.id(), 2);
    }
}
