//! Encoding of generator commands into the bracketed wire format.
//!
//! Wire format (ASCII, one command per line):
//!
//! ```text
//! <@A> / <@B> / <@C>                          mode select
//! <amp,freq,duty>                             single pulse     (mode A)
//! <a,f,d,ll,ca;a,f,d,ll,ca;...>               pulse train      (mode B)
//! <amp,freq>                                  sine wave        (mode C)
//! <Invert:ON> / <Invert:OFF>                  inversion toggle
//! <VERSION?>                                  version query
//! ```
//!
//! Waveform parameters reach this module as the raw text the operator typed
//! into a form.  Encoding parses every field as a finite real number and
//! renders it fixed-point with exactly three decimals and a `.` separator,
//! independent of the host locale, so `2` and `2.0` both travel as `2.000`.
//!
//! Range limits (duty bounds, lead/lag in [-0.5, 0.5], cap angle in
//! [0, 90]) are a form-layer concern and are deliberately not checked here;
//! the encoder guards parseability only.

use thiserror::Error;

use crate::protocol::version::VERSION_QUERY;

/// Operating mode of the generator, selected before parameter commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Single parameterized pulse (`@A`).
    Single,
    /// Train of up to eight independently parameterized pulses (`@B`).
    Train,
    /// Sine wave (`@C`).
    Sine,
}

impl Mode {
    /// The literal mode-select token sent on the wire.
    pub fn token(self) -> &'static str {
        match self {
            Mode::Single => "@A",
            Mode::Train => "@B",
            Mode::Sine => "@C",
        }
    }
}

/// Operator-entered parameters for a single pulse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinglePulse {
    /// Amplitude in volts.
    pub amplitude: String,
    /// Frequency in hertz.
    pub frequency: String,
    /// Duty cycle in percent.
    pub duty_percent: String,
}

/// Operator-entered parameters for one slot of a pulse train.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainPulse {
    pub amplitude: String,
    pub frequency: String,
    pub duty_percent: String,
    /// Lead/lag offset, nominally in [-0.5, 0.5].
    pub lead_lag: String,
    /// Capacitor angle in degrees, nominally in [0, 90].
    pub cap_angle: String,
}

/// Operator-entered parameters for a sine wave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SineWave {
    pub amplitude: String,
    pub frequency: String,
}

/// A command ready to be encoded for the generator.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Select the operating mode.
    SelectMode(Mode),
    /// Single-pulse parameters (mode A).
    Single(SinglePulse),
    /// Pulse-train parameters (mode B), one group per configured slot.
    Train(Vec<TrainPulse>),
    /// Sine parameters (mode C).
    Sine(SineWave),
    /// Toggle output inversion.
    Invert(bool),
    /// Firmware version query.
    VersionQuery,
}

/// Errors produced while encoding a command.
///
/// Encoding aborts on the first invalid field so the operator is told
/// exactly which input to fix.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// A field could not be parsed as a finite real number.
    #[error("{field} is not a valid number: {value:?}")]
    InvalidNumber { field: String, value: String },

    /// A pulse train with no pulses has nothing to send.
    #[error("pulse train is empty")]
    EmptyTrain,
}

/// Encodes `cmd` into its wire form `<payload>\n`.
///
/// Pure function: no I/O, no state.  Numeric fields are validated and
/// formatted as described in the module docs; literal commands cannot fail.
///
/// # Errors
///
/// Returns [`EncodeError::InvalidNumber`] naming the first offending field,
/// or [`EncodeError::EmptyTrain`] for a train with zero pulses.
pub fn encode(cmd: &Command) -> Result<String, EncodeError> {
    let payload = match cmd {
        Command::SelectMode(mode) => mode.token().to_string(),
        Command::Invert(true) => "Invert:ON".to_string(),
        Command::Invert(false) => "Invert:OFF".to_string(),
        Command::VersionQuery => VERSION_QUERY.to_string(),
        Command::Single(p) => {
            let amp = numeric_field("amplitude", &p.amplitude)?;
            let freq = numeric_field("frequency", &p.frequency)?;
            let duty = numeric_field("duty cycle", &p.duty_percent)?;
            format!("{amp},{freq},{duty}")
        }
        Command::Sine(w) => {
            let amp = numeric_field("amplitude", &w.amplitude)?;
            let freq = numeric_field("frequency", &w.frequency)?;
            format!("{amp},{freq}")
        }
        Command::Train(pulses) => {
            if pulses.is_empty() {
                return Err(EncodeError::EmptyTrain);
            }
            let mut groups = Vec::with_capacity(pulses.len());
            for (i, p) in pulses.iter().enumerate() {
                groups.push(encode_train_pulse(i + 1, p)?);
            }
            groups.join(";")
        }
    };

    Ok(format!("<{payload}>\n"))
}

fn encode_train_pulse(slot: usize, p: &TrainPulse) -> Result<String, EncodeError> {
    let fields = [
        ("amplitude", &p.amplitude),
        ("frequency", &p.frequency),
        ("duty cycle", &p.duty_percent),
        ("lead/lag", &p.lead_lag),
        ("cap angle", &p.cap_angle),
    ];

    let mut group = String::new();
    for (i, (name, value)) in fields.iter().enumerate() {
        if i > 0 {
            group.push(',');
        }
        let rendered = numeric_field(&format!("pulse {slot} {name}"), value)?;
        group.push_str(&rendered);
    }
    Ok(group)
}

/// Parses `value` as a finite `f64` and renders it with exactly three
/// decimal places.  Rust's `{:.3}` always uses `.` as the separator, which
/// keeps the output locale-invariant.
fn numeric_field(field: &str, value: &str) -> Result<String, EncodeError> {
    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| EncodeError::InvalidNumber {
            field: field.to_string(),
            value: value.to_string(),
        })?;

    if !parsed.is_finite() {
        return Err(EncodeError::InvalidNumber {
            field: field.to_string(),
            value: value.to_string(),
        });
    }

    Ok(format!("{parsed:.3}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(amp: &str, freq: &str, duty: &str) -> Command {
        Command::Single(SinglePulse {
            amplitude: amp.into(),
            frequency: freq.into(),
            duty_percent: duty.into(),
        })
    }

    fn train_pulse(amp: &str, freq: &str, duty: &str, lag: &str, angle: &str) -> TrainPulse {
        TrainPulse {
            amplitude: amp.into(),
            frequency: freq.into(),
            duty_percent: duty.into(),
            lead_lag: lag.into(),
            cap_angle: angle.into(),
        }
    }

    // ── Literal commands ─────────────────────────────────────────────────────

    #[test]
    fn test_mode_select_tokens() {
        assert_eq!(encode(&Command::SelectMode(Mode::Single)).unwrap(), "<@A>\n");
        assert_eq!(encode(&Command::SelectMode(Mode::Train)).unwrap(), "<@B>\n");
        assert_eq!(encode(&Command::SelectMode(Mode::Sine)).unwrap(), "<@C>\n");
    }

    #[test]
    fn test_invert_toggles() {
        assert_eq!(encode(&Command::Invert(true)).unwrap(), "<Invert:ON>\n");
        assert_eq!(encode(&Command::Invert(false)).unwrap(), "<Invert:OFF>\n");
    }

    #[test]
    fn test_version_query() {
        assert_eq!(encode(&Command::VersionQuery).unwrap(), "<VERSION?>\n");
    }

    #[test]
    fn test_version_query_matches_precomputed_wire_form() {
        // The handshake sends the constant instead of calling the encoder;
        // the two must never drift apart.
        use crate::protocol::version::VERSION_QUERY_WIRE;
        assert_eq!(encode(&Command::VersionQuery).unwrap(), VERSION_QUERY_WIRE);
    }

    // ── Single pulse ─────────────────────────────────────────────────────────

    #[test]
    fn test_single_pulse_three_decimal_rendering() {
        let cmd = single("2", "20", "40");
        assert_eq!(encode(&cmd).unwrap(), "<2.000,20.000,40.000>\n");
    }

    #[test]
    fn test_single_pulse_rounds_to_three_decimals() {
        let cmd = single("1.23456", "0.5", "3.14159");
        assert_eq!(encode(&cmd).unwrap(), "<1.235,0.500,3.142>\n");
    }

    #[test]
    fn test_single_pulse_accepts_surrounding_whitespace() {
        let cmd = single(" 2.5 ", "\t10", "40 ");
        assert_eq!(encode(&cmd).unwrap(), "<2.500,10.000,40.000>\n");
    }

    #[test]
    fn test_single_pulse_rejects_non_numeric_amplitude() {
        let err = encode(&single("abc", "20", "40")).unwrap_err();
        assert_eq!(
            err,
            EncodeError::InvalidNumber {
                field: "amplitude".into(),
                value: "abc".into(),
            }
        );
    }

    #[test]
    fn test_single_pulse_rejects_empty_field() {
        let err = encode(&single("2", "", "40")).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidNumber { ref field, .. } if field == "frequency"));
    }

    #[test]
    fn test_single_pulse_rejects_infinite_value() {
        let err = encode(&single("inf", "20", "40")).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidNumber { ref field, .. } if field == "amplitude"));
    }

    #[test]
    fn test_single_pulse_rejects_nan() {
        let err = encode(&single("2", "NaN", "40")).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidNumber { ref field, .. } if field == "frequency"));
    }

    // ── Pulse train ──────────────────────────────────────────────────────────

    #[test]
    fn test_two_pulse_train_encoding() {
        let cmd = Command::Train(vec![
            train_pulse("1", "10", "50", "0", "0"),
            train_pulse("2", "20", "60", "0.25", "45"),
        ]);
        assert_eq!(
            encode(&cmd).unwrap(),
            "<1.000,10.000,50.000,0.000,0.000;2.000,20.000,60.000,0.250,45.000>\n"
        );
    }

    #[test]
    fn test_one_pulse_train_has_no_separator() {
        let cmd = Command::Train(vec![train_pulse("2", "20", "40", "-0.5", "90")]);
        assert_eq!(encode(&cmd).unwrap(), "<2.000,20.000,40.000,-0.500,90.000>\n");
    }

    #[test]
    fn test_train_error_names_the_failing_slot_and_field() {
        let cmd = Command::Train(vec![
            train_pulse("1", "10", "50", "0", "0"),
            train_pulse("2", "20", "60", "0.25", "45"),
            train_pulse("3", "x", "60", "0", "0"),
        ]);
        let err = encode(&cmd).unwrap_err();
        assert_eq!(
            err,
            EncodeError::InvalidNumber {
                field: "pulse 3 frequency".into(),
                value: "x".into(),
            }
        );
    }

    #[test]
    fn test_empty_train_is_rejected() {
        assert_eq!(encode(&Command::Train(vec![])).unwrap_err(), EncodeError::EmptyTrain);
    }

    #[test]
    fn test_train_is_not_capped_at_eight_pulses() {
        // The form layer caps slots at 8; the encoder itself does not.
        let pulses = vec![train_pulse("1", "1", "1", "0", "0"); 9];
        let encoded = encode(&Command::Train(pulses)).unwrap();
        assert_eq!(encoded.matches(';').count(), 8);
    }

    // ── Sine ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_sine_encoding() {
        let cmd = Command::Sine(SineWave {
            amplitude: "1.5".into(),
            frequency: "50".into(),
        });
        assert_eq!(encode(&cmd).unwrap(), "<1.500,50.000>\n");
    }

    #[test]
    fn test_sine_rejects_non_numeric_frequency() {
        let cmd = Command::Sine(SineWave {
            amplitude: "1".into(),
            frequency: "fifty".into(),
        });
        let err = encode(&cmd).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidNumber { ref field, .. } if field == "frequency"));
    }
}
