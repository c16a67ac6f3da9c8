//! CayenneLPP measurement kinds and the `<kind>_<channel>` key scheme.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// Sensor type IDs from the Cayenne LPP specification
pub const TYPE_DIGITAL_INPUT: u8 = 0;
pub const TYPE_DIGITAL_OUTPUT: u8 = 1;
pub const TYPE_ANALOG_INPUT: u8 = 2;
pub const TYPE_ANALOG_OUTPUT: u8 = 3;
pub const TYPE_LUMINOSITY: u8 = 101;
pub const TYPE_PRESENCE: u8 = 102;
pub const TYPE_TEMPERATURE: u8 = 103;
pub const TYPE_RELATIVE_HUMIDITY: u8 = 104;
pub const TYPE_ACCELEROMETER: u8 = 113;
pub const TYPE_BAROMETRIC_PRESSURE: u8 = 115;
pub const TYPE_GYROMETER: u8 = 134;
pub const TYPE_GPS: u8 = 136;

// Data sizes for each type (in bytes, excluding channel and type bytes)
pub const SIZE_DIGITAL: usize = 1;
pub const SIZE_ANALOG: usize = 2;
pub const SIZE_LUMINOSITY: usize = 2;
pub const SIZE_PRESENCE: usize = 1;
pub const SIZE_TEMPERATURE: usize = 2;
pub const SIZE_RELATIVE_HUMIDITY: usize = 1;
pub const SIZE_ACCELEROMETER: usize = 6;
pub const SIZE_BAROMETRIC_PRESSURE: usize = 2;
pub const SIZE_GYROMETER: usize = 6;
pub const SIZE_GPS: usize = 9;

// Fixed-point resolutions
pub const ANALOG_SCALE: f64 = 100.0;
pub const TEMPERATURE_SCALE: f64 = 10.0;
pub const RELATIVE_HUMIDITY_SCALE: f64 = 2.0;
pub const ACCELEROMETER_SCALE: f64 = 1000.0;
pub const BAROMETRIC_PRESSURE_SCALE: f64 = 10.0;
pub const GYROMETER_SCALE: f64 = 100.0;
pub const GPS_COORDINATE_SCALE: f64 = 10000.0;
pub const GPS_ALTITUDE_SCALE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    DigitalInput,
    DigitalOutput,
    AnalogInput,
    AnalogOutput,
    Luminosity,
    Presence,
    Temperature,
    RelativeHumidity,
    Accelerometer,
    BarometricPressure,
    Gyrometer,
    Gps,
}

impl Kind {
    pub const ALL: [Kind; 12] = [
        Kind::DigitalInput,
        Kind::DigitalOutput,
        Kind::AnalogInput,
        Kind::AnalogOutput,
        Kind::Luminosity,
        Kind::Presence,
        Kind::Temperature,
        Kind::RelativeHumidity,
        Kind::Accelerometer,
        Kind::BarometricPressure,
        Kind::Gyrometer,
        Kind::Gps,
    ];

    pub fn from_type_id(type_id: u8) -> Option<Self> {
        let kind = match type_id {
            TYPE_DIGITAL_INPUT => Kind::DigitalInput,
            TYPE_DIGITAL_OUTPUT => Kind::DigitalOutput,
            TYPE_ANALOG_INPUT => Kind::AnalogInput,
            TYPE_ANALOG_OUTPUT => Kind::AnalogOutput,
            TYPE_LUMINOSITY => Kind::Luminosity,
            TYPE_PRESENCE => Kind::Presence,
            TYPE_TEMPERATURE => Kind::Temperature,
            TYPE_RELATIVE_HUMIDITY => Kind::RelativeHumidity,
            TYPE_ACCELEROMETER => Kind::Accelerometer,
            TYPE_BAROMETRIC_PRESSURE => Kind::BarometricPressure,
            TYPE_GYROMETER => Kind::Gyrometer,
            TYPE_GPS => Kind::Gps,
            _ => return None,
        };
        Some(kind)
    }

    pub fn type_id(self) -> u8 {
        match self {
            Kind::DigitalInput => TYPE_DIGITAL_INPUT,
            Kind::DigitalOutput => TYPE_DIGITAL_OUTPUT,
            Kind::AnalogInput => TYPE_ANALOG_INPUT,
            Kind::AnalogOutput => TYPE_ANALOG_OUTPUT,
            Kind::Luminosity => TYPE_LUMINOSITY,
            Kind::Presence => TYPE_PRESENCE,
            Kind::Temperature => TYPE_TEMPERATURE,
            Kind::RelativeHumidity => TYPE_RELATIVE_HUMIDITY,
            Kind::Accelerometer => TYPE_ACCELEROMETER,
            Kind::BarometricPressure => TYPE_BAROMETRIC_PRESSURE,
            Kind::Gyrometer => TYPE_GYROMETER,
            Kind::Gps => TYPE_GPS,
        }
    }

    /// Width of the value that follows the channel and type bytes.
    pub fn data_size(self) -> usize {
        match self {
            Kind::DigitalInput | Kind::DigitalOutput => SIZE_DIGITAL,
            Kind::AnalogInput | Kind::AnalogOutput => SIZE_ANALOG,
            Kind::Luminosity => SIZE_LUMINOSITY,
            Kind::Presence => SIZE_PRESENCE,
            Kind::Temperature => SIZE_TEMPERATURE,
            Kind::RelativeHumidity => SIZE_RELATIVE_HUMIDITY,
            Kind::Accelerometer => SIZE_ACCELEROMETER,
            Kind::BarometricPressure => SIZE_BAROMETRIC_PRESSURE,
            Kind::Gyrometer => SIZE_GYROMETER,
            Kind::Gps => SIZE_GPS,
        }
    }

    /// Key prefix used in decoded payloads.
    pub fn tag(self) -> &'static str {
        match self {
            Kind::DigitalInput => "digital_in",
            Kind::DigitalOutput => "digital_out",
            Kind::AnalogInput => "analog_in",
            Kind::AnalogOutput => "analog_out",
            Kind::Luminosity => "luminosity",
            Kind::Presence => "presence",
            Kind::Temperature => "temperature",
            Kind::RelativeHumidity => "relative_humidity",
            Kind::Accelerometer => "accelerometer",
            Kind::BarometricPressure => "barometric_pressure",
            Kind::Gyrometer => "gyrometer",
            Kind::Gps => "gps",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Three-axis reading of an accelerometer or gyrometer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsValue {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("name '{0}' has no channel suffix")]
    MissingChannel(String),

    #[error("invalid channel '{channel}' in name '{name}'")]
    InvalidChannel { name: String, channel: String },

    #[error("unknown measurement kind '{0}'")]
    UnknownKind(String),
}

/// Key for a measurement of `kind` on `channel`, e.g. `temperature_3`.
pub fn format_name(kind: Kind, channel: u8) -> String {
    format!("{}_{}", kind.tag(), channel)
}

/// Inverse of [`format_name`].
pub fn parse_name(name: &str) -> Result<(Kind, u8), NameError> {
    let (tag, channel) = name
        .rsplit_once('_')
        .ok_or_else(|| NameError::MissingChannel(name.to_string()))?;

    // Reject forms u8::from_str would accept but format_name never emits.
    let leading_zero = channel.len() > 1 && channel.starts_with('0');
    if channel.is_empty() || channel.starts_with('+') || leading_zero {
        return Err(NameError::InvalidChannel {
            name: name.to_string(),
            channel: channel.to_string(),
        });
    }
    let channel = channel.parse::<u8>().map_err(|_| NameError::InvalidChannel {
        name: name.to_string(),
        channel: channel.to_string(),
    })?;
    let kind = Kind::from_tag(tag).ok_or_else(|| NameError::UnknownKind(tag.to_string()))?;
    Ok((kind, channel))
}
