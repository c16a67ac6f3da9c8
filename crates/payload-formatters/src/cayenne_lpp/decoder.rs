use super::measurement::{
    format_name, GpsValue, Kind, Vector3, ACCELEROMETER_SCALE, ANALOG_SCALE,
    BAROMETRIC_PRESSURE_SCALE, GPS_ALTITUDE_SCALE, GPS_COORDINATE_SCALE, GYROMETER_SCALE,
    RELATIVE_HUMIDITY_SCALE, TEMPERATURE_SCALE,
};
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LppError {
    #[error("insufficient data at offset {offset}: expected at least {expected} bytes, got {actual}")]
    InsufficientData {
        offset: usize,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported sensor type {type_id} at offset {offset}")]
    UnsupportedType { offset: usize, type_id: u8 },
}

/// Record parser for CayenneLPP uplink payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct CayenneLppDecoder;

impl CayenneLppDecoder {
    pub fn new() -> Self {
        Self
    }

    fn read_i16_be(data: &[u8]) -> i16 {
        i16::from_be_bytes([data[0], data[1]])
    }

    fn read_u16_be(data: &[u8]) -> u16 {
        u16::from_be_bytes([data[0], data[1]])
    }

    fn read_i24_be(data: &[u8]) -> i32 {
        // Sign-extend 24-bit to 32-bit
        let value = (i32::from(data[0]) << 24)
            | (i32::from(data[1]) << 16)
            | (i32::from(data[2]) << 8);
        value >> 8
    }

    fn read_vector(data: &[u8], scale: f64) -> Vector3 {
        Vector3 {
            x: f64::from(Self::read_i16_be(&data[0..2])) / scale,
            y: f64::from(Self::read_i16_be(&data[2..4])) / scale,
            z: f64::from(Self::read_i16_be(&data[4..6])) / scale,
        }
    }

    /// `data` must be exactly `kind.data_size()` bytes long.
    fn decode_value(kind: Kind, data: &[u8]) -> Value {
        match kind {
            Kind::DigitalInput | Kind::DigitalOutput | Kind::Presence => json!(data[0]),
            Kind::AnalogInput | Kind::AnalogOutput => {
                json!(f64::from(Self::read_i16_be(data)) / ANALOG_SCALE)
            }
            Kind::Luminosity => json!(Self::read_u16_be(data)),
            Kind::Temperature => json!(f64::from(Self::read_i16_be(data)) / TEMPERATURE_SCALE),
            Kind::RelativeHumidity => json!(f64::from(data[0]) / RELATIVE_HUMIDITY_SCALE),
            Kind::Accelerometer => json!(Self::read_vector(data, ACCELEROMETER_SCALE)),
            Kind::BarometricPressure => {
                json!(f64::from(Self::read_u16_be(data)) / BAROMETRIC_PRESSURE_SCALE)
            }
            Kind::Gyrometer => json!(Self::read_vector(data, GYROMETER_SCALE)),
            Kind::Gps => json!(GpsValue {
                latitude: f64::from(Self::read_i24_be(&data[0..3])) / GPS_COORDINATE_SCALE,
                longitude: f64::from(Self::read_i24_be(&data[3..6])) / GPS_COORDINATE_SCALE,
                altitude: f64::from(Self::read_i24_be(&data[6..9])) / GPS_ALTITUDE_SCALE,
            }),
        }
    }

    /// Decode every record in `bytes` into a `{<kind>_<channel>: value}` map.
    ///
    /// A record repeating an earlier key replaces its value.
    pub fn decode(&self, bytes: &[u8]) -> Result<Map<String, Value>, LppError> {
        let mut result = Map::new();
        let mut offset = 0;

        while offset < bytes.len() {
            // Need at least 2 bytes for channel + type
            if offset + 2 > bytes.len() {
                return Err(LppError::InsufficientData {
                    offset,
                    expected: 2,
                    actual: bytes.len() - offset,
                });
            }

            let channel = bytes[offset];
            let type_id = bytes[offset + 1];
            let kind = Kind::from_type_id(type_id)
                .ok_or(LppError::UnsupportedType { offset, type_id })?;
            offset += 2;

            let data_size = kind.data_size();
            if offset + data_size > bytes.len() {
                return Err(LppError::InsufficientData {
                    offset,
                    expected: data_size,
                    actual: bytes.len() - offset,
                });
            }

            let value = Self::decode_value(kind, &bytes[offset..offset + data_size]);
            offset += data_size;

            result.insert(format_name(kind, channel), value);
        }

        Ok(result)
    }
}
