use super::measurement::{
    parse_name, GpsValue, Kind, Vector3, ACCELEROMETER_SCALE, ANALOG_SCALE,
    BAROMETRIC_PRESSURE_SCALE, GPS_ALTITUDE_SCALE, GPS_COORDINATE_SCALE, GYROMETER_SCALE,
    RELATIVE_HUMIDITY_SCALE, TEMPERATURE_SCALE,
};
use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::trace;

const I24_MIN: i64 = -(1 << 23);
const I24_MAX: i64 = (1 << 23) - 1;

/// Why a field of the decoded payload did not produce a record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SkipReason {
    #[error("not a measurement name")]
    NotMeasurement,

    #[error("{0} expects a number")]
    NotANumber(Kind),

    #[error("{0} expects an object with numeric fields")]
    Malformed(Kind),

    #[error("value does not fit {0}")]
    OutOfRange(Kind),
}

/// Builds a CayenneLPP downlink payload record by record.
#[derive(Debug, Default)]
pub struct CayenneLppEncoder {
    buf: BytesMut,
}

impl CayenneLppEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record for every measurement field in `map`, in key order.
    ///
    /// Fields that are not measurements or whose value cannot be represented
    /// are skipped.
    pub fn encode_map(&mut self, map: &Map<String, Value>) {
        for (name, value) in map {
            let result = parse_name(name)
                .map_err(|_| SkipReason::NotMeasurement)
                .and_then(|(kind, channel)| self.add(kind, channel, value));
            if let Err(reason) = result {
                trace!(field = %name, %reason, "skipping field");
            }
        }
    }

    /// Append a record for `value` measured on `channel`.
    ///
    /// Nothing is written when the value is rejected.
    pub fn add(&mut self, kind: Kind, channel: u8, value: &Value) -> Result<(), SkipReason> {
        match kind {
            Kind::DigitalInput | Kind::DigitalOutput | Kind::Presence => {
                let raw = fixed(number(kind, value)?, 1.0, 0, i64::from(u8::MAX))
                    .ok_or(SkipReason::OutOfRange(kind))?;
                self.put_header(channel, kind);
                self.buf.put_u8(raw as u8);
            }
            Kind::AnalogInput | Kind::AnalogOutput => {
                let raw = fixed_i16(number(kind, value)?, ANALOG_SCALE)
                    .ok_or(SkipReason::OutOfRange(kind))?;
                self.put_header(channel, kind);
                self.buf.put_i16(raw);
            }
            Kind::Luminosity => {
                let raw = fixed(number(kind, value)?, 1.0, 0, i64::from(u16::MAX))
                    .ok_or(SkipReason::OutOfRange(kind))?;
                self.put_header(channel, kind);
                self.buf.put_u16(raw as u16);
            }
            Kind::Temperature => {
                let raw = fixed_i16(number(kind, value)?, TEMPERATURE_SCALE)
                    .ok_or(SkipReason::OutOfRange(kind))?;
                self.put_header(channel, kind);
                self.buf.put_i16(raw);
            }
            Kind::RelativeHumidity => {
                let raw = fixed(
                    number(kind, value)?,
                    RELATIVE_HUMIDITY_SCALE,
                    0,
                    i64::from(u8::MAX),
                )
                .ok_or(SkipReason::OutOfRange(kind))?;
                self.put_header(channel, kind);
                self.buf.put_u8(raw as u8);
            }
            Kind::BarometricPressure => {
                let raw = fixed(
                    number(kind, value)?,
                    BAROMETRIC_PRESSURE_SCALE,
                    0,
                    i64::from(u16::MAX),
                )
                .ok_or(SkipReason::OutOfRange(kind))?;
                self.put_header(channel, kind);
                self.buf.put_u16(raw as u16);
            }
            Kind::Accelerometer => self.put_vector(channel, kind, value, ACCELEROMETER_SCALE)?,
            Kind::Gyrometer => self.put_vector(channel, kind, value, GYROMETER_SCALE)?,
            Kind::Gps => {
                let gps: GpsValue = object(kind, value)?;
                let latitude = fixed(gps.latitude, GPS_COORDINATE_SCALE, I24_MIN, I24_MAX);
                let longitude = fixed(gps.longitude, GPS_COORDINATE_SCALE, I24_MIN, I24_MAX);
                let altitude = fixed(gps.altitude, GPS_ALTITUDE_SCALE, I24_MIN, I24_MAX);
                let (Some(latitude), Some(longitude), Some(altitude)) =
                    (latitude, longitude, altitude)
                else {
                    return Err(SkipReason::OutOfRange(kind));
                };
                self.put_header(channel, kind);
                self.put_i24(latitude as i32);
                self.put_i24(longitude as i32);
                self.put_i24(altitude as i32);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    fn put_header(&mut self, channel: u8, kind: Kind) {
        self.buf.put_u8(channel);
        self.buf.put_u8(kind.type_id());
    }

    fn put_i24(&mut self, value: i32) {
        self.buf.put_slice(&value.to_be_bytes()[1..]);
    }

    fn put_vector(
        &mut self,
        channel: u8,
        kind: Kind,
        value: &Value,
        scale: f64,
    ) -> Result<(), SkipReason> {
        let v: Vector3 = object(kind, value)?;
        let (Some(x), Some(y), Some(z)) = (
            fixed_i16(v.x, scale),
            fixed_i16(v.y, scale),
            fixed_i16(v.z, scale),
        ) else {
            return Err(SkipReason::OutOfRange(kind));
        };
        self.put_header(channel, kind);
        self.buf.put_i16(x);
        self.buf.put_i16(y);
        self.buf.put_i16(z);
        Ok(())
    }
}

fn number(kind: Kind, value: &Value) -> Result<f64, SkipReason> {
    value.as_f64().ok_or(SkipReason::NotANumber(kind))
}

// serde would also accept a sequence for a struct; only objects are measurements.
fn object<T: DeserializeOwned>(kind: Kind, value: &Value) -> Result<T, SkipReason> {
    if !value.is_object() {
        return Err(SkipReason::Malformed(kind));
    }
    serde_json::from_value(value.clone()).map_err(|_| SkipReason::Malformed(kind))
}

/// Round `value` to the nearest multiple of `1 / scale` and return the raw
/// integer if it lies in `[min, max]`.
fn fixed(value: f64, scale: f64, min: i64, max: i64) -> Option<i64> {
    let raw = (value * scale).round();
    if !raw.is_finite() || raw < min as f64 || raw > max as f64 {
        return None;
    }
    Some(raw as i64)
}

fn fixed_i16(value: f64, scale: f64) -> Option<i16> {
    fixed(value, scale, i64::from(i16::MIN), i64::from(i16::MAX)).map(|raw| raw as i16)
}
