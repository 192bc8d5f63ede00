// Cobbler - Temperature and humidity telemetry relay
//
// Copyright 2026 Cobbler Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Number;
use std::error::Error;
use std::fmt::{self, Formatter};

/// Round a measurement to two decimal places.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Temperature, in degrees celsius
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(transparent)]
pub struct TemperatureCelsius(f64);

impl From<f64> for TemperatureCelsius {
    fn from(v: f64) -> Self {
        Self(v)
    }
}

impl From<TemperatureCelsius> for f64 {
    fn from(v: TemperatureCelsius) -> Self {
        v.0
    }
}

impl From<TemperatureFahrenheit> for TemperatureCelsius {
    fn from(f: TemperatureFahrenheit) -> Self {
        Self((f.0 - 32.0) * 5.0 / 9.0)
    }
}

impl fmt::Display for TemperatureCelsius {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}c", self.0)
    }
}

/// Temperature, in degrees fahrenheit
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(transparent)]
pub struct TemperatureFahrenheit(f64);

impl From<f64> for TemperatureFahrenheit {
    fn from(v: f64) -> Self {
        Self(v)
    }
}

impl From<TemperatureFahrenheit> for f64 {
    fn from(v: TemperatureFahrenheit) -> Self {
        v.0
    }
}

impl From<TemperatureCelsius> for TemperatureFahrenheit {
    fn from(c: TemperatureCelsius) -> Self {
        Self(c.0 * 9.0 / 5.0 + 32.0)
    }
}

impl fmt::Display for TemperatureFahrenheit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}f", self.0)
    }
}

/// Relative humidity (from 0 to 100)
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(transparent)]
pub struct Humidity(f64);

impl From<f64> for Humidity {
    fn from(v: f64) -> Self {
        Self(v)
    }
}

impl From<Humidity> for f64 {
    fn from(v: Humidity) -> Self {
        v.0
    }
}

impl fmt::Display for Humidity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// How a reading was acquired.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Source {
    #[serde(rename = "DHT22")]
    Dht22,
    #[serde(rename = "Ecobee")]
    Ecobee,
    #[serde(rename = "simulated")]
    Simulated,
}

impl Source {
    /// Kind of device that produces readings for this source.
    pub fn device(&self) -> &'static str {
        match self {
            Source::Dht22 | Source::Simulated => "raspberry_pi",
            Source::Ecobee => "smart_thermostat",
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Source::Dht22 => "DHT22",
            Source::Ecobee => "Ecobee",
            Source::Simulated => "simulated",
        }
    }
}

/// Identity attached to every reading produced by one source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Origin {
    pub sensor_id: String,
    pub location: String,
    pub source: Source,
}

impl Origin {
    pub fn new<S1, S2>(sensor_id: S1, location: S2, source: Source) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            sensor_id: sensor_id.into(),
            location: location.into(),
            source,
        }
    }
}

/// HVAC state reported by a thermostat, passed through as reported by the hub.
///
/// The target temperature keeps the hub's JSON number as-is, so `70` stays `70`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HvacStatus {
    pub hvac_mode: String,
    pub hvac_action: String,
    pub target_temperature: Number,
}

/// A measurement that can't be represented in a reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadingError {
    /// Field name and the value it would have had
    NotFinite(&'static str, f64),
}

impl ReadingError {
    pub fn field(&self) -> &'static str {
        match self {
            ReadingError::NotFinite(field, _) => field,
        }
    }
}

impl fmt::Display for ReadingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ReadingError::NotFinite(field, v) => write!(f, "{} is not a finite number: {}", field, v),
        }
    }
}

impl Error for ReadingError {}

/// A single normalized measurement from one source.
///
/// Both temperature fields are always derived from one canonical value (celsius for
/// the DHT22, fahrenheit for the thermostat) and all measurements are rounded to two
/// decimal places. There is no way to build a `Reading` with missing or non-finite
/// measurements: sources that can't produce all of them produce no reading at all.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reading {
    timestamp: DateTime<Local>,
    sensor_id: String,
    location: String,
    temperature_celsius: f64,
    temperature_fahrenheit: f64,
    humidity: f64,
    source: Source,
    device: &'static str,
    #[serde(flatten)]
    hvac: Option<HvacStatus>,
}

impl Reading {
    /// Build a reading where celsius is the measured value and fahrenheit is derived.
    pub fn from_celsius(
        origin: &Origin,
        timestamp: DateTime<Local>,
        temperature: TemperatureCelsius,
        humidity: Humidity,
    ) -> Result<Self, ReadingError> {
        let fahrenheit = TemperatureFahrenheit::from(temperature);
        Self::new(origin, timestamp, temperature.into(), fahrenheit.into(), humidity)
    }

    /// Build a reading where fahrenheit is the measured value and celsius is derived.
    pub fn from_fahrenheit(
        origin: &Origin,
        timestamp: DateTime<Local>,
        temperature: TemperatureFahrenheit,
        humidity: Humidity,
    ) -> Result<Self, ReadingError> {
        let celsius = TemperatureCelsius::from(temperature);
        Self::new(origin, timestamp, celsius.into(), temperature.into(), humidity)
    }

    fn new(
        origin: &Origin,
        timestamp: DateTime<Local>,
        celsius: f64,
        fahrenheit: f64,
        humidity: Humidity,
    ) -> Result<Self, ReadingError> {
        Ok(Self {
            timestamp,
            sensor_id: origin.sensor_id.clone(),
            location: origin.location.clone(),
            temperature_celsius: finite("temperature_celsius", celsius)?,
            temperature_fahrenheit: finite("temperature_fahrenheit", fahrenheit)?,
            humidity: finite("humidity", humidity.into())?,
            source: origin.source,
            device: origin.source.device(),
            hvac: None,
        })
    }

    /// Attach thermostat HVAC state to this reading.
    pub fn with_hvac(mut self, hvac: HvacStatus) -> Self {
        self.hvac = Some(hvac);
        self
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn temperature_celsius(&self) -> f64 {
        self.temperature_celsius
    }

    pub fn temperature_fahrenheit(&self) -> f64 {
        self.temperature_fahrenheit
    }

    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn device(&self) -> &'static str {
        self.device
    }

    pub fn hvac(&self) -> Option<&HvacStatus> {
        self.hvac.as_ref()
    }
}

/// Round a measurement, rejecting values that would serialize as `null`.
fn finite(field: &'static str, v: f64) -> Result<f64, ReadingError> {
    let rounded = round2(v);
    if rounded.is_finite() {
        Ok(rounded)
    } else {
        Err(ReadingError::NotFinite(field, v))
    }
}

#[cfg(test)]
mod test {
    use super::{
        round2, Humidity, HvacStatus, Origin, Reading, ReadingError, Source, TemperatureCelsius,
        TemperatureFahrenheit,
    };
    use chrono::Local;
    use serde_json::Number;

    fn dht22() -> Origin {
        Origin::new("raspberry_pi_dht22", "bird_cage_window_area", Source::Dht22)
    }

    fn ecobee() -> Origin {
        Origin::new("ecobee_thermostat", "whole_house", Source::Ecobee)
    }

    #[test]
    fn test_round2() {
        assert_eq!(69.8, round2(69.800000000001));
        assert_eq!(22.57, round2(22.5666));
        assert_eq!(-10.1, round2(-10.1));
        assert_eq!(50.0, round2(50.0));
    }

    #[test]
    fn test_celsius_to_fahrenheit() {
        for c in [-40.0, -10.1, 0.0, 21.0, 35.1, 37.77] {
            let f: f64 = TemperatureFahrenheit::from(TemperatureCelsius::from(c)).into();
            assert_eq!(round2(c * 9.0 / 5.0 + 32.0), round2(f));
        }
    }

    #[test]
    fn test_fahrenheit_to_celsius_round_trip() {
        for f in [-40.0, 14.0, 32.0, 68.5, 72.5, 99.9] {
            let c = TemperatureCelsius::from(TemperatureFahrenheit::from(f));
            assert_eq!(round2((f - 32.0) * 5.0 / 9.0), round2(c.into()));

            let back: f64 = TemperatureFahrenheit::from(c).into();
            assert!((back - f).abs() < 0.01, "expected {} got {}", f, back);
        }
    }

    #[test]
    fn test_reading_from_celsius() {
        let r = Reading::from_celsius(&dht22(), Local::now(), 21.0.into(), Humidity::from(50.0)).unwrap();

        assert_eq!(21.0, r.temperature_celsius());
        assert_eq!(69.8, r.temperature_fahrenheit());
        assert_eq!(50.0, r.humidity());
        assert_eq!(Source::Dht22, r.source());
        assert_eq!("raspberry_pi", r.device());
        assert!(r.hvac().is_none());
    }

    #[test]
    fn test_reading_from_fahrenheit() {
        let r = Reading::from_fahrenheit(&ecobee(), Local::now(), 72.5.into(), Humidity::from(40.0)).unwrap();

        assert_eq!(72.5, r.temperature_fahrenheit());
        assert_eq!(22.5, r.temperature_celsius());
        assert_eq!(40.0, r.humidity());
        assert_eq!("smart_thermostat", r.device());
    }

    #[test]
    fn test_reading_rounds_measurements() {
        let r = Reading::from_celsius(&dht22(), Local::now(), 21.456.into(), Humidity::from(48.123)).unwrap();

        assert_eq!(21.46, r.temperature_celsius());
        assert_eq!(70.62, r.temperature_fahrenheit());
        assert_eq!(48.12, r.humidity());
    }

    #[test]
    fn test_reading_json_without_hvac() {
        let r = Reading::from_celsius(&dht22(), Local::now(), 21.0.into(), Humidity::from(50.0)).unwrap();
        let v = serde_json::to_value(&r).unwrap();

        assert_eq!("raspberry_pi_dht22", v["sensor_id"]);
        assert_eq!("bird_cage_window_area", v["location"]);
        assert_eq!("DHT22", v["source"]);
        assert_eq!(69.8, v["temperature_fahrenheit"]);
        assert!(v["timestamp"].is_string());
        assert!(v.get("hvac_mode").is_none());
        assert!(v.get("hvac_action").is_none());
        assert!(v.get("target_temperature").is_none());
    }

    #[test]
    fn test_reading_json_with_hvac() {
        let hvac = HvacStatus {
            hvac_mode: "heat".to_owned(),
            hvac_action: "heating".to_owned(),
            target_temperature: Number::from(70),
        };
        let r = Reading::from_fahrenheit(&ecobee(), Local::now(), 72.5.into(), Humidity::from(40.0))
            .unwrap()
            .with_hvac(hvac);
        let v = serde_json::to_value(&r).unwrap();

        assert_eq!("Ecobee", v["source"]);
        assert_eq!("heat", v["hvac_mode"]);
        assert_eq!("heating", v["hvac_action"]);
        assert_eq!(70, v["target_temperature"]);
        assert!(v["target_temperature"].is_u64());
        assert!(v.get("hvac").is_none());
    }

    #[test]
    fn test_reading_rejects_non_finite() {
        for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let res = Reading::from_fahrenheit(&ecobee(), Local::now(), f.into(), Humidity::from(40.0));
            assert!(matches!(res, Err(ReadingError::NotFinite(_, _))), "accepted {}", f);
        }

        let res = Reading::from_celsius(&dht22(), Local::now(), 21.0.into(), Humidity::from(f64::NAN));
        assert_eq!("humidity", res.unwrap_err().field());
    }

    #[test]
    fn test_reading_rejects_overflow_when_rounding() {
        let res = Reading::from_fahrenheit(&ecobee(), Local::now(), 1e307.into(), Humidity::from(40.0));
        assert_eq!("temperature_celsius", res.unwrap_err().field());
    }
}
