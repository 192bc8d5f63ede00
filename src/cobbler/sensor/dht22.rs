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

use crate::reading::{Humidity, TemperatureCelsius};
use crate::sensor::core::{open_pin, Connector, DataPin, Driver, Sample, SensorError, SensorErrorKind};
use rppal::gpio::Mode;
use std::fmt::{Debug, Formatter};
use std::thread;
use std::time::Duration;

/// Upper bound on busy-wait iterations for a single low or high phase of the data line.
pub(crate) const MAX_PHASE_CYCLES: u32 = 32_000;
/// The sensor acknowledges the start signal with one low/high pair, then sends 40 bits.
pub(crate) const PULSE_PAIRS: usize = 41;
pub(crate) const DATA_SIZE: usize = 5;

/// Busy-wait iteration counts for the low and high phase of each pulse on the data line.
///
/// Even entries hold low phase counts, odd entries hold high phase counts. The first
/// pair is the sensor acknowledging the start signal and carries no data.
#[derive(Debug)]
struct PulseTrain {
    counts: [u32; PULSE_PAIRS * 2],
}

impl PulseTrain {
    /// Record the length of each low and high phase until all pulses have been seen.
    ///
    /// Fails with a timeout if the line stays in one state for `MAX_PHASE_CYCLES`,
    /// normal phases take somewhere between 50 and 200 iterations.
    fn capture(pin: &dyn DataPin) -> Result<Self, SensorError> {
        let mut counts = [0; PULSE_PAIRS * 2];

        for pair in counts.chunks_exact_mut(2) {
            while pin.is_low() {
                pair[0] += 1;
                if pair[0] >= MAX_PHASE_CYCLES {
                    return Err(SensorError::KindMsg(
                        SensorErrorKind::ReadTimeout,
                        "timeout waiting for low pulse capture",
                    ));
                }
            }

            while pin.is_high() {
                pair[1] += 1;
                if pair[1] >= MAX_PHASE_CYCLES {
                    return Err(SensorError::KindMsg(
                        SensorErrorKind::ReadTimeout,
                        "timeout waiting for high pulse capture",
                    ));
                }
            }
        }

        tracing::trace!(message = "captured low/high pulse counts", counts = ?counts);
        Ok(Self { counts })
    }

    /// Low phase counts of the 40 data pulses.
    fn lows(&self) -> impl ExactSizeIterator<Item = &u32> {
        self.counts.iter().skip(2).step_by(2)
    }

    /// High phase counts of the 40 data pulses. A long high phase is a one bit.
    fn highs(&self) -> impl ExactSizeIterator<Item = &u32> {
        self.counts.iter().skip(3).step_by(2)
    }
}

/// Five bytes sent by the sensor: two of humidity, two of temperature, one checksum.
#[derive(Debug)]
struct Frame {
    bytes: [u8; DATA_SIZE],
}

impl Frame {
    fn decode(pulses: &PulseTrain) -> Result<Self, SensorError> {
        // Low phases are all the same length, so their mean splits short (zero)
        // high phases from long (one) high phases.
        let threshold = pulses.lows().sum::<u32>() / pulses.lows().len() as u32;
        let mut bytes = [0u8; DATA_SIZE];

        for (bit, &count) in pulses.highs().enumerate() {
            let byte = &mut bytes[bit / 8];
            *byte <<= 1;
            if count >= threshold {
                *byte |= 1;
            }
        }

        Self::verify(&bytes)?;
        Ok(Self { bytes })
    }

    /// The last byte must equal the low 8 bits of the sum of the first four.
    fn verify(bytes: &[u8; DATA_SIZE]) -> Result<(), SensorError> {
        let expected = bytes[4];
        let computed = bytes[..4].iter().fold(0u8, |acc, &b| acc.wrapping_add(b));

        tracing::debug!(
            message = "computing checksum for sensor data",
            computed = computed,
            expected = expected
        );

        if computed != expected {
            Err(SensorError::CheckSum(expected, computed))
        } else {
            Ok(())
        }
    }

    /// Humidity and temperature in tenths, temperature uses its top bit as a sign.
    ///
    /// See https://cdn-shop.adafruit.com/datasheets/Digital+humidity+and+temperature+sensor+AM2302.pdf
    fn measurements(&self) -> (TemperatureCelsius, Humidity) {
        let raw_humidity = u16::from_be_bytes([self.bytes[0], self.bytes[1]]);
        let raw_temperature = u16::from_be_bytes([self.bytes[2] & 0b0111_1111, self.bytes[3]]);

        let mut celsius = f64::from(raw_temperature) / 10.0;
        if self.bytes[2] & 0b1000_0000 != 0 {
            celsius = -celsius;
        }

        let temperature = TemperatureCelsius::from(celsius);
        let humidity = Humidity::from(f64::from(raw_humidity) / 10.0);

        tracing::debug!(
            message = "parsed sensor data",
            raw_temperature = raw_temperature,
            raw_humidity = raw_humidity,
            temperature = %temperature,
            humidity = %humidity
        );

        (temperature, humidity)
    }
}

/// Read temperature in degrees celsius and relative humidity from a DHT22 sensor
pub struct DHT22Sensor {
    pin: Box<dyn DataPin + Send + 'static>,
}

impl DHT22Sensor {
    pub fn from_pin<T>(pin: T) -> Self
    where
        T: DataPin + Send + 'static,
    {
        Self { pin: Box::new(pin) }
    }

    /// Wake the sensor: drive the line high, hold it low for at least 1ms so the
    /// sensor notices, then release it high for 20-40us before listening.
    fn start_signal(&mut self) {
        self.pin.set_mode(Mode::Output);
        self.pin.set_high();
        thread::sleep(Duration::from_millis(10));
        self.pin.set_low();
        thread::sleep(Duration::from_millis(20));
        self.pin.set_high();
        thread::sleep(Duration::from_micros(30));
        self.pin.set_mode(Mode::Input);
    }

    /// Read temperature and humidity from the sensor. The DHT22 should not be read
    /// more often than every two seconds.
    pub fn read(&mut self) -> Result<(TemperatureCelsius, Humidity), SensorError> {
        self.start_signal();
        let pulses = PulseTrain::capture(self.pin.as_ref())?;
        let frame = Frame::decode(&pulses)?;
        Ok(frame.measurements())
    }
}

impl Driver for DHT22Sensor {
    fn sample(&mut self) -> Result<Sample, SensorError> {
        let (temperature, humidity) = self.read()?;
        Ok(Sample::new(temperature, humidity))
    }
}

impl Debug for DHT22Sensor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DHT22Sensor").field("pin", &self.pin.pin()).finish()
    }
}

/// Opens the GPIO pin of a DHT22 sensor for the duration of each read.
#[derive(Debug, Clone, Copy)]
pub struct Dht22Connector {
    bcm_pin: u8,
}

impl Dht22Connector {
    pub fn new(bcm_pin: u8) -> Self {
        Self { bcm_pin }
    }
}

impl Connector for Dht22Connector {
    fn connect(&self) -> Result<Box<dyn Driver>, SensorError> {
        let pin = open_pin(self.bcm_pin)?;
        Ok(Box::new(DHT22Sensor::from_pin(pin)))
    }
}

#[cfg(test)]
mod test {
    use super::{Frame, PulseTrain, DHT22Sensor};
    use crate::reading::{Humidity, TemperatureCelsius};
    use crate::sensor::core::{Driver, SensorError, SensorErrorKind};
    use crate::sensor::test::{EncodingPin, SilentPin, StuckPin, DATASHEET_FRAME};

    #[test]
    fn test_capture_timeout() {
        let res = PulseTrain::capture(&StuckPin);
        assert_eq!(SensorErrorKind::ReadTimeout, res.unwrap_err().kind());
    }

    #[test]
    fn test_capture_silent_line() {
        let pulses = PulseTrain::capture(&SilentPin).unwrap();
        assert!(pulses.highs().all(|&c| c == 0));
        assert_eq!(40, pulses.lows().len());
    }

    #[test]
    fn test_verify_valid() {
        assert!(Frame::verify(&DATASHEET_FRAME).is_ok());
    }

    #[test]
    fn test_verify_invalid() {
        let mut bytes = DATASHEET_FRAME;
        bytes[4] = 0;

        match Frame::verify(&bytes).unwrap_err() {
            SensorError::CheckSum(expected, got) => {
                assert_eq!(0, expected);
                assert_eq!(0b1110_1110, got);
            }
            e => panic!("unexpected error: {:?}", e),
        }
    }

    #[test]
    fn test_verify_wraps_sum() {
        let bytes = [0xFF, 0xFF, 0x01, 0x03, 0x02];
        assert!(Frame::verify(&bytes).is_ok());
    }

    #[test]
    fn test_measurements_positive() {
        let (t, h) = Frame { bytes: DATASHEET_FRAME }.measurements();

        assert_eq!(TemperatureCelsius::from(35.1), t);
        assert_eq!(Humidity::from(65.2), h);
    }

    #[test]
    fn test_measurements_negative() {
        let bytes = [0b0000_0010, 0b1000_1100, 0b1000_0000, 0b0110_0101, 0];
        let (t, h) = Frame { bytes }.measurements();

        assert_eq!(TemperatureCelsius::from(-10.1), t);
        assert_eq!(Humidity::from(65.2), h);
    }

    #[test]
    fn test_sensor_sample_valid() {
        let mut sensor = DHT22Sensor::from_pin(EncodingPin::new(DATASHEET_FRAME));
        let sample = sensor.sample().unwrap();

        assert_eq!(Some(TemperatureCelsius::from(35.1)), sample.temperature);
        assert_eq!(Some(Humidity::from(65.2)), sample.humidity);
    }

    #[test]
    fn test_sensor_sample_bad_checksum() {
        let mut bytes = DATASHEET_FRAME;
        bytes[4] = 0;

        let mut sensor = DHT22Sensor::from_pin(EncodingPin::new(bytes));
        let res = sensor.sample();

        assert_eq!(SensorErrorKind::Checksum, res.unwrap_err().kind());
    }
}
