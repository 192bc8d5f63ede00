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

use crate::reading::{round2, Humidity, TemperatureCelsius};
use crate::sensor::core::{Connector, Driver, Sample, SensorError};
use rand::Rng;

const BASE_CELSIUS: f64 = 20.0;
const CELSIUS_SPREAD: f64 = 3.0;
const BASE_HUMIDITY: f64 = 45.0;
const HUMIDITY_SPREAD: f64 = 5.0;

/// Stand-in for a physical sensor, used when running without hardware.
///
/// Readings wobble randomly around 20c and 45% relative humidity. Readings from
/// this connector must be labelled `Source::Simulated` so they can't be mistaken
/// for real measurements downstream.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedConnector;

impl Connector for SimulatedConnector {
    fn connect(&self) -> Result<Box<dyn Driver>, SensorError> {
        Ok(Box::new(SimulatedDriver))
    }
}

#[derive(Debug)]
struct SimulatedDriver;

impl Driver for SimulatedDriver {
    fn sample(&mut self) -> Result<Sample, SensorError> {
        let mut rng = rand::thread_rng();
        let celsius = round2(BASE_CELSIUS + rng.gen_range(-CELSIUS_SPREAD..=CELSIUS_SPREAD));
        let humidity = round2(BASE_HUMIDITY + rng.gen_range(-HUMIDITY_SPREAD..=HUMIDITY_SPREAD));

        tracing::debug!(message = "generated simulated sample", celsius = celsius, humidity = humidity);
        Ok(Sample::new(TemperatureCelsius::from(celsius), Humidity::from(humidity)))
    }
}

#[cfg(test)]
mod test {
    use super::SimulatedConnector;
    use crate::sensor::core::Connector;

    #[test]
    fn test_simulated_within_bounds() {
        let connector = SimulatedConnector;

        for _ in 0..100 {
            let sample = connector.connect().unwrap().sample().unwrap();
            let celsius: f64 = sample.temperature.unwrap().into();
            let humidity: f64 = sample.humidity.unwrap().into();

            assert!((17.0..=23.0).contains(&celsius), "celsius out of range: {}", celsius);
            assert!((40.0..=50.0).contains(&humidity), "humidity out of range: {}", humidity);
        }
    }
}
