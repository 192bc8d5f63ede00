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

mod core;
mod dht22;
mod reader;
mod simulated;

pub use crate::sensor::core::{
    open_pin, Connector, DataPin, Driver, Sample, SensorError, SensorErrorKind,
};
pub use crate::sensor::dht22::{Dht22Connector, DHT22Sensor};
pub use crate::sensor::reader::PhysicalSensorReader;
pub use crate::sensor::simulated::SimulatedConnector;
