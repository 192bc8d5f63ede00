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

//! Read thermostat state from a Home Assistant hub over its REST API.

mod client;
mod thermostat;

pub use crate::hub::client::{
    EntityState, EntityStates, HttpHubClient, HubError, HubErrorKind, HUB_REQUEST_TIMEOUT,
};
pub use crate::hub::thermostat::{RemoteThermostatReader, ThermostatEntities};
