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

use std::error::Error;
use std::fmt::{self, Formatter};

use rppal::gpio::{Gpio, IoPin, Mode};

use crate::reading::{Humidity, TemperatureCelsius};

/// Kinds of errors encountered opening or reading a GPIO attached sensor
#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub enum SensorErrorKind {
    Initialization,
    ReadTimeout,
    Checksum,
}

impl SensorErrorKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            SensorErrorKind::Initialization => "initialization",
            SensorErrorKind::ReadTimeout => "timeout",
            SensorErrorKind::Checksum => "checksum",
        }
    }

    /// True for faults where the next read is expected to succeed: a garbled or
    /// slow transmission from the sensor rather than a problem with the GPIO setup.
    pub fn is_transient(&self) -> bool {
        matches!(self, SensorErrorKind::ReadTimeout | SensorErrorKind::Checksum)
    }
}

/// Error opening or reading a sensor via a GPIO pin
#[derive(Debug)]
pub enum SensorError {
    CheckSum(u8, u8),
    KindMsg(SensorErrorKind, &'static str),
    KindMsgCause(SensorErrorKind, &'static str, Box<dyn Error + Send + Sync>),
}

impl SensorError {
    pub fn kind(&self) -> SensorErrorKind {
        match self {
            SensorError::CheckSum(_, _) => SensorErrorKind::Checksum,
            SensorError::KindMsg(kind, _) => *kind,
            SensorError::KindMsgCause(kind, _, _) => *kind,
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::CheckSum(expected, got) => {
                write!(f, "checksum error: expected {}, got {}", expected, got)
            }
            SensorError::KindMsg(_, msg) => msg.fmt(f),
            SensorError::KindMsgCause(_, msg, ref e) => write!(f, "{}: {}", msg, e),
        }
    }
}

impl Error for SensorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SensorError::KindMsgCause(_, _, ref e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Open an `IoPin` for the BCM GPIO pin number of the data wire of a sensor.
///
/// The pin is reset to its original mode when the returned `IoPin` is dropped.
/// Note that the BCM GPIO pin number is NOT the same as the physical pin number.
/// See [pinout] for more information.
///
/// [pinout]: https://www.raspberrypi.com/documentation/computers/os.html#gpio-and-the-40-pin-header
pub fn open_pin(bcm_gpio_pin: u8) -> Result<IoPin, SensorError> {
    let controller = Gpio::new().map_err(|e| {
        SensorError::KindMsgCause(
            SensorErrorKind::Initialization,
            "unable to create GPIO controller",
            Box::new(e),
        )
    })?;

    let pin = controller.get(bcm_gpio_pin).map_err(|e| {
        SensorError::KindMsgCause(
            SensorErrorKind::Initialization,
            "unable to acquire pin from controller",
            Box::new(e),
        )
    })?;

    Ok(pin.into_io(Mode::Input))
}

/// Abstraction around an `rppal::gpio::IoPin` so the wire protocol can be tested
/// without hardware.
pub trait DataPin {
    fn is_low(&self) -> bool;
    fn is_high(&self) -> bool;
    fn pin(&self) -> u8;
    fn set_high(&mut self);
    fn set_low(&mut self);
    fn set_mode(&mut self, mode: Mode);
}

impl DataPin for IoPin {
    fn is_low(&self) -> bool {
        IoPin::is_low(self)
    }

    fn is_high(&self) -> bool {
        IoPin::is_high(self)
    }

    fn pin(&self) -> u8 {
        IoPin::pin(self)
    }

    fn set_high(&mut self) {
        IoPin::set_high(self);
    }

    fn set_low(&mut self) {
        IoPin::set_low(self);
    }

    fn set_mode(&mut self, mode: Mode) {
        IoPin::set_mode(self, mode);
    }
}

/// Raw values from a single sensor read. Either value may be unset when the
/// driver could only make sense of part of a transmission.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Sample {
    pub temperature: Option<TemperatureCelsius>,
    pub humidity: Option<Humidity>,
}

impl Sample {
    pub fn new(temperature: TemperatureCelsius, humidity: Humidity) -> Self {
        Self {
            temperature: Some(temperature),
            humidity: Some(humidity),
        }
    }
}

/// An open connection to a temperature and humidity sensor.
///
/// Holding a `Driver` means holding exclusive access to the underlying hardware.
/// Access is released when the driver is dropped.
pub trait Driver: Send {
    fn sample(&mut self) -> Result<Sample, SensorError>;
}

/// Opens a fresh `Driver` for each read.
pub trait Connector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Driver>, SensorError>;
}

#[cfg(test)]
mod test {
    use super::{SensorError, SensorErrorKind};
    use std::error::Error;
    use std::io;

    #[test]
    fn test_transient_kinds() {
        assert!(SensorErrorKind::ReadTimeout.is_transient());
        assert!(SensorErrorKind::Checksum.is_transient());
        assert!(!SensorErrorKind::Initialization.is_transient());
    }

    #[test]
    fn test_error_display_and_source() {
        let e = SensorError::KindMsgCause(
            SensorErrorKind::Initialization,
            "unable to create GPIO controller",
            Box::new(io::Error::new(io::ErrorKind::PermissionDenied, "/dev/gpiomem")),
        );

        assert_eq!("unable to create GPIO controller: /dev/gpiomem", e.to_string());
        assert!(e.source().is_some());
        assert_eq!("checksum error: expected 1, got 2", SensorError::CheckSum(1, 2).to_string());
    }
}
