//! Calibration and conversion for analog turbidity sensors.
//!
//! Raw ADC readings are converted to nephelometric turbidity units (NTU)
//! with the model `ntu = A * exp(alpha * raw)`. `A` and `alpha` are fitted
//! from readings taken in samples of known turbidity, and can be stored in
//! an EEPROM slot or printed as hex and typed back in later.
//!
//! # Examples
//!
//! ```
//! use gravity_turbidity::{Config, TurbidityModel};
//!
//! let mut eeprom = [0xFF; 64];
//! let mut model = TurbidityModel::load(Config::new(0), &mut eeprom).unwrap();
//!
//! if !model.is_calibrated() {
//!     model.set_low_calibration_point(100, 1.0);
//!     model.set_high_calibration_point(500, 10.0);
//!     model.calibrate_two_point();
//!     model.save_calibration(&mut eeprom).unwrap();
//! }
//!
//! assert!((model.turbidity(500) - 10.0).abs() < 0.01);
//! ```

#![cfg_attr(not(test), no_std)]

mod export;
mod fit;
mod model;
pub mod storage;

use embedded_hal::adc::{Channel, OneShot};

pub use export::{export, parse_export, parse_hex_word, write_hex, ParseError};
pub use fit::{fit, fit_two_point, linear_fit};
pub use model::{CalibrationPoint, Config, Parameters, TurbidityModel};
pub use storage::{Eeprom, RamError};

type Error<Adc, ADC, Word, Pin> = nb::Error<<Adc as OneShot<ADC, Word, Pin>>::Error>;

/// A turbidity sensor attached to an ADC channel.
#[derive(Debug)]
pub struct TurbiditySensor<Pin> {
    pin: Pin,
    model: TurbidityModel,
}

impl<Pin> TurbiditySensor<Pin> {
    /// Returns a sensor reading from `pin` and converting with `model`.
    ///
    /// # Examples
    ///
    /// ```
    /// use gravity_turbidity::{Config, TurbidityModel, TurbiditySensor};
    /// # use embedded_hal_mock::adc::MockChan0;
    /// #
    /// # let pin = MockChan0 {};
    ///
    /// let sensor = TurbiditySensor::new(pin, TurbidityModel::new(Config::new(0)));
    /// ```
    pub fn new<ADC>(pin: Pin, model: TurbidityModel) -> Self
    where
        Pin: Channel<ADC>,
    {
        Self { pin, model }
    }

    /// Destroys the sensor and returns the `Pin` and the model.
    pub fn free(self) -> (Pin, TurbidityModel) {
        (self.pin, self.model)
    }

    /// Returns the model used for conversion.
    pub fn model(&self) -> &TurbidityModel {
        &self.model
    }

    /// Returns the model mutably, e.g. to calibrate it in place.
    pub fn model_mut(&mut self) -> &mut TurbidityModel {
        &mut self.model
    }

    /// Returns the raw ADC reading.
    pub fn read_raw<Adc, ADC, Word>(
        &mut self,
        adc: &mut Adc,
    ) -> Result<i32, Error<Adc, ADC, Word, Pin>>
    where
        Word: Into<i32>,
        Pin: Channel<ADC>,
        Adc: OneShot<ADC, Word, Pin>,
    {
        Ok(adc.read(&mut self.pin)?.into())
    }

    /// Returns the turbidity (NTU) for the current ADC reading.
    ///
    /// # Examples
    ///
    /// ```
    /// use gravity_turbidity::{CalibrationPoint, Config, TurbidityModel, TurbiditySensor};
    /// # use embedded_hal_mock::adc::{Mock, MockChan0, Transaction};
    /// #
    /// # let expectations: [Transaction<u16>; 1] = [Transaction::read(0, 500)];
    /// # let mut adc = Mock::new(&expectations);
    /// # let pin = MockChan0 {};
    ///
    /// let mut model = TurbidityModel::new(Config::new(0));
    /// model.calibrate(&[
    ///     CalibrationPoint::new(100, 1.0),
    ///     CalibrationPoint::new(500, 10.0),
    /// ]);
    ///
    /// let mut sensor = TurbiditySensor::new(pin, model);
    ///
    /// // A reading of 500 is 10 NTU
    /// let ntu = sensor.read(&mut adc).unwrap();
    /// assert!((ntu - 10.0).abs() < 0.01);
    /// ```
    pub fn read<Adc, ADC, Word>(
        &mut self,
        adc: &mut Adc,
    ) -> Result<f32, Error<Adc, ADC, Word, Pin>>
    where
        Word: Into<i32>,
        Pin: Channel<ADC>,
        Adc: OneShot<ADC, Word, Pin>,
    {
        let raw = self.read_raw(adc)?;
        Ok(self.model.turbidity(raw))
    }

    /// Reads the ADC and uses the reading as the low calibration point for
    /// a sample of `ntu`. Returns the raw reading.
    pub fn sample_low<Adc, ADC, Word>(
        &mut self,
        adc: &mut Adc,
        ntu: f32,
    ) -> Result<i32, Error<Adc, ADC, Word, Pin>>
    where
        Word: Into<i32>,
        Pin: Channel<ADC>,
        Adc: OneShot<ADC, Word, Pin>,
    {
        let raw = self.read_raw(adc)?;
        self.model.set_low_calibration_point(raw, ntu);
        Ok(raw)
    }

    /// Reads the ADC and uses the reading as the high calibration point for
    /// a sample of `ntu`. Returns the raw reading.
    pub fn sample_high<Adc, ADC, Word>(
        &mut self,
        adc: &mut Adc,
        ntu: f32,
    ) -> Result<i32, Error<Adc, ADC, Word, Pin>>
    where
        Word: Into<i32>,
        Pin: Channel<ADC>,
        Adc: OneShot<ADC, Word, Pin>,
    {
        let raw = self.read_raw(adc)?;
        self.model.set_high_calibration_point(raw, ntu);
        Ok(raw)
    }
}
