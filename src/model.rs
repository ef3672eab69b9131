use crate::{
    export::export,
    fit::{fit, fit_two_point},
    storage::{self, Eeprom, SLOT_SIZE},
};
use core::fmt;

/// A raw ADC reading taken while the sensor was in a sample of known
/// turbidity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPoint {
    pub raw: i32,
    /// Known turbidity (NTU). Must be strictly positive to be fitted.
    pub ntu: f32,
}

impl CalibrationPoint {
    /// Returns a point pairing `raw` with a known turbidity of `ntu`.
    pub const fn new(raw: i32, ntu: f32) -> Self {
        Self { raw, ntu }
    }
}

/// Parameters of the model `ntu = a * exp(alpha * raw)`.
///
/// The `(0, 0)` pair marks a model that has not been calibrated. A pair is
/// valid only if both parameters are non-zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameters {
    pub a: f32,
    pub alpha: f32,
}

impl Parameters {
    pub const UNCALIBRATED: Self = Self { a: 0.0, alpha: 0.0 };

    /// Returns the parameter pair `(a, alpha)`.
    pub const fn new(a: f32, alpha: f32) -> Self {
        Self { a, alpha }
    }

    /// Returns `true` if neither parameter is zero.
    pub fn is_valid(&self) -> bool {
        self.a != 0.0 && self.alpha != 0.0
    }

    /// Evaluates the model at `raw`.
    ///
    /// Large `alpha * raw` products overflow to infinity or underflow to
    /// zero; that is the behavior of the model, not an error.
    pub fn evaluate(&self, raw: i32) -> f32 {
        self.a * libm::expf(self.alpha * raw as f32)
    }

    /// Reinterprets two IEEE-754 single precision bit patterns.
    pub fn from_bits(a: u32, alpha: u32) -> Self {
        Self::new(f32::from_bits(a), f32::from_bits(alpha))
    }

    /// Returns the IEEE-754 bit patterns of `(a, alpha)`.
    pub fn to_bits(&self) -> (u32, u32) {
        (self.a.to_bits(), self.alpha.to_bits())
    }

    /// Storage image: `a` then `alpha`, each in native byte order.
    pub fn to_bytes(&self) -> [u8; SLOT_SIZE] {
        let mut bytes = [0; SLOT_SIZE];
        bytes[..4].copy_from_slice(&self.a.to_ne_bytes());
        bytes[4..].copy_from_slice(&self.alpha.to_ne_bytes());
        bytes
    }

    /// Inverse of [`to_bytes`](Parameters::to_bytes).
    pub fn from_bytes(bytes: [u8; SLOT_SIZE]) -> Self {
        let (a, alpha) = Self::split_bytes(&bytes);
        Self::new(f32::from_ne_bytes(a), f32::from_ne_bytes(alpha))
    }

    pub(crate) fn split_bytes(bytes: &[u8; SLOT_SIZE]) -> ([u8; 4], [u8; 4]) {
        let mut a = [0; 4];
        let mut alpha = [0; 4];
        a.copy_from_slice(&bytes[..4]);
        alpha.copy_from_slice(&bytes[4..]);
        (a, alpha)
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::UNCALIBRATED
    }
}

/// Configuration for a `TurbidityModel`.
///
/// - `device`: Index of the sensor; selects the 8-byte storage slot at `device * 8`
/// - `low`, `high`: The designated points used by
///   [`calibrate_two_point`](TurbidityModel::calibrate_two_point)
///
/// # Examples
///
/// ```
/// use gravity_turbidity::{CalibrationPoint, Config};
///
/// let config = Config {
///     device: 1,
///     low: CalibrationPoint::new(180, 1.0),    // clear water
///     high: CalibrationPoint::new(750, 400.0), // 400 NTU standard
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub device: usize,
    pub low: CalibrationPoint,
    pub high: CalibrationPoint,
}

impl Config {
    /// Configuration for `device` with both calibration points unset.
    pub const fn new(device: usize) -> Self {
        Self {
            device,
            low: CalibrationPoint::new(0, 0.0),
            high: CalibrationPoint::new(0, 0.0),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Converts raw readings to turbidity and manages the calibration.
#[derive(Debug, Clone)]
pub struct TurbidityModel {
    device: usize,
    parameters: Parameters,
    low: CalibrationPoint,
    high: CalibrationPoint,
}

impl TurbidityModel {
    /// Returns an uncalibrated model using `config`.
    pub fn new(config: Config) -> Self {
        Self {
            device: config.device,
            parameters: Parameters::UNCALIBRATED,
            low: config.low,
            high: config.high,
        }
    }

    /// Returns a model using `config`, calibrated from `eeprom` if its slot
    /// holds a calibration.
    ///
    /// # Examples
    ///
    /// ```
    /// use gravity_turbidity::{Config, TurbidityModel};
    ///
    /// let mut eeprom = [0xFF; 64];
    ///
    /// let model = TurbidityModel::load(Config::new(2), &mut eeprom).unwrap();
    /// assert!(!model.is_calibrated());
    /// ```
    pub fn load<E>(config: Config, eeprom: &mut E) -> Result<Self, E::Error>
    where
        E: Eeprom + ?Sized,
    {
        let mut model = Self::new(config);
        model.load_calibration(eeprom)?;
        Ok(model)
    }

    /// Returns the device index selecting the storage slot.
    pub fn device(&self) -> usize {
        self.device
    }

    /// Returns the current parameters.
    pub fn parameters(&self) -> Parameters {
        self.parameters
    }

    /// Returns `true` if the current parameters are both non-zero.
    pub fn is_calibrated(&self) -> bool {
        self.parameters.is_valid()
    }

    /// Returns the low designated calibration point.
    pub fn low_point(&self) -> CalibrationPoint {
        self.low
    }

    /// Returns the high designated calibration point.
    pub fn high_point(&self) -> CalibrationPoint {
        self.high
    }

    /// Returns the turbidity (NTU) for `raw` using the current parameters.
    pub fn turbidity(&self, raw: i32) -> f32 {
        self.parameters.evaluate(raw)
    }

    /// Returns the turbidity (NTU) for `raw` using the given parameters,
    /// e.g. to check a candidate calibration before installing it.
    pub fn turbidity_with(a: f32, alpha: f32, raw: i32) -> f32 {
        Parameters::new(a, alpha).evaluate(raw)
    }

    /// Sets the low designated calibration point. Its ordering relative to
    /// the high point is not checked.
    pub fn set_low_calibration_point(&mut self, raw: i32, ntu: f32) {
        self.low = CalibrationPoint::new(raw, ntu);
    }

    /// Sets the high designated calibration point.
    pub fn set_high_calibration_point(&mut self, raw: i32, ntu: f32) {
        self.high = CalibrationPoint::new(raw, ntu);
    }

    /// Fits the model to `points` and installs the result.
    ///
    /// See [`fit`](fn@crate::fit) for the requirements on `points`.
    ///
    /// # Examples
    ///
    /// ```
    /// use gravity_turbidity::{CalibrationPoint, Config, TurbidityModel};
    ///
    /// let mut model = TurbidityModel::new(Config::new(0));
    ///
    /// model.calibrate(&[
    ///     CalibrationPoint::new(100, 1.0),
    ///     CalibrationPoint::new(300, 3.2),
    ///     CalibrationPoint::new(500, 10.0),
    /// ]);
    ///
    /// assert!(model.is_calibrated());
    /// assert!((model.turbidity(500) - 10.0).abs() < 0.1);
    /// ```
    pub fn calibrate(&mut self, points: &[CalibrationPoint]) -> Parameters {
        self.parameters = fit(points);
        self.parameters
    }

    /// Fits the model exactly through the low and high designated points
    /// and installs the result.
    pub fn calibrate_two_point(&mut self) -> Parameters {
        self.parameters = fit_two_point(self.low, self.high);
        self.parameters
    }

    /// Writes the current parameters in hex form to `out`.
    ///
    /// Returns `Ok(false)` after writing an "incomplete" notice if the model
    /// is not calibrated.
    ///
    /// # Examples
    ///
    /// ```
    /// use gravity_turbidity::{Config, TurbidityModel};
    ///
    /// let mut model = TurbidityModel::new(Config::new(0));
    /// model.import_calibration(0x3f800000, 0x3b03126f);
    ///
    /// let mut out = String::new();
    /// assert_eq!(model.export_calibration(&mut out), Ok(true));
    /// assert_eq!(out, "A (float): 0x3f800000\nalpha (float): 0x3b03126f\n");
    /// ```
    pub fn export_calibration<W>(&self, out: &mut W) -> Result<bool, fmt::Error>
    where
        W: fmt::Write + ?Sized,
    {
        let exported = export(out, &self.parameters)?;
        if !exported {
            log::warn!("device {}: calibration incomplete, nothing exported", self.device);
        }
        Ok(exported)
    }

    /// Installs parameters from their IEEE-754 bit patterns, as printed by
    /// [`export_calibration`](TurbidityModel::export_calibration).
    pub fn import_calibration(&mut self, a_bits: u32, alpha_bits: u32) {
        self.parameters = Parameters::from_bits(a_bits, alpha_bits);
        log::info!(
            "device {}: imported A = {}, alpha = {}",
            self.device,
            self.parameters.a,
            self.parameters.alpha
        );
    }

    /// Reads the calibration stored in this device's slot.
    ///
    /// Returns `Ok(false)` without changing the model if either stored
    /// parameter is erased (`0xFFFFFFFF`).
    pub fn load_calibration<E>(&mut self, eeprom: &mut E) -> Result<bool, E::Error>
    where
        E: Eeprom + ?Sized,
    {
        let bytes = storage::read_slot(eeprom, self.device)?;
        if storage::is_blank(&bytes) {
            log::debug!("device {}: no stored calibration", self.device);
            return Ok(false);
        }

        self.parameters = Parameters::from_bytes(bytes);
        log::info!(
            "device {}: loaded A = {}, alpha = {}",
            self.device,
            self.parameters.a,
            self.parameters.alpha
        );
        Ok(true)
    }

    /// Stores the current calibration in this device's slot.
    ///
    /// Returns `Ok(false)` without writing if the model is not calibrated.
    ///
    /// # Examples
    ///
    /// ```
    /// use gravity_turbidity::{Config, TurbidityModel};
    ///
    /// let mut eeprom = [0xFF; 64];
    /// let mut model = TurbidityModel::new(Config::new(1));
    ///
    /// assert_eq!(model.save_calibration(&mut eeprom), Ok(false));
    ///
    /// model.import_calibration(0x3f800000, 0x3b03126f);
    /// assert_eq!(model.save_calibration(&mut eeprom), Ok(true));
    ///
    /// let restored = TurbidityModel::load(Config::new(1), &mut eeprom).unwrap();
    /// assert_eq!(restored.parameters(), model.parameters());
    /// ```
    pub fn save_calibration<E>(&self, eeprom: &mut E) -> Result<bool, E::Error>
    where
        E: Eeprom + ?Sized,
    {
        if !self.is_calibrated() {
            log::warn!("device {}: calibration incomplete, not saved", self.device);
            return Ok(false);
        }

        storage::write_slot(eeprom, self.device, &self.parameters.to_bytes())?;
        log::info!("device {}: calibration saved", self.device);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{slot_offset, RamError};

    fn model(device: usize) -> TurbidityModel {
        TurbidityModel::new(Config::new(device))
    }

    fn calibrated(device: usize) -> TurbidityModel {
        let mut model = model(device);
        model.calibrate(&[
            CalibrationPoint::new(100, 1.0),
            CalibrationPoint::new(500, 10.0),
        ]);
        model
    }

    #[test]
    fn starts_uncalibrated() {
        let model = model(0);

        assert_eq!(model.parameters(), Parameters::UNCALIBRATED);
        assert_eq!(model.parameters().a, 0.0);
        assert_eq!(model.parameters().alpha, 0.0);
        assert!(!model.is_calibrated());
    }

    #[test]
    fn uncalibrated_export() {
        let mut out = String::new();

        assert_eq!(model(0).export_calibration(&mut out), Ok(false));
        assert_eq!(out, "[export] Calibration incomplete.\n");
    }

    #[test]
    fn uncalibrated_save_writes_nothing() {
        let mut eeprom = [0xFF; 32];

        assert_eq!(model(1).save_calibration(&mut eeprom), Ok(false));
        assert_eq!(eeprom, [0xFF; 32]);
    }

    #[test]
    fn calibrates_from_points() {
        let model = calibrated(0);

        assert!(model.is_calibrated());
        assert!((model.parameters().alpha - 0.005_756_5).abs() < 1e-6);
        assert!((model.parameters().a - 0.562_3).abs() < 1e-3);
        assert!((model.turbidity(100) - 1.0).abs() < 1e-3);
        assert!((model.turbidity(500) - 10.0).abs() < 1e-2);
    }

    #[test]
    fn calibrates_from_designated_points() {
        let mut model = model(0);
        model.set_low_calibration_point(100, 1.0);
        model.set_high_calibration_point(500, 10.0);

        assert_eq!(model.low_point(), CalibrationPoint::new(100, 1.0));
        assert_eq!(model.high_point(), CalibrationPoint::new(500, 10.0));
        assert_eq!(model.calibrate_two_point(), calibrated(0).parameters());
    }

    #[test]
    fn designated_points_from_config() {
        let mut model = TurbidityModel::new(Config {
            device: 3,
            low: CalibrationPoint::new(100, 1.0),
            high: CalibrationPoint::new(500, 10.0),
        });

        assert_eq!(model.device(), 3);
        assert_eq!(model.calibrate_two_point(), calibrated(0).parameters());
    }

    #[test]
    fn designated_points_in_any_order() {
        let mut model = model(0);
        model.set_low_calibration_point(500, 10.0);
        model.set_high_calibration_point(100, 1.0);

        let parameters = model.calibrate_two_point();
        assert!((parameters.alpha - 0.005_756_5).abs() < 1e-6);
        assert!((parameters.a - 0.562_3).abs() < 1e-3);
    }

    #[test]
    fn turbidity_with_given_parameters() {
        assert_eq!(TurbidityModel::turbidity_with(2.0, 0.0, 1234), 2.0);
        let e = TurbidityModel::turbidity_with(1.0, 0.01, 100);
        assert!((e - core::f32::consts::E).abs() < 1e-5);
        assert_eq!(
            TurbidityModel::turbidity_with(0.5, 0.004, 250),
            Parameters::new(0.5, 0.004).evaluate(250)
        );
    }

    #[test]
    fn turbidity_extremes_are_not_errors() {
        assert_eq!(TurbidityModel::turbidity_with(1.0, 1.0, 1000), f32::INFINITY);
        assert_eq!(TurbidityModel::turbidity_with(1.0, -1.0, 1000), 0.0);
    }

    #[test]
    fn imports_bits() {
        let mut model = model(0);
        model.import_calibration(0x3f80_0000, 0xbf00_0000);

        assert_eq!(model.parameters(), Parameters::new(1.0, -0.5));
        assert!(model.is_calibrated());
    }

    #[test]
    fn import_of_zero_is_uncalibrated() {
        let mut model = calibrated(0);
        model.import_calibration(0x3f80_0000, 0);

        assert!(!model.is_calibrated());
    }

    #[test]
    fn exports_one() {
        let mut model = model(0);
        model.import_calibration(1.0f32.to_bits(), 0x3b03_126f);

        let mut out = String::new();
        assert_eq!(model.export_calibration(&mut out), Ok(true));
        assert!(out.starts_with("A (float): 0x3f800000\n"));
    }

    #[test]
    fn export_import_round_trip() {
        let original = calibrated(0);
        let mut out = String::new();
        original.export_calibration(&mut out).unwrap();

        let (a, alpha) = crate::parse_export(&out).unwrap().to_bits();
        let mut restored = model(0);
        restored.import_calibration(a, alpha);

        assert_eq!(restored.parameters(), original.parameters());
    }

    #[test]
    fn save_load_round_trip() {
        let mut eeprom = [0xFF; 32];
        let model = calibrated(2);

        assert_eq!(model.save_calibration(&mut eeprom), Ok(true));

        let restored = TurbidityModel::load(Config::new(2), &mut eeprom).unwrap();
        assert!(restored.is_calibrated());
        assert_eq!(restored.parameters().to_bits(), model.parameters().to_bits());
    }

    #[test]
    fn saves_to_device_slot() {
        let mut eeprom = [0xFF; 32];
        let model = calibrated(1);
        model.save_calibration(&mut eeprom).unwrap();

        let offset = slot_offset(1);
        assert_eq!(eeprom[..offset], [0xFF; 8]);
        assert_eq!(eeprom[offset..offset + 8], model.parameters().to_bytes());
        assert_eq!(eeprom[offset + 8..], [0xFF; 16]);
        assert_eq!(eeprom[offset..offset + 4], model.parameters().a.to_ne_bytes());
    }

    #[test]
    fn devices_use_separate_slots() {
        let mut eeprom = [0xFF; 32];
        calibrated(0).save_calibration(&mut eeprom).unwrap();

        let mut other = model(1);
        other.import_calibration(0x4000_0000, 0x3f00_0000);
        other.save_calibration(&mut eeprom).unwrap();

        let first = TurbidityModel::load(Config::new(0), &mut eeprom).unwrap();
        let second = TurbidityModel::load(Config::new(1), &mut eeprom).unwrap();
        assert_eq!(first.parameters(), calibrated(0).parameters());
        assert_eq!(second.parameters(), Parameters::new(2.0, 0.5));
    }

    #[test]
    fn blank_slot_leaves_parameters() {
        let mut eeprom = [0xFF; 32];
        let mut model = calibrated(0);
        let before = model.parameters();

        assert_eq!(model.load_calibration(&mut eeprom), Ok(false));
        assert_eq!(model.parameters(), before);
    }

    #[test]
    fn half_blank_slot_is_blank() {
        let mut eeprom = [0xFF; 16];
        eeprom[..4].copy_from_slice(&1.0f32.to_ne_bytes());

        let mut model = model(0);
        assert_eq!(model.load_calibration(&mut eeprom), Ok(false));
        assert!(!model.is_calibrated());
    }

    #[test]
    fn storage_errors_propagate() {
        let mut eeprom = [0xFF; 12];
        let mut model = calibrated(1);
        let before = model.parameters();

        assert_eq!(
            model.load_calibration(&mut eeprom),
            Err(RamError::OutOfRange { address: 12 })
        );
        assert_eq!(model.parameters(), before);
        assert!(model.save_calibration(&mut eeprom).is_err());
        assert!(TurbidityModel::load(Config::new(1), &mut eeprom).is_err());
    }
}
