//! Human-readable hex form of a calibration.
//!
//! A calibration is written as two lines holding the IEEE-754 single
//! precision bit pattern of each parameter, most significant byte first:
//!
//! ```text
//! A (float): 0x3f800000
//! alpha (float): 0x3b03126f
//! ```

use crate::Parameters;
use core::fmt::{self, Write};

const A_LABEL: &str = "A (float): ";
const ALPHA_LABEL: &str = "alpha (float): ";
const INCOMPLETE: &str = "[export] Calibration incomplete.";

/// Writes the bit pattern of `value` as `0x` and eight hex digits, followed
/// by a newline.
pub fn write_hex<W: Write + ?Sized>(out: &mut W, value: f32) -> fmt::Result {
    writeln!(out, "0x{:08x}", value.to_bits())
}

/// Writes `parameters` in hex form to `out`.
///
/// Returns `Ok(false)` and writes only the incomplete notice if `parameters`
/// is the uncalibrated pair.
pub fn export<W: Write + ?Sized>(
    out: &mut W,
    parameters: &Parameters,
) -> Result<bool, fmt::Error> {
    if !parameters.is_valid() {
        writeln!(out, "{}", INCOMPLETE)?;
        return Ok(false);
    }

    out.write_str(A_LABEL)?;
    write_hex(out, parameters.a)?;
    out.write_str(ALPHA_LABEL)?;
    write_hex(out, parameters.alpha)?;

    Ok(true)
}

/// Error returned by [`parse_export`] and [`parse_hex_word`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// No `A (float):` line was found.
    MissingA,
    /// No `alpha (float):` line was found.
    MissingAlpha,
    /// A value is not a 32-bit hex number.
    InvalidHex,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MissingA => f.write_str("missing A line"),
            ParseError::MissingAlpha => f.write_str("missing alpha line"),
            ParseError::InvalidHex => f.write_str("invalid 32-bit hex value"),
        }
    }
}

/// Parses a 32-bit hex number, with or without a `0x` prefix.
pub fn parse_hex_word(text: &str) -> Result<u32, ParseError> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParseError::InvalidHex);
    }

    u32::from_str_radix(digits, 16).map_err(|_| ParseError::InvalidHex)
}

/// Parses the text written by [`export`] back into parameters.
///
/// Lines other than the two labelled ones are ignored.
///
/// # Examples
///
/// ```
/// use gravity_turbidity::parse_export;
///
/// let parameters = parse_export("A (float): 0x3f800000\nalpha (float): 0x3b03126f\n").unwrap();
///
/// assert_eq!(parameters.a, 1.0);
/// assert_eq!(parameters.alpha.to_bits(), 0x3b03126f);
/// ```
pub fn parse_export(text: &str) -> Result<Parameters, ParseError> {
    let mut a = None;
    let mut alpha = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix(A_LABEL.trim_end()) {
            a = Some(parse_hex_word(value)?);
        } else if let Some(value) = line.strip_prefix(ALPHA_LABEL.trim_end()) {
            alpha = Some(parse_hex_word(value)?);
        }
    }

    let a = a.ok_or(ParseError::MissingA)?;
    let alpha = alpha.ok_or(ParseError::MissingAlpha)?;

    Ok(Parameters::from_bits(a, alpha))
}
