use crate::{CalibrationPoint, Parameters};

/// Least-squares line through `(x, y)` pairs, returned as `(slope, intercept)`.
///
/// The sums are rearranged as
/// `slope = (Σxy/Σx - Σy/n) / (Σx²/Σx - Σx/n)` and
/// `intercept = Σy/n - slope·Σx/n`. The arrangement is kept as-is because it
/// determines the rounding of the fitted parameters.
///
/// If every `x` is equal, or `Σx` is zero, the result is NaN or infinite.
pub fn linear_fit<I>(pairs: I) -> (f32, f32)
where
    I: IntoIterator<Item = (i32, f32)>,
{
    let mut sum_xy = 0.0f32;
    let mut sum_x = 0i128;
    let mut sum_x2 = 0i128;
    let mut sum_y = 0.0f32;
    let mut n = 0u32;

    for (x, y) in pairs {
        sum_xy += x as f32 * y;
        sum_x += i128::from(x);
        sum_x2 += i128::from(x) * i128::from(x);
        sum_y += y;
        n += 1;
    }

    let n = n as f32;
    let sum_x = sum_x as f32;
    let sum_x2 = sum_x2 as f32;

    let slope = (sum_xy / sum_x - sum_y / n) / (sum_x2 / sum_x - sum_x / n);
    let intercept = sum_y / n - slope * sum_x / n;

    (slope, intercept)
}

/// Fits `ntu = A * exp(alpha * raw)` to `points`.
///
/// The NTU values are log-transformed and fitted with [`linear_fit`]; `A` is
/// `exp(intercept)` and `alpha` is the slope. `points` is only borrowed.
///
/// At least two points with distinct raw values and strictly positive NTU
/// values are required. This is not checked (beyond a `debug_assert!` on
/// the count): a non-positive NTU value or a single repeated raw value
/// produces NaN or infinite parameters rather than an error.
///
/// # Examples
///
/// ```
/// use gravity_turbidity::{fit, CalibrationPoint};
///
/// let parameters = fit(&[
///     CalibrationPoint::new(100, 1.0),
///     CalibrationPoint::new(500, 10.0),
/// ]);
///
/// assert!((parameters.alpha - 0.0057565).abs() < 1e-6);
/// assert!((parameters.a - 0.5623).abs() < 1e-3);
/// ```
pub fn fit(points: &[CalibrationPoint]) -> Parameters {
    debug_assert!(
        points.len() >= 2,
        "At least two calibration points are needed for a fit"
    );

    let (slope, intercept) = linear_fit(points.iter().map(|p| (p.raw, libm::logf(p.ntu))));
    let parameters = Parameters::new(libm::expf(intercept), slope);

    log::debug!(
        "fitted {} points: A = {}, alpha = {}",
        points.len(),
        parameters.a,
        parameters.alpha
    );
    if !parameters.a.is_finite() || !parameters.alpha.is_finite() {
        log::warn!("calibration points are degenerate, fit is not finite");
    } else if !parameters.is_valid() {
        log::warn!("fit produced a zero parameter, model stays uncalibrated");
    }

    parameters
}

/// Fits the model exactly through two points.
pub fn fit_two_point(low: CalibrationPoint, high: CalibrationPoint) -> Parameters {
    fit(&[low, high])
}
