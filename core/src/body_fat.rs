//! US Navy circumference method for body-fat percentage.
//!
//! All measurements are in centimetres:
//! ```text
//! male:   BF% = 495 / (1.0324  - 0.19077 × log10(waist - neck)        + 0.15456 × log10(height)) - 450
//! female: BF% = 495 / (1.29579 - 0.35004 × log10(waist + hips - neck) + 0.221   × log10(height)) - 450
//! ```

use thiserror::Error;

use crate::models::{Sex, is_valid_bf_percent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BodyFatError {
    #[error("hip measurement is required for the female formula")]
    MissingHips,

    #[error("circumference difference and height must be positive")]
    NonPositiveCircumference,

    #[error("measurements do not produce a plausible body-fat percentage")]
    NotComputable,
}

/// Estimate body-fat percentage from circumferences and height (cm).
///
/// `hips` is ignored for men and required for women.
pub fn navy_body_fat(
    neck: f64,
    waist: f64,
    height: f64,
    sex: Sex,
    hips: Option<f64>,
) -> Result<f64, BodyFatError> {
    let (girth, intercept, girth_coeff, height_coeff) = match sex {
        Sex::Male => (waist - neck, 1.0324, 0.19077, 0.15456),
        Sex::Female => {
            let hips = hips.ok_or(BodyFatError::MissingHips)?;
            (waist + hips - neck, 1.29579, 0.35004, 0.221)
        }
    };
    if girth.is_nan() || height.is_nan() || girth <= 0.0 || height <= 0.0 {
        return Err(BodyFatError::NonPositiveCircumference);
    }

    let density = intercept - girth_coeff * girth.log10() + height_coeff * height.log10();
    let bf = 495.0 / density - 450.0;
    if !is_valid_bf_percent(bf) {
        return Err(BodyFatError::NotComputable);
    }
    Ok(bf)
}

/// Lean body mass in the unit of `weight`.
#[must_use]
pub fn lean_body_mass(weight: f64, bf_percent: f64) -> f64 {
    weight * (1.0 - bf_percent / 100.0)
}
