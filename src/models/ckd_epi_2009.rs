use super::{validate_inputs, Demographics, EgfrEquation, Gender, Race};
use crate::error::AKIResult;

/// CKD-EPI creatinine equation (2009), with race coefficient.
#[derive(Debug, Clone, Copy, Default)]
pub struct CkdEpi2009;

impl CkdEpi2009 {
    fn sex_constants(gender: Gender) -> (f64, f64, f64) {
        // (kappa, alpha, multiplier)
        match gender {
            Gender::Female => (0.7, -0.329, 1.018),
            Gender::Male => (0.9, -0.411, 1.0),
        }
    }
}

impl EgfrEquation for CkdEpi2009 {
    fn estimate(&self, creatinine: f64, demographics: &Demographics) -> AKIResult<f64> {
        validate_inputs(creatinine, demographics)?;

        let (kappa, alpha, sex_factor) = Self::sex_constants(demographics.gender);
        let ratio = creatinine / kappa;
        let race_factor = match demographics.race {
            Race::Black => 1.159,
            Race::Other => 1.0,
        };

        let egfr = 141.0
            * ratio.min(1.0).powf(alpha)
            * ratio.max(1.0).powf(-1.209)
            * 0.993_f64.powf(demographics.age)
            * sex_factor
            * race_factor;

        Ok(egfr)
    }

    fn name(&self) -> &'static str {
        "CKD-EPI 2009"
    }
}
