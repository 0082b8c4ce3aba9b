use super::{validate_inputs, Demographics, EgfrEquation, Gender};
use crate::error::AKIResult;

/// CKD-EPI creatinine equation refit without the race term (2021).
#[derive(Debug, Clone, Copy, Default)]
pub struct CkdEpi2021;

impl EgfrEquation for CkdEpi2021 {
    fn estimate(&self, creatinine: f64, demographics: &Demographics) -> AKIResult<f64> {
        validate_inputs(creatinine, demographics)?;

        let (kappa, alpha, sex_factor) = match demographics.gender {
            Gender::Female => (0.7, -0.241, 1.012),
            Gender::Male => (0.9, -0.302, 1.0),
        };
        let ratio = creatinine / kappa;

        let egfr = 142.0
            * ratio.min(1.0).powf(alpha)
            * ratio.max(1.0).powf(-1.200)
            * 0.9938_f64.powf(demographics.age)
            * sex_factor;

        Ok(egfr)
    }

    fn name(&self) -> &'static str {
        "CKD-EPI 2021"
    }
}
