use super::{validate_inputs, Demographics, EgfrEquation, Gender, Race};
use crate::error::AKIResult;

/// Four-variable MDRD study equation (IDMS-traceable creatinine).
#[derive(Debug, Clone, Copy, Default)]
pub struct Mdrd;

impl EgfrEquation for Mdrd {
    fn estimate(&self, creatinine: f64, demographics: &Demographics) -> AKIResult<f64> {
        validate_inputs(creatinine, demographics)?;

        let mut egfr = 175.0 * creatinine.powf(-1.154) * demographics.age.powf(-0.203);
        if demographics.gender == Gender::Female {
            egfr *= 0.742;
        }
        if demographics.race == Race::Black {
            egfr *= 1.212;
        }

        Ok(egfr)
    }

    fn name(&self) -> &'static str {
        "MDRD"
    }
}
