pub mod ckd_epi_2009;
pub mod ckd_epi_2021;
pub mod mdrd;

use crate::config::EquationKind;
use crate::error::{AKIError, AKIResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Estimates glomerular filtration rate (mL/min/1.73m²) from serum creatinine
/// (mg/dL) and demographics.
pub trait EgfrEquation: Send + Sync {
    fn estimate(&self, creatinine: f64, demographics: &Demographics) -> AKIResult<f64>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: f64,
    pub gender: Gender,
    pub race: Race,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// Only the race coefficient of the older equations needs a distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Race {
    Black,
    Other,
}

impl FromStr for Gender {
    type Err = AKIError;

    fn from_str(s: &str) -> AKIResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "male" | "man" => Ok(Gender::Male),
            "f" | "female" | "woman" => Ok(Gender::Female),
            other => Err(AKIError::Validation(format!("Unknown gender: {:?}", other))),
        }
    }
}

impl FromStr for Race {
    type Err = AKIError;

    fn from_str(s: &str) -> AKIResult<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(AKIError::Validation("Race is empty".to_string()));
        }
        if normalized == "b" || normalized.contains("black") || normalized.contains("african") {
            Ok(Race::Black)
        } else {
            Ok(Race::Other)
        }
    }
}

/// Shared domain check for every equation.
pub(crate) fn validate_inputs(creatinine: f64, demographics: &Demographics) -> AKIResult<()> {
    if !creatinine.is_finite() || creatinine <= 0.0 {
        return Err(AKIError::Egfr(
            format!("Creatinine must be positive, got {}", creatinine)
        ));
    }
    if !demographics.age.is_finite() || demographics.age <= 0.0 {
        return Err(AKIError::Egfr(
            format!("Age must be positive, got {}", demographics.age)
        ));
    }
    Ok(())
}

pub fn create_equation(kind: EquationKind) -> Box<dyn EgfrEquation> {
    match kind {
        EquationKind::CkdEpi2009 => Box::new(ckd_epi_2009::CkdEpi2009),
        EquationKind::CkdEpi2021 => Box::new(ckd_epi_2021::CkdEpi2021),
        EquationKind::Mdrd => Box::new(mdrd::Mdrd),
    }
}
