use crate::config::{CreatinineSource, StagingConfig};
use crate::models::{create_equation, Demographics, EgfrEquation};
use crate::error::{AKIError, AKIResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// CKD stage bucket derived from eGFR.
///
/// There is no stage 1 / normal bucket: eGFR >= 90 maps to `Unclassified`.
/// Whether that gap is clinically intended is still unconfirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CkdStage {
    Stage2,
    Stage3,
    Stage4,
    Stage5,
    Unclassified,
}

impl CkdStage {
    pub fn from_egfr(egfr: f64) -> Self {
        if egfr < 15.0 {
            CkdStage::Stage5
        } else if egfr < 30.0 {
            CkdStage::Stage4
        } else if egfr < 60.0 {
            CkdStage::Stage3
        } else if egfr < 90.0 {
            CkdStage::Stage2
        } else {
            CkdStage::Unclassified
        }
    }
}

impl fmt::Display for CkdStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CkdStage::Stage2 => write!(f, "2"),
            CkdStage::Stage3 => write!(f, "3"),
            CkdStage::Stage4 => write!(f, "4"),
            CkdStage::Stage5 => write!(f, "5"),
            CkdStage::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// eGFR and its stage always travel together, so a patient either has both
/// or neither.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenalFunction {
    pub egfr: f64,
    pub ckd_stage: CkdStage,
}

pub struct RenalStager {
    equation: Box<dyn EgfrEquation>,
    source: CreatinineSource,
}

impl RenalStager {
    pub fn from_config(config: &StagingConfig) -> Self {
        Self {
            equation: create_equation(config.equation),
            source: config.creatinine_source,
        }
    }

    pub fn equation_name(&self) -> &'static str {
        self.equation.name()
    }

    pub fn stage(&self, demographics: &Demographics, baseline: f64, latest: f64) -> AKIResult<RenalFunction> {
        let creatinine = match self.source {
            CreatinineSource::Baseline => baseline,
            CreatinineSource::Latest => latest,
        };

        let egfr = self.equation.estimate(creatinine, demographics)?;
        if !egfr.is_finite() {
            return Err(AKIError::Egfr(format!("Non-finite eGFR for creatinine {}", creatinine)));
        }

        Ok(RenalFunction {
            egfr,
            ckd_stage: CkdStage::from_egfr(egfr),
        })
    }
}
