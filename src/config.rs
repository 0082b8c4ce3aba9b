use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{AKIError, AKIResult};

/// 25th percentile of the patient's full history. Some revisions of the
/// detection logic used the median (50) instead; the clinical definition of
/// baseline is not settled, so it stays a named, overridable setting.
pub const DEFAULT_BASELINE_PERCENTILE: f64 = 25.0;

/// A peak counts as AKI when it exceeds baseline by 50%.
pub const DEFAULT_AKI_THRESHOLD_RATIO: f64 = 1.5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub baseline: BaselineConfig,
    pub aki: AkiConfig,
    pub staging: StagingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub percentile: f64,      // 0..=100, linear interpolation between ranks
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AkiConfig {
    pub threshold_ratio: f64, // value > ratio * baseline
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    pub equation: EquationKind,
    pub creatinine_source: CreatinineSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquationKind {
    CkdEpi2009,
    CkdEpi2021,
    Mdrd,
}

/// Which creatinine value feeds the eGFR equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatinineSource {
    Baseline,
    Latest,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self { percentile: DEFAULT_BASELINE_PERCENTILE }
    }
}

impl Default for AkiConfig {
    fn default() -> Self {
        Self { threshold_ratio: DEFAULT_AKI_THRESHOLD_RATIO }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            equation: EquationKind::CkdEpi2009,
            creatinine_source: CreatinineSource::Baseline,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> AKIResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of the loaded values.
    pub fn with_overrides(mut self, percentile: Option<f64>, threshold: Option<f64>) -> AKIResult<Self> {
        if let Some(p) = percentile {
            self.baseline.percentile = p;
        }
        if let Some(t) = threshold {
            self.aki.threshold_ratio = t;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> AKIResult<()> {
        let p = self.baseline.percentile;
        if !p.is_finite() || !(0.0..=100.0).contains(&p) {
            return Err(AKIError::InvalidConfig(
                format!("Baseline percentile must be within [0, 100], got {}", p)
            ));
        }

        let ratio = self.aki.threshold_ratio;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(AKIError::Validation(
                format!("AKI threshold ratio must be positive, got {}", ratio)
            ));
        }

        Ok(())
    }
}
