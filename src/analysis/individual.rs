use super::trend::{baseline_percentile, compute_slopes, detect_peaks, flag_aki};
use crate::error::{AKIError, AKIResult};
use crate::models::Demographics;
use crate::staging::{RenalFunction, RenalStager};
use chrono::NaiveDateTime;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Medical record number.
pub type Mrn = u64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Thresholds applied to every patient in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    pub baseline_percentile: f64,
    pub threshold_ratio: f64,
}

/// One patient's fully annotated creatinine history.
///
/// `slopes`, `peaks` and `aki` are index-aligned with `series`. Nothing is
/// recomputed after construction.
#[derive(Debug, Clone, Serialize)]
pub struct Patient {
    mrn: Mrn,
    series: Vec<Reading>,
    baseline: f64,
    slopes: Vec<f64>,
    peaks: Vec<bool>,
    aki: Vec<bool>,
    demographics: Option<Demographics>,
    renal_function: Option<RenalFunction>,
}

impl Patient {
    pub fn new(mrn: Mrn, mut series: Vec<Reading>, params: &DetectionParams) -> AKIResult<Self> {
        if series.is_empty() {
            return Err(AKIError::InvalidInput(format!("MRN {} has no readings", mrn)));
        }

        // Stable, so equal timestamps keep ingestion order.
        series.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let values: Vec<f64> = series.iter().map(|r| r.value).collect();
        let baseline = baseline_percentile(&values, params.baseline_percentile)?;
        let slopes = compute_slopes(&values);
        let peaks = detect_peaks(&slopes);
        let aki = flag_aki(&values, &peaks, baseline, params.threshold_ratio);

        Ok(Self {
            mrn,
            series,
            baseline,
            slopes,
            peaks,
            aki,
            demographics: None,
            renal_function: None,
        })
    }

    /// Attach demographics and stage renal function. Equation failures leave
    /// both eGFR and stage absent.
    pub fn with_demographics(mut self, demographics: Option<Demographics>, stager: &RenalStager) -> Self {
        if let Some(demo) = &demographics {
            match stager.stage(demo, self.baseline, self.latest().value) {
                Ok(renal) => self.renal_function = Some(renal),
                Err(e) => warn!("MRN {}: eGFR unavailable ({})", self.mrn, e),
            }
        }
        self.demographics = demographics;
        self
    }

    pub fn mrn(&self) -> Mrn {
        self.mrn
    }

    pub fn series(&self) -> &[Reading] {
        &self.series
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn slopes(&self) -> &[f64] {
        &self.slopes
    }

    pub fn peaks(&self) -> &[bool] {
        &self.peaks
    }

    pub fn aki_flags(&self) -> &[bool] {
        &self.aki
    }

    pub fn demographics(&self) -> Option<&Demographics> {
        self.demographics.as_ref()
    }

    pub fn renal_function(&self) -> Option<&RenalFunction> {
        self.renal_function.as_ref()
    }

    pub fn num_readings(&self) -> usize {
        self.series.len()
    }

    pub fn latest(&self) -> &Reading {
        // Construction rejects empty series.
        &self.series[self.series.len() - 1]
    }

    pub fn aki_events(&self) -> impl Iterator<Item = &Reading> + '_ {
        self.series.iter()
            .zip(&self.aki)
            .filter(|(_, &aki)| aki)
            .map(|(reading, _)| reading)
    }

    pub fn num_aki_events(&self) -> usize {
        self.aki.iter().filter(|&&aki| aki).count()
    }
}

impl fmt::Display for Patient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<MRN {}, Base CR {}, Num CRS {}, Num AKI {}>",
            self.mrn,
            self.baseline,
            self.num_readings(),
            self.num_aki_events()
        )
    }
}
