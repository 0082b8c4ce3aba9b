use super::individual::{Mrn, Patient, Reading};
use super::trend::baseline_percentile;
use crate::error::{AKIError, AKIResult};
use crate::staging::CkdStage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All patients of one run, keyed by MRN. Entries are only ever added.
#[derive(Debug, Default)]
pub struct Population {
    patients: BTreeMap<Mrn, Patient>,
    failures: BTreeMap<Mrn, String>,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, patient: Patient) -> AKIResult<()> {
        let mrn = patient.mrn();
        if self.patients.contains_key(&mrn) || self.failures.contains_key(&mrn) {
            return Err(AKIError::Validation(format!("MRN {} already in population", mrn)));
        }
        self.patients.insert(mrn, patient);
        Ok(())
    }

    /// Keep a patient that could not be analysed so it still shows up in the
    /// summary table.
    pub fn record_failure(&mut self, mrn: Mrn, error: &AKIError) {
        self.failures.entry(mrn).or_insert_with(|| error.to_string());
    }

    #[cfg(test)]
    pub fn get(&self, mrn: Mrn) -> Option<&Patient> {
        self.patients.get(&mrn)
    }

    pub fn patients(&self) -> impl Iterator<Item = &Patient> + '_ {
        self.patients.values()
    }

    pub fn failures(&self) -> &BTreeMap<Mrn, String> {
        &self.failures
    }

    pub fn num_patients(&self) -> usize {
        self.patients.len()
    }

    pub fn num_readings(&self) -> usize {
        self.patients.values().map(|p| p.num_readings()).sum()
    }
}

/// One line of the per-patient summary table. Lab-derived fields are absent
/// only for failed patients; eGFR and stage are absent without demographics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub mrn: Mrn,
    pub baseline: Option<f64>,
    pub num_aki_events: usize,
    pub any_aki: bool,
    pub egfr: Option<f64>,
    pub ckd_stage: Option<CkdStage>,
    pub error: Option<String>,
}

impl SummaryRow {
    pub fn from_patient(patient: &Patient) -> Self {
        let num_aki_events = patient.num_aki_events();
        let renal = patient.renal_function();

        Self {
            mrn: patient.mrn(),
            baseline: Some(patient.baseline()),
            num_aki_events,
            any_aki: num_aki_events > 0,
            egfr: renal.map(|r| r.egfr),
            ckd_stage: renal.map(|r| r.ckd_stage),
            error: None,
        }
    }

    fn failed(mrn: Mrn, error: &str) -> Self {
        Self {
            mrn,
            baseline: None,
            num_aki_events: 0,
            any_aki: false,
            egfr: None,
            ckd_stage: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AkiDetail {
    pub mrn: Mrn,
    pub events: Vec<Reading>,
}

/// Summary rows for every patient, failures included, ordered by MRN.
pub fn summary_rows(population: &Population) -> Vec<SummaryRow> {
    let mut rows: Vec<SummaryRow> = population.patients()
        .map(SummaryRow::from_patient)
        .chain(population.failures().iter().map(|(&mrn, e)| SummaryRow::failed(mrn, e)))
        .collect();
    rows.sort_by_key(|row| row.mrn);
    rows
}

/// AKI readings per patient, in chronological order. Patients without
/// events get an empty list.
pub fn aki_details(population: &Population) -> Vec<AkiDetail> {
    population.patients()
        .map(|p| AkiDetail {
            mrn: p.mrn(),
            events: p.aki_events().copied().collect(),
        })
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PopulationSummary {
    pub n_patients: usize,
    pub n_readings: usize,
    pub n_failed: usize,
    pub n_with_aki: usize,
    pub total_aki_events: usize,
    pub baseline: BaselineSummary,
    pub ckd_stages: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BaselineSummary {
    pub mean: f64,
    pub median: f64,
    pub sd: f64,
}

impl PopulationSummary {
    pub fn from_rows(rows: &[SummaryRow], n_readings: usize) -> Self {
        let analysed: Vec<&SummaryRow> = rows.iter().filter(|r| r.error.is_none()).collect();
        let baselines: Vec<f64> = analysed.iter().filter_map(|r| r.baseline).collect();

        let mut ckd_stages = BTreeMap::new();
        for row in &analysed {
            let key = row.ckd_stage
                .map(|stage| stage.to_string())
                .unwrap_or_else(|| "unavailable".to_string());
            *ckd_stages.entry(key).or_insert(0) += 1;
        }

        Self {
            n_patients: analysed.len(),
            n_readings,
            n_failed: rows.len() - analysed.len(),
            n_with_aki: analysed.iter().filter(|r| r.any_aki).count(),
            total_aki_events: analysed.iter().map(|r| r.num_aki_events).sum(),
            baseline: BaselineSummary {
                mean: mean(&baselines),
                median: baseline_percentile(&baselines, 50.0).unwrap_or(0.0),
                sd: std_dev(&baselines),
            },
            ckd_stages,
        }
    }

    pub fn from_population(population: &Population) -> Self {
        Self::from_rows(&summary_rows(population), population.num_readings())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        0.0
    } else {
        let mean_val = mean(values);
        let variance = values.iter()
            .map(|v| (v - mean_val).powi(2))
            .sum::<f64>() / (values.len() - 1) as f64;
        variance.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::individual::tests::{daily, params};
    use crate::config::StagingConfig;
    use crate::models::{Demographics, Gender, Race};
    use crate::staging::RenalStager;
    use approx::assert_relative_eq;

    fn population() -> Population {
        let stager = RenalStager::from_config(&StagingConfig::default());
        let demo = Demographics { age: 80.0, gender: Gender::Male, race: Race::Other };

        let mut population = Population::new();
        population.insert(
            Patient::new(10, daily(&[1.0, 1.0, 1.0, 2.0, 1.5]), &params()).unwrap()
        ).unwrap();
        population.insert(
            Patient::new(20, daily(&[6.0, 6.5, 6.2]), &params())
                .unwrap()
                .with_demographics(Some(demo), &stager)
        ).unwrap();
        population.insert(Patient::new(5, daily(&[0.9]), &params()).unwrap()).unwrap();
        population.record_failure(15, &AKIError::InvalidInput("non-finite value".to_string()));
        population
    }

    #[test]
    fn test_summary_rows() {
        let rows = summary_rows(&population());
        let mrns: Vec<Mrn> = rows.iter().map(|r| r.mrn).collect();
        assert_eq!(mrns, vec![5, 10, 15, 20]);

        let single = &rows[0];
        assert_eq!(single.baseline, Some(0.9));
        assert_eq!(single.num_aki_events, 0);
        assert!(!single.any_aki);
        assert!(single.egfr.is_none() && single.ckd_stage.is_none());

        let aki = &rows[1];
        assert_eq!(aki.num_aki_events, 1);
        assert!(aki.any_aki);
        assert!(aki.egfr.is_none() && aki.ckd_stage.is_none());
        assert!(aki.error.is_none());

        let failed = &rows[2];
        assert!(failed.baseline.is_none());
        assert!(failed.error.as_deref().unwrap().contains("non-finite"));

        let staged = &rows[3];
        assert_eq!(staged.ckd_stage, Some(CkdStage::Stage5));
        assert!(staged.egfr.is_some());
    }

    #[test]
    fn test_aki_details() {
        let details = aki_details(&population());
        assert_eq!(details.len(), 3);

        let detail = details.iter().find(|d| d.mrn == 10).unwrap();
        assert_eq!(detail.events.len(), 1);
        assert_eq!(detail.events[0].value, 2.0);

        assert!(details.iter().find(|d| d.mrn == 5).unwrap().events.is_empty());
    }

    #[test]
    fn test_population_summary() {
        let population = population();
        assert_eq!(population.num_patients(), 3);
        assert_eq!(population.num_readings(), 9);

        let summary = PopulationSummary::from_population(&population);
        assert_eq!(summary.n_patients, 3);
        assert_eq!(summary.n_readings, 9);
        assert_eq!(summary.n_failed, 1);
        assert_eq!(summary.n_with_aki, 1);
        assert_eq!(summary.total_aki_events, 1);
        assert_relative_eq!(summary.baseline.median, 1.0);
        assert_relative_eq!(summary.baseline.mean, (0.9 + 1.0 + 6.1) / 3.0, epsilon = 1e-9);
        assert_eq!(summary.ckd_stages.get("5"), Some(&1));
        assert_eq!(summary.ckd_stages.get("unavailable"), Some(&2));
    }

    #[test]
    fn test_insert_is_insertion_only() {
        let mut population = population();
        let duplicate = Patient::new(10, daily(&[3.0]), &params()).unwrap();
        assert!(population.insert(duplicate).is_err());
        assert_eq!(population.get(10).unwrap().num_readings(), 5);
    }
}
