pub mod individual;
pub mod population;
pub mod trend;

use crate::config::Config;
use crate::error::AKIResult;
use crate::models::Demographics;
use crate::staging::RenalStager;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

pub use individual::*;
pub use population::*;

/// Runs the per-patient pipeline over a whole population.
pub struct Analyzer {
    params: DetectionParams,
    stager: RenalStager,
}

impl Analyzer {
    pub fn new(config: &Config) -> AKIResult<Self> {
        config.validate()?;

        Ok(Self {
            params: DetectionParams {
                baseline_percentile: config.baseline.percentile,
                threshold_ratio: config.aki.threshold_ratio,
            },
            stager: RenalStager::from_config(&config.staging),
        })
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    pub fn equation_name(&self) -> &'static str {
        self.stager.equation_name()
    }

    /// Patients are independent, so each one is built on its own rayon task;
    /// results are inserted in MRN order afterwards.
    pub fn analyze(
        &self,
        labs: BTreeMap<Mrn, Vec<Reading>>,
        demographics: &HashMap<Mrn, Demographics>,
    ) -> Population {
        info!(
            "Analysing {} patients (baseline percentile {}, AKI ratio {}, {} threads)",
            labs.len(),
            self.params.baseline_percentile,
            self.params.threshold_ratio,
            rayon::current_num_threads()
        );

        let built: Vec<(Mrn, AKIResult<Patient>)> = labs
            .into_par_iter()
            .map(|(mrn, readings)| {
                let result = Patient::new(mrn, readings, &self.params)
                    .map(|p| p.with_demographics(demographics.get(&mrn).cloned(), &self.stager));
                (mrn, result)
            })
            .collect();

        let mut population = Population::new();
        for (mrn, result) in built {
            let inserted = result.and_then(|patient| {
                debug!("{}", patient);
                population.insert(patient)
            });
            if let Err(e) = inserted {
                warn!("MRN {} could not be analysed: {}", mrn, e);
                population.record_failure(mrn, &e);
            }
        }

        info!(
            "Analysis completed: {} patients, {} failed",
            population.num_patients(),
            population.failures().len()
        );
        population
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::individual::tests::daily;
    use crate::config::EquationKind;
    use crate::models::{Gender, Race};
    use crate::staging::CkdStage;

    fn labs() -> BTreeMap<Mrn, Vec<Reading>> {
        let mut labs = BTreeMap::new();
        labs.insert(1, daily(&[1.0, 1.0, 1.0, 2.0, 1.5]));
        labs.insert(2, daily(&[0.9]));
        labs.insert(3, daily(&[1.2, f64::NAN, 1.1]));
        labs.insert(4, Vec::new());
        labs
    }

    #[test]
    fn test_analyze_population() {
        let analyzer = Analyzer::new(&Config::default()).unwrap();
        let mut demographics = HashMap::new();
        demographics.insert(2, Demographics { age: 30.0, gender: Gender::Male, race: Race::Other });

        let population = analyzer.analyze(labs(), &demographics);

        assert_eq!(population.num_patients(), 2);
        assert_eq!(population.get(1).unwrap().num_aki_events(), 1);
        assert!(population.get(1).unwrap().renal_function().is_none());

        let renal = population.get(2).unwrap().renal_function().unwrap();
        assert_eq!(renal.ckd_stage, CkdStage::Unclassified);

        // Bad series are kept as failures instead of aborting the run.
        assert!(population.failures().contains_key(&3));
        assert!(population.failures().contains_key(&4));
    }

    #[test]
    fn test_percentile_setting_changes_baseline() {
        let mut config = Config::default();
        config.baseline.percentile = 50.0;
        config.staging.equation = EquationKind::Mdrd;
        let analyzer = Analyzer::new(&config).unwrap();
        assert_eq!(analyzer.equation_name(), "MDRD");

        let mut labs = BTreeMap::new();
        labs.insert(1, daily(&[1.0, 2.0, 3.0, 4.0]));
        let population = analyzer.analyze(labs, &HashMap::new());
        assert_eq!(population.get(1).unwrap().baseline(), 2.5);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.aki.threshold_ratio = -1.0;
        assert!(Analyzer::new(&config).is_err());
    }
}
