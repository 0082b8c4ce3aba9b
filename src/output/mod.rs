use crate::analysis::{aki_details, summary_rows, Population, PopulationSummary, SummaryRow};
use crate::error::AKIResult;
use std::path::Path;
use std::fs::File;
use std::io::Write;
use log::{debug, info};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn save_results<P: AsRef<Path>>(population: &Population, output_dir: P) -> AKIResult<()> {
    let output_path = output_dir.as_ref();
    let rows = summary_rows(population);

    // Summary table, one row per patient
    save_summary_table(&rows, &output_path.join("aki.csv"))?;

    // AKI dates per patient
    save_aki_dates(population, &output_path.join("dates"))?;

    // Annotated series for plotting
    save_series_data(population, &output_path.join("series.csv"))?;

    let summary = PopulationSummary::from_rows(&rows, population.num_readings());
    save_population_summary(&summary, &output_path.join("population_summary.json"))?;

    info!("All results saved to {:?}", output_path);
    Ok(())
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn write_summary_table<W: Write>(rows: &[SummaryRow], out: W) -> AKIResult<()> {
    let mut writer = csv::Writer::from_writer(out);

    writer.write_record(&[
        "MRN", "baseCr", "numAKI", "anyAKI", "eGFR", "ckdStage", "error"
    ])?;

    for row in rows {
        writer.write_record(&[
            row.mrn.to_string(),
            optional(row.baseline),
            row.num_aki_events.to_string(),
            row.any_aki.to_string(),
            optional(row.egfr.map(|e| format!("{:.1}", e))),
            optional(row.ckd_stage),
            row.error.clone().unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn save_summary_table<P: AsRef<Path>>(rows: &[SummaryRow], path: P) -> AKIResult<()> {
    write_summary_table(rows, File::create(path)?)
}

/// One `<MRN>.csv` per patient that has at least one AKI event.
fn save_aki_dates<P: AsRef<Path>>(population: &Population, dir: P) -> AKIResult<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let mut written = 0;
    for detail in aki_details(population) {
        if detail.events.is_empty() {
            continue;
        }

        let mut writer = csv::Writer::from_path(dir.join(format!("{}.csv", detail.mrn)))?;
        writer.write_record(&["date", "value"])?;
        for event in &detail.events {
            writer.write_record(&[
                event.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                event.value.to_string(),
            ])?;
        }
        writer.flush()?;
        written += 1;
    }

    debug!("Wrote AKI dates for {} patients", written);
    Ok(())
}

fn save_series_data<P: AsRef<Path>>(population: &Population, path: P) -> AKIResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(&[
        "MRN", "date", "value", "order", "slope", "peak", "aki", "baseCr"
    ])?;

    for patient in population.patients() {
        let baseline = patient.baseline().to_string();
        for (order, reading) in patient.series().iter().enumerate() {
            writer.write_record(&[
                patient.mrn().to_string(),
                reading.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                reading.value.to_string(),
                order.to_string(),
                patient.slopes()[order].to_string(),
                patient.peaks()[order].to_string(),
                patient.aki_flags()[order].to_string(),
                baseline.clone(),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}

fn save_population_summary<P: AsRef<Path>>(summary: &PopulationSummary, path: P) -> AKIResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}

/// Markdown report of the run.
pub fn generate_report<P: AsRef<Path>>(
    population: &Population,
    baseline_percentile: f64,
    threshold_ratio: f64,
    equation: &str,
    output_dir: P,
) -> AKIResult<()> {
    let report_path = output_dir.as_ref().join("report.md");
    let summary = PopulationSummary::from_population(population);
    let with_demographics = population.patients()
        .filter(|p| p.demographics().is_some())
        .count();

    let stage_lines: String = summary.ckd_stages.iter()
        .map(|(stage, count)| format!("- {}: {}\n", stage, count))
        .collect();

    let report_content = format!(
        r#"# Acute Kidney Injury Detection Report

## Run Overview
- **Patients analysed**: {}
- **Creatinine readings**: {}
- **Patients that failed analysis**: {}
- **Patients with demographics**: {}

## Detection Settings
- Baseline: {}th percentile of each patient's history
- AKI: local peak above {} x baseline
- eGFR equation: {}

## AKI Findings
- Patients with any AKI: {} ({:.1}%)
- Total AKI events: {}

### Baseline Creatinine
- Mean: {:.3} mg/dL
- Median: {:.3} mg/dL
- SD: {:.3} mg/dL

## CKD Stages
{}
## Files Generated
- `aki.csv`: per-patient baseline, AKI counts, eGFR and CKD stage
- `dates/<MRN>.csv`: dates and values of each AKI event
- `series.csv`: annotated readings (slope, peak and AKI flags) for plotting
- `population_summary.json`: population statistics
"#,
        summary.n_patients,
        summary.n_readings,
        summary.n_failed,
        with_demographics,
        baseline_percentile,
        threshold_ratio,
        equation,
        summary.n_with_aki,
        if summary.n_patients > 0 { summary.n_with_aki as f64 / summary.n_patients as f64 * 100.0 } else { 0.0 },
        summary.total_aki_events,
        summary.baseline.mean,
        summary.baseline.median,
        summary.baseline.sd,
        stage_lines,
    );

    std::fs::write(report_path, report_content)?;
    Ok(())
}
