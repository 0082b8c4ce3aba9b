use crate::analysis::{Mrn, Reading};
use crate::error::{AKIError, AKIResult};
use crate::models::{Demographics, Gender, Race};
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// A single CSV file, or every `*.csv` directly inside a directory (sorted by
/// name).
pub fn collect_input_files<P: AsRef<Path>>(path: P) -> AKIResult<Vec<PathBuf>> {
    let path = path.as_ref();
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let file = entry?.path();
        let is_csv = file.extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if file.is_file() && is_csv {
            files.push(file);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(AKIError::InvalidInput(
            format!("No CSV files found in {:?}", path)
        ));
    }
    Ok(files)
}

/// Collects readings across files. A later reading for the same MRN and
/// timestamp replaces the earlier one.
#[derive(Debug, Default)]
pub struct LabTable {
    readings: BTreeMap<Mrn, BTreeMap<NaiveDateTime, f64>>,
    skipped_rows: usize,
}

impl LabTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_file<P: AsRef<Path>>(&mut self, path: P) -> AKIResult<()> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let (accepted, skipped) = self.read_csv(file)?;
        info!("Read {} readings from {:?} ({} rows skipped)", accepted, path, skipped);
        Ok(())
    }

    /// Columns by position: MRN, creatinine value, date.
    pub fn read_csv<R: Read>(&mut self, reader: R) -> AKIResult<(usize, usize)> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut accepted = 0;
        let mut skipped = 0;
        for (line, record) in csv_reader.byte_records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    debug!("Skipping row {}: {}", line + 2, e);
                    skipped += 1;
                    continue;
                }
            };
            let parsed = (|| -> Option<(Mrn, NaiveDateTime, f64)> {
                let mrn = parse_mrn(field(&record, 0)?)?;
                let value = parse_value(field(&record, 1)?)?;
                let timestamp = parse_timestamp(field(&record, 2)?)?;
                Some((mrn, timestamp, value))
            })();

            match parsed {
                Some((mrn, timestamp, value)) => {
                    self.readings.entry(mrn).or_default().insert(timestamp, value);
                    accepted += 1;
                }
                None => {
                    debug!("Skipping row {}: {:?}", line + 2, record);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!("Skipped {} rows with a missing or unparseable MRN, value or date", skipped);
        }
        self.skipped_rows += skipped;
        Ok((accepted, skipped))
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Chronologically ordered series per MRN. MRNs without readings never
    /// appear.
    pub fn into_series(self) -> BTreeMap<Mrn, Vec<Reading>> {
        self.readings
            .into_iter()
            .filter(|(_, readings)| !readings.is_empty())
            .map(|(mrn, readings)| {
                let series = readings.into_iter()
                    .map(|(timestamp, value)| Reading { timestamp, value })
                    .collect();
                (mrn, series)
            })
            .collect()
    }
}

pub fn read_lab_files(files: &[PathBuf]) -> AKIResult<BTreeMap<Mrn, Vec<Reading>>> {
    let mut table = LabTable::new();
    for file in files {
        table.read_file(file)?;
    }
    if table.skipped_rows() > 0 {
        warn!("{} rows skipped across {} files", table.skipped_rows(), files.len());
    }
    Ok(table.into_series())
}

/// Demographics keyed by MRN. Any failure to read the source at all is
/// `MalformedDemographics`; individual bad rows are skipped.
pub fn read_demographics<P: AsRef<Path>>(path: P) -> AKIResult<HashMap<Mrn, Demographics>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| AKIError::MalformedDemographics(format!("{:?}: {}", path, e)))?;
    let demographics = read_demographics_csv(file)?;
    info!("Loaded demographics for {} patients from {:?}", demographics.len(), path);
    Ok(demographics)
}

pub fn read_demographics_csv<R: Read>(reader: R) -> AKIResult<HashMap<Mrn, Demographics>> {
    let malformed = |e: csv::Error| AKIError::MalformedDemographics(e.to_string());

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers().map_err(malformed)?.clone();
    let mrn_col = find_column(&headers, &["mrn"])?;
    let age_col = find_column(&headers, &["age"])?;
    let gender_col = find_column(&headers, &["gender", "sex"])?;
    let race_col = find_column(&headers, &["race"])?;

    let mut demographics = HashMap::new();
    let mut skipped = 0;
    for record in csv_reader.byte_records() {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(malformed(e)),
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        let parsed = (|| -> Option<(Mrn, Demographics)> {
            let mrn = parse_mrn(field(&record, mrn_col)?)?;
            let age = parse_value(field(&record, age_col)?)?;
            let gender = field(&record, gender_col)?.parse::<Gender>().ok()?;
            let race = field(&record, race_col)?.parse::<Race>().ok()?;
            Some((mrn, Demographics { age, gender, race }))
        })();

        match parsed {
            Some((mrn, demo)) => {
                demographics.insert(mrn, demo);
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("Skipped {} demographics rows that could not be parsed", skipped);
    }
    Ok(demographics)
}

/// Demographics for the run, or none at all when no source was given or it
/// could not be read. Enrichment problems never stop the lab analysis.
pub fn load_demographics(path: Option<&Path>) -> HashMap<Mrn, Demographics> {
    match path {
        Some(path) => read_demographics(path).unwrap_or_else(|e| {
            warn!("Continuing without demographics: {}", e);
            HashMap::new()
        }),
        None => HashMap::new(),
    }
}

/// A field as UTF-8, or `None` if it is missing or not valid text.
fn field(record: &csv::ByteRecord, index: usize) -> Option<&str> {
    std::str::from_utf8(record.get(index)?).ok()
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> AKIResult<usize> {
    headers.iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
        .ok_or_else(|| AKIError::MalformedDemographics(
            format!("Missing column {:?}", names[0])
        ))
}

/// Accepts integer MRNs, including ones written as floats ("1234.0").
fn parse_mrn(field: &str) -> Option<Mrn> {
    if let Ok(mrn) = field.parse::<Mrn>() {
        return Some(mrn);
    }
    let value = field.parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Some(value as Mrn)
    } else {
        None
    }
}

fn parse_value(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_timestamp(field: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS.iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(field, fmt).ok())
        .or_else(|| {
            DATE_FORMATS.iter()
                .find_map(|fmt| NaiveDate::parse_from_str(field, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
